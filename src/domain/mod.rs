//! Domain types shared by repositories, services and transports.

pub mod model;

pub use model::*;
