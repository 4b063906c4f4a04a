//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use roster::domain::{Credential, Employee, MetadataEntry};
use roster::repo::memory::MemoryAuthRepository;
use roster::repo::Repository;
use roster::service::auth::hash_password;
use roster::{AppConfig, Repositories};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Write `toml` to a fresh temporary directory and return its path.
///
/// The directory lives as long as the returned guard.
pub fn write_config(toml: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, toml).unwrap();
    (dir, path)
}

/// Defaults with both transports on ephemeral loopback ports.
pub fn ephemeral_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.http.port = 0;
    config.rpc.host = "127.0.0.1".into();
    config.rpc.port = 0;
    config
}

/// In-memory repositories holding one admin login, one employee and one metadata key.
pub async fn seeded_repositories() -> Repositories {
    let credentials = MemoryAuthRepository::new();
    credentials.add_credential(Credential {
        id: 1,
        email: "admin@example.com".into(),
        password_sha256: hash_password("secret"),
        role: "admin".into(),
    });
    let repos = Repositories::in_memory().with_auth(Arc::new(credentials));
    repos
        .employees
        .save(&Employee {
            id: 1,
            name: "Asha".into(),
            email: "asha@example.com".into(),
            department: Some("eng".into()),
            designation: Some("engineer".into()),
            active: true,
        })
        .await
        .unwrap();
    repos
        .metadata
        .save(&MetadataEntry {
            id: 1,
            key: "department".into(),
            value: "eng".into(),
        })
        .await
        .unwrap();
    repos
}

/// Send one line-framed RPC request and read one response.
pub async fn rpc_call(addr: SocketAddr, request: Value) -> Value {
    let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut line = request.to_string();
    line.push('\n');
    write.write_all(line.as_bytes()).await.unwrap();
    let mut lines = BufReader::new(read).lines();
    let response = lines.next_line().await.unwrap().unwrap();
    serde_json::from_str(&response).unwrap()
}

pub fn http_url(addr: SocketAddr, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", addr.port(), path)
}
