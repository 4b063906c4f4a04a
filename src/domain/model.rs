//! Business entities persisted by the repositories.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A record stored in its own table, keyed by a numeric id.
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Backing table name.
    const TABLE: &'static str;

    fn id(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub client_id: i64,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// An employee without an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchEntry {
    pub id: i64,
    pub employee_id: i64,
    pub since: NaiveDate,
}

/// An open staffing requirement on a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Need {
    pub id: i64,
    pub project_id: i64,
    pub skill: String,
    pub count: u32,
    #[serde(default)]
    pub status: NeedStatus,
    #[serde(default)]
    pub assignee_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeedStatus {
    #[default]
    Open,
    Filled,
    Closed,
}

/// Allocation of an employee to a project for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tagging {
    pub id: i64,
    pub employee_id: i64,
    pub project_id: i64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Percentage of the employee's time.
    #[serde(default = "default_allocation")]
    pub allocation: u8,
}

impl Tagging {
    /// Whether the allocation covers `day`.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && self.end_date.map_or(true, |end| end >= day)
    }
}

/// A key/value pair from the reference data (departments, skills, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub id: i64,
    pub key: String,
    pub value: String,
}

/// Login credential held by the auth repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub email: String,
    /// Hex encoded SHA-256 of the password.
    pub password_sha256: String,
    #[serde(default)]
    pub role: String,
}

/// The authenticated caller attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub credential_id: i64,
    pub email: String,
    pub role: String,
}

/// An issued session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    /// Expiry timestamp (seconds since epoch).
    pub expires_at: i64,
}

/// One row of the utilization report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationRow {
    pub department: String,
    pub headcount: i64,
    pub allocated: i64,
}

fn default_true() -> bool {
    true
}

fn default_allocation() -> u8 {
    100
}

impl Entity for Client {
    const TABLE: &'static str = "clients";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Project {
    const TABLE: &'static str = "projects";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Employee {
    const TABLE: &'static str = "employees";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for BenchEntry {
    const TABLE: &'static str = "bench";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Need {
    const TABLE: &'static str = "needs";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Tagging {
    const TABLE: &'static str = "taggings";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for MetadataEntry {
    const TABLE: &'static str = "metadata";
    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Credential {
    const TABLE: &'static str = "credentials";
    fn id(&self) -> i64 {
        self.id
    }
}
