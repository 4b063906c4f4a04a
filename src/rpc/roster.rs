//! `roster` service: read access to employees, projects, clients and taggings.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::composition::Services;
use crate::rpc::protocol::{params, result, RpcError};
use crate::rpc::server::RpcService;
use crate::service::{ClientService, EmployeeService, ProjectService, TaggingService};

#[derive(Debug, Deserialize)]
struct ById {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct EmployeeFilter {
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Window {
    days: u32,
}

pub struct RosterRpc {
    employees: Arc<EmployeeService>,
    projects: Arc<ProjectService>,
    clients: Arc<ClientService>,
    taggings: Arc<TaggingService>,
}

impl RosterRpc {
    pub const NAME: &'static str = "roster";

    pub fn new(services: &Services) -> Self {
        Self {
            employees: Arc::clone(&services.employee),
            projects: Arc::clone(&services.project),
            clients: Arc::clone(&services.client),
            taggings: Arc::clone(&services.tagging),
        }
    }
}

#[async_trait]
impl RpcService for RosterRpc {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn call(&self, method: &str, args: Value) -> Result<Value, RpcError> {
        match method {
            "employees.list" => {
                let filter: EmployeeFilter = params(args)?;
                result(&self.employees.list(filter.department.as_deref()).await?)
            }
            "employees.get" => {
                let ById { id } = params(args)?;
                result(&self.employees.get(id).await?)
            }
            "projects.list" => result(&self.projects.list().await?),
            "projects.get" => {
                let ById { id } = params(args)?;
                result(&self.projects.detail(id).await?)
            }
            "clients.list" => result(&self.clients.list().await?),
            "clients.get" => {
                let ById { id } = params(args)?;
                result(&self.clients.get(id).await?)
            }
            "taggings.list" => result(&self.taggings.list().await?),
            "taggings.ending" => {
                let Window { days } = params(args)?;
                result(&self.taggings.ending_within(Utc::now().date_naive(), days).await?)
            }
            _ => Err(RpcError::UnknownMethod {
                service: Self::NAME.to_string(),
                method: method.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{Repositories, ServiceGraph};
    use crate::config::AppConfig;
    use crate::domain::Client;
    use crate::repo::Repository;
    use serde_json::json;

    #[tokio::test]
    async fn routes_methods_to_services() {
        let repos = Repositories::in_memory();
        repos
            .clients
            .save(&Client { id: 3, name: "Globex".into(), country: None })
            .await
            .unwrap();
        let graph = ServiceGraph::build(&AppConfig::default(), &repos, None);
        let rpc = RosterRpc::new(&graph.services);

        let clients = rpc.call("clients.list", Value::Null).await.unwrap();
        assert_eq!(clients[0]["name"], "Globex");

        let detail = rpc.call("clients.get", json!({ "id": 3 })).await.unwrap();
        assert_eq!(detail["projects"], json!([]));

        let missing = rpc.call("employees.get", json!({ "id": 99 })).await.unwrap_err();
        assert_eq!(missing.code(), -32004);

        let bad = rpc.call("employees.get", json!({})).await.unwrap_err();
        assert_eq!(bad.code(), -32602);

        assert!(matches!(
            rpc.call("payroll.run", Value::Null).await,
            Err(RpcError::UnknownMethod { .. })
        ));
    }
}
