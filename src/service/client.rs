use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Client, Project};
use crate::repo::Repository;
use crate::service::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub projects: Vec<Project>,
}

pub struct ClientService {
    clients: Arc<dyn Repository<Client>>,
    projects: Arc<dyn Repository<Project>>,
}

impl ClientService {
    pub fn new(clients: Arc<dyn Repository<Client>>, projects: Arc<dyn Repository<Project>>) -> Self {
        Self { clients, projects }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Client>> {
        Ok(self.clients.list().await?)
    }

    /// A client with all of its projects.
    pub async fn get(&self, id: i64) -> ServiceResult<ClientDetail> {
        let client = self
            .clients
            .get(id)
            .await?
            .ok_or(ServiceError::NotFound { entity: "client", id })?;
        let projects = self
            .projects
            .list()
            .await?
            .into_iter()
            .filter(|p| p.client_id == id)
            .collect();
        Ok(ClientDetail { client, projects })
    }

    pub async fn save(&self, client: &Client) -> ServiceResult<()> {
        if client.name.trim().is_empty() {
            return Err(ServiceError::Invalid("client name must not be empty".into()));
        }
        Ok(self.clients.save(client).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryRepository;

    #[tokio::test]
    async fn detail_includes_only_own_projects() {
        let clients = MemoryRepository::with_rows([Client { id: 1, name: "Acme".into(), country: None }]);
        let projects = MemoryRepository::with_rows([
            Project { id: 10, client_id: 1, name: "Portal".into(), active: true },
            Project { id: 11, client_id: 2, name: "Other".into(), active: true },
        ]);
        let svc = ClientService::new(Arc::new(clients), Arc::new(projects));

        let detail = svc.get(1).await.unwrap();
        assert_eq!(detail.projects.len(), 1);
        assert_eq!(detail.projects[0].id, 10);
        assert!(matches!(svc.get(2).await, Err(ServiceError::NotFound { .. })));
    }
}
