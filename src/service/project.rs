use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Client, Need, NeedStatus, Project, Tagging};
use crate::repo::Repository;
use crate::service::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub client: Option<Client>,
    pub team: Vec<Tagging>,
    pub open_needs: Vec<Need>,
}

pub struct ProjectService {
    projects: Arc<dyn Repository<Project>>,
    clients: Arc<dyn Repository<Client>>,
    taggings: Arc<dyn Repository<Tagging>>,
    needs: Arc<dyn Repository<Need>>,
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn Repository<Project>>,
        clients: Arc<dyn Repository<Client>>,
        taggings: Arc<dyn Repository<Tagging>>,
        needs: Arc<dyn Repository<Need>>,
    ) -> Self {
        Self {
            projects,
            clients,
            taggings,
            needs,
        }
    }

    pub async fn list(&self) -> ServiceResult<Vec<Project>> {
        Ok(self.projects.list().await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Project> {
        self.projects
            .get(id)
            .await?
            .ok_or(ServiceError::NotFound { entity: "project", id })
    }

    /// A project with its client, current team and open needs.
    pub async fn detail(&self, id: i64) -> ServiceResult<ProjectDetail> {
        let project = self.get(id).await?;
        let client = self.clients.get(project.client_id).await?;
        let team = self
            .taggings
            .list()
            .await?
            .into_iter()
            .filter(|t| t.project_id == id)
            .collect();
        let open_needs = self
            .needs
            .list()
            .await?
            .into_iter()
            .filter(|n| n.project_id == id && n.status == NeedStatus::Open)
            .collect();
        Ok(ProjectDetail {
            project,
            client,
            team,
            open_needs,
        })
    }
}
