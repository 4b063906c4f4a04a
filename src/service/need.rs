use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Employee, Need, NeedStatus, Project};
use crate::repo::Repository;
use crate::service::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize)]
pub struct NeedView {
    #[serde(flatten)]
    pub need: Need,
    pub project: Option<String>,
}

pub struct NeedService {
    needs: Arc<dyn Repository<Need>>,
    projects: Arc<dyn Repository<Project>>,
    employees: Arc<dyn Repository<Employee>>,
}

impl NeedService {
    pub fn new(
        needs: Arc<dyn Repository<Need>>,
        projects: Arc<dyn Repository<Project>>,
        employees: Arc<dyn Repository<Employee>>,
    ) -> Self {
        Self {
            needs,
            projects,
            employees,
        }
    }

    /// Needs with their project name, optionally filtered by status.
    pub async fn list(&self, status: Option<NeedStatus>) -> ServiceResult<Vec<NeedView>> {
        let projects = self.projects.list().await?;
        Ok(self
            .needs
            .list()
            .await?
            .into_iter()
            .filter(|n| status.map_or(true, |s| n.status == s))
            .map(|need| NeedView {
                project: projects
                    .iter()
                    .find(|p| p.id == need.project_id)
                    .map(|p| p.name.clone()),
                need,
            })
            .collect())
    }

    pub async fn open(&self) -> ServiceResult<Vec<NeedView>> {
        self.list(Some(NeedStatus::Open)).await
    }

    /// Fill a need with an employee.
    pub async fn assign(&self, need_id: i64, employee_id: i64) -> ServiceResult<Need> {
        let mut need = self
            .needs
            .get(need_id)
            .await?
            .ok_or(ServiceError::NotFound { entity: "need", id: need_id })?;
        if need.status != NeedStatus::Open {
            return Err(ServiceError::Invalid(format!("need {} is not open", need_id)));
        }
        self.employees
            .get(employee_id)
            .await?
            .ok_or(ServiceError::NotFound { entity: "employee", id: employee_id })?;

        need.status = NeedStatus::Filled;
        need.assignee_id = Some(employee_id);
        self.needs.save(&need).await?;
        Ok(need)
    }
}
