use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::UtilizationRow;
use crate::repo::ReportRepository;
use crate::service::ServiceResult;

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
}

impl ReportService {
    pub fn new(repo: Arc<dyn ReportRepository>) -> Self {
        Self { repo }
    }

    pub async fn utilization(&self, on: NaiveDate, department: Option<&str>) -> ServiceResult<Vec<UtilizationRow>> {
        let rows = self.repo.utilization(on).await?;
        Ok(match department {
            Some(dept) => rows.into_iter().filter(|r| r.department == dept).collect(),
            None => rows,
        })
    }
}
