use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::domain::{Employee, Project, Tagging};
use crate::repo::Repository;
use crate::service::ServiceResult;

/// A tagging with the names a human needs to read it.
#[derive(Debug, Clone, Serialize)]
pub struct TaggingView {
    #[serde(flatten)]
    pub tagging: Tagging,
    pub employee: Option<String>,
    pub project: Option<String>,
}

pub struct TaggingService {
    taggings: Arc<dyn Repository<Tagging>>,
    projects: Arc<dyn Repository<Project>>,
    employees: Arc<dyn Repository<Employee>>,
}

impl TaggingService {
    pub fn new(
        taggings: Arc<dyn Repository<Tagging>>,
        projects: Arc<dyn Repository<Project>>,
        employees: Arc<dyn Repository<Employee>>,
    ) -> Self {
        Self {
            taggings,
            projects,
            employees,
        }
    }

    pub async fn list(&self) -> ServiceResult<Vec<TaggingView>> {
        let taggings = self.taggings.list().await?;
        self.describe(taggings).await
    }

    /// Taggings active on `day`.
    pub async fn active_on(&self, day: NaiveDate) -> ServiceResult<Vec<Tagging>> {
        Ok(self
            .taggings
            .list()
            .await?
            .into_iter()
            .filter(|t| t.is_active_on(day))
            .collect())
    }

    /// Taggings whose end date falls in `[today, today + days]`, soonest first.
    pub async fn ending_within(&self, today: NaiveDate, days: u32) -> ServiceResult<Vec<TaggingView>> {
        let horizon = today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        let mut ending: Vec<Tagging> = self
            .taggings
            .list()
            .await?
            .into_iter()
            .filter(|t| t.end_date.is_some_and(|end| end >= today && end <= horizon))
            .collect();
        ending.sort_by_key(|t| t.end_date);
        self.describe(ending).await
    }

    async fn describe(&self, taggings: Vec<Tagging>) -> ServiceResult<Vec<TaggingView>> {
        let projects = self.projects.list().await?;
        let employees = self.employees.list().await?;
        Ok(taggings
            .into_iter()
            .map(|tagging| TaggingView {
                employee: employees
                    .iter()
                    .find(|e| e.id == tagging.employee_id)
                    .map(|e| e.name.clone()),
                project: projects
                    .iter()
                    .find(|p| p.id == tagging.project_id)
                    .map(|p| p.name.clone()),
                tagging,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryRepository;

    fn tagging(id: i64, end: Option<(i32, u32, u32)>) -> Tagging {
        Tagging {
            id,
            employee_id: 1,
            project_id: 1,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: end.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            allocation: 100,
        }
    }

    #[tokio::test]
    async fn ending_within_window() {
        let taggings = MemoryRepository::with_rows([
            tagging(1, Some((2024, 6, 20))),
            tagging(2, Some((2024, 6, 5))),
            tagging(3, Some((2024, 8, 1))),
            tagging(4, None),
            tagging(5, Some((2024, 5, 1))),
        ]);
        let svc = TaggingService::new(
            Arc::new(taggings),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
        );

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let ids: Vec<_> = svc
            .ending_within(today, 30)
            .await
            .unwrap()
            .iter()
            .map(|v| v.tagging.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
