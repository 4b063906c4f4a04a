use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{BenchEntry, Employee, Need, NeedStatus, Tagging};
use crate::repo::Repository;
use crate::service::ServiceResult;

/// A bench entry joined with its employee.
#[derive(Debug, Clone, Serialize)]
pub struct BenchMember {
    pub employee: Employee,
    pub since: NaiveDate,
    pub idle_days: i64,
    /// The employee's last allocation end, if any.
    pub last_released: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchSummary {
    pub members: Vec<BenchMember>,
    pub open_needs: usize,
}

pub struct BenchService {
    bench: Arc<dyn Repository<BenchEntry>>,
    taggings: Arc<dyn Repository<Tagging>>,
    employees: Arc<dyn Repository<Employee>>,
    needs: Arc<dyn Repository<Need>>,
}

impl BenchService {
    pub fn new(
        bench: Arc<dyn Repository<BenchEntry>>,
        taggings: Arc<dyn Repository<Tagging>>,
        employees: Arc<dyn Repository<Employee>>,
        needs: Arc<dyn Repository<Need>>,
    ) -> Self {
        Self {
            bench,
            taggings,
            employees,
            needs,
        }
    }

    /// Current bench, longest idle first.
    pub async fn roster(&self, today: NaiveDate) -> ServiceResult<BenchSummary> {
        let taggings = self.taggings.list().await?;
        let mut members = Vec::new();
        for entry in self.bench.list().await? {
            let Some(employee) = self.employees.get(entry.employee_id).await? else {
                tracing::warn!(employee_id = entry.employee_id, "Bench entry without employee");
                continue;
            };
            let last_released = taggings
                .iter()
                .filter(|t| t.employee_id == entry.employee_id)
                .filter_map(|t| t.end_date)
                .max();
            members.push(BenchMember {
                employee,
                since: entry.since,
                idle_days: (today - entry.since).num_days(),
                last_released,
            });
        }
        members.sort_by(|a, b| b.idle_days.cmp(&a.idle_days));

        let open_needs = self
            .needs
            .list()
            .await?
            .iter()
            .filter(|n| n.status == NeedStatus::Open)
            .count();
        Ok(BenchSummary { members, open_needs })
    }
}
