//! Employee directory and bench reconciliation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{BenchEntry, Employee, MetadataEntry, Tagging};
use crate::repo::Repository;
use crate::service::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeDetail {
    #[serde(flatten)]
    pub employee: Employee,
    pub taggings: Vec<Tagging>,
    pub on_bench: bool,
}

/// Outcome of a refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub benched: usize,
    pub unbenched: usize,
    /// Employees whose department is not in the reference data.
    pub unknown_departments: usize,
}

pub struct EmployeeService {
    employees: Arc<dyn Repository<Employee>>,
    taggings: Arc<dyn Repository<Tagging>>,
    bench: Arc<dyn Repository<BenchEntry>>,
    metadata: Arc<dyn Repository<MetadataEntry>>,
}

impl EmployeeService {
    pub fn new(
        employees: Arc<dyn Repository<Employee>>,
        taggings: Arc<dyn Repository<Tagging>>,
        bench: Arc<dyn Repository<BenchEntry>>,
        metadata: Arc<dyn Repository<MetadataEntry>>,
    ) -> Self {
        Self {
            employees,
            taggings,
            bench,
            metadata,
        }
    }

    /// Active employees, optionally restricted to one department.
    pub async fn list(&self, department: Option<&str>) -> ServiceResult<Vec<Employee>> {
        Ok(self
            .employees
            .list()
            .await?
            .into_iter()
            .filter(|e| e.active)
            .filter(|e| department.map_or(true, |d| e.department.as_deref() == Some(d)))
            .collect())
    }

    pub async fn get(&self, id: i64) -> ServiceResult<EmployeeDetail> {
        let employee = self
            .employees
            .get(id)
            .await?
            .ok_or(ServiceError::NotFound { entity: "employee", id })?;
        let taggings = self
            .taggings
            .list()
            .await?
            .into_iter()
            .filter(|t| t.employee_id == id)
            .collect();
        let on_bench = self.bench.list().await?.iter().any(|b| b.employee_id == id);
        Ok(EmployeeDetail {
            employee,
            taggings,
            on_bench,
        })
    }

    /// Bring the bench roster in line with allocations as of `today`.
    ///
    /// Active employees without an active tagging get a bench entry; employees
    /// with one lose theirs.
    pub async fn refresh(&self, today: NaiveDate) -> ServiceResult<RefreshSummary> {
        let employees = self.employees.list().await?;
        let taggings = self.taggings.list().await?;
        let bench = self.bench.list().await?;
        let departments: HashSet<String> = self
            .metadata
            .list()
            .await?
            .into_iter()
            .filter(|m| m.key == "department")
            .map(|m| m.value)
            .collect();

        let allocated: HashSet<i64> = taggings
            .iter()
            .filter(|t| t.is_active_on(today))
            .map(|t| t.employee_id)
            .collect();
        let benched: HashSet<i64> = bench.iter().map(|b| b.employee_id).collect();
        let mut next_id = bench.iter().map(|b| b.id).max().unwrap_or(0);

        let mut summary = RefreshSummary::default();
        for employee in employees.iter().filter(|e| e.active) {
            if let Some(dept) = &employee.department {
                if !departments.is_empty() && !departments.contains(dept) {
                    summary.unknown_departments += 1;
                }
            }
            if !allocated.contains(&employee.id) && !benched.contains(&employee.id) {
                next_id += 1;
                self.bench
                    .save(&BenchEntry {
                        id: next_id,
                        employee_id: employee.id,
                        since: today,
                    })
                    .await?;
                summary.benched += 1;
            }
        }
        for entry in bench.iter().filter(|b| allocated.contains(&b.employee_id)) {
            self.bench.delete(entry.id).await?;
            summary.unbenched += 1;
        }

        tracing::info!(
            benched = summary.benched,
            unbenched = summary.unbenched,
            unknown_departments = summary.unknown_departments,
            "Employee refresh complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::memory::MemoryRepository;

    fn employee(id: i64, department: &str) -> Employee {
        Employee {
            id,
            name: format!("e{id}"),
            email: format!("e{id}@example.com"),
            department: Some(department.into()),
            designation: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn refresh_reconciles_bench() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let employees = MemoryRepository::with_rows([employee(1, "eng"), employee(2, "eng"), employee(3, "ops")]);
        let taggings = MemoryRepository::with_rows([Tagging {
            id: 1,
            employee_id: 1,
            project_id: 5,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            allocation: 100,
        }]);
        // Employee 1 is allocated but still benched.
        let bench = MemoryRepository::with_rows([BenchEntry { id: 4, employee_id: 1, since: today }]);
        let metadata = MemoryRepository::with_rows([MetadataEntry { id: 1, key: "department".into(), value: "eng".into() }]);

        let svc = EmployeeService::new(
            Arc::new(employees),
            Arc::new(taggings),
            Arc::new(bench.clone()),
            Arc::new(metadata),
        );
        let summary = svc.refresh(today).await.unwrap();
        assert_eq!(summary, RefreshSummary { benched: 2, unbenched: 1, unknown_departments: 1 });

        let mut roster: Vec<_> = bench.list().await.unwrap().iter().map(|b| b.employee_id).collect();
        roster.sort();
        assert_eq!(roster, vec![2, 3]);

        assert!(svc.get(2).await.unwrap().on_bench);
        assert_eq!(svc.list(Some("ops")).await.unwrap().len(), 1);
    }
}
