//! In-process repository implementations.
//!
//! Used when the process runs without a store (tests, local demos).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use crate::domain::{Credential, Employee, Entity, Session, Tagging, UtilizationRow};
use crate::repo::{AuthRepository, RepoError, ReportRepository, Repository};

/// A DashMap keyed by entity id.
pub struct MemoryRepository<E> {
    rows: Arc<DashMap<i64, E>>,
}

impl<E: Entity> MemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
        }
    }

    pub fn with_rows(rows: impl IntoIterator<Item = E>) -> Self {
        let repo = Self::new();
        for row in rows {
            repo.rows.insert(row.id(), row);
        }
        repo
    }
}

impl<E: Entity> Default for MemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for MemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E> {
    async fn list(&self) -> Result<Vec<E>, RepoError> {
        let mut rows: Vec<E> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|e| e.id());
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<E>, RepoError> {
        Ok(self.rows.get(&id).map(|r| r.value().clone()))
    }

    async fn save(&self, entity: &E) -> Result<(), RepoError> {
        self.rows.insert(entity.id(), entity.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.rows.remove(&id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct MemoryAuthRepository {
    credentials: Arc<DashMap<String, Credential>>,
    sessions: Arc<DashMap<String, Session>>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_credential(&self, credential: Credential) {
        self.credentials.insert(credential.email.clone(), credential);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl AuthRepository for MemoryAuthRepository {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, RepoError> {
        Ok(self.credentials.get(email).map(|c| c.value().clone()))
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepoError> {
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, RepoError> {
        Ok(self.sessions.get(token).map(|s| s.value().clone()))
    }

    async fn delete_session(&self, token: &str) -> Result<(), RepoError> {
        self.sessions.remove(token);
        Ok(())
    }
}

/// Computes the utilization report from in-memory employee and tagging tables.
#[derive(Clone, Default)]
pub struct MemoryReportRepository {
    employees: MemoryRepository<Employee>,
    taggings: MemoryRepository<Tagging>,
}

impl MemoryReportRepository {
    pub fn new(employees: MemoryRepository<Employee>, taggings: MemoryRepository<Tagging>) -> Self {
        Self { employees, taggings }
    }
}

#[async_trait]
impl ReportRepository for MemoryReportRepository {
    async fn utilization(&self, on: NaiveDate) -> Result<Vec<UtilizationRow>, RepoError> {
        let employees = self.employees.list().await?;
        let taggings = self.taggings.list().await?;

        let mut rows: Vec<UtilizationRow> = Vec::new();
        for employee in employees.iter().filter(|e| e.active) {
            let department = employee
                .department
                .clone()
                .unwrap_or_else(|| "unassigned".to_string());
            let allocated = taggings
                .iter()
                .any(|t| t.employee_id == employee.id && t.is_active_on(on));

            let idx = match rows.iter().position(|r| r.department == department) {
                Some(idx) => idx,
                None => {
                    rows.push(UtilizationRow { department, headcount: 0, allocated: 0 });
                    rows.len() - 1
                }
            };
            rows[idx].headcount += 1;
            if allocated {
                rows[idx].allocated += 1;
            }
        }
        rows.sort_by(|a, b| a.department.cmp(&b.department));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Client;

    #[tokio::test]
    async fn save_list_delete() {
        let repo = MemoryRepository::<Client>::new();
        for id in [3, 1, 2] {
            repo.save(&Client { id, name: format!("c{id}"), country: None }).await.unwrap();
        }
        let ids: Vec<_> = repo.list().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(repo.delete(2).await.unwrap());
        assert!(!repo.delete(2).await.unwrap());
        assert!(repo.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn utilization_groups_by_department() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let employees = MemoryRepository::with_rows([
            Employee { id: 1, name: "a".into(), email: "a@x".into(), department: Some("eng".into()), designation: None, active: true },
            Employee { id: 2, name: "b".into(), email: "b@x".into(), department: Some("eng".into()), designation: None, active: true },
            Employee { id: 3, name: "c".into(), email: "c@x".into(), department: None, designation: None, active: true },
        ]);
        let taggings = MemoryRepository::with_rows([Tagging {
            id: 1,
            employee_id: 1,
            project_id: 9,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            allocation: 100,
        }]);

        let rows = MemoryReportRepository::new(employees, taggings).utilization(day).await.unwrap();
        assert_eq!(
            rows,
            vec![
                UtilizationRow { department: "eng".into(), headcount: 2, allocated: 1 },
                UtilizationRow { department: "unassigned".into(), headcount: 1, allocated: 0 },
            ]
        );
    }
}
