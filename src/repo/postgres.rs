//! PostgreSQL implementations of the repository traits.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_postgres::Row;

use crate::domain::{Credential, Entity, Session, UtilizationRow};
use crate::repo::{AuthRepository, RepoError, ReportRepository, Repository};
use crate::store::Store;

/// A JSONB table holding one entity type.
pub struct PgRepository<E> {
    store: Store,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgRepository<E> {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    fn decode(row: &Row) -> Result<E, RepoError> {
        let data: serde_json::Value = row.try_get("data")?;
        serde_json::from_value(data).map_err(|source| RepoError::Decode {
            table: E::TABLE,
            source,
        })
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for PgRepository<E> {
    async fn list(&self) -> Result<Vec<E>, RepoError> {
        let client = self.store.client().await?;
        let sql = format!("SELECT data FROM {} ORDER BY id", E::TABLE);
        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter().map(Self::decode).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<E>, RepoError> {
        let client = self.store.client().await?;
        let sql = format!("SELECT data FROM {} WHERE id = $1", E::TABLE);
        let row = client.query_opt(sql.as_str(), &[&id]).await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn save(&self, entity: &E) -> Result<(), RepoError> {
        let data = serde_json::to_value(entity).map_err(|source| RepoError::Decode {
            table: E::TABLE,
            source,
        })?;
        let client = self.store.client().await?;
        let sql = format!(
            "INSERT INTO {} (id, data) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
            E::TABLE
        );
        client.execute(sql.as_str(), &[&entity.id(), &data]).await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let client = self.store.client().await?;
        let sql = format!("DELETE FROM {} WHERE id = $1", E::TABLE);
        Ok(client.execute(sql.as_str(), &[&id]).await? > 0)
    }
}

pub struct PgAuthRepository {
    store: Store,
}

impl PgAuthRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthRepository for PgAuthRepository {
    async fn find_credential(&self, email: &str) -> Result<Option<Credential>, RepoError> {
        let client = self.store.client().await?;
        let row = client
            .query_opt("SELECT data FROM credentials WHERE data->>'email' = $1", &[&email])
            .await?;
        row.as_ref().map(PgRepository::<Credential>::decode).transpose()
    }

    async fn save_session(&self, session: &Session) -> Result<(), RepoError> {
        let data = serde_json::to_value(session).map_err(|source| RepoError::Decode {
            table: "sessions",
            source,
        })?;
        let client = self.store.client().await?;
        client
            .execute(
                "INSERT INTO sessions (token, data, expires_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (token) DO UPDATE SET data = EXCLUDED.data, expires_at = EXCLUDED.expires_at",
                &[&session.token, &data, &session.expires_at],
            )
            .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, RepoError> {
        let client = self.store.client().await?;
        let row = client
            .query_opt("SELECT data FROM sessions WHERE token = $1", &[&token])
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let data: serde_json::Value = row.try_get("data")?;
        serde_json::from_value(data)
            .map(Some)
            .map_err(|source| RepoError::Decode {
                table: "sessions",
                source,
            })
    }

    async fn delete_session(&self, token: &str) -> Result<(), RepoError> {
        let client = self.store.client().await?;
        client
            .execute("DELETE FROM sessions WHERE token = $1", &[&token])
            .await?;
        Ok(())
    }
}

pub struct PgReportRepository {
    store: Store,
}

impl PgReportRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

const UTILIZATION_SQL: &str = "
SELECT COALESCE(e.data->>'department', 'unassigned') AS department,
       COUNT(DISTINCT e.id) AS headcount,
       COUNT(DISTINCT t.data->>'employee_id') AS allocated
FROM employees e
LEFT JOIN taggings t
       ON (t.data->>'employee_id')::BIGINT = e.id
      AND (t.data->>'start_date')::DATE <= $1::TEXT::DATE
      AND (t.data->>'end_date' IS NULL OR (t.data->>'end_date')::DATE >= $1::TEXT::DATE)
WHERE COALESCE((e.data->>'active')::BOOLEAN, TRUE)
GROUP BY 1
ORDER BY 1";

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn utilization(&self, on: NaiveDate) -> Result<Vec<UtilizationRow>, RepoError> {
        let client = self.store.client().await?;
        // DATE travels as text; tokio-postgres is built without the chrono feature.
        let day = on.to_string();
        let rows = client.query(UTILIZATION_SQL, &[&day]).await?;
        rows.iter()
            .map(|row| {
                Ok(UtilizationRow {
                    department: row.try_get("department")?,
                    headcount: row.try_get("headcount")?,
                    allocated: row.try_get("allocated")?,
                })
            })
            .collect()
    }
}
