//! Schema migrations and seed data.
//!
//! Migration files are named `<version>.up.sql` / `<version>.down.sql` and are
//! applied in lexical version order. Applied versions are recorded in
//! `schema_migrations`; each file runs in its own transaction.

use std::path::{Path, PathBuf};

use crate::config::MigrationConfig;
use crate::store::{Store, StoreError};

const VERSIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

/// A migration version with its up/down scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: String,
    pub up: PathBuf,
    pub down: Option<PathBuf>,
}

/// Discover migrations in `dir`, sorted by version.
pub fn discover(dir: &Path) -> Result<Vec<Migration>, StoreError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StoreError::Migration(format!("cannot read {}: {}", dir.display(), e)))?;

    let mut migrations = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(version) = name.strip_suffix(".up.sql") {
            let down = dir.join(format!("{}.down.sql", version));
            migrations.push(Migration {
                version: version.to_string(),
                up: path.clone(),
                down: down.exists().then_some(down),
            });
        }
    }
    migrations.sort_by(|a, b| a.version.cmp(&b.version));
    Ok(migrations)
}

/// Seed files in `dir`, sorted by file name.
pub fn discover_seeds(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StoreError::Migration(format!("cannot read {}: {}", dir.display(), e)))?;
    let mut seeds: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    seeds.sort();
    Ok(seeds)
}

/// Apply pending migrations, or roll back applied ones when `config.down` is set.
///
/// Returns the number of files executed.
pub async fn migrate(store: &Store, config: &MigrationConfig, dir: &Path) -> Result<usize, StoreError> {
    let migrations = discover(dir)?;
    let mut client = store.client().await?;
    client.batch_execute(VERSIONS_TABLE).await?;

    let applied: Vec<String> = client
        .query("SELECT version FROM schema_migrations", &[])
        .await?
        .iter()
        .map(|row| row.get(0))
        .collect();

    let mut executed = 0;
    if config.down {
        for migration in migrations.iter().rev().filter(|m| applied.contains(&m.version)) {
            let Some(down) = &migration.down else {
                tracing::warn!(version = %migration.version, "No down script, skipping");
                continue;
            };
            let sql = read_script(down)?;
            let tx = client.transaction().await?;
            tx.batch_execute(&sql).await?;
            tx.execute("DELETE FROM schema_migrations WHERE version = $1", &[&migration.version])
                .await?;
            tx.commit().await?;
            log_applied(config, &migration.version, "down");
            executed += 1;
        }
    } else {
        for migration in migrations.iter().filter(|m| !applied.contains(&m.version)) {
            let sql = read_script(&migration.up)?;
            let tx = client.transaction().await?;
            tx.batch_execute(&sql).await?;
            tx.execute("INSERT INTO schema_migrations (version) VALUES ($1)", &[&migration.version])
                .await?;
            tx.commit().await?;
            log_applied(config, &migration.version, "up");
            executed += 1;
        }
    }

    tracing::info!(executed, down = config.down, "Migrations complete");
    Ok(executed)
}

/// Run every seed file. A failing file is logged and the rest still run.
///
/// Returns the number of files that failed.
pub async fn seed(store: &Store, dir: &Path) -> Result<usize, StoreError> {
    let seeds = discover_seeds(dir)?;
    let client = store.client().await?;

    let mut failed = 0;
    for path in &seeds {
        let result = match read_script(path) {
            Ok(sql) => client.batch_execute(&sql).await.map_err(StoreError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(file = %path.display(), error = %e, "Seed file failed");
            failed += 1;
        }
    }

    tracing::info!(files = seeds.len(), failed, "Seed data applied");
    Ok(failed)
}

fn read_script(path: &Path) -> Result<String, StoreError> {
    std::fs::read_to_string(path)
        .map_err(|e| StoreError::Migration(format!("cannot read {}: {}", path.display(), e)))
}

fn log_applied(config: &MigrationConfig, version: &str, direction: &str) {
    if config.verbose {
        tracing::info!(version, direction, "Migration applied");
    } else {
        tracing::debug!(version, direction, "Migration applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_in_version_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0002_needs.up.sql", "0001_init.up.sql", "0001_init.down.sql", "README.md"] {
            std::fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }

        let migrations = discover(dir.path()).unwrap();
        let versions: Vec<_> = migrations.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, vec!["0001_init", "0002_needs"]);
        assert!(migrations[0].down.is_some());
        assert!(migrations[1].down.is_none());
    }

    #[test]
    fn seeds_only_sql_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["20_projects.sql", "10_clients.sql", "notes.txt"] {
            std::fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }
        let seeds = discover_seeds(dir.path()).unwrap();
        let names: Vec<_> = seeds
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["10_clients.sql", "20_projects.sql"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(discover(Path::new("/nonexistent/migrations")).is_err());
    }
}
