//! Reference data (departments, skills, ...) with an in-process snapshot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Deserialize;

use crate::domain::MetadataEntry;
use crate::repo::Repository;
use crate::service::ServiceResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataFilter {
    pub key: Option<String>,
}

pub struct MetadataService {
    repo: Arc<dyn Repository<MetadataEntry>>,
    snapshot: ArcSwapOption<Vec<MetadataEntry>>,
}

impl MetadataService {
    pub fn new(repo: Arc<dyn Repository<MetadataEntry>>) -> Self {
        Self {
            repo,
            snapshot: ArcSwapOption::empty(),
        }
    }

    /// Entries matching `filter`. The first call loads and keeps a snapshot.
    pub async fn get(&self, filter: &MetadataFilter) -> ServiceResult<Vec<MetadataEntry>> {
        let entries = match self.snapshot.load_full() {
            Some(entries) => entries,
            None => self.reload().await?,
        };
        Ok(entries
            .iter()
            .filter(|e| filter.key.as_ref().map_or(true, |k| &e.key == k))
            .cloned()
            .collect())
    }

    /// Replace the snapshot from the repository.
    pub async fn reload(&self) -> ServiceResult<Arc<Vec<MetadataEntry>>> {
        let entries = Arc::new(self.repo.list().await?);
        self.snapshot.store(Some(Arc::clone(&entries)));
        tracing::debug!(entries = entries.len(), "Metadata snapshot loaded");
        Ok(entries)
    }

    pub fn is_warm(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Whether `value` is a known value for `key`.
    ///
    /// Keys absent from the snapshot are unrestricted. Before warm-up every value is accepted.
    pub fn is_known(&self, key: &str, value: &str) -> bool {
        let guard = self.snapshot.load();
        let Some(entries) = &*guard else {
            return true;
        };
        let mut values = entries.iter().filter(|e| e.key == key).peekable();
        if values.peek().is_none() {
            return true;
        }
        values.any(|e| e.value == value)
    }
}
