//! `metadata` service: reference data lookups.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::composition::Services;
use crate::rpc::protocol::{params, result, RpcError};
use crate::rpc::server::RpcService;
use crate::service::{MetadataFilter, MetadataService};

pub struct MetadataRpc {
    metadata: Arc<MetadataService>,
}

impl MetadataRpc {
    pub const NAME: &'static str = "metadata";

    pub fn new(services: &Services) -> Self {
        Self {
            metadata: Arc::clone(&services.metadata),
        }
    }
}

#[async_trait]
impl RpcService for MetadataRpc {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn call(&self, method: &str, args: Value) -> Result<Value, RpcError> {
        match method {
            "get" => {
                let filter: MetadataFilter = params(args)?;
                result(&self.metadata.get(&filter).await?)
            }
            "reload" => {
                let entries = self.metadata.reload().await?;
                Ok(json!({ "entries": entries.len() }))
            }
            _ => Err(RpcError::UnknownMethod {
                service: Self::NAME.to_string(),
                method: method.to_string(),
            }),
        }
    }
}
