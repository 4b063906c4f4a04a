//! Query validation against reference data.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::registrar::{layer, RouteLayer};
use crate::service::MetadataService;

#[derive(Clone)]
pub struct QueryGuard {
    metadata: Arc<MetadataService>,
    keys: &'static [&'static str],
}

pub async fn query_middleware(
    State(guard): State<QueryGuard>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let params = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map(|Query(p)| p)
        .unwrap_or_default();

    let rejected: Vec<String> = guard
        .keys
        .iter()
        .filter_map(|key| {
            let value = params.get(*key)?;
            (!guard.metadata.is_known(key, value)).then(|| format!("{key}={value}"))
        })
        .collect();

    if rejected.is_empty() {
        return next.run(req).await;
    }
    tracing::debug!(rejected = ?rejected, "Unknown metadata values in query");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "unknown values", "rejected": rejected })),
    )
        .into_response()
}

/// Reject requests whose values for `keys` are not known metadata values.
pub fn validate_query(metadata: Arc<MetadataService>, keys: &'static [&'static str]) -> RouteLayer {
    layer(from_fn_with_state(QueryGuard { metadata, keys }, query_middleware))
}
