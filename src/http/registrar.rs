//! Route registration.
//!
//! # Responsibilities
//! - Build one endpoint from (method, path, query constraints, middleware, handler)
//! - Keep middleware scoped to the route that declared it
//! - Realize the table into an axum `Router`
//!
//! # Data Flow
//! ```text
//! register(..)        → Route (attached to the table when a handler is given)
//! RouteTable          → grouped by path, registration order kept
//! into_router()       → one axum route per path; a dispatcher picks the
//!                       first candidate whose method and query match
//! ```
//!
//! # Design Decisions
//! - Routes sharing a path are siblings, never nested: a sibling's middleware
//!   is not on the path of a request that does not match it
//! - Duplicates, malformed paths and capture conflicts are reported when the
//!   table is realized, not at registration
//! - Middleware is ordinary axum/tower layers wrapped around the route's own endpoint

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, Request};
use axum::handler::Handler;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter, Route as LayeredRoute};
use axum::Router;
use thiserror::Error;
use tower::{Layer, Service, ServiceExt};

/// A route's terminal service: the handler, then the route's layers around it.
pub type Endpoint = MethodRouter;

/// Wrap an axum handler (and its state) as an [`Endpoint`].
pub fn handler<H, T, S>(h: H, state: S) -> Endpoint
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    any(h).with_state(state)
}

/// One link in a route's middleware chain, applied to that route's endpoint only.
pub type RouteLayer = Arc<dyn Fn(Endpoint) -> Endpoint + Send + Sync>;

/// Turn any tower layer axum accepts (`from_fn`, `from_fn_with_state`, ...)
/// into a [`RouteLayer`].
pub fn layer<L>(layer: L) -> RouteLayer
where
    L: Layer<LayeredRoute> + Clone + Send + Sync + 'static,
    L::Service: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request>>::Response: IntoResponse + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    Arc::new(move |endpoint: Endpoint| endpoint.layer(layer.clone()))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum QueryPattern {
    /// Key must be present with any value (`{name}`).
    Present,
    Exact(String),
}

impl QueryPattern {
    fn parse(value: &str) -> Self {
        if value.len() > 2 && value.starts_with('{') && value.ends_with('}') {
            QueryPattern::Present
        } else {
            QueryPattern::Exact(value.to_string())
        }
    }

    fn matches(&self, value: Option<&String>) -> bool {
        match (self, value) {
            (_, None) => false,
            (QueryPattern::Present, Some(_)) => true,
            (QueryPattern::Exact(expected), Some(actual)) => expected == actual,
        }
    }
}

/// A single endpoint.
#[derive(Clone)]
pub struct Route {
    /// `None` matches every method.
    method: Option<Method>,
    path: String,
    query: Vec<(String, QueryPattern)>,
    layers: Arc<[RouteLayer]>,
    /// Handler wrapped in `layers`, present once attached.
    endpoint: Option<Endpoint>,
}

impl Route {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.endpoint.is_some()
    }

    fn accepts_method(&self, method: &Method) -> bool {
        self.method.as_ref().map_or(true, |m| m == method)
    }

    fn accepts_query(&self, params: &HashMap<String, String>) -> bool {
        self.query
            .iter()
            .all(|(key, pattern)| pattern.matches(params.get(key)))
    }

    fn signature(&self) -> (Option<String>, Vec<(String, QueryPattern)>) {
        let mut query = self.query.clone();
        query.sort();
        (self.method.as_ref().map(|m| m.to_string()), query)
    }

    async fn serve(&self, req: Request<Body>) -> Response {
        let Some(endpoint) = &self.endpoint else {
            return StatusCode::NOT_FOUND.into_response();
        };
        match endpoint.clone().oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("layers", &self.layers.len())
            .field("attached", &self.endpoint.is_some())
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("duplicate route: {method} {path}")]
    Duplicate { method: String, path: String },
    #[error("invalid method {0:?}")]
    InvalidMethod(String),
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("route {path} conflicts with {existing}: captures differ at the same segment")]
    Conflict { path: String, existing: String },
}

/// Check one path against what the axum router accepts.
fn check_path(path: &str) -> Result<(), RouteError> {
    let invalid = |reason| RouteError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    let segments: Vec<&str> = path[1..].split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') || segment.starts_with('*') {
            return Err(invalid("use {name} or {*name} for captures"));
        }
        if !segment.contains(['{', '}']) {
            continue;
        }
        let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            return Err(invalid("a capture must span the whole segment"));
        };
        let name = name.strip_prefix('*').unwrap_or(name);
        if name.is_empty() || name.contains(['{', '}', '*']) {
            return Err(invalid("malformed capture name"));
        }
        if segment.starts_with("{*") && i + 1 != segments.len() {
            return Err(invalid("a catch-all capture must be the last segment"));
        }
    }
    Ok(())
}

/// Capture segments keyed by the shape of the path before them.
///
/// Two paths conflict when they put differently named captures after the
/// same prefix, e.g. `/x/{id}` and `/x/{name}/y`.
#[derive(Default)]
struct CaptureIndex {
    captures: HashMap<String, (String, String)>,
}

impl CaptureIndex {
    fn insert(&mut self, path: &str) -> Result<(), RouteError> {
        let mut shape = String::new();
        for segment in path[1..].split('/') {
            if segment.starts_with('{') {
                match self.captures.get(&shape) {
                    Some((capture, existing)) if capture != segment => {
                        return Err(RouteError::Conflict {
                            path: path.to_string(),
                            existing: existing.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        self.captures
                            .insert(shape.clone(), (segment.to_string(), path.to_string()));
                    }
                }
                shape.push_str(if segment.starts_with("{*") { "/{*}" } else { "/{}" });
            } else {
                shape.push('/');
                shape.push_str(segment);
            }
        }
        Ok(())
    }
}

/// Routes in registration order.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Add a route built without a handler, now that it has one.
    ///
    /// The first layer ends up outermost.
    pub fn attach(&mut self, mut route: Route, handler: Endpoint) -> Route {
        let endpoint = route.layers.iter().rev().fold(handler, |endpoint, layer| layer(endpoint));
        route.endpoint = Some(endpoint);
        self.routes.push(route.clone());
        route
    }

    /// Realize the table as an axum router.
    pub fn into_router(self) -> Result<Router, RouteError> {
        let mut by_path: BTreeMap<String, Vec<Route>> = BTreeMap::new();
        let mut captures = CaptureIndex::default();
        for route in self.routes {
            if !by_path.contains_key(&route.path) {
                check_path(&route.path)?;
                captures.insert(&route.path)?;
            }
            let siblings = by_path.entry(route.path.clone()).or_default();
            if siblings.iter().any(|r| r.signature() == route.signature()) {
                return Err(RouteError::Duplicate {
                    method: route
                        .method
                        .as_ref()
                        .map_or_else(|| "*".to_string(), |m| m.to_string()),
                    path: route.path,
                });
            }
            siblings.push(route);
        }

        let mut router = Router::new();
        for (path, routes) in by_path {
            let routes: Arc<[Route]> = routes.into();
            router = router.route(
                &path,
                any(move |req: Request<Body>| dispatch(Arc::clone(&routes), req)),
            );
        }
        Ok(router)
    }
}

async fn dispatch(routes: Arc<[Route]>, req: Request<Body>) -> Response {
    let params = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    let mut method_seen = false;
    for route in routes.iter() {
        if !route.accepts_method(req.method()) {
            continue;
        }
        method_seen = true;
        if route.accepts_query(&params) {
            return route.serve(req).await;
        }
    }

    if method_seen {
        StatusCode::NOT_FOUND.into_response()
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

/// Build a route and, when `handler` is given, add it to `table`.
///
/// An empty or `*` method matches every method. `query` values are exact
/// matches except `{name}`, which only requires the key. Layers run
/// first-to-last before the handler and only for this route.
pub fn register(
    table: &mut RouteTable,
    method: &str,
    path: &str,
    query: &[(&str, &str)],
    handler: Option<Endpoint>,
    layers: Vec<RouteLayer>,
) -> Result<Route, RouteError> {
    let method = match method {
        "" | "*" => None,
        m => Some(
            Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| RouteError::InvalidMethod(m.to_string()))?,
        ),
    };
    let route = Route {
        method,
        path: path.to_string(),
        query: query
            .iter()
            .map(|(k, v)| (k.to_string(), QueryPattern::parse(v)))
            .collect(),
        layers: layers.into(),
        endpoint: None,
    };

    Ok(match handler {
        Some(handler) => table.attach(route, handler),
        None => route,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::middleware::{from_fn, Next};
    use std::sync::Mutex;

    fn text(body: &'static str) -> Endpoint {
        handler(move || async move { body }, ())
    }

    /// Layer that appends `tag` to a shared trace.
    fn tracer(tag: &'static str, trace: &Arc<Mutex<Vec<String>>>) -> RouteLayer {
        let trace = Arc::clone(trace);
        layer(from_fn(move |req: Request, next: Next| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(tag.to_string());
                next.run(req).await
            }
        }))
    }

    async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn middleware_runs_in_declared_order_before_handler() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut table = RouteTable::new();
        let recorder = Arc::clone(&trace);
        let terminal = handler(
            move || {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().unwrap().push("handler".to_string());
                    "done"
                }
            },
            (),
        );
        register(
            &mut table,
            "GET",
            "/x",
            &[],
            Some(terminal),
            vec![tracer("m1", &trace), tracer("m2", &trace)],
        )
        .unwrap();

        let router = table.into_router().unwrap();
        let (status, body) = send(&router, Method::GET, "/x").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done");
        assert_eq!(*trace.lock().unwrap(), vec!["m1", "m2", "handler"]);
    }

    #[tokio::test]
    async fn sibling_middleware_is_isolated() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut table = RouteTable::new();
        register(&mut table, "GET", "/x", &[], Some(text("read")), vec![]).unwrap();
        register(&mut table, "POST", "/x", &[], Some(text("write")), vec![tracer("guard", &trace)]).unwrap();

        let router = table.into_router().unwrap();
        assert_eq!(send(&router, Method::GET, "/x").await.1, "read");
        assert!(trace.lock().unwrap().is_empty());

        assert_eq!(send(&router, Method::POST, "/x").await.1, "write");
        assert_eq!(*trace.lock().unwrap(), vec!["guard"]);
    }

    #[tokio::test]
    async fn layers_stay_on_their_own_path() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut table = RouteTable::new();
        register(&mut table, "GET", "/guarded", &[], Some(text("guarded")), vec![tracer("guard", &trace)]).unwrap();
        register(&mut table, "GET", "/open", &[], Some(text("open")), vec![]).unwrap();
        register(&mut table, "GET", "/items/{id}", &[], Some(text("item")), vec![tracer("items", &trace)]).unwrap();

        let router = table.into_router().unwrap();
        assert_eq!(send(&router, Method::GET, "/open").await.1, "open");
        assert!(trace.lock().unwrap().is_empty());

        assert_eq!(send(&router, Method::GET, "/items/7").await.1, "item");
        assert_eq!(send(&router, Method::GET, "/guarded").await.1, "guarded");
        assert_eq!(*trace.lock().unwrap(), vec!["items", "guard"]);
    }

    #[tokio::test]
    async fn path_captures_reach_the_handler() {
        use axum::extract::Path;

        let mut table = RouteTable::new();
        register(
            &mut table,
            "GET",
            "/people/{id}",
            &[],
            Some(handler(|Path(id): Path<u32>| async move { format!("person {id}") }, ())),
            vec![],
        )
        .unwrap();

        let router = table.into_router().unwrap();
        assert_eq!(send(&router, Method::GET, "/people/42").await.1, "person 42");
    }

    #[test]
    fn paths_without_leading_slash_are_rejected() {
        let mut table = RouteTable::new();
        register(&mut table, "GET", "users", &[], Some(text("users")), vec![]).unwrap();
        assert!(matches!(
            table.into_router().unwrap_err(),
            RouteError::InvalidPath { path, .. } if path == "users"
        ));

        for path in ["/old/:id", "/x/pre{id}", "/x/{}", "/files/{*rest}/tail"] {
            let mut table = RouteTable::new();
            register(&mut table, "GET", path, &[], Some(text("x")), vec![]).unwrap();
            assert!(
                matches!(table.into_router(), Err(RouteError::InvalidPath { .. })),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn differently_named_captures_conflict() {
        let mut table = RouteTable::new();
        register(&mut table, "GET", "/x/{id}", &[], Some(text("by id")), vec![]).unwrap();
        register(&mut table, "POST", "/x/{name}", &[], Some(text("by name")), vec![]).unwrap();
        assert_eq!(
            table.into_router().unwrap_err(),
            RouteError::Conflict {
                path: "/x/{name}".into(),
                existing: "/x/{id}".into()
            }
        );

        let mut table = RouteTable::new();
        register(&mut table, "GET", "/x/{id}", &[], Some(text("item")), vec![]).unwrap();
        register(&mut table, "GET", "/x/{id}/tags", &[], Some(text("tags")), vec![]).unwrap();
        register(&mut table, "GET", "/x/new", &[], Some(text("new")), vec![]).unwrap();
        register(&mut table, "GET", "/y/{name}", &[], Some(text("other")), vec![]).unwrap();
        assert!(table.into_router().is_ok());
    }

    #[tokio::test]
    async fn query_constraints_select_the_route() {
        let mut table = RouteTable::new();
        register(&mut table, "GET", "/users", &[("role", "admin")], Some(text("admins")), vec![]).unwrap();
        register(&mut table, "GET", "/users", &[("team", "{team}")], Some(text("team")), vec![]).unwrap();
        register(&mut table, "GET", "/users", &[], Some(text("all")), vec![]).unwrap();

        let router = table.into_router().unwrap();
        assert_eq!(send(&router, Method::GET, "/users?role=admin").await.1, "admins");
        assert_eq!(send(&router, Method::GET, "/users?team=blue").await.1, "team");
        assert_eq!(send(&router, Method::GET, "/users?role=user").await.1, "all");
        assert_eq!(send(&router, Method::GET, "/users").await.1, "all");
    }

    #[tokio::test]
    async fn unmatched_query_or_method() {
        let mut table = RouteTable::new();
        register(&mut table, "GET", "/only", &[("role", "admin")], Some(text("ok")), vec![]).unwrap();

        let router = table.into_router().unwrap();
        assert_eq!(send(&router, Method::GET, "/only").await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(&router, Method::DELETE, "/only").await.0, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(send(&router, Method::GET, "/missing").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wildcard_method_matches_everything() {
        let mut table = RouteTable::new();
        register(&mut table, "*", "/any", &[], Some(text("any")), vec![]).unwrap();
        register(&mut table, "", "/blank", &[], Some(text("blank")), vec![]).unwrap();

        let router = table.into_router().unwrap();
        for method in [Method::GET, Method::POST, Method::PATCH] {
            assert_eq!(send(&router, method.clone(), "/any").await.1, "any");
            assert_eq!(send(&router, method, "/blank").await.1, "blank");
        }
    }

    #[test]
    fn missing_handler_leaves_table_untouched() {
        let mut table = RouteTable::new();
        let route = register(&mut table, "GET", "/later", &[], None, vec![]).unwrap();
        assert!(table.is_empty());
        assert!(!route.is_attached());

        let attached = table.attach(route, text("now"));
        assert!(attached.is_attached());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicates_are_reported_on_realization() {
        let mut table = RouteTable::new();
        register(&mut table, "GET", "/d", &[("a", "1"), ("b", "2")], Some(text("one")), vec![]).unwrap();
        register(&mut table, "get", "/d", &[("b", "2"), ("a", "1")], Some(text("two")), vec![]).unwrap();

        let err = table.into_router().unwrap_err();
        assert_eq!(
            err,
            RouteError::Duplicate {
                method: "GET".into(),
                path: "/d".into()
            }
        );
    }

    #[test]
    fn malformed_method_is_rejected() {
        let mut table = RouteTable::new();
        let err = register(&mut table, "GE T", "/x", &[], None, vec![]).unwrap_err();
        assert_eq!(err, RouteError::InvalidMethod("GE T".into()));
    }
}
