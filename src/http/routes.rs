//! The route table served under `/api/v1`.

use std::sync::Arc;

use axum::Router;

use crate::composition::Services;
use crate::config::AppConfig;
use crate::http::handlers;
use crate::http::middleware::{require_role, require_session, validate_query};
use crate::http::registrar::{handler, register, RouteError, RouteLayer, RouteTable};

pub const API_PREFIX: &str = "/api/v1";

fn api(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

/// Register every endpoint and realize the table.
pub fn register_routes(config: &AppConfig, services: &Services) -> Result<Router, RouteError> {
    let s = services.clone();
    let session = require_session(Arc::clone(&services.auth), config.enabled.auth);
    let admin: Vec<RouteLayer> = vec![Arc::clone(&session), require_role("admin")];
    let signed_in = || vec![Arc::clone(&session)];

    let mut table = RouteTable::new();
    let t = &mut table;

    register(t, "GET", "/health", &[], Some(handler(handlers::health, ())), vec![])?;

    register(t, "POST", &api("/auth/login"), &[], Some(handler(handlers::login, s.clone())), vec![])?;
    register(t, "POST", &api("/auth/logout"), &[], Some(handler(handlers::logout, s.clone())), signed_in())?;

    register(
        t,
        "GET",
        &api("/employees"),
        &[],
        Some(handler(handlers::list_employees, s.clone())),
        vec![
            Arc::clone(&session),
            validate_query(Arc::clone(&services.metadata), &["department"]),
        ],
    )?;
    register(t, "GET", &api("/employees/{id}"), &[], Some(handler(handlers::get_employee, s.clone())), signed_in())?;

    register(t, "GET", &api("/clients"), &[], Some(handler(handlers::list_clients, s.clone())), signed_in())?;
    register(t, "POST", &api("/clients"), &[], Some(handler(handlers::save_client, s.clone())), admin.clone())?;
    register(t, "GET", &api("/clients/{id}"), &[], Some(handler(handlers::get_client, s.clone())), signed_in())?;

    register(t, "GET", &api("/projects"), &[], Some(handler(handlers::list_projects, s.clone())), signed_in())?;
    register(t, "GET", &api("/projects/{id}"), &[], Some(handler(handlers::get_project, s.clone())), signed_in())?;

    register(t, "GET", &api("/bench"), &[], Some(handler(handlers::bench, s.clone())), signed_in())?;

    register(t, "GET", &api("/needs"), &[], Some(handler(handlers::list_needs, s.clone())), signed_in())?;
    register(t, "POST", &api("/needs/{id}/assign"), &[], Some(handler(handlers::assign_need, s.clone())), admin.clone())?;

    register(
        t,
        "GET",
        &api("/taggings"),
        &[("ending_within", "{days}")],
        Some(handler(handlers::taggings_ending, s.clone())),
        signed_in(),
    )?;
    register(t, "GET", &api("/taggings"), &[], Some(handler(handlers::list_taggings, s.clone())), signed_in())?;

    register(t, "GET", &api("/metadata"), &[], Some(handler(handlers::metadata, s.clone())), signed_in())?;
    register(t, "POST", &api("/metadata/reload"), &[], Some(handler(handlers::reload_metadata, s.clone())), admin)?;

    register(
        t,
        "GET",
        &api("/reports/utilization"),
        &[],
        Some(handler(handlers::utilization, s)),
        vec![
            Arc::clone(&session),
            validate_query(Arc::clone(&services.metadata), &["department"]),
        ],
    )?;

    tracing::debug!(routes = table.len(), "Routes registered");
    table.into_router()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{Repositories, ServiceGraph};
    use crate::domain::{Credential, Employee, MetadataEntry};
    use crate::repo::memory::MemoryAuthRepository;
    use crate::repo::Repository;
    use crate::service::auth::hash_password;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn fixture(auth: bool) -> Router {
        let credentials = MemoryAuthRepository::new();
        credentials.add_credential(Credential {
            id: 1,
            email: "viewer@example.com".into(),
            password_sha256: hash_password("pw"),
            role: "viewer".into(),
        });
        let repos = Repositories::in_memory().with_auth(Arc::new(credentials));
        repos
            .metadata
            .save(&MetadataEntry { id: 1, key: "department".into(), value: "eng".into() })
            .await
            .unwrap();
        repos
            .employees
            .save(&Employee {
                id: 1,
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                department: Some("eng".into()),
                designation: None,
                active: true,
            })
            .await
            .unwrap();

        let mut config = AppConfig::default();
        config.enabled.auth = auth;
        let graph = ServiceGraph::build(&config, &repos, None);
        graph.services.metadata.reload().await.unwrap();
        register_routes(&config, &graph.services).unwrap()
    }

    #[tokio::test]
    async fn login_then_list_with_validation() {
        let router = fixture(true).await;

        assert_eq!(call(&router, Method::GET, "/health", None, None).await.0, StatusCode::OK);
        assert_eq!(
            call(&router, Method::GET, "/api/v1/employees", None, None).await.0,
            StatusCode::UNAUTHORIZED
        );

        let (status, session) = call(
            &router,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(serde_json::json!({ "email": "viewer@example.com", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = session["token"].as_str().unwrap().to_string();

        let (status, employees) = call(&router, Method::GET, "/api/v1/employees?department=eng", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(employees.as_array().unwrap().len(), 1);

        let (status, _) = call(&router, Method::GET, "/api/v1/employees?department=sales", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &router,
            Method::POST,
            "/api/v1/clients",
            Some(&token),
            Some(serde_json::json!({ "id": 9, "name": "Acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn auth_toggle_off_lets_requests_through() {
        let router = fixture(false).await;
        let (status, detail) = call(&router, Method::GET, "/api/v1/employees/1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["name"], "Ravi");

        let (status, _) = call(&router, Method::GET, "/api/v1/employees/42", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&router, Method::GET, "/api/v1/taggings?ending_within=7", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
