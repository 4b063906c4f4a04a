//! Per-entity request handlers.
//!
//! Handlers are thin: extract, call one service, render JSON.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::composition::Services;
use crate::domain::{Client, Employee, MetadataEntry, Need, NeedStatus, Project, UtilizationRow};
use crate::http::response::{ApiError, ApiResult};
use crate::service::bench::BenchSummary;
use crate::service::client::ClientDetail;
use crate::service::employee::EmployeeDetail;
use crate::service::need::NeedView;
use crate::service::project::ProjectDetail;
use crate::service::tagging::TaggingView;
use crate::service::MetadataFilter;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(State(services): State<Services>, Json(body): Json<LoginRequest>) -> Response {
    match services.auth.login(&body.email, &body.password).await {
        Ok(session) => Json(json!({
            "token": session.token,
            "expires_at": session.expires_at,
            "role": session.principal.role,
        }))
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn logout(State(services): State<Services>, headers: HeaderMap) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) => match services.auth.logout(token.trim()).await {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(e) => ApiError::from(e).into_response(),
        },
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeQuery {
    pub department: Option<String>,
}

pub async fn list_employees(
    State(services): State<Services>,
    Query(query): Query<EmployeeQuery>,
) -> ApiResult<Vec<Employee>> {
    Ok(Json(services.employee.list(query.department.as_deref()).await?))
}

pub async fn get_employee(State(services): State<Services>, Path(id): Path<i64>) -> ApiResult<EmployeeDetail> {
    Ok(Json(services.employee.get(id).await?))
}

pub async fn list_clients(State(services): State<Services>) -> ApiResult<Vec<Client>> {
    Ok(Json(services.client.list().await?))
}

pub async fn get_client(State(services): State<Services>, Path(id): Path<i64>) -> ApiResult<ClientDetail> {
    Ok(Json(services.client.get(id).await?))
}

pub async fn save_client(State(services): State<Services>, Json(client): Json<Client>) -> Response {
    match services.client.save(&client).await {
        Ok(()) => (StatusCode::CREATED, Json(client)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn list_projects(State(services): State<Services>) -> ApiResult<Vec<Project>> {
    Ok(Json(services.project.list().await?))
}

pub async fn get_project(State(services): State<Services>, Path(id): Path<i64>) -> ApiResult<ProjectDetail> {
    Ok(Json(services.project.detail(id).await?))
}

pub async fn bench(State(services): State<Services>) -> ApiResult<BenchSummary> {
    Ok(Json(services.bench.roster(Utc::now().date_naive()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct NeedQuery {
    pub status: Option<NeedStatus>,
}

pub async fn list_needs(State(services): State<Services>, Query(query): Query<NeedQuery>) -> ApiResult<Vec<NeedView>> {
    Ok(Json(services.need.list(query.status).await?))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub employee_id: i64,
}

pub async fn assign_need(
    State(services): State<Services>,
    Path(id): Path<i64>,
    Json(body): Json<AssignRequest>,
) -> ApiResult<Need> {
    Ok(Json(services.need.assign(id, body.employee_id).await?))
}

pub async fn list_taggings(State(services): State<Services>) -> ApiResult<Vec<TaggingView>> {
    Ok(Json(services.tagging.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct EndingQuery {
    pub ending_within: u32,
}

pub async fn taggings_ending(
    State(services): State<Services>,
    Query(query): Query<EndingQuery>,
) -> ApiResult<Vec<TaggingView>> {
    Ok(Json(
        services
            .tagging
            .ending_within(Utc::now().date_naive(), query.ending_within)
            .await?,
    ))
}

pub async fn metadata(
    State(services): State<Services>,
    Query(filter): Query<MetadataFilter>,
) -> ApiResult<Vec<MetadataEntry>> {
    Ok(Json(services.metadata.get(&filter).await?))
}

pub async fn reload_metadata(State(services): State<Services>) -> Response {
    match services.metadata.reload().await {
        Ok(entries) => Json(json!({ "entries": entries.len() })).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UtilizationQuery {
    pub on: Option<NaiveDate>,
    pub department: Option<String>,
}

pub async fn utilization(
    State(services): State<Services>,
    Query(query): Query<UtilizationQuery>,
) -> ApiResult<Vec<UtilizationRow>> {
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(services.report.utilization(on, query.department.as_deref()).await?))
}
