//! Request handlers

use crate::dto::{
    AddUrlsBody, CreateProjectBody, ExportBody, ExportParams, HealthResponse, RescanResponse, StartScanBody,
};
use crate::error::{reject, ApiError};
use crate::AppState;
use a11y_core::{RenderedReport, ReportFormat, ReportRequest, ResultParams, ResultQuery, ScanRequest};
use a11y_types::{ProjectId, ScanId};
use std::convert::Infallible;
use warp::http::{header, Response, StatusCode};
use warp::{Rejection, Reply};

type HandlerResult = Result<warp::reply::Response, Rejection>;

fn json_with_status<T: serde::Serialize>(body: &T, status: StatusCode) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

pub(crate) async fn health() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&HealthResponse {
        status: "ok",
        version: crate::VERSION,
    }))
}

pub(crate) async fn create_project(body: CreateProjectBody, state: AppState) -> HandlerResult {
    let details = state.projects.create_project(body.into()).await.map_err(reject)?;
    Ok(json_with_status(&details, StatusCode::CREATED))
}

pub(crate) async fn list_projects(state: AppState) -> HandlerResult {
    let projects = state.projects.list_projects().await.map_err(reject)?;
    Ok(warp::reply::json(&projects).into_response())
}

pub(crate) async fn get_project(id: ProjectId, state: AppState) -> HandlerResult {
    let details = state.projects.get_project(id).await.map_err(reject)?;
    Ok(warp::reply::json(&details).into_response())
}

pub(crate) async fn add_project_urls(
    id: ProjectId,
    body: AddUrlsBody,
    state: AppState,
) -> HandlerResult {
    let details = state.projects.add_urls(id, body.urls).await.map_err(reject)?;
    Ok(warp::reply::json(&details).into_response())
}

pub(crate) async fn list_project_scans(id: ProjectId, state: AppState) -> HandlerResult {
    let scans = state.projects.list_scans(id).await.map_err(reject)?;
    Ok(warp::reply::json(&scans).into_response())
}

pub(crate) async fn project_results(
    id: ProjectId,
    params: ResultParams,
    state: AppState,
) -> HandlerResult {
    let query = ResultQuery::try_from(params).map_err(reject)?;
    let page = state
        .projects
        .project_results(id, &query)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&page).into_response())
}

pub(crate) async fn rescan_project(id: ProjectId, state: AppState) -> HandlerResult {
    let started = state.orchestrator.rescan_project(id).await.map_err(reject)?;
    let response = RescanResponse {
        project_id: id,
        scans: started.into_iter().map(|s| s.scan).collect(),
    };
    Ok(json_with_status(&response, StatusCode::ACCEPTED))
}

pub(crate) async fn start_scan(body: StartScanBody, state: AppState) -> HandlerResult {
    let request = ScanRequest::from(body);
    let started = state.orchestrator.start_scan(request).await.map_err(reject)?;
    // the handle is dropped; clients poll GET /scans/{id}
    Ok(json_with_status(&started.scan, StatusCode::ACCEPTED))
}

pub(crate) async fn get_scan(id: ScanId, state: AppState) -> HandlerResult {
    let scan = state.projects.get_scan(id).await.map_err(reject)?;
    Ok(warp::reply::json(&scan).into_response())
}

pub(crate) async fn scan_results(id: ScanId, state: AppState) -> HandlerResult {
    let results = state.projects.scan_results(id).await.map_err(reject)?;
    Ok(warp::reply::json(&results).into_response())
}

pub(crate) async fn export_query(params: ExportParams, state: AppState) -> HandlerResult {
    let format: ReportFormat = params
        .format
        .as_deref()
        .unwrap_or("json")
        .parse()
        .map_err(reject)?;
    let project_id = params
        .project_id
        .ok_or_else(|| reject(ApiError::BadRequest("projectId is required".to_string())))?;
    let query = ResultQuery::try_from(params.result_params()).map_err(reject)?;
    let findings = state
        .projects
        .export_results(project_id, &query)
        .await
        .map_err(reject)?;

    let request = ReportRequest::new(format, findings)
        .with_organize_by_severity(params.organize_by_severity.unwrap_or(false));
    let report = state.renderers.render(&request).map_err(reject)?;
    Ok(download(report))
}

pub(crate) async fn export_body(body: ExportBody, state: AppState) -> HandlerResult {
    let format: ReportFormat = body.format.parse().map_err(reject)?;
    let mut request = ReportRequest::new(format, body.data)
        .with_screenshots(body.include_screenshots)
        .with_organize_by_severity(body.organize_by_severity);
    if let Some(title) = body.title {
        request = request.with_title(title);
    }
    let report = state.renderers.render(&request).map_err(reject)?;
    Ok(download(report))
}

fn download(report: RenderedReport) -> warp::reply::Response {
    let disposition = format!("attachment; filename=\"{}\"", report.file_name);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, report.content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(report.body.into())
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to build download response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}
