//! Route table

use crate::dto::ExportParams;
use crate::error::handle_rejection;
use crate::handlers;
use crate::AppState;
use a11y_core::ResultParams;
use a11y_types::{ProjectId, ScanId};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::Filter;

/// Largest accepted JSON body
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Every API route with JSON error handling
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and_then(handlers::health);

    let create_project = warp::path!("projects")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::create_project);

    let list_projects = warp::path!("projects")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::list_projects);

    let get_project = warp::path!("projects" / ProjectId)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_project);

    let add_urls = warp::path!("projects" / ProjectId / "urls")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::add_project_urls);

    let project_scans = warp::path!("projects" / ProjectId / "scans")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::list_project_scans);

    let project_results = warp::path!("projects" / ProjectId / "results")
        .and(warp::get())
        .and(warp::query::<ResultParams>())
        .and(with_state(state.clone()))
        .and_then(handlers::project_results);

    let rescan_project = warp::path!("projects" / ProjectId / "rescan")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(handlers::rescan_project);

    let start_scan = warp::path!("scans")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(handlers::start_scan);

    let get_scan = warp::path!("scans" / ScanId)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_scan);

    let scan_results = warp::path!("scans" / ScanId / "results")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::scan_results);

    let export_query = warp::path!("export")
        .and(warp::get())
        .and(warp::query::<ExportParams>())
        .and(with_state(state.clone()))
        .and_then(handlers::export_query);

    let export_body = warp::path!("export")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state))
        .and_then(handlers::export_body);

    let projects = create_project
        .or(list_projects)
        .or(get_project)
        .or(add_urls)
        .or(project_scans)
        .or(project_results)
        .or(rescan_project)
        .boxed();
    let scans = start_scan.or(get_scan).or(scan_results).boxed();
    let export = export_query.or(export_body).boxed();

    health
        .or(projects)
        .or(scans)
        .or(export)
        .recover(handle_rejection)
        .with(warp::trace::request())
}
