//! HTTP strategies against a local server

use a11y_analysis::{
    build_chain, AnalysisConfig, AnalysisError, Analyzer, AxeServiceAnalyzer, AxeServiceConfig,
    HtmlValidatorAnalyzer, STRATEGY_AXE_SERVICE, STRATEGY_HTML_VALIDATOR,
};
use a11y_types::{ComplianceOptions, Severity};
use std::net::SocketAddr;
use std::time::Duration;
use warp::Filter;

const PAGE: &str = r#"<html><head><title>Shop</title></head>
<body><img src="hero.png"><a href="/cart"></a></body></html>"#;

fn spawn_server() -> SocketAddr {
    let analyze = warp::post()
        .and(warp::path("analyze"))
        .and(warp::body::json())
        .map(|body: serde_json::Value| {
            let url = body["url"].as_str().unwrap_or_default().to_string();
            let tags: Vec<String> = serde_json::from_value(body["tags"].clone()).unwrap_or_default();
            warp::reply::json(&serde_json::json!({
                "url": url,
                "violations": [{
                    "id": "color-contrast",
                    "impact": "serious",
                    "help": "Elements must have sufficient color contrast",
                    "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/color-contrast",
                    "tags": tags,
                    "nodes": [{"html": "<p class=\"muted\">", "target": ["p.muted"]}]
                }]
            }))
        });
    let broken = warp::post()
        .and(warp::path("broken"))
        .map(|| warp::reply::with_status("boom", warp::http::StatusCode::BAD_GATEWAY));
    let page = warp::get()
        .and(warp::path("page"))
        .map(|| warp::reply::html(PAGE));
    let missing = warp::get()
        .and(warp::path("missing"))
        .map(|| warp::reply::with_status("gone", warp::http::StatusCode::NOT_FOUND));

    let (addr, server) =
        warp::serve(analyze.or(broken).or(page).or(missing)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

#[tokio::test]
async fn axe_service_results_are_normalized() {
    let addr = spawn_server();
    let analyzer =
        AxeServiceAnalyzer::new(format!("http://{addr}/analyze"), Duration::from_secs(5)).unwrap();

    let outcome = analyzer
        .analyze("https://shop.example", &ComplianceOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.summary.serious, 1);
    let finding = &outcome.results[0];
    assert_eq!(finding.url, "https://shop.example");
    assert_eq!(finding.severity, Severity::Serious);
    assert_eq!(finding.element_path.as_deref(), Some("p.muted"));
    // the service echoes the requested tags
    assert!(finding.tags.contains(&"wcag2aa".to_string()));
}

#[tokio::test]
async fn axe_service_error_status_is_reported() {
    let addr = spawn_server();
    let analyzer =
        AxeServiceAnalyzer::new(format!("http://{addr}/broken"), Duration::from_secs(5)).unwrap();

    let err = analyzer
        .analyze("https://shop.example", &ComplianceOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::HttpStatus { status: 502, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn html_validator_fetches_and_checks_page() {
    let addr = spawn_server();
    let analyzer = HtmlValidatorAnalyzer::new(Duration::from_secs(5), "test-agent").unwrap();
    let url = format!("http://{addr}/page");

    let outcome = analyzer
        .analyze(&url, &ComplianceOptions::default())
        .await
        .unwrap();

    // image-alt, html-has-lang, link-name
    assert_eq!(outcome.summary.total, 3);
    assert_eq!(outcome.summary.critical, 1);
    assert!(outcome.results.iter().all(|f| f.url == url));
}

#[tokio::test]
async fn html_validator_reports_missing_page() {
    let addr = spawn_server();
    let analyzer = HtmlValidatorAnalyzer::new(Duration::from_secs(5), "test-agent").unwrap();

    let err = analyzer
        .analyze(&format!("http://{addr}/missing"), &ComplianceOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn chain_falls_back_from_broken_service_to_html_checks() {
    let addr = spawn_server();
    let config = AnalysisConfig {
        axe_service: AxeServiceConfig {
            endpoint: Some(format!("http://{addr}/broken")),
            timeout_secs: 5,
        },
        ..AnalysisConfig::default()
    };
    let chain = build_chain(&config).unwrap();

    let success = chain
        .analyze(&format!("http://{addr}/page"), &ComplianceOptions::default())
        .await
        .unwrap();

    assert_eq!(success.method, STRATEGY_HTML_VALIDATOR);
    assert_eq!(success.failures.len(), 1);
    assert_eq!(success.failures[0].strategy, STRATEGY_AXE_SERVICE);
}
