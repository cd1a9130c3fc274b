//! Input validation for projects and scan targets

use crate::error::ValidationError;
use a11y_types::NewProject;
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest accepted project name
pub const MAX_NAME_LEN: usize = 255;
/// Most urls per project
pub const MAX_URLS: usize = 10;

static HTTP_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://[a-z0-9](?:[a-z0-9.-]*[a-z0-9])?(?::\d{1,5})?(?:[/?#]\S*)?$")
        .expect("valid regex")
});

/// Trim `url` and require an absolute http(s) url with a host
///
/// # Errors
/// Returns [`ValidationError`] on `url`.
pub fn validate_url(url: &str) -> Result<String, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("url", "url is required"));
    }
    if !HTTP_URL.is_match(trimmed) {
        return Err(ValidationError::new(
            "url",
            format!("'{trimmed}' is not an absolute http(s) url"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Normalize urls joining a project that already tracks `tracked`
///
/// # Errors
/// Returns [`ValidationError`] on `urls` for an empty list, a total above
/// `MAX_URLS`, a malformed url or a repeated url.
pub fn validate_urls(raw: &[String], tracked: usize) -> Result<Vec<String>, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::new("urls", "at least one url is required"));
    }
    if tracked + raw.len() > MAX_URLS {
        return Err(ValidationError::new(
            "urls",
            format!("at most {MAX_URLS} urls are allowed"),
        ));
    }

    let mut urls: Vec<String> = Vec::with_capacity(raw.len());
    for url in raw {
        let url = validate_url(url).map_err(|e| ValidationError::new("urls", e.message))?;
        if urls.contains(&url) {
            return Err(ValidationError::new("urls", format!("duplicate url '{url}'")));
        }
        urls.push(url);
    }
    Ok(urls)
}

/// Normalize and check a new project
///
/// # Errors
/// Returns [`ValidationError`] for an empty or overlong name, a url count
/// outside `1..=MAX_URLS`, a malformed url or a repeated url.
pub fn validate_new_project(project: NewProject) -> Result<NewProject, ValidationError> {
    let name = project.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::new("name", "project name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            "name",
            format!("project name must be at most {MAX_NAME_LEN} characters"),
        ));
    }

    let urls = validate_urls(&project.urls, 0)?;

    Ok(NewProject {
        name,
        urls,
        compliance_options: project.compliance_options,
    })
}
