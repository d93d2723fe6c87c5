//! Route templates for the session endpoints.

use super::ApiError;

pub const LOGIN: &str = "/login";
pub const LOGOUT: &str = "/logout";
pub const SIGNUP: &str = "/register/:username";
pub const REFRESH: &str = "/refresh";

/// Fill `:name` segments of a route template, in order, with `params`.
///
/// `build_path("/register/:username", &["alice"])` gives `/register/alice`.
pub fn build_path(template: &str, params: &[&str]) -> Result<String, ApiError> {
    let mut values = params.iter();
    let mut segments = Vec::new();

    for segment in template.split('/') {
        if segment.starts_with(':') {
            let value = values.next().ok_or_else(|| {
                ApiError::InvalidRequest(format!("Missing value for {} in {}", segment, template))
            })?;
            segments.push(*value);
        } else {
            segments.push(segment);
        }
    }

    if values.next().is_some() {
        return Err(ApiError::InvalidRequest(format!(
            "Too many values for route {}",
            template
        )));
    }

    Ok(segments.join("/"))
}
