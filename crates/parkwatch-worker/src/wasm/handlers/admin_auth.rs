use worker::{Env, Request, Result};

use crate::worker_wasm::env::env_string;
use crate::worker_wasm::http::error_response;

pub fn extract_bearer_token(req: &Request) -> Result<Option<String>> {
    let Some(raw) = req.headers().get("Authorization")? else {
        return Ok(None);
    };

    let raw = raw.trim();
    let Some((scheme, rest)) = raw.split_once(' ') else {
        return Ok(None);
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }

    let token = rest.trim();
    if token.is_empty() {
        return Ok(None);
    }

    Ok(Some(token.to_string()))
}

/// Shared authorization for the /v1/admin endpoints.
///
/// `MIGRATIONS_TOKEN` must be configured; without it the endpoints stay
/// closed rather than open.
///
/// Returns `Ok(None)` when authorized; otherwise the error response.
pub async fn ensure_admin_authorized(req: &Request, env: &Env) -> Result<Option<worker::Response>> {
    let Some(required) = env_string(env, "MIGRATIONS_TOKEN") else {
        return Ok(Some(error_response(
            req,
            403,
            "admin_disabled",
            "Admin endpoints are disabled on this deployment",
        )?));
    };

    let Some(token) = extract_bearer_token(req)? else {
        return Ok(Some(error_response(
            req,
            401,
            "missing_token",
            "Missing Authorization Bearer token",
        )?));
    };

    if token != required {
        return Ok(Some(error_response(
            req,
            401,
            "unauthorized",
            "Invalid admin token",
        )?));
    }

    Ok(None)
}
