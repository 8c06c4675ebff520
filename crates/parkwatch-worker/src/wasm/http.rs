use std::fmt::Display;

use worker::{Headers, Request, Response, Result};

fn cors_headers(req: &Request) -> Result<Headers> {
    let headers = Headers::new();

    // Reflect Origin when present; otherwise allow all. The phone app runs
    // in a webview during development and needs permissive CORS.
    let origin = req.headers().get("Origin")?.unwrap_or_else(|| "*".to_string());

    headers.set("Access-Control-Allow-Origin", &origin)?;
    headers.set("Vary", "Origin")?;
    headers.set("Access-Control-Allow-Credentials", "true")?;
    headers.set("Access-Control-Allow-Methods", "GET,POST,DELETE,OPTIONS")?;
    headers.set(
        "Access-Control-Allow-Headers",
        "Authorization,Content-Type,Accept,X-Device-Id,X-Device-Secret",
    )?;

    Ok(headers)
}

pub fn json_with_cors(req: &Request, mut resp: Response) -> Result<Response> {
    let headers = cors_headers(req)?;
    let resp_headers = resp.headers_mut();
    for (k, v) in headers.entries() {
        resp_headers.set(&k, &v)?;
    }

    Ok(resp)
}

pub fn error_response(req: &Request, status: u16, code: &str, message: &str) -> Result<Response> {
    let body = serde_json::json!({
        "success": false,
        "error": {
            "code": code,
            "message": message
        }
    });

    let resp = Response::from_json(&body)?.with_status(status);
    json_with_cors(req, resp)
}

/// 400 with per-field detail, for schema/type violations.
pub fn validation_error_response(req: &Request, details: &[&str]) -> Result<Response> {
    let body = serde_json::json!({
        "success": false,
        "error": {
            "code": "invalid_input",
            "message": "Invalid input",
            "details": details,
        }
    });

    let resp = Response::from_json(&body)?.with_status(400);
    json_with_cors(req, resp)
}

pub fn internal_error_response<E: Display>(req: &Request, context: &str, err: &E) -> Result<Response> {
    worker::console_log!("{context}: {err}");
    error_response(req, 500, "internal_error", "Internal server error")
}

pub fn not_found(req: &Request) -> Result<Response> {
    error_response(req, 404, "not_found", "Not found")
}
