use worker::*;

#[path = "wasm/db/mod.rs"]
pub mod db;
#[path = "wasm/env.rs"]
pub mod env;
#[path = "wasm/handlers/mod.rs"]
pub mod handlers;
#[path = "wasm/http.rs"]
pub mod http;
#[path = "wasm/push.rs"]
pub mod push;

use http::{json_with_cors, not_found};

#[event(fetch)]
pub async fn fetch(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    console_error_panic_hook::set_once();

    if req.method() == Method::Options {
        let resp = Response::empty()?.with_status(204);
        return json_with_cors(&req, resp);
    }

    let url = req.url()?;
    let path = url.path();

    if req.method() == Method::Get && path == "/health" {
        let body = serde_json::json!({
            "ok": true,
            "service": "parkwatch",
        });
        let resp = Response::from_json(&body)?;
        return json_with_cors(&req, resp);
    }

    // Owner accounts.
    if req.method() == Method::Post && path == "/api/auth/signup" {
        return handlers::accounts::handle_signup(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/auth/login" {
        return handlers::accounts::handle_login(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/auth/google" {
        return handlers::accounts::handle_google(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/auth/push-token" {
        return handlers::accounts::handle_push_token(req, &env).await;
    }
    if req.method() == Method::Get && path == "/api/auth/me" {
        return handlers::accounts::handle_me(req, &env).await;
    }

    // Owner control surface (bearer token).
    if req.method() == Method::Post && path == "/api/device/claim" {
        return handlers::devices::handle_claim(req, &env).await;
    }
    if req.method() == Method::Delete && path == "/api/device/unclaim" {
        return handlers::devices::handle_unclaim(req, &env).await;
    }
    if req.method() == Method::Get && path == "/api/device/status" {
        return handlers::devices::handle_status(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/device/state" {
        return handlers::devices::handle_state(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/device/alarm" {
        return handlers::devices::handle_alarm(req, &env).await;
    }
    if req.method() == Method::Get && path == "/api/device/events" {
        return handlers::devices::handle_events(req, &env).await;
    }
    if req.method() == Method::Get && path == "/api/device/gps" {
        return handlers::devices::handle_gps(req, &env).await;
    }

    // Device-facing tracker endpoints (x-device-id / x-device-secret).
    if req.method() == Method::Get && path == "/api/tracker/poll" {
        return handlers::tracker::handle_poll(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/tracker/motion" {
        return handlers::tracker::handle_motion(req, &env).await;
    }
    if req.method() == Method::Post && path == "/api/tracker/gps" {
        return handlers::tracker::handle_gps(req, &env).await;
    }

    // Ops.
    if req.method() == Method::Post && path == "/v1/admin/migrations/up" {
        return handlers::migrations::handle_migrations_up(&req, &env).await;
    }
    if req.method() == Method::Get && path == "/v1/admin/db/ping" {
        return handlers::admin::handle_db_ping(&req, &env).await;
    }

    not_found(&req)
}
