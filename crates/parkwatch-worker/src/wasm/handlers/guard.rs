use sea_orm::EntityTrait;
use worker::{Env, Request, Response, Result};

use crate::jwt;
use crate::util::now_ts;
use crate::worker_wasm::env::env_string;
use crate::worker_wasm::http::error_response;

use entity::{device, user};

use super::admin_auth::extract_bearer_token;

/// Outcome of an auth guard. `Unauthorized` carries the response to return,
/// whatever its status ends up being.
pub enum OwnerAuthResult {
    Authorized(user::Model),
    Unauthorized(Response),
}

/// Validate the bearer token of an owner-facing request and load the account.
pub async fn authenticate_owner(
    req: &Request,
    env: &Env,
    db: &sea_orm::DatabaseConnection,
) -> Result<OwnerAuthResult> {
    let Some(token) = extract_bearer_token(req)? else {
        return Ok(OwnerAuthResult::Unauthorized(error_response(
            req,
            401,
            "unauthorized",
            "Access token required",
        )?));
    };

    let Some(secret) = env_string(env, "JWT_SECRET") else {
        return Err(worker::Error::RustError("JWT_SECRET is required".to_string()));
    };

    let claims = match jwt::verify(secret.as_bytes(), &token, now_ts()) {
        Ok(c) => c,
        Err(e) => {
            worker::console_log!("Bearer token rejected: {e}");
            return Ok(OwnerAuthResult::Unauthorized(error_response(
                req,
                403,
                "forbidden",
                "Invalid or expired token",
            )?));
        }
    };

    let Some(u) = user::Entity::find_by_id(claims.sub)
        .one(db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?
    else {
        // Token for a deleted account.
        return Ok(OwnerAuthResult::Unauthorized(error_response(
            req,
            403,
            "forbidden",
            "Invalid or expired token",
        )?));
    };

    Ok(OwnerAuthResult::Authorized(u))
}

pub enum DeviceAuthResult {
    Authorized(device::Model),
    Unauthorized(Response),
}

/// Validate device credentials sent per-request as headers.
///
/// 401 when either header is missing, 404 for an unknown device id, 403 when
/// the secret does not match (constant-time compare).
pub async fn authenticate_device(
    req: &Request,
    db: &sea_orm::DatabaseConnection,
) -> Result<DeviceAuthResult> {
    let device_id = req.headers().get("x-device-id")?.unwrap_or_default();
    let device_secret = req.headers().get("x-device-secret")?.unwrap_or_default();

    if device_id.trim().is_empty() || device_secret.trim().is_empty() {
        return Ok(DeviceAuthResult::Unauthorized(error_response(
            req,
            401,
            "unauthorized",
            "Device credentials required",
        )?));
    }

    let Some(dev) = device::Entity::find_by_id(device_id.trim())
        .one(db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?
    else {
        return Ok(DeviceAuthResult::Unauthorized(error_response(
            req,
            404,
            "not_found",
            "Unknown device",
        )?));
    };

    let matches: bool = subtle::ConstantTimeEq::ct_eq(
        dev.secret.as_bytes(),
        device_secret.trim().as_bytes(),
    )
    .into();
    if !matches {
        return Ok(DeviceAuthResult::Unauthorized(error_response(
            req,
            403,
            "forbidden",
            "Invalid device credentials",
        )?));
    }

    Ok(DeviceAuthResult::Authorized(dev))
}
