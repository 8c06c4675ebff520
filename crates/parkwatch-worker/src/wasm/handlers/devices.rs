use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use serde_json::Value;
use worker::{Env, Request, Response, Result};

use crate::arbitration::{owner_set_state, unclaim_reset, OwnerTarget, StateCommand};
use crate::pairing::{evaluate_claim, ClaimDecision, ExistingDevice};
use crate::util::{now_ts, ts_ms_to_rfc3339, ts_to_rfc3339};
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::http::{
    error_response, internal_error_response, json_with_cors, validation_error_response,
};

use super::guard::{authenticate_owner, OwnerAuthResult};

use entity::{device, motion_event, DeviceState};

/// Events returned by the history endpoint, newest first.
const EVENT_PAGE_SIZE: u64 = 50;

fn device_summary_json(d: &device::Model) -> Value {
    serde_json::json!({
        "device": {
            "id": d.id,
            "state": d.state,
            "alarmActive": d.alarm_active,
        }
    })
}

async fn find_owned_device(
    db: &sea_orm::DatabaseConnection,
    owner_id: &str,
) -> Result<Option<device::Model>> {
    device::Entity::find()
        .filter(device::Column::UserId.eq(owner_id))
        .one(db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))
}

async fn purge_motion_events(db: &sea_orm::DatabaseConnection, device_id: &str) -> Result<()> {
    motion_event::Entity::delete_many()
        .filter(motion_event::Column::DeviceId.eq(device_id))
        .exec(db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;
    Ok(())
}

/// Apply an owner state command to a device row (and its event log).
async fn apply_state_command(
    db: &sea_orm::DatabaseConnection,
    dev: device::Model,
    cmd: StateCommand,
) -> Result<device::Model> {
    if cmd.purge_events {
        purge_motion_events(db, &dev.id).await?;
    }

    let mut am: device::ActiveModel = dev.into();
    am.state = Set(cmd.state);
    am.alarm_active = Set(cmd.alarm_active);
    am.updated_at = Set(now_ts());
    am.update(db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimData {
    device_id: String,
    secret: String,
}

/// POST /api/device/claim
///
/// Pairing via QR code data. An unknown device id is provisioned on the fly
/// with the supplied secret; anyone authenticated can mint fresh ids this
/// way, which is accepted as the bootstrap path for first-time pairing.
pub async fn handle_claim(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let payload: ClaimData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in claim: {e}");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let device_id = payload.device_id.trim().to_string();
    let secret = payload.secret.trim().to_string();
    let mut details = Vec::new();
    if device_id.is_empty() {
        details.push("deviceId must not be empty");
    }
    if secret.is_empty() {
        details.push("secret must not be empty");
    }
    if !details.is_empty() {
        return validation_error_response(&req, &details);
    }

    let existing = device::Entity::find_by_id(device_id.as_str())
        .one(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;
    let owned = find_owned_device(&db, &owner.id).await?;

    let decision = evaluate_claim(
        &owner.id,
        &device_id,
        &secret,
        existing.as_ref().map(|d| ExistingDevice {
            secret: &d.secret,
            user_id: d.user_id.as_deref(),
        }),
        owned.as_ref().map(|d| d.id.as_str()),
    );

    let claimed = match decision {
        ClaimDecision::WrongSecret => {
            return error_response(&req, 403, "invalid_device_secret", "Invalid device secret");
        }
        ClaimDecision::ClaimedByOther => {
            return error_response(
                &req,
                400,
                "already_claimed",
                "Device already claimed by another user",
            );
        }
        ClaimDecision::OwnerHasDevice => {
            return error_response(
                &req,
                400,
                "device_limit",
                "You already have a device paired. Unpair it first.",
            );
        }
        ClaimDecision::Provision => {
            let now = now_ts();
            device::ActiveModel {
                id: Set(device_id),
                secret: Set(secret),
                state: Set(DeviceState::Idle),
                alarm_active: Set(false),
                last_motion_at: Set(None),
                last_latitude: Set(None),
                last_longitude: Set(None),
                last_gps_update: Set(None),
                user_id: Set(Some(owner.id)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&db)
            .await
            .map_err(|e| worker::Error::RustError(e.to_string()))?
        }
        ClaimDecision::Claim => {
            // evaluate_claim only decides Claim when `existing` is Some.
            let Some(dev) = existing else {
                return internal_error_response(
                    &req,
                    "Claim decision without a device row",
                    &"unreachable",
                );
            };
            let mut am: device::ActiveModel = dev.into();
            am.user_id = Set(Some(owner.id));
            am.updated_at = Set(now_ts());
            am.update(&db)
                .await
                .map_err(|e| worker::Error::RustError(e.to_string()))?
        }
    };

    let resp = Response::from_json(&device_summary_json(&claimed))?;
    json_with_cors(&req, resp)
}

/// DELETE /api/device/unclaim
pub async fn handle_unclaim(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let Some(dev) = find_owned_device(&db, &owner.id).await? else {
        return error_response(&req, 404, "no_device", "No device paired");
    };

    let cmd = unclaim_reset();
    purge_motion_events(&db, &dev.id).await?;

    let mut am: device::ActiveModel = dev.into();
    am.user_id = Set(None);
    am.state = Set(cmd.state);
    am.alarm_active = Set(cmd.alarm_active);
    am.last_motion_at = Set(None);
    am.updated_at = Set(now_ts());
    am.update(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

    let resp = Response::from_json(&serde_json::json!({ "success": true }))?;
    json_with_cors(&req, resp)
}

/// GET /api/device/status
///
/// `device: null` (not 404) when nothing is paired, so the app can render the
/// pairing screen without special-casing an error.
pub async fn handle_status(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let Some(d) = find_owned_device(&db, &owner.id).await? else {
        let resp = Response::from_json(&serde_json::json!({ "device": Value::Null }))?;
        return json_with_cors(&req, resp);
    };

    let resp = Response::from_json(&serde_json::json!({
        "device": {
            "id": d.id,
            "state": d.state,
            "alarmActive": d.alarm_active,
            "lastMotionAt": d.last_motion_at.map(ts_ms_to_rfc3339),
            "lastLatitude": d.last_latitude,
            "lastLongitude": d.last_longitude,
            "lastGpsUpdate": d.last_gps_update.map(ts_to_rfc3339),
        }
    }))?;
    json_with_cors(&req, resp)
}

#[derive(Debug, Deserialize)]
struct StateData {
    state: OwnerTarget,
}

/// POST /api/device/state
pub async fn handle_state(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let payload: StateData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in state command: {e}");
            return validation_error_response(&req, &["state must be IDLE or WATCH"]);
        }
    };

    let Some(dev) = find_owned_device(&db, &owner.id).await? else {
        return error_response(&req, 404, "no_device", "No device paired");
    };

    let updated = apply_state_command(&db, dev, owner_set_state(payload.state)).await?;

    let resp = Response::from_json(&device_summary_json(&updated))?;
    json_with_cors(&req, resp)
}

#[derive(Debug, Deserialize)]
struct AlarmData {
    active: bool,
}

/// POST /api/device/alarm
///
/// Orthogonal to the watch state: flips only the sounder.
pub async fn handle_alarm(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let payload: AlarmData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in alarm command: {e}");
            return validation_error_response(&req, &["active must be a boolean"]);
        }
    };

    let Some(dev) = find_owned_device(&db, &owner.id).await? else {
        return error_response(&req, 404, "no_device", "No device paired");
    };

    let mut am: device::ActiveModel = dev.into();
    am.alarm_active = Set(payload.active);
    am.updated_at = Set(now_ts());
    let updated = am
        .update(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

    let resp = Response::from_json(&device_summary_json(&updated))?;
    json_with_cors(&req, resp)
}

/// GET /api/device/events
pub async fn handle_events(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let Some(dev) = find_owned_device(&db, &owner.id).await? else {
        return error_response(&req, 404, "no_device", "No device paired");
    };

    let events = motion_event::Entity::find()
        .filter(motion_event::Column::DeviceId.eq(&dev.id))
        .order_by_desc(motion_event::Column::Timestamp)
        .limit(EVENT_PAGE_SIZE)
        .all(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

    let data: Vec<Value> = events
        .iter()
        .map(|e| {
            serde_json::json!({
                "id": e.id,
                "deviceId": e.device_id,
                "timestamp": ts_ms_to_rfc3339(e.timestamp),
            })
        })
        .collect();

    let resp = Response::from_json(&serde_json::json!({ "events": data }))?;
    json_with_cors(&req, resp)
}

/// GET /api/device/gps
pub async fn handle_gps(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let owner = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let Some(dev) = find_owned_device(&db, &owner.id).await? else {
        return error_response(&req, 404, "no_device", "No device paired");
    };

    let (Some(lat), Some(lon)) = (dev.last_latitude, dev.last_longitude) else {
        return error_response(&req, 404, "no_gps", "No GPS location available");
    };

    let resp = Response::from_json(&serde_json::json!({
        "latitude": lat,
        "longitude": lon,
        "lastGpsUpdate": dev.last_gps_update.map(ts_to_rfc3339),
    }))?;
    json_with_cors(&req, resp)
}
