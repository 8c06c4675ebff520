use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use worker::{Env, Request, Response, Result};

use crate::arbitration::{on_motion, on_poll, MotionDecision, PollDecision, MOTION_SILENCE_TIMEOUT_MS};
use crate::util::{now_ts, now_ts_ms, uuid_v4};
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::http::{error_response, internal_error_response, json_with_cors};
use crate::worker_wasm::push::send_motion_alert;

use super::guard::{authenticate_device, DeviceAuthResult};

use entity::{device, motion_event, user, DeviceState};

fn map_db_err(e: sea_orm::DbErr) -> worker::Error {
    worker::Error::RustError(e.to_string())
}

/// GET /api/tracker/poll
///
/// The device's read path. The lazy-recovery check runs before every answer:
/// a THEFT_DETECTED episode that has gone silent transitions back to WATCH
/// here, not in any background timer.
pub async fn handle_poll(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let dev = match authenticate_device(&req, &db).await? {
        DeviceAuthResult::Authorized(d) => d,
        DeviceAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let now_ms = now_ts_ms();
    if on_poll(dev.state, dev.last_motion_at, now_ms) == PollDecision::Recover {
        // Compare-and-swap keyed on the stale episode we observed. A motion
        // report racing this poll refreshes last_motion_at first and makes
        // the recovery lose, which is the required arbitration outcome.
        let res = device::Entity::update_many()
            .col_expr(device::Column::State, Expr::value(DeviceState::Watch))
            .col_expr(device::Column::AlarmActive, Expr::value(false))
            .col_expr(device::Column::UpdatedAt, Expr::value(now_ts()))
            .filter(device::Column::Id.eq(&dev.id))
            .filter(device::Column::State.eq(DeviceState::TheftDetected))
            .filter(device::Column::LastMotionAt.lte(now_ms - MOTION_SILENCE_TIMEOUT_MS - 1))
            .exec(&db)
            .await
            .map_err(map_db_err)?;

        if res.rows_affected == 1 {
            let resp = Response::from_json(&serde_json::json!({
                "state": DeviceState::Watch,
                "alarm": false,
            }))?;
            return json_with_cors(&req, resp);
        }

        // Lost the race; answer with whatever won.
        let Some(current) = device::Entity::find_by_id(dev.id.as_str())
            .one(&db)
            .await
            .map_err(map_db_err)?
        else {
            return error_response(&req, 404, "not_found", "Unknown device");
        };
        let resp = Response::from_json(&serde_json::json!({
            "state": current.state,
            "alarm": current.alarm_active,
        }))?;
        return json_with_cors(&req, resp);
    }

    let resp = Response::from_json(&serde_json::json!({
        "state": dev.state,
        "alarm": dev.alarm_active,
    }))?;
    json_with_cors(&req, resp)
}

/// POST /api/tracker/motion
///
/// Reports are collapsed into episodes: only the WATCH -> THEFT_DETECTED
/// transition logs an event and alerts the owner; re-reports while already
/// THEFT_DETECTED just keep the episode alive. Safe to retry.
pub async fn handle_motion(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let dev = match authenticate_device(&req, &db).await? {
        DeviceAuthResult::Authorized(d) => d,
        DeviceAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let now_ms = now_ts_ms();
    match on_motion(dev.state) {
        MotionDecision::Ignore => {
            let resp = Response::from_json(&serde_json::json!({
                "processed": false,
                "reason": "Device not in watch mode",
            }))?;
            json_with_cors(&req, resp)
        }
        MotionDecision::StartEpisode => {
            let res = device::Entity::update_many()
                .col_expr(device::Column::State, Expr::value(DeviceState::TheftDetected))
                .col_expr(device::Column::LastMotionAt, Expr::value(Some(now_ms)))
                .col_expr(device::Column::UpdatedAt, Expr::value(now_ts()))
                .filter(device::Column::Id.eq(&dev.id))
                .filter(device::Column::State.eq(DeviceState::Watch))
                .exec(&db)
                .await
                .map_err(map_db_err)?;

            if res.rows_affected == 0 {
                // Another report won the transition in between; this one is a
                // re-report of the same episode.
                return refresh_episode(&req, &db, &dev.id, now_ms).await;
            }

            motion_event::ActiveModel {
                id: Set(uuid_v4()),
                device_id: Set(dev.id.clone()),
                timestamp: Set(now_ms),
            }
            .insert(&db)
            .await
            .map_err(map_db_err)?;

            let notification_sent = notify_owner(env, &db, &dev).await?;

            let resp = Response::from_json(&serde_json::json!({
                "processed": true,
                "notificationSent": notification_sent,
                "state": DeviceState::TheftDetected,
            }))?;
            json_with_cors(&req, resp)
        }
        MotionDecision::RefreshEpisode => refresh_episode(&req, &db, &dev.id, now_ms).await,
    }
}

/// Push the motion clock forward while an episode is live. No event, no
/// notification. If the episode ended in between (owner disarm, recovery),
/// the filter misses and the report evaporates, which is fine: the next one
/// is arbitrated against the new state.
async fn refresh_episode(
    req: &Request,
    db: &sea_orm::DatabaseConnection,
    device_id: &str,
    now_ms: i64,
) -> Result<Response> {
    device::Entity::update_many()
        .col_expr(device::Column::LastMotionAt, Expr::value(Some(now_ms)))
        .col_expr(device::Column::UpdatedAt, Expr::value(now_ts()))
        .filter(device::Column::Id.eq(device_id))
        .filter(device::Column::State.eq(DeviceState::TheftDetected))
        .exec(db)
        .await
        .map_err(map_db_err)?;

    let resp = Response::from_json(&serde_json::json!({
        "processed": true,
        "notificationSent": false,
        "state": DeviceState::TheftDetected,
    }))?;
    json_with_cors(req, resp)
}

/// Fire the one alert this episode gets. Failures (no owner, no push token,
/// delivery error) collapse into `false` and never fail the request.
async fn notify_owner(
    env: &Env,
    db: &sea_orm::DatabaseConnection,
    dev: &device::Model,
) -> Result<bool> {
    let Some(owner_id) = dev.user_id.as_deref() else {
        return Ok(false);
    };

    let owner = user::Entity::find_by_id(owner_id)
        .one(db)
        .await
        .map_err(map_db_err)?;

    let Some(push_token) = owner.as_ref().and_then(|u| u.push_token.as_deref()) else {
        worker::console_log!("No push token for owner of device {}", dev.id);
        return Ok(false);
    };

    Ok(send_motion_alert(env, push_token, &dev.id).await)
}

#[derive(Debug, Deserialize)]
struct GpsData {
    latitude: f64,
    longitude: f64,
}

/// POST /api/tracker/gps
///
/// Coordinates are stored verbatim for the owner's map view; nothing is
/// computed from them.
pub async fn handle_gps(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let dev = match authenticate_device(&req, &db).await? {
        DeviceAuthResult::Authorized(d) => d,
        DeviceAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let payload: GpsData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in gps report: {e}");
            return error_response(
                &req,
                400,
                "invalid_input",
                "latitude and longitude must be numbers",
            );
        }
    };

    let mut am: device::ActiveModel = dev.into();
    am.last_latitude = Set(Some(payload.latitude));
    am.last_longitude = Set(Some(payload.longitude));
    am.last_gps_update = Set(Some(now_ts()));
    am.updated_at = Set(now_ts());
    am.update(&db)
        .await
        .map_err(map_db_err)?;

    let resp = Response::from_json(&serde_json::json!({ "success": true }))?;
    json_with_cors(&req, resp)
}
