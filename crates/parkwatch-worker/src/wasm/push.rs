use serde::{Deserialize, Serialize};
use worker::{Env, Headers, Method, Request, RequestInit, Result};

use crate::worker_wasm::env::env_string;

const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Serialize)]
struct ExpoPushMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'a str,
    priority: &'a str,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExpoPushTicket {
    status: String,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpoPushReceipt {
    data: Vec<ExpoPushTicket>,
}

fn is_expo_push_token(token: &str) -> bool {
    (token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken["))
        && token.ends_with(']')
}

/// Deliver a "motion detected" alert to the owner's phone.
///
/// Best-effort: the caller has already committed the state transition, so
/// every failure here is logged and collapsed into `false` instead of
/// surfacing.
pub async fn send_motion_alert(env: &Env, push_token: &str, device_id: &str) -> bool {
    if !is_expo_push_token(push_token) {
        worker::console_log!("Not an Expo push token, skipping alert for device {device_id}");
        return false;
    }

    let message = ExpoPushMessage {
        to: push_token,
        title: "\u{26a0}\u{fe0f} Motion Detected!",
        body: "Your vehicle is being moved. Tap to check.",
        sound: "default",
        priority: "high",
        data: serde_json::json!({ "type": "motion", "deviceId": device_id }),
    };

    match send(env, &message).await {
        Ok(()) => true,
        Err(e) => {
            worker::console_log!("Push delivery failed for device {device_id}: {e}");
            false
        }
    }
}

async fn send(env: &Env, message: &ExpoPushMessage<'_>) -> Result<()> {
    let endpoint =
        env_string(env, "EXPO_PUSH_URL").unwrap_or_else(|| DEFAULT_PUSH_ENDPOINT.to_string());

    let json = serde_json::to_string(message)
        .map_err(|e| worker::Error::RustError(format!("Failed to serialize push payload: {e}")))?;

    let headers = Headers::new();
    headers.set("Content-Type", "application/json")?;
    headers.set("Accept", "application/json")?;
    headers.set("User-Agent", "Parkwatch/0.1 (Cloudflare Worker)")?;

    let mut init = RequestInit::new();
    init.with_method(Method::Post);
    init.with_headers(headers);
    init.with_body(Some(json.into()));

    let req = Request::new_with_init(&endpoint, &init)?;

    let mut resp = worker::Fetch::Request(req).send().await?;
    let status = resp.status_code();
    if !(200..=299).contains(&status) {
        let body = resp.text().await.unwrap_or_default();
        return Err(worker::Error::RustError(format!(
            "Expo push failed (status={status}): {body}"
        )));
    }

    // Expo acknowledges with per-message tickets; an error ticket means the
    // message never left their queue.
    let receipt: ExpoPushReceipt = resp.json().await?;
    if let Some(bad) = receipt.data.iter().find(|t| t.status != "ok") {
        return Err(worker::Error::RustError(format!(
            "Expo push ticket error: {}",
            bad.message.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(())
}
