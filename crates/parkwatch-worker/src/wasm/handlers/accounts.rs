use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use worker::{Env, Request, Response, Result};

use crate::crypto;
use crate::jwt;
use crate::util::{generate_salt, hex_decode, hex_encode, now_ts, ts_to_rfc3339, uuid_v4};
use crate::worker_wasm::db::db_connect;
use crate::worker_wasm::env::env_string;
use crate::worker_wasm::http::{
    error_response, internal_error_response, json_with_cors, validation_error_response,
};

use super::guard::{authenticate_owner, OwnerAuthResult};

use entity::{user, user::Entity as UserEntity};

const MIN_PASSWORD_LEN: usize = 6;

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Just enough of a shape check to catch typos; real validation is the
/// confirmation the app performs out of band.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn issue_session_token(env: &Env, u: &user::Model) -> Result<String> {
    let Some(secret) = env_string(env, "JWT_SECRET") else {
        return Err(worker::Error::RustError("JWT_SECRET is required".to_string()));
    };

    jwt::issue(secret.as_bytes(), &u.id, &u.email, now_ts())
        .map_err(|e| worker::Error::RustError(e.to_string()))
}

fn session_json(token: &str, u: &user::Model) -> serde_json::Value {
    serde_json::json!({
        "token": token,
        "user": { "id": u.id, "email": u.email },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupData {
    email: String,
    password: String,
}

pub async fn handle_signup(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let payload: SignupData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in signup: {e}");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let email = normalize_email(&payload.email);
    let mut details = Vec::new();
    if !is_valid_email(&email) {
        details.push("email must be a valid address");
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        details.push("password must be at least 6 characters");
    }
    if !details.is_empty() {
        return validation_error_response(&req, &details);
    }

    let existing = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;
    if existing.is_some() {
        return error_response(&req, 400, "email_taken", "Email already registered");
    }

    let salt = generate_salt();
    let digest = hex_encode(&crypto::hash_password(
        payload.password.as_bytes(),
        salt.as_bytes(),
        crypto::PBKDF2_ITERATIONS,
    ));

    let now = now_ts();
    let created = user::ActiveModel {
        id: Set(uuid_v4()),
        email: Set(email),
        password_hash: Set(Some(digest)),
        password_salt: Set(Some(salt)),
        google_id: Set(None),
        push_token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .map_err(|e| worker::Error::RustError(e.to_string()))?;

    let token = issue_session_token(env, &created)?;
    let resp = Response::from_json(&session_json(&token, &created))?.with_status(201);
    json_with_cors(&req, resp)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    email: String,
    password: String,
}

pub async fn handle_login(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let payload: LoginData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in login: {e}");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let email = normalize_email(&payload.email);
    let found = UserEntity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

    // Unknown email, federated-only account and bad password all answer the
    // same way.
    let invalid = || error_response(&req, 401, "invalid_credentials", "Invalid credentials");

    let Some(u) = found else {
        return invalid();
    };
    let (Some(digest_hex), Some(salt)) = (u.password_hash.as_deref(), u.password_salt.as_deref())
    else {
        return invalid();
    };
    let expected = hex_decode(digest_hex).unwrap_or_default();

    if !crypto::verify_password(
        payload.password.as_bytes(),
        salt.as_bytes(),
        &expected,
        crypto::PBKDF2_ITERATIONS,
    ) {
        return invalid();
    }

    let token = issue_session_token(env, &u)?;
    let resp = Response::from_json(&session_json(&token, &u))?;
    json_with_cors(&req, resp)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAuthData {
    google_id: String,
    email: String,
}

pub async fn handle_google(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let payload: GoogleAuthData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in google auth: {e}");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let email = normalize_email(&payload.email);
    let google_id = payload.google_id.trim().to_string();
    let mut details = Vec::new();
    if !is_valid_email(&email) {
        details.push("email must be a valid address");
    }
    if google_id.is_empty() {
        details.push("googleId must not be empty");
    }
    if !details.is_empty() {
        return validation_error_response(&req, &details);
    }

    let by_google = UserEntity::find()
        .filter(user::Column::GoogleId.eq(&google_id))
        .one(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

    let u = match by_google {
        Some(u) => u,
        None => {
            let by_email = UserEntity::find()
                .filter(user::Column::Email.eq(&email))
                .one(&db)
                .await
                .map_err(|e| worker::Error::RustError(e.to_string()))?;

            match by_email {
                // Same mailbox signed up with a password earlier: link the
                // federated identity to that account.
                Some(u) => {
                    let mut am: user::ActiveModel = u.into();
                    am.google_id = Set(Some(google_id));
                    am.updated_at = Set(now_ts());
                    am.update(&db)
                        .await
                        .map_err(|e| worker::Error::RustError(e.to_string()))?
                }
                None => {
                    let now = now_ts();
                    user::ActiveModel {
                        id: Set(uuid_v4()),
                        email: Set(email),
                        password_hash: Set(None),
                        password_salt: Set(None),
                        google_id: Set(Some(google_id)),
                        push_token: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(&db)
                    .await
                    .map_err(|e| worker::Error::RustError(e.to_string()))?
                }
            }
        }
    };

    let token = issue_session_token(env, &u)?;
    let resp = Response::from_json(&session_json(&token, &u))?;
    json_with_cors(&req, resp)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushTokenData {
    push_token: String,
}

pub async fn handle_push_token(mut req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let auth = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let payload: PushTokenData = match req.json().await {
        Ok(p) => p,
        Err(e) => {
            worker::console_log!("Invalid JSON in push-token: {e}");
            return error_response(&req, 400, "invalid_json", "Invalid JSON body");
        }
    };

    let push_token = payload.push_token.trim().to_string();
    if push_token.is_empty() {
        return validation_error_response(&req, &["pushToken must not be empty"]);
    }

    let mut am: user::ActiveModel = auth.into();
    am.push_token = Set(Some(push_token));
    am.updated_at = Set(now_ts());
    am.update(&db)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

    let resp = Response::from_json(&serde_json::json!({ "success": true }))?;
    json_with_cors(&req, resp)
}

pub async fn handle_me(req: Request, env: &Env) -> Result<Response> {
    let db = match db_connect(env).await {
        Ok(db) => db,
        Err(e) => return internal_error_response(&req, "Failed to open libSQL connection", &e),
    };

    let u = match authenticate_owner(&req, env, &db).await? {
        OwnerAuthResult::Authorized(u) => u,
        OwnerAuthResult::Unauthorized(resp) => return Ok(resp),
    };

    let resp = Response::from_json(&serde_json::json!({
        "user": {
            "id": u.id,
            "email": u.email,
            "createdAt": ts_to_rfc3339(u.created_at),
        }
    }))?;
    json_with_cors(&req, resp)
}
