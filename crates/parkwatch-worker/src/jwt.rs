//! HS256 bearer tokens for owner sessions.
//!
//! Notes:
//! - Only JSON object payloads are supported.
//! - base64url encoding WITHOUT padding.
//! - Signature verification goes through `Hmac::verify_slice`.
//!
//! Intentionally small and wasm-friendly; no JWT crate needed for a single
//! fixed algorithm and claim set.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Owner session lifetime: 30 days.
pub const TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported token header")]
    UnsupportedHeader,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token processing failed: {0}")]
    Internal(String),
}

/// Session claims carried by every owner token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner account id.
    pub sub: String,
    pub email: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn b64url_decode(s: &str) -> Result<Vec<u8>, JwtError> {
    URL_SAFE_NO_PAD.decode(s.as_bytes()).map_err(|_| JwtError::Malformed)
}

/// Issue a signed session token for an owner account.
pub fn issue(secret: &[u8], user_id: &str, email: &str, now: i64) -> Result<String, JwtError> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| JwtError::Internal(format!("serialize header: {e}")))?;
    let claims_json = serde_json::to_vec(&claims)
        .map_err(|e| JwtError::Internal(format!("serialize claims: {e}")))?;

    let signing_input = format!("{}.{}", b64url_encode(&header_json), b64url_encode(&claims_json));

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| JwtError::Internal(format!("invalid HMAC key: {e}")))?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = b64url_encode(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Verify signature and expiry, returning the claims.
pub fn verify(secret: &[u8], token: &str, now: i64) -> Result<Claims, JwtError> {
    let token = token.replace(char::is_whitespace, "");
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::Malformed);
    };
    if parts.next().is_some() {
        return Err(JwtError::Malformed);
    }

    // Parse the header first so an alg switch fails loudly.
    let header_raw = b64url_decode(header_b64)?;
    let header: JwtHeader =
        serde_json::from_slice(&header_raw).map_err(|_| JwtError::Malformed)?;
    if header.alg != "HS256" || !header.typ.eq_ignore_ascii_case("JWT") {
        return Err(JwtError::UnsupportedHeader);
    }

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig = b64url_decode(sig_b64)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| JwtError::Internal(format!("invalid HMAC key: {e}")))?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&sig).map_err(|_| JwtError::BadSignature)?;

    let payload_raw = b64url_decode(payload_b64)?;
    let claims: Claims =
        serde_json::from_slice(&payload_raw).map_err(|_| JwtError::Malformed)?;

    if claims.exp <= now {
        return Err(JwtError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-key";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn roundtrip_preserves_claims() {
        let token = issue(SECRET, "user-1", "a@b.example", NOW).unwrap();
        let claims = verify(SECRET, &token, NOW + 60).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@b.example");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + TOKEN_TTL_SECS);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(SECRET, "user-1", "a@b.example", NOW).unwrap();
        let err = verify(SECRET, &token, NOW + TOKEN_TTL_SECS).unwrap_err();
        assert!(matches!(err, JwtError::Expired));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = issue(SECRET, "user-1", "a@b.example", NOW).unwrap();
        let err = verify(b"other-key", &token, NOW).unwrap_err();
        assert!(matches!(err, JwtError::BadSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue(SECRET, "user-1", "a@b.example", NOW).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();

        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: "user-2".to_string(),
                email: "a@b.example".to_string(),
                iat: NOW,
                exp: NOW + TOKEN_TTL_SECS,
            })
            .unwrap(),
        );
        parts[1] = &forged;

        let err = verify(SECRET, &parts.join("."), NOW).unwrap_err();
        assert!(matches!(err, JwtError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(verify(SECRET, "not-a-token", NOW), Err(JwtError::Malformed)));
        assert!(matches!(verify(SECRET, "a.b.c.d", NOW), Err(JwtError::Malformed)));
    }
}
