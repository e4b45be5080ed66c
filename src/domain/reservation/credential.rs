//! Check-in credential
//!
//! A random access token is issued when the slot is held. Only its SHA-256
//! hash is persisted; the clear token goes back to the client once, wrapped
//! in a scannable payload.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::Reservation;
use crate::shared::errors::{DomainError, DomainResult};

/// Freshly generated token and the hash to store
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub token: String,
    pub token_hash: String,
}

impl IssuedCredential {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        // 16 bytes = 32 hex chars
        let random_bytes: [u8; 16] = rng.gen();
        let token = hex::encode(random_bytes);
        let token_hash = hash_token(&token);
        Self { token, token_hash }
    }
}

pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanPayload {
    reservation_id: Uuid,
    connector_id: String,
    starts_at: DateTime<Utc>,
    token: String,
}

/// Base64 (URL-safe) JSON document meant to be rendered as a QR code.
pub fn scannable_payload(reservation: &Reservation, token: &str) -> DomainResult<String> {
    let payload = ScanPayload {
        reservation_id: reservation.id,
        connector_id: reservation.connector_id.clone(),
        starts_at: reservation.window.start(),
        token: token.to_string(),
    };
    let json = serde_json::to_vec(&payload)
        .map_err(|e| DomainError::DataIntegrity(format!("credential payload: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Extract the access token from a scanned payload.
pub fn token_from_payload(payload: &str) -> DomainResult<String> {
    let invalid =
        |reason: String| DomainError::Validation(format!("unreadable credential: {}", reason));

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim())
        .map_err(|e| invalid(e.to_string()))?;
    let parsed: ScanPayload = serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
    Ok(parsed.token)
}
