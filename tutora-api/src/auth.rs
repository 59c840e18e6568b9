use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use tutora_core::OtpStore;
use tutora_shared::models::events::NotificationPayload;
use tutora_shared::pii::{mask_phone, Masked};

use crate::error::AppError;
use crate::middleware::auth::CustomerClaims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/otp/request", post(request_otp))
        .route("/v1/auth/otp/verify", post(verify_otp))
}

#[derive(Debug, Deserialize)]
struct OtpRequest {
    phone: Masked<String>,
}

#[derive(Debug, Deserialize)]
struct OtpVerifyRequest {
    phone: Masked<String>,
    code: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

/// POST /v1/auth/otp/request
/// The code lives in the TTL store only; SMS delivery belongs to the
/// notification dispatcher.
async fn request_otp(
    State(state): State<AppState>,
    Json(req): Json<OtpRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = req.phone.into_inner();
    if phone.trim().is_empty() {
        return Err(AppError::ValidationError("phone is required".to_string()));
    }

    let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
    state
        .otp
        .put_code(&phone, &code, state.business_rules.otp_ttl_seconds)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let _ = state
        .kafka
        .publish_notification(&NotificationPayload {
            recipients: vec![phone.clone()],
            subject: "Your Tutora login code".to_string(),
            body: json!({ "kind": "otp", "code": code }),
        })
        .await;

    info!("login code issued for {}", mask_phone(&phone));
    Ok(Json(json!({ "status": "SENT" })))
}

/// POST /v1/auth/otp/verify
async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<OtpVerifyRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let phone = req.phone.into_inner();
    let stored = state
        .otp
        .take_code(&phone)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    match stored {
        Some(code) if code == req.code => {
            let claims = CustomerClaims {
                sub: phone.clone(),
                role: "CUSTOMER".to_string(),
                exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp()
                    as usize,
            };

            let token = encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(state.auth.secret.as_bytes()),
            )
            .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

            info!("customer authenticated via OTP: {}", mask_phone(&phone));
            Ok(Json(AuthResponse { token }))
        }
        _ => Err(AppError::AuthenticationError(
            "invalid or expired code".to_string(),
        )),
    }
}
