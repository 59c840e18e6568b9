use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use tutora_core::{BookingStatus, Customer, CustomerStore, StoreError};

use crate::error::AppError;
use crate::middleware::auth::admin_auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/customers", post(create_customer))
        .route("/v1/admin/customers/{id}/entitlements", get(get_entitlements))
        .route(
            "/v1/admin/customers/{id}/bookings/{event_id}/cancel",
            post(cancel_booking),
        )
        .route(
            "/v1/admin/customers/{id}/bookings/{event_id}/note",
            post(set_booking_note),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            admin_auth_middleware,
        ))
}

#[derive(Debug, Deserialize)]
struct CreateCustomerRequest {
    id: Option<String>,
    display_name: String,
    contact_emails: Vec<String>,
    #[serde(default)]
    phone: Option<String>,
}

async fn create_customer(
    State(state): State<AppState>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if req.contact_emails.is_empty() {
        return Err(AppError::ValidationError(
            "at least one contact email is required".to_string(),
        ));
    }

    let id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut customer = Customer::new(id.clone(), req.display_name, req.contact_emails);
    customer.phone = req.phone;

    state.store.create(customer).await.map_err(|e| match e {
        StoreError::Backend(msg)
            if msg.contains("already exists") || msg.contains("duplicate key") =>
        {
            AppError::ConflictError(format!("customer {} already exists", id))
        }
        e => AppError::InternalServerError(e.to_string()),
    })?;

    info!(customer = %id, "customer record created");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn get_entitlements(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let versioned = state
        .store
        .get(&id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("customer not found: {}", id)))?;

    let customer = versioned.customer;
    Ok(Json(json!({
        "id": customer.id,
        "display_name": customer.display_name,
        "credit_blocks": customer.credit_blocks,
        "bookings": customer.bookings,
        "class_series": customer.class_series,
        "archived": customer.archived,
        "coupons": customer.coupons,
    })))
}

/// Admin cancel is a direct store write; the save path still recomputes
/// block statuses, so the record cannot end up inconsistent.
async fn cancel_booking(
    State(state): State<AppState>,
    Path((id, event_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let versioned = state
        .store
        .get(&id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("customer not found: {}", id)))?;
    let mut customer = versioned.customer;

    let Some(booking) = customer.booking_by_event_id_mut(&event_id) else {
        return Err(AppError::NotFoundError(format!(
            "booking not found: {}",
            event_id
        )));
    };
    booking.status = BookingStatus::Cancelled;

    save_admin_edit(&state, customer, versioned.version).await?;
    info!(customer = %id, booking = %event_id, "booking cancelled by admin");
    Ok(Json(json!({ "status": "CANCELLED" })))
}

#[derive(Debug, Deserialize)]
struct NoteRequest {
    note: String,
}

async fn set_booking_note(
    State(state): State<AppState>,
    Path((id, event_id)): Path<(String, String)>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<Value>, AppError> {
    let versioned = state
        .store
        .get(&id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("customer not found: {}", id)))?;
    let mut customer = versioned.customer;

    let Some(booking) = customer.booking_by_event_id_mut(&event_id) else {
        return Err(AppError::NotFoundError(format!(
            "booking not found: {}",
            event_id
        )));
    };
    booking.note = req.note;

    save_admin_edit(&state, customer, versioned.version).await?;
    Ok(Json(json!({ "status": "UPDATED" })))
}

async fn save_admin_edit(
    state: &AppState,
    customer: Customer,
    expected_version: u64,
) -> Result<(), AppError> {
    state
        .store
        .save(customer, expected_version)
        .await
        .map_err(|e| match e {
            StoreError::VersionConflict(_) => {
                AppError::ConflictError("record changed underneath, retry".to_string())
            }
            e => AppError::InternalServerError(e.to_string()),
        })
}
