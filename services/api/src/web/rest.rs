//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::ingest;
use crate::web::chat::{run_chat_turn, TurnOutcome};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Duration, Utc};
use mentor_core::domain::{SubscriptionStatus, UserProfile};
use mentor_core::ports::{NewSubscription, PaymentOrder, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        chat_handler,
        chat_history_handler,
        search_mentors_handler,
        upload_material_handler,
        create_payment_handler,
        payment_notification_handler,
    ),
    components(
        schemas(
            ChatRequest,
            ChatResponse,
            ChatHistoryEntry,
            MentorSummary,
            UploadResponse,
            PaymentRequest,
            PaymentResponse,
            PaymentNotification,
            StatusResponse,
        )
    ),
    tags(
        (name = "AI Mentor API", description = "API endpoints for the mentor chat platform.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Payloads
//=========================================================================================

/// One chat turn from the caller.
#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub user_id: Uuid,
    pub mentor_id: i64,
    pub message: String,
    pub business_type: Option<String>,
    pub user_first_name: Option<String>,
    pub business_snapshot: Option<String>,
}

/// The reply for one chat turn. `usage` is only present on the
/// `LIMIT_REACHED` soft denial.
#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub mentor: String,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    pub user_id: Uuid,
    pub mentor_id: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ChatHistoryEntry {
    pub sender: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub keyword: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MentorSummary {
    pub id: i64,
    pub name: String,
    pub expertise: String,
    pub category: String,
    pub price_per_month: i64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    pub mentor_id: i64,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub status: String,
    pub chunks: usize,
    pub topics: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub user_id: Uuid,
    pub mentor_id: i64,
    pub amount: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaymentResponse {
    pub token: String,
    pub redirect_url: String,
}

/// The gateway's asynchronous notification callback payload.
#[derive(Deserialize, ToSchema)]
pub struct PaymentNotification {
    pub order_id: String,
    pub transaction_status: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

/// Maps a port error onto the transport. Store unavailability is the only
/// failure allowed to fail a chat turn, and it surfaces as 503.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    error!("request failed: {:?}", e);
    match e {
        PortError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Storage is temporarily unavailable".to_string(),
        ),
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Run one chat turn against a mentor.
///
/// Quota exhaustion is a normal 200 response carrying the `LIMIT_REACHED`
/// sentinel, not an error status.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The mentor's reply, or the LIMIT_REACHED sentinel", body = ChatResponse),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = UserProfile {
        business_type: request.business_type,
        first_name: request.user_first_name,
        business_snapshot: request.business_snapshot,
    };

    let outcome = run_chat_turn(
        &app_state,
        request.user_id,
        request.mentor_id,
        &request.message,
        &profile,
    )
    .await
    .map_err(port_error_response)?;

    let response = match outcome {
        TurnOutcome::Reply { mentor_name, reply } => ChatResponse {
            mentor: mentor_name,
            reply,
            usage: None,
        },
        TurnOutcome::LimitReached { usage } => ChatResponse {
            mentor: "System".to_string(),
            reply: "LIMIT_REACHED".to_string(),
            usage: Some(usage),
        },
    };
    Ok(Json(response))
}

/// Full transcript for a (user, mentor) pair, oldest first.
#[utoipa::path(
    get,
    path = "/chat/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "The transcript", body = [ChatHistoryEntry]),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn chat_history_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = app_state
        .store
        .full_history(params.user_id, params.mentor_id)
        .await
        .map_err(port_error_response)?;

    let entries: Vec<ChatHistoryEntry> = history
        .into_iter()
        .map(|message| ChatHistoryEntry {
            sender: message.sender.as_str().to_string(),
            message: message.content,
            created_at: message.created_at,
        })
        .collect();
    Ok(Json(entries))
}

/// Active mentors, optionally filtered by keyword.
#[utoipa::path(
    get,
    path = "/mentors/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching mentors", body = [MentorSummary]),
    )
)]
pub async fn search_mentors_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mentors = app_state
        .store
        .search_mentors(params.keyword.as_deref())
        .await
        .map_err(port_error_response)?;

    let summaries: Vec<MentorSummary> = mentors
        .into_iter()
        .map(|mentor| MentorSummary {
            id: mentor.id,
            name: mentor.name,
            expertise: mentor.expertise,
            category: mentor.category,
            price_per_month: mentor.price_per_month,
        })
        .collect();
    Ok(Json(summaries))
}

/// Upload mentor material as UTF-8 text.
///
/// Replaces the mentor's knowledge wholesale: the text is chunked in
/// insertion order and an ordered topic list is derived from its headings.
#[utoipa::path(
    post,
    path = "/educator/upload",
    params(UploadParams),
    request_body(content_type = "multipart/form-data", description = "The document to ingest."),
    responses(
        (status = 200, description = "Material ingested", body = UploadResponse),
        (status = 400, description = "Bad request (e.g., missing file or not UTF-8)"),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn upload_material_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let text = if let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file bytes: {}", e),
            )
        })?;
        String::from_utf8(data.to_vec()).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Uploaded file is not valid UTF-8 text: {}", e),
            )
        })?
    } else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let chunks = ingest::chunk_text(&text, ingest::CHUNK_SIZE);
    let topics = ingest::derive_topics(&text);

    app_state
        .store
        .replace_knowledge(params.mentor_id, &chunks, &topics)
        .await
        .map_err(port_error_response)?;

    Ok(Json(UploadResponse {
        status: "ok".to_string(),
        chunks: chunks.len(),
        topics: topics.len(),
    }))
}

/// Create a payment order for one month of access to a mentor.
///
/// Inserts a `pending` subscription whose entitlement window only becomes
/// effective once the gateway notification settles it.
#[utoipa::path(
    post,
    path = "/payment/create",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Checkout token", body = PaymentResponse),
        (status = 503, description = "Payment gateway not configured or storage unavailable"),
    )
)]
pub async fn create_payment_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<PaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let gateway = app_state.payment.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments are not configured on this deployment".to_string(),
        )
    })?;

    let now = Utc::now();
    let order_id = format!(
        "SUB-{}-{}",
        &request.user_id.simple().to_string()[..4],
        now.format("%d%H%M%S")
    );
    let platform_fee = request.amount * app_state.config.platform_fee_percent / 100;

    let order = PaymentOrder {
        order_id: order_id.clone(),
        gross_amount: request.amount,
        email: request.email.unwrap_or_else(|| "-".to_string()),
        first_name: request.first_name.unwrap_or_else(|| "User".to_string()),
    };
    let token = gateway
        .create_transaction(&order)
        .await
        .map_err(port_error_response)?;

    app_state
        .store
        .insert_subscription(NewSubscription {
            user_id: request.user_id,
            mentor_id: request.mentor_id,
            order_id,
            expires_at: now + Duration::days(app_state.config.subscription_days),
            gross_amount: request.amount,
            net_amount: request.amount - platform_fee,
            platform_fee,
        })
        .await
        .map_err(port_error_response)?;

    Ok(Json(PaymentResponse {
        token: token.token,
        redirect_url: token.redirect_url,
    }))
}

/// Payment gateway webhook.
///
/// Transitions the order's subscription row out of `pending` exactly once;
/// unknown transaction statuses leave it untouched.
#[utoipa::path(
    post,
    path = "/payment/notification",
    request_body = PaymentNotification,
    responses(
        (status = 200, description = "Notification applied", body = StatusResponse),
        (status = 503, description = "Storage unavailable"),
    )
)]
pub async fn payment_notification_handler(
    State(app_state): State<Arc<AppState>>,
    Json(notification): Json<PaymentNotification>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = match notification.transaction_status.as_str() {
        "capture" | "settlement" => Some(SubscriptionStatus::Settlement),
        "cancel" | "deny" | "expire" => Some(SubscriptionStatus::Failed),
        _ => None,
    };

    if let Some(status) = status {
        app_state
            .store
            .apply_payment_status(&notification.order_id, status)
            .await
            .map_err(port_error_response)?;
    }

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// Liveness probe.
pub async fn home_handler() -> impl IntoResponse {
    Json(StatusResponse {
        status: "AI Mentor backend active".to_string(),
    })
}
