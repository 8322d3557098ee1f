use crate::errors::{GatewayError, GatewayResult};
use crate::models::*;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use reservation_core::{Error as CoreError, PaymentInstrument, Query, ReservationId, SubjectId};

/// Resolve the caller from the `Authorization` header
async fn authenticate(req: &HttpRequest, state: &AppState) -> GatewayResult<SubjectId> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(GatewayError::MissingCredentials)?
        .to_str()
        .map_err(|_| CoreError::Auth("Authorization header is not valid ASCII".to_string()))?;

    Ok(state.identity.verify(header).await?)
}

// ===== Health Check =====
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    match state.service.active_reservations().await {
        Ok(active) => HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_reservations: active,
        }),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "message": e.to_string()
            }))
        }
    }
}

// ===== Metrics =====
pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.service.metrics().gather_text())
}

// ===== Quote =====
pub async fn query(
    state: web::Data<AppState>,
    body: web::Json<Query>,
) -> GatewayResult<HttpResponse> {
    tracing::debug!("Received one query request");
    let offers = state.service.quote(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(QuoteResponse::from(offers)))
}

// ===== Order =====
pub async fn place_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<OrderRequest>,
) -> GatewayResult<HttpResponse> {
    let subject = authenticate(&req, &state).await?;

    let reservation = state
        .service
        .place_order(body.into_inner().into(), subject)
        .await?;

    let expiry = state.service.config().reservation.expiry_seconds as i64;
    Ok(HttpResponse::Ok().json(OrderResponse {
        order_id: reservation.id,
        status: reservation.status,
        expires_at: reservation.placed_at + chrono::Duration::seconds(expiry),
    }))
}

// ===== Payment =====
pub async fn pay(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<PaymentRequest>,
) -> GatewayResult<HttpResponse> {
    let subject = authenticate(&req, &state).await?;
    let PaymentRequest {
        order_id,
        source_token,
    } = body.into_inner();

    let source_token = match source_token.filter(|token| !token.trim().is_empty()) {
        Some(token) => token,
        None => req
            .headers()
            .get("Payment")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default(),
    };

    let receipt = state
        .service
        .submit_payment(order_id, subject, PaymentInstrument { source_token })
        .await?;

    Ok(HttpResponse::Ok().json(PaymentResponse {
        order_id: receipt.reservation_id,
        status: receipt.status,
        charge_id: receipt.charge.charge_id,
        amount_cents: receipt.charge.amount_cents,
        currency: receipt.charge.currency,
    }))
}

// ===== Order Lookup =====
pub async fn get_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> GatewayResult<HttpResponse> {
    let subject = authenticate(&req, &state).await?;
    let id: ReservationId = path.into_inner().parse()?;

    let reservation = state
        .service
        .reservation(id)
        .await?
        .ok_or_else(|| CoreError::NotFoundOrExpired(format!("Reservation {}", id)))?;

    if !reservation.is_owned_by(&subject) {
        return Err(CoreError::Ownership(format!("Reservation {} belongs to another user", id)).into());
    }

    Ok(HttpResponse::Ok().json(reservation))
}
