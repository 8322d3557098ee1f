use chrono::{DateTime, Utc};
use reservation_core::{ReservationId, ReservationStatus, Signature, SignedSolution, Solution};
use serde::{Deserialize, Serialize};

// ===== Quote =====

/// Parallel lists: `signatures[i]` attests `solutions[i]`
#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub solutions: Vec<Solution>,
    pub signatures: Vec<Signature>,
}

impl From<Vec<SignedSolution>> for QuoteResponse {
    fn from(offers: Vec<SignedSolution>) -> Self {
        let (solutions, signatures) = offers
            .into_iter()
            .map(|offer| (offer.solution, offer.signature))
            .unzip();
        Self {
            solutions,
            signatures,
        }
    }
}

// ===== Order =====

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderRequest {
    pub solution: Solution,
    pub signature: Signature,
}

impl From<OrderRequest> for SignedSolution {
    fn from(req: OrderRequest) -> Self {
        SignedSolution {
            solution: req.solution,
            signature: req.signature,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: ReservationId,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
}

// ===== Payment =====

/// The payment source may also arrive in the `Payment` header
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: ReservationId,
    #[serde(default)]
    pub source_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub order_id: ReservationId,
    pub status: ReservationStatus,
    pub charge_id: String,
    pub amount_cents: u64,
    pub currency: String,
}

// ===== Health =====

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_reservations: usize,
}
