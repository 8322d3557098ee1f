use async_trait::async_trait;
use chrono::Utc;
use reservation_core::{ChargeReceipt, ChargeRequest, Error, PaymentGateway, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Source tokens with this prefix are declined
pub const DECLINED_TOKEN_PREFIX: &str = "tok_chargeDeclined";

/// In-process stand-in for a card processor
pub struct SandboxPaymentGateway {
    latency_ms: u64,
    captured: AtomicU64,
}

impl SandboxPaymentGateway {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            captured: AtomicU64::new(0),
        }
    }

    /// Number of successful captures
    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SandboxPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt> {
        info!(
            "Sandbox: charging {} {} for {}",
            request.amount_cents, request.currency, request.reservation_id
        );

        // Simulate network latency
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }

        if request.source_token.is_empty() {
            return Err(Error::Payment("No payment source provided".to_string()));
        }

        if request.source_token.starts_with(DECLINED_TOKEN_PREFIX) {
            warn!(reservation_id = %request.reservation_id, "Sandbox: card declined");
            return Err(Error::Payment("Your card was declined".to_string()));
        }

        self.captured.fetch_add(1, Ordering::SeqCst);

        Ok(ChargeReceipt {
            charge_id: format!("ch_{}", Uuid::new_v4().simple()),
            amount_cents: request.amount_cents,
            currency: request.currency.clone(),
            charged_at: Utc::now(),
        })
    }
}
