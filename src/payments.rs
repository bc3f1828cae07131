use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub redirect_url: String,
}

/// The payment provider, seen only as "open an intent for this amount".
/// Confirmation arrives later as a separate event.
pub trait PaymentGateway: Send + Sync {
    fn create_intent(
        &self,
        amount: i64,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, AppError>;
}

/// Issues intents locally and sends every payer to the configured return
/// URL. Used until a real provider is wired in.
#[derive(Debug, Clone)]
pub struct StubGateway {
    return_url: String,
}

impl StubGateway {
    pub fn new(return_url: impl Into<String>) -> Self {
        Self {
            return_url: return_url.into(),
        }
    }
}

impl PaymentGateway for StubGateway {
    fn create_intent(
        &self,
        amount: i64,
        metadata: &BTreeMap<String, String>,
    ) -> Result<PaymentIntent, AppError> {
        if amount <= 0 {
            return Err(AppError::ValidationFailed(
                "payment amount must be > 0".to_string(),
            ));
        }

        let intent = PaymentIntent {
            id: format!("intent_{}", Uuid::new_v4().simple()),
            amount,
            redirect_url: self.return_url.clone(),
        };
        debug!(intent_id = %intent.id, amount, ?metadata, "payment intent created");
        Ok(intent)
    }
}
