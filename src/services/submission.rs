use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::engine::errors::SubmissionError;
use crate::models::{OrderAck, OrderData};

use super::SubmissionService;

/// Stand-in for the broker backend: accepts every order after a fixed latency
///
/// The OTP is not checked here; only its shape was validated upstream.
pub struct SimulatedSubmissionService {
    latency: Duration,
    sequence: AtomicU64,
}

impl SimulatedSubmissionService {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            sequence: AtomicU64::new(0),
        }
    }

    /// Number of orders accepted so far
    pub fn accepted(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionService for SimulatedSubmissionService {
    async fn submit(&self, order: &OrderData, _otp: &str) -> Result<OrderAck, SubmissionError> {
        tokio::time::sleep(self.latency).await;

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let accepted_at = Utc::now();
        let ack = OrderAck {
            order_id: Uuid::new_v4(),
            order_number: format!("{}{:06}", accepted_at.format("%Y%m%d"), sequence),
            accepted_at,
        };

        tracing::info!(
            order_number = %ack.order_number,
            symbol = order.symbol(),
            side = ?order.side(),
            quantity = order.quantity(),
            price = order.price(),
            "Simulated order accepted"
        );
        Ok(ack)
    }
}
