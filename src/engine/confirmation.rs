//! Confirmation flow state machine
//!
//! ```text
//! review --continue--> otp --submit--> processing --resolve--> success
//!    ^                  |                            \-------> error --acknowledge--> cancelled
//!    +------back--------+
//! review | otp --cancel--> cancelled
//! ```
//!
//! `processing` has no user-triggered exit: a second submit while a
//! submission is outstanding is refused, so the submission service is
//! called at most once per session.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::config::TradingRules;
use crate::models::{OrderAck, OrderData};
use crate::services::SubmissionService;

use super::errors::{FlowAction, FlowError, StepKind, SubmissionError};
use super::fees::OrderSummary;

/// Current step of a confirmation session, with the data owned by that step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStep {
    Review,
    Otp {
        code: String,
        error: Option<FlowError>,
    },
    Processing,
    Success {
        ack: OrderAck,
    },
    Error {
        reason: SubmissionError,
    },
    Cancelled,
}

impl ConfirmationStep {
    pub fn kind(&self) -> StepKind {
        match self {
            ConfirmationStep::Review => StepKind::Review,
            ConfirmationStep::Otp { .. } => StepKind::Otp,
            ConfirmationStep::Processing => StepKind::Processing,
            ConfirmationStep::Success { .. } => StepKind::Success,
            ConfirmationStep::Error { .. } => StepKind::Error,
            ConfirmationStep::Cancelled => StepKind::Cancelled,
        }
    }
}

/// Everything the submission call needs, taken when entering `processing`
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    pub session_id: Uuid,
    pub order: OrderData,
    pub otp: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmationFlow {
    id: Uuid,
    order: OrderData,
    summary: OrderSummary,
    otp_length: usize,
    step: ConfirmationStep,
    submissions: u32,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl ConfirmationFlow {
    /// Start a session in `review`. The money summary is computed here,
    /// once, from the frozen order.
    pub fn new(order: OrderData, rules: &TradingRules) -> Self {
        let summary = OrderSummary::for_order(&order, rules.fee_rate);
        let now = Utc::now();
        let flow = Self {
            id: Uuid::new_v4(),
            order,
            summary,
            otp_length: rules.otp_length,
            step: ConfirmationStep::Review,
            submissions: 0,
            created_at: now,
            last_activity: now,
        };

        tracing::info!(
            session = %flow.id,
            symbol = flow.order.symbol(),
            side = ?flow.order.side(),
            order_type = flow.order.order_type().code(),
            quantity = flow.order.quantity(),
            price = flow.order.price(),
            total_cost = flow.summary.total_cost,
            "Confirmation session opened"
        );
        flow
    }

    /// review -> otp
    pub fn proceed(&mut self) -> Result<(), FlowError> {
        match self.step {
            ConfirmationStep::Review => {
                self.transition(
                    FlowAction::Continue,
                    ConfirmationStep::Otp {
                        code: String::new(),
                        error: None,
                    },
                );
                Ok(())
            }
            _ => Err(self.reject(FlowAction::Continue)),
        }
    }

    /// otp -> review, dropping whatever code was typed
    pub fn back(&mut self) -> Result<(), FlowError> {
        match self.step {
            ConfirmationStep::Otp { .. } => {
                self.transition(FlowAction::Back, ConfirmationStep::Review);
                Ok(())
            }
            _ => Err(self.reject(FlowAction::Back)),
        }
    }

    /// Replace the OTP input. Non-digits are dropped and the code is cut
    /// to the configured length.
    pub fn enter_otp(&mut self, input: &str) -> Result<(), FlowError> {
        let otp_length = self.otp_length;
        match &mut self.step {
            ConfirmationStep::Otp { code, error } => {
                *code = input
                    .chars()
                    .filter(char::is_ascii_digit)
                    .take(otp_length)
                    .collect();
                *error = None;
                self.last_activity = Utc::now();
                Ok(())
            }
            _ => Err(self.reject(FlowAction::EnterOtp)),
        }
    }

    /// True when the OTP input holds a full-length code
    pub fn otp_complete(&self) -> bool {
        matches!(&self.step, ConfirmationStep::Otp { code, .. } if code.len() == self.otp_length)
    }

    /// otp -> processing
    ///
    /// A short code keeps the session in `otp` with a local error and no
    /// ticket. The returned ticket must be resolved with [`resolve`](Self::resolve).
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket, FlowError> {
        let otp_length = self.otp_length;
        let otp = match &mut self.step {
            ConfirmationStep::Otp { code, .. } if code.len() == otp_length => {
                std::mem::take(code)
            }
            ConfirmationStep::Otp { code, error } => {
                let err = FlowError::OtpFormat {
                    expected: otp_length,
                };
                tracing::debug!(session = %self.id, entered = code.len(), "OTP incomplete");
                *error = Some(err.clone());
                return Err(err);
            }
            ConfirmationStep::Processing => {
                tracing::warn!(session = %self.id, "Submit ignored: submission already in flight");
                return Err(FlowError::SubmissionInFlight);
            }
            _ => return Err(self.reject(FlowAction::Submit)),
        };

        self.submissions += 1;
        self.transition(FlowAction::Submit, ConfirmationStep::Processing);
        Ok(SubmissionTicket {
            session_id: self.id,
            order: self.order.clone(),
            otp,
        })
    }

    /// processing -> success | error
    pub fn resolve(&mut self, outcome: Result<OrderAck, SubmissionError>) -> Result<(), FlowError> {
        if self.step != ConfirmationStep::Processing {
            return Err(self.reject(FlowAction::Resolve));
        }

        match outcome {
            Ok(ack) => {
                tracing::info!(
                    session = %self.id,
                    order_id = %ack.order_id,
                    order_number = %ack.order_number,
                    "Order accepted"
                );
                self.transition(FlowAction::Resolve, ConfirmationStep::Success { ack });
            }
            Err(reason) => {
                tracing::warn!(session = %self.id, error = %reason, "Order submission failed");
                self.transition(FlowAction::Resolve, ConfirmationStep::Error { reason });
            }
        }
        Ok(())
    }

    /// error -> cancelled; nothing is resubmitted
    pub fn acknowledge(&mut self) -> Result<(), FlowError> {
        match self.step {
            ConfirmationStep::Error { .. } => {
                self.transition(FlowAction::Acknowledge, ConfirmationStep::Cancelled);
                Ok(())
            }
            _ => Err(self.reject(FlowAction::Acknowledge)),
        }
    }

    /// review | otp -> cancelled
    pub fn cancel(&mut self) -> Result<(), FlowError> {
        match self.step {
            ConfirmationStep::Review | ConfirmationStep::Otp { .. } => {
                self.transition(FlowAction::Cancel, ConfirmationStep::Cancelled);
                Ok(())
            }
            _ => Err(self.reject(FlowAction::Cancel)),
        }
    }

    /// Enter `processing`, call the service once and resolve with its outcome
    pub async fn submit(
        &mut self,
        service: &dyn SubmissionService,
        timeout: Duration,
    ) -> Result<(), FlowError> {
        let ticket = self.begin_submission()?;
        let outcome = dispatch(service, &ticket, timeout).await;
        self.resolve(outcome)
    }

    fn transition(&mut self, action: FlowAction, next: ConfirmationStep) {
        tracing::info!(
            session = %self.id,
            from = %self.step.kind(),
            to = %next.kind(),
            action = %action,
            "Confirmation step changed"
        );
        self.step = next;
        self.last_activity = Utc::now();
    }

    fn reject(&self, action: FlowAction) -> FlowError {
        let err = FlowError::InvalidTransition {
            step: self.step.kind(),
            action,
        };
        tracing::warn!(session = %self.id, error = %err, "Transition rejected");
        err
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn order(&self) -> &OrderData {
        &self.order
    }

    pub fn summary(&self) -> &OrderSummary {
        &self.summary
    }

    pub fn step(&self) -> &ConfirmationStep {
        &self.step
    }

    pub fn step_kind(&self) -> StepKind {
        self.step.kind()
    }

    pub fn otp_code(&self) -> Option<&str> {
        match &self.step {
            ConfirmationStep::Otp { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn otp_error(&self) -> Option<&FlowError> {
        match &self.step {
            ConfirmationStep::Otp { error, .. } => error.as_ref(),
            _ => None,
        }
    }

    pub fn ack(&self) -> Option<&OrderAck> {
        match &self.step {
            ConfirmationStep::Success { ack } => Some(ack),
            _ => None,
        }
    }

    pub fn submission_error(&self) -> Option<&SubmissionError> {
        match &self.step {
            ConfirmationStep::Error { reason } => Some(reason),
            _ => None,
        }
    }

    /// Number of submission service calls issued for this session (0 or 1)
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last step change or OTP edit
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Idle for longer than `ttl` as of `now`. A session in `processing`
    /// never expires.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        if self.step == ConfirmationStep::Processing {
            return false;
        }
        (now - self.last_activity)
            .to_std()
            .map_or(false, |idle| idle > ttl)
    }

    /// The order was accepted
    pub fn is_settled(&self) -> bool {
        matches!(self.step, ConfirmationStep::Success { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.step,
            ConfirmationStep::Success { .. } | ConfirmationStep::Cancelled
        )
    }
}

/// Make the single submission call for a ticket, bounded by `timeout`
pub async fn dispatch(
    service: &dyn SubmissionService,
    ticket: &SubmissionTicket,
    timeout: Duration,
) -> Result<OrderAck, SubmissionError> {
    match tokio::time::timeout(timeout, service.submit(&ticket.order, &ticket.otp)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(SubmissionError::Timeout {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockSubmission {
        calls: Arc<AtomicUsize>,
        outcome: Result<(), SubmissionError>,
        delay: Duration,
    }

    impl MockSubmission {
        fn accepting() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                outcome: Ok(()),
                delay: Duration::ZERO,
            }
        }

        fn failing(reason: SubmissionError) -> Self {
            Self {
                outcome: Err(reason),
                ..Self::accepting()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SubmissionService for MockSubmission {
        async fn submit(&self, _order: &OrderData, _otp: &str) -> Result<OrderAck, SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone().map(|_| OrderAck {
                order_id: Uuid::new_v4(),
                order_number: "20250101000001".to_string(),
                accepted_at: Utc::now(),
            })
        }
    }

    fn vnm_order() -> OrderData {
        OrderData::new(
            "VNM".to_string(),
            OrderSide::Buy,
            OrderType::Limit,
            100,
            85_200,
            None,
        )
    }

    fn flow_at_otp(code: &str) -> ConfirmationFlow {
        let mut flow = ConfirmationFlow::new(vnm_order(), &TradingRules::default());
        flow.proceed().unwrap();
        flow.enter_otp(code).unwrap();
        flow
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_new_session_starts_in_review() {
        let flow = ConfirmationFlow::new(vnm_order(), &TradingRules::default());

        assert_eq!(flow.step_kind(), StepKind::Review);
        assert_eq!(flow.summary().order_value, 8_520_000);
        assert_eq!(flow.summary().fee, 12_780);
        assert_eq!(flow.summary().total_cost, 8_532_780);
        assert!(!flow.is_terminal());
    }

    #[test]
    fn test_back_clears_otp() {
        let mut flow = flow_at_otp("123");
        flow.back().unwrap();
        assert_eq!(flow.step_kind(), StepKind::Review);

        flow.proceed().unwrap();
        assert_eq!(flow.otp_code(), Some(""));
    }

    #[test]
    fn test_enter_otp_sanitises_input() {
        let mut flow = flow_at_otp("12a-3 4567890");
        assert_eq!(flow.otp_code(), Some("123456"));

        flow.enter_otp("９9").unwrap();
        assert_eq!(flow.otp_code(), Some("9"));
    }

    #[test]
    fn test_enter_otp_outside_otp_step() {
        let mut flow = ConfirmationFlow::new(vnm_order(), &TradingRules::default());
        assert_eq!(
            flow.enter_otp("123456"),
            Err(FlowError::InvalidTransition {
                step: StepKind::Review,
                action: FlowAction::EnterOtp,
            })
        );
    }

    #[tokio::test]
    async fn test_scenario_e_short_otp_stays_in_otp() {
        let service = MockSubmission::accepting();
        let mut flow = flow_at_otp("12345");

        let err = flow.submit(&service, TIMEOUT).await.unwrap_err();

        assert_eq!(err, FlowError::OtpFormat { expected: 6 });
        assert_eq!(flow.step_kind(), StepKind::Otp);
        assert_eq!(flow.otp_error(), Some(&FlowError::OtpFormat { expected: 6 }));
        assert_eq!(flow.otp_code(), Some("12345"));
        assert_eq!(service.calls(), 0);

        // typing again clears the local error
        flow.enter_otp("123456").unwrap();
        assert_eq!(flow.otp_error(), None);
    }

    #[tokio::test]
    async fn test_happy_path() {
        let service = MockSubmission::accepting();
        let mut flow = flow_at_otp("123456");

        flow.submit(&service, TIMEOUT).await.unwrap();

        assert_eq!(flow.step_kind(), StepKind::Success);
        assert!(flow.is_settled());
        assert!(flow.is_terminal());
        assert!(flow.ack().is_some());
        assert_eq!(service.calls(), 1);
        assert_eq!(flow.submissions(), 1);
    }

    #[tokio::test]
    async fn test_scenario_f_failure_then_acknowledge() {
        let service = MockSubmission::failing(SubmissionError::Rejected("invalid OTP".to_string()));
        let mut flow = flow_at_otp("123456");

        flow.submit(&service, TIMEOUT).await.unwrap();
        assert_eq!(flow.step_kind(), StepKind::Error);
        assert_eq!(
            flow.submission_error().unwrap().to_string(),
            "Order rejected: invalid OTP"
        );

        flow.acknowledge().unwrap();
        assert_eq!(flow.step_kind(), StepKind::Cancelled);
        assert!(flow.is_terminal());

        // nothing gets the session back to submitting
        assert!(flow.submit(&service, TIMEOUT).await.is_err());
        assert!(flow.proceed().is_err());
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_lands_in_error() {
        let service = MockSubmission {
            delay: Duration::from_millis(200),
            ..MockSubmission::accepting()
        };
        let mut flow = flow_at_otp("123456");

        flow.submit(&service, Duration::from_millis(20)).await.unwrap();

        assert_eq!(
            flow.submission_error(),
            Some(&SubmissionError::Timeout { after_ms: 20 })
        );
        assert_eq!(service.calls(), 1);
    }

    #[test]
    fn test_single_submission_while_processing() {
        let mut flow = flow_at_otp("123456");

        let ticket = flow.begin_submission().unwrap();
        assert_eq!(ticket.otp, "123456");
        assert_eq!(ticket.session_id, flow.id());
        assert_eq!(flow.step_kind(), StepKind::Processing);

        assert_eq!(flow.begin_submission().unwrap_err(), FlowError::SubmissionInFlight);
        assert_eq!(flow.submissions(), 1);
    }

    #[test]
    fn test_processing_refuses_user_actions() {
        let mut flow = flow_at_otp("123456");
        flow.begin_submission().unwrap();

        assert!(flow.cancel().is_err());
        assert!(flow.back().is_err());
        assert!(flow.proceed().is_err());
        assert!(flow.acknowledge().is_err());
        assert_eq!(flow.step_kind(), StepKind::Processing);
    }

    #[test]
    fn test_resolve_only_from_processing() {
        let mut flow = flow_at_otp("123456");
        let err = flow
            .resolve(Err(SubmissionError::Unavailable("down".to_string())))
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidTransition {
                step: StepKind::Otp,
                action: FlowAction::Resolve,
            }
        );
    }

    #[test]
    fn test_cancel_from_review_and_otp() {
        let mut flow = ConfirmationFlow::new(vnm_order(), &TradingRules::default());
        flow.cancel().unwrap();
        assert_eq!(flow.step_kind(), StepKind::Cancelled);

        let mut flow = flow_at_otp("12");
        flow.cancel().unwrap();
        assert_eq!(flow.step_kind(), StepKind::Cancelled);
        assert_eq!(flow.submissions(), 0);
    }

    #[test]
    fn test_idle_session_expires() {
        let mut flow = flow_at_otp("12");
        let ttl = Duration::from_secs(60);
        let later = flow.last_activity() + chrono::Duration::seconds(61);

        assert!(!flow.is_expired(ttl, Utc::now()));
        assert!(flow.is_expired(ttl, later));

        // any step change or OTP edit restarts the idle clock
        flow.enter_otp("123").unwrap();
        assert!(flow.last_activity() >= flow.created_at());
        assert!(!flow.is_expired(ttl, flow.last_activity() + chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_processing_session_never_expires() {
        let mut flow = flow_at_otp("123456");
        flow.begin_submission().unwrap();

        let much_later = flow.last_activity() + chrono::Duration::days(1);
        assert!(!flow.is_expired(Duration::from_secs(1), much_later));
    }
}
