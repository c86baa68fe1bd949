//! Order entry facade
//!
//! Wires the composer and the confirmation flow to their collaborators and
//! keeps live confirmation sessions in a concurrent map. A session's map
//! entry is never held across the submission await: the session moves to
//! `processing` under the entry lock, the service call runs on its own task,
//! and that task applies the outcome after re-acquiring the entry. The caller
//! only waits on the task, so dropping the caller never strands a session in
//! `processing`.
//!
//! Idle sessions are evicted by a periodic sweep once they pass the
//! configured TTL.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::{AccountSnapshot, OrderData, OrderDraft, Quote, SymbolInfo};
use crate::services::{AccountService, QuoteSource, SubmissionService};

use super::composer::{DerivedValues, OrderComposer, QuickQuantity};
use super::confirmation::{dispatch, ConfirmationFlow};
use super::errors::{EngineError, FlowError, OrderField, ValidationError, ValidationResult};
use super::validation::validate_draft;

/// Derived values and field errors for a draft, without opening a session
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderPreview {
    pub draft: OrderDraft,
    pub quote: Option<Quote>,
    pub account: AccountSnapshot,
    pub derived: DerivedValues,
    pub quick_quantities: Vec<QuickQuantity>,
    pub errors: ValidationResult,
    pub admissible: bool,
}

pub struct OrderEntryEngine {
    config: EngineConfig,
    quotes: Arc<dyn QuoteSource>,
    accounts: Arc<dyn AccountService>,
    submitter: Arc<dyn SubmissionService>,
    sessions: Arc<DashMap<Uuid, ConfirmationFlow>>,
}

impl OrderEntryEngine {
    pub fn new(
        config: EngineConfig,
        quotes: Arc<dyn QuoteSource>,
        accounts: Arc<dyn AccountService>,
        submitter: Arc<dyn SubmissionService>,
    ) -> Self {
        Self {
            config,
            quotes,
            accounts,
            submitter,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn search_symbols(&self, query: &str) -> Vec<SymbolInfo> {
        self.quotes.search(query)
    }

    pub fn quote(&self, symbol: &str) -> Result<Quote, EngineError> {
        self.quotes
            .get_quote(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }

    /// Fresh order form backed by this engine's collaborators
    pub fn composer(&self) -> OrderComposer {
        OrderComposer::open(
            self.config.trading.clone(),
            Arc::clone(&self.quotes),
            Arc::clone(&self.accounts),
        )
    }

    fn composer_for(&self, draft: OrderDraft) -> Result<OrderComposer, EngineError> {
        let mut composer = self.composer();
        composer.load_draft(draft)?;
        Ok(composer)
    }

    pub fn preview(&self, draft: OrderDraft) -> Result<OrderPreview, EngineError> {
        let composer = self.composer_for(draft)?;
        let errors = composer.validate();
        Ok(OrderPreview {
            draft: composer.draft().clone(),
            quote: composer.quote().cloned(),
            account: *composer.account(),
            derived: composer.derived(),
            quick_quantities: composer.quick_quantities(),
            admissible: errors.is_empty(),
            errors,
        })
    }

    /// Validate a draft and open a confirmation session for it
    pub fn open_confirmation(&self, draft: OrderDraft) -> Result<ConfirmationFlow, EngineError> {
        let composer = self.composer_for(draft)?;
        let order = composer.build_order().map_err(EngineError::Rejected)?;

        let flow = ConfirmationFlow::new(order, &self.config.trading);
        self.sessions.insert(flow.id(), flow.clone());
        Ok(flow)
    }

    pub fn session(&self, id: Uuid) -> Result<ConfirmationFlow, EngineError> {
        self.sessions
            .get(&id)
            .map(|flow| flow.clone())
            .ok_or(EngineError::SessionNotFound(id))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn with_session<F>(&self, id: Uuid, apply: F) -> Result<ConfirmationFlow, EngineError>
    where
        F: FnOnce(&mut ConfirmationFlow) -> Result<(), FlowError>,
    {
        let snapshot = {
            let mut flow = self
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::SessionNotFound(id))?;
            apply(&mut flow)?;
            flow.clone()
        };

        if snapshot.is_terminal() && !snapshot.is_settled() {
            self.sessions.remove(&id);
            tracing::debug!(session = %id, "Cancelled session closed");
        }
        Ok(snapshot)
    }

    pub fn proceed(&self, id: Uuid) -> Result<ConfirmationFlow, EngineError> {
        self.with_session(id, ConfirmationFlow::proceed)
    }

    pub fn back(&self, id: Uuid) -> Result<ConfirmationFlow, EngineError> {
        self.with_session(id, ConfirmationFlow::back)
    }

    pub fn enter_otp(&self, id: Uuid, code: &str) -> Result<ConfirmationFlow, EngineError> {
        self.with_session(id, |flow| flow.enter_otp(code))
    }

    pub fn acknowledge(&self, id: Uuid) -> Result<ConfirmationFlow, EngineError> {
        self.with_session(id, ConfirmationFlow::acknowledge)
    }

    pub fn cancel(&self, id: Uuid) -> Result<ConfirmationFlow, EngineError> {
        self.with_session(id, ConfirmationFlow::cancel)
    }

    /// Send the session's order to the submission service.
    ///
    /// Returns the session as it stands after the call resolved. An OTP
    /// format error, a stale order or a submission already in flight leave
    /// the session where it was and make no service call. Once the session
    /// is in `processing` the call runs to completion even if this future
    /// is dropped.
    pub async fn submit(&self, id: Uuid) -> Result<ConfirmationFlow, EngineError> {
        let ticket = {
            let mut flow = self
                .sessions
                .get_mut(&id)
                .ok_or(EngineError::SessionNotFound(id))?;

            if self.config.confirmation.revalidate_on_submit && flow.otp_complete() {
                let errors = self.revalidate(flow.order());
                if !errors.is_empty() {
                    tracing::warn!(session = %id, errors = %errors, "Order went stale before submission");
                    return Err(EngineError::StaleOrder(errors));
                }
            }

            flow.begin_submission()?
        };

        let sessions = Arc::clone(&self.sessions);
        let submitter = Arc::clone(&self.submitter);
        let timeout = self.config.confirmation.submission_timeout();
        let settle_delay = self.config.confirmation.settle_delay();

        let handle = tokio::spawn(async move {
            let outcome = dispatch(submitter.as_ref(), &ticket, timeout).await;

            let snapshot = {
                let mut flow = sessions
                    .get_mut(&id)
                    .ok_or(EngineError::SessionNotFound(id))?;
                flow.resolve(outcome)?;
                flow.clone()
            };

            if snapshot.is_settled() {
                schedule_close(sessions, id, settle_delay);
            }
            Ok::<_, EngineError>(snapshot)
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(session = %id, error = %e, "Submission task failed");
                Err(EngineError::SubmissionLost(id))
            }
        }
    }

    /// Remove every session idle for longer than the configured TTL.
    /// Sessions with a submission in flight are kept. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        evict_idle_sessions(&self.sessions, self.config.confirmation.session_ttl())
    }

    /// Spawn the periodic idle-session sweep
    pub fn start_session_sweeper(&self) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let ttl = self.config.confirmation.session_ttl();
        let period = self.config.confirmation.sweep_interval().max(Duration::from_millis(1));

        tokio::spawn(async move {
            tracing::info!(ttl_ms = ttl.as_millis() as u64, "Session sweeper started");
            let mut sweep_timer = interval(period);
            loop {
                sweep_timer.tick().await;
                evict_idle_sessions(&sessions, ttl);
            }
        })
    }

    /// Re-run validation for a frozen order against fresh quote and account reads
    fn revalidate(&self, order: &OrderData) -> ValidationResult {
        let Some(quote) = self.quotes.get_quote(order.symbol()) else {
            let mut errors = ValidationResult::new();
            errors.insert(OrderField::Symbol, ValidationError::MissingSymbol);
            return errors;
        };
        let account = AccountSnapshot::new(
            self.accounts.balance(),
            self.accounts.holding(order.symbol()),
        );
        validate_draft(
            &OrderDraft::from(order),
            Some(&quote),
            &account,
            &self.config.trading,
        )
    }
}

/// Drop a settled session once the settle delay has passed
fn schedule_close(sessions: Arc<DashMap<Uuid, ConfirmationFlow>>, id: Uuid, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if sessions.remove(&id).is_some() {
            tracing::debug!(session = %id, "Settled session closed");
        }
    });
}

fn evict_idle_sessions(sessions: &DashMap<Uuid, ConfirmationFlow>, ttl: Duration) -> usize {
    let now = Utc::now();
    let mut evicted = 0;
    sessions.retain(|id, flow| {
        let expired = flow.is_expired(ttl, now);
        if expired {
            tracing::info!(session = %id, step = %flow.step_kind(), "Idle session evicted");
            evicted += 1;
        }
        !expired
    });
    if evicted > 0 {
        tracing::debug!(evicted, remaining = sessions.len(), "Session sweep finished");
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::errors::{StepKind, SubmissionError};
    use crate::models::{OrderAck, OrderSide, OrderType};
    use crate::services::{InMemoryAccountService, InMemoryQuoteSource};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockSubmission {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl SubmissionService for MockSubmission {
        async fn submit(&self, _order: &OrderData, otp: &str) -> Result<OrderAck, SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if let Some(reason) = &self.reject_with {
                return Err(SubmissionError::Rejected(format!("{} ({})", reason, otp)));
            }
            Ok(OrderAck {
                order_id: Uuid::new_v4(),
                order_number: "20250101000001".to_string(),
                accepted_at: Utc::now(),
            })
        }
    }

    struct Harness {
        engine: Arc<OrderEntryEngine>,
        quotes: Arc<InMemoryQuoteSource>,
        calls: Arc<AtomicUsize>,
    }

    fn harness(config: EngineConfig, delay: Duration, reject_with: Option<&str>) -> Harness {
        let quotes = Arc::new(InMemoryQuoteSource::with_demo_listings());
        let calls = Arc::new(AtomicUsize::new(0));
        let submitter = Arc::new(MockSubmission {
            calls: Arc::clone(&calls),
            delay,
            reject_with: reject_with.map(str::to_string),
        });
        let engine = OrderEntryEngine::new(
            config,
            quotes.clone(),
            Arc::new(InMemoryAccountService::new(50_000_000, 500)),
            submitter,
        );
        Harness {
            engine: Arc::new(engine),
            quotes,
            calls,
        }
    }

    fn default_harness() -> Harness {
        harness(EngineConfig::default(), Duration::ZERO, None)
    }

    fn vnm_draft(quantity: i64) -> OrderDraft {
        OrderDraft {
            symbol: Some("VNM".to_string()),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity,
            price: 85_200,
            stop_price: None,
        }
    }

    fn open_at_otp(engine: &OrderEntryEngine, code: &str) -> Uuid {
        let id = engine.open_confirmation(vnm_draft(100)).unwrap().id();
        engine.proceed(id).unwrap();
        engine.enter_otp(id, code).unwrap();
        id
    }

    #[test]
    fn test_preview_scenario_b() {
        let h = default_harness();
        let preview = h.engine.preview(vnm_draft(150)).unwrap();

        assert!(!preview.admissible);
        assert_eq!(
            preview.errors.get(OrderField::Quantity).unwrap().to_string(),
            "not a multiple of 100"
        );
        assert_eq!(preview.derived.max_quantity, 500);
        assert_eq!(preview.quick_quantities.len(), 4);
    }

    #[test]
    fn test_preview_unknown_symbol() {
        let h = default_harness();
        let mut draft = vnm_draft(100);
        draft.symbol = Some("ZZZ".to_string());

        assert!(matches!(
            h.engine.preview(draft),
            Err(EngineError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_open_confirmation_rejects_invalid_draft() {
        let h = default_harness();
        let mut draft = vnm_draft(100);
        draft.price = 95_000;

        let err = h.engine.open_confirmation(draft).unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.field_errors().unwrap().get(OrderField::Price).is_some());
        assert_eq!(h.engine.session_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_success_and_settle_close() {
        let mut config = EngineConfig::default();
        config.confirmation.settle_delay_ms = 20;
        let h = harness(config, Duration::ZERO, None);
        let id = open_at_otp(&h.engine, "123456");

        let flow = h.engine.submit(id).await.unwrap();
        assert_eq!(flow.step_kind(), StepKind::Success);
        assert!(flow.ack().is_some());
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        // still visible right after settling
        assert!(h.engine.session(id).is_ok());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(
            h.engine.session(id),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_short_otp_makes_no_call() {
        let h = default_harness();
        let id = open_at_otp(&h.engine, "12345");

        let err = h.engine.submit(id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Flow(FlowError::OtpFormat { expected: 6 })
        ));

        let flow = h.engine.session(id).unwrap();
        assert_eq!(flow.step_kind(), StepKind::Otp);
        assert!(flow.otp_error().is_some());
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_refused() {
        let h = harness(EngineConfig::default(), Duration::from_millis(100), None);
        let id = open_at_otp(&h.engine, "123456");

        let engine = Arc::clone(&h.engine);
        let first = tokio::spawn(async move { engine.submit(id).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.engine.session(id).unwrap().step_kind(), StepKind::Processing);

        let second = h.engine.submit(id).await.unwrap_err();
        assert!(matches!(
            second,
            EngineError::Flow(FlowError::SubmissionInFlight)
        ));

        // cancelling mid-flight is refused too
        assert!(h.engine.cancel(id).is_err());

        let flow = first.await.unwrap().unwrap();
        assert_eq!(flow.step_kind(), StepKind::Success);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_then_acknowledge_closes_session() {
        let h = harness(EngineConfig::default(), Duration::ZERO, Some("wrong OTP"));
        let id = open_at_otp(&h.engine, "654321");

        let flow = h.engine.submit(id).await.unwrap();
        assert_eq!(flow.step_kind(), StepKind::Error);
        assert_eq!(
            flow.submission_error().unwrap().to_string(),
            "Order rejected: wrong OTP (654321)"
        );

        let flow = h.engine.acknowledge(id).unwrap();
        assert_eq!(flow.step_kind(), StepKind::Cancelled);
        assert!(h.engine.session(id).is_err());
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let mut config = EngineConfig::default();
        config.confirmation.submission_timeout_ms = 10;
        let h = harness(config, Duration::from_millis(200), None);
        let id = open_at_otp(&h.engine, "123456");

        let flow = h.engine.submit(id).await.unwrap();
        assert_eq!(
            flow.submission_error(),
            Some(&SubmissionError::Timeout { after_ms: 10 })
        );
    }

    #[test]
    fn test_cancel_removes_session() {
        let h = default_harness();
        let id = h.engine.open_confirmation(vnm_draft(100)).unwrap().id();

        let flow = h.engine.cancel(id).unwrap();
        assert_eq!(flow.step_kind(), StepKind::Cancelled);
        assert!(matches!(
            h.engine.cancel(id),
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_frozen_summary_ignores_quote_moves() {
        let h = default_harness();
        let id = open_at_otp(&h.engine, "123456");

        let mut quote = h.quotes.get_quote("VNM").unwrap();
        quote.last = 90_000;
        h.quotes.upsert("Vinamilk", quote);

        let flow = h.engine.submit(id).await.unwrap();
        assert_eq!(flow.summary().total_cost, 8_532_780);
        assert_eq!(flow.order().price(), 85_200);
    }

    #[tokio::test]
    async fn test_revalidation_blocks_stale_order() {
        let mut config = EngineConfig::default();
        config.confirmation.revalidate_on_submit = true;
        let h = harness(config, Duration::ZERO, None);
        let id = open_at_otp(&h.engine, "123456");

        // band moves away from the frozen limit price
        let mut quote = h.quotes.get_quote("VNM").unwrap();
        quote.last = 95_000;
        quote.reference = 94_000;
        quote.floor = 87_500;
        quote.ceiling = 100_500;
        h.quotes.upsert("Vinamilk", quote);

        let err = h.engine.submit(id).await.unwrap_err();
        match err {
            EngineError::StaleOrder(errors) => {
                assert!(errors.get(OrderField::Price).is_some())
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.engine.session(id).unwrap().step_kind(), StepKind::Otp);
        assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revalidation_passes_fresh_order() {
        let mut config = EngineConfig::default();
        config.confirmation.revalidate_on_submit = true;
        let h = harness(config, Duration::ZERO, None);
        let id = open_at_otp(&h.engine, "123456");

        let flow = h.engine.submit(id).await.unwrap();
        assert_eq!(flow.step_kind(), StepKind::Success);
    }

    #[test]
    fn test_preview_huge_price_reports_errors() {
        let h = default_harness();
        let mut draft = vnm_draft(100);
        draft.price = i64::MAX;

        let preview = h.engine.preview(draft).unwrap();
        assert!(!preview.admissible);
        assert!(preview.errors.get(OrderField::Price).is_some());
        assert_eq!(preview.derived.order_value, i64::MAX);
        assert_eq!(preview.derived.total_cost, i64::MAX);
        assert_eq!(preview.derived.max_quantity, 0);
    }

    #[tokio::test]
    async fn test_dropped_submit_still_resolves() {
        let h = harness(EngineConfig::default(), Duration::from_millis(200), None);
        let id = open_at_otp(&h.engine, "123456");

        // caller goes away while the service call is in flight
        let gave_up = tokio::time::timeout(Duration::from_millis(20), h.engine.submit(id)).await;
        assert!(gave_up.is_err());
        assert_eq!(h.engine.session(id).unwrap().step_kind(), StepKind::Processing);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let flow = h.engine.session(id).unwrap();
        assert_eq!(flow.step_kind(), StepKind::Success);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_submit_failure_can_be_acknowledged() {
        let h = harness(EngineConfig::default(), Duration::from_millis(100), Some("wrong OTP"));
        let id = open_at_otp(&h.engine, "123456");

        let _ = tokio::time::timeout(Duration::from_millis(10), h.engine.submit(id)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(h.engine.session(id).unwrap().step_kind(), StepKind::Error);
        let flow = h.engine.acknowledge(id).unwrap();
        assert_eq!(flow.step_kind(), StepKind::Cancelled);
        assert!(h.engine.session(id).is_err());
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let mut config = EngineConfig::default();
        config.confirmation.session_ttl_ms = 50;
        let h = harness(config, Duration::ZERO, None);

        let idle = h.engine.open_confirmation(vnm_draft(100)).unwrap().id();
        let left_in_otp = open_at_otp(&h.engine, "12");
        tokio::time::sleep(Duration::from_millis(120)).await;
        let fresh = h.engine.open_confirmation(vnm_draft(100)).unwrap().id();

        assert_eq!(h.engine.evict_idle(), 2);
        assert!(matches!(
            h.engine.session(idle),
            Err(EngineError::SessionNotFound(_))
        ));
        assert!(h.engine.session(left_in_otp).is_err());
        assert!(h.engine.session(fresh).is_ok());
        assert_eq!(h.engine.session_count(), 1);
    }

    #[tokio::test]
    async fn test_sessions_in_flight_are_not_evicted() {
        let mut config = EngineConfig::default();
        config.confirmation.session_ttl_ms = 20;
        let h = harness(config, Duration::from_millis(200), None);
        let id = open_at_otp(&h.engine, "123456");

        let engine = Arc::clone(&h.engine);
        let pending = tokio::spawn(async move { engine.submit(id).await });

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(h.engine.evict_idle(), 0);
        assert_eq!(h.engine.session(id).unwrap().step_kind(), StepKind::Processing);

        let flow = pending.await.unwrap().unwrap();
        assert_eq!(flow.step_kind(), StepKind::Success);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let mut config = EngineConfig::default();
        config.confirmation.session_ttl_ms = 20;
        config.confirmation.sweep_interval_ms = 10;
        let h = harness(config, Duration::ZERO, None);

        let sweeper = h.engine.start_session_sweeper();
        let id = h.engine.open_confirmation(vnm_draft(100)).unwrap().id();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(h.engine.session(id).is_err());
        assert_eq!(h.engine.session_count(), 0);

        sweeper.abort();
    }
}
