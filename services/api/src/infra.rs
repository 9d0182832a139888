use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use submission_engine::config::LifecycleConfig;
use submission_engine::error::AppError;
use submission_engine::workflows::submissions::consumer::DEFAULT_DEDUP_TTL_HOURS;
use submission_engine::workflows::submissions::repository::CampaignReadRepository;
use submission_engine::workflows::submissions::{
    AutoApproveJob, CampaignLaunchedConsumer, Clock, DedupGate, IdGenerator, InMemoryEventBus,
    InMemorySubmissionStore, OutboxRelay, RelayReport, RetryPolicy, SubmissionError,
    SubmissionPorts, SubmissionService, ViewLockJob,
};
use tracing::{error, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process wiring of the submission service, its workers, the relay, and the inbound consumer.
pub(crate) struct LifecycleRuntime {
    pub(crate) service: Arc<SubmissionService>,
    pub(crate) store: Arc<InMemorySubmissionStore>,
    pub(crate) bus: Arc<InMemoryEventBus>,
    auto_approve: AutoApproveJob,
    view_lock: ViewLockJob,
    relay: OutboxRelay,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReconcileReport {
    pub(crate) auto_approved: usize,
    pub(crate) view_locked: usize,
    pub(crate) relay: RelayReport,
}

impl LifecycleRuntime {
    /// `campaigns` enables the campaign checks on create; without it the command's own rate is
    /// trusted.
    pub(crate) fn build(
        config: &LifecycleConfig,
        store: Arc<InMemorySubmissionStore>,
        campaigns: Option<Arc<dyn CampaignReadRepository>>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, AppError> {
        let bus = Arc::new(InMemoryEventBus::new());
        let ports = SubmissionPorts {
            submissions: store.clone(),
            campaigns,
            idempotency: store.clone(),
            outbox: store.clone(),
            clock: clock.clone(),
            ids,
        };

        let auto_approve = AutoApproveJob::new(&ports, store.clone())
            .with_batch_size(config.worker_batch_size)
            .disabled(config.auto_approve_disabled);
        let view_lock = ViewLockJob::new(&ports, store.clone())
            .with_batch_size(config.worker_batch_size)
            .with_fee_rate(config.platform_fee_rate)
            .disabled(config.view_lock_disabled);
        let relay = OutboxRelay::new(store.clone(), bus.clone(), clock.clone())
            .with_batch_size(config.worker_batch_size)
            .with_retry_policy(RetryPolicy::with_max_attempts(config.outbox_max_attempts));

        let consumer = Arc::new(CampaignLaunchedConsumer::new(DedupGate::new(
            store.clone(),
            clock,
            chrono::Duration::hours(DEFAULT_DEDUP_TTL_HOURS),
        )));
        let group = consumer.group().to_string();
        consumer.start(bus.as_ref())?;
        info!(group = %group, "campaign.launched consumer subscribed");

        Ok(Self {
            service: Arc::new(SubmissionService::new(ports, config.idempotency_ttl())),
            store,
            bus,
            auto_approve,
            view_lock,
            relay,
        })
    }

    /// Run both workers, then drain the outbox. A failing worker is logged and does not stop
    /// the relay.
    pub(crate) fn reconcile(&self) -> ReconcileReport {
        let auto_approved = self
            .auto_approve
            .run_once()
            .unwrap_or_else(|err| log_failure("auto_approve", &err));
        let view_locked = self
            .view_lock
            .run_once()
            .unwrap_or_else(|err| log_failure("view_lock", &err));
        let relay = self.relay.run_once().unwrap_or_else(|err| {
            log_failure("outbox_relay", &err);
            RelayReport::default()
        });

        ReconcileReport {
            auto_approved,
            view_locked,
            relay,
        }
    }
}

fn log_failure(job: &'static str, err: &SubmissionError) -> usize {
    error!(
        event = "submission_reconcile_failed",
        job,
        code = err.code(),
        error = %err,
        "reconciliation step failed"
    );
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use submission_engine::workflows::submissions::{
        CampaignForSubmission, CreateSubmission, FixedClock, SequentialIds, SubmissionStatus,
        SystemClock, UuidIdGenerator,
    };

    fn create_cmd(key: &str) -> CreateSubmission {
        CreateSubmission {
            idempotency_key: key.to_string(),
            creator_id: "creator-1".to_string(),
            campaign_id: "camp-1".to_string(),
            platform: "youtube".to_string(),
            post_url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            cpv_rate: 0.1,
        }
    }

    fn runtime(clock: Arc<FixedClock>) -> LifecycleRuntime {
        let store = Arc::new(InMemorySubmissionStore::new());
        store.set_campaign(CampaignForSubmission {
            campaign_id: "camp-1".to_string(),
            status: "active".to_string(),
            allowed_platforms: Vec::new(),
            rate_per_1k_views: 0.0,
        });
        LifecycleRuntime::build(
            &LifecycleConfig::default(),
            store.clone(),
            Some(store),
            clock,
            Arc::new(SequentialIds::new("rt")),
        )
        .expect("runtime builds")
    }

    #[test]
    fn reconcile_auto_approves_and_publishes() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        let runtime = runtime(clock.clone());
        runtime
            .service
            .create_submission(create_cmd("k1"))
            .expect("create succeeds");

        let first = runtime.reconcile();
        assert_eq!(first.auto_approved, 0);
        assert_eq!(first.relay.published, 1);

        clock.advance(Duration::hours(48));
        let second = runtime.reconcile();
        assert_eq!(second.auto_approved, 1);
        assert_eq!(second.relay.published, 1);
        assert_eq!(
            runtime.bus.published_types(),
            vec![
                "submission.created".to_string(),
                "submission.auto_approved".to_string()
            ]
        );
    }

    #[test]
    fn disabled_workers_still_drain_the_outbox() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0)
                .single()
                .expect("valid timestamp"),
        ));
        let config = LifecycleConfig {
            auto_approve_disabled: true,
            view_lock_disabled: true,
            ..LifecycleConfig::default()
        };
        let runtime = LifecycleRuntime::build(
            &config,
            Arc::new(InMemorySubmissionStore::new()),
            None,
            clock.clone(),
            Arc::new(SequentialIds::new("rt")),
        )
        .expect("runtime builds");
        runtime
            .service
            .create_submission(create_cmd("k1"))
            .expect("create succeeds");

        clock.advance(Duration::days(31));
        let report = runtime.reconcile();
        assert_eq!(report.auto_approved, 0);
        assert_eq!(report.view_locked, 0);
        assert_eq!(report.relay.published, 1);
        assert_eq!(
            runtime.bus.published_types(),
            vec!["submission.created".to_string()]
        );
    }

    #[test]
    fn serve_wiring_creates_without_a_campaign_catalog() {
        let runtime = LifecycleRuntime::build(
            &LifecycleConfig::default(),
            Arc::new(InMemorySubmissionStore::new()),
            None,
            Arc::new(SystemClock),
            Arc::new(UuidIdGenerator),
        )
        .expect("runtime builds");

        let outcome = runtime
            .service
            .create_submission(CreateSubmission {
                campaign_id: "camp-unknown".to_string(),
                ..create_cmd("k1")
            })
            .expect("create succeeds without campaign lookup");

        assert!(!outcome.replayed);
        assert_eq!(outcome.submission.status, SubmissionStatus::Pending);
        assert_eq!(outcome.submission.cpv_rate, 0.1);
        assert_eq!(runtime.store.submission_count(), 1);
    }
}
