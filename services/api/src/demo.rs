use crate::infra::{LifecycleRuntime, ReconcileReport};
use chrono::{Duration, Utc};
use clap::Args;
use std::sync::Arc;
use submission_engine::config::LifecycleConfig;
use submission_engine::error::AppError;
use submission_engine::workflows::submissions::repository::SubmissionRepository;
use submission_engine::workflows::submissions::{
    ApproveSubmission, BulkOperation, CampaignForSubmission, CreateSubmission, FixedClock,
    InMemorySubmissionStore, ReportSubmission, SequentialIds, SubmissionError, SubmissionId,
};

const DEMO_CAMPAIGN: &str = "demo-campaign";
const DEMO_CREATOR: &str = "creator-demo";
const DEMO_BRAND: &str = "brand-demo";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Views credited to the approved post before its verification window closes
    #[arg(long, default_value_t = 12_000)]
    pub(crate) views: u64,
    /// Campaign payout per 1K views
    #[arg(long, default_value_t = 0.25)]
    pub(crate) rate_per_1k_views: f64,
    /// Platform fee withheld at settlement (0.0 to 1.0)
    #[arg(long, default_value_t = 0.15)]
    pub(crate) platform_fee_rate: f64,
    /// Skip the moderation (report and bulk reject) portion of the demo
    #[arg(long)]
    pub(crate) skip_moderation: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            views: 12_000,
            rate_per_1k_views: 0.25,
            platform_fee_rate: 0.15,
            skip_moderation: false,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let config = LifecycleConfig {
        platform_fee_rate: args.platform_fee_rate,
        ..LifecycleConfig::default()
    };
    let store = Arc::new(InMemorySubmissionStore::new());
    let runtime = LifecycleRuntime::build(
        &config,
        store.clone(),
        Some(store),
        clock.clone(),
        Arc::new(SequentialIds::new("demo")),
    )?;
    runtime.store.set_campaign(CampaignForSubmission {
        campaign_id: DEMO_CAMPAIGN.to_string(),
        status: "active".to_string(),
        allowed_platforms: vec!["tiktok".to_string(), "instagram".to_string()],
        rate_per_1k_views: args.rate_per_1k_views,
    });

    println!("Submission lifecycle demo");
    let created = runtime.service.create_submission(CreateSubmission {
        idempotency_key: "demo-create-1".to_string(),
        creator_id: DEMO_CREATOR.to_string(),
        campaign_id: DEMO_CAMPAIGN.to_string(),
        platform: "tiktok".to_string(),
        post_url: "https://www.tiktok.com/@creator-demo/video/7301".to_string(),
        cpv_rate: 0.0,
    })?;
    let submission_id = created.submission.submission_id.clone();
    println!(
        "  created {} ({}) at {:.2} per 1K views",
        submission_id,
        created.submission.status.label(),
        created.submission.cpv_rate
    );

    let replay = runtime.service.create_submission(CreateSubmission {
        idempotency_key: "demo-create-1".to_string(),
        creator_id: DEMO_CREATOR.to_string(),
        campaign_id: DEMO_CAMPAIGN.to_string(),
        platform: "tiktok".to_string(),
        post_url: "https://www.tiktok.com/@creator-demo/video/7301".to_string(),
        cpv_rate: 0.0,
    })?;
    println!(
        "  retried create with the same key: replayed={} same_id={}",
        replay.replayed,
        replay.submission.submission_id == submission_id
    );

    let approved = runtime.service.approve(ApproveSubmission {
        idempotency_key: "demo-approve-1".to_string(),
        submission_id: submission_id.to_string(),
        actor_id: DEMO_BRAND.to_string(),
        reason: "matches the brief".to_string(),
    })?;
    println!("  brand review -> {}", approved.status.label());
    print_reconcile("after review", runtime.reconcile());

    if !args.skip_moderation {
        run_moderation(&runtime)?;
    }

    let mut synced = runtime
        .store
        .fetch(&submission_id)
        .map_err(SubmissionError::from)?
        .ok_or(SubmissionError::NotFound)?;
    synced.views_count = args.views;
    runtime
        .store
        .update(&synced)
        .map_err(SubmissionError::from)?;
    println!("  synced {} views", args.views);

    clock.advance(Duration::days(30));
    print_reconcile("30 days later", runtime.reconcile());

    let settled = runtime.service.get_submission(&submission_id, Some(DEMO_CREATOR))?;
    println!("\nSettlement for {}", settled.submission_id);
    println!("  status        : {}", settled.status.label());
    println!(
        "  locked views  : {}",
        settled.locked_views.unwrap_or_default()
    );
    if let Some(settlement) = settled.settlement {
        println!("  gross         : {:.2}", settlement.gross_amount);
        println!("  platform fee  : {:.2}", settlement.platform_fee);
        println!("  net payout    : {:.2}", settlement.net_amount);
    }

    let dashboard = runtime.service.brand_dashboard(DEMO_CAMPAIGN)?;
    println!(
        "\nCampaign dashboard: total={} pending={} approved={} rejected={} flagged={}",
        dashboard.total, dashboard.pending, dashboard.approved, dashboard.rejected, dashboard.flagged
    );
    println!("Events published: {}", runtime.bus.published_types().join(", "));

    Ok(())
}

fn run_moderation(runtime: &LifecycleRuntime) -> Result<(), AppError> {
    let mut flagged_ids: Vec<SubmissionId> = Vec::new();
    for (index, post) in ["https://instagram.com/p/demo1", "https://instagram.com/p/demo2"]
        .iter()
        .enumerate()
    {
        let created = runtime.service.create_submission(CreateSubmission {
            idempotency_key: format!("demo-create-ig-{index}"),
            creator_id: DEMO_CREATOR.to_string(),
            campaign_id: DEMO_CAMPAIGN.to_string(),
            platform: "instagram".to_string(),
            post_url: post.to_string(),
            cpv_rate: 0.0,
        })?;
        flagged_ids.push(created.submission.submission_id);
    }

    let reported = runtime.service.report(ReportSubmission {
        idempotency_key: "demo-report-1".to_string(),
        submission_id: flagged_ids[0].to_string(),
        reporter_id: "viewer-demo".to_string(),
        reason: "spam".to_string(),
        description: "reposted from another account".to_string(),
    })?;
    println!(
        "  viewer report on {} -> {}",
        flagged_ids[0],
        reported.status.label()
    );

    let bulk = runtime.service.bulk_operation(BulkOperation {
        idempotency_key: "demo-bulk-1".to_string(),
        actor_id: DEMO_BRAND.to_string(),
        operation_type: "bulk_reject".to_string(),
        submission_ids: flagged_ids.iter().map(ToString::to_string).collect(),
        reason_code: "off_brief".to_string(),
        reason: "does not follow the campaign brief".to_string(),
    })?;
    println!(
        "  bulk reject: processed={} succeeded={} failed={}",
        bulk.result.processed, bulk.result.succeeded_count, bulk.result.failed_count
    );
    print_reconcile("after moderation", runtime.reconcile());
    Ok(())
}

fn print_reconcile(label: &str, report: ReconcileReport) {
    println!(
        "  reconcile ({label}): auto_approved={} view_locked={} published={} retried={} dead_lettered={}",
        report.auto_approved,
        report.view_locked,
        report.relay.published,
        report.relay.retried,
        report.relay.dead_lettered
    );
}
