//! End-to-end runs of the batch workflow against scripted collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campaign_core::batch::BatchStatus;
use campaign_core::channels::{DistributionStatus, SchedulingMode};
use campaign_core::config::{AppConfig, PipelineConfig};
use campaign_core::content::{signals, Content, ContentStatus, QaAction, QaCheckKind};
use campaign_core::error::CampaignError;
use campaign_core::event_bus::{capture_sink, EventType};
use campaign_core::types::{
    AspectRatio, AssetBundle, BrandGuidelines, GenerationConfig, Product, ProductCategory,
    Template, TemplateType,
};
use campaign_generation::{GenerationBackend, GenerationError};
use campaign_workflow::{ContentAnalyzer, WorkflowOrchestrator, CANCELLED_REASON};
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

// ─── Scripted collaborators ─────────────────────────────────────────────────

/// Renders after `delay_per_second × duration`, failing for prompts that
/// mention `fail_on`.
#[derive(Default)]
struct FakeBackend {
    fail_on: Option<&'static str>,
    delay_per_second: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn run(&self, _model_id: &str, input: &Value) -> Result<Option<Value>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let duration = input["duration"].as_u64().unwrap_or(1) as u32;
        tokio::time::sleep(self.delay_per_second * duration).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let prompt = input["prompt"].as_str().unwrap_or_default();
        if let Some(needle) = self.fail_on {
            if prompt.contains(needle) {
                return Err(GenerationError::Backend("model crashed".into()));
            }
        }
        Ok(Some(json!([format!(
            "https://cdn.example.test/{}x{}.mp4",
            input["width"], input["height"]
        )])))
    }
}

/// Reports every signal as clean.
struct CleanAnalyzer;

#[async_trait]
impl ContentAnalyzer for CleanAnalyzer {
    async fn analyze(&self, _content: &Content) -> anyhow::Result<Map<String, Value>> {
        let mut signals = Map::new();
        signals.insert(signals::RESOLUTION.into(), json!("1080p"));
        signals.insert(signals::COLOR_MATCH_SCORE.into(), json!(0.9));
        signals.insert(signals::LOGO_VISIBLE.into(), json!(true));
        signals.insert(signals::TYPOS_DETECTED.into(), json!(0));
        signals.insert(signals::PRODUCT_INFO_VERIFIED.into(), json!(true));
        signals.insert(signals::CTA_VISIBLE.into(), json!(true));
        Ok(signals)
    }
}

struct BrokenAnalyzer;

#[async_trait]
impl ContentAnalyzer for BrokenAnalyzer {
    async fn analyze(&self, _content: &Content) -> anyhow::Result<Map<String, Value>> {
        anyhow::bail!("vision service unreachable")
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────────────

fn bundle(names: &[&str]) -> AssetBundle {
    AssetBundle {
        customer_id: "cust-42".into(),
        campaign_id: "spring-launch".into(),
        products: names
            .iter()
            .map(|n| Product::new(*n, "A product worth filming", ProductCategory::Electronics, 49.0))
            .collect(),
        brand_guidelines: BrandGuidelines {
            brand_name: "Acme".into(),
            brand_colors: vec!["#112233".into()],
            fonts: vec![],
            tone_of_voice: "playful".into(),
            logo_url: None,
            primary_color: None,
            secondary_color: None,
        },
        created_at: Utc::now(),
    }
}

fn template(ratios: Vec<AspectRatio>, durations: Vec<u32>) -> Template {
    let mut template = Template::new("Launch", TemplateType::ProductAd);
    template.visual_config.aspect_ratios = ratios;
    template.visual_config.duration_seconds = durations;
    template
}

fn orchestrator(backend: Arc<FakeBackend>, concurrency: usize) -> WorkflowOrchestrator {
    let mut config = AppConfig::default();
    config.generation.max_retries = 1;
    config.generation.base_delay_ms = 10;
    config.pipeline = PipelineConfig {
        generation_concurrency: concurrency,
        ..PipelineConfig::default()
    };
    WorkflowOrchestrator::from_app_config(&config, backend)
}

fn channels(names: &[&str]) -> GenerationConfig {
    GenerationConfig::default().with_channels(names.iter().copied())
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_total_items_is_cartesian_product() {
    let orch = orchestrator(Arc::new(FakeBackend::default()), 4);
    let result = orch
        .run(
            bundle(&["Speaker", "Headphones"]),
            template(vec![AspectRatio::Vertical, AspectRatio::Square], vec![15]),
            channels(&["instagram_reels"]),
        )
        .await
        .unwrap();

    let batch = orch.get_batch(&result.batch_id).unwrap();
    assert_eq!(batch.total_items, 4);
    assert_eq!(batch.processed_items, 4);
    assert_eq!(batch.failed_items, 0);
    assert_eq!(batch.calculate_progress(), 100.0);
    assert_eq!(result.contents_generated, 4);

    let contents = orch.batch_contents(&result.batch_id).unwrap();
    let ratios: Vec<AspectRatio> = contents.iter().map(|c| c.aspect_ratio).collect();
    assert_eq!(
        ratios,
        vec![
            AspectRatio::Vertical,
            AspectRatio::Square,
            AspectRatio::Vertical,
            AspectRatio::Square
        ]
    );
    assert_eq!(contents[0].product_id, batch.asset_bundle.products[0].product_id);
    assert_eq!(contents[3].product_id, batch.asset_bundle.products[1].product_id);
}

#[tokio::test]
async fn test_full_pipeline_distributes_with_partial_channel_failure() {
    let sink = capture_sink();
    let orch = orchestrator(Arc::new(FakeBackend::default()), 2)
        .with_analyzer(Arc::new(CleanAnalyzer))
        .with_event_sink(sink.clone());

    let result = orch
        .run(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Vertical], vec![30]),
            channels(&["instagram_reels", "unknown_channel", "tiktok"]),
        )
        .await
        .unwrap();

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.contents_generated, 1);
    assert_eq!(result.contents_qa_passed, 1);
    assert_eq!(result.contents_distributed, 1);

    let batch = orch.get_batch(&result.batch_id).unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert!(batch.completed_at.is_some());

    let content = &orch.batch_contents(&result.batch_id).unwrap()[0];
    assert_eq!(content.status, ContentStatus::Distributed);
    let qa = content.qa_report.as_ref().unwrap();
    assert_eq!(qa.qa_score, 100.0);
    assert_eq!(qa.recommended_action, QaAction::Approve);
    assert!(!qa.requires_human_review);

    let reports = orch
        .repository()
        .distribution_reports(&content.content_id)
        .unwrap();
    let report = &reports[0];
    assert_eq!(report.channels_attempted, 3);
    assert_eq!(report.channels_succeeded, 2);
    assert_eq!(report.channels_failed, 1);
    let unknown = report.result_for("unknown_channel").unwrap();
    assert_eq!(unknown.status, DistributionStatus::Failed);
    assert_eq!(
        unknown.error_message.as_deref(),
        Some("Channel unknown_channel not configured")
    );

    assert_eq!(sink.count_type(EventType::BatchStarted), 1);
    assert_eq!(sink.count_type(EventType::ContentGenerated), 1);
    assert_eq!(sink.count_type(EventType::BatchCompleted), 1);
}

#[tokio::test]
async fn test_overlong_variant_is_held_back_by_qa() {
    let orch = orchestrator(Arc::new(FakeBackend::default()), 4).with_analyzer(Arc::new(CleanAnalyzer));
    let result = orch
        .run(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Vertical], vec![30, 120]),
            channels(&["instagram_reels"]),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.contents_generated, 2);
    assert_eq!(result.contents_qa_passed, 1);
    assert_eq!(result.contents_distributed, 1);

    let contents = orch.batch_contents(&result.batch_id).unwrap();
    let held = &contents[1];
    assert_eq!(held.duration_seconds, 120);
    assert_eq!(held.status, ContentStatus::QaFailed);
    let qa = held.qa_report.as_ref().unwrap();
    assert_eq!(qa.qa_score, 75.0);
    assert_eq!(qa.recommended_action, QaAction::Revise);
    assert!(qa.requires_human_review);
    assert!(qa.is_flagged(QaCheckKind::TechnicalSpecs));
}

#[tokio::test]
async fn test_generation_failure_is_scoped_to_item() {
    let backend = Arc::new(FakeBackend {
        fail_on: Some("Headphones"),
        ..FakeBackend::default()
    });
    let orch = orchestrator(backend, 4).with_analyzer(Arc::new(CleanAnalyzer));
    let result = orch
        .run(
            bundle(&["Speaker", "Headphones"]),
            template(vec![AspectRatio::Vertical], vec![15]),
            channels(&["tiktok"]),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.contents_generated, 1);
    assert_eq!(result.contents_distributed, 1);

    let batch = orch.get_batch(&result.batch_id).unwrap();
    assert_eq!(batch.processed_items, 2);
    assert_eq!(batch.failed_items, 1);

    let failed = &orch.batch_contents(&result.batch_id).unwrap()[1];
    assert_eq!(failed.status, ContentStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("Generation backend error: model crashed")
    );
    assert!(failed.qa_report.is_none());
}

#[tokio::test]
async fn test_scheduled_batch_is_approved_but_not_distributed() {
    let orch = orchestrator(Arc::new(FakeBackend::default()), 4).with_analyzer(Arc::new(CleanAnalyzer));
    let mut config = channels(&["tiktok", "youtube_shorts"]);
    config.scheduling_mode = SchedulingMode::Scheduled;
    config.scheduled_time = Some(Utc.with_ymd_and_hms(2031, 3, 1, 12, 0, 0).unwrap());

    let result = orch
        .run(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Vertical], vec![15]),
            config,
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.contents_qa_passed, 1);
    assert_eq!(result.contents_distributed, 0);

    let content = &orch.batch_contents(&result.batch_id).unwrap()[0];
    assert_eq!(content.status, ContentStatus::Approved);
    let report = &orch
        .repository()
        .distribution_reports(&content.content_id)
        .unwrap()[0];
    assert_eq!(report.channels_succeeded, 0);
    assert_eq!(report.channels_failed, 2);
    assert!(report
        .distribution_details
        .iter()
        .all(|r| r.status == DistributionStatus::Scheduled));
}

#[tokio::test]
async fn test_stage_failure_fails_batch_verbatim() {
    let sink = capture_sink();
    let orch = orchestrator(Arc::new(FakeBackend::default()), 4)
        .with_analyzer(Arc::new(BrokenAnalyzer))
        .with_event_sink(sink.clone());

    let result = orch
        .run(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Vertical], vec![15]),
            channels(&["tiktok"]),
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.contents_generated, 1);
    assert_eq!(result.contents_qa_passed, 0);
    assert_eq!(
        result.errors,
        vec!["qa stage failed: vision service unreachable".to_string()]
    );

    let batch = orch.get_batch(&result.batch_id).unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    assert_eq!(batch.error_message.as_deref(), Some(result.errors[0].as_str()));
    assert!(batch.completed_at.is_none());
    assert_eq!(sink.count_type(EventType::BatchFailed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_generation_pool_is_bounded_and_ordered() {
    let backend = Arc::new(FakeBackend {
        delay_per_second: Duration::from_millis(100),
        ..FakeBackend::default()
    });
    let orch = orchestrator(backend.clone(), 2);

    // Longer durations finish later, so completion order differs from
    // enumeration order.
    let result = orch
        .run(
            bundle(&["Speaker", "Headphones"]),
            template(vec![AspectRatio::Vertical], vec![30, 10, 20]),
            channels(&["tiktok"]),
        )
        .await
        .unwrap();

    assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 2);

    let durations: Vec<u32> = orch
        .batch_contents(&result.batch_id)
        .unwrap()
        .iter()
        .map(|c| c.duration_seconds)
        .collect();
    assert_eq!(durations, vec![30, 10, 20, 30, 10, 20]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_fails_unfinished_items() {
    let backend = Arc::new(FakeBackend {
        delay_per_second: Duration::from_secs(10),
        ..FakeBackend::default()
    });
    let orch = orchestrator(backend, 1);
    let batch = orch
        .create_batch(
            bundle(&["Speaker", "Headphones"]),
            template(vec![AspectRatio::Vertical], vec![15]),
            channels(&["tiktok"]),
        )
        .unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = orch
        .execute_with_cancellation(batch.batch_id, token)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.errors, vec!["workflow cancelled".to_string()]);
    assert_eq!(result.contents_generated, 0);

    let batch = orch.get_batch(&batch.batch_id).unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    assert_eq!(batch.error_message.as_deref(), Some("workflow cancelled"));
    assert_eq!(batch.processed_items, 2);
    assert_eq!(batch.failed_items, 2);

    for content in orch.batch_contents(&batch.batch_id).unwrap() {
        assert_eq!(content.status, ContentStatus::Failed);
        assert_eq!(content.error_message.as_deref(), Some(CANCELLED_REASON));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_by_batch_id() {
    let backend = Arc::new(FakeBackend {
        delay_per_second: Duration::from_secs(10),
        ..FakeBackend::default()
    });
    let orch = Arc::new(orchestrator(backend, 2));
    assert!(!orch.cancel(&uuid::Uuid::new_v4()));

    let batch = orch
        .create_batch(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Vertical], vec![15]),
            channels(&["tiktok"]),
        )
        .unwrap();
    let batch_id = batch.batch_id;

    let canceller = orch.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(canceller.cancel(&batch_id));
    });

    let result = orch.execute(batch_id).await.unwrap();
    assert!(!result.success);
    assert_eq!(
        orch.get_batch(&batch_id).unwrap().status,
        BatchStatus::Failed
    );
    assert!(!orch.cancel(&batch_id));
}

#[tokio::test]
async fn test_invalid_inputs_are_rejected_before_batch_exists() {
    let orch = orchestrator(Arc::new(FakeBackend::default()), 1);
    let err = orch
        .create_batch(
            bundle(&[]),
            template(vec![AspectRatio::Vertical], vec![15]),
            GenerationConfig::default(),
        )
        .unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));
}

#[tokio::test]
async fn test_batch_runs_only_once() {
    let orch = orchestrator(Arc::new(FakeBackend::default()), 1);
    let batch = orch
        .create_batch(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Square], vec![15]),
            channels(&["tiktok"]),
        )
        .unwrap();
    orch.execute(batch.batch_id).await.unwrap();
    let err = orch.execute(batch.batch_id).await.unwrap_err();
    assert!(matches!(err, CampaignError::InvalidTransition { .. }));

    let missing = orch.execute(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, CampaignError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_execute_runs_batch_once() {
    let backend = Arc::new(FakeBackend {
        delay_per_second: Duration::from_millis(10),
        ..FakeBackend::default()
    });
    let orch = Arc::new(orchestrator(backend.clone(), 1));
    let batch = orch
        .create_batch(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Square], vec![15]),
            channels(&["tiktok"]),
        )
        .unwrap();
    let batch_id = batch.batch_id;

    let first = tokio::spawn({
        let orch = orch.clone();
        async move { orch.execute(batch_id).await }
    });
    let second = tokio::spawn({
        let orch = orch.clone();
        async move { orch.execute(batch_id).await }
    });
    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    let rejected = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(
        rejected,
        CampaignError::AlreadyRunning(_) | CampaignError::InvalidTransition { .. }
    ));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(orch.batch_contents(&batch_id).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_run_releases_its_claim() {
    let backend = Arc::new(FakeBackend {
        delay_per_second: Duration::from_secs(1),
        ..FakeBackend::default()
    });
    let orch = orchestrator(backend, 1);
    let batch = orch
        .create_batch(
            bundle(&["Speaker"]),
            template(vec![AspectRatio::Square], vec![15]),
            channels(&["tiktok"]),
        )
        .unwrap();

    let run = orch.execute(batch.batch_id);
    assert!(tokio::time::timeout(Duration::from_secs(1), run).await.is_err());
    assert!(!orch.cancel(&batch.batch_id));
}
