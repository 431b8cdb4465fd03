//! Drives a batch through generate → QA gate → distribute.
//!
//! Stage 1 renders every (product, aspect ratio, duration) combination on a
//! bounded worker pool. A single collector loop receives finished items,
//! updates the batch counters and persists progress, then restores
//! enumeration order before stage 2 begins. Stages 2 and 3 walk the items in
//! that order; stage 3 fans each item out across channels inside the
//! distribution engine.

use std::sync::Arc;

use campaign_channels::DistributionEngine;
use campaign_core::batch::{Batch, BatchStatus};
use campaign_core::config::{AppConfig, PipelineConfig};
use campaign_core::content::{Content, ContentStatus, QaAction};
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::event_bus::{make_event, noop_sink, EventSink, EventType};
use campaign_core::repository::PipelineRepository;
use campaign_core::types::{AssetBundle, GenerationConfig, Product, Template};
use campaign_core::validation::validate_batch_inputs;
use campaign_generation::{ContentGenerator, GenerationBackend, GenerationClient, GenerationOutcome};
use campaign_qa::QaEngine;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analyzer::{ContentAnalyzer, NoopAnalyzer};
use crate::error::{Stage, WorkflowError};
use crate::memory::InMemoryRepository;

pub const CANCELLED_REASON: &str = "cancelled";

/// Aggregate outcome of one workflow run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkflowResult {
    pub batch_id: Uuid,
    pub success: bool,
    pub contents_generated: u32,
    pub contents_qa_passed: u32,
    pub contents_distributed: u32,
    pub errors: Vec<String>,
}

impl WorkflowResult {
    fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            success: false,
            contents_generated: 0,
            contents_qa_passed: 0,
            contents_distributed: 0,
            errors: Vec::new(),
        }
    }
}

/// Marks an item failed, logging instead of propagating a rejected
/// transition.
fn fail_content(content: &mut Content, reason: &str) {
    if let Err(e) = content.fail(reason) {
        warn!(content_id = %content.content_id, error = %e, "Could not mark content failed");
    }
}

fn cancelled(mut content: Content) -> GenerationOutcome {
    if content.status == ContentStatus::Pending || content.status == ContentStatus::Generating {
        fail_content(&mut content, CANCELLED_REASON);
    }
    GenerationOutcome {
        content,
        success: false,
    }
}

/// Holds a batch's slot in the active-run table; releasing it on drop also
/// covers a run whose future is dropped mid-flight.
struct ActiveRun {
    active: Arc<DashMap<Uuid, CancellationToken>>,
    batch_id: Uuid,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.active.remove(&self.batch_id);
    }
}

pub struct WorkflowOrchestrator {
    config: PipelineConfig,
    repository: Arc<dyn PipelineRepository>,
    generator: Arc<ContentGenerator>,
    qa: Arc<QaEngine>,
    distribution: Arc<DistributionEngine>,
    analyzer: Arc<dyn ContentAnalyzer>,
    event_sink: Arc<dyn EventSink>,
    active: Arc<DashMap<Uuid, CancellationToken>>,
}

impl WorkflowOrchestrator {
    pub fn new(
        config: PipelineConfig,
        generator: ContentGenerator,
        qa: QaEngine,
        distribution: DistributionEngine,
    ) -> Self {
        Self {
            config,
            repository: Arc::new(InMemoryRepository::new()),
            generator: Arc::new(generator),
            qa: Arc::new(qa),
            distribution: Arc::new(distribution),
            analyzer: Arc::new(NoopAnalyzer),
            event_sink: noop_sink(),
            active: Arc::new(DashMap::new()),
        }
    }

    /// Wire every engine from application configuration.
    pub fn from_app_config(config: &AppConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        let client = Arc::new(GenerationClient::from_config(backend, &config.generation));
        Self::new(
            config.pipeline.clone(),
            ContentGenerator::new(client),
            QaEngine::from_app_config(config),
            DistributionEngine::from_app_config(config),
        )
    }

    pub fn with_repository(mut self, repository: Arc<dyn PipelineRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn repository(&self) -> &Arc<dyn PipelineRepository> {
        &self.repository
    }

    /// Validate inputs and store a new `PENDING` batch.
    pub fn create_batch(
        &self,
        asset_bundle: AssetBundle,
        template: Template,
        generation_config: GenerationConfig,
    ) -> CampaignResult<Batch> {
        validate_batch_inputs(&asset_bundle, &template)?;
        let batch = Batch::new(asset_bundle, template, generation_config);
        batch.planned_items()?;
        self.repository.save_batch(&batch)?;
        info!(
            batch_id = %batch.batch_id,
            campaign_id = %batch.campaign_id,
            products = batch.asset_bundle.products.len(),
            "Batch created"
        );
        Ok(batch)
    }

    pub fn get_batch(&self, batch_id: &Uuid) -> CampaignResult<Batch> {
        self.repository
            .get_batch(batch_id)?
            .ok_or_else(|| CampaignError::not_found("batch", batch_id))
    }

    pub fn batch_contents(&self, batch_id: &Uuid) -> CampaignResult<Vec<Content>> {
        self.repository.list_contents(batch_id)
    }

    /// Request cancellation of a running batch. Returns false when the batch
    /// is not running.
    pub fn cancel(&self, batch_id: &Uuid) -> bool {
        match self.active.get(batch_id) {
            Some(token) => {
                info!(batch_id = %batch_id, "Cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Create and execute in one call.
    pub async fn run(
        &self,
        asset_bundle: AssetBundle,
        template: Template,
        generation_config: GenerationConfig,
    ) -> CampaignResult<WorkflowResult> {
        let batch = self.create_batch(asset_bundle, template, generation_config)?;
        self.execute(batch.batch_id).await
    }

    pub async fn execute(&self, batch_id: Uuid) -> CampaignResult<WorkflowResult> {
        self.execute_with_cancellation(batch_id, CancellationToken::new())
            .await
    }

    /// Run a stored `PENDING` batch to completion. Stage failures are
    /// reported in the result and on the batch; `Err` means the batch could
    /// not be started at all.
    pub async fn execute_with_cancellation(
        &self,
        batch_id: Uuid,
        token: CancellationToken,
    ) -> CampaignResult<WorkflowResult> {
        let _claim = self.claim(batch_id, &token)?;
        let mut batch = self.get_batch(&batch_id)?;
        let total = batch.plan()?;
        batch.transition(BatchStatus::GenerationInProgress)?;
        self.repository.save_batch(&batch)?;

        info!(batch_id = %batch_id, total_items = total, "Workflow started");
        self.event_sink.emit(
            make_event(EventType::BatchStarted, Some(batch_id), None)
                .with_detail(format!("{} items", total)),
        );

        let mut result = WorkflowResult::new(batch_id);
        let outcome = self.run_stages(&mut batch, &mut result, &token).await;

        match outcome {
            Ok(()) => {
                batch.transition(BatchStatus::Completed)?;
                result.success = true;
                metrics::counter!("workflow.completed").increment(1);
                info!(
                    batch_id = %batch_id,
                    generated = result.contents_generated,
                    qa_passed = result.contents_qa_passed,
                    distributed = result.contents_distributed,
                    "Workflow completed"
                );
                self.event_sink
                    .emit(make_event(EventType::BatchCompleted, Some(batch_id), None));
            }
            Err(e) => {
                let message = e.to_string();
                if batch.fail(message.clone()).is_err() {
                    batch.error_message = Some(message.clone());
                }
                metrics::counter!("workflow.failed").increment(1);
                error!(batch_id = %batch_id, error = %message, "Workflow failed");
                self.event_sink.emit(
                    make_event(EventType::BatchFailed, Some(batch_id), None)
                        .with_detail(message.clone()),
                );
                result.errors.push(message);
            }
        }

        self.repository.save_batch(&batch)?;
        Ok(result)
    }

    /// Registers the run before the batch is read, so concurrent callers
    /// cannot both observe it as `PENDING`.
    fn claim(&self, batch_id: Uuid, token: &CancellationToken) -> CampaignResult<ActiveRun> {
        match self.active.entry(batch_id) {
            Entry::Occupied(_) => Err(CampaignError::AlreadyRunning(batch_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(ActiveRun {
                    active: self.active.clone(),
                    batch_id,
                })
            }
        }
    }

    async fn run_stages(
        &self,
        batch: &mut Batch,
        result: &mut WorkflowResult,
        token: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let contents = self.generation_stage(batch, token).await?;
        result.contents_generated = contents
            .iter()
            .filter(|c| c.status == ContentStatus::Generated)
            .count() as u32;
        if token.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        batch
            .transition(BatchStatus::QaInProgress)
            .map_err(WorkflowError::at(Stage::Qa))?;
        self.save_batch(batch, Stage::Qa)?;
        let approved = self.qa_stage(batch, contents, result, token).await?;

        batch
            .transition(BatchStatus::DistributionInProgress)
            .map_err(WorkflowError::at(Stage::Distribution))?;
        self.save_batch(batch, Stage::Distribution)?;
        self.distribution_stage(batch, approved, result, token)
            .await
    }

    /// Render every combination, returning contents in enumeration order.
    async fn generation_stage(
        &self,
        batch: &mut Batch,
        token: &CancellationToken,
    ) -> Result<Vec<Content>, WorkflowError> {
        let template = Arc::new(batch.template.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.generation_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut prepared: Vec<Content> = Vec::new();
        let mut slots: Vec<Option<Content>> = Vec::new();

        for product in &batch.asset_bundle.products {
            let product = Arc::new(product.clone());
            for &aspect_ratio in &template.visual_config.aspect_ratios {
                for &duration in &template.visual_config.duration_seconds {
                    let content = self.generator.prepare(
                        batch.batch_id,
                        &product,
                        &template,
                        aspect_ratio,
                        duration,
                    );
                    self.save_content(&content, Stage::Generation)?;
                    let index = prepared.len();
                    prepared.push(content.clone());
                    slots.push(None);

                    self.spawn_generation(
                        &mut tasks,
                        index,
                        content,
                        product.clone(),
                        template.clone(),
                        semaphore.clone(),
                        token.clone(),
                    );
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome): (usize, GenerationOutcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tasks.abort_all();
                    let message = format!("generation task aborted: {}", e);
                    self.abandon(batch, &prepared, &mut slots, &message);
                    return Err(WorkflowError::stage(Stage::Generation, message));
                }
            };
            let collected = self.collect(batch, &outcome);
            slots[index] = Some(outcome.content);
            if let Err(e) = collected {
                tasks.abort_all();
                self.abandon(batch, &prepared, &mut slots, &e.to_string());
                return Err(e);
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_generation(
        &self,
        tasks: &mut JoinSet<(usize, GenerationOutcome)>,
        index: usize,
        content: Content,
        product: Arc<Product>,
        template: Arc<Template>,
        semaphore: Arc<Semaphore>,
        token: CancellationToken,
    ) {
        let generator = self.generator.clone();
        tasks.spawn(async move {
            let pending = content.clone();
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => return (index, cancelled(pending)),
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return (index, cancelled(pending)),
                },
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => (index, cancelled(pending)),
                outcome = generator.generate(content, &product, &template) => (index, outcome),
            }
        });
    }

    /// Apply one finished item to the batch. Only the collector loop calls
    /// this, so counter updates never race.
    fn collect(&self, batch: &mut Batch, outcome: &GenerationOutcome) -> Result<(), WorkflowError> {
        let content = &outcome.content;
        batch.increment_processed(outcome.success);
        self.save_content(content, Stage::Generation)?;
        self.save_batch(batch, Stage::Generation)?;

        let event = if outcome.success {
            make_event(EventType::ContentGenerated, Some(batch.batch_id), Some(content.content_id))
        } else {
            make_event(
                EventType::ContentGenerationFailed,
                Some(batch.batch_id),
                Some(content.content_id),
            )
            .with_detail(content.error_message.clone().unwrap_or_default())
        };
        self.event_sink.emit(event);
        Ok(())
    }

    /// Fail every item that has not reported back yet.
    fn abandon(
        &self,
        batch: &mut Batch,
        prepared: &[Content],
        slots: &mut [Option<Content>],
        reason: &str,
    ) {
        for (slot, pending) in slots.iter_mut().zip(prepared) {
            if slot.is_some() {
                continue;
            }
            let mut content = pending.clone();
            fail_content(&mut content, reason);
            batch.increment_processed(false);
            if let Err(e) = self.repository.save_content(&content) {
                warn!(content_id = %content.content_id, error = %e, "Could not persist abandoned content");
            }
            *slot = Some(content);
        }
    }

    async fn qa_stage(
        &self,
        batch: &Batch,
        mut contents: Vec<Content>,
        result: &mut WorkflowResult,
        token: &CancellationToken,
    ) -> Result<Vec<Content>, WorkflowError> {
        let platform = batch
            .generation_config
            .target_channels
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_channel.clone());

        let mut approved = Vec::new();
        for content in contents
            .iter_mut()
            .filter(|c| c.status == ContentStatus::Generated)
        {
            if token.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            let signals = self
                .analyzer
                .analyze(content)
                .await
                .map_err(|e| WorkflowError::stage(Stage::Qa, e))?;
            content.metadata.extend(signals);

            let report = self
                .qa
                .run_qa_checks(content, &platform)
                .map_err(WorkflowError::at(Stage::Qa))?;
            self.save_content(content, Stage::Qa)?;

            if report.recommended_action == QaAction::Approve {
                result.contents_qa_passed += 1;
                approved.push(content.clone());
            }
        }

        info!(
            batch_id = %batch.batch_id,
            platform = %platform,
            approved = approved.len(),
            "QA stage complete"
        );
        Ok(approved)
    }

    async fn distribution_stage(
        &self,
        batch: &Batch,
        approved: Vec<Content>,
        result: &mut WorkflowResult,
        token: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let mut channels = batch.generation_config.target_channels.clone();
        if channels.is_empty() {
            channels.push(self.config.default_channel.clone());
        }
        let scheduling = batch.generation_config.scheduling();

        for mut content in approved {
            if token.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }
            content
                .transition(ContentStatus::Approved)
                .map_err(WorkflowError::at(Stage::Distribution))?;

            let report = self
                .distribution
                .publish(&content, &channels, &scheduling)
                .await;
            self.repository
                .save_distribution_report(&report)
                .map_err(WorkflowError::at(Stage::Distribution))?;

            if report.is_distributed() {
                content
                    .transition(ContentStatus::Distributed)
                    .map_err(WorkflowError::at(Stage::Distribution))?;
                result.contents_distributed += 1;
            }
            self.save_content(&content, Stage::Distribution)?;
        }
        Ok(())
    }

    fn save_batch(&self, batch: &Batch, stage: Stage) -> Result<(), WorkflowError> {
        self.repository
            .save_batch(batch)
            .map_err(WorkflowError::at(stage))
    }

    fn save_content(&self, content: &Content, stage: Stage) -> Result<(), WorkflowError> {
        self.repository
            .save_content(content)
            .map_err(WorkflowError::at(stage))
    }
}
