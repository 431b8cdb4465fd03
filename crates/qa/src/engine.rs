//! Quality gate: score a generated content item and decide whether it may be
//! distributed.

use std::collections::BTreeMap;
use std::sync::Arc;

use campaign_core::channels::ChannelSpec;
use campaign_core::config::{AppConfig, QaConfig};
use campaign_core::content::{Content, ContentStatus, QaAction, QaReport};
use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::event_bus::{make_event, noop_sink, EventSink, EventType};
use tracing::{debug, info};

use crate::checks::{self, CheckResult};

/// Outcome of the threshold gate for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub requires_human_review: bool,
    pub recommended_action: QaAction,
}

/// Map a score and flag state to a decision.
///
/// APPROVE when the score clears the auto-approve threshold with no flags, or
/// when it merely clears the human-review threshold. The second arm approves
/// flagged content on score alone; review-worthiness is carried separately by
/// `requires_human_review`. The automated path never returns REJECT.
pub fn gate(score: f64, has_flags: bool, config: &QaConfig) -> GateDecision {
    let requires_human_review = has_flags || score < config.auto_approve_threshold;
    let recommended_action = if (score >= config.auto_approve_threshold && !has_flags)
        || score >= config.human_review_threshold
    {
        QaAction::Approve
    } else {
        QaAction::Revise
    };
    GateDecision {
        requires_human_review,
        recommended_action,
    }
}

pub struct QaEngine {
    config: QaConfig,
    platforms: BTreeMap<String, ChannelSpec>,
    event_sink: Arc<dyn EventSink>,
}

impl QaEngine {
    pub fn new(config: QaConfig, platforms: BTreeMap<String, ChannelSpec>) -> Self {
        Self {
            config,
            platforms,
            event_sink: noop_sink(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.qa.clone(), config.channels.clone())
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Run all four checks against `target_platform`, attach the report and
    /// move the content to `QA_PASSED` (APPROVE) or `QA_FAILED` (anything
    /// else). The content must be `GENERATED`.
    pub fn run_qa_checks(
        &self,
        content: &mut Content,
        target_platform: &str,
    ) -> CampaignResult<QaReport> {
        content.transition(ContentStatus::QaInProgress)?;

        let platform = self.platforms.get(target_platform);
        if platform.is_none() {
            debug!(platform = %target_platform, "No platform rules, using defaults");
        }

        let results: [CheckResult; 4] = [
            checks::technical_specs(content, platform, &self.config),
            checks::brand_compliance(content, &self.config),
            checks::content_accuracy(content, &self.config),
            checks::platform_requirements(content, platform),
        ];

        let mut report = QaReport::new(content.content_id);
        for result in results {
            if result.passed {
                report.qa_score += result.score_contribution();
                report.checks_passed.push(result.kind);
            } else {
                metrics::counter!("qa.flagged", "check" => result.kind.as_str()).increment(1);
                report.checks_flagged.push(result.into_flag());
            }
        }

        let decision = gate(
            report.qa_score,
            !report.checks_flagged.is_empty(),
            &self.config,
        );
        report.requires_human_review = decision.requires_human_review;
        report.recommended_action = decision.recommended_action;

        let next = if decision.recommended_action == QaAction::Approve {
            ContentStatus::QaPassed
        } else {
            ContentStatus::QaFailed
        };
        content.transition(next)?;
        content.qa_report = Some(report.clone());

        metrics::histogram!("qa.score").record(report.qa_score);
        info!(
            content_id = %content.content_id,
            platform = %target_platform,
            score = report.qa_score,
            flagged = report.checks_flagged.len(),
            action = ?report.recommended_action,
            "QA checks complete"
        );

        let event_type = if report.checks_flagged.is_empty() {
            EventType::QaPassed
        } else {
            EventType::QaFlagged
        };
        self.event_sink.emit(
            make_event(event_type, Some(content.batch_id), Some(content.content_id))
                .with_channel(target_platform)
                .with_detail(format!("score {}", report.qa_score)),
        );

        Ok(report)
    }

    /// Check a set of content items against one platform, in order.
    pub fn run_batch(
        &self,
        contents: &mut [Content],
        target_platform: &str,
    ) -> CampaignResult<Vec<QaReport>> {
        contents
            .iter_mut()
            .map(|c| self.run_qa_checks(c, target_platform))
            .collect()
    }

    /// Record a human decision on an already-checked item. APPROVE and
    /// REJECT settle the content; REVISE leaves it where it is.
    pub fn apply_review(
        &self,
        content: &mut Content,
        reviewer: &str,
        decision: QaAction,
        notes: Option<String>,
    ) -> CampaignResult<()> {
        if !matches!(
            content.status,
            ContentStatus::QaPassed | ContentStatus::QaFailed
        ) {
            return Err(CampaignError::InvalidTransition {
                entity: "content",
                from: content.status.to_string(),
                to: "reviewed".to_string(),
            });
        }
        let content_id = content.content_id;
        let report = content
            .qa_report
            .as_mut()
            .ok_or_else(|| CampaignError::not_found("qa_report", content_id))?;
        report.record_review(reviewer, decision, notes);

        match decision {
            QaAction::Approve => content.transition(ContentStatus::Approved)?,
            QaAction::Reject => content.transition(ContentStatus::Rejected)?,
            QaAction::Revise => {}
        }

        info!(
            content_id = %content_id,
            reviewer = %reviewer,
            decision = ?decision,
            "Human review recorded"
        );
        self.event_sink.emit(
            make_event(EventType::ContentReviewed, Some(content.batch_id), Some(content_id))
                .with_detail(format!("{:?} by {}", decision, reviewer)),
        );
        Ok(())
    }
}
