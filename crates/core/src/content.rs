//! Generated content and its quality-assurance report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};
use crate::types::AspectRatio;

/// Well-known metadata keys. Quality signals are written by the upstream
/// analysis collaborator; processing keys by the content generator.
pub mod signals {
    pub const RESOLUTION: &str = "resolution";
    pub const COLOR_MATCH_SCORE: &str = "color_match_score";
    pub const LOGO_VISIBLE: &str = "logo_visible";
    pub const TYPOS_DETECTED: &str = "typos_detected";
    pub const PRODUCT_INFO_VERIFIED: &str = "product_info_verified";
    pub const CTA_VISIBLE: &str = "cta_visible";
    pub const PROCESSING_TIME: &str = "processing_time";
    pub const MODEL_USED: &str = "model_used";
    pub const QA_FLAGS: &str = "qa_flags";
}

// ─── Content state machine ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    Pending,
    Generating,
    Generated,
    /// Reserved for manual re-generation; the automated pipeline never enters it.
    GeneratedRetry,
    QaInProgress,
    QaPassed,
    QaFailed,
    Approved,
    Rejected,
    Distributed,
    Failed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "PENDING",
            ContentStatus::Generating => "GENERATING",
            ContentStatus::Generated => "GENERATED",
            ContentStatus::GeneratedRetry => "GENERATED_RETRY",
            ContentStatus::QaInProgress => "QA_IN_PROGRESS",
            ContentStatus::QaPassed => "QA_PASSED",
            ContentStatus::QaFailed => "QA_FAILED",
            ContentStatus::Approved => "APPROVED",
            ContentStatus::Rejected => "REJECTED",
            ContentStatus::Distributed => "DISTRIBUTED",
            ContentStatus::Failed => "FAILED",
        }
    }

    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        match self {
            // Pending -> Failed covers items cancelled before dispatch.
            Pending => matches!(next, Generating | Failed),
            Generating => matches!(next, Generated | Failed),
            Generated => next == QaInProgress,
            Failed => next == GeneratedRetry,
            GeneratedRetry => next == Generating,
            QaInProgress => matches!(next, QaPassed | QaFailed),
            QaPassed | QaFailed => matches!(next, Approved | Rejected),
            Approved => next == Distributed,
            Rejected | Distributed => false,
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── QA report ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QaAction {
    Approve,
    Revise,
    Reject,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QaCheckKind {
    TechnicalSpecs,
    BrandCompliance,
    ContentAccuracy,
    PlatformRequirements,
}

impl QaCheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QaCheckKind::TechnicalSpecs => "TECHNICAL_SPECS",
            QaCheckKind::BrandCompliance => "BRAND_COMPLIANCE",
            QaCheckKind::ContentAccuracy => "CONTENT_ACCURACY",
            QaCheckKind::PlatformRequirements => "PLATFORM_REQUIREMENTS",
        }
    }
}

impl fmt::Display for QaCheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A failed check and what it found.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaFlag {
    pub check: QaCheckKind,
    pub severity: Severity,
    pub issues: Vec<String>,
}

/// Outcome of the automated quality gate for one content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub content_id: Uuid,
    pub checks_passed: Vec<QaCheckKind>,
    pub checks_flagged: Vec<QaFlag>,
    pub qa_score: f64,
    pub requires_human_review: bool,
    pub recommended_action: QaAction,
    pub reviewer_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl QaReport {
    pub fn new(content_id: Uuid) -> Self {
        Self {
            content_id,
            checks_passed: Vec::new(),
            checks_flagged: Vec::new(),
            qa_score: 0.0,
            requires_human_review: false,
            recommended_action: QaAction::Revise,
            reviewer_notes: None,
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    pub fn is_flagged(&self, check: QaCheckKind) -> bool {
        self.checks_flagged.iter().any(|f| f.check == check)
    }

    /// Record a human decision. The only mutation a report accepts after the
    /// automated run.
    pub fn record_review(
        &mut self,
        reviewer: impl Into<String>,
        action: QaAction,
        notes: Option<String>,
    ) {
        self.reviewed_by = Some(reviewer.into());
        self.reviewed_at = Some(Utc::now());
        self.reviewer_notes = notes;
        self.recommended_action = action;
        self.requires_human_review = false;
    }
}

// ─── Content ────────────────────────────────────────────────────────────────

/// One generated artifact for a (product, aspect ratio, duration) combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub content_id: Uuid,
    pub batch_id: Uuid,
    pub product_id: Uuid,
    pub template_id: Uuid,
    /// Locator of the rendered artifact; `None` until generation succeeds.
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub duration_seconds: u32,
    pub status: ContentStatus,
    pub qa_report: Option<QaReport>,
    pub metadata: serde_json::Map<String, Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn new(
        batch_id: Uuid,
        product_id: Uuid,
        template_id: Uuid,
        aspect_ratio: AspectRatio,
        duration_seconds: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            content_id: Uuid::new_v4(),
            batch_id,
            product_id,
            template_id,
            video_url: None,
            thumbnail_url: None,
            aspect_ratio,
            duration_seconds,
            status: ContentStatus::Pending,
            qa_report: None,
            metadata: serde_json::Map::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, to: ContentStatus) -> CampaignResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(CampaignError::InvalidTransition {
                entity: "content",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Failed` and keep the reason.
    pub fn fail(&mut self, message: impl Into<String>) -> CampaignResult<()> {
        self.transition(ContentStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Append a free-form QA flag to `metadata.qa_flags`.
    pub fn add_qa_flag(&mut self, flag: impl Into<String>, severity: Severity) {
        let entry = serde_json::json!({ "flag": flag.into(), "severity": severity });
        match self.metadata.get_mut(signals::QA_FLAGS) {
            Some(Value::Array(flags)) => flags.push(entry),
            _ => {
                self.metadata
                    .insert(signals::QA_FLAGS.to_string(), Value::Array(vec![entry]));
            }
        }
        if self.qa_report.is_none() {
            self.qa_report = Some(QaReport::new(self.content_id));
        }
    }
}
