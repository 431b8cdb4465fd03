//! Distribution channel types.
//!
//! A channel is a named publishing destination (`instagram_reels`, `tiktok`,
//! `ctv`, ...) backed by a platform family. The registry of channels is
//! static configuration; results and reports are produced per content item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Channel registry ───────────────────────────────────────────────────────

/// Static definition of one publishing channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSpec {
    /// Platform family, e.g. `instagram`, `youtube`, `dooh`.
    pub platform: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub max_duration_secs: Option<u32>,
    /// Accepted aspect ratios. Several ratios are joined with `|`.
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub brightness: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ChannelSpec {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            enabled: true,
            max_duration_secs: None,
            aspect_ratio: None,
            quality: None,
            brightness: None,
        }
    }

    pub fn with_max_duration(mut self, secs: u32) -> Self {
        self.max_duration_secs = Some(secs);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ─── Scheduling ─────────────────────────────────────────────────────────────

/// How a distribution is released to its channels.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    #[default]
    Immediate,
    Scheduled,
    Conditional,
}

impl SchedulingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingMode::Immediate => "immediate",
            SchedulingMode::Scheduled => "scheduled",
            SchedulingMode::Conditional => "conditional",
        }
    }
}

/// Release timing for one distribution run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub mode: SchedulingMode,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::Immediate,
            scheduled_time: None,
            conditions: serde_json::Map::new(),
            timezone: default_timezone(),
        }
    }
}

impl SchedulingConfig {
    pub fn immediate() -> Self {
        Self::default()
    }

    pub fn scheduled_at(time: DateTime<Utc>) -> Self {
        Self {
            mode: SchedulingMode::Scheduled,
            scheduled_time: Some(time),
            ..Self::default()
        }
    }

    /// The publish time to hold a result for, if publication is deferred.
    pub fn deferred_until(&self) -> Option<DateTime<Utc>> {
        match self.mode {
            SchedulingMode::Scheduled => self.scheduled_time,
            SchedulingMode::Immediate | SchedulingMode::Conditional => None,
        }
    }
}

// ─── Results ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Scheduled,
}

impl DistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionStatus::Pending => "PENDING",
            DistributionStatus::InProgress => "IN_PROGRESS",
            DistributionStatus::Success => "SUCCESS",
            DistributionStatus::Failed => "FAILED",
            DistributionStatus::Scheduled => "SCHEDULED",
        }
    }
}

/// Outcome of publishing one content item to one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionResult {
    pub content_id: Uuid,
    pub channel: String,
    pub status: DistributionStatus,
    pub published_url: Option<String>,
    pub published_id: Option<String>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub scheduled_publish_time: Option<DateTime<Utc>>,
}

impl DistributionResult {
    pub fn published(
        content_id: Uuid,
        channel: impl Into<String>,
        url: String,
        published_id: String,
    ) -> Self {
        Self {
            content_id,
            channel: channel.into(),
            status: DistributionStatus::Success,
            published_url: Some(url),
            published_id: Some(published_id),
            error_message: None,
            timestamp: Utc::now(),
            scheduled_publish_time: None,
        }
    }

    pub fn scheduled(content_id: Uuid, channel: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            content_id,
            channel: channel.into(),
            status: DistributionStatus::Scheduled,
            published_url: None,
            published_id: None,
            error_message: None,
            timestamp: Utc::now(),
            scheduled_publish_time: Some(at),
        }
    }

    pub fn failed(content_id: Uuid, channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content_id,
            channel: channel.into(),
            status: DistributionStatus::Failed,
            published_url: None,
            published_id: None,
            error_message: Some(error.into()),
            timestamp: Utc::now(),
            scheduled_publish_time: None,
        }
    }
}

/// Per-content rollup of every channel attempt.
///
/// Only `SUCCESS` counts as succeeded; `SCHEDULED` and `FAILED` both land in
/// `channels_failed`, so `attempted == succeeded + failed` always holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionReport {
    pub batch_id: Uuid,
    pub content_id: Uuid,
    pub channels_attempted: u32,
    pub channels_succeeded: u32,
    pub channels_failed: u32,
    pub distribution_details: Vec<DistributionResult>,
    pub timestamp: DateTime<Utc>,
}

impl DistributionReport {
    pub fn new(batch_id: Uuid, content_id: Uuid) -> Self {
        Self {
            batch_id,
            content_id,
            channels_attempted: 0,
            channels_succeeded: 0,
            channels_failed: 0,
            distribution_details: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn add_result(&mut self, result: DistributionResult) {
        self.channels_attempted += 1;
        match result.status {
            DistributionStatus::Success => self.channels_succeeded += 1,
            DistributionStatus::Pending
            | DistributionStatus::InProgress
            | DistributionStatus::Failed
            | DistributionStatus::Scheduled => self.channels_failed += 1,
        }
        self.distribution_details.push(result);
    }

    pub fn result_for(&self, channel: &str) -> Option<&DistributionResult> {
        self.distribution_details
            .iter()
            .find(|r| r.channel == channel)
    }

    pub fn is_distributed(&self) -> bool {
        self.channels_succeeded > 0
    }
}
