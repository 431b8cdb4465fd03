//! The four independent quality checks. Each is a pure function of the
//! content, its metadata and the gate configuration.

use campaign_core::channels::ChannelSpec;
use campaign_core::config::QaConfig;
use campaign_core::content::{signals, Content, QaCheckKind, QaFlag, Severity};
use serde_json::Value;

/// Points a passing check contributes to the 0-100 score.
pub const CHECK_POINTS: f64 = 25.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub kind: QaCheckKind,
    pub passed: bool,
    pub severity: Severity,
    pub issues: Vec<String>,
}

impl CheckResult {
    fn from_issues(kind: QaCheckKind, failure_severity: Severity, issues: Vec<String>) -> Self {
        let passed = issues.is_empty();
        Self {
            kind,
            passed,
            severity: if passed { Severity::Low } else { failure_severity },
            issues,
        }
    }

    pub fn score_contribution(&self) -> f64 {
        if self.passed {
            CHECK_POINTS
        } else {
            0.0
        }
    }

    pub fn into_flag(self) -> QaFlag {
        QaFlag {
            check: self.kind,
            severity: self.severity,
            issues: self.issues,
        }
    }
}

/// Numeric marker a resolution label must contain, e.g. "1080" for "1080p".
fn resolution_marker(min_resolution: &str) -> &str {
    let marker = min_resolution.trim_end_matches(|c: char| !c.is_ascii_digit());
    if marker.is_empty() {
        min_resolution
    } else {
        marker
    }
}

/// Reads a metadata signal. An absent key yields `None`; a present value that
/// `read` rejects records a failing issue and also yields `None`.
fn read_signal<T>(
    content: &Content,
    key: &str,
    read: impl Fn(&Value) -> Option<T>,
    issues: &mut Vec<String>,
) -> Option<T> {
    let value = content.metadata.get(key)?;
    let parsed = read(value);
    if parsed.is_none() {
        issues.push(format!("Signal {} has unreadable value {}", key, value));
    }
    parsed
}

pub fn technical_specs(
    content: &Content,
    platform: Option<&ChannelSpec>,
    config: &QaConfig,
) -> CheckResult {
    let mut issues = Vec::new();

    let resolution = content.metadata_str(signals::RESOLUTION).unwrap_or_default();
    if !resolution.contains(resolution_marker(&config.min_resolution)) {
        issues.push(format!(
            "Resolution below {} threshold",
            config.min_resolution
        ));
    }

    let max_duration = platform
        .and_then(|p| p.max_duration_secs)
        .unwrap_or(config.default_max_duration_secs);
    if content.duration_seconds > max_duration {
        issues.push(format!(
            "Duration {}s exceeds {}s limit",
            content.duration_seconds, max_duration
        ));
    }

    CheckResult::from_issues(QaCheckKind::TechnicalSpecs, Severity::High, issues)
}

pub fn brand_compliance(content: &Content, config: &QaConfig) -> CheckResult {
    let mut issues = Vec::new();

    let color_match =
        read_signal(content, signals::COLOR_MATCH_SCORE, Value::as_f64, &mut issues);
    if let Some(score) = color_match.filter(|s| *s < config.color_match_threshold) {
        issues.push(format!("Color match score {:.2} below threshold", score));
    }

    if config.logo_visibility_required
        && read_signal(content, signals::LOGO_VISIBLE, Value::as_bool, &mut issues) == Some(false)
    {
        issues.push("Logo not visible in content".to_string());
    }

    CheckResult::from_issues(QaCheckKind::BrandCompliance, Severity::Medium, issues)
}

pub fn content_accuracy(content: &Content, config: &QaConfig) -> CheckResult {
    let mut issues = Vec::new();

    if config.typo_check {
        let typos = read_signal(content, signals::TYPOS_DETECTED, Value::as_f64, &mut issues);
        if let Some(typos) = typos.filter(|t| *t > 0.0) {
            issues.push(format!("Typos detected: {}", typos));
        }
    }
    if config.product_info_check
        && read_signal(content, signals::PRODUCT_INFO_VERIFIED, Value::as_bool, &mut issues)
            == Some(false)
    {
        issues.push("Product information not verified".to_string());
    }
    if config.cta_visibility_check
        && read_signal(content, signals::CTA_VISIBLE, Value::as_bool, &mut issues) == Some(false)
    {
        issues.push("Call-to-action not visible".to_string());
    }

    CheckResult::from_issues(QaCheckKind::ContentAccuracy, Severity::High, issues)
}

/// Unknown platforms, and platforms without an aspect-ratio rule, pass.
pub fn platform_requirements(content: &Content, platform: Option<&ChannelSpec>) -> CheckResult {
    let mut issues = Vec::new();

    if let Some(required) = platform
        .and_then(|p| p.aspect_ratio.as_deref())
        .filter(|r| !r.is_empty())
    {
        if !required.contains(content.aspect_ratio.as_str()) {
            issues.push(format!(
                "Aspect ratio {} doesn't match {}",
                content.aspect_ratio, required
            ));
        }
    }

    CheckResult::from_issues(QaCheckKind::PlatformRequirements, Severity::Medium, issues)
}
