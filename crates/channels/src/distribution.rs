//! Distribution engine: fans one approved content item out to its target
//! channels and rolls the per-channel outcomes into a report.
//!
//! Each channel is resolved against the static registry, then published on
//! its own task. A failure, or a panic, on one channel becomes a `FAILED`
//! result for that channel only.

use std::collections::BTreeMap;
use std::sync::Arc;

use campaign_core::channels::{
    ChannelSpec, DistributionReport, DistributionResult, DistributionStatus, SchedulingConfig,
};
use campaign_core::config::AppConfig;
use campaign_core::content::Content;
use campaign_core::event_bus::{make_event, noop_sink, EventSink, EventType};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::publisher::{prepare_payload, ChannelPublisher, SimulatedPublisher};

enum ChannelTask {
    Done(DistributionResult),
    Running(JoinHandle<DistributionResult>),
}

pub struct DistributionEngine {
    registry: BTreeMap<String, ChannelSpec>,
    publisher: Arc<dyn ChannelPublisher>,
    concurrency: usize,
    event_sink: Arc<dyn EventSink>,
}

impl DistributionEngine {
    pub fn new(registry: BTreeMap<String, ChannelSpec>) -> Self {
        info!(
            channels = registry.len(),
            "Distribution engine initialized"
        );
        Self {
            registry,
            publisher: Arc::new(SimulatedPublisher),
            concurrency: 4,
            event_sink: noop_sink(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.channels.clone()).with_concurrency(config.pipeline.distribution_concurrency)
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ChannelPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Maximum channels published at once for a single content item.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Enabled channel names, sorted.
    pub fn available_channels(&self) -> Vec<String> {
        self.registry
            .iter()
            .filter(|(_, spec)| spec.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelSpec> {
        self.registry.get(name)
    }

    /// Publish `content` to every channel in `channels`. The report lists one
    /// result per requested channel, in request order.
    pub async fn publish(
        &self,
        content: &Content,
        channels: &[String],
        scheduling: &SchedulingConfig,
    ) -> DistributionReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let deferred = scheduling.deferred_until();
        let content_id = content.content_id;

        let tasks: Vec<ChannelTask> = channels
            .iter()
            .map(|name| {
                let spec = match self.registry.get(name) {
                    None => {
                        return ChannelTask::Done(DistributionResult::failed(
                            content_id,
                            name,
                            format!("Channel {} not configured", name),
                        ))
                    }
                    Some(spec) if !spec.enabled => {
                        return ChannelTask::Done(DistributionResult::failed(
                            content_id,
                            name,
                            format!("Channel {} is disabled", name),
                        ))
                    }
                    Some(spec) => spec.clone(),
                };

                let payload = match prepare_payload(content, name) {
                    Ok(payload) => payload,
                    Err(e) => {
                        return ChannelTask::Done(DistributionResult::failed(
                            content_id,
                            name,
                            e.to_string(),
                        ))
                    }
                };

                if let Some(at) = deferred {
                    return ChannelTask::Done(DistributionResult::scheduled(content_id, name, at));
                }

                let publisher = self.publisher.clone();
                let semaphore = semaphore.clone();
                let name = name.clone();
                ChannelTask::Running(tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return DistributionResult::failed(content_id, &name, e.to_string()),
                    };
                    match publisher.publish(&name, &spec, &payload).await {
                        Ok(receipt) => DistributionResult::published(
                            content_id,
                            &name,
                            receipt.published_url,
                            receipt.published_id,
                        ),
                        Err(e) => DistributionResult::failed(content_id, &name, e.to_string()),
                    }
                }))
            })
            .collect();

        let mut report = DistributionReport::new(content.batch_id, content_id);
        for (name, task) in channels.iter().zip(tasks) {
            let result = match task {
                ChannelTask::Done(result) => result,
                ChannelTask::Running(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => DistributionResult::failed(
                        content_id,
                        name,
                        format!("Channel {} publish aborted: {}", name, e),
                    ),
                },
            };
            self.record(content.batch_id, &result);
            report.add_result(result);
        }

        info!(
            content_id = %content_id,
            attempted = report.channels_attempted,
            succeeded = report.channels_succeeded,
            failed = report.channels_failed,
            "Distribution complete"
        );
        report
    }

    fn record(&self, batch_id: Uuid, result: &DistributionResult) {
        metrics::counter!(
            "distribution.published",
            "channel" => result.channel.clone(),
            "status" => result.status.as_str()
        )
        .increment(1);

        let event_type = match result.status {
            DistributionStatus::Success => EventType::ChannelPublished,
            DistributionStatus::Scheduled => EventType::ChannelScheduled,
            DistributionStatus::Pending
            | DistributionStatus::InProgress
            | DistributionStatus::Failed => EventType::ChannelFailed,
        };
        let mut event = make_event(event_type, Some(batch_id), Some(result.content_id))
            .with_channel(result.channel.clone());
        if let Some(err) = &result.error_message {
            warn!(channel = %result.channel, content_id = %result.content_id, error = %err, "Channel distribution failed");
            event = event.with_detail(err.clone());
        }
        self.event_sink.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PublishReceipt;
    use async_trait::async_trait;
    use campaign_core::config::default_channels;
    use campaign_core::content::ContentStatus;
    use campaign_core::event_bus::capture_sink;
    use campaign_core::types::AspectRatio;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails or panics on selected channels, succeeds elsewhere.
    #[derive(Default)]
    struct FlakyPublisher {
        fail_on: Vec<&'static str>,
        panic_on: Vec<&'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl ChannelPublisher for FlakyPublisher {
        async fn publish(
            &self,
            channel: &str,
            _spec: &ChannelSpec,
            _payload: &Value,
        ) -> anyhow::Result<PublishReceipt> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panic_on.iter().any(|c| *c == channel) {
                panic!("publisher crashed on {}", channel);
            }
            if self.fail_on.iter().any(|c| *c == channel) {
                anyhow::bail!("{} API returned 503", channel);
            }
            Ok(PublishReceipt {
                published_url: format!("https://{}.com/post/1", channel),
                published_id: "1".into(),
            })
        }
    }

    fn approved_content() -> Content {
        let mut c = Content::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            AspectRatio::Vertical,
            15,
        );
        c.video_url = Some("https://cdn/v.mp4".into());
        c.status = ContentStatus::Approved;
        c
    }

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_publish_to_default_channels() {
        let engine = DistributionEngine::new(default_channels());
        let content = approved_content();
        let report = engine
            .publish(
                &content,
                &channels(&["instagram_reels", "tiktok"]),
                &SchedulingConfig::immediate(),
            )
            .await;

        assert_eq!(report.channels_attempted, 2);
        assert_eq!(report.channels_succeeded, 2);
        assert_eq!(report.batch_id, content.batch_id);
        let tiktok = report.result_for("tiktok").unwrap();
        assert!(tiktok.published_url.as_deref().unwrap().starts_with("https://tiktok.com/post/"));
        assert!(tiktok.published_id.is_some());
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_channels_fail_in_isolation() {
        let mut registry = default_channels();
        registry.insert("snapchat".into(), ChannelSpec::new("snapchat").disabled());
        let sink = capture_sink();
        let engine = DistributionEngine::new(registry).with_event_sink(sink.clone());

        let report = engine
            .publish(
                &approved_content(),
                &channels(&["myspace", "snapchat", "tiktok"]),
                &SchedulingConfig::immediate(),
            )
            .await;

        let names: Vec<_> = report
            .distribution_details
            .iter()
            .map(|r| r.channel.as_str())
            .collect();
        assert_eq!(names, vec!["myspace", "snapchat", "tiktok"]);
        assert_eq!(
            report.distribution_details[0].error_message.as_deref(),
            Some("Channel myspace not configured")
        );
        assert_eq!(
            report.distribution_details[1].error_message.as_deref(),
            Some("Channel snapchat is disabled")
        );
        assert_eq!(report.channels_succeeded, 1);
        assert_eq!(report.channels_failed, 2);
        assert_eq!(sink.count_type(EventType::ChannelFailed), 2);
        assert_eq!(sink.count_type(EventType::ChannelPublished), 1);
    }

    #[tokio::test]
    async fn test_publisher_error_and_panic_stay_scoped() {
        let publisher = Arc::new(FlakyPublisher {
            fail_on: vec!["tiktok"],
            panic_on: vec!["youtube_shorts"],
            ..FlakyPublisher::default()
        });
        let engine = DistributionEngine::new(default_channels()).with_publisher(publisher);

        let report = engine
            .publish(
                &approved_content(),
                &channels(&["tiktok", "youtube_shorts", "instagram_reels"]),
                &SchedulingConfig::immediate(),
            )
            .await;

        assert_eq!(report.channels_attempted, 3);
        assert_eq!(report.channels_succeeded, 1);
        assert_eq!(
            report.distribution_details[0].error_message.as_deref(),
            Some("tiktok API returned 503")
        );
        assert_eq!(report.distribution_details[1].status, DistributionStatus::Failed);
        assert!(report.distribution_details[1]
            .error_message
            .as_deref()
            .unwrap()
            .contains("publish aborted"));
        assert_eq!(report.distribution_details[2].status, DistributionStatus::Success);
    }

    #[tokio::test]
    async fn test_scheduled_mode_defers_publish() {
        let publisher = Arc::new(FlakyPublisher::default());
        let engine = DistributionEngine::new(default_channels()).with_publisher(publisher.clone());
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();

        let report = engine
            .publish(
                &approved_content(),
                &channels(&["tiktok", "ctv"]),
                &SchedulingConfig::scheduled_at(at),
            )
            .await;

        assert_eq!(report.channels_succeeded, 0);
        assert_eq!(report.channels_failed, 2);
        for result in &report.distribution_details {
            assert_eq!(result.status, DistributionStatus::Scheduled);
            assert_eq!(result.scheduled_publish_time, Some(at));
            assert!(result.published_url.is_none());
        }
        assert!(!report.is_distributed());
        assert_eq!(publisher.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_video_fails_every_channel() {
        let engine = DistributionEngine::new(default_channels());
        let mut content = approved_content();
        content.video_url = None;
        let report = engine
            .publish(&content, &channels(&["tiktok"]), &SchedulingConfig::immediate())
            .await;
        assert_eq!(report.channels_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let mut registry = BTreeMap::new();
        let names: Vec<String> = (0..6).map(|i| format!("ch{}", i)).collect();
        for name in &names {
            registry.insert(name.clone(), ChannelSpec::new(name.clone()));
        }
        let publisher = Arc::new(FlakyPublisher::default());
        let engine = DistributionEngine::new(registry)
            .with_publisher(publisher.clone())
            .with_concurrency(2);

        let report = engine
            .publish(&approved_content(), &names, &SchedulingConfig::immediate())
            .await;

        assert_eq!(report.channels_succeeded, 6);
        assert_eq!(publisher.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_available_channels_sorted_and_enabled() {
        let mut registry = default_channels();
        registry.get_mut("dooh").unwrap().enabled = false;
        let engine = DistributionEngine::new(registry);
        assert_eq!(
            engine.available_channels(),
            vec!["ctv", "instagram_reels", "tiktok", "youtube_shorts"]
        );
    }
}
