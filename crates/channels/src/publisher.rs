//! Publishing seam for a single channel.

use async_trait::async_trait;
use campaign_core::channels::ChannelSpec;
use campaign_core::content::Content;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

/// Where a publish landed.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub published_url: String,
    pub published_id: String,
}

#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        spec: &ChannelSpec,
        payload: &Value,
    ) -> anyhow::Result<PublishReceipt>;
}

/// Build the channel payload for a content item. Fails when the item has no
/// rendered artifact.
pub fn prepare_payload(content: &Content, channel: &str) -> anyhow::Result<Value> {
    let video_url = content
        .video_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Content {} has no video to publish", content.content_id))?;

    debug!(channel = %channel, content_id = %content.content_id, "Preparing channel payload");
    Ok(json!({
        "video_url": video_url,
        "aspect_ratio": content.aspect_ratio,
        "duration": content.duration_seconds,
    }))
}

/// Publisher that accepts every post and fabricates a post locator. Stands in
/// for platform integrations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedPublisher;

#[async_trait]
impl ChannelPublisher for SimulatedPublisher {
    async fn publish(
        &self,
        channel: &str,
        _spec: &ChannelSpec,
        payload: &Value,
    ) -> anyhow::Result<PublishReceipt> {
        let post_id = Uuid::new_v4().to_string();
        debug!(
            channel = %channel,
            video_url = %payload["video_url"],
            "Simulated publish"
        );
        Ok(PublishReceipt {
            published_url: format!("https://{}.com/post/{}", channel, post_id),
            published_id: post_id,
        })
    }
}
