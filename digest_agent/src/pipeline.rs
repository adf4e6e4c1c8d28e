//! One fetch → format → deliver cycle, shared by scheduled jobs and on-demand
//! commands.
use crate::delivery::DeliveryChannel;
use crate::fetcher::DataFetcher;
use crate::model::scheduler::Task;
use chrono::Local;
use digest_common::format::DigestFormatter;
use digest_common::net::DISPLAY_COUNT;
use digest_common::{Destination, Result};
use log::{info, warn};
use std::sync::Arc;

/// Produces and delivers digests.
pub struct DigestPipeline {
    fetcher: DataFetcher,
    formatter: DigestFormatter,
    delivery: DeliveryChannel,
}

impl DigestPipeline {
    /// Assemble a pipeline.
    pub fn new(fetcher: DataFetcher, formatter: DigestFormatter, delivery: DeliveryChannel) -> Self {
        Self {
            fetcher,
            formatter,
            delivery,
        }
    }

    /// Delivery channel used for digests and notices.
    pub fn delivery(&self) -> &DeliveryChannel {
        &self.delivery
    }

    /// Fetch fresh rankings and render them.
    pub fn render(&self) -> String {
        let entities = self.fetcher.fetch_rankings(DISPLAY_COUNT);
        self.formatter.format(&entities, Local::now().time())
    }

    /// Render and deliver one digest to `destination`; failures fall back to
    /// `requester`.
    pub fn run(&self, destination: &Destination, requester: Option<&Destination>) -> Result<()> {
        info!("Sending crypto update to {}...", destination);
        let text = self.render();
        self.delivery.deliver(destination, &text, requester)
    }

    /// A scheduler task delivering to `destination`. Failures are logged; the
    /// next tick retries naturally.
    pub fn task(self: &Arc<Self>, destination: Destination, requester: Option<Destination>) -> Task {
        let pipeline = Arc::clone(self);
        Arc::new(move || {
            if let Err(e) = pipeline.run(&destination, requester.as_ref()) {
                warn!("Scheduled update for {} failed: {}", destination, e);
            }
        })
    }
}
