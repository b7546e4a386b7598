//! The channel adapter seam.
//!
//! Each provider integration implements [`ChannelAdapter`] and gets
//! registered once at startup. Adapters classify every failure themselves:
//! the orchestrator never inspects provider errors, it only acts on the
//! returned [`DeliveryOutcome`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use educafric_core::{Channel, DeliveryOutcome, RenderedContent};

use crate::directory::RecipientContact;

/// One provider integration for one channel.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> Channel;

    /// Attempt one delivery. Infallible at the type level: provider
    /// errors are folded into the outcome so retry policy stays in one
    /// place.
    async fn send(&self, contact: &RecipientContact, content: &RenderedContent) -> DeliveryOutcome;
}

/// Registry mapping channels to their configured adapters. A channel with
/// no adapter is unreachable in this deployment; tasks for it fail
/// permanently instead of panicking.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own channel, replacing any previous
    /// registration.
    pub fn register(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    /// Channels with a configured adapter.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.adapters.keys().copied().collect();
        channels.sort_by_key(|c| c.urgency_rank());
        channels
    }
}
