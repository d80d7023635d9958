//! Analytics events emitted after a successful confirmation
//!
//! Sinks are optional. A dispatcher with no sinks is valid and every emit is
//! then a no-op; a failing sink is logged and never affects the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

use crate::settings::AnalyticsSettings;

/// Event name used for completed registrations
pub const REGISTRATION_CONFIRMED: &str = "registration_confirmed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub category: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AnalyticsEvent {
    #[must_use]
    pub fn registration_confirmed(user_id: &str) -> Self {
        Self {
            name: REGISTRATION_CONFIRMED.to_string(),
            category: "user".to_string(),
            label: "registration-confirmed".to_string(),
            user_id: Some(user_id.to_string()),
        }
    }
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one event
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be delivered
    async fn emit(&self, event: &AnalyticsEvent) -> anyhow::Result<()>;
}

/// Writes events to the application log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnalyticsSink;

#[async_trait]
impl AnalyticsSink for LogAnalyticsSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn emit(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        info!(
            "📊 analytics event={} category={} label={} user_id={}",
            event.name,
            event.category,
            event.label,
            event.user_id.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}

/// POSTs events as JSON to a collector endpoint
#[derive(Debug, Clone)]
pub struct WebhookAnalyticsSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAnalyticsSink {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AnalyticsSink for WebhookAnalyticsSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn emit(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Fans an event out to every registered sink
#[derive(Clone, Default)]
pub struct AnalyticsDispatcher {
    sinks: Vec<Arc<dyn AnalyticsSink>>,
}

impl AnalyticsDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Build the sinks enabled in settings
    ///
    /// A webhook that cannot be set up is logged and skipped.
    #[must_use]
    pub fn from_settings(settings: &AnalyticsSettings) -> Self {
        let mut dispatcher = Self::new();
        if settings.log_events {
            dispatcher = dispatcher.with_sink(Arc::new(LogAnalyticsSink));
        }
        if let Some(url) = settings.webhook_url.as_deref().filter(|url| !url.is_empty()) {
            match WebhookAnalyticsSink::new(url, Duration::from_secs(settings.webhook_timeout_secs.max(1))) {
                Ok(sink) => dispatcher = dispatcher.with_sink(Arc::new(sink)),
                Err(e) => warn!("Analytics webhook disabled: {e}"),
            }
        }
        dispatcher
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver `event` to every sink, one after another
    pub async fn emit(&self, event: &AnalyticsEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event).await {
                warn!("Analytics sink '{}' failed: {e}", sink.name());
            }
        }
    }
}
