//! Infrastructure wiring: store, bus, catalog, lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use dbtc_events::{BusError, InMemoryMessageBus, MessageBus, OutgoingMessage};
use dbtc_game::{FlatRewards, JobGenerator, WorkPolicy};
use dbtc_infra::{
    CompletionNotice, CompletionSink, InMemoryProfileStore, JobCatalog, JobLifecycle,
    ProfileDispatcher, SharedProfileStore,
};

use crate::config::BotConfig;

/// Type-erased string bus (Redis pub/sub or in-memory).
pub type SharedBus = Arc<dyn MessageBus<String>>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid job generation config: {0}")]
    Generation(String),

    #[error("profile store unavailable: {0}")]
    Store(String),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Publishes replies on the outbound topic.
#[derive(Clone)]
pub struct Outbox {
    bus: SharedBus,
    topic: String,
    source_app: String,
}

impl Outbox {
    pub fn new(bus: SharedBus, topic: impl Into<String>, source_app: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            source_app: source_app.into(),
        }
    }

    pub fn source_app(&self) -> &str {
        &self.source_app
    }

    pub async fn send(&self, message: OutgoingMessage) -> Result<(), BusError> {
        let payload = message
            .to_json()
            .map_err(|e| BusError::Publish(format!("encoding reply failed: {e}")))?;
        self.bus.publish(&self.topic, payload).await
    }
}

/// Tells the user in chat when a job pays out.
pub struct ChatCompletionSink {
    outbox: Outbox,
}

impl ChatCompletionSink {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl CompletionSink for ChatCompletionSink {
    async fn job_completed(&self, notice: CompletionNotice) {
        let Some(target) = notice.target else {
            return;
        };
        let content = crate::app::replies::job_completed(
            &notice.completion.job.name,
            notice.completion.payout,
            notice.completion.balance,
        );
        let message = target.respond(self.outbox.source_app(), content, true, false);
        if let Err(err) = self.outbox.send(message).await {
            warn!(user = %notice.user, error = %err, "failed to post completion notice");
        }
    }
}

/// Everything the command handlers need.
#[derive(Clone)]
pub struct AppServices {
    pub store: SharedProfileStore,
    pub bus: SharedBus,
    pub outbox: Outbox,
    pub dispatcher: ProfileDispatcher<SharedProfileStore>,
    pub catalog: Arc<JobCatalog<SharedProfileStore>>,
    pub lifecycle: Arc<JobLifecycle<SharedProfileStore>>,
    pub work: WorkPolicy,
    pub search_delay: Duration,
}

impl AppServices {
    pub fn new(
        config: &BotConfig,
        store: SharedProfileStore,
        bus: SharedBus,
    ) -> Result<Self, ServiceError> {
        let generator = JobGenerator::new(config.generation.clone())
            .map_err(|e| ServiceError::Generation(e.to_string()))?;
        let dispatcher =
            ProfileDispatcher::new(store.clone()).with_max_attempts(config.max_commit_retries);
        let outbox = Outbox::new(bus.clone(), &config.outbound_topic, &config.source_app);

        let catalog = Arc::new(JobCatalog::new(dispatcher.clone(), generator));
        let lifecycle = Arc::new(JobLifecycle::new(
            dispatcher.clone(),
            Arc::new(FlatRewards),
            Arc::new(ChatCompletionSink::new(outbox.clone())),
        ));

        Ok(Self {
            store,
            bus,
            outbox,
            dispatcher,
            catalog,
            lifecycle,
            work: WorkPolicy::new(config.work_max_payout),
            search_delay: config.search_delay,
        })
    }
}

/// Redis store and bus when `REDIS_URL` is set, in-memory otherwise.
pub fn build_services(config: &BotConfig) -> Result<AppServices, ServiceError> {
    match &config.redis_url {
        Some(url) => {
            info!("using redis store and pub/sub bus");
            let store = dbtc_infra::store::RedisProfileStore::new(url)
                .map_err(|e| ServiceError::Store(e.to_string()))?;
            let bus = dbtc_infra::event_bus::RedisPubSubBus::new(url)?;
            AppServices::new(config, Arc::new(store), Arc::new(bus))
        }
        None => {
            warn!("REDIS_URL not set; using in-memory store and bus (state is lost on exit)");
            let store = Arc::new(InMemoryProfileStore::new());
            let bus: Arc<InMemoryMessageBus<String>> = Arc::new(InMemoryMessageBus::new());
            AppServices::new(config, store, bus)
        }
    }
}
