//! Bot application wiring: inbound subscription, command routing, replies.
//!
//! Layout:
//! - `services.rs`: infrastructure wiring (store, bus, catalog, lifecycle)
//! - `routes/`: command handlers (one file per top-level command)
//! - `replies.rs`: canned chat text
//! - `errors.rs`: mapping failures to user-facing replies

use tracing::{debug, error, info, warn};

use dbtc_events::{BusError, IncomingMessage, MessageBus, Subscription};

use crate::config::BotConfig;
use crate::context::CommandContext;

pub mod errors;
pub mod replies;
pub mod routes;
pub mod services;

use routes::Reply;
use services::{AppServices, ServiceError};

/// The running bot: configuration plus wired services.
#[derive(Clone)]
pub struct App {
    config: BotConfig,
    services: AppServices,
}

impl App {
    pub fn new(config: BotConfig, services: AppServices) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Subscribe to the inbound topic.
    pub async fn subscribe(&self) -> Result<Subscription<String>, BusError> {
        self.services.bus.subscribe(&self.config.inbound_topic).await
    }

    /// Subscribe and process inbound messages until the bus closes.
    pub async fn run(&self) -> Result<(), BusError> {
        let subscription = self.subscribe().await?;
        info!(
            topic = %self.config.inbound_topic,
            prefix = %self.config.command_prefix,
            "listening for commands"
        );
        self.drain(subscription).await;
        Ok(())
    }

    /// Handle messages one at a time until the subscription ends.
    pub async fn drain(&self, mut subscription: Subscription<String>) {
        while let Some(payload) = subscription.recv().await {
            self.handle_payload(&payload).await;
        }
        info!("inbound subscription closed");
    }

    /// Decode one raw inbound payload; malformed payloads are logged and skipped.
    pub async fn handle_payload(&self, payload: &str) {
        match IncomingMessage::from_json(payload) {
            Ok(message) => self.handle(message).await,
            Err(err) => error!(error = %err, "failed to decode inbound message"),
        }
    }

    pub async fn handle(&self, message: IncomingMessage) {
        let Some(ctx) = CommandContext::parse(message, &self.config.command_prefix) else {
            return;
        };

        let Some(result) = routes::route(&self.services, &ctx).await else {
            debug!(keyword = ctx.keyword(), "ignoring unknown command");
            return;
        };

        match result {
            Ok(replies) => {
                for reply in replies {
                    self.deliver(&ctx, reply).await;
                }
            }
            Err(err) => {
                if errors::is_user_error(&err) {
                    info!(user = %ctx.user(), command = ctx.keyword(), error = %err, "command rejected");
                } else {
                    warn!(user = %ctx.user(), command = ctx.keyword(), error = %err, "command failed");
                }
                let content = errors::dispatch_error_to_reply(&err);
                self.deliver(&ctx, Reply::Now(content)).await;
            }
        }
    }

    async fn deliver(&self, ctx: &CommandContext, reply: Reply) {
        let outbox = self.services.outbox.clone();
        match reply {
            Reply::Now(content) => {
                let message = ctx.reply(outbox.source_app(), content);
                if let Err(err) = outbox.send(message).await {
                    error!(user = %ctx.user(), error = %err, "failed to publish reply");
                }
            }
            Reply::After { delay, content } => {
                let message = ctx.reply(outbox.source_app(), content);
                let user = ctx.user().clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = outbox.send(message).await {
                        error!(%user, error = %err, "failed to publish delayed reply");
                    }
                });
            }
        }
    }
}

/// Wire services from configuration (public entrypoint used by `main.rs`).
pub fn build_app(config: BotConfig) -> Result<App, ServiceError> {
    let services = services::build_services(&config)?;
    Ok(App::new(config, services))
}
