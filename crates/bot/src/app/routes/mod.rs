//! Command routing: one module per top-level command.
//!
//! Handlers return the replies to send instead of sending them, so the drain loop owns
//! delivery (including deferred replies) and every failure surfaces at one boundary.

use std::time::Duration;

use dbtc_infra::DispatchError;
use tracing::warn;

use crate::app::services::AppServices;
use crate::context::CommandContext;

pub mod balance;
pub mod jobs;
pub mod system;
pub mod work;

/// A reply produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Now(String),
    /// Posted after `delay` without holding up the drain loop.
    After { delay: Duration, content: String },
}

impl Reply {
    pub fn now(content: impl Into<String>) -> Self {
        Reply::Now(content.into())
    }
}

pub type HandlerResult = Result<Vec<Reply>, DispatchError>;

/// Dispatch a parsed command. `None` for unknown top-level commands, which are ignored.
pub async fn route(services: &AppServices, ctx: &CommandContext) -> Option<HandlerResult> {
    let result = match ctx.keyword() {
        "info" => system::info(),
        "help" => system::help(),
        "work" => {
            settle_overdue(services, ctx).await;
            work::handle(services, ctx).await
        }
        "balance" => {
            settle_overdue(services, ctx).await;
            balance::handle(services, ctx).await
        }
        "jobs" => {
            settle_overdue(services, ctx).await;
            jobs::handle(services, ctx).await
        }
        _ => return None,
    };
    Some(result)
}

/// Pay out a job whose completion timer was lost before the command sees the profile.
async fn settle_overdue(services: &AppServices, ctx: &CommandContext) {
    if let Err(err) = services
        .lifecycle
        .settle(ctx.user(), Some(ctx.reply_target()))
        .await
    {
        warn!(user = %ctx.user(), error = %err, "failed to settle overdue job");
    }
}
