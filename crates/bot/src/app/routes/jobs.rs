use tracing::{error, info};

use dbtc_game::parse_job_index;

use crate::app::replies;
use crate::app::routes::{HandlerResult, Reply};
use crate::app::services::AppServices;
use crate::context::CommandContext;

pub async fn handle(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    match ctx.arg(0) {
        None | Some("list") => list(services, ctx).await,
        Some("refresh") => refresh(services, ctx).await,
        Some("start") | Some("take") => start(services, ctx).await,
        Some("help") => Ok(vec![Reply::now(replies::JOBS_HELP)]),
        Some(other) => {
            info!(user = %ctx.user(), subcommand = other, "unknown jobs subcommand");
            Ok(vec![Reply::now(replies::JOBS_UNKNOWN)])
        }
    }
}

/// The current pool; an empty pool is regenerated and the listing posted after the
/// search delay.
async fn list(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    let listing = match services.catalog.ensure_available(ctx.user()).await {
        Ok(listing) => listing,
        Err(err) => {
            error!(user = %ctx.user(), error = %err, "failed to load or generate jobs");
            return Ok(vec![Reply::now(replies::NOBODY_HIRING)]);
        }
    };

    let text = replies::job_list(&listing.jobs);
    if listing.generated {
        Ok(vec![
            Reply::now(replies::LOOKING_FOR_WORK),
            Reply::After {
                delay: services.search_delay,
                content: text,
            },
        ])
    } else {
        Ok(vec![Reply::now(text)])
    }
}

async fn refresh(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    match services.catalog.refresh(ctx.user()).await {
        Ok(jobs) => Ok(vec![Reply::now(replies::job_list(&jobs))]),
        Err(err) => {
            error!(user = %ctx.user(), error = %err, "failed to refresh jobs");
            Ok(vec![Reply::now(replies::LOST_PAPERWORK)])
        }
    }
}

async fn start(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    let index = parse_job_index(ctx.arg(1))?;

    // The completion task is detached; it outlives this command.
    let started = services
        .lifecycle
        .accept(ctx.user(), index, Some(ctx.reply_target()))
        .await?;

    Ok(vec![Reply::now(replies::job_accepted(
        &started.acceptance.job.name,
        started.acceptance.reward.delay().as_secs(),
    ))])
}
