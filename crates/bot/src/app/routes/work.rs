use tracing::info;

use dbtc_infra::{Decision, UserChanges};

use crate::app::replies;
use crate::app::routes::{HandlerResult, Reply};
use crate::app::services::AppServices;
use crate::context::CommandContext;

pub async fn handle(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    match ctx.arg(0) {
        None => shift(services, ctx).await,
        Some("help") => Ok(vec![Reply::now(replies::WORK_HELP)]),
        Some(_) => Ok(vec![Reply::now(replies::WORK_UNKNOWN)]),
    }
}

/// Flat one-shot payout.
async fn shift(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    let earned = services.work.roll(&mut rand::thread_rng());

    let balance = services
        .dispatcher
        .mutate(ctx.user(), |mut snapshot| {
            snapshot.profile.credit(earned);
            let balance = snapshot.profile.balance;
            Ok(Decision::write(UserChanges::profile(snapshot.profile), balance))
        })
        .await?;

    info!(user = %ctx.user(), earned, balance, "worked a shift");
    Ok(vec![Reply::now(replies::worked(earned, balance))])
}
