use crate::app::replies;
use crate::app::routes::{HandlerResult, Reply};
use crate::app::services::AppServices;
use crate::context::CommandContext;

pub async fn handle(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    match ctx.arg(0) {
        None => show(services, ctx).await,
        Some("help") => Ok(vec![Reply::now(replies::BALANCE_HELP)]),
        Some(_) => Ok(vec![Reply::now(replies::BALANCE_UNKNOWN)]),
    }
}

/// Read-only; creates the profile on first contact.
async fn show(services: &AppServices, ctx: &CommandContext) -> HandlerResult {
    let profile = services.store.get(ctx.user()).await?;
    Ok(vec![Reply::now(replies::balance(profile.balance))])
}
