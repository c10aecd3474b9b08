use crate::app::replies;
use crate::app::routes::{HandlerResult, Reply};

pub fn info() -> HandlerResult {
    Ok(vec![Reply::now(replies::INFO)])
}

pub fn help() -> HandlerResult {
    Ok(vec![Reply::now(replies::HELP)])
}
