use dbtc_game::JobError;
use dbtc_infra::DispatchError;

use crate::app::replies;

/// User-facing reply for a failed command.
///
/// Game rule rejections get their canned text; everything else is an internal failure
/// the user only sees as a generic apology (details go to the log).
pub fn dispatch_error_to_reply(err: &DispatchError) -> String {
    match err {
        DispatchError::Rejected(job) => job_error_to_reply(job),
        DispatchError::Concurrency(_) | DispatchError::Domain(_) | DispatchError::Store(_) => {
            replies::SOMETHING_BROKE.to_string()
        }
    }
}

pub fn job_error_to_reply(err: &JobError) -> String {
    match err {
        JobError::MissingJobId => replies::MISSING_JOB_ID.to_string(),
        JobError::InvalidJobId(_) | JobError::OutOfRange { .. } => {
            replies::INVALID_JOB_ID.to_string()
        }
        JobError::AlreadyWorking { name, .. } => replies::already_working(name),
        JobError::NotWorking | JobError::JobMismatch { .. } => {
            replies::SOMETHING_BROKE.to_string()
        }
    }
}

/// Whether the failure is the user's doing (logged at `info`) rather than ours (`warn`).
pub fn is_user_error(err: &DispatchError) -> bool {
    matches!(err, DispatchError::Rejected(_))
}
