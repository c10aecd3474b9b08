//! Canned chat replies.

use dbtc_game::Job;

pub const INFO: &str = "
** Don't Break the Chat ** is an experimental chat-based game. It's a work in progress.

Earn money with `!work`, or take on longer jobs with `!jobs`.
";

pub const HELP: &str = "
** Don't Break the Chat ** is an experimental chat-based game. It's a work in progress.

## Commands
- !info - Get information about the game
- !help - Get help with the game
- !work - Work for money
- !balance - Check your balance
- !jobs - List available jobs and their requirements
";

pub const WORK_HELP: &str = "
** Work **
Punch the clock, get paid. No cooldown.

## Commands
- !work - Work a shift for a little money
- !work help - Get help with working (you're looking at it)
";

pub const WORK_UNKNOWN: &str = "I don't know what you mean by that. Try !work help.";

pub const BALANCE_HELP: &str = "
** Balance **
Check your balance and see how much money you have.

## Commands
- !balance - Check your balance
- !balance help - Get help with the balance system (you're looking at it)
";

pub const BALANCE_UNKNOWN: &str = "I don't know what you mean by that. Try !balance help.";

pub const JOBS_HELP: &str = "
** Jobs **
The jobs system allows you to earn money by taking on randomized jobs.

** Commands **
- !jobs - Get a list of available jobs
- !jobs help - Get help with the jobs system (you're looking at it)
- !jobs list - Get a list of available jobs
- !jobs refresh - Refresh the list of available jobs
- !jobs take <job> - Take a job
";

pub const JOBS_UNKNOWN: &str = "I don't know what you mean by that. Try !jobs help.";

pub const LOOKING_FOR_WORK: &str =
    "There are no jobs available right now. Looking for new work...";

pub const NOBODY_HIRING: &str = "Nobody's hiring, kid. Come back later.";

pub const LOST_PAPERWORK: &str =
    "I found some jobs for you but I lost the paperwork on the way over. Better luck next time.";

pub const MISSING_JOB_ID: &str =
    "You need to provide a job ID. Type `!jobs list` to see a list of available jobs.";

pub const INVALID_JOB_ID: &str =
    "That's not a valid job ID. Type `!jobs list` to see a list of available jobs.";

pub const SOMETHING_BROKE: &str = "Something went wrong on my end. Try again in a bit.";

pub fn balance(balance: i64) -> String {
    format!("Your balance is {balance} dollars")
}

pub fn worked(earned: i64, balance: i64) -> String {
    format!("You worked a shift and earned {earned} dollars. Your balance is {balance} dollars")
}

/// The job listing, with each offer's index as its ID.
pub fn job_list(jobs: &[Job]) -> String {
    let mut lines = Vec::with_capacity(jobs.len() + 4);
    lines.push("There's some folks looking for help. Here's what they need:".to_string());
    lines.push("```".to_string());
    lines.extend(jobs.iter().enumerate().map(|(i, job)| job.info_line(i)));
    lines.push("```".to_string());
    lines.push("To take a job, type `!jobs take <job ID>`".to_string());
    lines.join("\n")
}

pub fn job_accepted(name: &str, seconds: u64) -> String {
    format!(
        "'{name}', eh? I'll let the boss know you're on that one. Get lost. You've got {seconds} seconds to get it done."
    )
}

pub fn already_working(name: &str) -> String {
    format!("You're already on '{name}'. Finish that one before you go looking for more.")
}

pub fn job_completed(name: &str, payout: i64, balance: i64) -> String {
    format!(
        "Word is you finished '{name}'. Here's your {payout} dollars. Your balance is {balance} dollars"
    )
}
