//! Command-line follower for pipeline jobs.

pub mod report;
pub mod run;
