//! Job history and affordance handlers

pub mod cancel;
pub mod get_all;
pub mod get_by_id;
mod job_info;
pub mod retry;

pub use job_info::JobInfo;
