//! CLI command handlers.

mod batch;
mod completions;
mod fetch;
mod retry_failed;

pub use batch::run_batch_file;
pub use completions::run_completions;
pub use fetch::{run_fetch, FetchArgs};
pub use retry_failed::run_retry_failed;
