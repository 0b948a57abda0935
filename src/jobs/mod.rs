pub mod executor;
pub mod queue;

pub use executor::JobExecutor;
pub use queue::{JobMessage, JobQueue};
