pub mod task_pool;
pub mod waitable;

pub use task_pool::{Priority, TaskPool};
pub use waitable::Waitable;
