pub mod bindable;
pub mod scheduler;
pub mod task;
