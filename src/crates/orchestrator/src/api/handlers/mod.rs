//! API endpoint handlers

pub mod health;
pub mod tasks;

pub use health::health;
pub use tasks::{cancel_task, create_task, get_task, list_tasks};
