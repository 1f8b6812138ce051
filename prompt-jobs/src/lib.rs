#![allow(clippy::missing_docs_in_private_items)]

mod manager;

pub use manager::JobManager;
