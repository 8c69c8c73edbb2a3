//! Process setup: database, storage tiers and the shared worker services.

pub mod database;
pub mod services;
pub mod storage;

pub use database::{connect_database, run_migrations, setup_database};
pub use services::build_services;
pub use storage::{setup_local_storage, setup_remote_storage};
