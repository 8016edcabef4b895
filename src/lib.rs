//! Owner-scoped data access for a landlord portfolio manager.
//!
//! Every document lives under `owners/{ownerId}/...`. Views build locators from
//! the signed-in owner, read through [`binding::LiveBinding`], and write through
//! [`mutation::MutationPipeline`], which validates, strips empty fields, writes,
//! then reports the outcome as a toast and a navigation.

pub mod binding;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod id;
pub mod lifecycle;
pub mod locator;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod mutation;
pub mod repo;
pub mod route;
pub mod session;
pub mod store;
pub mod time;
pub mod uploads;
pub mod util;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorClass};
pub use logging::{init_file_logging, init_logging};
pub use session::{OwnerId, SessionHandle};
pub use store::{DocumentStore, MemoryStore, SqliteStore};
