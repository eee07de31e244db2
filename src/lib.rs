pub mod batch;
pub mod cancel;
pub mod catalog;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod output;
pub mod retry;
pub mod sheet;
pub mod store;

pub use batch::{BatchOrchestrator, run_batch};
pub use domain::{BatchReport, CategoryId, Record};
pub use error::NichesError;
