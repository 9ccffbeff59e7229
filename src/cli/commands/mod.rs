//! CLI command implementations.

mod ask;
mod chat;
mod chunk;
mod config;
mod doctor;
mod index;
mod ingest;
mod log;
mod search;

pub use ask::run_ask;
pub use chat::run_chat;
pub use chunk::{run_chunk, run_stats};
pub use config::run_config;
pub use doctor::run_doctor;
pub use index::{run_build, run_index};
pub use ingest::run_ingest;
pub use log::run_log;
pub use search::run_search;
