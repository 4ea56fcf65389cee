pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod source;
pub mod store;
