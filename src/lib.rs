pub mod config;
pub mod evaluation;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod output;
pub mod reports;
pub mod roster;
pub mod server;
pub mod source;
pub mod storage;
pub mod training;
