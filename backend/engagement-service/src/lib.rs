pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the engagement pipeline components
pub use services::{
    EventIngest, FeedAssembler, RankingIndex, ScoringPolicy, SessionRegistry, StatsStore,
};
