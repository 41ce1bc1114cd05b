pub mod feed;
pub mod ingest;
pub mod ranking_index;
pub mod scoring;
pub mod stats_store;
pub mod swipe_session;

pub use feed::{FeedAssembler, FeedPage};
pub use ingest::{EventIngest, IngestAck, RejectReason};
pub use ranking_index::{HashtagSort, Materialization, RankingIndex, RefreshSummary};
pub use scoring::{ScoringPolicy, TrendingWeights, VIRAL_LISTING_THRESHOLD};
pub use stats_store::{NewVideo, StatsStore};
pub use swipe_session::{SessionRegistry, SwipeCommand, SwipeOutcome};
