pub mod engagement;
pub mod feed;
pub mod rankings;
pub mod session;
pub mod videos;

pub use engagement::{record_event, EngagementHandlerState};
pub use feed::{get_feed, FeedHandlerState};
pub use rankings::{
    get_category_rankings, get_hashtag_rankings, get_trending, get_viral, RankingsHandlerState,
};
pub use session::{end_session, start_session, swipe, SessionHandlerState};
pub use videos::{delete_video, register_video, update_video_category, VideoHandlerState};
