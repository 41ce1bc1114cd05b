pub mod index_refresher;
pub mod session_reaper;
pub mod view_finalizer;
