pub mod app_state;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod fs_layout;
pub mod live;
pub mod peer_client;
pub mod queue;
pub mod store;
pub mod streaming;
pub mod tracing;
pub mod worker;
