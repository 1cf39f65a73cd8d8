pub mod client;
pub mod config;
pub mod feed;
pub mod poll;
pub mod stats;
pub mod status;
pub mod view;

pub use client::Client;
pub use config::Config;
pub use feed::FeedEngine;
