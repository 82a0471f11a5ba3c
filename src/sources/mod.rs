//! # Sources
//!
//! Turning user queries into playable [`Track`]s.
//!
//! The session core only sees the [`MediaResolver`] trait. [`YtDlpResolver`]
//! is the production implementation: metadata and direct stream URLs come from
//! `yt-dlp`, audio is streamed over HTTP by songbird.

pub mod ytdlp;

use async_trait::async_trait;

use crate::{
    audio::track::{StreamHandle, Track, TrackInfo},
    error::ResolutionError,
};

pub use ytdlp::YtDlpResolver;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolves free text or a direct URL to exactly one track (first match).
    async fn resolve(&self, query: &str) -> Result<Track, ResolutionError>;

    /// Opens a brand new stream for an already resolved track.
    ///
    /// Used to replay a track, since consumed handles cannot be rewound.
    /// Implementations probe the new stream and fail with
    /// [`ResolutionError::EmptyStream`] when it yields no data.
    async fn reopen(&self, info: &TrackInfo) -> Result<StreamHandle, ResolutionError>;
}
