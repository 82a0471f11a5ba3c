use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::time::Duration;

use crate::audio::track::TrackInfo;

/// User-facing happenings of a session. Presentation is up to the [`Notifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TrackStarted {
        track: TrackInfo,
        /// `true` when this is a repetition of the previous track.
        looping: bool,
        volume: f32,
    },
    IdleDisconnect {
        after: Duration,
    },
    PlaybackError {
        track: TrackInfo,
        error: String,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, guild_id: GuildId, event: SessionEvent);
}
