//! # Audio Module
//!
//! Per-guild playback sessions.
//!
//! ## Architecture
//!
//! ### [`session`] - Session
//! - One player loop per guild, the only code that talks to the sink
//! - Loop mode replays the current track from a freshly opened stream
//! - Disconnects by itself after the configured idle timeout
//!
//! ### [`queue`] - Queue
//! - FIFO of resolved tracks shared by commands and the player loop
//! - Cancellable blocking dequeue, shuffle, removal and pagination
//!
//! ### [`registry`] - Session Registry
//! - At most one live session per guild, created lazily
//!
//! ### [`sink`] / [`songbird_sink`] - Output
//! - [`sink::PlaybackSink`] is the seam; [`songbird_sink::SongbirdSink`]
//!   plays into a Discord voice call
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_session::audio::{registry::SessionRegistry, songbird_sink::SongbirdSink};
//! use serenity::all::{ChannelId, GuildId};
//!
//! # async fn example(
//! #     registry: Arc<SessionRegistry>,
//! #     manager: Arc<songbird::Songbird>,
//! #     resolver: Arc<dyn voice_session::sources::MediaResolver>,
//! # ) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//! let session = registry
//!     .get_or_create(guild_id, || async move {
//!         let sink: Arc<dyn voice_session::audio::sink::PlaybackSink> =
//!             SongbirdSink::connect(manager, guild_id, ChannelId::new(42)).await?;
//!         Ok(sink)
//!     })
//!     .await?;
//!
//! session.enqueue(resolver.resolve("lofi beats").await?)?;
//! session.set_loop(true);
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;
pub mod songbird_sink;
pub mod track;

#[cfg(test)]
pub(crate) mod testing;
