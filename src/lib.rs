//! # Voice Session
//!
//! Per-guild voice playback sessions for a Discord music bot: a track queue,
//! a player loop per guild with loop mode, volume, pause/resume and idle
//! disconnect, and a registry that keeps at most one session per guild.
//!
//! - [`audio`] - session core (queue, session, registry, sinks)
//! - [`sources`] - turning queries into playable tracks
//! - [`bot`] - serenity event handler and slash commands
//! - [`ui`] - embeds
//! - [`config`] / [`error`] - configuration and error types

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
