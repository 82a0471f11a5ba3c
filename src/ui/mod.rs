//! Discord embeds for command replies and session announcements.

pub mod embeds;
