use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    audio::events::{Notifier, SessionEvent},
    ui::embeds,
};

/// Posts session events as embeds to the text channel where the guild last
/// used a command.
pub struct ChannelNotifier {
    http: Arc<Http>,
    channels: DashMap<GuildId, ChannelId>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    /// Recuerda el canal de texto para los avisos de la guild
    pub fn remember(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub fn forget(&self, guild_id: GuildId) {
        self.channels.remove(&guild_id);
    }

    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.get(&guild_id).map(|c| *c)
    }
}

fn render(event: &SessionEvent) -> CreateEmbed {
    match event {
        SessionEvent::TrackStarted {
            track,
            looping,
            volume,
        } => embeds::create_now_playing_embed(track, *looping, *volume, *looping),
        SessionEvent::IdleDisconnect { after } => embeds::create_warning_embed(
            "Desconectado por inactividad",
            &format!(
                "No se agregó música en {}. ¡Hasta luego! 👋",
                embeds::format_duration(*after)
            ),
        ),
        SessionEvent::PlaybackError { track, error } => embeds::create_error_embed(
            "Error de reproducción",
            &format!("No se pudo reproducir {}: {}", track, error),
        ),
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, guild_id: GuildId, event: SessionEvent) {
        let Some(channel_id) = self.channel(guild_id) else {
            debug!("Sin canal de avisos para guild {}: {:?}", guild_id, event);
            return;
        };

        let message = CreateMessage::new().embed(render(&event));
        if let Err(e) = channel_id.send_message(self.http.as_ref(), message).await {
            warn!("⚠️ No se pudo enviar aviso a {} (guild {}): {:?}", channel_id, guild_id, e);
        }

        if matches!(event, SessionEvent::IdleDisconnect { .. }) {
            self.forget(guild_id);
        }
    }
}
