//! # Bot Module
//!
//! Discord surface of the voice sessions.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and dispatch ([`handlers`])
//! - The [`MusicBot`] event handler (ready, interactions, voice state updates)
//! - [`notifier::ChannelNotifier`], which posts session events to text channels
//!
//! Every command is a thin call into [`Session`] or its queue; the sessions
//! themselves live in the shared [`SessionRegistry`].

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{
    audio::{
        registry::SessionRegistry, session::Session, sink::PlaybackSink,
        songbird_sink::SongbirdSink,
    },
    config::Config,
    error::{SessionError, SinkError},
    sources::MediaResolver,
};
use notifier::ChannelNotifier;

/// Main Discord event handler.
///
/// Owns nothing per guild itself: sessions are in `registry`, the text
/// channel for announcements is tracked by `notifier`.
pub struct MusicBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<dyn MediaResolver>,
    pub notifier: Arc<ChannelNotifier>,
}

impl MusicBot {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn MediaResolver>,
        notifier: Arc<ChannelNotifier>,
    ) -> Self {
        Self {
            config,
            registry,
            resolver,
            notifier,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands (when `GUILD_ID` is set) propagate in about a second,
    /// global ones can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Returns the guild's session, joining `channel_id` first if there is none.
    pub async fn session_for(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Session, SessionError> {
        self.registry
            .get_or_create(guild_id, || async move {
                let manager = songbird::get(ctx)
                    .await
                    .ok_or_else(|| SinkError::Unavailable("Songbird no inicializado".into()))?;
                let sink: Arc<dyn PlaybackSink> =
                    SongbirdSink::connect(manager, guild_id, channel_id).await?;
                Ok::<_, SinkError>(sink)
            })
            .await
    }

    /// Moves an existing voice connection to another channel.
    pub async fn move_to(&self, ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        // Con una llamada existente, join solo cambia de canal
        manager.join(guild_id, channel_id).await?;
        info!("🔀 Movido al canal {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Suspends the guild's session and forgets its announcement channel.
    pub async fn leave(&self, guild_id: GuildId) {
        self.registry.remove(guild_id).await;
        self.notifier.forget(guild_id);
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Drops the session when the bot is disconnected from voice, whether by
    /// `/leave`, the idle timeout or a moderator.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.leave(guild_id).await;
        }
    }
}
