use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{session::PlayState, track::Track},
    bot::MusicBot,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply(ctx, &command, "❌ Este comando solo funciona en un servidor").await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Los avisos de la sesión van al último canal donde se usó un comando
    bot.notifier.remember(guild_id, command.channel_id);

    match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await?,
        "play" => handle_enqueue(ctx, &command, bot, guild_id, true).await?,
        "add" => handle_enqueue(ctx, &command, bot, guild_id, false).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await?,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "shuffle" => handle_shuffle(ctx, &command, bot, guild_id).await?,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await?,
        "now" => handle_now(ctx, &command, bot, guild_id).await?,
        "help" => reply_embed(ctx, &command, embeds::create_help_embed()).await?,
        _ => reply(ctx, &command, "❌ Comando no reconocido").await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "❌ Debes estar en un canal de voz").await;
    };

    if bot.registry.get(guild_id).is_some() {
        bot.move_to(ctx, guild_id, channel_id).await?;
        return reply(ctx, command, "🔊 Movido a tu canal de voz").await;
    }

    match bot.session_for(ctx, guild_id, channel_id).await {
        Ok(_) => reply(ctx, command, "🔊 Conectado al canal de voz").await,
        Err(e) => reply(ctx, command, &format!("❌ {}", e)).await,
    }
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    if bot.registry.get(guild_id).is_none() {
        return reply(ctx, command, "❌ No estoy conectado a ningún canal de voz").await;
    }

    bot.leave(guild_id).await;
    reply(ctx, command, "👋 Desconectado del canal de voz").await
}

/// `/play` y `/add`. `/play` salta la canción actual; `/add` va al final.
async fn handle_enqueue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
    play_now: bool,
) -> Result<()> {
    let query = option_str(command, "query").unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return reply(ctx, command, "❌ Indica una URL o palabras para buscar").await;
    }

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "❌ Debes estar en un canal de voz").await;
    };

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let session = match bot.session_for(ctx, guild_id, channel_id).await {
        Ok(session) => session,
        Err(e) => return edit_error(ctx, command, "No se pudo conectar", &e.to_string()).await,
    };

    let track = match bot.resolver.resolve(&query).await {
        Ok(track) => track,
        Err(e) => {
            warn!("Búsqueda fallida para '{}': {}", query, e);
            return edit_error(ctx, command, "Error al procesar la búsqueda", &e.to_string()).await;
        }
    };

    let (info, stream) = track.into_parts();
    let info = info.with_requested_by(command.user.id);
    let track = Track::new(info.clone(), stream);

    let replace = play_now && session.is_playing();
    let result = if replace {
        session.replace_pending(track)
    } else {
        session.enqueue(track)
    };

    match result {
        Ok(()) => {
            let position = (!replace).then(|| session.queue().len()).filter(|len| *len > 0);
            let embed = embeds::create_track_added_embed(&info, position);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            Ok(())
        }
        Err(e) => edit_error(ctx, command, "No se pudo agregar", &e.to_string()).await,
    }
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let paused = bot.registry.get(guild_id).is_some_and(|s| s.pause());
    let message = if paused {
        "⏸️ Reproducción pausada"
    } else {
        "❌ No hay nada reproduciéndose"
    };
    reply(ctx, command, message).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let resumed = bot.registry.get(guild_id).is_some_and(|s| s.resume());
    let message = if resumed {
        "▶️ Reproducción reanudada"
    } else {
        "❌ No hay nada en pausa"
    };
    reply(ctx, command, message).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return reply(ctx, command, "❌ No estoy conectado a ningún canal de voz").await;
    };

    session.stop();
    reply(ctx, command, "⏹️ Reproducción detenida y cola limpiada").await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let skipped = bot.registry.get(guild_id).is_some_and(|s| s.skip());
    let message = if skipped {
        "⏭️ Canción saltada"
    } else {
        "❌ No hay nada reproduciéndose"
    };
    reply(ctx, command, message).await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id).filter(|s| s.current().is_some()) else {
        return reply(ctx, command, "❌ No hay nada reproduciéndose").await;
    };

    let message = if session.toggle_loop() {
        "🔂 Repetir canción activado"
    } else {
        "➡️ Repetición desactivada"
    };
    reply(ctx, command, message).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return reply(ctx, command, "❌ No estoy conectado a ningún canal de voz").await;
    };

    let Some(level) = option_i64(command, "level") else {
        let current = (session.volume() * 100.0).round() as u8;
        return reply(ctx, command, &format!("🔊 Volumen actual: {}%", current)).await;
    };

    match volume_from_percent(level).map(|v| session.set_volume(v)) {
        Some(Ok(())) => reply(ctx, command, &format!("🔊 Volumen ajustado a {}%", level)).await,
        Some(Err(e)) => reply(ctx, command, &format!("❌ {}", e)).await,
        None => reply(ctx, command, "❌ El volumen debe estar entre 0 y 100").await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id) else {
        return reply(ctx, command, "📋 La cola está vacía").await;
    };

    let page = option_i64(command, "page").unwrap_or(1).max(1) as usize;
    let queue_page = session.queue().page(page, bot.config.queue_page_size);
    let current = session.current();
    let embed = embeds::create_queue_embed(&queue_page, current.as_ref(), session.loop_enabled());

    reply_embed(ctx, command, embed).await
}

async fn handle_shuffle(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id).filter(|s| !s.queue().is_empty()) else {
        return reply(ctx, command, "📋 La cola está vacía").await;
    };

    session.queue().shuffle();
    reply(ctx, command, "🔀 Cola mezclada").await
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = bot.registry.get(guild_id).filter(|s| !s.queue().is_empty()) else {
        return reply(ctx, command, "📋 La cola está vacía").await;
    };

    let position = option_i64(command, "index").unwrap_or(0);
    let Some(index) = queue_index(position) else {
        return reply(ctx, command, "❌ La posición empieza en 1").await;
    };

    match session.queue().remove_at(index) {
        Ok(removed) => reply(ctx, command, &format!("🗑️ Quitada de la cola: {}", removed)).await,
        Err(e) => reply(ctx, command, &format!("❌ {}", e)).await,
    }
}

async fn handle_now(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let session = bot.registry.get(guild_id);
    let Some((session, current)) = session.and_then(|s| s.current().map(|c| (s, c))) else {
        return reply(ctx, command, "❌ No hay nada reproduciéndose actualmente").await;
    };

    let embed = embeds::create_now_playing_embed(
        &current,
        session.loop_enabled(),
        session.volume(),
        session.play_state() == PlayState::Looping,
    );
    reply_embed(ctx, command, embed).await
}

// Funciones auxiliares

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn edit_error(
    ctx: &Context,
    command: &CommandInteraction,
    title: &str,
    description: &str,
) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed(title, description)),
        )
        .await?;
    Ok(())
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Volumen 0-100 de los usuarios a ganancia 0.0-1.0
fn volume_from_percent(level: i64) -> Option<f32> {
    (0..=100).contains(&level).then(|| level as f32 / 100.0)
}

/// Posición 1-based de los usuarios a índice de la cola
fn queue_index(position: i64) -> Option<usize> {
    usize::try_from(position).ok()?.checked_sub(1)
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
