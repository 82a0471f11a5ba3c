use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{queue::QueuePage, track::TrackInfo};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Voice Session";

/// Crea un embed para mostrar la canción actual
///
/// `looping` marks a repetition started by loop mode.
pub fn create_now_playing_embed(
    track: &TrackInfo,
    loop_enabled: bool,
    volume: f32,
    looping: bool,
) -> CreateEmbed {
    let title = if looping {
        "🔂 Repitiendo la misma canción"
    } else {
        "🎵 Reproduciendo Ahora"
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(format!("```css\n{}\n```", track.title))
        .color(if looping { colors::MUSIC_PURPLE } else { colors::SUCCESS_GREEN })
        .field(
            "🎤 Artista",
            track.uploader.as_deref().unwrap_or("Desconocido"),
            true,
        )
        .field("⏱️ Duración", duration_field(track), true)
        .field("🔁 Loop", if loop_enabled { "Activado" } else { "Desactivado" }, true)
        .field("🔊 Volumen", format!("{}%", volume_percent(volume)), true)
        .field("🔗 Fuente", format!("[Click]({})", track.page_url), true);

    if let Some(user) = track.requested_by {
        embed = embed.field("👤 Solicitado por", format!("<@{}>", user), true);
    }

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(&track.page_url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
///
/// `position` is 1-based; `None` means the track plays right away.
pub fn create_track_added_embed(track: &TrackInfo, position: Option<usize>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("Enqueued {}", track))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_field(track), true);

    embed = match position {
        Some(position) => embed.field("📍 Posición", format!("#{}", position), true),
        None => embed.field("📍 Posición", "Siguiente", true),
    };

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .url(&track.page_url)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente si no hay música sonando",
        ))
}

/// Crea un embed con una página de la cola
pub fn create_queue_embed(
    page: &QueuePage,
    current: Option<&TrackInfo>,
    loop_enabled: bool,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = current {
        let status = if loop_enabled { "🔂" } else { "▶️" };
        embed = embed.field(format!("{} Reproduciendo", status), current.to_string(), false);
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/add <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    embed = embed.description(format!(
        "**{} canciones:**\n\n{}",
        page.total_items,
        queue_lines(page)
    ));

    let mut info = format!("**Total:** {} canciones", page.total_items);
    if page.total_duration > Duration::ZERO {
        info.push_str(&format!(
            " • **Duración:** {}",
            format_duration(page.total_duration)
        ));
    }
    embed = embed.field("Información", info, false);

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Página {} de {}",
            page.current_page, page.total_pages
        )))
        .timestamp(Timestamp::now())
}

/// Una línea por canción, numeradas desde 1
fn queue_lines(page: &QueuePage) -> String {
    page.items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let duration = item
                .display_duration()
                .map(|d| format!(" `[{}]`", d))
                .unwrap_or_default();
            format!(
                "`{}.` [**{}**]({}){}\n",
                page.offset + i + 1,
                item.title,
                item.page_url,
                duration
            )
        })
        .collect()
}

/// Crea un embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Uso")
        .color(colors::INFO_BLUE)
        .description("Todos los comandos son comandos slash (`/`)")
        .field(
            "🎵 Reproducción",
            "• `/add <URL/búsqueda>` - Agrega a la cola\n\
            • `/play <URL/búsqueda>` - Reproduce ya, saltando la actual\n\
            • `/pause` `/resume` `/stop` - Controla la reproducción\n\
            • `/skip` - Siguiente canción de la cola\n\
            • `/loop` - Repite la canción actual",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue [página]` - Muestra la cola\n\
            • `/shuffle` - Mezcla la cola\n\
            • `/remove <n>` - Quita la canción número `n`\n\
            • `/now` - Muestra la canción actual",
            false,
        )
        .field(
            "🔊 Conexión y audio",
            "• `/join` - Conecta a tu canal de voz\n\
            • `/leave` - Desconecta y limpia la cola\n\
            • `/volume [0-100]` - Muestra o cambia el volumen",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de aviso
pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn duration_field(track: &TrackInfo) -> String {
    track
        .display_duration()
        .unwrap_or_else(|| "🔴 En vivo".to_string())
}

fn volume_percent(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}
