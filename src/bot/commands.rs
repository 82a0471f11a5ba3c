use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId, Permissions},
    prelude::Context,
};

/// Todos los comandos slash del bot
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        add_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        skip_command(),
        loop_command(),
        volume_command(),
        queue_command(),
        shuffle_command(),
        remove_command(),
        now_command(),
        help_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

/// Solo quien puede gestionar el servidor controla la música
fn music_command(name: &str, description: &str) -> CreateCommand {
    CreateCommand::new(name)
        .description(description)
        .default_member_permissions(Permissions::MANAGE_GUILD)
}

fn query_option() -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "query", "URL o término de búsqueda")
        .required(true)
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    music_command("join", "Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    music_command("leave", "Limpia la cola y desconecta el bot del canal de voz")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    music_command("play", "Reproduce una canción ya, por delante de la cola").add_option(query_option())
}

fn add_command() -> CreateCommand {
    music_command("add", "Agrega una canción al final de la cola").add_option(query_option())
}

// Comandos de control

fn pause_command() -> CreateCommand {
    music_command("pause", "Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    music_command("resume", "Reanuda la reproducción pausada")
}

fn stop_command() -> CreateCommand {
    music_command("stop", "Detiene la reproducción y limpia la cola")
}

fn skip_command() -> CreateCommand {
    music_command("skip", "Salta a la siguiente canción")
}

fn loop_command() -> CreateCommand {
    music_command("loop", "Activa/desactiva la repetición de la canción actual")
}

fn volume_command() -> CreateCommand {
    music_command("volume", "Muestra o ajusta el volumen de reproducción").add_option(
        CreateCommandOption::new(CommandOptionType::Integer, "level", "Nivel de volumen (0-100)")
            .min_int_value(0)
            .max_int_value(100),
    )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    music_command("queue", "Muestra la cola de reproducción").add_option(
        CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
            .min_int_value(1),
    )
}

fn shuffle_command() -> CreateCommand {
    music_command("shuffle", "Mezcla la cola")
}

fn remove_command() -> CreateCommand {
    music_command("remove", "Quita una canción de la cola").add_option(
        CreateCommandOption::new(CommandOptionType::Integer, "index", "Posición en la cola (desde 1)")
            .min_int_value(1)
            .required(true),
    )
}

fn now_command() -> CreateCommand {
    music_command("now", "Muestra la canción actual")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra información de ayuda")
}
