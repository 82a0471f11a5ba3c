use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use voice_session::{
    audio::registry::SessionRegistry,
    bot::{notifier::ChannelNotifier, MusicBot},
    config::Config,
    sources::{MediaResolver, YtDlpResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voice_session=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Voice Session v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let ytdlp = YtDlpResolver::new(
        config.ytdlp_path.clone(),
        Duration::from_secs(config.resolve_timeout),
    );

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        ytdlp.verify().await?;
        println!("OK");
        return Ok(());
    }

    if let Err(e) = ytdlp.verify().await {
        warn!("⚠️ {:?} - las búsquedas fallarán hasta que yt-dlp esté disponible", e);
    }

    let resolver: Arc<dyn MediaResolver> = Arc::new(ytdlp);
    let notifier = Arc::new(ChannelNotifier::new(Arc::new(Http::new(&config.discord_token))));
    let registry = Arc::new(SessionRegistry::new(
        resolver.clone(),
        notifier.clone(),
        config.session(),
    ));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = MusicBot::new(config.clone(), registry.clone(), resolver, notifier);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        registry.shutdown_all().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
