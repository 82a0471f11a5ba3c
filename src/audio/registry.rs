use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{future::Future, sync::Arc};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    audio::{events::Notifier, session::Session, sink::PlaybackSink},
    config::SessionConfig,
    error::{SessionError, SinkError},
    sources::MediaResolver,
};

/// At most one live [`Session`] per guild.
///
/// Sessions are created lazily on the first command that needs voice and
/// dropped on leave. A session that disconnected by itself (idle timeout) is
/// replaced by a fresh one the next time it is requested.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<OnceCell<Session>>>,
    resolver: Arc<dyn MediaResolver>,
    notifier: Arc<dyn Notifier>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(
        resolver: Arc<dyn MediaResolver>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            resolver,
            notifier,
            config,
        }
    }

    /// Returns the live session of `guild_id`, creating it with a sink from
    /// `sink_factory` if there is none.
    ///
    /// Concurrent callers for the same guild share a single creation; the
    /// factory of the losers is never run.
    pub async fn get_or_create<F, Fut>(
        &self,
        guild_id: GuildId,
        sink_factory: F,
    ) -> Result<Session, SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PlaybackSink>, SinkError>>,
    {
        // Sesiones muertas por timeout se reemplazan
        if self
            .sessions
            .remove_if(&guild_id, |_, cell| {
                cell.get().is_some_and(Session::is_disconnected)
            })
            .is_some()
        {
            debug!("♻️ Reemplazando sesión desconectada de guild {}", guild_id);
        }

        let cell = self
            .sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let created = cell
            .get_or_try_init(|| async move {
                let sink = sink_factory()
                    .await
                    .map_err(SessionError::SinkUnavailable)?;
                Ok::<_, SessionError>(Session::start(
                    guild_id,
                    sink,
                    self.resolver.clone(),
                    self.notifier.clone(),
                    self.config,
                ))
            })
            .await;

        match created {
            Ok(session) => {
                // Un remove durante la creación se llevó la celda
                let tracked = self
                    .sessions
                    .get(&guild_id)
                    .is_some_and(|entry| Arc::ptr_eq(entry.value(), &cell));
                if tracked {
                    return Ok(session.clone());
                }
                warn!("⚠️ Guild {} eliminada mientras se creaba su sesión", guild_id);
                session.suspend().await;
                Err(SessionError::Disconnected)
            }
            Err(e) => {
                self.sessions.remove_if(&guild_id, |_, existing| {
                    Arc::ptr_eq(existing, &cell) && !existing.initialized()
                });
                Err(e)
            }
        }
    }

    /// Live session of `guild_id`, if any.
    pub fn get(&self, guild_id: GuildId) -> Option<Session> {
        self.sessions
            .get(&guild_id)
            .and_then(|cell| cell.get().cloned())
            .filter(|session| !session.is_disconnected())
    }

    /// Suspends and forgets the session of `guild_id`. No-op when absent.
    ///
    /// A session still being created is suspended by its creator once it
    /// notices the entry is gone.
    pub async fn remove(&self, guild_id: GuildId) {
        let Some((_, cell)) = self.sessions.remove(&guild_id) else {
            return;
        };
        if let Some(session) = cell.get() {
            session.suspend().await;
            info!("🗑️ Sesión eliminada para guild {}", guild_id);
        }
    }

    /// Suspends every session.
    pub async fn shutdown_all(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        info!("⚠️ Cerrando {} sesiones", guilds.len());
        for guild_id in guilds {
            self.remove(guild_id).await;
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().get().is_some_and(|s| !s.is_disconnected()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
