use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::Input,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        sink::{Completion, PlaybackEnd, PlaybackSink},
        track::StreamHandle,
    },
    error::SinkError,
};

/// [`PlaybackSink`] backed by a songbird voice call.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    current: Mutex<Option<BoundTrack>>,
}

struct BoundTrack {
    handle: TrackHandle,
    slot: Arc<CompletionSlot>,
}

impl SongbirdSink {
    /// Joins `channel_id` and wraps the resulting call.
    pub async fn connect(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Self>, SinkError> {
        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| SinkError::Unavailable(format!("no se pudo unir al canal de voz: {e}")))?;

        info!("🔊 Conectado al canal {} en guild {}", channel_id, guild_id);

        Ok(Arc::new(Self {
            manager,
            guild_id,
            call,
            current: Mutex::new(None),
        }))
    }

    fn handle(&self) -> Option<TrackHandle> {
        self.current.lock().as_ref().map(|bound| bound.handle.clone())
    }
}

#[async_trait]
impl PlaybackSink for SongbirdSink {
    async fn bind(
        &self,
        stream: StreamHandle,
        gain: f32,
        completion: Completion,
    ) -> Result<(), SinkError> {
        let input = stream
            .downcast::<Input>()
            .map_err(|_| SinkError::Unsupported("el stream no es un Input de songbird"))?;

        let slot = Arc::new(CompletionSlot::new(completion));

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        let _ = handle.set_volume(gain);

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    CompletionHandler {
                        guild_id: self.guild_id,
                        slot: slot.clone(),
                    },
                )
                .map_err(|e| SinkError::Backend(format!("error al agregar event handler: {e}")))?;
        }

        debug!("Stream vinculado en guild {} (gen {})", self.guild_id, slot.generation());
        *self.current.lock() = Some(BoundTrack { handle, slot });
        Ok(())
    }

    async fn stop(&self) -> Result<(), SinkError> {
        let bound = self.current.lock().take();
        let Some(bound) = bound else {
            return Ok(());
        };
        bound.slot.stop_requested.store(true, Ordering::SeqCst);

        if let Err(e) = bound.handle.stop() {
            // El track ya terminó; su completion ya se entregó o se entrega aquí
            debug!("Track ya detenido en guild {}: {}", self.guild_id, e);
            bound.slot.finish(PlaybackEnd::Stopped);
        }
        Ok(())
    }

    async fn set_gain(&self, gain: f32) -> Result<(), SinkError> {
        let Some(handle) = self.handle() else {
            return Ok(());
        };
        handle
            .set_volume(gain)
            .map_err(|e| SinkError::Backend(e.to_string()))
    }

    async fn pause(&self) -> Result<(), SinkError> {
        let Some(handle) = self.handle() else {
            return Ok(());
        };
        handle.pause().map_err(|e| SinkError::Backend(e.to_string()))
    }

    async fn resume(&self) -> Result<(), SinkError> {
        let Some(handle) = self.handle() else {
            return Ok(());
        };
        handle.play().map_err(|e| SinkError::Backend(e.to_string()))
    }

    async fn release(&self) {
        let bound = self.current.lock().take();
        if let Some(bound) = bound {
            let _ = bound.handle.stop();
            bound.slot.finish(PlaybackEnd::Stopped);
        }

        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("⚠️ Error al salir del canal de voz en guild {}: {}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

/// Shared between the End and Error handlers of one bind; whichever fires
/// first consumes the completion.
struct CompletionSlot {
    generation: u64,
    completion: Mutex<Option<Completion>>,
    stop_requested: AtomicBool,
}

impl CompletionSlot {
    fn new(completion: Completion) -> Self {
        Self {
            generation: completion.generation(),
            completion: Mutex::new(Some(completion)),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn finish(&self, end: PlaybackEnd) {
        let Some(completion) = self.completion.lock().take() else {
            return;
        };
        let end = match end {
            PlaybackEnd::Finished if self.stop_requested.load(Ordering::SeqCst) => {
                PlaybackEnd::Stopped
            }
            other => other,
        };
        completion.complete(end);
    }
}

struct CompletionHandler {
    guild_id: GuildId,
    slot: Arc<CompletionSlot>,
}

#[async_trait]
impl VoiceEventHandler for CompletionHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                match &state.playing {
                    PlayMode::Errored(e) => {
                        error!("❌ Error en track para guild {}: {:?}", self.guild_id, e);
                        self.slot.finish(PlaybackEnd::Error(format!("{e:?}")));
                    }
                    _ => self.slot.finish(PlaybackEnd::Finished),
                }
            }
        }

        // Un solo disparo por handler
        Some(Event::Cancel)
    }
}
