//! Per-guild playback controller.
//!
//! A [`Session`] owns one [`TrackQueue`], the "now playing" slot and a
//! background task (the player loop) that is the only code talking to the
//! [`PlaybackSink`]. Control operations update shared state under a mutex and
//! message the loop; every message and every sink completion carries the
//! generation of the bind it belongs to, so anything that arrives late is
//! dropped instead of acting on the wrong track.

use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        events::{Notifier, SessionEvent},
        queue::TrackQueue,
        sink::{Completion, CompletionEvent, PlaybackEnd, PlaybackSink},
        track::{Track, TrackInfo},
    },
    config::SessionConfig,
    error::{ConfigError, QueueError, SessionError},
    sources::MediaResolver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Waiting for the queue.
    Idle,
    Playing,
    /// Replaying the previous track.
    Looping,
    /// Terminal. The sink has been (or is being) released.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Control {
    Stop,
    Gain(f32),
    Pause,
    Resume,
}

#[derive(Debug)]
struct Command {
    generation: u64,
    control: Control,
}

#[derive(Debug)]
struct State {
    current: Option<TrackInfo>,
    play_state: PlayState,
    loop_enabled: bool,
    volume: f32,
    paused: bool,
    /// A stream is bound to the sink and its completion is pending.
    bound: bool,
    generation: u64,
}

struct Inner {
    guild_id: GuildId,
    queue: TrackQueue,
    state: Mutex<State>,
    sink: Arc<dyn PlaybackSink>,
    resolver: Arc<dyn MediaResolver>,
    notifier: Arc<dyn Notifier>,
    idle_timeout: Duration,
    cancel: CancellationToken,
    /// Fires once the player loop has released the sink and exited.
    finished: CancellationToken,
    controls: mpsc::UnboundedSender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("guild_id", &self.inner.guild_id)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}

impl Session {
    /// Creates the session and spawns its player loop on the current runtime.
    pub fn start(
        guild_id: GuildId,
        sink: Arc<dyn PlaybackSink>,
        resolver: Arc<dyn MediaResolver>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let queue = match config.max_queue_size {
            Some(max) => TrackQueue::with_max_size(max),
            None => TrackQueue::new(),
        };

        let inner = Arc::new(Inner {
            guild_id,
            queue,
            state: Mutex::new(State {
                current: None,
                play_state: PlayState::Idle,
                loop_enabled: false,
                volume: config.default_volume.clamp(0.0, 1.0),
                paused: false,
                bound: false,
                generation: 0,
            }),
            sink,
            resolver,
            notifier,
            idle_timeout: config.idle_timeout,
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            controls: control_tx,
            task: Mutex::new(None),
        });

        let player = PlayerLoop {
            inner: inner.clone(),
            completion_tx,
            completions: completion_rx,
            controls: control_rx,
        };
        let task = tokio::spawn(player.run());
        *inner.task.lock() = Some(task);

        info!("🎛️ Sesión creada para guild {}", guild_id);
        Self { inner }
    }

    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.inner.queue
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&self, track: Track) -> Result<(), SessionError> {
        self.ensure_alive()?;
        self.inner.queue.enqueue(track).map_err(queue_error)
    }

    /// Plays `track` next, ahead of everything already pending.
    ///
    /// If something is playing it is skipped; pending tracks keep their order
    /// behind `track`.
    pub fn replace_pending(&self, track: Track) -> Result<(), SessionError> {
        self.ensure_alive()?;
        self.inner.queue.jump_front(track).map_err(queue_error)?;
        self.skip();
        Ok(())
    }

    /// Turns replay of the current track on or off. Takes effect when the
    /// current repetition ends.
    pub fn set_loop(&self, enabled: bool) {
        self.inner.state.lock().loop_enabled = enabled;
        if enabled {
            info!("🔂 Repetir canción activado");
        } else {
            info!("➡️ Repetición desactivada");
        }
    }

    pub fn toggle_loop(&self) -> bool {
        let enabled = !self.loop_enabled();
        self.set_loop(enabled);
        enabled
    }

    pub fn set_volume(&self, volume: f32) -> Result<(), SessionError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::VolumeOutOfRange(volume).into());
        }
        self.ensure_alive()?;

        let bound = {
            let mut state = self.inner.state.lock();
            state.volume = volume;
            state.bound.then_some(state.generation)
        };
        if let Some(generation) = bound {
            self.send(generation, Control::Gain(volume));
        }

        info!("🔊 Volumen ajustado a {}%", (volume * 100.0).round() as u8);
        Ok(())
    }

    /// Ends the current track early. Returns `false` when nothing is playing.
    pub fn skip(&self) -> bool {
        let generation = {
            let mut state = self.inner.state.lock();
            if !matches!(state.play_state, PlayState::Playing | PlayState::Looping) {
                return false;
            }
            state.loop_enabled = false;
            if !state.bound {
                // Reabriendo el stream del loop; el loop verá loop_enabled=false
                return true;
            }
            state.generation
        };

        info!("⏭️ Saltando track actual en guild {}", self.inner.guild_id);
        self.send(generation, Control::Stop);
        true
    }

    pub fn pause(&self) -> bool {
        self.set_paused(true)
    }

    pub fn resume(&self) -> bool {
        self.set_paused(false)
    }

    /// Clears the queue and stops the current track, staying connected.
    pub fn stop(&self) {
        self.inner.queue.clear();
        self.inner.state.lock().loop_enabled = false;
        self.skip();
        info!("⏹️ Reproducción detenida en guild {}", self.inner.guild_id);
    }

    /// Tears the session down: clears the queue, drops the current track and
    /// releases the sink. Returns once the player loop has exited, for every
    /// caller, including concurrent ones.
    ///
    /// Calling it again is a no-op.
    pub async fn suspend(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.play_state != PlayState::Disconnected {
                info!("👋 Suspendiendo sesión de guild {}", self.inner.guild_id);
            }
            state.play_state = PlayState::Disconnected;
            state.current = None;
            state.loop_enabled = false;
        }
        self.inner.queue.close();
        self.inner.cancel.cancel();

        let task = self.inner.task.lock().take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    error!("❌ El loop de reproducción terminó con error: {:?}", e);
                }
            }
            // Otro llamador ya espera el task
            None => self.inner.finished.cancelled().await,
        }
    }

    /// Resolves once the session is disconnected, for whatever reason.
    pub async fn closed(&self) {
        self.inner.cancel.cancelled().await;
    }

    pub fn is_playing(&self) -> bool {
        let state = self.inner.state.lock();
        state.bound && state.current.is_some()
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.cancel.is_cancelled()
            || self.inner.state.lock().play_state == PlayState::Disconnected
    }

    pub fn current(&self) -> Option<TrackInfo> {
        self.inner.state.lock().current.clone()
    }

    pub fn play_state(&self) -> PlayState {
        self.inner.state.lock().play_state
    }

    pub fn loop_enabled(&self) -> bool {
        self.inner.state.lock().loop_enabled
    }

    pub fn volume(&self) -> f32 {
        self.inner.state.lock().volume
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    fn set_paused(&self, paused: bool) -> bool {
        let generation = {
            let mut state = self.inner.state.lock();
            if !state.bound || state.paused == paused {
                return false;
            }
            state.paused = paused;
            state.generation
        };

        let control = if paused {
            info!("⏸️ Reproducción pausada");
            Control::Pause
        } else {
            info!("▶️ Reproducción reanudada");
            Control::Resume
        };
        self.send(generation, control);
        true
    }

    fn send(&self, generation: u64, control: Control) {
        if self
            .inner
            .controls
            .send(Command { generation, control })
            .is_err()
        {
            debug!("Loop de reproducción ya terminado, ignorando {:?}", control);
        }
    }

    fn ensure_alive(&self) -> Result<(), SessionError> {
        if self.is_disconnected() {
            Err(SessionError::Disconnected)
        } else {
            Ok(())
        }
    }
}

fn queue_error(e: QueueError) -> SessionError {
    match e {
        QueueError::Closed => SessionError::Disconnected,
        e => e.into(),
    }
}

enum Next {
    Play { track: Track, looping: bool },
    /// Nothing to play this round (e.g. replay failed); go back to the queue.
    Advance,
    Shutdown,
}

enum Step {
    Replay(TrackInfo),
    Advance,
    Shutdown,
}

/// The background consumer. Single owner of every sink call.
struct PlayerLoop {
    inner: Arc<Inner>,
    completion_tx: mpsc::UnboundedSender<CompletionEvent>,
    completions: mpsc::UnboundedReceiver<CompletionEvent>,
    controls: mpsc::UnboundedReceiver<Command>,
}

impl PlayerLoop {
    async fn run(mut self) {
        // Se dispara también si el loop entra en pánico
        let _finished = self.inner.finished.clone().drop_guard();
        debug!("▶️ Loop de reproducción iniciado para guild {}", self.inner.guild_id);
        let mut replay: Option<TrackInfo> = None;

        loop {
            let next = match replay.take() {
                Some(info) => self.reopen(info).await,
                None => self.next_from_queue().await,
            };

            let (track, looping) = match next {
                Next::Play { track, looping } => (track, looping),
                Next::Advance => continue,
                Next::Shutdown => break,
            };

            match self.play(track, looping).await {
                Step::Replay(info) => replay = Some(info),
                Step::Advance => {}
                Step::Shutdown => break,
            }
        }

        self.teardown().await;
    }

    async fn next_from_queue(&mut self) -> Next {
        {
            let mut state = self.inner.state.lock();
            if state.play_state == PlayState::Disconnected {
                return Next::Shutdown;
            }
            state.play_state = PlayState::Idle;
            state.current = None;
            state.paused = false;
        }

        let wait = self.inner.queue.dequeue_wait(&self.inner.cancel);
        match tokio::time::timeout(self.inner.idle_timeout, wait).await {
            Ok(Ok(track)) => Next::Play {
                track,
                looping: false,
            },
            Ok(Err(_canceled)) => {
                debug!("Espera de cola cancelada en guild {}", self.inner.guild_id);
                Next::Shutdown
            }
            Err(_elapsed) => {
                if self.inner.cancel.is_cancelled() {
                    return Next::Shutdown;
                }
                // Un enqueue justo en el límite gana; después la cola rechaza
                if !self.inner.queue.close_if_empty() {
                    return Next::Advance;
                }
                info!(
                    "⏰ Sin canciones nuevas en {}s, desconectando guild {}",
                    self.inner.idle_timeout.as_secs(),
                    self.inner.guild_id
                );
                self.mark_disconnected();
                self.notify(SessionEvent::IdleDisconnect {
                    after: self.inner.idle_timeout,
                })
                .await;
                Next::Shutdown
            }
        }
    }

    /// Opens a fresh stream for the track that just finished.
    async fn reopen(&mut self, info: TrackInfo) -> Next {
        self.inner.state.lock().play_state = PlayState::Looping;
        debug!("🔂 Reabriendo stream para repetir: {}", info.title);

        let result = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => return Next::Shutdown,
            result = self.inner.resolver.reopen(&info) => result,
        };

        match result {
            Ok(stream) => {
                if !self.inner.state.lock().loop_enabled {
                    debug!("Loop desactivado mientras se reabría {}, avanzando", info.title);
                    return Next::Advance;
                }
                Next::Play {
                    track: Track::new(info, stream),
                    looping: true,
                }
            }
            Err(e) => {
                warn!("❌ No se pudo reabrir {} para repetir: {}", info.title, e);
                self.playback_failed(info, e.to_string()).await;
                Next::Advance
            }
        }
    }

    async fn play(&mut self, track: Track, looping: bool) -> Step {
        let (info, stream) = track.into_parts();

        let (generation, volume) = {
            let mut state = self.inner.state.lock();
            if state.play_state == PlayState::Disconnected {
                return Step::Shutdown;
            }
            state.generation += 1;
            state.current = Some(info.clone());
            state.play_state = if looping {
                PlayState::Looping
            } else {
                PlayState::Playing
            };
            state.paused = false;
            state.bound = true;
            (state.generation, state.volume)
        };

        let completion = Completion::new(generation, self.completion_tx.clone());
        if let Err(e) = self.inner.sink.bind(stream, volume, completion).await {
            error!("❌ Error al reproducir {}: {}", info.title, e);
            self.inner.state.lock().bound = false;
            self.playback_failed(info, e.to_string()).await;
            return Step::Advance;
        }

        info!("🎵 Reproduciendo: {} (guild {})", info.title, self.inner.guild_id);
        self.notify(SessionEvent::TrackStarted {
            track: info.clone(),
            looping,
            volume,
        })
        .await;

        let Some(end) = self.wait_for_end(generation).await else {
            return Step::Shutdown;
        };

        let loop_enabled = {
            let mut state = self.inner.state.lock();
            state.bound = false;
            if state.play_state == PlayState::Disconnected {
                return Step::Shutdown;
            }
            state.loop_enabled
        };

        match end {
            PlaybackEnd::Finished if loop_enabled => Step::Replay(info),
            PlaybackEnd::Finished | PlaybackEnd::Stopped => {
                debug!("Track terminado ({:?}): {}", end, info.title);
                Step::Advance
            }
            PlaybackEnd::Error(detail) => {
                error!("❌ Error en track {}: {}", info.title, detail);
                self.playback_failed(info, detail).await;
                Step::Advance
            }
        }
    }

    /// Waits for the completion of bind `generation`, forwarding control
    /// messages for it to the sink meanwhile. `None` on shutdown.
    async fn wait_for_end(&mut self, generation: u64) -> Option<PlaybackEnd> {
        loop {
            tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => return None,
                Some(event) = self.completions.recv() => {
                    if event.generation == generation {
                        return Some(event.end);
                    }
                    debug!("Ignorando completion obsoleta (gen {} != {})", event.generation, generation);
                }
                Some(command) = self.controls.recv() => {
                    if command.generation == generation {
                        self.apply(command.control).await;
                    } else {
                        debug!("Ignorando control obsoleto {:?}", command.control);
                    }
                }
            }
        }
    }

    async fn apply(&self, control: Control) {
        let sink = &self.inner.sink;
        let result = match control {
            Control::Stop => sink.stop().await,
            Control::Gain(gain) => sink.set_gain(gain).await,
            Control::Pause => sink.pause().await,
            Control::Resume => sink.resume().await,
        };
        if let Err(e) = result {
            warn!("⚠️ El sink rechazó {:?}: {}", control, e);
        }
    }

    /// Recoverable failure of one track: loop off, tell the users, move on.
    async fn playback_failed(&self, track: TrackInfo, error: String) {
        {
            let mut state = self.inner.state.lock();
            state.loop_enabled = false;
            state.current = None;
        }
        self.notify(SessionEvent::PlaybackError { track, error }).await;
    }

    fn mark_disconnected(&self) {
        {
            let mut state = self.inner.state.lock();
            state.play_state = PlayState::Disconnected;
            state.current = None;
            state.loop_enabled = false;
        }
        self.inner.queue.close();
        self.inner.cancel.cancel();
    }

    async fn notify(&self, event: SessionEvent) {
        self.inner.notifier.notify(self.inner.guild_id, event).await;
    }

    async fn teardown(&mut self) {
        self.mark_disconnected();
        let was_bound = std::mem::take(&mut self.inner.state.lock().bound);

        if was_bound {
            if let Err(e) = self.inner.sink.stop().await {
                warn!("⚠️ Error al detener el sink: {}", e);
            }
        }
        self.inner.sink.release().await;
        info!("🔌 Sesión de guild {} finalizada", self.inner.guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            events::MockNotifier,
            testing::{eventually, reopened, recv_bind, track, FakeSink, RecordingNotifier},
            track::StreamHandle,
        },
        error::ResolutionError,
        sources::MockMediaResolver,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Resolver whose `reopen` parks until the test lets it through.
    #[derive(Default)]
    struct GatedResolver {
        entered: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl MediaResolver for GatedResolver {
        async fn resolve(&self, query: &str) -> Result<Track, ResolutionError> {
            Err(ResolutionError::NotFound(query.to_string()))
        }

        async fn reopen(&self, info: &TrackInfo) -> Result<StreamHandle, ResolutionError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(reopened(info))
        }
    }

    struct Harness {
        session: Session,
        sink: Arc<FakeSink>,
        binds: mpsc::UnboundedReceiver<String>,
        notifier: Arc<RecordingNotifier>,
        reopens: Arc<AtomicUsize>,
    }

    impl Harness {
        async fn next_bind(&mut self) -> String {
            recv_bind(&mut self.binds).await
        }
    }

    fn counting_resolver(reopens: Arc<AtomicUsize>) -> MockMediaResolver {
        let mut resolver = MockMediaResolver::new();
        resolver.expect_reopen().returning(move |info| {
            reopens.fetch_add(1, Ordering::SeqCst);
            Ok(reopened(info))
        });
        resolver
    }

    fn harness_with(resolver: impl MediaResolver + 'static, idle_timeout: Duration) -> Harness {
        let (sink, binds) = FakeSink::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let config = SessionConfig {
            idle_timeout,
            ..SessionConfig::default()
        };
        let session = Session::start(
            GuildId::new(1),
            sink.clone(),
            Arc::new(resolver),
            notifier.clone(),
            config,
        );
        Harness {
            session,
            sink,
            binds,
            notifier,
            reopens: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn harness() -> Harness {
        let reopens = Arc::new(AtomicUsize::new(0));
        let mut h = harness_with(counting_resolver(reopens.clone()), Duration::from_secs(600));
        h.reopens = reopens;
        h
    }

    #[tokio::test]
    async fn test_plays_in_enqueue_order() {
        let mut h = harness();
        for title in ["A", "B", "C"] {
            h.session.enqueue(track(title)).unwrap();
        }

        let mut played = Vec::new();
        for _ in 0..3 {
            played.push(h.next_bind().await);
            h.sink.finish(PlaybackEnd::Finished);
        }

        assert_eq!(played, vec!["stream:A", "stream:B", "stream:C"]);
        eventually(|| h.session.play_state() == PlayState::Idle).await;
        assert!(h.session.current().is_none());
    }

    #[tokio::test]
    async fn test_loop_replays_same_track_without_requeue() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.session.set_loop(true);

        assert_eq!(h.next_bind().await, "stream:A");
        for _ in 0..3 {
            h.sink.finish(PlaybackEnd::Finished);
            assert_eq!(h.next_bind().await, "reopen:A");
            assert_eq!(h.session.current().unwrap().title, "A");
            assert_eq!(h.session.queue().len(), 0);
            assert_eq!(h.session.play_state(), PlayState::Looping);
        }
        assert_eq!(h.reopens.load(Ordering::SeqCst), 3);

        eventually(|| {
            matches!(
                h.notifier.events().last(),
                Some(SessionEvent::TrackStarted { looping: true, .. })
            )
        })
        .await;
    }

    #[tokio::test]
    async fn test_loop_enabled_mid_track_applies_at_completion() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();

        assert_eq!(h.next_bind().await, "stream:A");
        h.session.set_loop(true);
        h.sink.finish(PlaybackEnd::Finished);
        assert_eq!(h.next_bind().await, "reopen:A");

        h.session.set_loop(false);
        h.sink.finish(PlaybackEnd::Finished);
        assert_eq!(h.next_bind().await, "stream:B");
    }

    #[tokio::test]
    async fn test_sink_error_disables_loop_and_advances() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();
        h.session.set_loop(true);

        assert_eq!(h.next_bind().await, "stream:A");
        h.sink.finish(PlaybackEnd::Error("decoder crashed".into()));

        assert_eq!(h.next_bind().await, "stream:B");
        assert_eq!(h.reopens.load(Ordering::SeqCst), 0);
        assert!(!h.session.loop_enabled());
        assert!(h.notifier.events().iter().any(|event| matches!(
            event,
            SessionEvent::PlaybackError { track, .. } if track.title == "A"
        )));
    }

    #[tokio::test]
    async fn test_failed_reopen_is_playback_error() {
        let mut resolver = MockMediaResolver::new();
        resolver
            .expect_reopen()
            .returning(|info| Err(ResolutionError::EmptyStream(info.page_url.clone())));
        let mut h = harness_with(resolver, Duration::from_secs(600));
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();
        h.session.set_loop(true);

        assert_eq!(h.next_bind().await, "stream:A");
        h.sink.finish(PlaybackEnd::Finished);

        assert_eq!(h.next_bind().await, "stream:B");
        assert!(!h.session.loop_enabled());
        assert!(h
            .notifier
            .events()
            .iter()
            .any(|event| matches!(event, SessionEvent::PlaybackError { .. })));
    }

    #[tokio::test]
    async fn test_bind_failure_skips_track() {
        let mut h = harness();
        h.sink.fail_next_bind();
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();

        assert_eq!(h.next_bind().await, "stream:B");
        assert!(!h.session.is_disconnected());
    }

    #[tokio::test]
    async fn test_skip_forces_loop_off_and_advances() {
        let mut h = harness();
        assert!(!h.session.skip());

        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();
        h.session.set_loop(true);
        assert_eq!(h.next_bind().await, "stream:A");

        assert!(h.session.skip());
        assert!(!h.session.loop_enabled());
        assert_eq!(h.next_bind().await, "stream:B");
        assert_eq!(h.sink.stops(), 1);
        assert_eq!(h.reopens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_replace_pending_jumps_queue() {
        let mut h = harness();
        for title in ["B", "C", "D"] {
            h.session.enqueue(track(title)).unwrap();
        }
        assert_eq!(h.next_bind().await, "stream:B");

        h.session.replace_pending(track("X")).unwrap();

        let mut played = vec![h.next_bind().await];
        for _ in 0..2 {
            h.sink.finish(PlaybackEnd::Finished);
            played.push(h.next_bind().await);
        }
        assert_eq!(played, vec!["stream:X", "stream:C", "stream:D"]);
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();

        assert_eq!(h.next_bind().await, "stream:A");
        h.sink.finish(PlaybackEnd::Finished);
        assert_eq!(h.next_bind().await, "stream:B");

        // Callback tardío del bind de A mientras suena B
        h.sink.fire_stale(PlaybackEnd::Error("late".into()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.session.current().unwrap().title, "B");
        assert!(h.session.is_playing());

        h.session.enqueue(track("C")).unwrap();
        h.sink.finish(PlaybackEnd::Finished);
        assert_eq!(h.next_bind().await, "stream:C");
        assert!(!h
            .notifier
            .events()
            .iter()
            .any(|event| matches!(event, SessionEvent::PlaybackError { .. })));
    }

    #[tokio::test]
    async fn test_volume_bounds_and_gain() {
        let mut h = harness();
        assert_eq!(
            h.session.set_volume(-0.1).unwrap_err(),
            SessionError::Config(ConfigError::VolumeOutOfRange(-0.1))
        );
        assert!(h.session.set_volume(1.1).is_err());
        assert!(h.session.set_volume(f32::NAN).is_err());
        assert_eq!(h.session.volume(), 0.5);

        h.session.set_volume(0.0).unwrap();
        h.session.set_volume(1.0).unwrap();

        h.session.enqueue(track("A")).unwrap();
        h.next_bind().await;
        h.session.set_volume(0.3).unwrap();

        eventually(|| h.sink.gains() == vec![1.0, 0.3]).await;
        assert_eq!(h.session.volume(), 0.3);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let mut h = harness();
        assert!(!h.session.pause());

        h.session.enqueue(track("A")).unwrap();
        h.next_bind().await;
        assert!(h.session.pause());
        assert!(!h.session.pause());
        eventually(|| h.sink.is_paused()).await;

        assert!(h.session.resume());
        eventually(|| !h.sink.is_paused()).await;
        assert!(h.session.is_playing());
    }

    #[tokio::test]
    async fn test_stop_clears_queue_but_stays_connected() {
        let mut h = harness();
        for title in ["A", "B", "C"] {
            h.session.enqueue(track(title)).unwrap();
        }
        h.next_bind().await;

        h.session.stop();

        eventually(|| h.session.play_state() == PlayState::Idle).await;
        assert!(h.session.queue().is_empty());
        assert!(!h.session.is_disconnected());
        h.session.enqueue(track("D")).unwrap();
        assert_eq!(h.next_bind().await, "stream:D");
    }

    #[tokio::test]
    async fn test_suspend_is_idempotent() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();
        h.next_bind().await;

        h.session.suspend().await;
        assert_eq!(h.session.play_state(), PlayState::Disconnected);
        assert!(h.session.current().is_none());
        assert!(h.session.queue().is_empty());
        assert!(!h.session.is_playing());
        assert_eq!(h.sink.releases(), 1);
        assert_eq!(h.sink.stops(), 1);

        h.session.suspend().await;
        assert_eq!(h.session.play_state(), PlayState::Disconnected);
        assert_eq!(h.sink.releases(), 1);

        assert_eq!(
            h.session.enqueue(track("C")).unwrap_err(),
            SessionError::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_disconnects() {
        let reopens = Arc::new(AtomicUsize::new(0));
        let h = harness_with(counting_resolver(reopens), Duration::from_secs(30));
        let started = tokio::time::Instant::now();

        h.sink.released.cancelled().await;

        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(h.session.is_disconnected());
        assert_eq!(h.session.play_state(), PlayState::Disconnected);
        assert_eq!(
            h.notifier.events(),
            vec![SessionEvent::IdleDisconnect {
                after: Duration::from_secs(30)
            }]
        );
        assert_eq!(
            h.session.enqueue(track("A")).unwrap_err(),
            SessionError::Disconnected
        );
        assert_eq!(
            h.session.replace_pending(track("A")).unwrap_err(),
            SessionError::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_disconnect_is_announced_once() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|guild_id, event| {
                *guild_id == GuildId::new(1)
                    && *event
                        == SessionEvent::IdleDisconnect {
                            after: Duration::from_secs(30),
                        }
            })
            .times(1)
            .return_const(());

        let (sink, _binds) = FakeSink::new();
        let session = Session::start(
            GuildId::new(1),
            sink.clone(),
            Arc::new(MockMediaResolver::new()),
            Arc::new(notifier),
            SessionConfig {
                idle_timeout: Duration::from_secs(30),
                ..SessionConfig::default()
            },
        );

        sink.released.cancelled().await;
        session.suspend().await;
        assert_eq!(sink.releases(), 1);
        // Al soltar la sesión el mock verifica `times(1)`
        drop(session);
    }

    #[tokio::test]
    async fn test_completion_after_suspend_is_ignored() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.session.enqueue(track("B")).unwrap();
        assert_eq!(h.next_bind().await, "stream:A");

        h.session.suspend().await;
        h.sink.fire_stale(PlaybackEnd::Error("late".into()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(h.binds.try_recv().is_err());
        assert_eq!(h.session.play_state(), PlayState::Disconnected);
        assert!(h.session.current().is_none());
        assert_eq!(h.sink.releases(), 1);
        assert!(!h
            .notifier
            .events()
            .iter()
            .any(|event| matches!(event, SessionEvent::PlaybackError { .. })));
    }

    #[tokio::test]
    async fn test_skip_during_reopen_advances() {
        let resolver = Arc::new(GatedResolver::default());
        let (sink, mut binds) = FakeSink::new();
        let session = Session::start(
            GuildId::new(1),
            sink.clone(),
            resolver.clone(),
            Arc::new(RecordingNotifier::default()),
            SessionConfig::default(),
        );
        session.enqueue(track("A")).unwrap();
        session.enqueue(track("B")).unwrap();
        session.set_loop(true);

        assert_eq!(recv_bind(&mut binds).await, "stream:A");
        sink.finish(PlaybackEnd::Finished);
        resolver.entered.notified().await;
        assert_eq!(session.play_state(), PlayState::Looping);
        assert!(!session.is_playing());

        // Sin stream ligado no hay nada que detener en el sink
        assert!(session.skip());
        assert!(!session.loop_enabled());
        resolver.gate.notify_one();

        assert_eq!(recv_bind(&mut binds).await, "stream:B");
        assert_eq!(sink.stops(), 0);
        assert_eq!(session.current().unwrap().title, "B");
        assert_eq!(session.play_state(), PlayState::Playing);
    }

    #[tokio::test]
    async fn test_concurrent_suspend_waits_for_teardown() {
        let mut h = harness();
        h.session.enqueue(track("A")).unwrap();
        h.next_bind().await;

        let first = h.session.clone();
        let second = h.session.clone();
        let (a, b) = tokio::join!(
            async {
                first.suspend().await;
                h.sink.releases()
            },
            async {
                second.suspend().await;
                h.sink.releases()
            },
        );

        assert_eq!((a, b), (1, 1));
        assert_eq!(h.session.play_state(), PlayState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_just_before_timeout_keeps_session() {
        let reopens = Arc::new(AtomicUsize::new(0));
        let mut h = harness_with(counting_resolver(reopens), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_millis(29_999)).await;
        h.session.enqueue(track("A")).unwrap();

        assert_eq!(h.next_bind().await, "stream:A");
        assert!(!h.session.is_disconnected());
        assert_eq!(h.session.play_state(), PlayState::Playing);
    }
}
