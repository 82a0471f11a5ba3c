//! Test doubles for the session core.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    audio::{
        events::{Notifier, SessionEvent},
        sink::{Completion, PlaybackEnd, PlaybackSink},
        track::{StreamHandle, Track, TrackInfo},
    },
    error::SinkError,
};

pub(crate) fn info(title: &str) -> TrackInfo {
    TrackInfo::new(title, format!("https://example.com/{title}"))
        .with_stream_url(format!("https://cdn.example.com/{title}"))
}

pub(crate) fn track(title: &str) -> Track {
    Track::new(info(title), StreamHandle::new(format!("stream:{title}"), ()))
}

pub(crate) fn reopened(info: &TrackInfo) -> StreamHandle {
    StreamHandle::new(format!("reopen:{}", info.title), ())
}

#[derive(Default)]
struct FakeState {
    active: Option<Completion>,
    stale: Vec<Completion>,
    gains: Vec<f32>,
    stops: usize,
    releases: usize,
    paused: bool,
    fail_next_bind: bool,
}

/// Sink that records calls and lets the test decide when playback ends.
pub(crate) struct FakeSink {
    binds: mpsc::UnboundedSender<String>,
    state: Mutex<FakeState>,
    pub released: CancellationToken,
}

impl FakeSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            binds: tx,
            state: Mutex::new(FakeState::default()),
            released: CancellationToken::new(),
        });
        (sink, rx)
    }

    /// Ends the active stream the way the backend would.
    pub fn finish(&self, end: PlaybackEnd) {
        let completion = self.state.lock().active.take();
        completion.expect("nothing bound").complete(end);
    }

    /// Fires the leftover completion of the oldest bind.
    pub fn fire_stale(&self, end: PlaybackEnd) {
        let completion = {
            let mut state = self.state.lock();
            assert!(!state.stale.is_empty(), "no stale completion");
            state.stale.remove(0)
        };
        completion.complete(end);
    }

    pub fn fail_next_bind(&self) {
        self.state.lock().fail_next_bind = true;
    }

    pub fn gains(&self) -> Vec<f32> {
        self.state.lock().gains.clone()
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

#[async_trait]
impl PlaybackSink for FakeSink {
    async fn bind(
        &self,
        stream: StreamHandle,
        gain: f32,
        completion: Completion,
    ) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_bind) {
            return Err(SinkError::Backend("bind rechazado".into()));
        }
        assert!(state.active.is_none(), "two binds outstanding");
        state.gains.push(gain);
        state.stale.push(completion.duplicate());
        state.active = Some(completion);
        let _ = self.binds.send(stream.source().to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), SinkError> {
        let completion = {
            let mut state = self.state.lock();
            state.stops += 1;
            state.active.take()
        };
        if let Some(completion) = completion {
            completion.complete(PlaybackEnd::Stopped);
        }
        Ok(())
    }

    async fn set_gain(&self, gain: f32) -> Result<(), SinkError> {
        self.state.lock().gains.push(gain);
        Ok(())
    }

    async fn pause(&self) -> Result<(), SinkError> {
        self.state.lock().paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), SinkError> {
        self.state.lock().paused = false;
        Ok(())
    }

    async fn release(&self) {
        self.state.lock().releases += 1;
        self.released.cancel();
    }
}

/// Notifier that keeps every event for later assertions.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _guild_id: GuildId, event: SessionEvent) {
        self.events.lock().push(event);
    }
}

pub(crate) async fn recv_bind(binds: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(5), binds.recv())
        .await
        .expect("timed out waiting for bind")
        .expect("sink dropped")
}

/// Polls `check` until it holds or a few seconds have passed.
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
