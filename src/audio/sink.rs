use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{audio::track::StreamHandle, error::SinkError};

/// Why a bound stream stopped producing audio.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEnd {
    /// Reached the end of the stream.
    Finished,
    /// Halted by [`PlaybackSink::stop`].
    Stopped,
    /// Backend failure while playing.
    Error(String),
}

/// Completion report delivered to the session loop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompletionEvent {
    pub generation: u64,
    pub end: PlaybackEnd,
}

/// One-shot completion token handed to the sink with each bind.
///
/// Consuming it reports how playback ended. The generation lets the session
/// discard reports that arrive after it has already moved on.
#[derive(Debug)]
pub struct Completion {
    generation: u64,
    tx: mpsc::UnboundedSender<CompletionEvent>,
}

impl Completion {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<CompletionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn duplicate(&self) -> Self {
        Self::new(self.generation, self.tx.clone())
    }

    pub fn complete(self, end: PlaybackEnd) {
        // Si la sesión ya terminó nadie escucha; no es un error
        let _ = self.tx.send(CompletionEvent {
            generation: self.generation,
            end,
        });
    }
}

/// An open audio output (one voice connection).
///
/// Only the session loop calls into a sink, and at most one bind is
/// outstanding at a time.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Starts playing `stream` at `gain`. `completion` must be consumed exactly
    /// once when playback ends for any reason.
    async fn bind(
        &self,
        stream: StreamHandle,
        gain: f32,
        completion: Completion,
    ) -> Result<(), SinkError>;

    /// Halts the bound stream; its completion reports [`PlaybackEnd::Stopped`].
    async fn stop(&self) -> Result<(), SinkError>;

    async fn set_gain(&self, gain: f32) -> Result<(), SinkError>;

    async fn pause(&self) -> Result<(), SinkError>;

    async fn resume(&self) -> Result<(), SinkError>;

    /// Disconnects from the output device.
    async fn release(&self);
}
