//! Error types for the playback core.
//!
//! Each collaborator seam has its own enum so that callers can tell a user
//! mistake (bad index, bad volume) from a backend failure. Binary and command
//! code wrap these in `anyhow` like the rest of the bot.

use thiserror::Error;

/// Failure turning a query (or a known track) into something playable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("No se encontró nada que coincida con `{0}`")]
    NotFound(String),

    #[error("Servicio de origen no disponible: {0}")]
    UpstreamUnavailable(String),

    /// The freshly opened stream produced no data on the probe read.
    #[error("El stream de `{0}` no devolvió datos")]
    EmptyStream(String),
}

/// User-facing queue errors. The queue is never modified when one is returned.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Índice fuera de rango: {index} (la cola tiene {len} canciones)")]
    OutOfRange { index: usize, len: usize },

    #[error("La cola está llena (máximo {0} canciones)")]
    Full(usize),

    #[error("La cola está cerrada")]
    Closed,
}

/// Returned by [`TrackQueue::dequeue_wait`](crate::audio::queue::TrackQueue::dequeue_wait)
/// when the session is shutting down. Never shown to users.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("espera cancelada")]
pub struct Canceled;

/// Audio backend failures. Contained by the session loop.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SinkError {
    #[error("Stream no soportado por el backend: {0}")]
    Unsupported(&'static str),

    #[error("Error del backend de audio: {0}")]
    Backend(String),

    #[error("No se pudo abrir la salida de audio: {0}")]
    Unavailable(String),
}

/// Rejected settings. No state is mutated.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum ConfigError {
    #[error("El volumen debe estar entre 0 y 1, recibido: {0}")]
    VolumeOutOfRange(f32),
}

/// Errors from [`Session`](crate::audio::session::Session) and
/// [`SessionRegistry`](crate::audio::registry::SessionRegistry) operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No se pudo crear la sesión de voz: {0}")]
    SinkUnavailable(#[source] SinkError),

    #[error("La sesión ya está desconectada")]
    Disconnected,
}
