use serenity::model::id::UserId;
use std::{any::Any, fmt, time::Duration};

/// Display metadata for one media item.
///
/// Cheap to clone. The session keeps a copy as "now playing" and the resolver
/// uses it to open a fresh stream when a track is looped.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<Duration>,
    /// Public page of the media (what users click).
    pub page_url: String,
    /// Direct stream reference the handle was opened from.
    pub stream_url: String,
    pub thumbnail: Option<String>,
    pub tags: Vec<String>,
    pub requested_by: Option<UserId>,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>, page_url: impl Into<String>) -> Self {
        let page_url = page_url.into();
        Self {
            title: title.into(),
            uploader: None,
            duration: None,
            stream_url: page_url.clone(),
            page_url,
            thumbnail: None,
            tags: Vec::new(),
            requested_by: None,
        }
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_stream_url(mut self, stream_url: impl Into<String>) -> Self {
        self.stream_url = stream_url.into();
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    /// Duración legible ("3m 25s"), o `None` para streams en vivo.
    pub fn display_duration(&self) -> Option<String> {
        self.duration
            .map(|d| humantime::format_duration(Duration::from_secs(d.as_secs())).to_string())
    }
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uploader {
            Some(uploader) => write!(f, "**{}** by **{}**", self.title, uploader),
            None => write!(f, "**{}**", self.title),
        }
    }
}

/// Single-use playable stream.
///
/// Handles cannot be rewound: once a sink has consumed one, replaying the same
/// media needs a new handle from [`MediaResolver::reopen`](crate::sources::MediaResolver::reopen).
/// The concrete stream type belongs to the sink backend and is recovered with
/// [`StreamHandle::downcast`].
pub struct StreamHandle {
    source: String,
    stream: Box<dyn Any + Send>,
}

impl StreamHandle {
    pub fn new<T: Any + Send>(source: impl Into<String>, stream: T) -> Self {
        Self {
            source: source.into(),
            stream: Box::new(stream),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Recupera el stream concreto; devuelve el handle intacto si el tipo no coincide.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.stream.downcast::<T>() {
            Ok(stream) => Ok(*stream),
            Err(stream) => Err(Self {
                source: self.source,
                stream,
            }),
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Metadata plus its stream. Owned by exactly one container at a time.
#[derive(Debug)]
pub struct Track {
    info: TrackInfo,
    stream: StreamHandle,
}

impl Track {
    pub fn new(info: TrackInfo, stream: StreamHandle) -> Self {
        Self { info, stream }
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn into_parts(self) -> (TrackInfo, StreamHandle) {
        (self.info, self.stream)
    }
}
