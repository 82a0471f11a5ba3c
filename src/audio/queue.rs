use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    audio::track::{Track, TrackInfo},
    error::{Canceled, QueueError},
};

/// Pending tracks of one session, FIFO.
///
/// Producers never block. A single consumer (the session loop) may park in
/// [`dequeue_wait`](Self::dequeue_wait) until something arrives.
#[derive(Debug)]
pub struct TrackQueue {
    items: Mutex<VecDeque<Track>>,
    available: Notify,
    max_size: Option<usize>,
    /// Solo se escribe con `items` bloqueado.
    closed: AtomicBool,
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            max_size: None,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ..Self::new()
        }
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&self, track: Track) -> Result<(), QueueError> {
        {
            let mut items = self.items.lock();
            self.check_open()?;
            self.check_capacity(items.len())?;
            info!("➕ Agregado a la cola: {}", track.info().title);
            items.push_back(track);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Inserts `track` ahead of every pending item in one step.
    ///
    /// Items enqueued concurrently land either in front of the lock (and thus
    /// behind `track`) or at the tail afterwards; they never split the
    /// previously pending block.
    pub fn jump_front(&self, track: Track) -> Result<(), QueueError> {
        {
            let mut items = self.items.lock();
            self.check_open()?;
            self.check_capacity(items.len())?;
            info!("⏫ Adelantado al frente de la cola: {}", track.info().title);
            items.push_front(track);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Waits for the front item. Returns [`Canceled`] once `cancel` fires.
    pub async fn dequeue_wait(&self, cancel: &CancellationToken) -> Result<Track, Canceled> {
        loop {
            if cancel.is_cancelled() {
                return Err(Canceled);
            }

            // Registrarse antes de mirar la cola para no perder un notify
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.items.lock().pop_front();
            if let Some(track) = next {
                debug!("➡️ Siguiente en cola (FIFO): {}", track.info().title);
                return Ok(track);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Canceled),
                _ = &mut notified => {}
            }
        }
    }

    /// Toma el primer track sin esperar
    pub fn dequeue_now(&self) -> Option<Track> {
        self.items.lock().pop_front()
    }

    /// Limpia la cola y devuelve cuántos tracks se descartaron
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let cleared = items.len();
        items.clear();
        info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        cleared
    }

    /// Empties the queue and rejects every later
    /// [`enqueue`](Self::enqueue)/[`jump_front`](Self::jump_front) with
    /// [`QueueError::Closed`]. A producer either lands before the close (and is
    /// dropped with the rest) or fails; none is accepted and then lost.
    pub fn close(&self) -> usize {
        let mut items = self.items.lock();
        self.closed.store(true, Ordering::Release);
        let dropped = items.len();
        items.clear();
        debug!("🔒 Cola cerrada, {} tracks descartados", dropped);
        dropped
    }

    /// Like [`close`](Self::close), but only when nothing is pending.
    /// Returns `false` (and stays open) if a track slipped in.
    pub fn close_if_empty(&self) -> bool {
        let items = self.items.lock();
        if !items.is_empty() {
            return false;
        }
        self.closed.store(true, Ordering::Release);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mezcla la cola
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada ({} tracks)", items.len());
    }

    /// Elimina el track en `index` (base 0)
    pub fn remove_at(&self, index: usize) -> Result<TrackInfo, QueueError> {
        let mut items = self.items.lock();
        let len = items.len();
        let track = items
            .remove(index)
            .ok_or(QueueError::OutOfRange { index, len })?;
        debug!("❌ Track eliminado en posición {}", index);
        let (info, _stream) = track.into_parts();
        Ok(info)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TrackInfo> {
        self.items.lock().get(index).map(|track| track.info().clone())
    }

    /// Read-only copy of `limit` items starting at `offset`.
    pub fn snapshot(&self, offset: usize, limit: usize) -> Vec<TrackInfo> {
        self.items
            .lock()
            .iter()
            .skip(offset)
            .take(limit)
            .map(|track| track.info().clone())
            .collect()
    }

    /// Obtiene una página específica de la cola (páginas desde 1)
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let items = self.items.lock();
        let total_items = items.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(items_per_page)
        };
        let current_page = page.clamp(1, total_pages);
        let offset = (current_page - 1) * items_per_page;

        QueuePage {
            items: items
                .iter()
                .skip(offset)
                .take(items_per_page)
                .map(|track| track.info().clone())
                .collect(),
            offset,
            current_page,
            total_pages,
            total_items,
            total_duration: items.iter().filter_map(|track| track.info().duration).sum(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.items
            .lock()
            .iter()
            .filter_map(|track| track.info().duration)
            .sum()
    }

    fn check_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_capacity(&self, len: usize) -> Result<(), QueueError> {
        match self.max_size {
            Some(max) if len >= max => Err(QueueError::Full(max)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<TrackInfo>,
    /// Index of `items[0]` in the queue.
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub total_duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::track;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue
            .snapshot(0, usize::MAX)
            .into_iter()
            .map(|info| info.title)
            .collect()
    }

    #[tokio::test]
    async fn test_dequeue_is_fifo() {
        let queue = TrackQueue::new();
        let cancel = CancellationToken::new();
        for title in ["A", "B", "C"] {
            queue.enqueue(track(title)).unwrap();
        }

        let mut order = Vec::new();
        for expected_len in [2, 1, 0] {
            let next = queue.dequeue_wait(&cancel).await.unwrap();
            order.push(next.info().title.clone());
            assert_eq!(queue.len(), expected_len);
        }
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_dequeue_wait_wakes_on_enqueue() {
        let queue = Arc::new(TrackQueue::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue_wait(&cancel).await })
        };
        tokio::task::yield_now().await;
        queue.enqueue(track("late")).unwrap();

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.info().title, "late");
    }

    #[tokio::test]
    async fn test_dequeue_wait_canceled() {
        let queue = Arc::new(TrackQueue::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue_wait(&cancel).await })
        };
        tokio::task::yield_now().await;
        cancel.cancel();

        assert_eq!(waiter.await.unwrap().unwrap_err(), Canceled);
    }

    #[test]
    fn test_dequeue_now_on_empty() {
        let queue = TrackQueue::new();
        assert!(queue.dequeue_now().is_none());
        queue.enqueue(track("A")).unwrap();
        assert_eq!(queue.dequeue_now().unwrap().info().title, "A");
    }

    #[test]
    fn test_remove_at_out_of_range_leaves_queue() {
        let queue = TrackQueue::new();
        queue.enqueue(track("A")).unwrap();
        queue.enqueue(track("B")).unwrap();

        assert_eq!(
            queue.remove_at(2).unwrap_err(),
            QueueError::OutOfRange { index: 2, len: 2 }
        );
        assert_eq!(titles(&queue), vec!["A", "B"]);

        assert_eq!(queue.remove_at(0).unwrap().title, "A");
        assert_eq!(titles(&queue), vec!["B"]);
    }

    #[test]
    fn test_shuffle_keeps_same_tracks() {
        let queue = TrackQueue::new();
        let expected: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        for title in &expected {
            queue.enqueue(track(title)).unwrap();
        }

        queue.shuffle();

        let mut shuffled = titles(&queue);
        shuffled.sort();
        let mut expected = expected;
        expected.sort();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn test_jump_front_keeps_pending_order() {
        let queue = TrackQueue::new();
        queue.enqueue(track("C")).unwrap();
        queue.enqueue(track("D")).unwrap();
        queue.jump_front(track("X")).unwrap();
        assert_eq!(titles(&queue), vec!["X", "C", "D"]);
    }

    #[test]
    fn test_capacity_limit() {
        let queue = TrackQueue::with_max_size(1);
        queue.enqueue(track("A")).unwrap();
        assert_eq!(queue.enqueue(track("B")).unwrap_err(), QueueError::Full(1));
        assert_eq!(queue.jump_front(track("B")).unwrap_err(), QueueError::Full(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_close_rejects_new_tracks() {
        let queue = TrackQueue::new();
        queue.enqueue(track("A")).unwrap();
        queue.enqueue(track("B")).unwrap();

        assert_eq!(queue.close(), 2);
        assert!(queue.is_closed());
        assert!(queue.is_empty());
        assert_eq!(queue.enqueue(track("C")).unwrap_err(), QueueError::Closed);
        assert_eq!(queue.jump_front(track("C")).unwrap_err(), QueueError::Closed);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_close_if_empty_keeps_pending_tracks() {
        let queue = TrackQueue::new();
        queue.enqueue(track("A")).unwrap();
        assert!(!queue.close_if_empty());
        assert!(!queue.is_closed());
        assert_eq!(titles(&queue), vec!["A"]);

        queue.dequeue_now();
        assert!(queue.close_if_empty());
        assert_eq!(queue.enqueue(track("B")).unwrap_err(), QueueError::Closed);
    }

    #[test]
    fn test_pages() {
        let queue = TrackQueue::new();
        for i in 0..23 {
            queue.enqueue(track(&format!("t{i}"))).unwrap();
        }

        let page = queue.page(3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset, 20);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].title, "t20");

        // Páginas fuera de rango se ajustan a la última
        assert_eq!(queue.page(9, 10).current_page, 3);
        assert_eq!(TrackQueue::new().page(1, 10).total_pages, 1);
    }

    #[test]
    fn test_clear_and_snapshot() {
        let queue = TrackQueue::new();
        queue.enqueue(track("A")).unwrap();
        queue.enqueue(track("B")).unwrap();
        assert_eq!(queue.snapshot(1, 5)[0].title, "B");
        assert_eq!(queue.get(0).unwrap().title, "A");
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
