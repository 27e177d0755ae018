//! Copy-to-clipboard with a self-reverting acknowledgment.
//!
//! The acknowledgment lives on a [`CopyIndicator`] handle owned by the control
//! that triggered the copy. Failures stay local and never become flash messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::errors::ClipboardError;

/// Something that can place text on a clipboard.
pub trait ClipboardBackend: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The desktop clipboard via `arboard`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardBackend for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError(e.to_string()))
    }
}

/// Visual state of the copy control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyAck {
    Idle,
    Copied,
}

/// Handle to one copy control's acknowledgment state.
#[derive(Clone)]
pub struct CopyIndicator {
    state: Arc<watch::Sender<CopyAck>>,
}

impl Default for CopyIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyIndicator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CopyAck::Idle);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn state(&self) -> CopyAck {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CopyAck> {
        self.state.subscribe()
    }

    fn set(&self, ack: CopyAck) {
        self.state.send_if_modified(|current| {
            let changed = *current != ack;
            *current = ack;
            changed
        });
    }

    /// Go back to `Idle` unless a newer copy has started since `expected`.
    /// The check runs under the channel's write lock, so it cannot interleave
    /// with a concurrent `set(Copied)`.
    fn revert(&self, generation: &AtomicU64, expected: u64) {
        self.state.send_if_modified(|current| {
            if generation.load(Ordering::SeqCst) != expected || *current == CopyAck::Idle {
                return false;
            }
            *current = CopyAck::Idle;
            true
        });
    }
}

/// Copies text and flips its indicator to `Copied` for a fixed duration.
pub struct ClipboardFeedback {
    backend: Arc<dyn ClipboardBackend>,
    indicator: CopyIndicator,
    revert_after: Duration,
    generation: Arc<AtomicU64>,
    revert: Mutex<Option<AbortHandle>>,
}

impl ClipboardFeedback {
    pub fn new(
        backend: Arc<dyn ClipboardBackend>,
        indicator: CopyIndicator,
        revert_after: Duration,
    ) -> Self {
        Self {
            backend,
            indicator,
            revert_after,
            generation: Arc::new(AtomicU64::new(0)),
            revert: Mutex::new(None),
        }
    }

    pub fn indicator(&self) -> &CopyIndicator {
        &self.indicator
    }

    /// Copy `text`. On success the indicator shows `Copied` until `revert_after`
    /// has elapsed since the most recent successful copy.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        if let Err(e) = self.backend.write_text(text) {
            tracing::warn!("Copy failed: {}", e);
            return Err(e);
        }

        let mut pending = self.revert.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        // A revert already past its abort point sees the new generation and
        // leaves the indicator alone.
        let current = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.indicator.set(CopyAck::Copied);

        let indicator = self.indicator.clone();
        let generation = self.generation.clone();
        let delay = self.revert_after;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            indicator.revert(&generation, current);
        });
        *pending = Some(task.abort_handle());

        Ok(())
    }
}

impl Drop for ClipboardFeedback {
    fn drop(&mut self) {
        if let Some(pending) = self
            .revert
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pending.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.indicator.set(CopyAck::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingClipboard {
        copied: Mutex<Vec<String>>,
    }

    impl ClipboardBackend for RecordingClipboard {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct DeniedClipboard;

    impl ClipboardBackend for DeniedClipboard {
        fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError("permission denied".to_string()))
        }
    }

    fn feedback(backend: Arc<dyn ClipboardBackend>) -> ClipboardFeedback {
        ClipboardFeedback::new(backend, CopyIndicator::new(), Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_reverts_after_two_seconds() {
        let backend = Arc::new(RecordingClipboard::default());
        let feedback = feedback(backend.clone());

        feedback.copy("https://bot.example.com/webhook/u42/s").unwrap();
        assert_eq!(feedback.indicator().state(), CopyAck::Copied);
        assert_eq!(backend.copied.lock().unwrap().len(), 1);

        sleep(Duration::from_millis(1_999)).await;
        assert_eq!(feedback.indicator().state(), CopyAck::Copied);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(feedback.indicator().state(), CopyAck::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_copy_resets_window() {
        let feedback = feedback(Arc::new(RecordingClipboard::default()));
        let mut rx = feedback.indicator().subscribe();

        feedback.copy("a").unwrap();
        sleep(Duration::from_secs(1)).await;
        feedback.copy("b").unwrap();

        // The first trigger's revert would have fired here.
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(feedback.indicator().state(), CopyAck::Copied);

        sleep(Duration::from_millis(501)).await;
        assert_eq!(feedback.indicator().state(), CopyAck::Idle);

        // Exactly one transition back to idle has been published since the copies.
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), CopyAck::Idle);
        sleep(Duration::from_secs(5)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_revert_keeps_copied() {
        let feedback = feedback(Arc::new(RecordingClipboard::default()));

        feedback.copy("a").unwrap();
        let first = feedback.generation.load(Ordering::SeqCst);
        feedback.copy("b").unwrap();

        // The first copy's revert running late, after the second copy began.
        feedback.indicator().revert(&feedback.generation, first);
        assert_eq!(feedback.indicator().state(), CopyAck::Copied);

        sleep(Duration::from_millis(2_001)).await;
        assert_eq!(feedback.indicator().state(), CopyAck::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_clipboard_leaves_indicator_idle() {
        let feedback = feedback(Arc::new(DeniedClipboard));
        assert!(feedback.copy("secret").is_err());
        assert_eq!(feedback.indicator().state(), CopyAck::Idle);
    }
}
