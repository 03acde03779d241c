//! Progress Reporting
//!
//! Fire-and-forget progress channel for the generation pipeline. Updates are
//! pushed at fixed checkpoints (crawl start, each analytical stage, each
//! chapter boundary) carrying a monotonically increasing percentage and a
//! human-readable status. Callers subscribe via a broadcast receiver; a
//! missing subscriber never blocks or fails the pipeline.

use tokio::sync::broadcast;

/// One progress checkpoint.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Stage identifier, e.g. "write_chapters"
    pub stage: String,
    /// Human-readable status
    pub message: String,
    /// Overall progress, 0-100
    pub progress: u8,
    /// 1-based chapter currently being written (chapter stage only)
    pub current_chapter: Option<usize>,
    /// Total chapters (chapter stage only)
    pub total_chapters: Option<usize>,
    /// Name of the chapter currently being written (chapter stage only)
    pub chapter_name: Option<String>,
}

/// Broadcast-based progress reporter.
///
/// This is best-effort telemetry, not a synchronization point.
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Emit a stage-level checkpoint.
    pub fn stage(&self, stage: &str, message: impl Into<String>, progress: u8) {
        self.emit(ProgressUpdate {
            stage: stage.to_string(),
            message: message.into(),
            progress: progress.min(100),
            current_chapter: None,
            total_chapters: None,
            chapter_name: None,
        });
    }

    /// Emit a chapter-boundary checkpoint.
    pub fn chapter(
        &self,
        message: impl Into<String>,
        progress: u8,
        current: usize,
        total: usize,
        name: &str,
    ) {
        self.emit(ProgressUpdate {
            stage: "write_chapters".to_string(),
            message: message.into(),
            progress: progress.min(100),
            current_chapter: Some(current),
            total_chapters: Some(total),
            chapter_name: Some(name.to_string()),
        });
    }

    /// Send an update, silently discarding it when no receivers are
    /// listening (expected when no UI is attached).
    fn emit(&self, update: ProgressUpdate) {
        let _ = self.sender.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_updates() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.stage("fetch_repo", "Crawling repository", 5);
        let update = rx.recv().await.unwrap();
        assert_eq!(update.stage, "fetch_repo");
        assert_eq!(update.progress, 5);
        assert!(update.current_chapter.is_none());
    }

    #[tokio::test]
    async fn test_chapter_update_carries_position() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.chapter("Writing chapter", 60, 2, 5, "Repository Crawler");
        let update = rx.recv().await.unwrap();
        assert_eq!(update.current_chapter, Some(2));
        assert_eq!(update.total_chapters, Some(5));
        assert_eq!(update.chapter_name.as_deref(), Some("Repository Crawler"));
    }

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let reporter = ProgressReporter::new();
        reporter.stage("fetch_repo", "no one listening", 10);
    }

    #[test]
    fn test_progress_clamped_to_100() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();
        reporter.stage("combine", "done", 250);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.progress, 100);
    }
}
