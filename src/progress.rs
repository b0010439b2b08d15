use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which pass a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressSource {
    Default,
    Metadata,
    Sprites,
    Find,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub source: ProgressSource,
    pub current: u32,
    pub total: u32,
    pub label: Option<String>,
}

impl Progress {
    pub fn new(source: ProgressSource, current: u32, total: u32) -> Self {
        Self {
            source,
            current,
            total,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Receives coarse milestones from long running operations. Reports are not
/// per object; callers must not rely on any particular granularity.
pub trait ProgressListener {
    fn report(&self, progress: Progress);
}

impl<F: Fn(Progress)> ProgressListener for F {
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

impl ProgressListener for crossbeam_channel::Sender<Progress> {
    fn report(&self, progress: Progress) {
        let _ = self.send(progress);
    }
}

/// Listener that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn report(&self, _progress: Progress) {}
}

/// One-way cancellation latch shared between a caller and a running
/// operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn closures_and_channels_listen() {
        let seen = RefCell::new(Vec::new());
        let listener = |p: Progress| seen.borrow_mut().push(p.current);
        listener.report(Progress::new(ProgressSource::Metadata, 1, 4));
        listener.report(Progress::new(ProgressSource::Metadata, 2, 4));
        assert_eq!(*seen.borrow(), vec![1, 2]);

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.report(Progress::new(ProgressSource::Sprites, 3, 3).with_label("done"));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.label.as_deref(), Some("done"));
    }

    #[test]
    fn cancel_latch_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
