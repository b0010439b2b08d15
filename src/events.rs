use crossbeam_channel::{Receiver, Sender, unbounded};
use formats::ThingCategory;
use std::path::PathBuf;

/// Lifecycle and mutation notifications published by the stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    Loaded,
    /// `category` is `None` for sprite changes.
    Changed {
        category: Option<ThingCategory>,
        ids: Vec<u32>,
    },
    Compiled(PathBuf),
    Unloaded,
}

/// Outcome of a store mutation: the entities it touched (the previous
/// versions for replace and remove), whether anything happened, and an
/// optional note for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeResult<T> {
    pub list: Vec<T>,
    pub done: bool,
    pub message: Option<String>,
}

impl<T> ChangeResult<T> {
    pub fn done(list: Vec<T>) -> Self {
        Self {
            list,
            done: true,
            message: None,
        }
    }

    pub fn nothing(message: impl Into<String>) -> Self {
        Self {
            list: Vec::new(),
            done: false,
            message: Some(message.into()),
        }
    }
}

/// Fan-out of [`StorageEvent`]s to any number of receivers. Receivers that
/// were dropped are forgotten on the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<StorageEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<StorageEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: StorageEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
