pub mod atomic_file;
pub mod client_merger;
pub mod error;
pub mod events;
pub mod find;
pub mod progress;
pub mod resource_queue;
pub mod settings;
pub mod settings_types;
pub mod sprite_optimizer;
pub mod sprite_store;
pub mod thing_store;

pub use client_merger::{ClientMerger, MergeReport, MergeSource};
pub use error::{Result, StorageError};
pub use events::{ChangeResult, StorageEvent};
pub use progress::{CancelToken, NoProgress, Progress, ProgressListener, ProgressSource};
pub use sprite_optimizer::{OptimizeReport, SpriteOptimizer};
pub use sprite_store::SpriteStorage;
pub use thing_store::ThingTypeStorage;

pub fn storage_dir() -> std::path::PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    path.push("thingforge");
    let _ = std::fs::create_dir_all(&path);
    path
}
