use formats::{FormatError, ThingCategory};

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("storage is not loaded")]
    NotLoaded,

    #[error("invalid {category} id {id}")]
    InvalidThingId { category: ThingCategory, id: u32 },

    #[error("invalid sprite id {id}")]
    InvalidSpriteId { id: u32 },

    #[error("expected a {expected}, got a {found}")]
    WrongCategory {
        expected: ThingCategory,
        found: ThingCategory,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("settings: {0}")]
    Settings(String),
}
