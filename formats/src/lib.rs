pub mod cursor;
pub mod error;
pub mod frame_group;
pub mod metadata;
pub mod spr;
pub mod sprite;
pub mod thing_type;
pub mod version;

pub use cursor::ByteCursor;
pub use error::{FormatError, Result};
pub use frame_group::{
    AnimationMode, DefaultDurations, FrameDuration, FrameGroup, FrameGroupType,
    MAX_SPRITES_PER_GROUP, SPRITE_SIZE,
};
pub use metadata::{MetadataDialect, MetadataHeader, MetadataReader, MetadataWriter};
pub use spr::{SprHeader, SpriteReader, write_sprite_file};
pub use sprite::{BLANK_SPRITE_ID, SPRITE_DATA_SIZE, Sprite};
pub use thing_type::{ALERT_SPRITE_ID, ThingCategory, ThingType};
pub use version::{ClientFeatures, Version, VersionRegistry};
