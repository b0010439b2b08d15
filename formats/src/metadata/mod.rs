//! Metadata (DAT) codec.
//!
//! Six flag dialects exist, one per range of client versions. Each dialect
//! owns its complete flag table; the numeric value of a flag in one dialect
//! says nothing about its meaning in another. The texture-pattern section
//! that follows the flags is shared by all of them.

mod texture_patterns;
mod v1;
mod v2;
mod v3;
mod v4;
mod v5;
mod v6;

pub use texture_patterns::{read_texture_patterns, write_texture_patterns};

use crate::cursor::ByteCursor;
use crate::error::{FormatError, Result};
use crate::frame_group::DefaultDurations;
use crate::thing_type::{ThingCategory, ThingType};
use crate::version::ClientFeatures;

/// Terminates the flag list of every record in every dialect.
pub const LAST_FLAG: u8 = 0xFF;

/// Byte size of the metadata file header.
pub const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataDialect {
    /// 7.10 - 7.30
    V1,
    /// 7.40 - 7.50
    V2,
    /// 7.55 - 7.72
    V3,
    /// 7.80 - 8.54
    V4,
    /// 8.60 - 9.86
    V5,
    /// 10.10 and newer
    V6,
}

impl MetadataDialect {
    pub fn for_version(value: u32) -> Self {
        match value {
            0..=730 => Self::V1,
            731..=750 => Self::V2,
            751..=772 => Self::V3,
            773..=854 => Self::V4,
            855..=986 => Self::V5,
            _ => Self::V6,
        }
    }

    /// The two oldest dialects do not store pattern z; it is always 1.
    pub fn stores_pattern_z(self) -> bool {
        !matches!(self, Self::V1 | Self::V2)
    }

    pub fn read_properties(self, cursor: &mut ByteCursor, thing: &mut ThingType) -> Result<()> {
        match self {
            Self::V1 => v1::read_properties(cursor, thing),
            Self::V2 => v2::read_properties(cursor, thing),
            Self::V3 => v3::read_properties(cursor, thing),
            Self::V4 => v4::read_properties(cursor, thing),
            Self::V5 => v5::read_properties(cursor, thing),
            Self::V6 => v6::read_properties(cursor, thing),
        }
    }

    pub fn write_properties(self, cursor: &mut ByteCursor, thing: &ThingType) -> Result<()> {
        match self {
            Self::V1 => v1::write_properties(cursor, thing),
            Self::V2 => v2::write_properties(cursor, thing),
            Self::V3 => v3::write_properties(cursor, thing),
            Self::V4 => v4::write_properties(cursor, thing),
            Self::V5 => v5::write_properties(cursor, thing),
            Self::V6 => v6::write_properties(cursor, thing),
        }
    }
}

/// Signature and the last id of each category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataHeader {
    pub signature: u32,
    pub item_count: u32,
    pub outfit_count: u32,
    pub effect_count: u32,
    pub missile_count: u32,
}

impl MetadataHeader {
    pub fn read(cursor: &mut ByteCursor) -> Result<Self> {
        Ok(Self {
            signature: cursor.read_u32()?,
            item_count: cursor.read_u16()? as u32,
            outfit_count: cursor.read_u16()? as u32,
            effect_count: cursor.read_u16()? as u32,
            missile_count: cursor.read_u16()? as u32,
        })
    }

    pub fn write(&self, cursor: &mut ByteCursor) -> Result<()> {
        cursor.write_u32(self.signature);
        for category in ThingCategory::ALL {
            let count = self.count(category);
            if count > u16::MAX as u32 {
                return Err(FormatError::CountOverflow { category, count });
            }
            cursor.write_u16(count as u16);
        }
        Ok(())
    }

    pub fn count(&self, category: ThingCategory) -> u32 {
        match category {
            ThingCategory::Item => self.item_count,
            ThingCategory::Outfit => self.outfit_count,
            ThingCategory::Effect => self.effect_count,
            ThingCategory::Missile => self.missile_count,
        }
    }
}

/// Reads complete records (flags, then texture patterns) of one dialect.
#[derive(Debug, Clone, Copy)]
pub struct MetadataReader {
    dialect: MetadataDialect,
    features: ClientFeatures,
}

impl MetadataReader {
    pub fn new(version: u32, features: ClientFeatures) -> Self {
        Self {
            dialect: MetadataDialect::for_version(version),
            features,
        }
    }

    pub fn dialect(&self) -> MetadataDialect {
        self.dialect
    }

    pub fn read_thing(
        &self,
        cursor: &mut ByteCursor,
        id: u32,
        category: ThingCategory,
    ) -> Result<ThingType> {
        let mut thing = ThingType::empty(id, category);
        self.dialect.read_properties(cursor, &mut thing)?;
        read_texture_patterns(
            cursor,
            &mut thing,
            self.features,
            self.dialect.stores_pattern_z(),
        )?;
        Ok(thing)
    }
}

/// Writes complete records in one dialect. Groups without stored durations
/// get the category default when the target format stores durations.
#[derive(Debug, Clone, Copy)]
pub struct MetadataWriter {
    dialect: MetadataDialect,
    features: ClientFeatures,
    durations: DefaultDurations,
}

impl MetadataWriter {
    pub fn new(version: u32, features: ClientFeatures, durations: DefaultDurations) -> Self {
        Self {
            dialect: MetadataDialect::for_version(version),
            features,
            durations,
        }
    }

    pub fn dialect(&self) -> MetadataDialect {
        self.dialect
    }

    pub fn write_thing(&self, cursor: &mut ByteCursor, thing: &ThingType) -> Result<()> {
        self.dialect.write_properties(cursor, thing)?;
        write_texture_patterns(
            cursor,
            thing,
            self.features,
            self.dialect.stores_pattern_z(),
            &self.durations,
        )
    }
}

pub(crate) fn unknown_flag(flag: u8, previous_flag: u8, thing: &ThingType) -> FormatError {
    FormatError::UnknownFlag {
        flag,
        previous_flag,
        category: thing.category,
        id: thing.id,
    }
}

fn read_market(cursor: &mut ByteCursor, thing: &mut ThingType) -> Result<()> {
    thing.is_market_item = true;
    thing.market_category = cursor.read_u16()?;
    thing.market_trade_as = cursor.read_u16()?;
    thing.market_show_as = cursor.read_u16()?;
    thing.market_name = cursor.read_string()?;
    thing.market_restrict_profession = cursor.read_u16()?;
    thing.market_restrict_level = cursor.read_u16()?;
    Ok(())
}

fn write_market(cursor: &mut ByteCursor, flag: u8, thing: &ThingType) -> Result<()> {
    cursor.write_u8(flag);
    cursor.write_u16(thing.market_category);
    cursor.write_u16(thing.market_trade_as);
    cursor.write_u16(thing.market_show_as);
    cursor.write_string(&thing.market_name)?;
    cursor.write_u16(thing.market_restrict_profession);
    cursor.write_u16(thing.market_restrict_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_group::{FrameDuration, FrameGroup, FrameGroupType};

    fn sample_item(id: u32) -> ThingType {
        let mut thing = ThingType::create(id, ThingCategory::Item);
        thing.is_ground = true;
        thing.ground_speed = 150;
        thing.stackable = true;
        thing.has_light = true;
        thing.light_level = 7;
        thing.light_color = 215;
        thing.has_elevation = true;
        thing.elevation = 16;
        thing.mini_map = true;
        thing.mini_map_color = 0x56;
        thing.frame_groups[0].sprite_index = vec![42];
        thing
    }

    fn roundtrip(version: u32, features: ClientFeatures, thing: &ThingType) -> ThingType {
        let writer = MetadataWriter::new(version, features, DefaultDurations::default());
        let mut cursor = ByteCursor::new();
        writer.write_thing(&mut cursor, thing).unwrap();

        cursor.set_position(0);
        let reader = MetadataReader::new(version, features);
        let decoded = reader
            .read_thing(&mut cursor, thing.id, thing.category)
            .unwrap();
        assert_eq!(cursor.remaining(), 0);
        decoded
    }

    /// An item carrying every property the 7.10 flag table knows.
    pub(super) fn common_properties(id: u32) -> ThingType {
        let mut thing = sample_item(id);
        thing.is_on_bottom = true;
        thing.is_on_top = true;
        thing.is_container = true;
        thing.multi_use = true;
        thing.force_use = true;
        thing.writable = true;
        thing.writable_once = true;
        thing.max_text_length = 512;
        thing.is_fluid_container = true;
        thing.is_fluid = true;
        thing.is_unpassable = true;
        thing.is_unmoveable = true;
        thing.block_missile = true;
        thing.block_pathfind = true;
        thing.pickupable = true;
        thing.is_full_ground = true;
        thing.has_offset = true;
        thing.offset_x = 8;
        thing.offset_y = 8;
        thing.rotatable = true;
        thing.is_lying_object = true;
        thing.animate_always = true;
        thing.is_lens_help = true;
        thing.lens_help = 1112;
        thing
    }

    pub(super) type WriteProperties = fn(&mut ByteCursor, &ThingType) -> Result<()>;
    pub(super) type ReadProperties = fn(&mut ByteCursor, &mut ThingType) -> Result<()>;

    /// Flag bytes of `thing` in one dialect, checked to decode back to it.
    pub(super) fn roundtrip_properties(
        thing: &ThingType,
        write: WriteProperties,
        read: ReadProperties,
    ) -> Vec<u8> {
        let mut cursor = ByteCursor::new();
        write(&mut cursor, thing).unwrap();
        cursor.set_position(0);
        let mut decoded = ThingType::create(thing.id, thing.category);
        decoded.frame_groups = thing.frame_groups.clone();
        read(&mut cursor, &mut decoded).unwrap();
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(&decoded, thing);
        cursor.into_inner()
    }

    /// Flag bytes of an item that only has the given property set.
    pub(super) fn single_flag(set: impl FnOnce(&mut ThingType), write: WriteProperties) -> Vec<u8> {
        let mut thing = ThingType::create(100, ThingCategory::Item);
        set(&mut thing);
        let mut cursor = ByteCursor::new();
        write(&mut cursor, &thing).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_dialect_ranges() {
        assert_eq!(MetadataDialect::for_version(710), MetadataDialect::V1);
        assert_eq!(MetadataDialect::for_version(730), MetadataDialect::V1);
        assert_eq!(MetadataDialect::for_version(740), MetadataDialect::V2);
        assert_eq!(MetadataDialect::for_version(760), MetadataDialect::V3);
        assert_eq!(MetadataDialect::for_version(772), MetadataDialect::V3);
        assert_eq!(MetadataDialect::for_version(854), MetadataDialect::V4);
        assert_eq!(MetadataDialect::for_version(860), MetadataDialect::V5);
        assert_eq!(MetadataDialect::for_version(986), MetadataDialect::V5);
        assert_eq!(MetadataDialect::for_version(1010), MetadataDialect::V6);
    }

    #[test]
    fn test_common_properties_roundtrip_in_every_dialect() {
        for version in [710, 740, 760, 800, 860, 1098] {
            let thing = sample_item(100);
            let decoded = roundtrip(version, ClientFeatures::for_version(version), &thing);
            assert_eq!(decoded, thing, "version {}", version);
        }
    }

    #[test]
    fn test_offset_without_payload_in_oldest_dialects() {
        for version in [710, 740] {
            let mut thing = sample_item(100);
            thing.has_offset = true;
            thing.offset_x = 8;
            thing.offset_y = 8;

            let writer =
                MetadataWriter::new(version, ClientFeatures::default(), Default::default());
            let mut plain = ByteCursor::new();
            writer.write_thing(&mut plain, &sample_item(100)).unwrap();
            let mut cursor = ByteCursor::new();
            writer.write_thing(&mut cursor, &thing).unwrap();
            // Only the flag byte is added.
            assert_eq!(cursor.len(), plain.len() + 1);

            cursor.set_position(0);
            let decoded = MetadataReader::new(version, ClientFeatures::default())
                .read_thing(&mut cursor, 100, ThingCategory::Item)
                .unwrap();
            assert_eq!(decoded, thing);
        }
    }

    #[test]
    fn test_market_and_newer_flags_roundtrip() {
        let mut thing = sample_item(3031);
        thing.is_market_item = true;
        thing.market_category = 5;
        thing.market_trade_as = 3031;
        thing.market_show_as = 3031;
        thing.market_name = "gold coin".to_string();
        thing.market_restrict_profession = 0;
        thing.market_restrict_level = 8;
        thing.cloth = true;
        thing.cloth_slot = 4;
        thing.has_offset = true;
        thing.offset_x = -8;
        thing.offset_y = 4;

        let decoded = roundtrip(860, ClientFeatures::for_version(860), &thing);
        assert_eq!(decoded, thing);

        thing.no_move_animation = true;
        thing.has_default_action = true;
        thing.default_action = 2;
        thing.wrappable = true;
        thing.unwrappable = true;
        thing.top_effect = true;
        thing.usable = true;
        let decoded = roundtrip(1098, ClientFeatures::for_version(1098), &thing);
        assert_eq!(decoded, thing);
    }

    #[test]
    fn test_unknown_flag_reports_context() {
        // 0x21 is MARKET_ITEM in 8.60 but unassigned in 7.80.
        let mut cursor = ByteCursor::from_bytes(vec![0x05, 0x21, 0xFF]);
        let err = MetadataReader::new(800, ClientFeatures::default())
            .read_thing(&mut cursor, 512, ThingCategory::Item)
            .unwrap_err();
        match err {
            FormatError::UnknownFlag {
                flag,
                previous_flag,
                category,
                id,
            } => {
                assert_eq!(flag, 0x21);
                assert_eq!(previous_flag, 0x05);
                assert_eq!(category, ThingCategory::Item);
                assert_eq!(id, 512);
            }
            other => panic!("Expected UnknownFlag, got {:?}", other),
        }
    }

    #[test]
    fn test_outfit_with_walking_group_and_durations() {
        let features = ClientFeatures::for_version(1098);
        let mut outfit = ThingType::create(12, ThingCategory::Outfit);
        outfit.frame_groups[0].frames = 1;
        outfit.frame_groups[0].sprite_index = (1..=4).collect();
        let mut walking = FrameGroup::with_patterns(4, 1, 2);
        walking.layers = 2;
        walking.sprite_index = (10..26).collect();
        walking.animation_mode = crate::frame_group::AnimationMode::Synchronous;
        walking.loop_count = -1;
        walking.start_frame = 1;
        walking.frame_durations = Some(vec![FrameDuration::new(100, 200); 2]);
        outfit.set_frame_group(walking, FrameGroupType::Walking);

        let decoded = roundtrip(1098, features, &outfit);
        assert_eq!(decoded, outfit);
        assert_eq!(decoded.frame_groups.len(), 2);
    }

    #[test]
    fn test_header_roundtrip_and_overflow() {
        let header = MetadataHeader {
            signature: 0x4C2C7993,
            item_count: 10000,
            outfit_count: 300,
            effect_count: 50,
            missile_count: 40,
        };
        let mut cursor = ByteCursor::new();
        header.write(&mut cursor).unwrap();
        assert_eq!(cursor.len(), HEADER_SIZE);
        cursor.set_position(0);
        assert_eq!(MetadataHeader::read(&mut cursor).unwrap(), header);

        let oversized = MetadataHeader {
            outfit_count: 70000,
            ..header
        };
        assert!(matches!(
            oversized.write(&mut ByteCursor::new()),
            Err(FormatError::CountOverflow {
                category: ThingCategory::Outfit,
                ..
            })
        ));
    }
}
