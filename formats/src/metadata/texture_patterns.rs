use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{FormatError, Result};
use crate::frame_group::{
    AnimationMode, DefaultDurations, FrameDuration, FrameGroup, FrameGroupType,
    MAX_SPRITES_PER_GROUP,
};
use crate::thing_type::{ThingCategory, ThingType};
use crate::version::ClientFeatures;

fn has_group_prefix(features: ClientFeatures, category: ThingCategory) -> bool {
    features.frame_groups && category == ThingCategory::Outfit
}

/// Reads the frame groups that follow a record's flag list.
///
/// Field order per group: [type], width, height, [exact size], layers,
/// pattern x, pattern y, [pattern z], frames, [animation], sprite ids.
pub fn read_texture_patterns(
    cursor: &mut ByteCursor,
    thing: &mut ThingType,
    features: ClientFeatures,
    stores_pattern_z: bool,
) -> Result<()> {
    let grouped = has_group_prefix(features, thing.category);
    let group_count = if grouped { cursor.read_u8()? as usize } else { 1 };

    if group_count == 0 || group_count > 2 {
        return Err(FormatError::InvalidFrameGroupCount {
            category: thing.category,
            id: thing.id,
            count: group_count,
        });
    }

    for _ in 0..group_count {
        let group_type = if grouped {
            let raw = cursor.read_u8()?;
            FrameGroupType::try_from(raw).map_err(|e| FormatError::InvalidFrameGroupType(e.number))?
        } else {
            FrameGroupType::Default
        };

        let mut group = FrameGroup {
            group_type,
            ..Default::default()
        };
        group.width = cursor.read_u8()?;
        group.height = cursor.read_u8()?;
        if group.width > 1 || group.height > 1 {
            group.exact_size = cursor.read_u8()?;
        }
        group.layers = cursor.read_u8()?;
        group.pattern_x = cursor.read_u8()?;
        group.pattern_y = cursor.read_u8()?;
        group.pattern_z = if stores_pattern_z { cursor.read_u8()? } else { 1 };
        group.frames = cursor.read_u8()?;

        if group.is_animation() && features.frame_durations {
            group.animation_mode = AnimationMode::from(cursor.read_u8()?);
            group.loop_count = cursor.read_i32()?;
            group.start_frame = cursor.read_i8()?;
            let mut durations = Vec::with_capacity(group.frames as usize);
            for _ in 0..group.frames {
                let minimum = cursor.read_u32()?;
                let maximum = cursor.read_u32()?;
                durations.push(FrameDuration::new(minimum, maximum));
            }
            group.frame_durations = Some(durations);
        }

        let total = group.total_sprites();
        if total > MAX_SPRITES_PER_GROUP {
            return Err(FormatError::TooManySprites {
                category: thing.category,
                id: thing.id,
                count: total,
                limit: MAX_SPRITES_PER_GROUP,
            });
        }

        let mut sprite_index = Vec::with_capacity(total);
        for _ in 0..total {
            let id = if features.extended {
                cursor.read_u32()?
            } else {
                cursor.read_u16()? as u32
            };
            sprite_index.push(id);
        }
        group.sprite_index = sprite_index;

        thing.set_frame_group(group, group_type);
    }

    Ok(())
}

/// Writes the frame groups of a record, mirroring [`read_texture_patterns`].
///
/// Without frame-group support only the default group is written. Animated
/// groups without stored durations get the category default when the target
/// stores durations.
pub fn write_texture_patterns(
    cursor: &mut ByteCursor,
    thing: &ThingType,
    features: ClientFeatures,
    stores_pattern_z: bool,
    defaults: &DefaultDurations,
) -> Result<()> {
    let grouped = has_group_prefix(features, thing.category);

    let groups: Vec<&FrameGroup> = if grouped {
        thing.frame_groups.iter().collect()
    } else {
        thing.default_group().into_iter().collect()
    };

    if groups.is_empty() {
        return Err(FormatError::MissingFrameGroup {
            category: thing.category,
            id: thing.id,
        });
    }
    if groups.len() > 2 {
        return Err(FormatError::InvalidFrameGroupCount {
            category: thing.category,
            id: thing.id,
            count: groups.len(),
        });
    }
    if !grouped && thing.frame_groups.len() > 1 {
        debug!(
            "Dropping walking frame group of {} {}: target has no frame groups",
            thing.category, thing.id
        );
    }

    if grouped {
        cursor.write_u8(groups.len() as u8);
    }

    for group in groups {
        let total = group.total_sprites();
        if total > MAX_SPRITES_PER_GROUP {
            return Err(FormatError::TooManySprites {
                category: thing.category,
                id: thing.id,
                count: total,
                limit: MAX_SPRITES_PER_GROUP,
            });
        }
        if total != group.sprite_index.len() {
            return Err(FormatError::SpriteIndexMismatch {
                category: thing.category,
                id: thing.id,
                expected: total,
                actual: group.sprite_index.len(),
            });
        }
        if !stores_pattern_z && group.pattern_z != 1 {
            return Err(FormatError::PatternZUnsupported {
                category: thing.category,
                id: thing.id,
                pattern_z: group.pattern_z,
            });
        }

        if grouped {
            cursor.write_u8(group.group_type.into());
        }
        cursor.write_u8(group.width);
        cursor.write_u8(group.height);
        if group.width > 1 || group.height > 1 {
            cursor.write_u8(group.exact_size);
        }
        cursor.write_u8(group.layers);
        cursor.write_u8(group.pattern_x);
        cursor.write_u8(group.pattern_y);
        if stores_pattern_z {
            cursor.write_u8(group.pattern_z);
        }
        cursor.write_u8(group.frames);

        if group.is_animation() && features.frame_durations {
            cursor.write_u8(group.animation_mode.into());
            cursor.write_i32(group.loop_count);
            cursor.write_i8(group.start_frame);
            for duration in group.durations_or(defaults.for_category(thing.category)) {
                cursor.write_u32(duration.minimum);
                cursor.write_u32(duration.maximum);
            }
        }

        for &id in &group.sprite_index {
            if features.extended {
                cursor.write_u32(id);
            } else {
                if id > u16::MAX as u32 {
                    return Err(FormatError::SpriteIdOverflow { id, bits: 16 });
                }
                cursor.write_u16(id as u16);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animated_effect() -> ThingType {
        let mut thing = ThingType::create(7, ThingCategory::Effect);
        let group = &mut thing.frame_groups[0];
        group.width = 2;
        group.height = 2;
        group.exact_size = 64;
        group.frames = 3;
        group.sprite_index = (1..=12).collect();
        thing
    }

    #[test]
    fn test_layout_of_small_group() {
        let thing = ThingType::create(100, ThingCategory::Item);
        let mut cursor = ByteCursor::new();
        write_texture_patterns(
            &mut cursor,
            &thing,
            ClientFeatures::default(),
            true,
            &DefaultDurations::default(),
        )
        .unwrap();
        // width, height, layers, x, y, z, frames, one u16 sprite id
        assert_eq!(cursor.as_slice(), &[1, 1, 1, 1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_exact_size_only_for_large_groups() {
        let thing = animated_effect();
        let mut cursor = ByteCursor::new();
        write_texture_patterns(
            &mut cursor,
            &thing,
            ClientFeatures::default(),
            false,
            &DefaultDurations::default(),
        )
        .unwrap();
        assert_eq!(&cursor.as_slice()[..7], &[2, 2, 64, 1, 1, 1, 3]);
        assert_eq!(cursor.len(), 7 + 12 * 2);
    }

    #[test]
    fn test_missing_durations_are_synthesized() {
        let thing = animated_effect();
        let features = ClientFeatures::new(true, false, true, true);
        let defaults = DefaultDurations {
            effect: 75,
            ..Default::default()
        };

        let mut cursor = ByteCursor::new();
        write_texture_patterns(&mut cursor, &thing, features, true, &defaults).unwrap();

        cursor.set_position(0);
        let mut decoded = ThingType::empty(7, ThingCategory::Effect);
        read_texture_patterns(&mut cursor, &mut decoded, features, true).unwrap();
        assert_eq!(
            decoded.frame_groups[0].frame_durations,
            Some(vec![FrameDuration::fixed(75); 3])
        );
    }

    #[test]
    fn test_too_many_sprites() {
        // 8 x 8 tiles, 4 layers, 4 x 4 x 4 patterns = 16384 sprites.
        let mut cursor = ByteCursor::from_bytes(vec![8, 8, 32, 4, 4, 4, 4, 1]);
        let mut thing = ThingType::empty(3, ThingCategory::Outfit);
        let err =
            read_texture_patterns(&mut cursor, &mut thing, ClientFeatures::default(), true)
                .unwrap_err();
        assert!(matches!(
            err,
            FormatError::TooManySprites {
                count: 16384,
                limit: MAX_SPRITES_PER_GROUP,
                ..
            }
        ));
    }

    #[test]
    fn test_sprite_id_overflow_without_extended() {
        let mut thing = ThingType::create(100, ThingCategory::Item);
        thing.frame_groups[0].sprite_index = vec![70_000];
        let mut cursor = ByteCursor::new();
        let err = write_texture_patterns(
            &mut cursor,
            &thing,
            ClientFeatures::default(),
            true,
            &DefaultDurations::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::SpriteIdOverflow { id: 70_000, .. }));
    }

    #[test]
    fn test_pattern_z_cannot_be_written_to_old_dialect() {
        let mut thing = ThingType::create(100, ThingCategory::Item);
        thing.frame_groups[0].pattern_z = 2;
        thing.frame_groups[0].sprite_index = vec![0, 0];
        let err = write_texture_patterns(
            &mut ByteCursor::new(),
            &thing,
            ClientFeatures::default(),
            false,
            &DefaultDurations::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::PatternZUnsupported { pattern_z: 2, .. }));
    }

    #[test]
    fn test_walking_group_dropped_without_frame_groups() {
        let mut outfit = ThingType::create(1, ThingCategory::Outfit);
        outfit.set_frame_group(FrameGroup::with_patterns(4, 1, 2), FrameGroupType::Walking);

        let features = ClientFeatures::default();
        let mut cursor = ByteCursor::new();
        write_texture_patterns(&mut cursor, &outfit, features, true, &Default::default()).unwrap();

        cursor.set_position(0);
        let mut decoded = ThingType::empty(1, ThingCategory::Outfit);
        read_texture_patterns(&mut cursor, &mut decoded, features, true).unwrap();
        assert_eq!(decoded.frame_groups.len(), 1);
        assert_eq!(decoded.frame_groups[0], outfit.frame_groups[0]);
    }
}
