use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::thing_type::ThingCategory;

/// Pixel size of one tile.
pub const SPRITE_SIZE: u8 = 32;

/// Largest number of sprite ids one frame group may address.
pub const MAX_SPRITES_PER_GROUP: usize = 4096;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum FrameGroupType {
    Default = 0,
    Walking = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum AnimationMode {
    Asynchronous = 0,
    Synchronous = 1,
    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for AnimationMode {
    fn default() -> Self {
        Self::Asynchronous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameDuration {
    pub minimum: u32,
    pub maximum: u32,
}

impl FrameDuration {
    pub fn new(minimum: u32, maximum: u32) -> Self {
        Self { minimum, maximum }
    }

    pub fn fixed(duration: u32) -> Self {
        Self::new(duration, duration)
    }
}

/// Frame duration used for each category when a file does not store one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultDurations {
    pub item: u32,
    pub outfit: u32,
    pub effect: u32,
    pub missile: u32,
}

impl Default for DefaultDurations {
    fn default() -> Self {
        Self {
            item: 500,
            outfit: 300,
            effect: 100,
            missile: 100,
        }
    }
}

impl DefaultDurations {
    pub fn for_category(&self, category: ThingCategory) -> u32 {
        match category {
            ThingCategory::Item => self.item,
            ThingCategory::Outfit => self.outfit,
            ThingCategory::Effect => self.effect,
            ThingCategory::Missile => self.missile,
        }
    }
}

/// One texture-pattern layout of a thing.
///
/// `sprite_index` is flat, ordered frame, z, y, x, layer, height, width from
/// the outermost axis to the innermost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGroup {
    pub group_type: FrameGroupType,
    pub width: u8,
    pub height: u8,
    pub exact_size: u8,
    pub layers: u8,
    pub pattern_x: u8,
    pub pattern_y: u8,
    pub pattern_z: u8,
    pub frames: u8,
    pub animation_mode: AnimationMode,
    pub loop_count: i32,
    pub start_frame: i8,
    pub frame_durations: Option<Vec<FrameDuration>>,
    pub sprite_index: Vec<u32>,
}

impl Default for FrameGroup {
    fn default() -> Self {
        Self {
            group_type: FrameGroupType::Default,
            width: 1,
            height: 1,
            exact_size: SPRITE_SIZE,
            layers: 1,
            pattern_x: 1,
            pattern_y: 1,
            pattern_z: 1,
            frames: 1,
            animation_mode: AnimationMode::Asynchronous,
            loop_count: 0,
            start_frame: 0,
            frame_durations: None,
            sprite_index: vec![0],
        }
    }
}

impl FrameGroup {
    /// A blank group with the given pattern counts and a zeroed sprite index.
    pub fn with_patterns(pattern_x: u8, pattern_y: u8, frames: u8) -> Self {
        let mut group = Self {
            pattern_x,
            pattern_y,
            frames,
            ..Default::default()
        };
        group.sprite_index = vec![0; group.total_sprites()];
        group
    }

    pub fn is_animation(&self) -> bool {
        self.frames > 1
    }

    pub fn total_sprites(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.layers as usize
            * self.pattern_x as usize
            * self.pattern_y as usize
            * self.pattern_z as usize
            * self.frames as usize
    }

    pub fn total_textures(&self) -> usize {
        self.layers as usize
            * self.pattern_x as usize
            * self.pattern_y as usize
            * self.pattern_z as usize
            * self.frames as usize
    }

    /// Flat position of one tile inside `sprite_index`.
    #[allow(clippy::too_many_arguments)]
    pub fn sprite_index_at(
        &self,
        width: u8,
        height: u8,
        layer: u8,
        pattern_x: u8,
        pattern_y: u8,
        pattern_z: u8,
        frame: u8,
    ) -> usize {
        let frame = (frame % self.frames.max(1)) as usize;
        (((((frame * self.pattern_z as usize + pattern_z as usize) * self.pattern_y as usize
            + pattern_y as usize)
            * self.pattern_x as usize
            + pattern_x as usize)
            * self.layers as usize
            + layer as usize)
            * self.height as usize
            + height as usize)
            * self.width as usize
            + width as usize
    }

    /// Per-frame durations, falling back to `default` for every frame when the
    /// group has none stored.
    pub fn durations_or(&self, default: u32) -> Vec<FrameDuration> {
        match &self.frame_durations {
            Some(durations) if durations.len() == self.frames as usize => durations.clone(),
            _ => vec![FrameDuration::fixed(default); self.frames as usize],
        }
    }

    /// Copy of this group with every frame carrying a duration.
    pub fn clone_with_durations(&self, default: u32) -> Self {
        let mut group = self.clone();
        if group.is_animation() {
            group.frame_durations = Some(self.durations_or(default));
        }
        group
    }

    pub fn is_blank(&self) -> bool {
        self.sprite_index.iter().all(|&id| id == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sprites() {
        let group = FrameGroup {
            width: 2,
            height: 2,
            layers: 2,
            pattern_x: 4,
            pattern_y: 1,
            pattern_z: 1,
            frames: 3,
            ..Default::default()
        };
        assert_eq!(group.total_sprites(), 96);
        assert_eq!(group.total_textures(), 24);
        assert!(group.is_animation());
    }

    #[test]
    fn test_sprite_index_at_walks_axes_innermost_first() {
        let group = FrameGroup {
            width: 2,
            height: 2,
            pattern_x: 4,
            frames: 2,
            ..Default::default()
        };
        assert_eq!(group.sprite_index_at(0, 0, 0, 0, 0, 0, 0), 0);
        assert_eq!(group.sprite_index_at(1, 0, 0, 0, 0, 0, 0), 1);
        assert_eq!(group.sprite_index_at(0, 1, 0, 0, 0, 0, 0), 2);
        assert_eq!(group.sprite_index_at(0, 0, 0, 1, 0, 0, 0), 4);
        assert_eq!(group.sprite_index_at(0, 0, 0, 0, 0, 0, 1), 16);
        // Frames wrap around.
        assert_eq!(group.sprite_index_at(0, 0, 0, 0, 0, 0, 2), 0);
        assert_eq!(
            group.sprite_index_at(1, 1, 0, 3, 0, 0, 1),
            group.total_sprites() - 1
        );
    }

    #[test]
    fn test_durations_fallback() {
        let mut group = FrameGroup::with_patterns(1, 1, 3);
        assert_eq!(group.durations_or(100), vec![FrameDuration::fixed(100); 3]);

        group.frame_durations = Some(vec![
            FrameDuration::new(10, 20),
            FrameDuration::new(30, 40),
            FrameDuration::new(50, 60),
        ]);
        assert_eq!(group.durations_or(100)[1], FrameDuration::new(30, 40));
    }

    #[test]
    fn test_clone_with_durations_only_touches_animations() {
        let still = FrameGroup::default().clone_with_durations(100);
        assert_eq!(still.frame_durations, None);

        let animated = FrameGroup::with_patterns(1, 1, 2).clone_with_durations(250);
        assert_eq!(animated.frame_durations, Some(vec![FrameDuration::fixed(250); 2]));
    }

    #[test]
    fn test_animation_mode_keeps_unknown_values() {
        assert_eq!(AnimationMode::from(1), AnimationMode::Synchronous);
        assert_eq!(u8::from(AnimationMode::from(7)), 7);
    }
}
