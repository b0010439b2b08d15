use serde::{Deserialize, Serialize};

use crate::frame_group::{FrameGroup, FrameGroupType};

/// Reserved sprite id of the placeholder shown for unreadable entries.
pub const ALERT_SPRITE_ID: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThingCategory {
    Item,
    Outfit,
    Effect,
    Missile,
}

impl ThingCategory {
    pub const ALL: [ThingCategory; 4] = [
        ThingCategory::Item,
        ThingCategory::Outfit,
        ThingCategory::Effect,
        ThingCategory::Missile,
    ];

    /// First id of the category's id space.
    pub fn first_id(self) -> u32 {
        match self {
            ThingCategory::Item => 100,
            _ => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThingCategory::Item => "item",
            ThingCategory::Outfit => "outfit",
            ThingCategory::Effect => "effect",
            ThingCategory::Missile => "missile",
        }
    }
}

impl std::fmt::Display for ThingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ThingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "item" | "items" => Ok(ThingCategory::Item),
            "outfit" | "outfits" => Ok(ThingCategory::Outfit),
            "effect" | "effects" => Ok(ThingCategory::Effect),
            "missile" | "missiles" => Ok(ThingCategory::Missile),
            other => Err(format!("unknown thing category: {}", other)),
        }
    }
}

/// One catalogued object and its texture patterns.
///
/// Every property is gated by a flag in the metadata file; the numeric fields
/// next to a boolean only carry meaning when the boolean is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingType {
    pub id: u32,
    pub category: ThingCategory,

    pub is_ground: bool,
    pub ground_speed: u16,
    pub is_ground_border: bool,
    pub is_on_bottom: bool,
    pub is_on_top: bool,
    pub is_container: bool,
    pub stackable: bool,
    pub force_use: bool,
    pub multi_use: bool,
    pub has_charges: bool,
    pub writable: bool,
    pub writable_once: bool,
    pub max_text_length: u16,
    pub is_fluid_container: bool,
    pub is_fluid: bool,
    pub is_unpassable: bool,
    pub is_unmoveable: bool,
    pub block_missile: bool,
    pub block_pathfind: bool,
    pub no_move_animation: bool,
    pub pickupable: bool,
    pub hangable: bool,
    pub is_vertical: bool,
    pub is_horizontal: bool,
    pub rotatable: bool,
    pub has_light: bool,
    pub light_level: u16,
    pub light_color: u16,
    pub dont_hide: bool,
    pub is_translucent: bool,
    pub floor_change: bool,
    pub has_offset: bool,
    pub offset_x: i16,
    pub offset_y: i16,
    pub has_elevation: bool,
    pub elevation: u16,
    pub is_lying_object: bool,
    pub animate_always: bool,
    pub mini_map: bool,
    pub mini_map_color: u16,
    pub is_lens_help: bool,
    pub lens_help: u16,
    pub is_full_ground: bool,
    pub ignore_look: bool,
    pub cloth: bool,
    pub cloth_slot: u16,
    pub is_market_item: bool,
    pub market_category: u16,
    pub market_trade_as: u16,
    pub market_show_as: u16,
    pub market_name: String,
    pub market_restrict_profession: u16,
    pub market_restrict_level: u16,
    pub has_default_action: bool,
    pub default_action: u16,
    pub wrappable: bool,
    pub unwrappable: bool,
    pub top_effect: bool,
    pub usable: bool,

    pub frame_groups: Vec<FrameGroup>,
}

impl ThingType {
    /// A record with no properties set and no frame groups yet; the metadata
    /// reader fills both in.
    pub fn empty(id: u32, category: ThingCategory) -> Self {
        Self {
            id,
            category,
            is_ground: false,
            ground_speed: 0,
            is_ground_border: false,
            is_on_bottom: false,
            is_on_top: false,
            is_container: false,
            stackable: false,
            force_use: false,
            multi_use: false,
            has_charges: false,
            writable: false,
            writable_once: false,
            max_text_length: 0,
            is_fluid_container: false,
            is_fluid: false,
            is_unpassable: false,
            is_unmoveable: false,
            block_missile: false,
            block_pathfind: false,
            no_move_animation: false,
            pickupable: false,
            hangable: false,
            is_vertical: false,
            is_horizontal: false,
            rotatable: false,
            has_light: false,
            light_level: 0,
            light_color: 0,
            dont_hide: false,
            is_translucent: false,
            floor_change: false,
            has_offset: false,
            offset_x: 0,
            offset_y: 0,
            has_elevation: false,
            elevation: 0,
            is_lying_object: false,
            animate_always: false,
            mini_map: false,
            mini_map_color: 0,
            is_lens_help: false,
            lens_help: 0,
            is_full_ground: false,
            ignore_look: false,
            cloth: false,
            cloth_slot: 0,
            is_market_item: false,
            market_category: 0,
            market_trade_as: 0,
            market_show_as: 0,
            market_name: String::new(),
            market_restrict_profession: 0,
            market_restrict_level: 0,
            has_default_action: false,
            default_action: 0,
            wrappable: false,
            unwrappable: false,
            top_effect: false,
            usable: false,
            frame_groups: Vec::new(),
        }
    }

    /// The canonical blank record for a category: outfits get four directions
    /// of three frames, missiles a 3x3 direction grid, everything else a
    /// single blank tile.
    pub fn create(id: u32, category: ThingCategory) -> Self {
        let group = match category {
            ThingCategory::Outfit => FrameGroup::with_patterns(4, 1, 3),
            ThingCategory::Missile => FrameGroup::with_patterns(3, 3, 1),
            _ => FrameGroup::default(),
        };
        let mut thing = Self::empty(id, category);
        thing.frame_groups.push(group);
        thing
    }

    /// Placeholder handed out when a lookup misses.
    pub fn alert(id: u32, category: ThingCategory) -> Self {
        let mut thing = Self::empty(id, category);
        thing.frame_groups.push(FrameGroup {
            sprite_index: vec![ALERT_SPRITE_ID],
            ..Default::default()
        });
        thing
    }

    pub fn frame_group(&self, group_type: FrameGroupType) -> Option<&FrameGroup> {
        self.frame_groups
            .iter()
            .find(|group| group.group_type == group_type)
    }

    pub fn frame_group_mut(&mut self, group_type: FrameGroupType) -> Option<&mut FrameGroup> {
        self.frame_groups
            .iter_mut()
            .find(|group| group.group_type == group_type)
    }

    pub fn default_group(&self) -> Option<&FrameGroup> {
        self.frame_group(FrameGroupType::Default)
            .or_else(|| self.frame_groups.first())
    }

    /// Inserts or replaces the group of the same type.
    pub fn set_frame_group(&mut self, mut group: FrameGroup, group_type: FrameGroupType) {
        group.group_type = group_type;
        match self.frame_group_mut(group_type) {
            Some(existing) => *existing = group,
            None => {
                self.frame_groups.push(group);
                self.frame_groups.sort_by_key(|g| u8::from(g.group_type));
            }
        }
    }

    pub fn sprite_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.frame_groups
            .iter()
            .flat_map(|group| group.sprite_index.iter().copied())
    }

    /// Rewrites every sprite reference in place.
    pub fn remap_sprites(&mut self, mut map: impl FnMut(u32) -> u32) {
        for group in &mut self.frame_groups {
            for id in &mut group.sprite_index {
                *id = map(*id);
            }
        }
    }

    /// Whether this record is one of the canonical blank layouts.
    ///
    /// Only the single blank tile, the 12-entry blank outfit and the 9-entry
    /// blank missile count; any other all-zero layout is kept.
    pub fn is_empty(&self) -> bool {
        let Some(group) = self.default_group() else {
            return true;
        };
        let blank = group.is_blank();
        match group.sprite_index.len() {
            1 => blank,
            12 if self.category == ThingCategory::Outfit => blank,
            9 if self.category == ThingCategory::Missile => blank,
            _ => false,
        }
    }
}
