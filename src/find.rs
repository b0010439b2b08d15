use crate::error::Result;
use crate::progress::ProgressListener;
use crate::sprite_store::SpriteStorage;
use crate::thing_store::ThingTypeStorage;

/// Which sprites [`find_sprites`] returns. Both set means sprites that are
/// unused and empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteFilter {
    pub unused_only: bool,
    pub empty_only: bool,
}

/// `used[id]` is set for every sprite id some thing references.
pub fn used_sprites(things: &ThingTypeStorage, sprite_count: u32) -> Vec<bool> {
    let mut used = vec![false; sprite_count as usize + 1];
    for id in things.sprite_references() {
        if let Some(slot) = used.get_mut(id as usize) {
            *slot = true;
        }
    }
    used
}

pub fn find_sprites(
    things: &ThingTypeStorage,
    sprites: &mut SpriteStorage,
    filter: SpriteFilter,
    progress: &dyn ProgressListener,
) -> Result<Vec<u32>> {
    let used = used_sprites(things, sprites.count());
    sprites.find_sprites(
        |id, sprite| {
            (!filter.unused_only || !used[id as usize]) && (!filter.empty_only || sprite.is_empty())
        },
        progress,
    )
}

/// Sprite ids no thing refers to.
pub fn find_unused_sprites(
    things: &ThingTypeStorage,
    sprites: &mut SpriteStorage,
    progress: &dyn ProgressListener,
) -> Result<Vec<u32>> {
    find_sprites(
        things,
        sprites,
        SpriteFilter {
            unused_only: true,
            empty_only: false,
        },
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use formats::{ClientFeatures, SPRITE_DATA_SIZE, ThingCategory, ThingType, Version};

    #[test]
    fn filters_combine() {
        let version = Version::new(860, "8.60", 0x4C2C7993, 0x4C220594, 20);
        let features = ClientFeatures::for_version(860);
        let mut things = ThingTypeStorage::default();
        things.create_new(&version, features);
        let mut sprites = SpriteStorage::new();
        sprites.create_new(&version, features);
        sprites.add_sprite(&[7; SPRITE_DATA_SIZE]).unwrap();
        sprites.add_sprite(&[8; SPRITE_DATA_SIZE]).unwrap();

        let mut thing = ThingType::create(0, ThingCategory::Effect);
        thing.frame_groups[0].sprite_index = vec![2];
        things.add_thing(thing, ThingCategory::Effect).unwrap();

        assert_eq!(find_unused_sprites(&things, &mut sprites, &NoProgress).unwrap(), vec![1, 3]);
        let unused_empty = SpriteFilter {
            unused_only: true,
            empty_only: true,
        };
        assert_eq!(
            find_sprites(&things, &mut sprites, unused_empty, &NoProgress).unwrap(),
            vec![1]
        );
        assert_eq!(
            find_sprites(&things, &mut sprites, SpriteFilter::default(), &NoProgress).unwrap(),
            vec![1, 2, 3]
        );
    }
}
