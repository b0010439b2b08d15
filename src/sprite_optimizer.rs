use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::find::used_sprites;
use crate::progress::{Progress, ProgressListener, ProgressSource};
use crate::sprite_store::SpriteStorage;
use crate::thing_store::ThingTypeStorage;

const PHASES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizeReport {
    /// Sprites folded into an identical earlier sprite.
    pub duplicates: u32,
    /// Ids reclaimed by compaction.
    pub removed: u32,
    pub old_count: u32,
    pub new_count: u32,
}

/// Deduplicates sprites by content hash and compacts the sprite ids that no
/// thing uses, renumbering every reference on the way.
pub struct SpriteOptimizer<'a> {
    things: &'a mut ThingTypeStorage,
    sprites: &'a mut SpriteStorage,
}

impl<'a> SpriteOptimizer<'a> {
    pub fn new(things: &'a mut ThingTypeStorage, sprites: &'a mut SpriteStorage) -> Self {
        Self { things, sprites }
    }

    pub fn run(self, progress: &dyn ProgressListener) -> Result<OptimizeReport> {
        if !self.things.is_loaded() || !self.sprites.is_loaded() {
            return Err(StorageError::NotLoaded);
        }
        let old_count = self.sprites.count();
        info!("Optimizing {} sprites", old_count);

        // 1: every sprite points at the first sprite with the same hash
        let mut canonical = HashMap::new();
        let mut substitution = vec![0u32; old_count as usize + 1];
        let mut duplicates = 0;
        for id in 1..=old_count {
            let hash = self.sprites.try_sprite(id)?.hash();
            let first = *canonical.entry(hash).or_insert(id);
            if first != id {
                duplicates += 1;
            }
            substitution[id as usize] = first;
        }
        self.things.remap_sprites(|id| lookup(&substitution, id));
        debug!("Found {} duplicate sprites", duplicates);
        progress.report(Progress::new(ProgressSource::Find, 1, PHASES).with_label("duplicates"));

        // 2: unused and empty sprites are reclaimable, referenced or not
        let used = used_sprites(self.things, old_count);
        let mut kept = Vec::with_capacity(old_count as usize);
        for id in 1..=old_count {
            if used[id as usize] && !self.sprites.is_empty_sprite(id)? {
                kept.push(id);
            }
        }
        progress.report(Progress::new(ProgressSource::Find, 2, PHASES).with_label("unused"));

        // 3: dense renumbering of the survivors
        let new_count = kept.len() as u32;
        let removed = old_count - new_count;
        if removed > 0 {
            let mut compaction = vec![0u32; old_count as usize + 1];
            for (new_id, &id) in (1u32..).zip(&kept) {
                compaction[id as usize] = new_id;
            }
            self.things.remap_sprites(|id| lookup(&compaction, id));
            self.sprites.retain_in_order(&kept)?;
        }
        progress.report(
            Progress::new(ProgressSource::Find, PHASES, PHASES).with_label("compaction"),
        );

        info!(
            "Optimized sprites: {} duplicates, {} removed, {} -> {}",
            duplicates, removed, old_count, new_count
        );
        Ok(OptimizeReport {
            duplicates,
            removed,
            old_count,
            new_count,
        })
    }
}

/// Ids outside the table were dangling and become blank.
fn lookup(table: &[u32], id: u32) -> u32 {
    table.get(id as usize).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use formats::{ClientFeatures, SPRITE_DATA_SIZE, ThingCategory, ThingType, Version};

    fn stores(colors: &[[u8; 4]]) -> (ThingTypeStorage, SpriteStorage) {
        let version = Version::new(860, "8.60", 0x4C2C7993, 0x4C220594, 20);
        let features = ClientFeatures::for_version(860);
        let mut things = ThingTypeStorage::default();
        things.create_new(&version, features);
        let mut sprites = SpriteStorage::new();
        sprites.create_new(&version, features);
        for color in colors {
            sprites.add_sprite(&color.repeat(SPRITE_DATA_SIZE / 4)).unwrap();
        }
        (things, sprites)
    }

    fn item_with(things: &mut ThingTypeStorage, sprite_ids: Vec<u32>) -> u32 {
        let mut thing = ThingType::create(0, ThingCategory::Item);
        thing.frame_groups[0].frames = sprite_ids.len() as u8;
        thing.frame_groups[0].sprite_index = sprite_ids;
        things.add_thing(thing, ThingCategory::Item).unwrap().list[0].id
    }

    fn refs(things: &ThingTypeStorage, id: u32) -> Vec<u32> {
        things.thing(id, ThingCategory::Item).unwrap().sprite_ids().collect()
    }

    #[test]
    fn duplicates_share_one_sprite() {
        let blue = [0, 0, 255, 255];
        let red = [255, 0, 0, 255];
        // sprite 1 is the blank sprite of a new store
        let (mut things, mut sprites) = stores(&[blue, blue, red]);
        let id = item_with(&mut things, vec![2, 3, 4]);

        let report = SpriteOptimizer::new(&mut things, &mut sprites).run(&NoProgress).unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.removed, 2);
        assert_eq!(sprites.count(), 2);
        assert_eq!(refs(&things, id), vec![1, 1, 2]);
        assert_eq!(sprites.sprite(2).pixels(), red.repeat(1024).as_slice());
        assert!(sprites.is_changed());
    }

    #[test]
    fn empty_sprites_are_dropped_even_when_used() {
        let (mut things, mut sprites) = stores(&[[0, 0, 0, 0], [1, 2, 3, 255]]);
        let id = item_with(&mut things, vec![2, 3]);

        SpriteOptimizer::new(&mut things, &mut sprites).run(&NoProgress).unwrap();
        assert_eq!(refs(&things, id), vec![0, 1]);
        assert_eq!(sprites.count(), 1);
    }

    #[test]
    fn dangling_references_become_blank() {
        let (mut things, mut sprites) = stores(&[[1, 2, 3, 255]]);
        let id = item_with(&mut things, vec![2, 40]);

        SpriteOptimizer::new(&mut things, &mut sprites).run(&NoProgress).unwrap();
        assert_eq!(refs(&things, id), vec![1, 0]);
    }

    #[test]
    fn second_run_changes_nothing() {
        let (mut things, mut sprites) = stores(&[[5, 5, 5, 255], [5, 5, 5, 255], [6, 6, 6, 255]]);
        item_with(&mut things, vec![2, 3, 4]);
        SpriteOptimizer::new(&mut things, &mut sprites).run(&NoProgress).unwrap();

        let report = SpriteOptimizer::new(&mut things, &mut sprites).run(&NoProgress).unwrap();
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.removed, 0);
        assert_eq!(report.old_count, report.new_count);
    }

    #[test]
    fn reports_three_phases() {
        let (mut things, mut sprites) = stores(&[]);
        let (tx, rx) = crossbeam_channel::unbounded::<Progress>();
        SpriteOptimizer::new(&mut things, &mut sprites).run(&tx).unwrap();
        let reports: Vec<Progress> = rx.try_iter().collect();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|p| p.source == ProgressSource::Find));
        assert_eq!(reports[2].current, 3);
    }

    #[test]
    fn requires_loaded_stores() {
        let mut things = ThingTypeStorage::default();
        let mut sprites = SpriteStorage::new();
        assert!(matches!(
            SpriteOptimizer::new(&mut things, &mut sprites).run(&NoProgress),
            Err(StorageError::NotLoaded)
        ));
    }
}
