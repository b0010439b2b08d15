use formats::{ClientFeatures, ThingCategory, ThingType, Version};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::progress::{NoProgress, Progress, ProgressListener, ProgressSource};
use crate::resource_queue::ResourceQueue;
use crate::sprite_optimizer::{OptimizeReport, SpriteOptimizer};
use crate::sprite_store::SpriteStorage;
use crate::thing_store::ThingTypeStorage;

/// One sprite pass plus one pass per category.
const MILESTONES: u32 = 1 + ThingCategory::ALL.len() as u32;

/// Files of the client being merged in.
#[derive(Debug, Clone)]
pub struct MergeSource {
    pub metadata: PathBuf,
    pub sprites: PathBuf,
    pub version: Version,
    pub features: ClientFeatures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub sprites_added: u32,
    /// Things added per category, in [`ThingCategory::ALL`] order.
    pub things_added: [u32; 4],
    pub optimized: Option<OptimizeReport>,
}

/// Appends the things and sprites of another client to a loaded pair of
/// stores, renumbering sprite references into the destination.
pub struct ClientMerger<'a> {
    things: &'a mut ThingTypeStorage,
    sprites: &'a mut SpriteStorage,
    optimize: bool,
}

impl<'a> ClientMerger<'a> {
    pub fn new(things: &'a mut ThingTypeStorage, sprites: &'a mut SpriteStorage) -> Self {
        Self {
            things,
            sprites,
            optimize: false,
        }
    }

    /// Optimize the incoming client before copying it.
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn merge(
        self,
        source: &MergeSource,
        progress: &dyn ProgressListener,
    ) -> Result<MergeReport> {
        if !self.things.is_loaded() || !self.sprites.is_loaded() {
            return Err(StorageError::NotLoaded);
        }
        info!("Merging {:?} and {:?}", source.metadata, source.sprites);

        let mut source_things = ThingTypeStorage::new(self.things.durations());
        let mut source_sprites = SpriteStorage::new();
        let mut queue = ResourceQueue::new();
        queue.add("metadata", || {
            source_things.load(&source.metadata, &source.version, source.features, &NoProgress)
        });
        queue.add("sprites", || {
            source_sprites.load(&source.sprites, &source.version, source.features, &NoProgress)
        });
        queue.run(&NoProgress)?;

        let optimized = if self.optimize {
            Some(SpriteOptimizer::new(&mut source_things, &mut source_sprites).run(&NoProgress)?)
        } else {
            None
        };

        let mut report = MergeReport {
            optimized,
            ..Default::default()
        };

        // source id -> destination id, empty sprites map to 0
        let count = source_sprites.count();
        let mut sprite_map = vec![0u32; count as usize + 1];
        let mut incoming = Vec::new();
        let mut incoming_ids = Vec::new();
        for id in 1..=count {
            let sprite = source_sprites.try_sprite(id)?;
            if !sprite.is_empty() {
                incoming.push(sprite.clone());
                incoming_ids.push(id);
            }
        }
        if !incoming.is_empty() {
            let added = self.sprites.add_sprites(incoming)?;
            for (id, sprite) in incoming_ids.into_iter().zip(&added.list) {
                sprite_map[id as usize] = sprite.id();
            }
            report.sprites_added = added.list.len() as u32;
        }
        debug!("Copied {} sprites", report.sprites_added);
        progress.report(
            Progress::new(ProgressSource::Default, 1, MILESTONES).with_label("sprites"),
        );

        let store_durations = self.things.features().frame_durations;
        for (index, category) in ThingCategory::ALL.into_iter().enumerate() {
            let default_duration = self.things.durations().for_category(category);
            let things: Vec<ThingType> = source_things
                .things(category)
                .filter(|thing| !thing.is_empty())
                .map(|thing| {
                    let mut thing = thing.clone();
                    thing.remap_sprites(|id| sprite_map.get(id as usize).copied().unwrap_or(0));
                    if store_durations {
                        for group in &mut thing.frame_groups {
                            *group = group.clone_with_durations(default_duration);
                        }
                    }
                    thing
                })
                .collect();
            let added = self.things.add_things(things, category)?;
            report.things_added[index] = added.list.len() as u32;
            progress.report(
                Progress::new(ProgressSource::Default, index as u32 + 2, MILESTONES)
                    .with_label(category.as_str()),
            );
        }

        info!(
            "Merged {} sprites and {} things",
            report.sprites_added,
            report.things_added.iter().sum::<u32>()
        );
        Ok(report)
    }
}
