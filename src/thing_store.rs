use crossbeam_channel::Receiver;
use formats::{
    ByteCursor, ClientFeatures, DefaultDurations, FormatError, MetadataHeader, MetadataReader,
    MetadataWriter, ThingCategory, ThingType, Version, metadata::HEADER_SIZE,
};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::atomic_file::{same_file, write_atomic};
use crate::error::{Result, StorageError};
use crate::events::{ChangeResult, EventBus, StorageEvent};
use crate::progress::{Progress, ProgressListener, ProgressSource};

fn slot(category: ThingCategory) -> usize {
    match category {
        ThingCategory::Item => 0,
        ThingCategory::Outfit => 1,
        ThingCategory::Effect => 2,
        ThingCategory::Missile => 3,
    }
}

/// Number of records between the first id of a category and `last`.
fn span(category: ThingCategory, last: u32) -> u32 {
    (last + 1).saturating_sub(category.first_id())
}

/// All things of one metadata file, keyed by id within each category.
#[derive(Debug, Default)]
pub struct ThingTypeStorage {
    things: [BTreeMap<u32, ThingType>; 4],
    /// Last id of each category.
    counts: [u32; 4],
    version: Option<Version>,
    features: ClientFeatures,
    durations: DefaultDurations,
    path: Option<PathBuf>,
    changed: bool,
    loaded: bool,
    events: EventBus,
}

impl ThingTypeStorage {
    pub fn new(durations: DefaultDurations) -> Self {
        Self {
            durations,
            ..Default::default()
        }
    }

    pub fn subscribe(&mut self) -> Receiver<StorageEvent> {
        self.events.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Created in memory and never compiled to a file.
    pub fn is_temporary(&self) -> bool {
        self.loaded && self.path.is_none()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn features(&self) -> ClientFeatures {
        self.features
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn durations(&self) -> DefaultDurations {
        self.durations
    }

    pub fn set_durations(&mut self, durations: DefaultDurations) {
        self.durations = durations;
    }

    /// Last id in use for `category`.
    pub fn count(&self, category: ThingCategory) -> u32 {
        self.counts[slot(category)]
    }

    pub fn thing(&self, id: u32, category: ThingCategory) -> Option<&ThingType> {
        self.things[slot(category)].get(&id)
    }

    /// Like [`Self::thing`], but a miss yields the alert placeholder.
    pub fn get_thing(&self, id: u32, category: ThingCategory) -> Cow<'_, ThingType> {
        match self.thing(id, category) {
            Some(thing) => Cow::Borrowed(thing),
            None => {
                warn!("{} {} not found, using placeholder", category, id);
                Cow::Owned(ThingType::alert(id, category))
            }
        }
    }

    pub fn things(&self, category: ThingCategory) -> impl Iterator<Item = &ThingType> {
        self.things[slot(category)].values()
    }

    /// Every sprite id referenced by any thing.
    pub fn sprite_references(&self) -> impl Iterator<Item = u32> + '_ {
        self.things
            .iter()
            .flat_map(|map| map.values())
            .flat_map(|thing| thing.sprite_ids())
    }

    /// Rewrites every sprite reference of every thing through `map`.
    /// Returns how many references changed.
    pub fn remap_sprites(&mut self, mut map: impl FnMut(u32) -> u32) -> usize {
        let mut changed = 0;
        for thing in self.things.iter_mut().flat_map(|map| map.values_mut()) {
            thing.remap_sprites(|id| {
                let new_id = map(id);
                if new_id != id {
                    changed += 1;
                }
                new_id
            });
        }
        if changed > 0 {
            self.changed = true;
            self.events.publish(StorageEvent::Changed {
                category: None,
                ids: Vec::new(),
            });
        }
        changed
    }

    pub fn load(
        &mut self,
        path: &Path,
        version: &Version,
        features: ClientFeatures,
        progress: &dyn ProgressListener,
    ) -> Result<()> {
        if self.loaded {
            debug!("Metadata already loaded from {:?}", self.path);
            return Ok(());
        }

        let bytes = fs::read(path)?;
        let (things, counts) = decode(bytes, version, features, progress)?;
        let total: usize = things.iter().map(BTreeMap::len).sum();

        self.things = things;
        self.counts = counts;
        self.version = Some(version.clone());
        self.features = features;
        self.path = Some(path.to_path_buf());
        self.changed = false;
        self.loaded = true;
        info!("Loaded {} things ({}) from {:?}", total, version, path);
        self.events.publish(StorageEvent::Loaded);
        Ok(())
    }

    /// Starts an unsaved asset set holding one blank thing per category.
    pub fn create_new(&mut self, version: &Version, features: ClientFeatures) {
        if self.loaded {
            debug!("Metadata already loaded, not creating a new one");
            return;
        }
        for category in ThingCategory::ALL {
            let id = category.first_id();
            self.things[slot(category)] = BTreeMap::from([(id, ThingType::create(id, category))]);
            self.counts[slot(category)] = id;
        }
        self.version = Some(version.clone());
        self.features = features;
        self.path = None;
        self.changed = false;
        self.loaded = true;
        info!("Created new metadata for {}", version);
        self.events.publish(StorageEvent::Loaded);
    }

    pub fn unload(&mut self) {
        if !self.loaded {
            return;
        }
        self.things = Default::default();
        self.counts = [0; 4];
        self.version = None;
        self.features = ClientFeatures::default();
        self.path = None;
        self.changed = false;
        self.loaded = false;
        self.events.publish(StorageEvent::Unloaded);
    }

    /// Appends `things` after the last id of `category`, renumbering them.
    pub fn add_things(
        &mut self,
        things: Vec<ThingType>,
        category: ThingCategory,
    ) -> Result<ChangeResult<ThingType>> {
        self.ensure_loaded()?;
        if let Some(thing) = things.iter().find(|thing| thing.category != category) {
            return Err(StorageError::WrongCategory {
                expected: category,
                found: thing.category,
            });
        }
        if things.is_empty() {
            return Ok(ChangeResult::nothing("no things to add"));
        }

        let index = slot(category);
        let mut next = self.counts[index].max(category.first_id() - 1);
        let mut added = Vec::with_capacity(things.len());
        for mut thing in things {
            next += 1;
            thing.id = next;
            self.things[index].insert(next, thing.clone());
            added.push(thing);
        }
        self.counts[index] = next;
        self.mark_changed(category, added.iter().map(|thing| thing.id).collect());
        Ok(ChangeResult::done(added))
    }

    pub fn add_thing(
        &mut self,
        thing: ThingType,
        category: ThingCategory,
    ) -> Result<ChangeResult<ThingType>> {
        self.add_things(vec![thing], category)
    }

    /// Puts `thing` in place of `id`; the list holds the replaced record.
    pub fn replace_thing(
        &mut self,
        thing: ThingType,
        category: ThingCategory,
        id: u32,
    ) -> Result<ChangeResult<ThingType>> {
        let mut thing = thing;
        thing.id = id;
        self.replace_things(vec![thing], category)
    }

    /// Replaces each thing at its own id. Nothing is replaced unless every
    /// id is valid.
    pub fn replace_things(
        &mut self,
        things: Vec<ThingType>,
        category: ThingCategory,
    ) -> Result<ChangeResult<ThingType>> {
        self.ensure_loaded()?;
        for thing in &things {
            if thing.category != category {
                return Err(StorageError::WrongCategory {
                    expected: category,
                    found: thing.category,
                });
            }
            self.check_existing(thing.id, category)?;
        }
        if things.is_empty() {
            return Ok(ChangeResult::nothing("no things to replace"));
        }

        let index = slot(category);
        let ids: Vec<u32> = things.iter().map(|thing| thing.id).collect();
        let replaced = things
            .into_iter()
            .filter_map(|thing| self.things[index].insert(thing.id, thing))
            .collect();
        self.mark_changed(category, ids);
        Ok(ChangeResult::done(replaced))
    }

    pub fn remove_thing(
        &mut self,
        id: u32,
        category: ThingCategory,
    ) -> Result<ChangeResult<ThingType>> {
        self.remove_things(&[id], category)
    }

    /// Removes things. The last id of a category is dropped and the count
    /// shrinks; any other id keeps its slot with a blank record, so later
    /// ids do not move. The first id of a category is never dropped.
    pub fn remove_things(
        &mut self,
        ids: &[u32],
        category: ThingCategory,
    ) -> Result<ChangeResult<ThingType>> {
        self.ensure_loaded()?;
        for &id in ids {
            self.check_existing(id, category)?;
        }
        if ids.is_empty() {
            return Ok(ChangeResult::nothing("no things to remove"));
        }

        let mut ids = ids.to_vec();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();

        let index = slot(category);
        let mut removed = Vec::with_capacity(ids.len());
        for &id in &ids {
            let old = if id == self.counts[index] && id > category.first_id() {
                self.counts[index] -= 1;
                self.things[index].remove(&id)
            } else {
                self.things[index].insert(id, ThingType::create(id, category))
            };
            removed.extend(old);
        }
        self.mark_changed(category, ids);
        Ok(ChangeResult::done(removed))
    }

    /// Things of `category` matching `predicate`, in id order.
    pub fn find_things(
        &self,
        category: ThingCategory,
        mut predicate: impl FnMut(&ThingType) -> bool,
        progress: &dyn ProgressListener,
    ) -> Vec<&ThingType> {
        let label = category.as_str();
        let total = self.things[slot(category)].len() as u32;
        progress.report(Progress::new(ProgressSource::Find, 0, total).with_label(label));
        let found: Vec<&ThingType> = self
            .things(category)
            .filter(|thing| predicate(thing))
            .collect();
        progress.report(Progress::new(ProgressSource::Find, total, total).with_label(label));
        found
    }

    /// Encodes the whole store in the format of `version`.
    pub fn encode(
        &self,
        version: &Version,
        features: ClientFeatures,
        progress: &dyn ProgressListener,
    ) -> Result<Vec<u8>> {
        self.ensure_loaded()?;
        let header = MetadataHeader {
            signature: version.metadata_signature,
            item_count: self.count(ThingCategory::Item),
            outfit_count: self.count(ThingCategory::Outfit),
            effect_count: self.count(ThingCategory::Effect),
            missile_count: self.count(ThingCategory::Missile),
        };
        let total: u32 = ThingCategory::ALL
            .iter()
            .map(|&category| span(category, self.count(category)))
            .sum();

        let mut cursor = ByteCursor::with_capacity(HEADER_SIZE + total as usize * 32);
        header.write(&mut cursor)?;
        let writer = MetadataWriter::new(version.value, features, self.durations);
        let mut done = 0;
        for category in ThingCategory::ALL {
            for id in category.first_id()..=self.count(category) {
                match self.thing(id, category) {
                    Some(thing) => writer.write_thing(&mut cursor, thing)?,
                    None => {
                        warn!("{} {} missing, writing a blank record", category, id);
                        writer.write_thing(&mut cursor, &ThingType::create(id, category))?
                    }
                }
            }
            done += span(category, self.count(category));
            progress.report(
                Progress::new(ProgressSource::Metadata, done, total).with_label(category.as_str()),
            );
        }
        Ok(cursor.into_inner())
    }

    /// Writes the store to `path` in the format of `version`.
    ///
    /// An unmodified store going to another file in its own format is copied
    /// byte for byte. Otherwise the file is encoded in memory and swapped in
    /// through a temporary sibling; compiling over the file the store was
    /// loaded from reloads it afterwards.
    pub fn compile(
        &mut self,
        path: &Path,
        version: &Version,
        features: ClientFeatures,
        progress: &dyn ProgressListener,
    ) -> Result<()> {
        self.ensure_loaded()?;
        let reload = self.path.as_deref().is_some_and(|source| same_file(source, path));
        let same_format = self.version.as_ref() == Some(version) && self.features == features;

        match self.path.clone() {
            Some(source) if !self.changed && same_format && !reload => {
                info!("Copying unmodified metadata {:?} to {:?}", source, path);
                let bytes = fs::read(&source)?;
                write_atomic(path, &bytes)?;
            }
            _ => {
                let bytes = self.encode(version, features, progress)?;
                write_atomic(path, &bytes)?;
                info!("Compiled metadata ({}) to {:?}", version, path);
                if reload {
                    self.unload();
                    self.load(path, version, features, progress)?;
                }
            }
        }

        self.version = Some(version.clone());
        self.features = features;
        self.path = Some(path.to_path_buf());
        self.changed = false;
        self.events.publish(StorageEvent::Compiled(path.to_path_buf()));
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(StorageError::NotLoaded)
        }
    }

    fn check_existing(&self, id: u32, category: ThingCategory) -> Result<()> {
        let valid = id >= category.first_id()
            && id <= self.count(category)
            && self.things[slot(category)].contains_key(&id);
        if valid {
            Ok(())
        } else {
            Err(StorageError::InvalidThingId { category, id })
        }
    }

    fn mark_changed(&mut self, category: ThingCategory, ids: Vec<u32>) {
        self.changed = true;
        self.events.publish(StorageEvent::Changed {
            category: Some(category),
            ids,
        });
    }
}

type Decoded = ([BTreeMap<u32, ThingType>; 4], [u32; 4]);

fn decode(
    bytes: Vec<u8>,
    version: &Version,
    features: ClientFeatures,
    progress: &dyn ProgressListener,
) -> Result<Decoded> {
    let mut cursor = ByteCursor::from_bytes(bytes);
    let header = MetadataHeader::read(&mut cursor)?;
    if header.signature != version.metadata_signature {
        return Err(FormatError::InvalidSignature {
            expected: version.metadata_signature,
            found: header.signature,
        }
        .into());
    }

    let reader = MetadataReader::new(version.value, features);
    debug!("Reading metadata with dialect {:?}", reader.dialect());
    let total: u32 = ThingCategory::ALL
        .iter()
        .map(|&category| span(category, header.count(category)))
        .sum();

    let mut things: [BTreeMap<u32, ThingType>; 4] = Default::default();
    let mut counts = [0; 4];
    let mut done = 0;
    for category in ThingCategory::ALL {
        let last = header.count(category);
        let map = &mut things[slot(category)];
        for id in category.first_id()..=last {
            map.insert(id, reader.read_thing(&mut cursor, id, category)?);
        }
        counts[slot(category)] = last.max(category.first_id() - 1);
        done += span(category, last);
        progress.report(
            Progress::new(ProgressSource::Metadata, done, total).with_label(category.as_str()),
        );
    }

    if cursor.remaining() > 0 {
        return Err(FormatError::TrailingData {
            offset: cursor.position(),
            remaining: cursor.remaining(),
        }
        .into());
    }
    Ok((things, counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    fn version() -> Version {
        Version::new(860, "8.60", 0x4C2C7993, 0x4C220594, 20)
    }

    fn new_storage() -> ThingTypeStorage {
        let mut storage = ThingTypeStorage::new(DefaultDurations::default());
        storage.create_new(&version(), ClientFeatures::for_version(860));
        storage
    }

    #[test]
    fn create_new_holds_one_thing_per_category() {
        let storage = new_storage();
        assert!(storage.is_loaded());
        assert!(storage.is_temporary());
        assert!(!storage.is_changed());
        assert_eq!(storage.count(ThingCategory::Item), 100);
        assert_eq!(storage.count(ThingCategory::Outfit), 1);
        assert!(storage.thing(1, ThingCategory::Missile).unwrap().is_empty());
    }

    #[test]
    fn create_new_twice_is_a_no_op() {
        let mut storage = new_storage();
        storage.add_thing(ThingType::create(0, ThingCategory::Item), ThingCategory::Item).unwrap();
        storage.create_new(&version(), ClientFeatures::default());
        assert_eq!(storage.count(ThingCategory::Item), 101);
    }

    #[test]
    fn add_assigns_next_id() {
        let mut storage = new_storage();
        let events = storage.subscribe();
        let result = storage
            .add_things(
                vec![
                    ThingType::create(0, ThingCategory::Effect),
                    ThingType::create(0, ThingCategory::Effect),
                ],
                ThingCategory::Effect,
            )
            .unwrap();
        assert!(result.done);
        assert_eq!(result.list.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(storage.count(ThingCategory::Effect), 3);
        assert!(storage.is_changed());
        assert_eq!(
            events.try_recv().unwrap(),
            StorageEvent::Changed {
                category: Some(ThingCategory::Effect),
                ids: vec![2, 3]
            }
        );
    }

    #[test]
    fn add_rejects_other_category() {
        let mut storage = new_storage();
        let err = storage
            .add_thing(ThingType::create(0, ThingCategory::Outfit), ThingCategory::Item)
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::WrongCategory {
                expected: ThingCategory::Item,
                found: ThingCategory::Outfit
            }
        ));
        assert!(!storage.is_changed());
    }

    #[test]
    fn replace_returns_previous() {
        let mut storage = new_storage();
        let mut thing = ThingType::create(0, ThingCategory::Item);
        thing.stackable = true;
        let result = storage.replace_thing(thing, ThingCategory::Item, 100).unwrap();
        assert!(!result.list[0].stackable);
        assert!(storage.thing(100, ThingCategory::Item).unwrap().stackable);
    }

    #[test]
    fn replace_and_remove_validate_ids() {
        let mut storage = new_storage();
        for id in [0, 99, 101] {
            assert!(matches!(
                storage.remove_thing(id, ThingCategory::Item),
                Err(StorageError::InvalidThingId { id: bad, .. }) if bad == id
            ));
        }
        assert!(matches!(
            storage.replace_thing(
                ThingType::create(0, ThingCategory::Outfit),
                ThingCategory::Outfit,
                2
            ),
            Err(StorageError::InvalidThingId { .. })
        ));
        assert!(!storage.is_changed());
    }

    #[test]
    fn remove_last_shrinks_others_blank() {
        let mut storage = new_storage();
        let mut things = Vec::new();
        for _ in 0..3 {
            let mut thing = ThingType::create(0, ThingCategory::Item);
            thing.pickupable = true;
            things.push(thing);
        }
        storage.add_things(things, ThingCategory::Item).unwrap();
        assert_eq!(storage.count(ThingCategory::Item), 103);

        storage.remove_thing(101, ThingCategory::Item).unwrap();
        assert_eq!(storage.count(ThingCategory::Item), 103);
        assert!(!storage.thing(101, ThingCategory::Item).unwrap().pickupable);

        let result = storage.remove_things(&[102, 103], ThingCategory::Item).unwrap();
        assert_eq!(result.list.len(), 2);
        assert_eq!(storage.count(ThingCategory::Item), 101);

        // the first id only ever gets blanked
        storage.remove_thing(1, ThingCategory::Outfit).unwrap();
        assert_eq!(storage.count(ThingCategory::Outfit), 1);
    }

    #[test]
    fn missing_thing_yields_alert() {
        let storage = new_storage();
        let thing = storage.get_thing(500, ThingCategory::Item);
        assert!(matches!(thing, Cow::Owned(_)));
        assert_eq!(thing.frame_groups[0].sprite_index, vec![formats::ALERT_SPRITE_ID]);
    }

    #[test]
    fn operations_require_loaded_store() {
        let mut storage = ThingTypeStorage::default();
        assert!(matches!(
            storage.add_thing(ThingType::create(0, ThingCategory::Item), ThingCategory::Item),
            Err(StorageError::NotLoaded)
        ));
        assert!(matches!(
            storage.encode(&version(), ClientFeatures::default(), &NoProgress),
            Err(StorageError::NotLoaded)
        ));
    }

    #[test]
    fn find_filters_in_id_order() {
        let mut storage = new_storage();
        let mut ground = ThingType::create(0, ThingCategory::Item);
        ground.is_ground = true;
        storage
            .add_things(
                vec![ground.clone(), ThingType::create(0, ThingCategory::Item), ground],
                ThingCategory::Item,
            )
            .unwrap();

        let found = storage.find_things(ThingCategory::Item, |t| t.is_ground, &NoProgress);
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![101, 103]);
    }

    #[test]
    fn encoded_store_decodes_to_same_things() {
        let mut storage = new_storage();
        let mut outfit = ThingType::create(0, ThingCategory::Outfit);
        outfit.frame_groups[0].sprite_index = (1..=12).collect();
        storage.add_thing(outfit, ThingCategory::Outfit).unwrap();

        let features = ClientFeatures::for_version(860);
        let bytes = storage.encode(&version(), features, &NoProgress).unwrap();
        let (things, counts) = decode(bytes, &version(), features, &NoProgress).unwrap();
        assert_eq!(counts, [100, 2, 1, 1]);
        assert_eq!(things[1].get(&2), storage.thing(2, ThingCategory::Outfit));
    }

    #[test]
    fn trailing_bytes_fail_decode() {
        let storage = new_storage();
        let features = ClientFeatures::for_version(860);
        let mut bytes = storage.encode(&version(), features, &NoProgress).unwrap();
        let len = bytes.len() as u64;
        bytes.extend_from_slice(&[0xAB, 0xCD]);
        assert!(matches!(
            decode(bytes, &version(), features, &NoProgress),
            Err(StorageError::Format(FormatError::TrailingData { offset, remaining: 2 }))
                if offset == len
        ));
    }

    #[test]
    fn signature_mismatch_fails_decode() {
        let storage = new_storage();
        let features = ClientFeatures::for_version(860);
        let bytes = storage.encode(&version(), features, &NoProgress).unwrap();
        let other = Version::new(860, "8.60", 1, 2, 20);
        assert!(matches!(
            decode(bytes, &other, features, &NoProgress),
            Err(StorageError::Format(FormatError::InvalidSignature { expected: 1, .. }))
        ));
    }
}
