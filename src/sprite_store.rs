use crossbeam_channel::Receiver;
use formats::{
    BLANK_SPRITE_ID, ClientFeatures, FormatError, Sprite, SpriteReader, Version, write_sprite_file,
};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::atomic_file::{same_file, write_atomic};
use crate::error::{Result, StorageError};
use crate::events::{ChangeResult, EventBus, StorageEvent};
use crate::progress::{CancelToken, Progress, ProgressListener, ProgressSource};

/// Sprites between two progress reports while compiling.
const PROGRESS_STEP: usize = 4096;

type FileReader = SpriteReader<BufReader<File>>;

/// One slot of the sprite map.
#[derive(Debug, Clone)]
enum SpriteEntry {
    /// Still in the source file, decoded on first access.
    Backed { address: u32 },
    Materialized(Sprite),
}

/// All sprites of one sprite file. Index `i` of the map holds sprite `i + 1`.
#[derive(Debug, Default)]
pub struct SpriteStorage {
    entries: Vec<SpriteEntry>,
    source: Option<FileReader>,
    blank: Sprite,
    alert: Sprite,
    version: Option<Version>,
    features: ClientFeatures,
    path: Option<PathBuf>,
    changed: bool,
    loaded: bool,
    events: EventBus,
}

impl SpriteStorage {
    pub fn new() -> Self {
        Self::default()
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

    pub fn is_temporary(&self) -> bool {
        self.loaded && self.path.is_none()
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn features(&self) -> ClientFeatures {
        self.features
    }

    pub fn is_transparent(&self) -> bool {
        self.features.transparency
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Highest sprite id.
    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn load(
        &mut self,
        path: &Path,
        version: &Version,
        features: ClientFeatures,
        progress: &dyn ProgressListener,
    ) -> Result<()> {
        if self.loaded {
            debug!("Sprites already loaded from {:?}", self.path);
            return Ok(());
        }
        self.open(path, version, features)?;
        self.loaded = true;
        progress.report(Progress::new(ProgressSource::Sprites, self.count(), self.count()));
        info!("Loaded {} sprites ({}) from {:?}", self.count(), version, path);
        self.events.publish(StorageEvent::Loaded);
        Ok(())
    }

    /// Points the store at `path`, replacing the map with the file's address
    /// table. Nothing changes when the file cannot be opened.
    fn open(&mut self, path: &Path, version: &Version, features: ClientFeatures) -> Result<()> {
        let file = File::open(path)?;
        let mut reader =
            SpriteReader::new(BufReader::new(file), features.extended, features.transparency)?;
        let signature = reader.header().signature;
        if signature != version.sprite_signature {
            return Err(FormatError::InvalidSignature {
                expected: version.sprite_signature,
                found: signature,
            }
            .into());
        }
        let entries = reader
            .addresses()?
            .into_iter()
            .map(|address| SpriteEntry::Backed { address })
            .collect();

        self.entries = entries;
        self.source = Some(reader);
        self.reset_placeholders(features.transparency);
        self.version = Some(version.clone());
        self.features = features;
        self.path = Some(path.to_path_buf());
        self.changed = false;
        Ok(())
    }

    /// Starts an unsaved sprite set holding a single blank sprite.
    pub fn create_new(&mut self, version: &Version, features: ClientFeatures) {
        if self.loaded {
            debug!("Sprites already loaded, not creating new ones");
            return;
        }
        self.entries = vec![SpriteEntry::Materialized(Sprite::new(1, features.transparency))];
        self.source = None;
        self.reset_placeholders(features.transparency);
        self.version = Some(version.clone());
        self.features = features;
        self.path = None;
        self.changed = false;
        self.loaded = true;
        info!("Created new sprites for {}", version);
        self.events.publish(StorageEvent::Loaded);
    }

    pub fn unload(&mut self) {
        if !self.loaded {
            return;
        }
        self.entries.clear();
        self.source = None;
        self.version = None;
        self.features = ClientFeatures::default();
        self.path = None;
        self.changed = false;
        self.loaded = false;
        self.events.publish(StorageEvent::Unloaded);
    }

    fn reset_placeholders(&mut self, transparent: bool) {
        self.blank = Sprite::new(BLANK_SPRITE_ID, transparent);
        self.alert = Sprite::alert(transparent);
    }

    /// Decodes sprite `id` from the source file if it is not in memory yet.
    fn materialize(&mut self, id: u32) -> Result<()> {
        let index = self.index(id)?;
        let address = match &self.entries[index] {
            SpriteEntry::Materialized(_) => return Ok(()),
            SpriteEntry::Backed { address } => *address,
        };
        let source = self.source.as_mut().ok_or(StorageError::NotLoaded)?;
        let sprite = source.read_at(id, address)?;
        self.entries[index] = SpriteEntry::Materialized(sprite);
        Ok(())
    }

    fn index(&self, id: u32) -> Result<usize> {
        if id == BLANK_SPRITE_ID || id > self.count() {
            return Err(StorageError::InvalidSpriteId { id });
        }
        Ok(id as usize - 1)
    }

    /// Sprite `id`, read from the source file when needed. Id 0 is the blank
    /// sprite.
    pub fn try_sprite(&mut self, id: u32) -> Result<&Sprite> {
        if id == BLANK_SPRITE_ID {
            return Ok(&self.blank);
        }
        self.materialize(id)?;
        match &self.entries[id as usize - 1] {
            SpriteEntry::Materialized(sprite) => Ok(sprite),
            SpriteEntry::Backed { .. } => Err(StorageError::InvalidSpriteId { id }),
        }
    }

    /// Like [`Self::try_sprite`], but an unknown or unreadable sprite yields
    /// the alert placeholder.
    pub fn sprite(&mut self, id: u32) -> &Sprite {
        if id == BLANK_SPRITE_ID {
            return &self.blank;
        }
        if let Err(e) = self.materialize(id) {
            warn!("Sprite {} unavailable, using placeholder: {}", id, e);
            return &self.alert;
        }
        match &self.entries[id as usize - 1] {
            SpriteEntry::Materialized(sprite) => sprite,
            SpriteEntry::Backed { .. } => &self.alert,
        }
    }

    /// True for id 0 and for sprites without colored pixels.
    pub fn is_empty_sprite(&mut self, id: u32) -> Result<bool> {
        Ok(self.try_sprite(id)?.is_empty())
    }

    pub fn add_sprite(&mut self, pixels: &[u8]) -> Result<ChangeResult<Sprite>> {
        let sprite = Sprite::from_pixels(0, self.is_transparent(), pixels)?;
        self.add_sprites(vec![sprite])
    }

    pub fn add_sprite_data(&mut self, sprite: Sprite) -> Result<ChangeResult<Sprite>> {
        self.add_sprites(vec![sprite])
    }

    /// Appends sprites after the last id, converting them to this store's
    /// alpha mode. The list holds the stored sprites with their new ids.
    pub fn add_sprites(&mut self, sprites: Vec<Sprite>) -> Result<ChangeResult<Sprite>> {
        self.ensure_loaded()?;
        if sprites.is_empty() {
            return Ok(ChangeResult::nothing("no sprites to add"));
        }
        self.check_capacity(sprites.len())?;

        let first = self.count() + 1;
        let added: Vec<Sprite> = sprites
            .iter()
            .zip(first..)
            .map(|(sprite, id)| {
                let mut sprite = sprite.with_transparency(self.is_transparent());
                sprite.set_id(id);
                sprite
            })
            .collect();
        self.entries
            .extend(added.iter().cloned().map(SpriteEntry::Materialized));
        self.mark_changed((first..=self.count()).collect());
        Ok(ChangeResult::done(added))
    }

    fn check_capacity(&self, additional: usize) -> Result<()> {
        let last = self.entries.len() + additional;
        if !self.features.extended && last > u16::MAX as usize {
            return Err(FormatError::SpriteIdOverflow {
                id: last as u32,
                bits: 16,
            }
            .into());
        }
        Ok(())
    }

    /// Replaces the pixels of sprite `id`; the list holds the old sprite.
    pub fn replace_sprite(&mut self, id: u32, pixels: &[u8]) -> Result<ChangeResult<Sprite>> {
        let sprite = Sprite::from_pixels(id, self.is_transparent(), pixels)?;
        self.replace_sprites(vec![sprite])
    }

    /// Replaces each sprite at its own id. Nothing is replaced unless every
    /// id is valid.
    pub fn replace_sprites(&mut self, sprites: Vec<Sprite>) -> Result<ChangeResult<Sprite>> {
        self.ensure_loaded()?;
        for sprite in &sprites {
            self.index(sprite.id())?;
        }
        if sprites.is_empty() {
            return Ok(ChangeResult::nothing("no sprites to replace"));
        }

        let mut previous = Vec::with_capacity(sprites.len());
        for sprite in &sprites {
            previous.push(self.try_sprite(sprite.id())?.clone());
        }
        let ids: Vec<u32> = sprites.iter().map(Sprite::id).collect();
        for sprite in sprites {
            let index = sprite.id() as usize - 1;
            self.entries[index] =
                SpriteEntry::Materialized(sprite.with_transparency(self.is_transparent()));
        }
        self.mark_changed(ids);
        Ok(ChangeResult::done(previous))
    }

    pub fn remove_sprite(&mut self, id: u32) -> Result<ChangeResult<Sprite>> {
        self.remove_sprites(&[id])
    }

    /// Removes sprites. The last id shrinks the store; any other id is
    /// blanked so later ids keep their numbers.
    pub fn remove_sprites(&mut self, ids: &[u32]) -> Result<ChangeResult<Sprite>> {
        self.ensure_loaded()?;
        for &id in ids {
            self.index(id)?;
        }
        if ids.is_empty() {
            return Ok(ChangeResult::nothing("no sprites to remove"));
        }

        let mut ids = ids.to_vec();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();

        let mut removed = Vec::with_capacity(ids.len());
        for &id in &ids {
            removed.push(self.try_sprite(id)?.clone());
        }
        for &id in &ids {
            if id == self.count() && id > 1 {
                self.entries.pop();
            } else {
                self.entries[id as usize - 1] =
                    SpriteEntry::Materialized(Sprite::new(id, self.is_transparent()));
            }
        }
        self.mark_changed(ids);
        Ok(ChangeResult::done(removed))
    }

    /// Appends one sprite per pixel buffer. When `cancel` fires the sprites
    /// added so far are dropped again.
    pub fn import_sprites(
        &mut self,
        batch: &[Vec<u8>],
        cancel: &CancelToken,
    ) -> Result<ChangeResult<Sprite>> {
        self.ensure_loaded()?;
        self.check_capacity(batch.len())?;
        let transparent = self.is_transparent();
        self.import(batch.len(), cancel, |index, id| {
            Ok(Sprite::from_pixels(id, transparent, &batch[index])?)
        })
    }

    /// Appends sprites `ids` of another sprite file. When `cancel` fires the
    /// sprites added so far are dropped again.
    pub fn import_from_file(
        &mut self,
        path: &Path,
        version: &Version,
        features: ClientFeatures,
        ids: &[u32],
        cancel: &CancelToken,
    ) -> Result<ChangeResult<Sprite>> {
        self.ensure_loaded()?;
        self.check_capacity(ids.len())?;
        let file = File::open(path)?;
        let mut reader =
            SpriteReader::new(BufReader::new(file), features.extended, features.transparency)?;
        if reader.header().signature != version.sprite_signature {
            return Err(FormatError::InvalidSignature {
                expected: version.sprite_signature,
                found: reader.header().signature,
            }
            .into());
        }
        let count = reader.count();
        let transparent = self.is_transparent();
        self.import(ids.len(), cancel, |index, id| {
            let source_id = ids[index];
            if source_id == BLANK_SPRITE_ID || source_id > count {
                return Err(StorageError::InvalidSpriteId { id: source_id });
            }
            let mut sprite = reader.read_sprite(source_id)?.with_transparency(transparent);
            sprite.set_id(id);
            Ok(sprite)
        })
    }

    fn import(
        &mut self,
        len: usize,
        cancel: &CancelToken,
        mut next: impl FnMut(usize, u32) -> Result<Sprite>,
    ) -> Result<ChangeResult<Sprite>> {
        if len == 0 {
            return Ok(ChangeResult::nothing("no sprites to import"));
        }
        let start = self.entries.len();
        for index in 0..len {
            if cancel.is_cancelled() {
                info!("Sprite import cancelled after {} sprites", index);
                self.entries.truncate(start);
                return Err(StorageError::Cancelled);
            }
            match next(index, self.count() + 1) {
                Ok(sprite) => self.entries.push(SpriteEntry::Materialized(sprite)),
                Err(e) => {
                    self.entries.truncate(start);
                    return Err(e);
                }
            }
        }

        let added = self.entries[start..]
            .iter()
            .filter_map(|entry| match entry {
                SpriteEntry::Materialized(sprite) => Some(sprite.clone()),
                SpriteEntry::Backed { .. } => None,
            })
            .collect();
        self.mark_changed((start as u32 + 1..=self.count()).collect());
        Ok(ChangeResult::done(added))
    }

    /// Ids of the sprites matching `predicate`, in id order.
    pub fn find_sprites(
        &mut self,
        mut predicate: impl FnMut(u32, &Sprite) -> bool,
        progress: &dyn ProgressListener,
    ) -> Result<Vec<u32>> {
        let total = self.count();
        let mut found = Vec::new();
        for id in 1..=total {
            if predicate(id, self.try_sprite(id)?) {
                found.push(id);
            }
            if id as usize % PROGRESS_STEP == 0 {
                progress.report(Progress::new(ProgressSource::Find, id, total));
            }
        }
        progress.report(Progress::new(ProgressSource::Find, total, total));
        Ok(found)
    }

    /// Rebuilds the map from `ids` in the given order: `ids[0]` becomes
    /// sprite 1, and every id not listed is dropped.
    pub fn retain_in_order(&mut self, ids: &[u32]) -> Result<()> {
        self.ensure_loaded()?;
        for &id in ids {
            self.index(id)?;
        }
        let mut entries = Vec::with_capacity(ids.len());
        for (new_id, &id) in (1u32..).zip(ids) {
            let entry = match &self.entries[id as usize - 1] {
                // the address does not depend on the id
                SpriteEntry::Backed { address } => SpriteEntry::Backed { address: *address },
                SpriteEntry::Materialized(sprite) => {
                    let mut sprite = sprite.clone();
                    sprite.set_id(new_id);
                    SpriteEntry::Materialized(sprite)
                }
            };
            entries.push(entry);
        }
        debug!("Compacted sprites from {} to {}", self.count(), entries.len());
        self.entries = entries;
        self.mark_changed(Vec::new());
        Ok(())
    }

    /// Every sprite in id order, converted to `transparent`.
    fn collect_sprites(
        &mut self,
        transparent: bool,
        progress: &dyn ProgressListener,
    ) -> Result<Vec<Sprite>> {
        let total = self.count();
        let mut sprites = Vec::with_capacity(total as usize);
        for id in 1..=total {
            sprites.push(self.try_sprite(id)?.with_transparency(transparent));
            if id as usize % PROGRESS_STEP == 0 {
                progress.report(Progress::new(ProgressSource::Sprites, id, total));
            }
        }
        progress.report(Progress::new(ProgressSource::Sprites, total, total));
        Ok(sprites)
    }

    /// Writes the store to `path` in the format of `version`, then reopens
    /// the store from the written file.
    ///
    /// An unmodified store going to another file in its own format is copied
    /// byte for byte; otherwise the file is encoded in memory and swapped in
    /// through a temporary sibling.
    pub fn compile(
        &mut self,
        path: &Path,
        version: &Version,
        features: ClientFeatures,
        progress: &dyn ProgressListener,
    ) -> Result<()> {
        self.ensure_loaded()?;
        let overwrite = self.path.as_deref().is_some_and(|source| same_file(source, path));
        let same_format = self.version.as_ref() == Some(version) && self.features == features;

        match self.path.clone() {
            Some(source) if !self.changed && same_format && !overwrite => {
                info!("Copying unmodified sprites {:?} to {:?}", source, path);
                let bytes = fs::read(&source)?;
                write_atomic(path, &bytes)?;
            }
            _ => {
                let sprites = self.collect_sprites(features.transparency, progress)?;
                let mut bytes = Vec::new();
                write_sprite_file(
                    &mut bytes,
                    version.sprite_signature,
                    features.extended,
                    &sprites,
                )?;
                // the source file is about to be replaced
                if overwrite {
                    self.source = None;
                }
                write_atomic(path, &bytes)?;
                info!("Compiled {} sprites ({}) to {:?}", sprites.len(), version, path);
            }
        }

        self.open(path, version, features)?;
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

    fn mark_changed(&mut self, ids: Vec<u32>) {
        self.changed = true;
        self.events.publish(StorageEvent::Changed {
            category: None,
            ids,
        });
    }
}
