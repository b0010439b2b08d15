#![allow(dead_code)]

use formats::{ClientFeatures, SPRITE_DATA_SIZE, ThingCategory, ThingType, Version};
use std::path::PathBuf;
use tempfile::TempDir;
use thingforge_lib::{NoProgress, SpriteStorage, ThingTypeStorage};

pub fn v860() -> Version {
    Version::new(860, "Client 8.60", 0x4C2C7993, 0x4C220594, 20)
}

pub fn v960() -> Version {
    Version::new(960, "Client 9.60", 0x4E12DAFF, 0x4E12DB27, 30)
}

pub fn v1050() -> Version {
    Version::new(1050, "Client 10.50", 0x42A1, 0x5437E5C4, 50)
}

/// A 32x32 sprite of one opaque color.
pub fn solid(r: u8, g: u8, b: u8) -> Vec<u8> {
    [r, g, b, 0xFF].repeat(SPRITE_DATA_SIZE / 4)
}

/// An item showing `sprites` as consecutive frames.
pub fn animated_item(sprites: Vec<u32>) -> ThingType {
    let mut thing = ThingType::create(0, ThingCategory::Item);
    let group = &mut thing.frame_groups[0];
    group.frames = sprites.len() as u8;
    group.sprite_index = sprites;
    thing
}

/// A client pair built in memory and written to a scratch directory.
pub struct TestClient {
    pub dir: TempDir,
    pub version: Version,
    pub features: ClientFeatures,
    pub things: ThingTypeStorage,
    pub sprites: SpriteStorage,
}

impl TestClient {
    pub fn new(version: Version) -> Self {
        let features = ClientFeatures::for_version(version.value);
        Self::with_features(version, features)
    }

    pub fn with_features(version: Version, features: ClientFeatures) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut things = ThingTypeStorage::default();
        things.create_new(&version, features);
        let mut sprites = SpriteStorage::new();
        sprites.create_new(&version, features);
        Self {
            dir,
            version,
            features,
            things,
            sprites,
        }
    }

    pub fn dat(&self) -> PathBuf {
        self.dir.path().join("Tibia.dat")
    }

    pub fn spr(&self) -> PathBuf {
        self.dir.path().join("Tibia.spr")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Adds one sprite per color and returns their ids.
    pub fn add_sprites(&mut self, colors: &[[u8; 3]]) -> Vec<u32> {
        colors
            .iter()
            .map(|&[r, g, b]| self.sprites.add_sprite(&solid(r, g, b)).unwrap().list[0].id())
            .collect()
    }

    pub fn add_item(&mut self, thing: ThingType) -> u32 {
        self.things
            .add_thing(thing, ThingCategory::Item)
            .unwrap()
            .list[0]
            .id
    }

    /// Compiles both stores to `Tibia.dat` and `Tibia.spr`.
    pub fn save(&mut self) {
        let (dat, spr) = (self.dat(), self.spr());
        self.things
            .compile(&dat, &self.version, self.features, &NoProgress)
            .unwrap();
        self.sprites
            .compile(&spr, &self.version, self.features, &NoProgress)
            .unwrap();
    }

    /// Fresh stores loaded from the saved files.
    pub fn reload(&self) -> (ThingTypeStorage, SpriteStorage) {
        let mut things = ThingTypeStorage::default();
        things
            .load(&self.dat(), &self.version, self.features, &NoProgress)
            .unwrap();
        let mut sprites = SpriteStorage::new();
        sprites
            .load(&self.spr(), &self.version, self.features, &NoProgress)
            .unwrap();
        (things, sprites)
    }
}
