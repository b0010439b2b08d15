use std::sync::OnceLock;

use crate::error::{FormatError, Result};
use crate::thing_type::ALERT_SPRITE_ID;

/// Width and height of a sprite in pixels.
pub const SPRITE_DIMENSION: usize = 32;
pub const SPRITE_PIXELS: usize = SPRITE_DIMENSION * SPRITE_DIMENSION;
/// Size of a decoded RGBA sprite.
pub const SPRITE_DATA_SIZE: usize = SPRITE_PIXELS * 4;

/// Id reserved for "no sprite".
pub const BLANK_SPRITE_ID: u32 = 0;

const RUN_HEADER_SIZE: usize = 4;

/// One 32x32 tile, kept in its compressed run-list form.
///
/// Decoded pixels and the content hash are computed on first use and cached
/// together; every pixel mutation goes through [`Sprite::set_pixels`], which
/// drops both.
#[derive(Debug, Clone, Default)]
pub struct Sprite {
    id: u32,
    transparent: bool,
    compressed: Vec<u8>,
    pixels: OnceLock<Vec<u8>>,
    hash: OnceLock<[u8; 16]>,
}

impl PartialEq for Sprite {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.transparent == other.transparent
            && self.compressed == other.compressed
    }
}

impl Eq for Sprite {}

impl Sprite {
    /// Fully transparent sprite.
    pub fn new(id: u32, transparent: bool) -> Self {
        Self {
            id,
            transparent,
            ..Default::default()
        }
    }

    pub fn from_compressed(id: u32, transparent: bool, compressed: Vec<u8>) -> Self {
        Self {
            id,
            transparent,
            compressed,
            ..Default::default()
        }
    }

    pub fn from_pixels(id: u32, transparent: bool, pixels: &[u8]) -> Result<Self> {
        let mut sprite = Self::new(id, transparent);
        sprite.set_pixels(pixels)?;
        Ok(sprite)
    }

    /// Placeholder handed out for lookups that cannot be served: a red
    /// frame with a cross through it.
    pub fn alert(transparent: bool) -> Self {
        let mut pixels = vec![0u8; SPRITE_DATA_SIZE];
        for y in 0..SPRITE_DIMENSION {
            for x in 0..SPRITE_DIMENSION {
                let edge = x < 2 || y < 2 || x >= SPRITE_DIMENSION - 2 || y >= SPRITE_DIMENSION - 2;
                let cross = x == y || x + y == SPRITE_DIMENSION - 1;
                if edge || cross {
                    let offset = (y * SPRITE_DIMENSION + x) * 4;
                    pixels[offset..offset + 4].copy_from_slice(&[0xFF, 0x00, 0x00, 0xFF]);
                }
            }
        }
        Self {
            id: ALERT_SPRITE_ID,
            transparent,
            compressed: compress_pixels(&pixels, transparent),
            pixels: OnceLock::from(pixels),
            hash: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }

    pub fn into_compressed(self) -> Vec<u8> {
        self.compressed
    }

    /// Decoded RGBA pixels, always [`SPRITE_DATA_SIZE`] bytes.
    pub fn pixels(&self) -> &[u8] {
        self.pixels
            .get_or_init(|| decompress(&self.compressed, self.transparent))
    }

    pub fn set_pixels(&mut self, pixels: &[u8]) -> Result<()> {
        self.compressed = compress(pixels, self.transparent)?;
        self.pixels = OnceLock::from(pixels.to_vec());
        self.hash = OnceLock::new();
        Ok(())
    }

    /// Digest of the compressed bytes. Equal pixels stored with different
    /// transparency hash differently.
    pub fn hash(&self) -> [u8; 16] {
        *self.hash.get_or_init(|| md5::compute(&self.compressed).0)
    }

    /// True when no pixel carries color.
    pub fn is_empty(&self) -> bool {
        self.compressed.is_empty() || self.pixels().iter().all(|&byte| byte == 0)
    }

    /// Re-encodes the sprite for the other alpha mode. Alpha is lost when
    /// converting to an opaque sprite.
    pub fn with_transparency(&self, transparent: bool) -> Self {
        if transparent == self.transparent {
            return self.clone();
        }
        let pixels = self.pixels().to_vec();
        Self {
            id: self.id,
            transparent,
            compressed: compress_pixels(&pixels, transparent),
            pixels: OnceLock::new(),
            hash: OnceLock::new(),
        }
    }
}

/// Encodes RGBA pixels into the run list.
///
/// Each run is `[u16 transparent][u16 colored]` followed by the colored
/// pixels as B, G, R and, for transparent sprites, A. A pixel is transparent
/// only when all four bytes are zero. The trailing transparent run is never
/// written, so a blank sprite encodes to nothing.
pub fn compress(pixels: &[u8], transparent: bool) -> Result<Vec<u8>> {
    if pixels.len() != SPRITE_DATA_SIZE {
        return Err(FormatError::InvalidPixelBuffer {
            expected: SPRITE_DATA_SIZE,
            len: pixels.len(),
        });
    }
    Ok(compress_pixels(pixels, transparent))
}

fn compress_pixels(pixels: &[u8], transparent: bool) -> Vec<u8> {
    let is_clear = |index: usize| pixels[index * 4..index * 4 + 4] == [0, 0, 0, 0];
    let mut out = Vec::new();
    let mut index = 0;

    while index < SPRITE_PIXELS {
        let clear_start = index;
        while index < SPRITE_PIXELS && is_clear(index) {
            index += 1;
        }
        if index == SPRITE_PIXELS {
            break;
        }
        let colored_start = index;
        while index < SPRITE_PIXELS && !is_clear(index) {
            index += 1;
        }

        out.extend_from_slice(&((colored_start - clear_start) as u16).to_le_bytes());
        out.extend_from_slice(&((index - colored_start) as u16).to_le_bytes());
        for pixel in pixels[colored_start * 4..index * 4].chunks_exact(4) {
            out.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
            if transparent {
                out.push(pixel[3]);
            }
        }
    }
    out
}

/// Decodes a run list into exactly [`SPRITE_DATA_SIZE`] bytes of RGBA.
///
/// Never fails: runs past the last pixel are clipped, a truncated run stops
/// decoding, and whatever was not covered stays transparent.
pub fn decompress(data: &[u8], transparent: bool) -> Vec<u8> {
    let channels = if transparent { 4 } else { 3 };
    let mut pixels = vec![0u8; SPRITE_DATA_SIZE];
    let mut read = 0;
    let mut written = 0;

    'runs: while read + RUN_HEADER_SIZE <= data.len() && written < SPRITE_PIXELS {
        let clear = u16::from_le_bytes([data[read], data[read + 1]]) as usize;
        let colored = u16::from_le_bytes([data[read + 2], data[read + 3]]) as usize;
        read += RUN_HEADER_SIZE;
        written = (written + clear).min(SPRITE_PIXELS);

        for _ in 0..colored {
            if written >= SPRITE_PIXELS || read + channels > data.len() {
                break 'runs;
            }
            let source = &data[read..read + channels];
            let offset = written * 4;
            pixels[offset] = source[2];
            pixels[offset + 1] = source[1];
            pixels[offset + 2] = source[0];
            pixels[offset + 3] = if transparent { source[3] } else { 0xFF };
            read += channels;
            written += 1;
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter().copied().cycle().take(SPRITE_DATA_SIZE).collect()
    }

    #[test]
    fn blank_sprite_compresses_to_nothing() {
        let pixels = vec![0u8; SPRITE_DATA_SIZE];
        assert!(compress(&pixels, true).unwrap().is_empty());
        assert_eq!(decompress(&[], true), pixels);
        assert!(Sprite::new(7, false).is_empty());
    }

    #[test]
    fn colored_bytes_are_stored_blue_first() {
        let mut pixels = vec![0u8; SPRITE_DATA_SIZE];
        pixels[..4].copy_from_slice(&[1, 2, 3, 4]);

        assert_eq!(compress(&pixels, true).unwrap(), [0, 0, 1, 0, 3, 2, 1, 4]);
        assert_eq!(compress(&pixels, false).unwrap(), [0, 0, 1, 0, 3, 2, 1]);
    }

    #[test]
    fn interior_gaps_become_runs() {
        let mut pixels = vec![0u8; SPRITE_DATA_SIZE];
        pixels[..4].copy_from_slice(&[9, 9, 9, 255]);
        pixels[40..44].copy_from_slice(&[5, 6, 7, 255]);

        let data = compress(&pixels, true).unwrap();
        assert_eq!(
            data,
            [0, 0, 1, 0, 9, 9, 9, 255, 9, 0, 1, 0, 7, 6, 5, 255]
        );
        assert_eq!(decompress(&data, true), pixels);
    }

    #[test]
    fn opaque_sprites_drop_alpha() {
        let pixels = solid([10, 20, 30, 128]);
        let data = compress(&pixels, false).unwrap();
        assert_eq!(data.len(), RUN_HEADER_SIZE + SPRITE_PIXELS * 3);

        let decoded = decompress(&data, false);
        assert_eq!(&decoded[..4], &[10, 20, 30, 255]);
        assert_eq!(decoded.len(), SPRITE_DATA_SIZE);
    }

    #[test]
    fn short_run_list_is_padded() {
        let decoded = decompress(&[2, 0, 1, 0, 3, 2, 1, 4], true);
        assert_eq!(decoded.len(), SPRITE_DATA_SIZE);
        assert_eq!(&decoded[8..12], &[1, 2, 3, 4]);
        assert!(decoded[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn malformed_run_lists_still_yield_full_buffer() {
        // colored count far beyond the data
        let truncated = [0, 0, 0xFF, 0xFF, 1, 2, 3, 4, 5];
        assert_eq!(decompress(&truncated, true).len(), SPRITE_DATA_SIZE);

        // transparent run past the end
        let overlong = [0xFF, 0xFF, 1, 0, 1, 2, 3, 4];
        assert_eq!(decompress(&overlong, true), vec![0u8; SPRITE_DATA_SIZE]);

        // dangling half header
        assert_eq!(decompress(&[1, 0, 1], false).len(), SPRITE_DATA_SIZE);
    }

    #[test]
    fn rejects_wrong_pixel_length() {
        let err = compress(&[0u8; 100], true).unwrap_err();
        assert!(matches!(
            err,
            FormatError::InvalidPixelBuffer { expected: SPRITE_DATA_SIZE, len: 100 }
        ));
    }

    #[test]
    fn hash_depends_on_transparency() {
        let pixels = solid([0, 0, 255, 255]);
        let opaque = Sprite::from_pixels(1, false, &pixels).unwrap();
        let alpha = Sprite::from_pixels(2, true, &pixels).unwrap();
        assert_eq!(opaque.pixels(), alpha.pixels());
        assert_ne!(opaque.hash(), alpha.hash());
    }

    #[test]
    fn set_pixels_refreshes_hash() {
        let mut sprite = Sprite::from_pixels(1, true, &solid([0, 0, 255, 255])).unwrap();
        let before = sprite.hash();
        sprite.set_pixels(&solid([255, 0, 0, 255])).unwrap();
        assert_ne!(sprite.hash(), before);
        assert_eq!(&sprite.pixels()[..4], &[255, 0, 0, 255]);
        assert!(!sprite.is_empty());
    }

    #[test]
    fn converting_transparency_keeps_color() {
        let sprite = Sprite::from_pixels(3, true, &solid([1, 2, 3, 255])).unwrap();
        let opaque = sprite.with_transparency(false);
        assert!(!opaque.is_transparent());
        assert_eq!(opaque.pixels(), sprite.pixels());
        assert_ne!(opaque.compressed(), sprite.compressed());
    }

    #[test]
    fn alert_sprite_is_visible() {
        let alert = Sprite::alert(false);
        assert_eq!(alert.id(), ALERT_SPRITE_ID);
        assert!(!alert.is_empty());
        assert_eq!(decompress(alert.compressed(), false), alert.pixels());
    }
}
