//! Sprite (SPR) file layout.
//!
//! `u32 signature`, the sprite count (`u16`, or `u32` when extended), a table
//! of `count` absolute `u32` body offsets (0 for sprites without pixels), then
//! the bodies: a three byte color marker, a `u16` length and the run list.

use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{FormatError, Result};
use crate::sprite::Sprite;

/// Legacy color key written before every sprite body.
pub const SPRITE_MARKER: [u8; 3] = [0xFF, 0x00, 0xFF];

const ADDRESS_SIZE: u64 = 4;
const BODY_HEADER_SIZE: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SprHeader {
    pub signature: u32,
    pub count: u32,
    pub extended: bool,
}

impl SprHeader {
    pub fn size(extended: bool) -> u64 {
        if extended { 8 } else { 6 }
    }

    pub fn read<R: Read>(reader: &mut R, extended: bool) -> Result<Self> {
        let signature = reader.read_u32::<LE>()?;
        let count = if extended {
            reader.read_u32::<LE>()?
        } else {
            reader.read_u16::<LE>()? as u32
        };
        Ok(Self {
            signature,
            count,
            extended,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LE>(self.signature)?;
        if self.extended {
            writer.write_u32::<LE>(self.count)?;
        } else {
            let count = u16::try_from(self.count).map_err(|_| FormatError::SpriteIdOverflow {
                id: self.count,
                bits: 16,
            })?;
            writer.write_u16::<LE>(count)?;
        }
        Ok(())
    }

    /// File offset of the address slot of sprite `id` (1-based).
    pub fn address_slot(&self, id: u32) -> u64 {
        Self::size(self.extended) + (id as u64 - 1) * ADDRESS_SIZE
    }

    /// Offset of the first sprite body.
    pub fn data_start(&self) -> u64 {
        Self::size(self.extended) + self.count as u64 * ADDRESS_SIZE
    }
}

/// Random-access reader over an open sprite file.
#[derive(Debug)]
pub struct SpriteReader<R> {
    reader: R,
    header: SprHeader,
    transparent: bool,
}

impl<R: Read + Seek> SpriteReader<R> {
    pub fn new(mut reader: R, extended: bool, transparent: bool) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = SprHeader::read(&mut reader, extended)?;
        Ok(Self {
            reader,
            header,
            transparent,
        })
    }

    pub fn header(&self) -> &SprHeader {
        &self.header
    }

    pub fn count(&self) -> u32 {
        self.header.count
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Body offset of sprite `id`; 0 when it has no pixels.
    pub fn address(&mut self, id: u32) -> Result<u32> {
        self.reader
            .seek(SeekFrom::Start(self.header.address_slot(id)))?;
        Ok(self.reader.read_u32::<LE>()?)
    }

    /// Every address in table order, index 0 holding sprite 1.
    pub fn addresses(&mut self) -> Result<Vec<u32>> {
        self.reader
            .seek(SeekFrom::Start(SprHeader::size(self.header.extended)))?;
        let mut addresses = Vec::with_capacity(self.header.count as usize);
        for _ in 0..self.header.count {
            addresses.push(self.reader.read_u32::<LE>()?);
        }
        Ok(addresses)
    }

    pub fn read_at(&mut self, id: u32, address: u32) -> Result<Sprite> {
        if address == 0 {
            return Ok(Sprite::new(id, self.transparent));
        }
        // the color marker carries no pixel data
        self.reader
            .seek(SeekFrom::Start(address as u64 + SPRITE_MARKER.len() as u64))?;
        let len = self.reader.read_u16::<LE>()? as usize;
        let mut compressed = vec![0u8; len];
        self.reader.read_exact(&mut compressed)?;
        Ok(Sprite::from_compressed(id, self.transparent, compressed))
    }

    pub fn read_sprite(&mut self, id: u32) -> Result<Sprite> {
        let address = self.address(id)?;
        self.read_at(id, address)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes a complete sprite file. `sprites[0]` is sprite 1.
///
/// Bodies are laid out in id order after the address table; sprites without
/// pixels get address 0 and no body.
pub fn write_sprite_file<W: Write>(
    writer: &mut W,
    signature: u32,
    extended: bool,
    sprites: &[Sprite],
) -> Result<()> {
    let header = SprHeader {
        signature,
        count: sprites.len() as u32,
        extended,
    };

    let mut bodies = Vec::with_capacity(sprites.len());
    let mut offset = header.data_start();
    for sprite in sprites {
        let data = sprite.compressed();
        if data.is_empty() {
            bodies.push(None);
            continue;
        }
        let len = u16::try_from(data.len()).map_err(|_| FormatError::SpriteTooLarge {
            id: sprite.id(),
            len: data.len(),
        })?;
        let address = u32::try_from(offset).map_err(|_| FormatError::FileTooLarge(offset))?;
        bodies.push(Some((address, len, data)));
        offset += BODY_HEADER_SIZE + len as u64;
    }
    if offset > u32::MAX as u64 + 1 {
        return Err(FormatError::FileTooLarge(offset));
    }

    header.write(writer)?;
    for body in &bodies {
        writer.write_u32::<LE>(body.as_ref().map_or(0, |(address, _, _)| *address))?;
    }
    for (_, len, data) in bodies.into_iter().flatten() {
        writer.write_all(&SPRITE_MARKER)?;
        writer.write_u16::<LE>(len)?;
        writer.write_all(data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::SPRITE_DATA_SIZE;
    use std::io::Cursor;

    fn colored(id: u32, rgba: [u8; 4]) -> Sprite {
        let pixels: Vec<u8> = rgba.iter().copied().cycle().take(SPRITE_DATA_SIZE).collect();
        Sprite::from_pixels(id, false, &pixels).unwrap()
    }

    #[test]
    fn layout_of_small_file() {
        let mut pixels = vec![0u8; SPRITE_DATA_SIZE];
        pixels[..4].copy_from_slice(&[1, 2, 3, 255]);
        let sprites = vec![
            Sprite::from_pixels(1, false, &pixels).unwrap(),
            Sprite::new(2, false),
        ];

        let mut out = Vec::new();
        write_sprite_file(&mut out, 0xAABBCCDD, false, &sprites).unwrap();

        let expected: Vec<u8> = [
            &[0xDD, 0xCC, 0xBB, 0xAA, 2, 0][..],
            &[14, 0, 0, 0, 0, 0, 0, 0],
            &[0xFF, 0x00, 0xFF, 7, 0],
            &[0, 0, 1, 0, 3, 2, 1],
        ]
        .concat();
        assert_eq!(out, expected);
    }

    #[test]
    fn reads_back_what_was_written() {
        let sprites = vec![
            colored(1, [0, 0, 255, 255]),
            Sprite::new(2, false),
            colored(3, [255, 0, 0, 255]),
        ];
        let mut out = Vec::new();
        write_sprite_file(&mut out, 0x1234, true, &sprites).unwrap();

        let mut reader = SpriteReader::new(Cursor::new(out), true, false).unwrap();
        assert_eq!(reader.count(), 3);
        assert_eq!(reader.header().data_start(), 8 + 12);
        assert_eq!(reader.address(2).unwrap(), 0);
        for sprite in &sprites {
            assert_eq!(&reader.read_sprite(sprite.id()).unwrap(), sprite);
        }
    }

    #[test]
    fn address_slots_follow_header_size() {
        let normal = SprHeader { signature: 0, count: 10, extended: false };
        let extended = SprHeader { signature: 0, count: 10, extended: true };
        assert_eq!(normal.address_slot(1), 6);
        assert_eq!(normal.address_slot(3), 14);
        assert_eq!(extended.address_slot(1), 8);
    }

    #[test]
    fn count_must_fit_header_field() {
        let header = SprHeader { signature: 0, count: 70_000, extended: false };
        assert!(matches!(
            header.write(&mut Vec::new()),
            Err(FormatError::SpriteIdOverflow { id: 70_000, bits: 16 })
        ));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let sprites = vec![colored(1, [9, 9, 9, 255])];
        let mut out = Vec::new();
        write_sprite_file(&mut out, 1, false, &sprites).unwrap();
        out.truncate(out.len() - 10);

        let mut reader = SpriteReader::new(Cursor::new(out), false, false).unwrap();
        assert!(matches!(reader.read_sprite(1), Err(FormatError::Io(_))));
    }
}
