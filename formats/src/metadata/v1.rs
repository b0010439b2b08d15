//! Flags of clients 7.10 - 7.30.

use super::{LAST_FLAG, unknown_flag};
use crate::cursor::ByteCursor;
use crate::error::Result;
use crate::thing_type::ThingType;

mod flag {
    pub const GROUND: u8 = 0x00;
    pub const ON_BOTTOM: u8 = 0x01;
    pub const ON_TOP: u8 = 0x02;
    pub const CONTAINER: u8 = 0x03;
    pub const STACKABLE: u8 = 0x04;
    pub const MULTI_USE: u8 = 0x05;
    pub const FORCE_USE: u8 = 0x06;
    pub const WRITABLE: u8 = 0x07;
    pub const WRITABLE_ONCE: u8 = 0x08;
    pub const FLUID_CONTAINER: u8 = 0x09;
    pub const FLUID: u8 = 0x0A;
    pub const UNPASSABLE: u8 = 0x0B;
    pub const UNMOVEABLE: u8 = 0x0C;
    pub const BLOCK_MISSILE: u8 = 0x0D;
    pub const BLOCK_PATHFIND: u8 = 0x0E;
    pub const PICKUPABLE: u8 = 0x0F;
    pub const HAS_LIGHT: u8 = 0x10;
    pub const FLOOR_CHANGE: u8 = 0x11;
    pub const FULL_GROUND: u8 = 0x12;
    pub const HAS_ELEVATION: u8 = 0x13;
    pub const HAS_OFFSET: u8 = 0x14;
    pub const MINI_MAP: u8 = 0x16;
    pub const ROTATABLE: u8 = 0x17;
    pub const LYING_OBJECT: u8 = 0x18;
    pub const ANIMATE_ALWAYS: u8 = 0x19;
    pub const LENS_HELP: u8 = 0x1A;
}

/// Offset these clients apply to every displaced thing.
pub(super) const FIXED_OFFSET: i16 = 8;

pub(super) fn read_properties(cursor: &mut ByteCursor, thing: &mut ThingType) -> Result<()> {
    let mut previous = LAST_FLAG;
    loop {
        let flag = cursor.read_u8()?;
        match flag {
            LAST_FLAG => return Ok(()),
            flag::GROUND => {
                thing.is_ground = true;
                thing.ground_speed = cursor.read_u16()?;
            }
            flag::ON_BOTTOM => thing.is_on_bottom = true,
            flag::ON_TOP => thing.is_on_top = true,
            flag::CONTAINER => thing.is_container = true,
            flag::STACKABLE => thing.stackable = true,
            flag::MULTI_USE => thing.multi_use = true,
            flag::FORCE_USE => thing.force_use = true,
            flag::WRITABLE => {
                thing.writable = true;
                thing.max_text_length = cursor.read_u16()?;
            }
            flag::WRITABLE_ONCE => {
                thing.writable_once = true;
                thing.max_text_length = cursor.read_u16()?;
            }
            flag::FLUID_CONTAINER => thing.is_fluid_container = true,
            flag::FLUID => thing.is_fluid = true,
            flag::UNPASSABLE => thing.is_unpassable = true,
            flag::UNMOVEABLE => thing.is_unmoveable = true,
            flag::BLOCK_MISSILE => thing.block_missile = true,
            flag::BLOCK_PATHFIND => thing.block_pathfind = true,
            flag::PICKUPABLE => thing.pickupable = true,
            flag::HAS_LIGHT => {
                thing.has_light = true;
                thing.light_level = cursor.read_u16()?;
                thing.light_color = cursor.read_u16()?;
            }
            flag::FLOOR_CHANGE => thing.floor_change = true,
            flag::FULL_GROUND => thing.is_full_ground = true,
            flag::HAS_ELEVATION => {
                thing.has_elevation = true;
                thing.elevation = cursor.read_u16()?;
            }
            flag::HAS_OFFSET => {
                thing.has_offset = true;
                thing.offset_x = FIXED_OFFSET;
                thing.offset_y = FIXED_OFFSET;
            }
            flag::MINI_MAP => {
                thing.mini_map = true;
                thing.mini_map_color = cursor.read_u16()?;
            }
            flag::ROTATABLE => thing.rotatable = true,
            flag::LYING_OBJECT => thing.is_lying_object = true,
            flag::ANIMATE_ALWAYS => thing.animate_always = true,
            flag::LENS_HELP => {
                thing.is_lens_help = true;
                thing.lens_help = cursor.read_u16()?;
            }
            _ => return Err(unknown_flag(flag, previous, thing)),
        }
        previous = flag;
    }
}

pub(super) fn write_properties(cursor: &mut ByteCursor, thing: &ThingType) -> Result<()> {
    if thing.is_ground {
        cursor.write_u8(flag::GROUND);
        cursor.write_u16(thing.ground_speed);
    }
    if thing.is_on_bottom {
        cursor.write_u8(flag::ON_BOTTOM);
    }
    if thing.is_on_top {
        cursor.write_u8(flag::ON_TOP);
    }
    if thing.is_container {
        cursor.write_u8(flag::CONTAINER);
    }
    if thing.stackable {
        cursor.write_u8(flag::STACKABLE);
    }
    if thing.multi_use {
        cursor.write_u8(flag::MULTI_USE);
    }
    if thing.force_use {
        cursor.write_u8(flag::FORCE_USE);
    }
    if thing.writable {
        cursor.write_u8(flag::WRITABLE);
        cursor.write_u16(thing.max_text_length);
    }
    if thing.writable_once {
        cursor.write_u8(flag::WRITABLE_ONCE);
        cursor.write_u16(thing.max_text_length);
    }
    if thing.is_fluid_container {
        cursor.write_u8(flag::FLUID_CONTAINER);
    }
    if thing.is_fluid {
        cursor.write_u8(flag::FLUID);
    }
    if thing.is_unpassable {
        cursor.write_u8(flag::UNPASSABLE);
    }
    if thing.is_unmoveable {
        cursor.write_u8(flag::UNMOVEABLE);
    }
    if thing.block_missile {
        cursor.write_u8(flag::BLOCK_MISSILE);
    }
    if thing.block_pathfind {
        cursor.write_u8(flag::BLOCK_PATHFIND);
    }
    if thing.pickupable {
        cursor.write_u8(flag::PICKUPABLE);
    }
    if thing.has_light {
        cursor.write_u8(flag::HAS_LIGHT);
        cursor.write_u16(thing.light_level);
        cursor.write_u16(thing.light_color);
    }
    if thing.floor_change {
        cursor.write_u8(flag::FLOOR_CHANGE);
    }
    if thing.is_full_ground {
        cursor.write_u8(flag::FULL_GROUND);
    }
    if thing.has_elevation {
        cursor.write_u8(flag::HAS_ELEVATION);
        cursor.write_u16(thing.elevation);
    }
    if thing.has_offset {
        cursor.write_u8(flag::HAS_OFFSET);
    }
    if thing.mini_map {
        cursor.write_u8(flag::MINI_MAP);
        cursor.write_u16(thing.mini_map_color);
    }
    if thing.rotatable {
        cursor.write_u8(flag::ROTATABLE);
    }
    if thing.is_lying_object {
        cursor.write_u8(flag::LYING_OBJECT);
    }
    if thing.animate_always {
        cursor.write_u8(flag::ANIMATE_ALWAYS);
    }
    if thing.is_lens_help {
        cursor.write_u8(flag::LENS_HELP);
        cursor.write_u16(thing.lens_help);
    }
    cursor.write_u8(LAST_FLAG);
    Ok(())
}
