//! Build a write [`crate::stack::Request`] for a tag value.
//!
//! Mirrors `modbus_stack_write`'s two shapes: a single coil (`0xFF00`/`0x0000` sentinel values)
//! or single holding register, versus a multi-register write carrying a length-prefixed data
//! block. Multi-bit (multiple-coil) writes are not offered by the host contract (spec §6 writes
//! one tag at a time), so only the single-coil path is built for `Area::Coil`.

use crate::frame::Area;
use crate::point::{Endian16, Endian32, Endian64, Option_, Point, ValueType};
use crate::stack::{Request, Stack};

/// The value a host asks the driver to write to one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    Bit(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    U64(u64),
    I64(i64),
    F64(f64),
    Bytes(Vec<u8>),
}

/// Build the request that would write `value` to `point`. Returns `None` if the combination of
/// area and value type isn't writable (read-only area, or a type/area mismatch [`Point::parse`]
/// should already have rejected).
pub fn build(stack: &mut Stack, point: &Point, value: &WriteValue) -> Option<Request> {
    if point.area.is_read_only() {
        return None;
    }

    match (point.area, value) {
        (Area::Coil, WriteValue::Bit(on)) => {
            Some(stack.write(point.unit, Area::Coil, point.start, 1, &[*on as u8]))
        }
        (Area::HoldingRegister, WriteValue::U8(v)) => {
            let bytes = encode_byte(*v, point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 1, &bytes))
        }
        (Area::HoldingRegister, WriteValue::I8(v)) => {
            let bytes = encode_byte(*v as u8, point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 1, &bytes))
        }
        (Area::HoldingRegister, WriteValue::U16(v)) => Some(stack.write(
            point.unit,
            Area::HoldingRegister,
            point.start,
            1,
            &v.to_be_bytes(),
        )),
        (Area::HoldingRegister, WriteValue::I16(v)) => Some(stack.write(
            point.unit,
            Area::HoldingRegister,
            point.start,
            1,
            &(*v as u16).to_be_bytes(),
        )),
        (Area::HoldingRegister, WriteValue::U32(v)) => {
            let bytes = encode_32(*v, point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 2, &bytes))
        }
        (Area::HoldingRegister, WriteValue::I32(v)) => {
            let bytes = encode_32(*v as u32, point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 2, &bytes))
        }
        (Area::HoldingRegister, WriteValue::F32(v)) => {
            let bytes = encode_32(v.to_bits(), point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 2, &bytes))
        }
        (Area::HoldingRegister, WriteValue::U64(v)) => {
            let bytes = encode_64(*v, point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 4, &bytes))
        }
        (Area::HoldingRegister, WriteValue::I64(v)) => {
            let bytes = encode_64(*v as u64, point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 4, &bytes))
        }
        (Area::HoldingRegister, WriteValue::F64(v)) => {
            let bytes = encode_64(v.to_bits(), point.option);
            Some(stack.write(point.unit, Area::HoldingRegister, point.start, 4, &bytes))
        }
        (Area::HoldingRegister, WriteValue::Bytes(raw)) => Some(stack.write(
            point.unit,
            Area::HoldingRegister,
            point.start,
            point.n_register,
            raw,
        )),
        _ => None,
    }
}

/// Pack a single byte into the declared half of its holding register: `Big` occupies the high
/// (first-on-wire) byte, `Little` the low byte, matching scatter's read-side convention.
fn encode_byte(value: u8, option: Option_) -> [u8; 2] {
    let endian = match option {
        Option_::Endian16(e) => e,
        _ => Endian16::Little,
    };
    match endian {
        Endian16::Big => [value, 0],
        Endian16::Little => [0, value],
    }
}

fn encode_64(value: u64, option: Option_) -> [u8; 8] {
    let endian = match option {
        Option_::Endian64(e) => e,
        _ => Endian64::Little,
    };
    let mut be = value.to_be_bytes();
    if endian == Endian64::Little {
        be.reverse();
    }
    be
}

fn encode_32(value: u32, option: Option_) -> [u8; 4] {
    let endian = match option {
        Option_::Endian32(e) => e,
        _ => Endian32::LittleLittle,
    };
    let be = value.to_be_bytes();
    let (hi, lo) = (&be[0..2], &be[2..4]);
    match endian {
        Endian32::BigBig => [hi[0], hi[1], lo[0], lo[1]],
        Endian32::BigLittle => [hi[0], hi[1], lo[1], lo[0]],
        Endian32::LittleLittle => [lo[1], lo[0], hi[1], hi[0]],
        Endian32::LittleBig => [lo[0], lo[1], hi[1], hi[0]],
    }
}

/// Declared value type a [`WriteValue`] must match, used by the host boundary to reject a
/// mismatched write before it reaches the wire.
pub fn expected_type(point: &Point) -> ValueType {
    point.value_type
}
