//! Reconstruct typed values out of the raw register/coil bytes a read response carries.
//!
//! Mirrors the value-extraction half of `modbus_point.c`/`tag.c`: given a [`Point`] (area,
//! start, declared type, endian/string/bit option) and the byte payload of the group it belongs
//! to, pull out that tag's bytes and apply its endian or string layout.

use crate::point::{Endian16, Endian32, Endian64, Option_, Point, StringLayout, ValueType};

/// A value scattered out of a read response, ready for the host to store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
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
    Str(String),
    Bytes(Vec<u8>),
}

/// Extract `point`'s value from `group_bytes`, the payload of the read response covering
/// `group_start..group_start+group_len` registers (or bits, for coil areas).
pub fn scatter(point: &Point, group_start: u16, group_bytes: &[u8]) -> Option<Value> {
    if point.area.is_bit_area() {
        return scatter_bit_area(point, group_start, group_bytes);
    }

    let reg_offset = point.start.checked_sub(group_start)? as usize;
    let byte_offset = reg_offset * 2;
    let span = point.n_register as usize * 2;
    let bytes = group_bytes.get(byte_offset..byte_offset + span)?;

    match point.value_type {
        ValueType::Bit => {
            let word = u16::from_be_bytes([bytes[0], bytes[1]]);
            let Option_::Bit { index } = point.option else {
                return None;
            };
            Some(Value::Bit(word & (1 << index) != 0))
        }
        ValueType::Uint8 => Some(Value::U8(select_byte(bytes, point.option))),
        ValueType::Int8 => Some(Value::I8(select_byte(bytes, point.option) as i8)),
        ValueType::Uint16 => Some(Value::U16(apply_endian16(bytes, point.option))),
        ValueType::Int16 => Some(Value::I16(apply_endian16(bytes, point.option) as i16)),
        ValueType::Uint32 => Some(Value::U32(apply_endian32(bytes, point.option))),
        ValueType::Int32 => Some(Value::I32(apply_endian32(bytes, point.option) as i32)),
        ValueType::Float => Some(Value::F32(f32::from_bits(apply_endian32(bytes, point.option)))),
        ValueType::Uint64 => Some(Value::U64(apply_endian64(bytes, point.option))),
        ValueType::Int64 => Some(Value::I64(apply_endian64(bytes, point.option) as i64)),
        ValueType::Double => Some(Value::F64(f64::from_bits(apply_endian64(bytes, point.option)))),
        ValueType::String => Some(Value::Str(decode_string(bytes, point.option))),
        ValueType::Bytes => Some(Value::Bytes(bytes.to_vec())),
    }
}

fn scatter_bit_area(point: &Point, group_start: u16, group_bits: &[u8]) -> Option<Value> {
    let bit_index = (point.start.checked_sub(group_start)?) as usize;
    let byte = *group_bits.get(bit_index / 8)?;
    Some(Value::Bit(byte & (1 << (bit_index % 8)) != 0))
}

fn apply_endian16(bytes: &[u8], option: Option_) -> u16 {
    let endian = match option {
        Option_::Endian16(e) => e,
        _ => Endian16::Little,
    };
    match endian {
        // The device always sends registers big-endian on the wire; "L16"/"B16" describe the
        // byte order *within* the register once it has already been taken off the wire.
        Endian16::Big => u16::from_be_bytes([bytes[0], bytes[1]]),
        Endian16::Little => u16::from_be_bytes([bytes[1], bytes[0]]),
    }
}

/// Pick one byte out of the register's two, for UINT8/INT8: `Big` takes the high (first-on-wire)
/// byte, `Little` the low byte, the same convention [`apply_endian16`] uses for a full word.
fn select_byte(bytes: &[u8], option: Option_) -> u8 {
    let endian = match option {
        Option_::Endian16(e) => e,
        _ => Endian16::Little,
    };
    match endian {
        Endian16::Big => bytes[0],
        Endian16::Little => bytes[1],
    }
}

fn apply_endian32(bytes: &[u8], option: Option_) -> u32 {
    let endian = match option {
        Option_::Endian32(e) => e,
        _ => Endian32::LittleLittle,
    };
    let (w0, w1) = (&bytes[0..2], &bytes[2..4]);
    let (hi, lo) = match endian {
        Endian32::BigBig => ([w0[0], w0[1]], [w1[0], w1[1]]),
        Endian32::BigLittle => ([w0[0], w0[1]], [w1[1], w1[0]]),
        Endian32::LittleLittle => ([w1[1], w1[0]], [w0[1], w0[0]]),
        Endian32::LittleBig => ([w1[0], w1[1]], [w0[1], w0[0]]),
    };
    u32::from_be_bytes([hi[0], hi[1], lo[0], lo[1]])
}

/// Byte-swap the whole 8-byte word: `Big` leaves wire order as-is, `Little` reverses it.
fn apply_endian64(bytes: &[u8], option: Option_) -> u64 {
    let endian = match option {
        Option_::Endian64(e) => e,
        _ => Endian64::Little,
    };
    let mut be = [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]];
    if endian == Endian64::Little {
        be.reverse();
    }
    u64::from_be_bytes(be)
}

fn decode_string(bytes: &[u8], option: Option_) -> String {
    let (length, layout) = match option {
        Option_::String { length, layout } => (length as usize, layout),
        _ => (bytes.len(), StringLayout::H),
    };

    let chars: Vec<u8> = match layout {
        StringLayout::H => bytes.iter().copied().collect(),
        StringLayout::L => bytes
            .chunks(2)
            .flat_map(|pair| pair.iter().rev().copied().collect::<Vec<_>>())
            .collect(),
        StringLayout::D | StringLayout::E => {
            let mut v: Vec<u8> = bytes.iter().step_by(2).copied().collect();
            if layout == StringLayout::E {
                v.reverse();
            }
            v
        }
    };

    match String::from_utf8(chars) {
        Ok(mut s) => {
            s.truncate(length);
            s
        }
        Err(_) => "?\0".to_string(),
    }
}
