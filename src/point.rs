//! Tag address parsing: `<unit>!<area><pos>[.N[H|L|D|E]][#endian]` into a [`Point`].
//!
//! Mirrors `modbus_tag_to_point` (`plugins/modbus/modbus_point.c`): a single `sscanf`-style pass
//! over the address string followed by per-area/per-type admissibility checks, then a register
//! count derived from the declared value type. Rust gets a hand-written scanner instead of
//! `sscanf` since the grammar is simple and we want precise [`TagError`] on every rejection.

use crate::error::TagError;
use crate::frame::Area;

/// Declared value type of a tag, independent of its storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bit,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float,
    Uint64,
    Int64,
    Double,
    String,
    Bytes,
}

/// Attribute flags carried by a tag, mirroring `NEU_ATTRIBUTE_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attribute {
    pub read: bool,
    pub write: bool,
    pub subscribe: bool,
}

/// 16-bit word endianness, for `Uint16`/`Int16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian16 {
    Little,
    Big,
}

/// 32-bit endianness: byte order within each word, and word order across the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian32 {
    /// `LL`: little word first, little byte order (default).
    LittleLittle,
    /// `BB`: big word first, big byte order.
    BigBig,
    /// `BL`: big word first, little byte order.
    BigLittle,
    /// `LB`: little word first, big byte order.
    LittleBig,
}

impl Default for Endian32 {
    fn default() -> Self {
        Endian32::LittleLittle
    }
}

/// 64-bit endianness (`#B`/`#L`), mirroring the two-letter shorthand spec §4.2 defines for
/// UINT64/INT64/DOUBLE — the original's four-way `modbus_endianess_64` collapses to the same
/// "byte-swap the whole 8-byte word, or don't" choice once only `B`/`L` are accepted per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian64 {
    Little,
    Big,
}

impl Default for Endian64 {
    fn default() -> Self {
        Endian64::Little
    }
}

/// Group-wide endian fallback applied when a tag's address string carries no `#`-suffix,
/// sourced from the driver's `endianess`/`endianess_64` settings (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndianDefaults {
    pub endian16: Endian16,
    pub endian32: Endian32,
    pub endian64: Endian64,
}

impl Default for Endian16 {
    fn default() -> Self {
        Endian16::Little
    }
}

/// String layout, selected by the `.N<letter>` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLayout {
    /// High byte first within each register (default).
    H,
    /// Low byte first within each register.
    L,
    /// BCD-ish "D" layout: one character per register.
    D,
    /// "E" layout: one character per register, reversed register order.
    E,
}

/// Per-type addressing detail beyond `{unit, area, start}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Option_ {
    None,
    Bit { index: u8 },
    Endian16(Endian16),
    Endian32(Endian32),
    Endian64(Endian64),
    String { length: u8, layout: StringLayout },
    Bytes { length: u8 },
}

/// A fully parsed, validated tag address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub unit: u8,
    pub area: Area,
    /// Zero-based register/coil start address (the wire's `.start_address`).
    pub start: u16,
    pub value_type: ValueType,
    pub option: Option_,
    /// Number of 16-bit registers (or bits, for coil areas) this tag occupies.
    pub n_register: u16,
}

impl Point {
    /// Parse `address` for a tag of type `value_type` with the given `attribute`, offsetting the
    /// scanned position by `address_base` (0 if addresses in this configuration are already
    /// zero-based, 1 if they're written one-based as in most PLC documentation).
    pub fn parse(
        address: &str,
        value_type: ValueType,
        attribute: Attribute,
        address_base: u16,
    ) -> Result<Self, TagError> {
        Self::parse_with_defaults(address, value_type, attribute, address_base, EndianDefaults::default())
    }

    /// Like [`Point::parse`], but falls back to `defaults` (rather than this crate's hardcoded
    /// little-endian/`LL` choice) for any endian field the address string leaves unspecified.
    pub fn parse_with_defaults(
        address: &str,
        value_type: ValueType,
        attribute: Attribute,
        address_base: u16,
        defaults: EndianDefaults,
    ) -> Result<Self, TagError> {
        if attribute.subscribe {
            return Err(TagError::AttributeNotSupported);
        }

        let (unit, area_char, rest) = scan_head(address)?;
        let area = match area_char {
            '0' => Area::Coil,
            '1' => Area::DiscreteInput,
            '3' => Area::InputRegister,
            '4' => Area::HoldingRegister,
            _ => return Err(TagError::AddressFormatInvalid),
        };

        let (pos, suffix) = scan_position(rest)?;
        let start = pos
            .checked_sub(address_base)
            .ok_or(TagError::AddressFormatInvalid)?;

        if area.is_read_only() && attribute.write {
            return Err(TagError::AttributeNotSupported);
        }

        if area.is_bit_area() && value_type != ValueType::Bit {
            return Err(TagError::TypeNotSupported);
        }

        let option = parse_option(suffix, value_type, defaults)?;

        if let Option_::Bit { index } = option {
            let limit = if area.is_bit_area() { 7 } else { 15 };
            if index > limit {
                return Err(TagError::AddressFormatInvalid);
            }
        }

        if !area.is_bit_area() {
            if value_type == ValueType::Bit && attribute.write {
                return Err(TagError::AttributeNotSupported);
            }
            if let Option_::String { length, .. } = option {
                if length == 0 {
                    return Err(TagError::AddressFormatInvalid);
                }
            }
            if let Option_::Bytes { length } = option {
                if length == 0 {
                    return Err(TagError::AddressFormatInvalid);
                }
            }
        }

        let n_register = register_count(value_type, option, area)?;

        Ok(Point {
            unit,
            area,
            start,
            value_type,
            option,
            n_register,
        })
    }
}

impl crate::sorter::Sortable for Point {
    fn unit(&self) -> u8 {
        self.unit
    }

    fn area(&self) -> Area {
        self.area
    }

    fn start(&self) -> u16 {
        self.start
    }

    fn n_register(&self) -> u16 {
        self.n_register
    }
}

/// Parse the `<unit>!<area>` prefix, returning the unit id, the area character, and the
/// remainder of the string (starting at the position digits).
fn scan_head(address: &str) -> Result<(u8, char, &str), TagError> {
    let bang = address.find('!').ok_or(TagError::AddressFormatInvalid)?;
    let unit: u8 = address[..bang]
        .parse()
        .map_err(|_| TagError::AddressFormatInvalid)?;

    let rest = &address[bang + 1..];
    let area_char = rest.chars().next().ok_or(TagError::AddressFormatInvalid)?;
    Ok((unit, area_char, &rest[area_char.len_utf8()..]))
}

/// Parse the leading decimal position out of `rest`, returning it and whatever (`.`/`#`-led)
/// suffix follows.
fn scan_position(rest: &str) -> Result<(u16, &str), TagError> {
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return Err(TagError::AddressFormatInvalid);
    }
    let pos: u16 = rest[..digits_end]
        .parse()
        .map_err(|_| TagError::AddressFormatInvalid)?;
    Ok((pos, &rest[digits_end..]))
}

fn parse_option(suffix: &str, value_type: ValueType, defaults: EndianDefaults) -> Result<Option_, TagError> {
    match value_type {
        ValueType::Bit => {
            if let Some(dot) = suffix.strip_prefix('.') {
                let index: u8 = dot.parse().map_err(|_| TagError::AddressFormatInvalid)?;
                Ok(Option_::Bit { index })
            } else {
                Ok(Option_::None)
            }
        }
        ValueType::Uint8 | ValueType::Int8 | ValueType::Uint16 | ValueType::Int16 => {
            let endian = match suffix.strip_prefix('#') {
                Some("B") => Endian16::Big,
                Some("L") => Endian16::Little,
                None => defaults.endian16,
                Some(_) => return Err(TagError::AddressFormatInvalid),
                // sscanf("#%c") on an unrecognized letter still succeeds and defaults to L16.
            };
            Ok(Option_::Endian16(endian))
        }
        ValueType::Uint32 | ValueType::Int32 | ValueType::Float => {
            let endian = match suffix.strip_prefix('#') {
                Some("BB") => Endian32::BigBig,
                Some("BL") => Endian32::BigLittle,
                Some("LL") => Endian32::LittleLittle,
                Some("LB") => Endian32::LittleBig,
                _ => defaults.endian32,
            };
            Ok(Option_::Endian32(endian))
        }
        ValueType::Uint64 | ValueType::Int64 | ValueType::Double => {
            let endian = match suffix.strip_prefix('#') {
                Some("B") => Endian64::Big,
                Some("L") => Endian64::Little,
                None => defaults.endian64,
                Some(_) => return Err(TagError::AddressFormatInvalid),
            };
            Ok(Option_::Endian64(endian))
        }
        ValueType::Bytes => {
            let dot = suffix.strip_prefix('.').ok_or(TagError::AddressFormatInvalid)?;
            let length: u8 = dot.parse().map_err(|_| TagError::AddressFormatInvalid)?;
            if length == 0 || length > 127 {
                return Err(TagError::AddressFormatInvalid);
            }
            Ok(Option_::Bytes { length })
        }
        ValueType::String => {
            let dot = suffix.strip_prefix('.').ok_or(TagError::AddressFormatInvalid)?;
            let letter_pos = dot.find(|c: char| !c.is_ascii_digit());
            let (len_str, letter) = match letter_pos {
                Some(i) => (&dot[..i], dot[i..].chars().next()),
                None => (dot, None),
            };
            let length: u8 = len_str.parse().map_err(|_| TagError::AddressFormatInvalid)?;
            if length == 0 || length > 127 {
                return Err(TagError::AddressFormatInvalid);
            }
            let layout = match letter {
                Some('H') => StringLayout::H,
                Some('L') => StringLayout::L,
                Some('D') => StringLayout::D,
                Some('E') => StringLayout::E,
                _ => StringLayout::H,
            };
            Ok(Option_::String { length, layout })
        }
    }
}

/// Number of 16-bit registers this tag spans, mirroring `modbus_tag_to_point`'s switch on type.
fn register_count(value_type: ValueType, option: Option_, area: Area) -> Result<u16, TagError> {
    if value_type != ValueType::Bit && area.is_bit_area() {
        return Err(TagError::TypeNotSupported);
    }
    match value_type {
        ValueType::Bit => Ok(1),
        ValueType::Uint8 | ValueType::Int8 => Ok(1),
        ValueType::Uint16 | ValueType::Int16 => Ok(1),
        ValueType::Uint32 | ValueType::Int32 | ValueType::Float => Ok(2),
        ValueType::Uint64 | ValueType::Int64 | ValueType::Double => Ok(4),
        ValueType::String => match option {
            Option_::String { length, layout } => match layout {
                StringLayout::H | StringLayout::L => {
                    Ok((length as u16).div_ceil(2))
                }
                StringLayout::D | StringLayout::E => Ok(length as u16),
            },
            _ => unreachable!("parse_option always returns Option_::String for ValueType::String"),
        },
        ValueType::Bytes => match option {
            Option_::Bytes { length } => Ok((length as u16).div_ceil(2)),
            _ => unreachable!("parse_option always returns Option_::Bytes for ValueType::Bytes"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(read: bool, write: bool) -> Attribute {
        Attribute {
            read,
            write,
            subscribe: false,
        }
    }

    #[test]
    fn parses_holding_register_u16() {
        let p = Point::parse("1!400001", ValueType::Uint16, attr(true, true), 1).unwrap();
        assert_eq!(p.unit, 1);
        assert_eq!(p.area, Area::HoldingRegister);
        assert_eq!(p.start, 0);
        assert_eq!(p.n_register, 1);
    }

    #[test]
    fn parses_coil_bit() {
        let p = Point::parse("2!000010", ValueType::Bit, attr(true, true), 1).unwrap();
        assert_eq!(p.area, Area::Coil);
        assert_eq!(p.start, 9);
        assert_eq!(p.n_register, 1);
    }

    #[test]
    fn parses_float_with_endian_suffix() {
        let p = Point::parse("1!400001#BB", ValueType::Float, attr(true, false), 1).unwrap();
        assert_eq!(p.option, Option_::Endian32(Endian32::BigBig));
        assert_eq!(p.n_register, 2);
    }

    #[test]
    fn parses_string_with_length_and_layout() {
        let p = Point::parse("1!400001.10L", ValueType::String, attr(true, false), 1).unwrap();
        assert_eq!(p.option, Option_::String { length: 10, layout: StringLayout::L });
        assert_eq!(p.n_register, 5);
    }

    #[test]
    fn parses_uint64_with_endian_suffix() {
        let p = Point::parse("1!400001#B", ValueType::Uint64, attr(true, false), 1).unwrap();
        assert_eq!(p.option, Option_::Endian64(Endian64::Big));
        assert_eq!(p.n_register, 4);
    }

    #[test]
    fn parses_bytes_with_length() {
        let p = Point::parse("1!400001.6", ValueType::Bytes, attr(true, false), 1).unwrap();
        assert_eq!(p.option, Option_::Bytes { length: 6 });
        assert_eq!(p.n_register, 3);
    }

    #[test]
    fn parses_uint8_selects_low_byte_by_default() {
        let p = Point::parse("1!400001", ValueType::Uint8, attr(true, false), 1).unwrap();
        assert_eq!(p.option, Option_::Endian16(Endian16::Little));
        assert_eq!(p.n_register, 1);
    }

    #[test]
    fn rejects_write_on_input_register() {
        let err = Point::parse("1!300001", ValueType::Uint16, attr(true, true), 1).unwrap_err();
        assert_eq!(err, TagError::AttributeNotSupported);
    }

    #[test]
    fn rejects_bad_area_char() {
        let err = Point::parse("1!900001", ValueType::Uint16, attr(true, true), 1).unwrap_err();
        assert_eq!(err, TagError::AddressFormatInvalid);
    }

    #[test]
    fn rejects_non_bit_type_in_coil_area() {
        let err = Point::parse("1!000001", ValueType::Uint16, attr(true, true), 1).unwrap_err();
        assert_eq!(err, TagError::TypeNotSupported);
    }

    #[test]
    fn rejects_malformed_address() {
        let err = Point::parse("not-an-address", ValueType::Uint16, attr(true, true), 1)
            .unwrap_err();
        assert_eq!(err, TagError::AddressFormatInvalid);
    }
}
