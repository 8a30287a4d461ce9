//! Wire elements of a Modbus PDU: the MBAP header, function header, address and data blocks.
//!
//! Every multi-byte field on the wire is big-endian (the CRC footer in [`crate::crc`] is the one
//! little-endian exception). Structures here are encoded/decoded byte by byte through
//! [`crate::protocol_buf`] cursors rather than relying on compiler struct layout, per spec §9.

use crate::error::FrameError;
use crate::protocol_buf::{PackCursor, UnpackCursor};

/// Modbus area tag, reused across [`crate::point`], [`crate::sorter`] and [`crate::stack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Area {
    Coil = 0,
    DiscreteInput = 1,
    InputRegister = 3,
    HoldingRegister = 4,
}

impl Area {
    pub fn is_bit_area(&self) -> bool {
        matches!(self, Area::Coil | Area::DiscreteInput)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Area::DiscreteInput | Area::InputRegister)
    }
}

/// Modbus function codes used by this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Function {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleHoldingRegister = 0x06,
    WriteMultipleCoils = 0x0F,
    WriteMultipleHoldingRegisters = 0x10,
}

impl Function {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn for_read(area: Area) -> Self {
        match area {
            Area::Coil => Function::ReadCoils,
            Area::DiscreteInput => Function::ReadDiscreteInputs,
            Area::InputRegister => Function::ReadInputRegisters,
            Area::HoldingRegister => Function::ReadHoldingRegisters,
        }
    }
}

/// Exception codes a device can return in the one-byte body of an exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    Other(u8),
}

impl From<u8> for ExceptionCode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            other => ExceptionCode::Other(other),
        }
    }
}

/// The wire variant in play: plain RTU, classic TCP (250-byte PDU cap) or the extended "QH" TCP
/// variant (up to 65,535-byte PDU, same MBAP framing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    Rtu,
    Tcp,
    TcpExtended,
}

impl WireKind {
    /// Per-PDU byte cap the [`crate::sorter`] must honor when building read plans (spec §3).
    pub fn byte_cap(self) -> usize {
        match self {
            WireKind::Rtu => 250,
            WireKind::Tcp => 250,
            WireKind::TcpExtended => 65_535,
        }
    }

    pub fn is_tcp(self) -> bool {
        !matches!(self, WireKind::Rtu)
    }
}

/// MBAP header (TCP only): 6 bytes, all big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub seq: u16,
    pub protocol: u16,
    pub len: u16,
}

impl MbapHeader {
    pub const WIRE_LEN: usize = 6;

    /// Reserve and fill the header in a [`PackCursor`] *after* the body has been written, so
    /// `len` can be computed from the cursor's used size without a second pass.
    pub fn encode(pack: &mut PackCursor<'_>, seq: u16) -> Result<(), FrameError> {
        // Everything already reserved (unit, function, address/data) is the MBAP body.
        let len = pack.used_size() as u16;
        let buf = pack.reserve(Self::WIRE_LEN)?;
        buf[0..2].copy_from_slice(&seq.to_be_bytes());
        buf[2..4].copy_from_slice(&[0, 0]);
        buf[4..6].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }

    /// Decode a header from the front of `cursor`, validating `protocol == 0` and that `len`
    /// does not exceed what remains in the cursor.
    pub fn decode(cursor: &mut UnpackCursor<'_>, check_header: bool) -> Result<Self, FrameError> {
        let raw = cursor.take(Self::WIRE_LEN).ok_or(FrameError::Truncated)?;
        let seq = u16::from_be_bytes([raw[0], raw[1]]);
        let protocol = u16::from_be_bytes([raw[2], raw[3]]);
        let len = u16::from_be_bytes([raw[4], raw[5]]);

        if check_header && protocol != 0 {
            return Err(FrameError::BadProtocolId);
        }
        if len as usize > cursor.remaining() {
            return Err(FrameError::LengthMismatch);
        }

        Ok(Self { seq, protocol, len })
    }
}

/// `{unit, function}` header shared by every PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionHeader {
    pub unit: u8,
    pub function: u8,
}

impl FunctionHeader {
    pub const WIRE_LEN: usize = 2;

    pub fn encode(pack: &mut PackCursor<'_>, unit: u8, function: u8) -> Result<(), FrameError> {
        let buf = pack.reserve(Self::WIRE_LEN)?;
        buf[0] = unit;
        buf[1] = function;
        Ok(())
    }

    pub fn decode(cursor: &mut UnpackCursor<'_>) -> Result<Self, FrameError> {
        let raw = cursor.take(Self::WIRE_LEN).ok_or(FrameError::Truncated)?;
        Ok(Self {
            unit: raw[0],
            function: raw[1],
        })
    }

    /// `true` if this is an exception response (top bit of `function` set).
    pub fn is_exception(&self) -> bool {
        self.function & 0x80 != 0
    }

    /// The request function code this response corresponds to, with the exception bit masked off.
    pub fn base_function(&self) -> u8 {
        self.function & 0x7F
    }
}

/// `{start, count}` address block. Big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub start: u16,
    pub count: u16,
}

impl Address {
    pub const WIRE_LEN: usize = 4;

    pub fn encode(pack: &mut PackCursor<'_>, start: u16, count: u16) -> Result<(), FrameError> {
        let buf = pack.reserve(Self::WIRE_LEN)?;
        buf[0..2].copy_from_slice(&start.to_be_bytes());
        buf[2..4].copy_from_slice(&count.to_be_bytes());
        Ok(())
    }

    pub fn decode(cursor: &mut UnpackCursor<'_>) -> Result<Self, FrameError> {
        let raw = cursor.take(Self::WIRE_LEN).ok_or(FrameError::Truncated)?;
        Ok(Self {
            start: u16::from_be_bytes([raw[0], raw[1]]),
            count: u16::from_be_bytes([raw[2], raw[3]]),
        })
    }
}

/// Variable-length data block: a one-byte length prefix followed by that many bytes. Used for
/// multi-register writes and any read reply with `n_byte > 2`.
pub struct DataBlock;

impl DataBlock {
    pub fn encode(pack: &mut PackCursor<'_>, bytes: &[u8]) -> Result<(), FrameError> {
        if bytes.len() > u8::MAX as usize {
            return Err(FrameError::Capacity);
        }
        let buf = pack.reserve(bytes.len())?;
        buf.copy_from_slice(bytes);
        let n = pack.reserve(1)?;
        n[0] = bytes.len() as u8;
        Ok(())
    }

    /// Decode the `n_byte` prefix, returning it and the payload slice (not yet consumed from
    /// `cursor` beyond the prefix+payload).
    pub fn decode<'a>(cursor: &mut UnpackCursor<'a>) -> Result<(u8, &'a [u8]), FrameError> {
        let n_byte = cursor.take(1).ok_or(FrameError::Truncated)?[0];
        let payload = cursor
            .take(n_byte as usize)
            .ok_or(FrameError::Truncated)?;
        Ok((n_byte, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mbap_round_trip() {
        let mut buf = [0u8; 32];
        let mut pack = PackCursor::new(&mut buf);
        pack.reserve(4).unwrap().copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        MbapHeader::encode(&mut pack, 7).unwrap();

        let used = pack.used().to_vec();
        let mut cursor = UnpackCursor::new(&used);
        let header = MbapHeader::decode(&mut cursor, true).unwrap();

        assert_eq!(header.seq, 7);
        assert_eq!(header.protocol, 0);
    }

    #[test]
    fn bad_protocol_rejected_when_checking() {
        let raw = [0x00, 0x01, 0x00, 0x01, 0x00, 0x00];
        let mut cursor = UnpackCursor::new(&raw);
        assert_eq!(
            MbapHeader::decode(&mut cursor, true),
            Err(FrameError::BadProtocolId)
        );
    }

    #[test]
    fn exception_bit_detection() {
        let header = FunctionHeader {
            unit: 1,
            function: 0x83,
        };
        assert!(header.is_exception());
        assert_eq!(header.base_function(), 0x03);
    }

    #[test]
    fn scenario_read_two_holding_registers() {
        // spec §8 scenario 1: request bytes for reading 2 holding registers from unit 1, addr 0
        let mut buf = [0u8; 32];
        let mut pack = PackCursor::new(&mut buf);
        Address::encode(&mut pack, 0, 2).unwrap();
        FunctionHeader::encode(&mut pack, 1, Function::ReadHoldingRegisters.code()).unwrap();
        MbapHeader::encode(&mut pack, 1).unwrap();

        assert_eq!(
            pack.used(),
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]
        );
    }
}
