//! Stateless Modbus PDU builder/parser: the wire-level counterpart to `modbus_stack.c`.
//!
//! [`Stack`] holds only a sequence counter; building a request or parsing a response never talks
//! to a socket. [`crate::driver`] owns the transport and calls into this module for every frame
//! it sends or receives, the same split the original keeps between `modbus_stack.c` (encode/
//! decode) and `modbus_req.c`/`modbus_tcp.c` (I/O).

use crate::frame::{Address, Area, DataBlock, Function, FunctionHeader, MbapHeader, WireKind};
use crate::protocol_buf::{PackCursor, UnpackCursor};

/// A request ready to be written to the wire, with the byte count its matching response must be
/// read with (so the caller knows how much more to read before calling [`Stack::recv`]).
pub struct Request {
    pub bytes: Vec<u8>,
    pub expected_response_len: usize,
}

/// Outcome of parsing one response out of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A read response carrying `n_byte` bytes of register/coil data.
    ReadData { unit: u8, bytes: Vec<u8> },
    /// A write response (single or multiple) was acknowledged.
    WriteAck { unit: u8 },
    /// The device replied with a Modbus exception.
    Exception {
        unit: u8,
        function: Function,
        code: crate::frame::ExceptionCode,
    },
    /// Not enough bytes were present yet; call again once more have arrived.
    NeedMore,
}

/// Builds requests and parses responses for one logical connection. Mirrors `modbus_stack_t`:
/// the only state carried across calls is the sequence number used by the TCP/QH MBAP header.
pub struct Stack {
    wire: WireKind,
    check_header: bool,
    seq: u16,
}

impl Stack {
    pub fn new(wire: WireKind, check_header: bool) -> Self {
        Self {
            wire,
            check_header,
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u16 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// Build a read request for `n_reg` items of `area` starting at `start_address`.
    pub fn read(&mut self, unit: u8, area: Area, start_address: u16, n_reg: u16) -> Request {
        let mut buf = vec![0u8; MbapHeader::WIRE_LEN + FunctionHeader::WIRE_LEN + Address::WIRE_LEN];
        let mut pack = PackCursor::new(&mut buf);

        Address::encode(&mut pack, start_address, n_reg).expect("fixed-size buffer sized for header");
        FunctionHeader::encode(&mut pack, unit, Function::for_read(area).code())
            .expect("fixed-size buffer sized for header");
        if self.wire.is_tcp() {
            MbapHeader::encode(&mut pack, self.next_seq()).expect("fixed-size buffer sized for header");
        } else {
            self.next_seq();
        }

        let used = pack.used_size();
        buf.drain(..buf.len() - used);

        let data_bytes = if area.is_bit_area() {
            (n_reg as usize).div_ceil(8)
        } else {
            n_reg as usize * 2
        };
        // function header + n_byte prefix + data, echoed in the response.
        let expected_response_len = FunctionHeader::WIRE_LEN + 1 + data_bytes;

        if !self.wire.is_tcp() {
            append_crc(&mut buf);
        }

        Request {
            bytes: buf,
            expected_response_len,
        }
    }

    /// Build a write request. `bytes` holds the big-endian register payload for holding register
    /// writes; for single coil writes `bytes[0]` is a boolean-ish 0/non-zero value.
    pub fn write(&mut self, unit: u8, area: Area, start_address: u16, n_reg: u16, bytes: &[u8]) -> Request {
        let single = (area == Area::HoldingRegister && n_reg <= 1)
            || (area == Area::Coil && n_reg <= 1);

        let mut buf = vec![0u8; MbapHeader::WIRE_LEN + FunctionHeader::WIRE_LEN + Address::WIRE_LEN + 1 + bytes.len()];
        let mut pack = PackCursor::new(&mut buf);

        let function = match (area, single) {
            (Area::Coil, true) => Function::WriteSingleCoil,
            (Area::Coil, false) => Function::WriteMultipleCoils,
            (Area::HoldingRegister, true) => Function::WriteSingleHoldingRegister,
            (Area::HoldingRegister, false) => Function::WriteMultipleHoldingRegisters,
            _ => panic!("writes are only valid for coil and holding register areas"),
        };

        match (area, single) {
            (Area::Coil, true) => {
                let value = if bytes.first().copied().unwrap_or(0) != 0 { 0xFF00 } else { 0x0000 };
                Address::encode(&mut pack, start_address, value).expect("sized buffer");
            }
            (Area::HoldingRegister, true) => {
                let value = u16::from_be_bytes([bytes[0], *bytes.get(1).unwrap_or(&0)]);
                Address::encode(&mut pack, start_address, value).expect("sized buffer");
            }
            _ => {
                DataBlock::encode(&mut pack, bytes).expect("sized buffer");
                Address::encode(&mut pack, start_address, n_reg).expect("sized buffer");
            }
        }

        FunctionHeader::encode(&mut pack, unit, function.code()).expect("sized buffer");
        if self.wire.is_tcp() {
            MbapHeader::encode(&mut pack, self.next_seq()).expect("sized buffer");
        } else {
            self.next_seq();
        }

        let used = pack.used_size();
        buf.drain(..buf.len() - used);

        // Write responses echo the function header and address block, nothing more.
        let expected_response_len = FunctionHeader::WIRE_LEN + Address::WIRE_LEN;

        if !self.wire.is_tcp() {
            append_crc(&mut buf);
        }

        Request {
            bytes: buf,
            expected_response_len,
        }
    }

    /// Parse one response out of `buf`, verifying it answers `expected_unit` (spec §4.4). On
    /// [`RecvOutcome::NeedMore`] the caller should read more bytes and retry with the same (or a
    /// longer) buffer; nothing is consumed in that case. A reply from the wrong slave on a shared
    /// RTU bus is treated the same as an incomplete frame, since the right reply may still be
    /// behind it in the stream.
    pub fn recv(&self, expected_unit: u8, buf: &[u8]) -> RecvOutcome {
        let mut cursor = UnpackCursor::new(buf);

        if self.wire.is_tcp() {
            match MbapHeader::decode(&mut cursor, self.check_header) {
                Ok(_) => {}
                Err(_) => return RecvOutcome::NeedMore,
            }
        }

        let header = match FunctionHeader::decode(&mut cursor) {
            Ok(h) => h,
            Err(_) => return RecvOutcome::NeedMore,
        };

        if header.unit != expected_unit {
            return RecvOutcome::NeedMore;
        }

        if header.is_exception() {
            let code = match cursor.take(1) {
                Some(b) => crate::frame::ExceptionCode::from(b[0]),
                None => return RecvOutcome::NeedMore,
            };
            let function = match function_from_code(header.base_function()) {
                Some(f) => f,
                None => return RecvOutcome::NeedMore,
            };
            return RecvOutcome::Exception {
                unit: header.unit,
                function,
                code,
            };
        }

        match function_from_code(header.function) {
            Some(
                Function::ReadCoils
                | Function::ReadDiscreteInputs
                | Function::ReadHoldingRegisters
                | Function::ReadInputRegisters,
            ) => match DataBlock::decode(&mut cursor) {
                Ok((_, payload)) => RecvOutcome::ReadData {
                    unit: header.unit,
                    bytes: payload.to_vec(),
                },
                Err(_) => RecvOutcome::NeedMore,
            },
            Some(
                Function::WriteSingleCoil
                | Function::WriteSingleHoldingRegister
                | Function::WriteMultipleCoils
                | Function::WriteMultipleHoldingRegisters,
            ) => match Address::decode(&mut cursor) {
                Ok(_) => RecvOutcome::WriteAck { unit: header.unit },
                Err(_) => RecvOutcome::NeedMore,
            },
            None => RecvOutcome::NeedMore,
        }
    }
}

fn function_from_code(code: u8) -> Option<Function> {
    match code {
        0x01 => Some(Function::ReadCoils),
        0x02 => Some(Function::ReadDiscreteInputs),
        0x03 => Some(Function::ReadHoldingRegisters),
        0x04 => Some(Function::ReadInputRegisters),
        0x05 => Some(Function::WriteSingleCoil),
        0x06 => Some(Function::WriteSingleHoldingRegister),
        0x0F => Some(Function::WriteMultipleCoils),
        0x10 => Some(Function::WriteMultipleHoldingRegisters),
        _ => None,
    }
}

fn append_crc(buf: &mut Vec<u8>) {
    let crc = crate::crc::crc16(buf);
    buf.extend_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_request_matches_scenario_bytes() {
        // spec §8 scenario 1
        let mut stack = Stack::new(WireKind::Tcp, true);
        let req = stack.read(1, Area::HoldingRegister, 0, 2);
        assert_eq!(
            req.bytes,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]
        );
        assert_eq!(req.expected_response_len, 2 + 1 + 4);
    }

    #[test]
    fn rtu_read_request_has_trailing_crc() {
        let mut stack = Stack::new(WireKind::Rtu, false);
        let req = stack.read(1, Area::HoldingRegister, 0, 1);
        // unit, function, start(2), count(2) + 2 byte crc
        assert_eq!(req.bytes.len(), 6 + 2);
        assert_eq!(&req.bytes[..6], &[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn parses_read_response() {
        let stack = Stack::new(WireKind::Tcp, true);
        let raw = [0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B];
        match stack.recv(1, &raw) {
            RecvOutcome::ReadData { unit, bytes } => {
                assert_eq!(unit, 1);
                assert_eq!(bytes, vec![0x00, 0x0A, 0x00, 0x0B]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn parses_exception_response() {
        let stack = Stack::new(WireKind::Tcp, true);
        let raw = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02];
        match stack.recv(1, &raw) {
            RecvOutcome::Exception { unit, function, code } => {
                assert_eq!(unit, 1);
                assert_eq!(function, Function::ReadHoldingRegisters);
                assert_eq!(code, crate::frame::ExceptionCode::IllegalDataAddress);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn short_buffer_asks_for_more() {
        let stack = Stack::new(WireKind::Tcp, true);
        let raw = [0x00, 0x01, 0x00];
        assert_eq!(stack.recv(1, &raw), RecvOutcome::NeedMore);
    }

    #[test]
    fn reply_from_wrong_unit_asks_for_more() {
        let stack = Stack::new(WireKind::Tcp, true);
        let raw = [0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x02, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B];
        assert_eq!(stack.recv(1, &raw), RecvOutcome::NeedMore);
    }
}
