//! Server-side PDU handling: given a unit/function/payload triple, read or write the backing
//! [`RegisterStore`] and build the response PDU, mirroring `pdu_read_holding`/`pdu_read_coils`/
//! `pdu_write_single_holding`/etc. in `modbus_tcp_simulator.c`. This is the server-shaped inverse
//! of [`crate::stack::Stack`], which only knows how to build requests and parse responses.

use crate::simulator::store::RegisterStore;

const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
const ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Handle one request PDU (unit id not included), returning the response PDU (function code
/// first, with the exception bit set on failure).
pub fn handle_pdu(store: &RegisterStore, function: u8, payload: &[u8]) -> Vec<u8> {
    match function {
        0x01 => read_bits(store, function, payload, Area::Coil),
        0x02 => read_bits(store, function, payload, Area::DiscreteInput),
        0x03 => read_registers(store, function, payload, Area::HoldingRegister),
        0x04 => read_registers(store, function, payload, Area::InputRegister),
        0x05 => write_single_coil(store, function, payload),
        0x06 => write_single_holding(store, function, payload),
        0x0F => write_multiple_coils(store, function, payload),
        0x10 => write_multiple_holding(store, function, payload),
        other => exception(other, 0x01),
    }
}

enum Area {
    Coil,
    DiscreteInput,
    HoldingRegister,
    InputRegister,
}

fn exception(function: u8, code: u8) -> Vec<u8> {
    vec![function | 0x80, code]
}

fn parse_address(payload: &[u8]) -> Option<(u16, u16)> {
    if payload.len() < 4 {
        return None;
    }
    let start = u16::from_be_bytes([payload[0], payload[1]]);
    let count = u16::from_be_bytes([payload[2], payload[3]]);
    Some((start, count))
}

fn read_registers(store: &RegisterStore, function: u8, payload: &[u8], area: Area) -> Vec<u8> {
    let Some((start, count)) = parse_address(payload) else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };
    if count == 0 {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    }
    let regs = match area {
        Area::HoldingRegister => store.read_holding(start, count),
        Area::InputRegister => store.read_input_registers(start, count),
        _ => unreachable!(),
    };
    let Some(regs) = regs else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };

    let mut out = Vec::with_capacity(2 + regs.len() * 2);
    out.push(function);
    out.push((regs.len() * 2) as u8);
    for v in regs {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

fn read_bits(store: &RegisterStore, function: u8, payload: &[u8], area: Area) -> Vec<u8> {
    let Some((start, count)) = parse_address(payload) else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };
    if count == 0 {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    }
    let bits = match area {
        Area::Coil => store.read_coils(start, count),
        Area::DiscreteInput => store.read_discrete_inputs(start, count),
        _ => unreachable!(),
    };
    let Some(bits) = bits else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };

    let n_bytes = (bits.len() + 7) / 8;
    let mut body = vec![0u8; n_bytes];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            body[i / 8] |= 1 << (i % 8);
        }
    }

    let mut out = Vec::with_capacity(2 + body.len());
    out.push(function);
    out.push(n_bytes as u8);
    out.extend_from_slice(&body);
    out
}

fn write_single_holding(store: &RegisterStore, function: u8, payload: &[u8]) -> Vec<u8> {
    let Some((start, value)) = parse_address(payload) else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };
    match store.write_holding(start, value) {
        Ok(()) => {
            let mut out = vec![function];
            out.extend_from_slice(payload);
            out
        }
        Err(()) => exception(function, ILLEGAL_DATA_VALUE),
    }
}

fn write_single_coil(store: &RegisterStore, function: u8, payload: &[u8]) -> Vec<u8> {
    let Some((start, raw)) = parse_address(payload) else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };
    match store.write_coil(start, raw == 0xFF00) {
        Ok(()) => {
            let mut out = vec![function];
            out.extend_from_slice(payload);
            out
        }
        Err(()) => exception(function, ILLEGAL_DATA_ADDRESS),
    }
}

fn write_multiple_holding(store: &RegisterStore, function: u8, payload: &[u8]) -> Vec<u8> {
    let Some((start, count)) = parse_address(payload) else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };
    if count == 0 || payload.len() < 5 {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    }
    let n_byte = payload[4] as usize;
    let data = &payload[5..];
    if data.len() < n_byte || n_byte < count as usize * 2 {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    }

    for i in 0..count {
        let v = u16::from_be_bytes([data[i as usize * 2], data[i as usize * 2 + 1]]);
        if store.write_holding(start + i, v).is_err() {
            return exception(function, ILLEGAL_DATA_VALUE);
        }
    }

    let mut out = vec![function];
    out.extend_from_slice(&start.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out
}

fn write_multiple_coils(store: &RegisterStore, function: u8, payload: &[u8]) -> Vec<u8> {
    let Some((start, count)) = parse_address(payload) else {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    };
    if count == 0 || payload.len() < 5 {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    }
    let n_byte = payload[4] as usize;
    let data = &payload[5..];
    if data.len() < n_byte {
        return exception(function, ILLEGAL_DATA_ADDRESS);
    }

    for i in 0..count {
        let byte = data[(i / 8) as usize];
        let bit = (byte >> (i % 8)) & 1 != 0;
        if store.write_coil(start + i, bit).is_err() {
            return exception(function, ILLEGAL_DATA_VALUE);
        }
    }

    let mut out = vec![function];
    out.extend_from_slice(&start.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::waveform::GeneratorType;

    #[test]
    fn reads_holding_registers() {
        let store = RegisterStore::new();
        store.write_holding(0, 42).unwrap();
        store.write_holding(1, 7).unwrap();
        let resp = handle_pdu(&store, 0x03, &[0x00, 0x00, 0x00, 0x02]);
        assert_eq!(resp, vec![0x03, 0x04, 0x00, 0x2A, 0x00, 0x07]);
    }

    #[test]
    fn out_of_range_read_returns_exception() {
        let store = RegisterStore::new();
        let resp = handle_pdu(&store, 0x03, &[0x03, 0xE8, 0x00, 0x01]);
        assert_eq!(resp, vec![0x83, ILLEGAL_DATA_ADDRESS]);
    }

    #[test]
    fn write_single_holding_round_trips() {
        let store = RegisterStore::new();
        let resp = handle_pdu(&store, 0x06, &[0x00, 0x05, 0x00, 0x2A]);
        assert_eq!(resp, vec![0x06, 0x00, 0x05, 0x00, 0x2A]);
        assert_eq!(store.read_holding(5, 1), Some(vec![42]));
    }

    #[test]
    fn write_to_readonly_register_is_rejected() {
        let store = RegisterStore::new();
        store.mark_tag(5, GeneratorType::Saw, "saw1".into(), "1!400006".into());
        let resp = handle_pdu(&store, 0x06, &[0x00, 0x05, 0x00, 0x2A]);
        assert_eq!(resp, vec![0x86, ILLEGAL_DATA_VALUE]);
    }

    #[test]
    fn write_single_coil_on_sets_bit() {
        let store = RegisterStore::new();
        let resp = handle_pdu(&store, 0x05, &[0x00, 0x02, 0xFF, 0x00]);
        assert_eq!(resp, vec![0x05, 0x00, 0x02, 0xFF, 0x00]);
        assert_eq!(store.read_coils(2, 1), Some(vec![true]));
    }

    #[test]
    fn unknown_function_is_illegal_function() {
        let store = RegisterStore::new();
        let resp = handle_pdu(&store, 0x2B, &[]);
        assert_eq!(resp, vec![0xAB, 0x01]);
    }
}
