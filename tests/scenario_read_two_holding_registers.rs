//! End-to-end pipeline for spec §8 scenario 1: two tags sharing a unit and area get sorted into
//! one read group, the group becomes a request, and a crafted response scatters back into typed
//! values for each tag.

use neuron_modbus::driver::scatter::{self, Value};
use neuron_modbus::frame::{Area, WireKind};
use neuron_modbus::point::{Attribute, Point, ValueType};
use neuron_modbus::sorter;
use neuron_modbus::stack::{RecvOutcome, Stack};

fn tag(addr: &str, value_type: ValueType) -> Point {
    Point::parse(
        addr,
        value_type,
        Attribute {
            read: true,
            write: false,
            subscribe: false,
        },
        1,
    )
    .unwrap()
}

#[test]
fn two_adjacent_holding_registers_round_trip() {
    let tags = vec![
        tag("1!400001", ValueType::Uint16),
        tag("1!400002", ValueType::Uint16),
    ];

    let groups = sorter::sort(&tags, WireKind::Tcp.byte_cap());
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.area, Area::HoldingRegister);
    assert_eq!(group.start, 0);
    assert_eq!(group.count, 2);

    let mut stack = Stack::new(WireKind::Tcp, true);
    let req = stack.read(group.unit, group.area, group.start, group.count);
    assert_eq!(
        req.bytes,
        vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]
    );

    let response = [
        0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B,
    ];
    let values = match stack.recv(group.unit, &response) {
        RecvOutcome::ReadData { unit, bytes } => {
            assert_eq!(unit, 1);
            group
                .members
                .iter()
                .map(|p| scatter::scatter(p, group.start, &bytes).unwrap())
                .collect::<Vec<_>>()
        }
        other => panic!("unexpected outcome: {other:?}"),
    };

    assert_eq!(values, vec![Value::U16(0x000A), Value::U16(0x000B)]);
}
