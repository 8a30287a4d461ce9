//! Drives the standalone TCP simulator with a real socket: bind it on an ephemeral port, write a
//! generator-driven tag, connect a client built from [`Stack`], and read the value back.

use std::net::TcpStream;
use std::sync::Arc;

use async_io::Async;
use futures_lite::future::or;
use futures_lite::{AsyncReadExt, AsyncWriteExt};

use neuron_modbus::frame::{Area, WireKind};
use neuron_modbus::simulator::admin::{self, TagConfig};
use neuron_modbus::simulator::store::RegisterStore;
use neuron_modbus::simulator::waveform::GeneratorType;
use neuron_modbus::simulator::Simulator;
use neuron_modbus::stack::{RecvOutcome, Stack};

#[test]
fn reads_a_plain_holding_register_over_real_tcp() {
    smol::block_on(async {
        let store = Arc::new(RegisterStore::new());
        store.write_holding(10, 0x1234).unwrap();

        let sim = Simulator::bind("127.0.0.1", 0, store).unwrap();
        let addr = sim.local_addr();

        let serve = async {
            sim.serve().await.ok();
        };
        let client = async {
            let stream = Async::<TcpStream>::connect(addr).await.unwrap();
            let mut stack = Stack::new(WireKind::Tcp, true);
            let req = stack.read(1, Area::HoldingRegister, 10, 1);

            let mut stream = stream;
            stream.write_all(&req.bytes).await.unwrap();

            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            match stack.recv(1, &buf[..n]) {
                RecvOutcome::ReadData { bytes, .. } => {
                    assert_eq!(bytes, vec![0x12, 0x34]);
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        };

        or(client, serve).await;
    });
}

#[test]
fn generator_driven_tag_export_round_trips_through_admin() {
    let store = Arc::new(RegisterStore::new());
    admin::config_tags(
        &store,
        &[TagConfig {
            name: "sine1".into(),
            address_str: "1!400001".into(),
            address: 0,
            generator: GeneratorType::Sine,
        }],
    );

    let doc = admin::export_drivers_json(&store, "0.0.0.0", 1502);
    let tags = doc["nodes"][0]["groups"][0]["tags"].as_array().unwrap();
    assert_eq!(tags[0]["name"], "sine1");
    assert_eq!(tags[0]["type"], 9);

    let list = admin::list_tags_json(&store);
    assert_eq!(list["tags"][0]["type"], "sine");
}
