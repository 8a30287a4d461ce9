//! Runs a real [`Driver`] against a real [`Simulator`] over a loopback TCP socket: connect, poll
//! one cycle, and check the scattered value the sink received.

use std::sync::Arc;

use futures_lite::future::or;

use neuron_modbus::connection::Endpoint;
use neuron_modbus::driver::cycle::RetryPolicy;
use neuron_modbus::driver::scatter::Value;
use neuron_modbus::driver::write_path::WriteValue;
use neuron_modbus::driver::Driver;
use neuron_modbus::error::Error;
use neuron_modbus::frame::WireKind;
use neuron_modbus::host::{TagSource, ValueSink, WriteResponder, Writer};
use neuron_modbus::point::{Attribute, Point, ValueType};
use neuron_modbus::simulator::store::RegisterStore;
use neuron_modbus::simulator::Simulator;

struct FakeTags {
    tags: Vec<(String, Point)>,
    generation: u64,
    groups: Vec<(String, String)>,
}

impl TagSource for FakeTags {
    fn tags(&self) -> Vec<(String, Point)> {
        self.tags.clone()
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn group_of(&self, name: &str) -> Option<String> {
        self.groups
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| g.clone())
    }
}

#[derive(Default)]
struct FakeSink {
    values: Vec<(String, Result<Value, Error>)>,
}

impl ValueSink for FakeSink {
    fn accept(&mut self, name: &str, value: Result<Value, Error>) {
        self.values.push((name.to_string(), value));
    }
}

impl Writer for FakeSink {
    fn pending_writes(&mut self) -> Vec<(String, WriteValue)> {
        Vec::new()
    }
}

impl WriteResponder for FakeSink {
    fn write_response(&mut self, _name: &str, _result: Result<(), Error>) {}
}

fn tag(name: &str, addr: &str) -> (String, Point) {
    (
        name.to_string(),
        Point::parse(
            addr,
            ValueType::Uint16,
            Attribute {
                read: true,
                write: false,
                subscribe: false,
            },
            1,
        )
        .unwrap(),
    )
}

#[test]
fn poll_cycle_reports_value_from_live_simulator() {
    smol::block_on(async {
        let store = Arc::new(RegisterStore::new());
        store.write_holding(0, 99).unwrap();

        let sim = Simulator::bind("127.0.0.1", 0, store).unwrap();
        let addr = sim.local_addr();

        let serve = async {
            sim.serve().await.ok();
        };

        let run = async {
            let mut driver = Driver::new(
                Endpoint::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                },
                None,
                3,
                WireKind::Tcp,
                true,
                RetryPolicy::default(),
            );
            driver.connect().await.unwrap();

            let source = FakeTags {
                tags: vec![tag("temp", "1!400001")],
                generation: 1,
                groups: Vec::new(),
            };
            let mut sink = FakeSink::default();

            driver.poll_cycle(&source, &mut sink).await.unwrap();

            assert_eq!(sink.values.len(), 1);
            assert_eq!(sink.values[0].0, "temp");
            assert_eq!(sink.values[0].1.as_ref().unwrap(), &Value::U16(99));
        };

        or(run, serve).await;
    });
}

#[test]
fn test_read_tag_bypasses_the_cached_plan() {
    smol::block_on(async {
        let store = Arc::new(RegisterStore::new());
        store.write_holding(5, 7).unwrap();

        let sim = Simulator::bind("127.0.0.1", 0, store).unwrap();
        let addr = sim.local_addr();

        let serve = async {
            sim.serve().await.ok();
        };

        let run = async {
            let mut driver = Driver::new(
                Endpoint::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                },
                None,
                3,
                WireKind::Tcp,
                true,
                RetryPolicy::default(),
            );
            driver.connect().await.unwrap();

            let (_, point) = tag("probe", "1!400006");
            let value = driver.test_read_tag(&point).await.unwrap();
            assert_eq!(value, Value::U16(7));
        };

        or(run, serve).await;
    });
}

#[test]
fn group_timer_only_polls_its_own_group() {
    smol::block_on(async {
        let store = Arc::new(RegisterStore::new());
        store.write_holding(0, 11).unwrap();
        store.write_holding(1, 22).unwrap();

        let sim = Simulator::bind("127.0.0.1", 0, store).unwrap();
        let addr = sim.local_addr();

        let serve = async {
            sim.serve().await.ok();
        };

        let run = async {
            let mut driver = Driver::new(
                Endpoint::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                },
                None,
                3,
                WireKind::Tcp,
                true,
                RetryPolicy::default(),
            );
            driver.connect().await.unwrap();

            let source = FakeTags {
                tags: vec![tag("fast_tag", "1!400001"), tag("slow_tag", "1!400002")],
                generation: 1,
                groups: vec![
                    ("fast_tag".to_string(), "fast".to_string()),
                    ("slow_tag".to_string(), "slow".to_string()),
                ],
            };
            let mut sink = FakeSink::default();

            driver.group_timer("fast", &source, &mut sink).await.unwrap();

            assert_eq!(sink.values.len(), 1);
            assert_eq!(sink.values[0].0, "fast_tag");
            assert_eq!(sink.values[0].1.as_ref().unwrap(), &Value::U16(11));
        };

        or(run, serve).await;
    });
}
