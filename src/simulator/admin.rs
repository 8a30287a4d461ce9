//! Admin-facing operations on a running simulator: status, start/stop, tag configuration, and
//! the two JSON export shapes the gateway's REST plane consumes (`export_drivers_json`,
//! `list_tags_json`), grounded on `neu_modbus_simulator_*` in `modbus_tcp_simulator.c`.

use serde::Serialize;
use serde_json::{json, Value};

use crate::simulator::store::RegisterStore;
use crate::simulator::waveform::GeneratorType;

/// A tag the admin asked the simulator to drive with a generator.
#[derive(Debug, Clone)]
pub struct TagConfig {
    pub name: String,
    pub address_str: String,
    pub address: u16,
    pub generator: GeneratorType,
}

/// Current simulator status, mirroring `neu_modbus_simulator_status_t`.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub running: bool,
    pub ip: String,
    pub port: u16,
    pub tag_count: usize,
    pub error: i32,
}

pub fn status(running: bool, ip: &str, port: u16, store: &RegisterStore, error: i32) -> Status {
    Status {
        running,
        ip: ip.to_string(),
        port,
        tag_count: store.tag_count(),
        error,
    }
}

/// Apply a full tag configuration, replacing whatever was previously configured.
pub fn config_tags(store: &RegisterStore, tags: &[TagConfig]) {
    store.reset();
    for tag in tags {
        store.mark_tag(
            tag.address,
            tag.generator,
            tag.name.clone(),
            tag.address_str.clone(),
        );
    }
}

fn generator_name(g: GeneratorType) -> &'static str {
    match g {
        GeneratorType::None => "",
        GeneratorType::Sine => "sine",
        GeneratorType::Saw => "saw",
        GeneratorType::Square => "square",
        GeneratorType::Random => "random",
    }
}

/// `0.0.0.0` (or an empty string) isn't a connectable host from outside this process; the
/// original substitutes the loopback address in any client-facing export.
fn display_host(ip: &str) -> &str {
    if ip.is_empty() || ip == "0.0.0.0" {
        "127.0.0.1"
    } else {
        ip
    }
}

/// Build the `export_drivers_json` document: one synthetic Modbus TCP node/group pointed at
/// this simulator, with one tag per configured generator.
pub fn export_drivers_json(store: &RegisterStore, ip: &str, port: u16) -> Value {
    let tags: Vec<Value> = store
        .tags_snapshot()
        .into_iter()
        .map(|(addr, meta)| {
            let type_code = match meta.generator {
                GeneratorType::Sine => 9, // NEU_TYPE_FLOAT
                _ => 3,                  // NEU_TYPE_INT16
            };
            let name = meta
                .name
                .unwrap_or_else(|| format!("sim_{}_{addr}", generator_name(meta.generator)));
            let address = meta
                .address
                .unwrap_or_else(|| format!("1!4{}", addr + 1));
            json!({
                "name": name,
                "address": address,
                "type": type_code,
                "attribute": 1, // NEU_ATTRIBUTE_READ
                "precision": 0,
                "decimal": 0.0,
                "bias": 0.0,
                "description": "",
            })
        })
        .collect();

    json!({
        "nodes": [{
            "plugin": "Modbus TCP",
            "name": "ModbusTCP_Simulator",
            "params": {
                "host": display_host(ip),
                "port": port,
                "address_base": 1,
                "backup_port": 502,
                "check_header": 0,
                "connection_mode": 0,
                "degrade_cycle": 2,
                "degrade_time": 600,
                "device_degrade": 0,
                "endianess": 1,
                "interval": 20,
                "max_retries": 0,
                "retry_interval": 0,
                "timeout": 3000,
                "name": "ModbusTCP_Simulator",
                "plugin": "Modbus TCP",
            },
            "groups": [{
                "group": "group1",
                "interval": 1000,
                "tags": tags,
            }],
        }]
    })
}

/// Build the `list_tags_json` document: a flat list of `{type, name, address}`.
pub fn list_tags_json(store: &RegisterStore) -> Value {
    let tags: Vec<Value> = store
        .tags_snapshot()
        .into_iter()
        .map(|(_, meta)| {
            json!({
                "type": generator_name(meta.generator),
                "name": meta.name.unwrap_or_default(),
                "address": meta.address.unwrap_or_default(),
            })
        })
        .collect();
    json!({ "tags": tags })
}
