//! Standalone Modbus TCP simulator binary: serves generator-driven registers over TCP and
//! persists its tag configuration to a local SQLite database, so a driver can be exercised
//! against it without real hardware.

use std::env;
use std::sync::Arc;

use log::{error, info};
use neuron_modbus::simulator::admin::TagConfig;
use neuron_modbus::simulator::store::RegisterStore;
use neuron_modbus::simulator::waveform::GeneratorType;
use neuron_modbus::simulator::{admin, persist, Simulator};

fn main() {
    env_logger::init();

    let ip = env::var("MODBUS_SIM_IP").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("MODBUS_SIM_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1502);
    let db_path = env::var("MODBUS_SIM_DB").unwrap_or_else(|_| "modbus_simulator.db".to_string());

    let store = Arc::new(RegisterStore::new());

    match persist::open(&db_path) {
        Ok(conn) => match persist::load(&conn) {
            Ok(Some(config)) => {
                let tags: Vec<TagConfig> = config
                    .tags
                    .into_iter()
                    .map(|t| TagConfig {
                        name: t.name,
                        address_str: t.address_str,
                        address: t.address,
                        generator: t.generator,
                    })
                    .collect();
                admin::config_tags(&store, &tags);
                info!("loaded {} persisted simulator tags", tags.len());
            }
            Ok(None) => seed_default_tags(&store),
            Err(e) => {
                error!("failed to load simulator config, seeding defaults: {e}");
                seed_default_tags(&store);
            }
        },
        Err(e) => {
            error!("failed to open simulator database, running without persistence: {e}");
            seed_default_tags(&store);
        }
    }

    let sim = match Simulator::bind(&ip, port, store) {
        Ok(sim) => sim,
        Err(e) => {
            error!("failed to bind simulator listener on {ip}:{port}: {e}");
            std::process::exit(1);
        }
    };
    info!("modbus simulator listening on {}", sim.local_addr());

    smol::block_on(async {
        let tick = sim.run_generator_tick();
        let serve = async {
            if let Err(e) = sim.serve().await {
                error!("simulator accept loop exited: {e}");
            }
        };
        futures_lite::future::or(tick, serve).await;
    });
}

fn seed_default_tags(store: &RegisterStore) {
    admin::config_tags(
        store,
        &[
            TagConfig {
                name: "sim_sine_0".into(),
                address_str: "1!400001".into(),
                address: 0,
                generator: GeneratorType::Sine,
            },
            TagConfig {
                name: "sim_saw_2".into(),
                address_str: "1!400003".into(),
                address: 2,
                generator: GeneratorType::Saw,
            },
            TagConfig {
                name: "sim_square_3".into(),
                address_str: "1!400004".into(),
                address: 3,
                generator: GeneratorType::Square,
            },
            TagConfig {
                name: "sim_random_4".into(),
                address_str: "1!400005".into(),
                address: 4,
                generator: GeneratorType::Random,
            },
        ],
    );
}
