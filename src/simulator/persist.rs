//! Persistence for the simulator's tag configuration: a single row in a local SQLite database,
//! matching the rest of the gateway's "one row per singleton config" persistence convention
//! (`persist/persist.c`'s `sqlite3` usage, scoped here to the one table the simulator needs).

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error};
use crate::simulator::waveform::GeneratorType;

/// One configured simulator tag, as stored in `tags_json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedTag {
    pub name: String,
    pub address_str: String,
    pub address: u16,
    #[serde(with = "generator_repr")]
    pub generator: GeneratorType,
}

/// The full persisted row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SimConfig {
    pub enabled: bool,
    pub tags: Vec<PersistedTag>,
}

mod generator_repr {
    use super::GeneratorType;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(g: &GeneratorType, s: S) -> Result<S::Ok, S::Error> {
        let n: u8 = match g {
            GeneratorType::None => 0,
            GeneratorType::Sine => 1,
            GeneratorType::Saw => 2,
            GeneratorType::Square => 3,
            GeneratorType::Random => 4,
        };
        n.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<GeneratorType, D::Error> {
        Ok(match u8::deserialize(d)? {
            1 => GeneratorType::Sine,
            2 => GeneratorType::Saw,
            3 => GeneratorType::Square,
            4 => GeneratorType::Random,
            _ => GeneratorType::None,
        })
    }
}

/// Open (creating if absent) the simulator's SQLite database and ensure its table exists.
pub fn open(path: impl AsRef<Path>) -> Result<Connection, Error> {
    let conn = Connection::open(path)
        .map_err(|_| Error::Config(ConfigError::Malformed("could not open simulator database")))?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS modbus_tcp_simulator (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            enabled INTEGER NOT NULL,
            tags_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|_| Error::Config(ConfigError::Malformed("modbus_tcp_simulator table")))?;
    Ok(conn)
}

/// Load the single persisted row, if one was ever saved.
pub fn load(conn: &Connection) -> Result<Option<SimConfig>, Error> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT enabled, tags_json FROM modbus_tcp_simulator WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|_| Error::Config(ConfigError::Malformed("modbus_tcp_simulator row")))?;

    let Some((enabled, tags_json)) = row else {
        return Ok(None);
    };

    let tags: Vec<PersistedTag> = serde_json::from_str(&tags_json)
        .map_err(|_| Error::Config(ConfigError::Malformed("tags_json")))?;

    Ok(Some(SimConfig {
        enabled: enabled != 0,
        tags,
    }))
}

/// Upsert the single persisted row with `config`, stamping `updated_at` with `now_ms`.
pub fn save(conn: &Connection, config: &SimConfig, now_ms: i64) -> Result<(), Error> {
    let tags_json = serde_json::to_string(&config.tags)
        .map_err(|_| Error::Config(ConfigError::Malformed("tags_json")))?;

    conn.execute(
        "INSERT INTO modbus_tcp_simulator (id, enabled, tags_json, updated_at)
         VALUES (1, ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET enabled = ?1, tags_json = ?2, updated_at = ?3",
        params![config.enabled as i64, tags_json, now_ms],
    )
    .map_err(|_| Error::Config(ConfigError::Malformed("modbus_tcp_simulator upsert")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE modbus_tcp_simulator (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled INTEGER NOT NULL,
                tags_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )
        .unwrap();

        let config = SimConfig {
            enabled: true,
            tags: vec![PersistedTag {
                name: "sine1".into(),
                address_str: "1!400001".into(),
                address: 0,
                generator: GeneratorType::Sine,
            }],
        };

        save(&conn, &config, 1_700_000_000_000).unwrap();
        let loaded = load(&conn).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_returns_none_when_never_saved() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE modbus_tcp_simulator (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled INTEGER NOT NULL,
                tags_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )
        .unwrap();
        assert_eq!(load(&conn).unwrap(), None);
    }
}
