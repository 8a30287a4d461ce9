//! The driver's `setting(json)` surface (spec §6): deserialized with `serde`, validated once,
//! and turned into the plain constructor arguments [`crate::driver::Driver::new`] and
//! [`crate::connection::Endpoint`] expect.
//!
//! Mirrors `ethercrab::ClientConfig`'s plain-struct-with-defaults shape rather than a builder,
//! matching how `modbus_point.c`'s `neu_plugin_group_t` settings are a flat key/value bag with
//! `#define`d defaults.

use serde::Deserialize;

use crate::connection::Endpoint;
use crate::driver::cycle::RetryPolicy;
use crate::error::{ConfigError, Error};
use crate::frame::WireKind;
use crate::point::{Endian16, Endian32, Endian64, EndianDefaults};

fn default_interval() -> u32 {
    0
}

fn default_max_retries() -> u32 {
    0
}

fn default_retry_interval() -> u32 {
    0
}

fn default_timeout() -> u32 {
    3000
}

fn default_degrade_cycle() -> u32 {
    2
}

fn default_degrade_time() -> u32 {
    600
}

fn default_address_base() -> u16 {
    1
}

fn default_endianess() -> String {
    "ABCD".to_string()
}

fn default_endianess_64() -> String {
    "LL".to_string()
}

/// Raw `setting(json)` keys, deserialized as-is before [`Settings::validate`] checks them.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default)]
    pub connection_mode: u8,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u32,
    #[serde(default)]
    pub check_header: bool,
    #[serde(default)]
    pub device_degrade: bool,
    #[serde(default = "default_degrade_cycle")]
    pub degrade_cycle: u32,
    #[serde(default = "default_degrade_time")]
    pub degrade_time: u32,
    #[serde(default = "default_address_base")]
    pub address_base: u16,
    #[serde(default)]
    pub backup_host: Option<String>,
    #[serde(default)]
    pub backup_port: Option<u16>,
    /// 32-bit/float word/byte order, in the `ABCD`-style four-letter notation (`ABCD` = no
    /// swap, `DCBA` = full swap, `BADC` = byte-swap only, `CDAB` = word-swap only).
    #[serde(default = "default_endianess")]
    pub endianess: String,
    /// 64-bit/double byte order: `LL`/`L` or `BB`/`B`.
    #[serde(default = "default_endianess_64")]
    pub endianess_64: String,

    // RTU-only
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub baud: Option<u32>,
    #[serde(default)]
    pub parity: Option<String>,
    #[serde(default)]
    pub stop: Option<u8>,
    #[serde(default)]
    pub flow: Option<String>,
}

impl Settings {
    /// Check the ranges spec §6 names, producing the same [`ConfigError`] taxonomy the host
    /// contract expects for a rejected `setting(json)` call.
    pub fn validate(&self) -> Result<(), Error> {
        if self.port == 0 {
            return Err(Error::Config(ConfigError::OutOfRange {
                key: "port",
                value: "0".to_string(),
            }));
        }
        if self.timeout == 0 {
            return Err(Error::Config(ConfigError::Malformed("timeout must be > 0")));
        }
        if self.degrade_cycle == 0 {
            return Err(Error::Config(ConfigError::Malformed("degrade_cycle must be >= 1")));
        }
        if self.address_base > 1 {
            return Err(Error::Config(ConfigError::Malformed("address_base must be 0 or 1")));
        }
        if self.device.is_none() && self.host.is_empty() {
            return Err(Error::Config(ConfigError::Malformed("host must not be empty")));
        }
        if parse_endianess(&self.endianess).is_none() {
            return Err(Error::Config(ConfigError::Malformed("endianess must be one of ABCD/BADC/CDAB/DCBA")));
        }
        if parse_endianess_64(&self.endianess_64).is_none() {
            return Err(Error::Config(ConfigError::Malformed("endianess_64 must be L/LL or B/BB")));
        }
        Ok(())
    }

    /// The group-wide endian fallback [`crate::point::Point::parse_with_defaults`] should use
    /// for tags whose address string carries no `#`-suffix.
    pub fn endian_defaults(&self) -> EndianDefaults {
        EndianDefaults {
            endian16: Endian16::Little,
            endian32: parse_endianess(&self.endianess).unwrap_or_default(),
            endian64: parse_endianess_64(&self.endianess_64).unwrap_or_default(),
        }
    }

    /// Is this configuration for a serial (RTU) link rather than TCP?
    pub fn is_serial(&self) -> bool {
        self.device.is_some()
    }

    pub fn wire_kind(&self, extended: bool) -> WireKind {
        if self.is_serial() {
            WireKind::Rtu
        } else if extended {
            WireKind::TcpExtended
        } else {
            WireKind::Tcp
        }
    }

    pub fn primary_endpoint(&self) -> Endpoint {
        if let Some(device) = &self.device {
            Endpoint::Serial {
                path: device.clone(),
                baud_rate: self.baud.unwrap_or(9600),
            }
        } else {
            Endpoint::Tcp {
                host: self.host.clone(),
                port: self.port,
            }
        }
    }

    pub fn backup_endpoint(&self) -> Option<Endpoint> {
        let host = self.backup_host.clone()?;
        let port = self.backup_port.unwrap_or(self.port);
        Some(Endpoint::Tcp { host, port })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_interval: std::time::Duration::from_millis(self.retry_interval as u64),
            response_timeout: std::time::Duration::from_millis(self.timeout as u64),
        }
    }

    /// The failure-count threshold degrade mode triggers at; `0` (disabled) collapses to "never".
    pub fn failure_threshold(&self) -> u32 {
        if self.device_degrade {
            self.degrade_cycle
        } else {
            u32::MAX
        }
    }
}

fn parse_endianess(s: &str) -> Option<Endian32> {
    match s {
        "ABCD" => Some(Endian32::BigBig),
        "DCBA" => Some(Endian32::LittleLittle),
        "BADC" => Some(Endian32::BigLittle),
        "CDAB" => Some(Endian32::LittleBig),
        _ => None,
    }
}

fn parse_endianess_64(s: &str) -> Option<Endian64> {
    match s {
        "L" | "LL" => Some(Endian64::Little),
        "B" | "BB" => Some(Endian64::Big),
        _ => None,
    }
}
