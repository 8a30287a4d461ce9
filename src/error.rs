//! Error types for the Modbus driver subsystem.

use std::fmt;

/// Top level error for the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A tag (point) failed to parse or is not admissible in the role requested.
    Tag(TagError),
    /// A transport, protocol or device level failure while the driver was running.
    Plugin(PluginError),
    /// A configuration value was rejected.
    Config(ConfigError),
    /// Low level framing error (MBAP/RTU/CRC).
    Frame(FrameError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Tag(e) => write!(f, "tag: {e}"),
            Error::Plugin(e) => write!(f, "plugin: {e}"),
            Error::Config(e) => write!(f, "config: {e}"),
            Error::Frame(e) => write!(f, "frame: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// The stable numeric code the host contract expects to see attached to a per-tag
    /// `ERROR` value (see spec §6/§7).
    pub fn code(&self) -> i32 {
        match self {
            Error::Tag(e) => e.code(),
            Error::Plugin(e) => e.code(),
            Error::Config(e) => e.code(),
            Error::Frame(_) => PluginError::ProtocolDecodeFailure.code(),
        }
    }
}

/// Errors produced by [`crate::point`]'s address parser and attribute validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagError {
    /// The address string did not match the `<unit>!<area><pos>[...]` grammar.
    AddressFormatInvalid,
    /// The tag's declared type is not legal in its area (e.g. `FLOAT` in a coil area).
    TypeNotSupported,
    /// The tag's attribute flags are not legal for its area (e.g. `WRITE` on an input register).
    AttributeNotSupported,
}

impl TagError {
    pub fn code(&self) -> i32 {
        match self {
            TagError::AddressFormatInvalid => 1001,
            TagError::TypeNotSupported => 1002,
            TagError::AttributeNotSupported => 1003,
        }
    }
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::AddressFormatInvalid => f.write_str("TAG_ADDRESS_FORMAT_INVALID"),
            TagError::TypeNotSupported => f.write_str("TAG_TYPE_NOT_SUPPORT"),
            TagError::AttributeNotSupported => f.write_str("TAG_ATTRIBUTE_NOT_SUPPORT"),
        }
    }
}

/// Errors the running [`crate::driver::Driver`] attributes to tags or surfaces to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginError {
    /// No bytes were sent because the transport is not connected.
    Disconnected,
    /// The device returned an exception, or the response doesn't cover the requested tag.
    ReadFailure,
    /// MBAP/CRC/framing failed to decode.
    ProtocolDecodeFailure,
    /// Zero bytes were received within the response window.
    DeviceNotResponding,
}

impl PluginError {
    pub fn code(&self) -> i32 {
        match self {
            PluginError::Disconnected => 2001,
            PluginError::ReadFailure => 2002,
            PluginError::ProtocolDecodeFailure => 2003,
            PluginError::DeviceNotResponding => 2004,
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginError::Disconnected => f.write_str("PLUGIN_DISCONNECTED"),
            PluginError::ReadFailure => f.write_str("PLUGIN_READ_FAILURE"),
            PluginError::ProtocolDecodeFailure => f.write_str("PLUGIN_PROTOCOL_DECODE_FAILURE"),
            PluginError::DeviceNotResponding => f.write_str("PLUGIN_DEVICE_NOT_RESPONSE"),
        }
    }
}

/// Errors rejecting a `setting(json)` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `host` is not a valid IPv4/IPv6 address or `0.0.0.0`.
    InvalidAddress(String),
    /// `host`/`port` combination is already bound by this process.
    AddressInUse,
    /// A numeric setting is out of its documented range.
    OutOfRange {
        /// Name of the offending key.
        key: &'static str,
        /// The rejected value, formatted for display.
        value: String,
    },
    /// A required key was missing or had the wrong JSON type.
    Malformed(&'static str),
}

impl ConfigError {
    pub fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidAddress(_) => 3001,
            ConfigError::AddressInUse => 3002,
            ConfigError::OutOfRange { .. } => 3003,
            ConfigError::Malformed(_) => 3004,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress(addr) => write!(f, "IP_ADDRESS_INVALID: {addr}"),
            ConfigError::AddressInUse => f.write_str("IP_ADDRESS_IN_USE"),
            ConfigError::OutOfRange { key, value } => {
                write!(f, "setting {key} out of range: {value}")
            }
            ConfigError::Malformed(key) => write!(f, "setting {key} missing or malformed"),
        }
    }
}

/// Low level wire framing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// MBAP header's `protocol` field was non-zero.
    BadProtocolId,
    /// MBAP `len` field claimed more bytes than are actually present.
    LengthMismatch,
    /// RTU CRC-16 check failed.
    CrcMismatch,
    /// Buffer was too short to contain the structure being decoded.
    Truncated,
    /// Buffer did not have enough remaining capacity to encode the structure.
    Capacity,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BadProtocolId => f.write_str("MBAP protocol id was not zero"),
            FrameError::LengthMismatch => f.write_str("MBAP length exceeds remaining bytes"),
            FrameError::CrcMismatch => f.write_str("RTU CRC-16 check failed"),
            FrameError::Truncated => f.write_str("buffer too short to decode"),
            FrameError::Capacity => f.write_str("buffer has insufficient capacity to encode"),
        }
    }
}

impl From<TagError> for Error {
    fn from(e: TagError) -> Self {
        Error::Tag(e)
    }
}

impl From<PluginError> for Error {
    fn from(e: PluginError) -> Self {
        Error::Plugin(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}
