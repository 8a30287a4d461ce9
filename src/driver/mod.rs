//! The connected driver: owns the transport, the request/response stack, the cached read plan
//! and the connection state machine, and drives one poll cycle at a time.

pub mod cycle;
pub mod degrade;
pub mod plan_cache;
pub mod scatter;
pub mod settings;
pub mod state;
pub mod write_path;

use std::collections::HashMap;

use crate::connection::{Connection, Endpoint};
use crate::error::{Error, PluginError};
use crate::frame::WireKind;
use crate::host::{TagSource, ValueSink, WriteResponder, Writer};
use crate::log::{debug, warn};
use crate::point::{Attribute, EndianDefaults, Point, ValueType};
use crate::stack::Stack;

/// Name of the default polling group a [`crate::host::TagSource`] that doesn't implement
/// [`crate::host::TagSource::group_of`] puts every tag into.
const DEFAULT_GROUP: &str = "";

use cycle::RetryPolicy;
use degrade::BackupPolicy;
use plan_cache::PlanCache;
use settings::Settings;
use state::{DriverStateMachine, Events, States};

/// Only a dead transport or a silent device should push the driver toward its backup endpoint
/// (spec §4.5); a decoded exception or a malformed frame says the device answered, just not with
/// what was asked for, and shouldn't by itself trigger degrade mode.
fn is_device_unreachable(e: &Error) -> bool {
    matches!(
        e,
        Error::Plugin(PluginError::Disconnected) | Error::Plugin(PluginError::DeviceNotResponding)
    )
}

/// A connected Modbus driver instance: one transport, one stack, and one cached read plan per
/// polling group (spec §6 `group_timer(group)`).
pub struct Driver {
    backup: BackupPolicy,
    wire: WireKind,
    check_header: bool,
    retry: RetryPolicy,
    address_base: u16,
    endian_defaults: EndianDefaults,
    state: DriverStateMachine,
    conn: Option<Connection>,
    stack: Stack,
    plans: HashMap<String, PlanCache>,
}

impl Driver {
    pub fn new(
        primary: Endpoint,
        backup: Option<Endpoint>,
        failure_threshold: u32,
        wire: WireKind,
        check_header: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self::with_degrade_time(
            primary,
            backup,
            failure_threshold,
            std::time::Duration::from_secs(600),
            wire,
            check_header,
            retry,
        )
    }

    pub fn with_degrade_time(
        primary: Endpoint,
        backup: Option<Endpoint>,
        failure_threshold: u32,
        degrade_time: std::time::Duration,
        wire: WireKind,
        check_header: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backup: BackupPolicy::with_degrade_time(primary, backup, failure_threshold, degrade_time),
            wire,
            check_header,
            retry,
            address_base: 1,
            endian_defaults: EndianDefaults::default(),
            state: state::new(),
            conn: None,
            stack: Stack::new(wire, check_header),
            plans: HashMap::new(),
        }
    }

    /// Build a [`Driver`] from a validated `setting(json)` document (spec §6).
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        settings.validate()?;
        let mut driver = Self::with_degrade_time(
            settings.primary_endpoint(),
            settings.backup_endpoint(),
            settings.failure_threshold(),
            std::time::Duration::from_secs(settings.degrade_time as u64),
            settings.wire_kind(false),
            settings.check_header,
            settings.retry_policy(),
        );
        driver.address_base = settings.address_base;
        driver.endian_defaults = settings.endian_defaults();
        Ok(driver)
    }

    pub fn state(&self) -> &States {
        self.state.state()
    }

    /// Establish (or re-establish) the transport connection, driving the state machine through
    /// `Connecting` to `Connected`/`Disconnected`.
    pub async fn connect(&mut self) -> Result<(), Error> {
        self.state
            .process_event(Events::Connect)
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;

        if self.backup.tick() {
            debug!("degrade window elapsed, retrying primary endpoint");
        }

        match Connection::open(self.backup.current()).await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.stack = Stack::new(self.wire, self.check_header);
                self.state.process_event(Events::ConnectOk).ok();
                debug!("connected to {:?}", self.backup.current());
                Ok(())
            }
            Err(e) => {
                self.state.process_event(Events::ConnectFail).ok();
                warn!("connect failed: {e}");
                Err(Error::Plugin(PluginError::Disconnected))
            }
        }
    }

    /// Stop the driver; reachable from any state.
    pub fn stop(&mut self) {
        self.state.process_event(Events::Stop).ok();
        self.conn = None;
    }

    /// Run one poll cycle over every cached read group in the default (unnamed) polling group,
    /// feeding results to `sink`. Equivalent to `group_timer("", source, sink)`.
    pub async fn poll_cycle(
        &mut self,
        source: &impl TagSource,
        sink: &mut impl ValueSink,
    ) -> Result<(), Error> {
        self.group_timer(DEFAULT_GROUP, source, sink).await
    }

    /// Fire one poll cycle for `group` (spec §6 `group_timer(group)`): tags the host assigns to
    /// this group via [`TagSource::group_of`] are read, sorted into their own cached plan, and
    /// fed to `sink`; tags in other groups are untouched.
    pub async fn group_timer(
        &mut self,
        group: &str,
        source: &impl TagSource,
        sink: &mut impl ValueSink,
    ) -> Result<(), Error> {
        if *self.state.state() != States::Connected && *self.state.state() != States::Degraded {
            return Err(Error::Plugin(PluginError::Disconnected));
        }

        let tagged: Vec<(String, Point)> = source
            .tags()
            .into_iter()
            .filter(|(name, _)| source.group_of(name).as_deref().unwrap_or(DEFAULT_GROUP) == group)
            .collect();
        let tags: Vec<Point> = tagged.iter().map(|(_, p)| p.clone()).collect();
        let names: HashMap<(u8, crate::frame::Area, u16), String> = tagged
            .into_iter()
            .map(|(name, p)| ((p.unit, p.area, p.start), name))
            .collect();

        let plan = self.plans.entry(group.to_string()).or_insert_with(PlanCache::empty);
        plan.refresh(source.generation(), &tags, self.wire.byte_cap());

        let conn = self
            .conn
            .as_mut()
            .ok_or(Error::Plugin(PluginError::Disconnected))?;

        let mut degrade_trigger = false;
        for rg in plan.groups() {
            match cycle::poll_group(conn, &mut self.stack, rg, self.retry).await {
                Ok(values) => {
                    for (point, value) in values {
                        if let Some(name) = names.get(&(point.unit, point.area, point.start)) {
                            sink.accept(name, Ok(value));
                        }
                    }
                }
                Err(e) => {
                    if is_device_unreachable(&e) {
                        degrade_trigger = true;
                    }
                    for point in &rg.members {
                        if let Some(name) = names.get(&(point.unit, point.area, point.start)) {
                            sink.accept(name, Err(e.clone()));
                        }
                    }
                }
            }
        }

        if degrade_trigger {
            if self.backup.on_failure() {
                warn!("failing over to backup endpoint {:?}", self.backup.current());
                self.conn = None;
                self.state.process_event(Events::CommFail).ok();
            }
        } else {
            self.backup.on_success();
        }

        Ok(())
    }

    /// Validate a tag address against this driver's `address_base`/endian defaults without
    /// adding it to any polling group (spec §6 `validate_tag(tag)`).
    pub fn validate_tag(
        &self,
        address: &str,
        value_type: ValueType,
        attribute: Attribute,
    ) -> Result<(), Error> {
        Point::parse_with_defaults(address, value_type, attribute, self.address_base, self.endian_defaults)
            .map(|_| ())
            .map_err(Error::Tag)
    }

    /// Ad-hoc single-tag read that bypasses the cached plan entirely (spec §6
    /// `test_read_tag(req, tag)`): builds a synthetic one-member group and reads it once, with
    /// no retry beyond what `self.retry` already allows.
    pub async fn test_read_tag(&mut self, point: &Point) -> Result<crate::driver::scatter::Value, Error> {
        let conn = self
            .conn
            .as_mut()
            .ok_or(Error::Plugin(PluginError::Disconnected))?;

        let probe = crate::sorter::ReadGroup {
            unit: point.unit,
            area: point.area,
            start: point.start,
            count: point.n_register,
            members: vec![point.clone()],
        };

        let values = cycle::poll_group(conn, &mut self.stack, &probe, self.retry).await?;
        values
            .into_iter()
            .next()
            .map(|(_, value)| value)
            .ok_or(Error::Plugin(PluginError::ReadFailure))
    }

    /// Send every write the host has queued via [`Writer`], reporting outcomes through
    /// [`WriteResponder`].
    pub async fn flush_writes(
        &mut self,
        source: &impl TagSource,
        writer: &mut impl Writer,
        responder: &mut impl WriteResponder,
    ) -> Result<(), Error> {
        let tags: std::collections::HashMap<String, Point> = source.tags().into_iter().collect();
        let conn = self
            .conn
            .as_mut()
            .ok_or(Error::Plugin(PluginError::Disconnected))?;

        for (name, value) in writer.pending_writes() {
            let Some(point) = tags.get(&name) else {
                responder.write_response(&name, Err(Error::Tag(crate::error::TagError::AddressFormatInvalid)));
                continue;
            };
            let Some(request) = write_path::build(&mut self.stack, point, &value) else {
                responder.write_response(&name, Err(Error::Tag(crate::error::TagError::AttributeNotSupported)));
                continue;
            };

            if conn.send(&request.bytes).await.is_err() {
                responder.write_response(&name, Err(Error::Plugin(PluginError::Disconnected)));
                continue;
            }

            let outcome = cycle::await_write_ack(
                conn,
                &self.stack,
                point.unit,
                &request,
                self.retry.response_timeout,
            )
            .await;
            responder.write_response(&name, outcome);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::settings::Settings;

    #[test]
    fn builds_from_validated_settings() {
        let settings: Settings =
            serde_json::from_str(r#"{"host":"10.0.0.5","port":502,"max_retries":2}"#).unwrap();
        let driver = Driver::from_settings(&settings).unwrap();
        assert_eq!(*driver.state(), States::Disconnected);
    }

    #[test]
    fn validate_tag_rejects_malformed_address() {
        let settings: Settings =
            serde_json::from_str(r#"{"host":"10.0.0.5","port":502}"#).unwrap();
        let driver = Driver::from_settings(&settings).unwrap();
        let attr = Attribute {
            read: true,
            write: false,
            subscribe: false,
        };
        assert!(driver.validate_tag("1!400001", ValueType::Uint16, attr).is_ok());
        assert!(driver.validate_tag("not-an-address", ValueType::Uint16, attr).is_err());
    }

    #[test]
    fn validate_tag_honors_settings_endianess() {
        let settings: Settings =
            serde_json::from_str(r#"{"host":"10.0.0.5","port":502,"endianess_64":"B"}"#).unwrap();
        let driver = Driver::from_settings(&settings).unwrap();
        assert_eq!(
            driver.endian_defaults.endian64,
            crate::point::Endian64::Big
        );
    }
}
