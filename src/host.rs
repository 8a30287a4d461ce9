//! Capability traits the host process implements, replacing the `void *ctx` + function-pointer
//! callbacks the original stack (`modbus_stack_send`/`modbus_stack_value`/`modbus_stack_write_resp`
//! in `modbus_stack.h`) uses to report data back to its caller.
//!
//! The driver is generic over these traits rather than owning a host reference directly, so it
//! can be exercised in tests against fakes without a real admin plane.

use crate::driver::scatter::Value;
use crate::driver::write_path::WriteValue;
use crate::error::Error;
use crate::point::Point;

/// Supplies the driver with the tag list it should poll, plus a generation counter that
/// increments whenever that list changes so [`crate::driver::plan_cache::PlanCache`] knows to
/// rebuild.
pub trait TagSource {
    fn tags(&self) -> Vec<(String, Point)>;
    fn generation(&self) -> u64;

    /// Which polling group `name` belongs to, if the host organizes its tags into named groups
    /// (spec §6 `group_timer(group)`). `None` (the default) puts every tag in the single
    /// unnamed group [`crate::driver::Driver::poll_cycle`] polls.
    fn group_of(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Receives freshly read values (or per-tag errors) from a completed poll cycle.
pub trait ValueSink {
    fn accept(&mut self, name: &str, value: Result<Value, Error>);
}

/// Requests a write be sent for the named tag.
pub trait Writer {
    fn pending_writes(&mut self) -> Vec<(String, WriteValue)>;
}

/// Reports the outcome of a write the host previously requested via [`Writer`].
pub trait WriteResponder {
    fn write_response(&mut self, name: &str, result: Result<(), Error>);
}
