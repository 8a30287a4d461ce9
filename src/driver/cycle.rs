//! One poll-cycle exchange: send a group's read request, wait for its response (retrying on
//! timeout), and scatter the result into per-tag values.
//!
//! Grounded on `modbus_group_timer`/`modbus_stack_read_retry` (`modbus_req.c`): each group in a
//! polling interval is read once per tick, retried up to `retry times` on timeout, with
//! `retry_interval` milliseconds between attempts.

use std::time::Duration;

use async_io::Timer;
use futures_lite::future;

use crate::connection::Connection;
use crate::driver::scatter::{self, Value};
use crate::error::{Error, PluginError};
use crate::point::Point;
use crate::sorter::ReadGroup;
use crate::stack::{RecvOutcome, Request, Stack};

/// Retry behavior for one group's read, mirroring the host-configured `retry times` /
/// `retry_interval` settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub response_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval: Duration::from_millis(100),
            response_timeout: Duration::from_millis(500),
        }
    }
}

/// Read `group` once, retrying per `retry` on timeout or decode failure, then scatter every
/// member tag's value out of the response payload.
pub async fn poll_group(
    conn: &mut Connection,
    stack: &mut Stack,
    group: &ReadGroup<Point>,
    retry: RetryPolicy,
) -> Result<Vec<(Point, Value)>, Error> {
    let mut last_err = Error::Plugin(PluginError::DeviceNotResponding);

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            Timer::after(retry.retry_interval).await;
        }

        match try_once(conn, stack, group, group.unit, retry.response_timeout).await {
            Ok(bytes) => {
                let values = group
                    .members
                    .iter()
                    .filter_map(|point| {
                        scatter::scatter(point, group.start, &bytes).map(|v| (point.clone(), v))
                    })
                    .collect();
                return Ok(values);
            }
            Err(e) => last_err = e,
        }
    }

    Err(last_err)
}

async fn try_once(
    conn: &mut Connection,
    stack: &mut Stack,
    group: &ReadGroup<Point>,
    unit: u8,
    response_timeout: Duration,
) -> Result<Vec<u8>, Error> {
    let request = stack.read(group.unit, group.area, group.start, group.count);

    conn.send(&request.bytes)
        .await
        .map_err(|_| Error::Plugin(PluginError::Disconnected))?;

    let mut buf = vec![0u8; request.expected_response_len + 16];

    future::or(read_until_complete(conn, stack, unit, &mut buf), timeout(response_timeout)).await
}

/// Keep reading off `conn` until `stack` can parse a complete response out of what's
/// accumulated, or a terminal protocol error is seen.
pub(crate) async fn read_until_complete(
    conn: &mut Connection,
    stack: &Stack,
    unit: u8,
    buf: &mut [u8],
) -> Result<Vec<u8>, Error> {
    let mut filled = 0;
    loop {
        let n = conn
            .recv(&mut buf[filled..])
            .await
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        if n == 0 {
            return Err(Error::Plugin(PluginError::DeviceNotResponding));
        }
        filled += n;

        match stack.recv(unit, &buf[..filled]) {
            RecvOutcome::ReadData { bytes, .. } => return Ok(bytes),
            RecvOutcome::Exception { .. } => return Err(Error::Plugin(PluginError::ReadFailure)),
            RecvOutcome::WriteAck { .. } => {
                return Err(Error::Plugin(PluginError::ProtocolDecodeFailure))
            }
            RecvOutcome::NeedMore => continue,
        }
    }
}

async fn timeout(duration: Duration) -> Result<Vec<u8>, Error> {
    Timer::after(duration).await;
    Err(Error::Plugin(PluginError::DeviceNotResponding))
}

/// Send `request` and wait for its write acknowledgement (or exception), mirroring
/// `modbus_stack_write`'s synchronous send-then-recv in `modbus_req.c`: a write isn't reported
/// to the host as successful until the device actually echoes it back.
pub async fn await_write_ack(
    conn: &mut Connection,
    stack: &Stack,
    unit: u8,
    request: &Request,
    response_timeout: Duration,
) -> Result<(), Error> {
    let mut buf = vec![0u8; request.expected_response_len + 16];
    future::or(read_write_ack(conn, stack, unit, &mut buf), timeout_unit(response_timeout)).await
}

async fn read_write_ack(
    conn: &mut Connection,
    stack: &Stack,
    unit: u8,
    buf: &mut [u8],
) -> Result<(), Error> {
    let mut filled = 0;
    loop {
        let n = conn
            .recv(&mut buf[filled..])
            .await
            .map_err(|_| Error::Plugin(PluginError::Disconnected))?;
        if n == 0 {
            return Err(Error::Plugin(PluginError::DeviceNotResponding));
        }
        filled += n;

        match stack.recv(unit, &buf[..filled]) {
            RecvOutcome::WriteAck { .. } => return Ok(()),
            RecvOutcome::Exception { .. } => return Err(Error::Plugin(PluginError::ReadFailure)),
            RecvOutcome::ReadData { .. } => return Err(Error::Plugin(PluginError::ProtocolDecodeFailure)),
            RecvOutcome::NeedMore => continue,
        }
    }
}

async fn timeout_unit(duration: Duration) -> Result<(), Error> {
    Timer::after(duration).await;
    Err(Error::Plugin(PluginError::DeviceNotResponding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy_is_sane() {
        let retry = RetryPolicy::default();
        assert!(retry.max_retries > 0);
        assert!(retry.retry_interval < retry.response_timeout);
    }
}
