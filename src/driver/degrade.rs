//! Backup endpoint failover: after enough consecutive communication failures on the primary
//! endpoint, fail over to a configured backup for a fixed `degrade_time` window, then retry the
//! primary preferentially (spec §4.5) — failback is time-gated, not triggered by the first
//! successful exchange on backup.

use std::time::{Duration, Instant};

use crate::connection::Endpoint;

/// Tracks which endpoint is currently active, how many consecutive failures have been seen, and
/// (while on backup) how long the degrade window has left to run.
pub struct BackupPolicy {
    primary: Endpoint,
    backup: Option<Endpoint>,
    failure_threshold: u32,
    degrade_time: Duration,
    consecutive_failures: u32,
    on_backup: bool,
    backup_since: Option<Instant>,
}

impl BackupPolicy {
    pub fn new(primary: Endpoint, backup: Option<Endpoint>, failure_threshold: u32) -> Self {
        Self::with_degrade_time(primary, backup, failure_threshold, Duration::from_secs(600))
    }

    pub fn with_degrade_time(
        primary: Endpoint,
        backup: Option<Endpoint>,
        failure_threshold: u32,
        degrade_time: Duration,
    ) -> Self {
        Self {
            primary,
            backup,
            failure_threshold: failure_threshold.max(1),
            degrade_time,
            consecutive_failures: 0,
            on_backup: false,
            backup_since: None,
        }
    }

    /// Expire the degrade window if it has run its course, failing back to the primary. Called
    /// once per connection attempt so a stale `on_backup` state never outlives `degrade_time`.
    pub fn tick(&mut self) -> bool {
        let Some(since) = self.backup_since else {
            return false;
        };
        if since.elapsed() >= self.degrade_time {
            self.on_backup = false;
            self.backup_since = None;
            true
        } else {
            false
        }
    }

    /// The endpoint a new connection attempt should use.
    pub fn current(&self) -> &Endpoint {
        if self.on_backup {
            self.backup.as_ref().unwrap_or(&self.primary)
        } else {
            &self.primary
        }
    }

    /// Record a successful exchange: resets the failure count. While on backup, the endpoint
    /// stays on backup until `degrade_time` elapses and [`Self::tick`] fails back — a lone
    /// success doesn't end the degrade window.
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Record a failed exchange. Returns `true` if this call just triggered a failover to the
    /// backup endpoint.
    pub fn on_failure(&mut self) -> bool {
        if self.on_backup || self.backup.is_none() {
            return false;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_threshold {
            self.on_backup = true;
            self.backup_since = Some(Instant::now());
            self.consecutive_failures = 0;
            return true;
        }
        false
    }

    pub fn is_on_backup(&self) -> bool {
        self.on_backup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(host: &str) -> Endpoint {
        Endpoint::Tcp {
            host: host.to_string(),
            port: 502,
        }
    }

    #[test]
    fn fails_over_after_threshold() {
        let mut policy = BackupPolicy::new(ep("primary"), Some(ep("backup")), 3);
        assert!(!policy.on_failure());
        assert!(!policy.on_failure());
        assert!(policy.on_failure());
        assert!(policy.is_on_backup());
        assert_eq!(policy.current(), &ep("backup"));
    }

    #[test]
    fn success_on_backup_does_not_fail_back_before_degrade_time() {
        let mut policy = BackupPolicy::with_degrade_time(
            ep("primary"),
            Some(ep("backup")),
            1,
            Duration::from_secs(600),
        );
        policy.on_failure();
        assert!(policy.is_on_backup());
        policy.on_success();
        assert!(policy.is_on_backup());
        assert!(!policy.tick());
        assert_eq!(policy.current(), &ep("backup"));
    }

    #[test]
    fn tick_fails_back_once_degrade_time_elapses() {
        let mut policy =
            BackupPolicy::with_degrade_time(ep("primary"), Some(ep("backup")), 1, Duration::from_millis(0));
        policy.on_failure();
        assert!(policy.is_on_backup());
        assert!(policy.tick());
        assert!(!policy.is_on_backup());
        assert_eq!(policy.current(), &ep("primary"));
    }

    #[test]
    fn no_backup_configured_never_fails_over() {
        let mut policy = BackupPolicy::new(ep("primary"), None, 1);
        assert!(!policy.on_failure());
        assert_eq!(policy.current(), &ep("primary"));
    }
}
