//! Connection state machine: `Disconnected -> Connecting -> Connected -> Degraded -> Stopped`.
//!
//! Built with `smlang`, the state-machine crate the teacher already depends on but only sketches
//! (commented out) in its own DS402 driver. The shape mirrors that sketch: a flat
//! `transitions:` table plus a `StateMachineContext` impl for any guard/action hooks.

use smlang::statemachine;

statemachine! {
    transitions: {
        *Disconnected + Connect = Connecting,
        Connecting + ConnectOk = Connected,
        Connecting + ConnectFail = Disconnected,
        Connected + CommFail = Degraded,
        Degraded + Recover = Connected,
        Degraded + GiveUp = Disconnected,
        Connected + Disconnect = Disconnected,
        Degraded + Disconnect = Disconnected,
        Connecting + Disconnect = Disconnected,
        _ + Stop = Stopped,
    }
}

/// Context carried by the state machine. Currently holds no guard/action state of its own; the
/// driver's retry bookkeeping lives in [`crate::driver::cycle`] instead.
pub struct Context;

impl StateMachineContext for Context {}

/// The driver's connection state machine, `Context`-parameterized per `smlang`'s generated API.
pub type DriverStateMachine = StateMachine<Context>;

pub fn new() -> DriverStateMachine {
    StateMachine::new(Context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let sm = new();
        assert_eq!(*sm.state(), States::Disconnected);
    }

    #[test]
    fn connect_then_connect_ok_reaches_connected() {
        let mut sm = new();
        sm.process_event(Events::Connect).unwrap();
        assert_eq!(*sm.state(), States::Connecting);
        sm.process_event(Events::ConnectOk).unwrap();
        assert_eq!(*sm.state(), States::Connected);
    }

    #[test]
    fn comm_fail_degrades_then_recovers() {
        let mut sm = new();
        sm.process_event(Events::Connect).unwrap();
        sm.process_event(Events::ConnectOk).unwrap();
        sm.process_event(Events::CommFail).unwrap();
        assert_eq!(*sm.state(), States::Degraded);
        sm.process_event(Events::Recover).unwrap();
        assert_eq!(*sm.state(), States::Connected);
    }

    #[test]
    fn stop_is_reachable_from_any_state() {
        let mut sm = new();
        sm.process_event(Events::Stop).unwrap();
        assert_eq!(*sm.state(), States::Stopped);
    }

    #[test]
    fn invalid_event_is_rejected() {
        let mut sm = new();
        assert!(sm.process_event(Events::CommFail).is_err());
    }
}
