//! Structured logging shim.
//!
//! The driver and simulator run inside a host process that already owns a
//! `log`-compatible subscriber, so this module is a thin re-export rather
//! than a full facade. It exists as its own module, loaded first from
//! [`crate::lib`], purely so call sites elsewhere in the crate read the same
//! whether they say `fmt::error!(...)` or `log::error!(...)` — keeping one
//! place to change if a structured/`tracing`-style backend replaces `log`.

#![macro_use]
#![allow(unused_imports)]

pub(crate) use log::{debug, error, info, trace, warn};
