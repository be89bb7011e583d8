//! Tool host connection lifecycle

mod supervisor;

pub use supervisor::{ConnectionState, ConnectionSupervisor, HostSession, DEFAULT_PROBE_TIMEOUT};
