// Probe constants (no magic values)
use std::time::Duration;

/// Sleep between a persisted record and the next control poll (15 min)
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Network timeout handed to the measurement tool (10s)
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Wall-clock bound on one measurement process (3 min)
/// A full ping/download/upload run takes well over the tool timeout.
pub const DEFAULT_MEASURE_DEADLINE: Duration = Duration::from_secs(180);

/// Bound on acquiring the database handle (10s)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period between SIGTERM and SIGKILL for a stuck measurement (5s)
pub const GRACEFUL_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Process exit codes
pub const EXIT_REQUESTED_STOP: u8 = 0;
pub const EXIT_CONTROL_SIGNAL_FAILURE: u8 = 1;
pub const EXIT_CYCLE_FAILURE: u8 = 2;
pub const EXIT_STARTUP_FAILURE: u8 = 3;
