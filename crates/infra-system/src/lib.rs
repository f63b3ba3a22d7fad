// netrecord Infrastructure - System Adapters
// Implements: SpeedMeter (speedtest-cli subprocess), ControlSignal (plain text file)

pub mod control_file;
pub mod speedtest_meter;

pub use control_file::FileControlSignal;
pub use speedtest_meter::{SpeedtestCliMeter, SpeedtestSettings};
