pub mod test_bus;
pub mod trace;

pub use log_capture::{at_level, capture_logs, init_logging, CapturedLog};
pub use packet_builder::PacketBuilder;
pub use test_bus::{u32_property, TestBus};
pub use trace::TraceRecorder;
pub use wait::{wait_until, DEFAULT_TIMEOUT};
