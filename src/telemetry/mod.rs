pub mod class_monitor;
pub mod emitter;
pub mod overlay;
pub mod sink;

pub use class_monitor::{ClassDistributionMonitor, ClassRatios};
pub use emitter::TelemetryEmitter;
pub use overlay::render_hard_rois;
pub use sink::{ChannelSink, EventFileSink, EventRecord, TelemetryEvent, TelemetrySink};
