pub mod otlp;
pub mod queue;
pub mod sink;
pub mod stdout;

pub use queue::QueueSink;
pub use sink::TraceSink;
