mod orchestrator;
mod runtime;
mod shutdown;
mod sinks;
mod startup;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::CamvisorOrchestrator;
pub use sinks::{frame_trace_sink, logging_health_sink};
pub use types::{ShutdownHandle, ShutdownReason};
