//! Resource monitor module
//!
//! Periodically probes whether an audio capture device is present. Runs
//! as its own long-lived task, independent of the recognition loop, and
//! only exits when its sleep is interrupted.

mod interrupt;
mod probe;
mod task;

pub use interrupt::{Interrupted, SleepInterrupt};
pub use probe::{AsoundProbe, CaptureProbe, FixedProbe};
pub use task::ResourceMonitor;
