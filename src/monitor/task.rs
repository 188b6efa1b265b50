//! Resource monitor task body

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::SessionEvent;
use crate::session::state::MonitorState;

use super::{CaptureProbe, SleepInterrupt};

/// Everything one monitor task needs, moved onto its worker
pub struct ResourceMonitor {
    state: Arc<MonitorState>,
    probe: Arc<dyn CaptureProbe>,
    interrupt: Arc<SleepInterrupt>,
    interval: Duration,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl ResourceMonitor {
    pub fn new(
        state: Arc<MonitorState>,
        probe: Arc<dyn CaptureProbe>,
        interrupt: Arc<SleepInterrupt>,
        interval: Duration,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state,
            probe,
            interrupt,
            interval,
            event_tx,
        }
    }

    /// Probe, sleep, repeat until the sleep is interrupted
    pub fn run(self) {
        info!(interval = ?self.interval, "resource monitor started");
        let _ = self.event_tx.send(SessionEvent::MonitorStarted);

        loop {
            // Absence is not reported, and the recognition loop is never told
            let available = self.probe.is_capture_device_available();
            debug!(available, "capture device probed");

            if let Err(e) = self.interrupt.sleep(self.interval) {
                warn!(?e, "resource monitor interrupted");
                break;
            }
        }

        self.state.finish();
        let _ = self.event_tx.send(SessionEvent::MonitorExited);
        info!("resource monitor exited");
    }
}
