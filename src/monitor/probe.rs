//! Capture device presence probes

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Default ALSA PCM listing on Linux
const ASOUND_PCM_PATH: &str = "/proc/asound/pcm";

/// Answers "is an audio capture device available right now"
///
/// Must be fast and non-blocking; the monitor calls it every interval.
pub trait CaptureProbe: Send + Sync {
    fn is_capture_device_available(&self) -> bool;
}

/// Probe backed by the kernel's ALSA PCM listing
///
/// Each line of the listing describes one PCM device, e.g.
/// `00-00: ALC892 Analog : ALC892 Analog : playback 1 : capture 1`.
/// A device is a capture device when its line advertises a capture stream.
#[derive(Debug, Clone)]
pub struct AsoundProbe {
    path: PathBuf,
}

impl AsoundProbe {
    /// Probe the default listing
    pub fn new() -> Self {
        Self::with_path(ASOUND_PCM_PATH)
    }

    /// Probe a listing at a custom location
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    /// Check if a PCM listing advertises any capture stream
    pub fn listing_has_capture(listing: &str) -> bool {
        listing
            .lines()
            .flat_map(|line| line.split(':'))
            .any(|field| field.trim_start().starts_with("capture"))
    }
}

impl Default for AsoundProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProbe for AsoundProbe {
    fn is_capture_device_available(&self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(listing) => Self::listing_has_capture(&listing),
            Err(e) => {
                debug!(?e, path = ?self.path, "cannot read PCM listing");
                false
            }
        }
    }
}

/// Probe reporting a settable answer
#[derive(Debug, Default)]
pub struct FixedProbe {
    available: AtomicBool,
}

impl FixedProbe {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl CaptureProbe for FixedProbe {
    fn is_capture_device_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_with_capture() {
        let listing = "00-00: ALC892 Analog : ALC892 Analog : playback 1 : capture 1\n\
                       00-01: ALC892 Digital : ALC892 Digital : playback 1\n";
        assert!(AsoundProbe::listing_has_capture(listing));
    }

    #[test]
    fn test_listing_playback_only() {
        let listing = "00-03: HDMI 0 : HDMI 0 : playback 1\n";
        assert!(!AsoundProbe::listing_has_capture(listing));
        assert!(!AsoundProbe::listing_has_capture(""));
    }

    #[test]
    fn test_missing_listing_means_unavailable() {
        let probe = AsoundProbe::with_path("/nonexistent/asound/pcm");
        assert!(!probe.is_capture_device_available());
    }

    #[test]
    fn test_fixed_probe() {
        let probe = FixedProbe::new(true);
        assert!(probe.is_capture_device_available());
        probe.set_available(false);
        assert!(!probe.is_capture_device_available());
    }
}
