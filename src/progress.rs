//! Upload progress tracking

use serde::Serialize;
use tokio::sync::watch;

/// Progress record shown while a request is in flight
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Progress {
    started: bool,
    percent: f64,
}

impl Progress {
    pub fn idle() -> Self {
        Self::default()
    }

    /// A request was just issued
    pub fn started() -> Self {
        Self {
            started: true,
            percent: 0.0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Percent in [0, 100]. Meaningless unless `is_started()`.
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Percent rounded for display
    pub fn rounded(&self) -> u8 {
        self.percent.round() as u8
    }

    pub fn update(&mut self, upload: UploadProgress) {
        self.percent = upload.percent();
    }

    pub fn finish(&mut self) {
        self.started = false;
    }

    /// Text bar for terminals, `None` when no request is in flight
    pub fn render(&self, width: usize) -> Option<String> {
        if !self.started {
            return None;
        }

        let filled = ((self.percent / 100.0) * width as f64).round() as usize;
        let filled = filled.min(width);
        Some(format!(
            "[{}{}] {}%",
            "#".repeat(filled),
            " ".repeat(width - filled),
            self.rounded()
        ))
    }
}

/// Byte counts reported by the upload body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        percent_of(self.loaded, self.total)
    }
}

/// `loaded / total` as a percentage clamped to [0, 100]; an empty body reads 0
pub fn percent_of(loaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (loaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Sending half of a progress channel, handed to the upload body
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<UploadProgress>,
}

impl ProgressReporter {
    /// Announce the total body size before any bytes are sent
    pub fn set_total(&self, total: u64) {
        self.tx.send_modify(|p| {
            p.total = total;
            p.loaded = p.loaded.min(total);
        });
    }

    /// Record `bytes` more bytes handed to the transport
    pub fn advance(&self, bytes: u64) {
        self.tx.send_modify(|p| {
            p.loaded = p.loaded.saturating_add(bytes);
            if p.total > 0 {
                p.loaded = p.loaded.min(p.total);
            }
        });
    }

    pub fn current(&self) -> UploadProgress {
        *self.tx.borrow()
    }
}

/// Create a progress channel. The receiver observes the latest byte counts.
pub fn channel() -> (ProgressReporter, watch::Receiver<UploadProgress>) {
    let (tx, rx) = watch::channel(UploadProgress::default());
    (ProgressReporter { tx }, rx)
}
