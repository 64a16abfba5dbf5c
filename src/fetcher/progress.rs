use tokio::sync::mpsc;

use super::ProgressListener;

/// Progress message sent from a running fetch back to the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent {
    Progress {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },
    DownloadComplete,
}

/// [`ProgressListener`] that forwards every event over an unbounded channel.
///
/// Dropping the listener closes the channel, which tells the receiving side
/// that no more events will arrive.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<FetchEvent>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::UnboundedSender<FetchEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FetchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: FetchEvent) {
        // The receiver only goes away once the job is finished with.
        let _ = self.tx.send(event);
    }
}

impl ProgressListener for ChannelProgress {
    fn on_progress(&self, downloaded_bytes: u64, total_bytes: Option<u64>) {
        self.send(FetchEvent::Progress {
            downloaded_bytes,
            total_bytes,
        });
    }

    fn on_download_complete(&self) {
        self.send(FetchEvent::DownloadComplete);
    }
}
