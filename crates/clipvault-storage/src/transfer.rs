//! Event channel between a storage backend and the caller awaiting a transfer.
//!
//! A transfer produces zero or more [`TransferEvent::Progress`] events followed
//! by exactly one terminal event. The reporter's terminal methods consume it,
//! and the handle stops yielding once a terminal event has been read.

use crate::traits::StorageError;
use tokio::sync::mpsc;

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub enum TransferEvent {
    Progress {
        bytes_transferred: u64,
        total_bytes: u64,
    },
    Completed(PutReceipt),
    Failed(StorageError),
    Cancelled,
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferEvent::Progress { .. })
    }
}

/// Create a connected reporter/handle pair for one transfer.
pub fn transfer_channel() -> (TransferReporter, TransferHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TransferReporter { tx }, TransferHandle { rx: Some(rx) })
}

/// Backend side of a transfer.
#[derive(Debug)]
pub struct TransferReporter {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl TransferReporter {
    pub fn progress(&self, bytes_transferred: u64, total_bytes: u64) {
        // The caller may have stopped listening; the transfer still runs to completion.
        let _ = self.tx.send(TransferEvent::Progress {
            bytes_transferred,
            total_bytes,
        });
    }

    pub fn complete(self, receipt: PutReceipt) {
        let _ = self.tx.send(TransferEvent::Completed(receipt));
    }

    pub fn fail(self, error: StorageError) {
        let _ = self.tx.send(TransferEvent::Failed(error));
    }

    pub fn cancelled(self) {
        let _ = self.tx.send(TransferEvent::Cancelled);
    }
}

/// Caller side of a transfer.
#[derive(Debug)]
pub struct TransferHandle {
    rx: Option<mpsc::UnboundedReceiver<TransferEvent>>,
}

impl TransferHandle {
    /// Wait for the next event.
    ///
    /// Returns `None` after the terminal event, or if the backend dropped its
    /// reporter without sending one.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        let rx = self.rx.as_mut()?;
        let event = rx.recv().await;
        if event.as_ref().map_or(true, TransferEvent::is_terminal) {
            self.rx = None;
        }
        event
    }

    /// Whether the terminal event (or channel close) has been observed.
    pub fn is_finished(&self) -> bool {
        self.rx.is_none()
    }
}
