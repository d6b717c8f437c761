//! One-record handoff between a directory reader and the merge coordinator.
//!
//! Each source owns a capacity-one envelope channel plus a capacity-one
//! release channel. After posting a record the reader blocks until the
//! coordinator has consumed it and replies with whether to keep running, so
//! at most one record per source is ever in flight.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::record::{Envelope, Record};

/// Reader side of a rendezvous slot.
///
/// Dropping the sender posts the end-of-stream marker if it was not posted
/// yet, so the coordinator's live count stays correct even if a reader exits
/// early or panics.
#[derive(Debug)]
pub struct SlotSender {
    tx: Sender<Envelope>,
    release_rx: Receiver<bool>,
    finished: bool,
}

/// Coordinator side of a rendezvous slot.
#[derive(Debug)]
pub struct SlotReceiver {
    rx: Receiver<Envelope>,
    release_tx: Sender<bool>,
}

/// Creates a connected slot pair.
#[must_use]
pub fn rendezvous() -> (SlotSender, SlotReceiver) {
    let (tx, rx) = bounded::<Envelope>(1);
    let (release_tx, release_rx) = bounded::<bool>(1);
    (
        SlotSender {
            tx,
            release_rx,
            finished: false,
        },
        SlotReceiver { rx, release_tx },
    )
}

impl SlotSender {
    /// Posts a record and blocks until the coordinator has consumed it.
    ///
    /// Returns whether the reader should keep running. A vanished
    /// coordinator counts as a stop signal.
    pub fn post(&mut self, record: Record) -> bool {
        if self.finished {
            return false;
        }
        if self.tx.send(Envelope::Record(record)).is_err() {
            return false;
        }
        self.release_rx.recv().unwrap_or(false)
    }

    /// Posts the end-of-stream marker. Idempotent.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        // The slot is empty here: every posted record was released first.
        let _ = self.tx.send(Envelope::EndOfStream);
    }

    /// Whether the end-of-stream marker has been posted.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for SlotSender {
    fn drop(&mut self) {
        self.finish();
    }
}

impl SlotReceiver {
    /// The envelope channel, for multiplexing with `crossbeam_channel::Select`.
    #[must_use]
    pub fn receiver(&self) -> &Receiver<Envelope> {
        &self.rx
    }

    /// Receives the next envelope with a timeout.
    ///
    /// A disconnected sender reads as end-of-stream.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Envelope> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Envelope::EndOfStream),
        }
    }

    /// Lets the reader produce its next record.
    pub fn release(&self, keep_running: bool) {
        // The reader may already be gone after a stop; nothing to wake then.
        let _ = self.release_tx.send(keep_running);
    }
}
