//! Merge Coordinator.
//!
//! Launches one [`DirectoryTailReader`] thread per configured directory and
//! performs a greedy frontier merge over their rendezvous slots: once every
//! live source has a pending envelope, the smallest one is removed, its
//! source is released, and the record goes to the sink. End-of-stream
//! markers retire their source instead of being delivered.
//!
//! Equal timestamps are broken by source position in the configured
//! directory list, so the output order does not depend on thread timing.

use std::cmp::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Select, Sender};
use tracing::{debug, error, info, warn};

use crate::config::TailMergeConfig;
use crate::reader::DirectoryTailReader;
use crate::record::{Envelope, Record};
use crate::registry::TypeRegistry;
use crate::rendezvous::{rendezvous, SlotReceiver};
use crate::state::StreamState;

/// Consumer of the merged stream.
///
/// Returning `false` asks the coordinator, and through it every reader, to
/// stop. The sink is never invoked again after that.
pub trait RecordSink {
    /// Consumes one record. Returns whether the merge should continue.
    fn deliver(&mut self, record: Record) -> bool;
}

impl<F> RecordSink for F
where
    F: FnMut(Record) -> bool,
{
    fn deliver(&mut self, record: Record) -> bool {
        self(record)
    }
}

impl RecordSink for Vec<Record> {
    fn deliver(&mut self, record: Record) -> bool {
        self.push(record);
        true
    }
}

/// Forwards into a channel; a disconnected receiver stops the merge.
impl RecordSink for Sender<Record> {
    fn deliver(&mut self, record: Record) -> bool {
        self.send(record).is_ok()
    }
}

/// Outcome of one merge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Readers actually started (non-directories are skipped).
    pub sources_launched: usize,
    /// Records handed to the sink.
    pub records_delivered: u64,
    /// Records that were pending when the stream was stopped.
    pub records_discarded: u64,
}

/// Coordinator-side bookkeeping for one source.
struct Source {
    index: usize,
    slot: SlotReceiver,
    pending: Option<Envelope>,
    live: bool,
}

/// Owns the sources of one merge and produces the ordered stream.
pub struct MergeCoordinator {
    config: Arc<TailMergeConfig>,
    registry: Arc<TypeRegistry>,
    state: StreamState,
}

impl MergeCoordinator {
    /// Creates a coordinator with its own running flag.
    #[must_use]
    pub fn new(config: TailMergeConfig, registry: TypeRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            state: StreamState::new(),
        }
    }

    /// Uses an externally owned running flag.
    #[must_use]
    pub fn with_state(mut self, state: StreamState) -> Self {
        self.state = state;
        self
    }

    /// A handle to the running flag shared with every reader.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state.clone()
    }

    /// Runs the merge until every source has terminated.
    ///
    /// Blocks the calling thread. Returns once each launched reader has
    /// posted its end-of-stream marker and exited.
    pub fn run<S>(&self, sink: &mut S) -> MergeSummary
    where
        S: RecordSink + ?Sized,
    {
        if self.config.input_dirs.is_empty() {
            warn!("The list of input dirs is empty");
        }

        let (mut sources, handles) = self.launch();
        let mut summary = MergeSummary {
            sources_launched: sources.len(),
            ..MergeSummary::default()
        };
        info!(sources = summary.sources_launched, "Merging sources");

        self.merge(&mut sources, sink, &mut summary);

        for handle in handles {
            if handle.join().is_err() {
                error!("Directory reader thread panicked");
            }
        }
        info!(
            delivered = summary.records_delivered,
            discarded = summary.records_discarded,
            "Merge finished"
        );
        summary
    }

    fn launch(&self) -> (Vec<Source>, Vec<JoinHandle<()>>) {
        let mut sources = Vec::with_capacity(self.config.input_dirs.len());
        let mut handles = Vec::with_capacity(self.config.input_dirs.len());

        for (index, dir) in self.config.input_dirs.iter().enumerate() {
            if !dir.is_dir() {
                warn!(source = %dir.display(), "Invalid directory name; not reading it");
                continue;
            }
            let (tx, slot) = rendezvous();
            let reader = DirectoryTailReader::new(
                index,
                dir.clone(),
                Arc::clone(&self.config),
                Arc::clone(&self.registry),
                tx,
                self.state.clone(),
            );
            let spawned = thread::Builder::new()
                .name(format!("tailmerge-reader-{index}"))
                .spawn(move || reader.run());
            match spawned {
                Ok(handle) => {
                    handles.push(handle);
                    sources.push(Source {
                        index,
                        slot,
                        pending: None,
                        live: true,
                    });
                }
                Err(e) => error!(source = %dir.display(), error = %e, "Failed to spawn directory reader"),
            }
        }
        (sources, handles)
    }

    fn merge<S>(&self, sources: &mut [Source], sink: &mut S, summary: &mut MergeSummary)
    where
        S: RecordSink + ?Sized,
    {
        let mut live = sources.len();
        while live > 0 {
            if !self.state.is_running() {
                // Stopped: discard what is pending and retire sources as
                // their end-of-stream markers arrive.
                for source in sources.iter_mut().filter(|s| s.live) {
                    match source.pending.take() {
                        Some(Envelope::Record(_)) => {
                            summary.records_discarded += 1;
                            source.slot.release(false);
                        }
                        Some(Envelope::EndOfStream) => {
                            source.live = false;
                            live -= 1;
                        }
                        None => {}
                    }
                }
                if live > 0 {
                    self.receive(sources);
                }
                continue;
            }

            let pending = sources.iter().filter(|s| s.live && s.pending.is_some()).count();
            if pending < live {
                self.receive(sources);
                continue;
            }

            let Some(pos) = frontier_min(sources) else {
                continue;
            };
            let source = &mut sources[pos];
            match source.pending.take() {
                Some(Envelope::EndOfStream) => {
                    source.live = false;
                    live -= 1;
                    debug!(index = source.index, remaining = live, "Source retired");
                }
                Some(Envelope::Record(record)) => {
                    source.slot.release(true);
                    summary.records_delivered += 1;
                    if !sink.deliver(record) {
                        info!("Sink requested stop");
                        self.state.stop();
                    }
                }
                None => {}
            }
        }
    }

    /// Waits for one envelope from any live source without a pending one.
    ///
    /// Times out after one new-lines poll interval so a cleared running flag
    /// is noticed even while every reader is idle.
    fn receive(&self, sources: &mut [Source]) {
        let candidates: Vec<usize> = sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live && s.pending.is_none())
            .map(|(pos, _)| pos)
            .collect();
        if candidates.is_empty() {
            return;
        }

        let received = {
            let mut select = Select::new();
            for &pos in &candidates {
                select.recv(sources[pos].slot.receiver());
            }
            match select.select_timeout(self.config.poll.new_lines()) {
                Ok(oper) => {
                    let pos = candidates[oper.index()];
                    // A reader that vanished without a marker counts as finished.
                    let envelope = oper
                        .recv(sources[pos].slot.receiver())
                        .unwrap_or(Envelope::EndOfStream);
                    Some((pos, envelope))
                }
                Err(_) => None,
            }
        };
        if let Some((pos, envelope)) = received {
            sources[pos].pending = Some(envelope);
        }
    }
}

/// Position of the smallest pending envelope among live sources. Ties go to
/// the source listed first.
fn frontier_min(sources: &[Source]) -> Option<usize> {
    let mut best: Option<(usize, &Envelope)> = None;
    for (pos, source) in sources.iter().enumerate() {
        let Some(envelope) = source.pending.as_ref().filter(|_| source.live) else {
            continue;
        };
        match best {
            Some((_, current)) if envelope.merge_cmp(current) != Ordering::Less => {}
            _ => best = Some((pos, envelope)),
        }
    }
    best.map(|(pos, _)| pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::rendezvous::SlotSender;
    use crate::value::FieldValue;

    fn rec(ts: i64) -> Record {
        Record::new("t", ts, vec![FieldValue::Long(ts)])
    }

    fn source(index: usize, pending: Option<Envelope>) -> Source {
        let (_tx, slot) = rendezvous();
        Source {
            index,
            slot,
            pending,
            live: true,
        }
    }

    fn coordinator() -> MergeCoordinator {
        let mut cfg = TailMergeConfig::default();
        cfg.poll.new_lines_ms = 5;
        MergeCoordinator::new(cfg, TypeRegistry::new())
    }

    /// Feeds a fixed sequence of records through a slot, then finishes.
    fn feed(mut tx: SlotSender, timestamps: Vec<i64>) -> JoinHandle<()> {
        thread::spawn(move || {
            for ts in timestamps {
                if !tx.post(rec(ts)) {
                    break;
                }
            }
            tx.finish();
        })
    }

    fn live_source(index: usize, slot: SlotReceiver) -> Source {
        Source {
            index,
            slot,
            pending: None,
            live: true,
        }
    }

    #[test]
    fn test_frontier_min_prefers_end_of_stream_then_timestamp_then_position() {
        let sources = vec![
            source(0, Some(Envelope::Record(rec(5)))),
            source(1, Some(Envelope::Record(rec(3)))),
            source(2, Some(Envelope::Record(rec(3)))),
        ];
        assert_eq!(frontier_min(&sources), Some(1));

        let mut sources = sources;
        sources[2].pending = Some(Envelope::EndOfStream);
        assert_eq!(frontier_min(&sources), Some(2));

        sources[2].live = false;
        assert_eq!(frontier_min(&sources), Some(1));
    }

    #[test]
    fn test_frontier_min_empty() {
        let sources = vec![source(0, None)];
        assert_eq!(frontier_min(&sources), None);
    }

    #[test]
    fn test_merge_orders_sorted_streams() {
        let (tx_a, slot_a) = rendezvous();
        let (tx_b, slot_b) = rendezvous();
        let feeders = vec![feed(tx_a, vec![1, 4, 4, 9]), feed(tx_b, vec![2, 3, 4, 10, 11])];

        let coordinator = coordinator();
        let mut sources = vec![live_source(0, slot_a), live_source(1, slot_b)];
        let mut out: Vec<Record> = Vec::new();
        let mut summary = MergeSummary::default();
        coordinator.merge(&mut sources, &mut out, &mut summary);
        for f in feeders {
            f.join().unwrap();
        }

        let ts: Vec<i64> = out.iter().map(|r| r.logging_timestamp).collect();
        assert_eq!(ts, vec![1, 2, 3, 4, 4, 4, 9, 10, 11]);
        assert_eq!(summary.records_delivered, 9);
        assert!(sources.iter().all(|s| !s.live));
    }

    #[test]
    fn test_merge_with_only_end_of_stream_terminates() {
        let slots: Vec<SlotReceiver> = (0..4)
            .map(|_| {
                let (mut tx, slot) = rendezvous();
                tx.finish();
                slot
            })
            .collect();
        let mut sources: Vec<Source> = slots.into_iter().enumerate().map(|(i, s)| live_source(i, s)).collect();
        let mut out: Vec<Record> = Vec::new();
        let mut summary = MergeSummary::default();
        coordinator().merge(&mut sources, &mut out, &mut summary);
        assert!(out.is_empty());
        assert_eq!(summary, MergeSummary::default());
    }

    #[test]
    fn test_sink_false_stops_delivery() {
        let (tx_a, slot_a) = rendezvous();
        let (tx_b, slot_b) = rendezvous();
        let feeders = vec![feed(tx_a, (0..100).step_by(2).collect()), feed(tx_b, (1..100).step_by(2).collect())];

        let coordinator = coordinator();
        let mut sources = vec![live_source(0, slot_a), live_source(1, slot_b)];
        let mut seen = 0u32;
        let mut sink = |_: Record| {
            seen += 1;
            seen < 3
        };
        let mut summary = MergeSummary::default();
        coordinator.merge(&mut sources, &mut sink, &mut summary);
        for f in feeders {
            f.join().unwrap();
        }
        assert_eq!(seen, 3);
        assert_eq!(summary.records_delivered, 3);
        assert!(!coordinator.state().is_running());
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = crossbeam_channel::unbounded::<Record>();
        let mut sink = tx;
        assert!(sink.deliver(rec(1)));
        drop(rx);
        assert!(!sink.deliver(rec(2)));
    }

    #[test]
    fn test_external_stop_unblocks_idle_merge() {
        let (tx, slot) = rendezvous();
        let coordinator = coordinator();
        let state = coordinator.state();

        // A reader that waits for the flag, like an idle tail would.
        let idle = thread::spawn(move || {
            let mut tx = tx;
            while state.is_running() {
                thread::sleep(Duration::from_millis(5));
            }
            tx.finish();
        });
        let stopper = {
            let state = coordinator.state();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                state.stop();
            })
        };

        let mut sources = vec![live_source(0, slot)];
        let mut out: Vec<Record> = Vec::new();
        let mut summary = MergeSummary::default();
        coordinator.merge(&mut sources, &mut out, &mut summary);
        idle.join().unwrap();
        stopper.join().unwrap();
        assert!(out.is_empty());
    }
}
