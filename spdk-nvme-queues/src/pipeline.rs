//! Write pipeline: LBA allocation and per-queue-pair submission.
//!
//! Each queue pair is either idle or has exactly one write in flight. A
//! write is issued at the current cursor and the cursor advances by one
//! write's worth of blocks, so successive submissions get disjoint,
//! increasing LBA ranges regardless of which queue pair they go to. A
//! successful completion re-arms the same queue pair immediately.
//!
//! The pipeline owns the cursor and is driven through `&mut self` from a
//! single thread; submission and completion handling never race.

use tracing::{error, trace};

use crate::complete::{CompletionReceiver, Delivery, write_completion};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::plan::WritePlan;
use crate::status::CompletionRecord;

/// A completed write as observed by the reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCompletion {
    pub queue: usize,
    pub lba: u64,
    pub record: CompletionRecord,
}

/// Per-queue-pair state.
enum QueueState {
    Idle,
    Submitted {
        lba: u64,
        done: CompletionReceiver<CompletionRecord>,
    },
}

struct QueueSlot<Q> {
    qpair: Q,
    state: QueueState,
    writes: u64,
}

/// Issues writes and chains the next one from each completion.
pub struct WritePipeline<D: Device> {
    // Field order is drop order: queue pairs and the buffer are released
    // before the device that owns the controller.
    queues: Vec<QueueSlot<D::QueuePair>>,
    buffer: D::Buffer,
    device: D,
    plan: WritePlan,
    cursor: u64,
}

impl<D: Device> WritePipeline<D> {
    /// Build a pipeline over already opened queue pairs.
    ///
    /// `qpairs` must hold exactly `plan.queue_count()` queue pairs; their
    /// position is their index.
    pub fn new(device: D, plan: WritePlan, buffer: D::Buffer, qpairs: Vec<D::QueuePair>) -> Result<Self> {
        if qpairs.len() != plan.queue_count() {
            return Err(Error::InvalidArgument(format!(
                "{} queue pairs for a plan of {}",
                qpairs.len(),
                plan.queue_count()
            )));
        }

        let queues = qpairs
            .into_iter()
            .map(|qpair| QueueSlot {
                qpair,
                state: QueueState::Idle,
                writes: 0,
            })
            .collect();

        Ok(Self {
            device,
            plan,
            buffer,
            queues,
            cursor: 0,
        })
    }

    /// Issue the next write on `queue`.
    ///
    /// Does nothing once the cursor reached the end of the plan: the queue
    /// pair simply goes idle. A rejected submission is fatal.
    pub fn submit(&mut self, queue: usize) -> Result<()> {
        if self.cursor >= self.plan.total_blocks() {
            trace!(queue, "plan exhausted, queue pair idle");
            return Ok(());
        }

        let slot = self.queues.get_mut(queue).ok_or_else(|| {
            Error::InvalidArgument(format!("no queue pair {}", queue))
        })?;
        if let QueueState::Submitted { lba, .. } = slot.state {
            return Err(Error::QueueBusy { queue, lba });
        }

        let lba = self.cursor;
        let (tx, rx) = write_completion();
        self.device
            .submit_write(
                &slot.qpair,
                &self.buffer,
                lba,
                self.plan.blocks_per_write(),
                tx,
            )
            .map_err(|source| Error::Submission { queue, lba, source })?;

        slot.state = QueueState::Submitted { lba, done: rx };
        slot.writes += 1;
        self.cursor += u64::from(self.plan.blocks_per_write());
        trace!(queue, lba, "write submitted");
        Ok(())
    }

    /// Handle a completed write on its queue pair.
    ///
    /// An error status is logged with the full completion record and ends
    /// the run. Success re-arms the queue pair.
    pub fn on_complete(&mut self, completion: WriteCompletion) -> Result<()> {
        let WriteCompletion { queue, lba, record } = completion;

        if record.is_error() {
            error!(queue, lba, "write failed: {}", record);
            if let Some(slot) = self.queues.get(queue) {
                self.device.print_completion(&slot.qpair, &record);
            }
            return Err(Error::Completion { queue, lba, record });
        }

        self.submit(queue)
    }

    /// Poll `queue` once and take its completion if it arrived.
    ///
    /// The queue pair is idle again when this returns `Some`.
    pub(crate) fn reap(&mut self, queue: usize) -> Result<Option<WriteCompletion>> {
        let Some(slot) = self.queues.get_mut(queue) else {
            return Err(Error::InvalidArgument(format!("no queue pair {}", queue)));
        };
        let QueueState::Submitted { lba, done } = &mut slot.state else {
            return Ok(None);
        };
        let lba = *lba;

        self.device
            .poll_completions(&slot.qpair)
            .map_err(|source| Error::Poll { queue, source })?;

        match done.try_take() {
            Delivery::Pending => Ok(None),
            Delivery::Ready(record) => {
                slot.state = QueueState::Idle;
                Ok(Some(WriteCompletion { queue, lba, record }))
            }
            Delivery::Dropped => {
                slot.state = QueueState::Idle;
                Err(Error::Cancelled { queue, lba })
            }
        }
    }

    /// The next LBA to be written.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn plan(&self) -> &WritePlan {
        &self.plan
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Number of queue pairs with a write in flight.
    pub fn outstanding(&self) -> usize {
        self.queues
            .iter()
            .filter(|slot| matches!(slot.state, QueueState::Submitted { .. }))
            .count()
    }

    /// LBA of the write in flight on `queue`, if any.
    pub fn in_flight(&self, queue: usize) -> Option<u64> {
        match self.queues.get(queue)?.state {
            QueueState::Submitted { lba, .. } => Some(lba),
            QueueState::Idle => None,
        }
    }

    /// Writes issued on `queue` so far.
    pub fn writes_on(&self, queue: usize) -> u64 {
        self.queues.get(queue).map_or(0, |slot| slot.writes)
    }

    /// Every LBA has been handed out and every queue pair is idle.
    pub fn is_drained(&self) -> bool {
        self.cursor >= self.plan.total_blocks() && self.outstanding() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::sim::{SimConfig, SimDevice};
    use crate::status::CompletionStatus;

    fn pipeline(device: SimDevice, total: u64, per_write: u32, queues: usize) -> WritePipeline<SimDevice> {
        let plan = WritePlan::builder()
            .block_size(512)
            .total_blocks(total)
            .blocks_per_write(per_write)
            .queue_count(queues)
            .build()
            .unwrap();
        let qpairs = (0..queues).map(|i| device.open_queue_pair(i).unwrap()).collect();
        let buffer = device.allocate_dma_buffer(plan.bytes_per_write(), 512).unwrap();
        WritePipeline::new(device, plan, buffer, qpairs).unwrap()
    }

    #[test]
    fn test_submit_advances_cursor() {
        let device = SimDevice::new(SimConfig::default().record_events(true));
        let journal = device.journal();
        let mut p = pipeline(device, 16, 4, 2);

        p.submit(0).unwrap();
        p.submit(1).unwrap();
        assert_eq!(p.cursor(), 8);
        assert_eq!(p.outstanding(), 2);
        assert_eq!(p.in_flight(0), Some(0));
        assert_eq!(p.in_flight(1), Some(4));
        assert_eq!(journal.submitted_lbas(), vec![0, 4]);
    }

    #[test]
    fn test_submit_when_exhausted_is_noop() {
        let device = SimDevice::new(SimConfig::default());
        let mut p = pipeline(device, 1, 1, 2);

        p.submit(0).unwrap();
        p.submit(1).unwrap();
        assert_eq!(p.cursor(), 1);
        assert_eq!(p.in_flight(1), None);
        assert_eq!(p.outstanding(), 1);
        assert!(!p.is_drained());
    }

    #[test]
    fn test_second_submit_on_busy_queue_rejected() {
        let device = SimDevice::new(SimConfig::default());
        let mut p = pipeline(device, 8, 1, 1);

        p.submit(0).unwrap();
        let err = p.submit(0).unwrap_err();
        assert!(matches!(err, Error::QueueBusy { queue: 0, lba: 0 }));
        assert_eq!(p.cursor(), 1);
    }

    #[test]
    fn test_rejected_submission_keeps_cursor() {
        let device = SimDevice::new(SimConfig::default().reject_submission_at(0, -12));
        let mut p = pipeline(device, 8, 1, 1);

        let err = p.submit(0).unwrap_err();
        match err {
            Error::Submission { queue, lba, source } => {
                assert_eq!((queue, lba, source.code()), (0, 0, 12));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(p.cursor(), 0);
        assert_eq!(p.outstanding(), 0);
    }

    #[test]
    fn test_success_rearms_same_queue() {
        let device = SimDevice::new(SimConfig::default());
        let mut p = pipeline(device, 8, 2, 2);
        p.submit(0).unwrap();
        p.submit(1).unwrap();

        let completion = p.reap(1).unwrap().expect("completes on first poll");
        assert_eq!(completion.lba, 2);
        assert_eq!(p.in_flight(1), None);

        p.on_complete(completion).unwrap();
        assert_eq!(p.in_flight(1), Some(4));
        assert_eq!(p.writes_on(1), 2);
        assert_eq!(p.writes_on(0), 1);
    }

    #[test]
    fn test_error_completion_fails_without_resubmit() {
        let device = SimDevice::new(SimConfig::default().record_events(true));
        let journal = device.journal();
        let mut p = pipeline(device, 8, 1, 1);
        p.submit(0).unwrap();

        let record = CompletionRecord::with_status(CompletionStatus::new(0x2, 0x80));
        let err = p
            .on_complete(WriteCompletion { queue: 0, lba: 0, record })
            .unwrap_err();
        assert!(matches!(err, Error::Completion { queue: 0, lba: 0, .. }));
        assert_eq!(journal.submitted_lbas(), vec![0]);
    }

    #[test]
    fn test_reap_pending_until_latency_elapses() {
        let device = SimDevice::new(SimConfig::default().latency_polls(3));
        let mut p = pipeline(device, 4, 1, 1);
        p.submit(0).unwrap();

        assert!(p.reap(0).unwrap().is_none());
        assert!(p.reap(0).unwrap().is_none());
        assert!(p.reap(0).unwrap().is_some());
        assert_eq!(p.outstanding(), 0);
    }

    #[test]
    fn test_queue_count_mismatch_rejected() {
        let device = SimDevice::new(SimConfig::default());
        let plan = WritePlan::builder()
            .block_size(512)
            .total_blocks(4)
            .queue_count(2)
            .build()
            .unwrap();
        let qpairs = vec![device.open_queue_pair(0).unwrap()];
        let buffer = device.allocate_dma_buffer(512, 512).unwrap();
        assert!(WritePipeline::new(device, plan, buffer, qpairs).is_err());
    }
}
