//! In-memory device with NVMe-like queue pair semantics.
//!
//! Writes are queued on their queue pair at submission and complete, in
//! submission order, after a configurable number of polls of that queue
//! pair. Faults can be injected at given LBAs. With
//! [`SimConfig::record_events()`] every submission and completion is also
//! recorded in a shared [`SimJournal`].

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::info;

use crate::complete::CompletionSender;
use crate::device::{Device, Geometry};
use crate::error::{DriverError, Error, Result};
use crate::status::{CompletionRecord, CompletionStatus, SC_LBA_OUT_OF_RANGE, SCT_GENERIC};

/// Behavior of a [`SimDevice`].
#[derive(Debug, Clone)]
pub struct SimConfig {
    block_size: u32,
    num_blocks: u64,
    latency_polls: u32,
    queue_latency: HashMap<usize, u32>,
    namespace_active: bool,
    fail_queue_alloc_at: Option<usize>,
    fail_buffer_alloc: bool,
    completion_errors: HashMap<u64, CompletionStatus>,
    rejected_submissions: HashMap<u64, i32>,
    record_events: bool,
}

impl Default for SimConfig {
    /// 512-byte blocks, 1 GiB namespace, completions on the first poll,
    /// no journal.
    fn default() -> Self {
        Self {
            block_size: 512,
            num_blocks: 2 * 1024 * 1024,
            latency_polls: 1,
            queue_latency: HashMap::new(),
            namespace_active: true,
            fail_queue_alloc_at: None,
            fail_buffer_alloc: false,
            completion_errors: HashMap::new(),
            rejected_submissions: HashMap::new(),
            record_events: false,
        }
    }
}

impl SimConfig {
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn num_blocks(mut self, num_blocks: u64) -> Self {
        self.num_blocks = num_blocks;
        self
    }

    /// Polls of a queue pair a write needs before it completes (minimum 1).
    pub fn latency_polls(mut self, polls: u32) -> Self {
        self.latency_polls = polls.max(1);
        self
    }

    /// Override the latency of one queue pair.
    pub fn queue_latency(mut self, queue: usize, polls: u32) -> Self {
        self.queue_latency.insert(queue, polls.max(1));
        self
    }

    /// Report namespace 1 as inactive on attach.
    pub fn inactive_namespace(mut self) -> Self {
        self.namespace_active = false;
        self
    }

    /// Refuse to allocate the queue pair with this index.
    pub fn fail_queue_alloc_at(mut self, queue: usize) -> Self {
        self.fail_queue_alloc_at = Some(queue);
        self
    }

    pub fn fail_buffer_alloc(mut self) -> Self {
        self.fail_buffer_alloc = true;
        self
    }

    /// Complete the write starting at `lba` with `status`.
    pub fn completion_error_at(mut self, lba: u64, status: CompletionStatus) -> Self {
        self.completion_errors.insert(lba, status);
        self
    }

    /// Reject the submission of the write starting at `lba` with return code `rc`.
    pub fn reject_submission_at(mut self, lba: u64, rc: i32) -> Self {
        self.rejected_submissions.insert(lba, rc);
        self
    }

    /// Record every submission and completion in the [`SimJournal`].
    ///
    /// The journal grows by two events per write and is never trimmed.
    pub fn record_events(mut self, record: bool) -> Self {
        self.record_events = record;
        self
    }
}

/// One entry of the device journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    Submit { queue: usize, lba: u64, blocks: u32 },
    Complete { queue: usize, lba: u64, status: CompletionStatus },
}

/// Shared, append-only record of what the device saw.
#[derive(Debug, Clone, Default)]
pub struct SimJournal {
    events: Rc<RefCell<Vec<SimEvent>>>,
}

impl SimJournal {
    fn push(&self, event: SimEvent) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }

    /// LBAs of all submitted writes, in submission order.
    pub fn submitted_lbas(&self) -> Vec<u64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                SimEvent::Submit { lba, .. } => Some(*lba),
                SimEvent::Complete { .. } => None,
            })
            .collect()
    }

    /// LBAs submitted on one queue pair, in order.
    pub fn submitted_on(&self, queue: usize) -> Vec<u64> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                SimEvent::Submit { queue: q, lba, .. } if q == queue => Some(lba),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, SimEvent::Complete { .. }))
            .count()
    }

    /// Highest number of writes any single queue pair had in flight at once.
    pub fn max_queue_depth(&self) -> usize {
        let mut depth: HashMap<usize, usize> = HashMap::new();
        let mut max = 0;
        for event in self.events.borrow().iter() {
            match *event {
                SimEvent::Submit { queue, .. } => {
                    let d = depth.entry(queue).or_default();
                    *d += 1;
                    max = max.max(*d);
                }
                SimEvent::Complete { queue, .. } => {
                    let d = depth.entry(queue).or_default();
                    *d = d.saturating_sub(1);
                }
            }
        }
        max
    }

    /// Index of the first completion in the journal, if any.
    pub fn first_completion(&self) -> Option<usize> {
        self.events
            .borrow()
            .iter()
            .position(|event| matches!(event, SimEvent::Complete { .. }))
    }
}

struct SimCommand {
    lba: u64,
    polls_left: u32,
    status: CompletionStatus,
    done: CompletionSender<CompletionRecord>,
}

/// Queue pair of a [`SimDevice`].
pub struct SimQpair {
    index: usize,
    sqid: u16,
    next_cid: Cell<u16>,
    pending: RefCell<VecDeque<SimCommand>>,
}

impl SimQpair {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Writes accepted but not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// Zeroed in-memory write buffer.
#[derive(Debug)]
pub struct SimBuffer {
    data: Box<[u8]>,
}

impl SimBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory [`Device`].
pub struct SimDevice {
    config: SimConfig,
    journal: SimJournal,
}

impl SimDevice {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            journal: SimJournal::default(),
        }
    }

    /// Handle to the journal; stays valid after the device is moved.
    pub fn journal(&self) -> SimJournal {
        self.journal.clone()
    }

    fn record(&self, event: SimEvent) {
        if self.config.record_events {
            self.journal.push(event);
        }
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.config.block_size,
            num_blocks: self.config.num_blocks,
        }
    }
}

impl Device for SimDevice {
    type QueuePair = SimQpair;
    type Buffer = SimBuffer;

    fn attach(&mut self) -> Result<Geometry> {
        if !self.config.namespace_active {
            return Err(Error::DeviceUnavailable(
                "namespace 1 is inactive".to_string(),
            ));
        }
        let geometry = self.geometry();
        info!(
            "sim attached, namespace ID: 1 size: {}GB",
            geometry.size() / 1_000_000_000
        );
        Ok(geometry)
    }

    fn open_queue_pair(&self, index: usize) -> Result<SimQpair> {
        if self.config.fail_queue_alloc_at == Some(index) {
            return Err(Error::QueueAllocationFailed { queue: index });
        }
        Ok(SimQpair {
            index,
            sqid: u16::try_from(index + 1).unwrap_or(u16::MAX),
            next_cid: Cell::new(0),
            pending: RefCell::new(VecDeque::new()),
        })
    }

    fn allocate_dma_buffer(&self, size: usize, _align: usize) -> Result<SimBuffer> {
        if self.config.fail_buffer_alloc || size == 0 {
            return Err(Error::BufferAllocationFailed(size));
        }
        Ok(SimBuffer {
            data: vec![0u8; size].into_boxed_slice(),
        })
    }

    fn submit_write(
        &self,
        qpair: &SimQpair,
        _buf: &SimBuffer,
        lba: u64,
        num_blocks: u32,
        done: CompletionSender<CompletionRecord>,
    ) -> std::result::Result<(), DriverError> {
        if let Some(&rc) = self.config.rejected_submissions.get(&lba) {
            return Err(DriverError::from_rc(rc));
        }

        let end = lba.checked_add(u64::from(num_blocks));
        let status = if end.is_none_or(|end| end > self.config.num_blocks) {
            CompletionStatus::new(SCT_GENERIC, SC_LBA_OUT_OF_RANGE).with_dnr()
        } else {
            self.config
                .completion_errors
                .get(&lba)
                .copied()
                .unwrap_or(CompletionStatus::SUCCESS)
        };

        let polls = self
            .config
            .queue_latency
            .get(&qpair.index)
            .copied()
            .unwrap_or(self.config.latency_polls);

        self.record(SimEvent::Submit {
            queue: qpair.index,
            lba,
            blocks: num_blocks,
        });
        qpair.pending.borrow_mut().push_back(SimCommand {
            lba,
            polls_left: polls,
            status,
            done,
        });
        Ok(())
    }

    fn poll_completions(&self, qpair: &SimQpair) -> std::result::Result<u32, DriverError> {
        let mut ready = Vec::new();
        {
            let mut pending = qpair.pending.borrow_mut();
            for command in pending.iter_mut() {
                command.polls_left = command.polls_left.saturating_sub(1);
            }
            // In-order completion: stop at the first write still in flight.
            while pending.front().is_some_and(|command| command.polls_left == 0) {
                if let Some(command) = pending.pop_front() {
                    ready.push(command);
                }
            }
        }

        let completed = ready.len() as u32;
        for command in ready {
            let cid = qpair.next_cid.get();
            qpair.next_cid.set(cid.wrapping_add(1));
            self.record(SimEvent::Complete {
                queue: qpair.index,
                lba: command.lba,
                status: command.status,
            });
            command.done.complete(CompletionRecord {
                cdw0: 0,
                sqhd: 0,
                sqid: qpair.sqid,
                cid,
                status: command.status,
            });
        }
        Ok(completed)
    }
}
