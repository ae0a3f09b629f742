//! Shared helpers for the simulated-device integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use spdk_nvme_queues::sim::{SimConfig, SimDevice, SimJournal};
use spdk_nvme_queues::{Benchmark, BenchmarkReport, Clock, Result, WritePlanBuilder};

/// Clock that replays fixed timestamps, then keeps returning the last one.
pub struct ScriptedClock {
    ticks: RefCell<VecDeque<Duration>>,
    last: RefCell<Duration>,
}

impl ScriptedClock {
    pub fn new(ticks: &[Duration]) -> Self {
        Self {
            ticks: RefCell::new(ticks.iter().copied().collect()),
            last: RefCell::new(Duration::ZERO),
        }
    }

    /// Start at 0, end after `elapsed`.
    pub fn elapsed(elapsed: Duration) -> Self {
        Self::new(&[Duration::ZERO, elapsed])
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Result<Duration> {
        if let Some(tick) = self.ticks.borrow_mut().pop_front() {
            *self.last.borrow_mut() = tick;
        }
        Ok(*self.last.borrow())
    }
}

/// Set up and run one benchmark on a simulated device, one second long,
/// with the journal on.
pub fn run_sim(config: SimConfig, plan: WritePlanBuilder) -> (Result<BenchmarkReport>, SimJournal) {
    let device = SimDevice::new(config.record_events(true));
    let journal = device.journal();
    let clock = ScriptedClock::elapsed(Duration::from_secs(1));
    let report = Benchmark::setup(device, plan).and_then(|bench| bench.run(&clock));
    (report, journal)
}
