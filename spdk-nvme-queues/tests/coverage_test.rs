//! Property tests: every run writes exactly the planned range, once.

mod common;

use common::run_sim;
use proptest::prelude::*;
use spdk_nvme_queues::WritePlan;
use spdk_nvme_queues::sim::SimConfig;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lba_coverage(
        queues in 1usize..=6,
        per_write in 1u32..=8,
        writes in 1u64..=64,
        latency in 1u32..=4,
    ) {
        let total = writes * u64::from(per_write);
        let plan = WritePlan::builder()
            .total_blocks(total)
            .blocks_per_write(per_write)
            .queue_count(queues);
        let (report, journal) = run_sim(SimConfig::default().latency_polls(latency), plan);
        let report = report.unwrap();

        let mut lbas = journal.submitted_lbas();
        lbas.sort_unstable();
        let expected: Vec<u64> = (0..writes).map(|i| i * u64::from(per_write)).collect();
        prop_assert_eq!(lbas, expected);

        prop_assert!(journal.max_queue_depth() <= 1);
        prop_assert_eq!(journal.completions() as u64, writes);
        prop_assert_eq!(report.stats.completions, writes);
        prop_assert_eq!(report.priming.observed, report.plan.priming_target());
    }

    #[test]
    fn prop_lbas_increase_per_queue(
        queues in 1usize..=4,
        writes in 1u64..=48,
    ) {
        let config = SimConfig::default().queue_latency(0, 3);
        let plan = WritePlan::builder().total_blocks(writes).queue_count(queues);
        let (report, journal) = run_sim(config, plan);
        prop_assert!(report.is_ok());

        for queue in 0..queues {
            let lbas = journal.submitted_on(queue);
            prop_assert!(lbas.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
