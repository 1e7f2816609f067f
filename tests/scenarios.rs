//! End-to-end floor scenarios and invariants.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use proptest::prelude::*;
use servsim::engine::ServiceState;
use servsim::prelude::*;

#[test]
fn test_lone_group_is_served_without_waiting() {
    let params = SimulationParameters::builder()
        .tables(1)
        .waiters(1)
        .mean_interarrival(1000.0)
        .mean_service(5.0)
        .duration(100.0)
        .seed(1842)
        .build();
    let result = SimulationEngine::new(params).unwrap().run().unwrap();
    assert_eq!((result.arrivals, result.served, result.lost), (1, 1, 0));
    assert_eq!(result.waits, [0.0]);
    assert!(result.average_utilization > 0.0);
}

#[test]
fn test_zero_tables_rejected_before_running() {
    let params = SimulationParameters::builder().tables(0).build();
    assert!(SimulationEngine::new(params.clone()).unwrap_err().is_config_error());
    assert!(BatchRunner::with_workers(2).run(&params, 4).unwrap_err().is_config_error());
}

#[test]
fn test_yaml_zero_tables_rejected() {
    let err = ExperimentConfig::from_yaml("parameters:\n  num_tables: 0\n").unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_overloaded_floor_loses_groups() {
    let params = SimulationParameters::builder()
        .tables(2)
        .waiters(1)
        .mean_interarrival(1.0)
        .mean_service(30.0)
        .duration(300.0)
        .seed(9)
        .build();
    let result = SimulationEngine::new(params).unwrap().run().unwrap();
    assert!(result.lost > result.served);
    assert!(result.loss_fraction > 0.5);
    assert!(result.is_conserved());
}

#[test]
fn test_no_wait_policy_never_holds_a_table_without_service() {
    let params = SimulationParameters::builder()
        .tables(6)
        .waiters(1)
        .mean_interarrival(2.0)
        .mean_service(10.0)
        .duration(300.0)
        .wait_for_waiter(false)
        .seed(77)
        .build();
    let mut engine = SimulationEngine::new(params).unwrap();
    while engine.step().unwrap() {
        assert!(engine
            .floor()
            .groups()
            .all(|g| g.state() != ServiceState::WaitingForWaiter));
    }
    let result = engine.finish();
    assert!(result.waits.iter().all(|&w| w == 0.0));
}

#[test]
fn test_more_waiters_shorten_waits() {
    let mean_wait = |waiters: u32| {
        let params = SimulationParameters::builder()
            .tables(15)
            .waiters(waiters)
            .mean_interarrival(2.0)
            .mean_service(20.0)
            .duration(600.0)
            .seed(12345)
            .build();
        let outcome = BatchRunner::with_workers(4).run(&params, 20).unwrap();
        outcome.values(|r| r.average_wait).iter().sum::<f64>() / 20.0
    };
    assert!(mean_wait(6) < mean_wait(2));
}

#[test]
fn test_stress_event_reduces_busy_capacity() {
    let plan = StressPlan {
        duration: 800.0,
        reduce_at: 200.0,
        ..StressPlan::default()
    };
    let report = servsim::experiments::stress_test(&plan).unwrap();
    assert_eq!(report.understaffed.starting_waiters, 3);
    assert_eq!(report.staffed.starting_waiters, 4);
    assert!(!report.understaffed.curve.is_empty());
    assert!(report
        .staffed
        .curve
        .windows(2)
        .all(|w| w[0].0 <= w[1].0));
}

fn arbitrary_floor() -> impl Strategy<Value = SimulationParameters> {
    (
        1u32..12,
        1u32..5,
        0.5f64..10.0,
        1.0f64..40.0,
        any::<u64>(),
        any::<bool>(),
    )
        .prop_map(|(tables, waiters, interarrival, service, seed, wait)| {
            SimulationParameters::builder()
                .tables(tables)
                .waiters(waiters)
                .mean_interarrival(interarrival)
                .mean_service(service)
                .duration(150.0)
                .wait_for_waiter(wait)
                .seed(seed)
                .build()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_every_arrival_accounted_for(params in arbitrary_floor()) {
        let result = SimulationEngine::new(params).unwrap().run().unwrap();
        prop_assert!(result.is_conserved());
        prop_assert!((0.0..=1.0).contains(&result.average_utilization));
        prop_assert!((0.0..=1.0).contains(&result.loss_fraction));
        prop_assert!(result.waits.iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn prop_seated_groups_never_exceed_tables(params in arbitrary_floor()) {
        let tables = params.num_tables as usize;
        let mut engine = SimulationEngine::new(params).unwrap();
        while engine.step().unwrap() {
            prop_assert!(engine.floor().seated() <= tables);
            prop_assert!(engine.floor().busy() <= engine.floor().roster());
        }
    }
}
