//! End-to-end episode scenarios
//!
//! Fixed control policies run over full episodes, checked against the
//! published metrics.

use std::collections::BTreeMap;

use smartcity_simulator_core_rs::metrics::{class_key, keys};
use smartcity_simulator_core_rs::mobility::BoundaryPolicy;
use smartcity_simulator_core_rs::{
    Action, DeviceKind, DropReason, Event, MobilityConfig, MobilityModel, Orchestrator,
    PathLossModel, Position, SimulationArea, SimulationConfig, StationConfig, StepMetrics,
};

fn scalar(metrics: &StepMetrics, base: &str, kind: DeviceKind) -> f64 {
    metrics
        .scalar(&class_key(base, kind))
        .unwrap_or_else(|| panic!("missing metric {}", class_key(base, kind)))
}

/// Run `steps` steps of a constant action, checking `inspect` after each one
fn run_constant<F>(engine: &mut Orchestrator, action: Action, steps: usize, mut inspect: F)
where
    F: FnMut(usize, &Orchestrator, f64),
{
    for i in 0..steps {
        let result = engine.step(action).unwrap();
        inspect(i, engine, result.reward);
    }
}

// ============================================================================
// Even Split
// ============================================================================

#[test]
fn test_even_split_for_full_episode() {
    let config = SimulationConfig::smart_city(5, 10);
    let total_bandwidth = config.stations[0].bandwidth_hz;
    let total_compute = config.stations[0].compute_capacity;
    let mut engine = Orchestrator::new(config).unwrap();
    engine.reset(Some(666)).unwrap();

    run_constant(&mut engine, Action::new(0.5, 0.5), 100, |_, engine, reward| {
        let metrics = engine.metrics();
        assert!(reward.is_finite());
        for kind in DeviceKind::ALL {
            assert_eq!(scalar(metrics, keys::BANDWIDTH_FRACTION, kind), 0.5);
            assert_eq!(scalar(metrics, keys::COMPUTE_FRACTION, kind), 0.5);
            assert_eq!(scalar(metrics, keys::BANDWIDTH_HZ, kind), total_bandwidth / 2.0);
            assert_eq!(scalar(metrics, keys::COMPUTE_UNITS, kind), total_compute / 2.0);
        }
    });

    // Horizon of 100 steps ends the episode
    assert!(engine.step(Action::new(0.5, 0.5)).is_err());
}

#[test]
fn test_reward_matches_published_metrics() {
    let mut engine = Orchestrator::new(SimulationConfig::smart_city(5, 10)).unwrap();
    engine.reset(Some(17)).unwrap();

    run_constant(&mut engine, Action::new(0.3, 0.6), 40, |_, engine, reward| {
        let m = engine.metrics();
        let expected = 0.01 * scalar(m, keys::THROUGHPUT_MBIT, DeviceKind::Ue)
            + 0.01 * scalar(m, keys::THROUGHPUT_MBIT, DeviceKind::Sensor)
            - 5.0 * scalar(m, keys::DELAYED_PACKETS, DeviceKind::Ue)
            - 2.0 * scalar(m, keys::DELAYED_PACKETS, DeviceKind::Sensor)
            - 0.5 * m.scalar(keys::MEAN_AORI).unwrap()
            - 0.5 * m.scalar(keys::MEAN_AOSI).unwrap();
        assert!((reward - expected).abs() < 1e-9, "{} vs {}", reward, expected);
    });
}

// ============================================================================
// Starvation
// ============================================================================

#[test]
fn test_starved_sensors_accumulate_delayed_packets() {
    let mut engine = Orchestrator::new(SimulationConfig::smart_city(5, 10)).unwrap();
    engine.reset(Some(666)).unwrap();

    let mut previous = 0.0;
    let mut max_queue = 0.0f64;
    // Everything to UEs: sensors receive neither bandwidth nor compute
    run_constant(&mut engine, Action::new(1.0, 1.0), 100, |_, engine, _| {
        let metrics = engine.metrics();
        assert_eq!(scalar(metrics, keys::BANDWIDTH_HZ, DeviceKind::Sensor), 0.0);
        assert_eq!(scalar(metrics, keys::THROUGHPUT_MBIT, DeviceKind::Sensor), 0.0);
        assert_eq!(scalar(metrics, keys::DELIVERED, DeviceKind::Sensor), 0.0);

        let total = scalar(metrics, keys::TOTAL_DELAYED_PACKETS, DeviceKind::Sensor);
        assert!(total >= previous);
        previous = total;
        max_queue = max_queue.max(scalar(metrics, keys::QUEUE_SIZE, DeviceKind::Sensor));
    });

    assert!(previous > 0.0);
    assert!(max_queue > 0.0);
    assert!(engine.cumulative_drops().sensor.delayed() > 0);
}

#[test]
fn test_starved_ues_accumulate_delayed_packets() {
    let mut engine = Orchestrator::new(SimulationConfig::smart_city(5, 10)).unwrap();
    engine.reset(Some(666)).unwrap();

    let mut previous = 0.0;
    run_constant(&mut engine, Action::new(0.0, 0.0), 100, |_, engine, reward| {
        let metrics = engine.metrics();
        assert!(reward.is_finite());
        assert_eq!(scalar(metrics, keys::BANDWIDTH_HZ, DeviceKind::Ue), 0.0);
        assert_eq!(scalar(metrics, keys::COMPUTE_UNITS, DeviceKind::Ue), 0.0);

        let total = scalar(metrics, keys::TOTAL_DELAYED_PACKETS, DeviceKind::Ue);
        assert!(total >= previous);
        previous = total;
    });

    assert!(previous > 0.0);
}

// ============================================================================
// Coverage
// ============================================================================

#[test]
fn test_out_of_coverage_device_is_frozen() {
    let mut config = SimulationConfig::smart_city(3, 4);
    config.sensor_positions.push(Position::new(70_000.0, 70_000.0));
    let far_id = 4u32;
    let mut engine = Orchestrator::new(config).unwrap();

    let (_, info) = engine.reset(Some(5)).unwrap();
    assert_eq!(info.connections.sensor, 4);

    run_constant(&mut engine, Action::new(0.5, 0.5), 30, |_, engine, _| {
        let metrics = engine.metrics();
        assert_eq!(scalar(metrics, keys::CONNECTIONS, DeviceKind::Sensor), 4.0);

        let rate = metrics.per_entity(&class_key(keys::DATARATE_MBPS, DeviceKind::Sensor)).unwrap();
        assert_eq!(rate[&far_id], 0.0);
        let utility = metrics.per_entity(&class_key(keys::UTILITY, DeviceKind::Sensor)).unwrap();
        assert_eq!(utility[&far_id], -1.0);

        let aori = metrics.per_entity(&class_key(keys::AORI, DeviceKind::Sensor)).unwrap();
        let aosi = metrics.per_entity(&class_key(keys::AOSI, DeviceKind::Sensor)).unwrap();
        assert_eq!(aori[&far_id], 0.0);
        assert_eq!(aosi[&far_id], 0.0);
    });

    let far = engine.state().find_device(DeviceKind::Sensor, far_id).unwrap();
    assert!(!far.is_connected());
    assert!(far.uplink().is_empty());
    assert!(engine
        .event_log()
        .events_for_device(DeviceKind::Sensor, far_id)
        .is_empty());
}

#[test]
fn test_all_devices_in_area_attach() {
    let mut engine = Orchestrator::new(SimulationConfig::smart_city(5, 10)).unwrap();
    let (_, info) = engine.reset(Some(1)).unwrap();
    assert_eq!(info.connections.ue, 5);
    assert_eq!(info.connections.sensor, 10);

    run_constant(&mut engine, Action::new(0.5, 0.5), 20, |_, engine, _| {
        assert_eq!(scalar(engine.metrics(), keys::CONNECTIONS, DeviceKind::Ue), 5.0);
        assert_eq!(scalar(engine.metrics(), keys::CONNECTIONS, DeviceKind::Sensor), 10.0);
        assert_eq!(engine.event_log().events_of_type("DeviceDetached").len(), 0);
    });
}

// ============================================================================
// Demand-proportional Sharing
// ============================================================================

#[test]
fn test_demand_proportional_policy_runs_full_episode() {
    let mut config = SimulationConfig::smart_city(5, 10);
    config.share_policy = smartcity_simulator_core_rs::SharePolicyConfig::DemandProportional;
    config.horizon = 50;
    let mut engine = Orchestrator::new(config).unwrap();
    engine.reset(Some(9)).unwrap();

    let mut done = false;
    run_constant(&mut engine, Action::new(0.5, 0.5), 50, |i, engine, reward| {
        assert!(reward.is_finite());
        assert_eq!(scalar(engine.metrics(), keys::BANDWIDTH_HZ, DeviceKind::Ue), 50e6);
        done = i == 49;
    });
    assert!(done);
    assert!(engine.episode_reward().is_finite());
}

// ============================================================================
// Roaming
// ============================================================================

/// 2 km square with a single central station whose coverage is a few hundred
/// metres, so random-walking UEs keep leaving and re-entering it
fn roaming_config() -> SimulationConfig {
    let mut config = SimulationConfig::smart_city(6, 0);
    config.area = SimulationArea {
        width: 2000.0,
        height: 2000.0,
    };
    config.stations = vec![StationConfig::at(0, config.area.center())];
    config.sensor_positions = vec![Position::new(980.0, 1000.0), Position::new(1020.0, 1000.0)];
    config.channel.model = PathLossModel::LogDistance {
        exponent: 3.5,
        reference_loss_db: 40.0,
    };
    config.mobility = MobilityConfig {
        model: MobilityModel::RandomWalk {
            max_displacement: 150.0,
        },
        boundary: BoundaryPolicy::Reflect,
    };
    config
}

type Ages = BTreeMap<(DeviceKind, u32), (u64, u64)>;

fn ages(engine: &Orchestrator) -> Ages {
    engine
        .state()
        .devices()
        .iter()
        .map(|d| ((d.kind(), d.id()), (d.aoi().aori(), d.aoi().aosi())))
        .collect()
}

#[test]
fn test_roaming_devices_follow_age_and_detach_rules() {
    let mut detaches = 0;
    let mut frozen_non_zero = 0;

    for seed in 0..20 {
        let mut engine = Orchestrator::new(roaming_config()).unwrap();
        engine.reset(Some(seed)).unwrap();
        let mut previous = ages(&engine);
        let mut cancelled_in_episode = 0u64;

        for _ in 0..100 {
            let step = engine.current_step();
            engine.step(Action::new(0.5, 0.5)).unwrap();

            let events: Vec<&Event> = engine
                .event_log()
                .events()
                .iter()
                .filter(|e| e.step() == step)
                .collect();
            let happened = |name: &str, device: (DeviceKind, u32)| {
                events
                    .iter()
                    .any(|e| e.event_type() == name && e.device() == Some(device))
            };
            let metrics = engine.metrics();

            for device in engine.state().devices() {
                let key = (device.kind(), device.id());
                let current = (device.aoi().aori(), device.aoi().aosi());
                let (prev_aori, prev_aosi) = previous[&key];

                if device.is_connected() {
                    let aori = if happened("TransferStarted", key) { 0 } else { prev_aori + 1 };
                    let aosi = if happened("JobDelivered", key) { 0 } else { prev_aosi + 1 };
                    assert_eq!(current, (aori, aosi), "{:?} at step {}", key, step);
                } else {
                    assert_eq!(current, (prev_aori, prev_aosi), "{:?} aged while detached", key);
                    if current != (0, 0) {
                        frozen_non_zero += 1;
                    }
                    let rate = metrics
                        .per_entity(&class_key(keys::DATARATE_MBPS, device.kind()))
                        .unwrap();
                    assert_eq!(rate[&device.id()], 0.0);
                    assert!(device.uplink().iter().all(|job| !job.is_in_flight()));
                }

                let published = metrics.per_entity(&class_key(keys::AORI, device.kind())).unwrap();
                assert_eq!(published[&device.id()], current.0 as f64);
            }

            // Every disconnect drop belongs to a device that detached this step
            let detached: Vec<(DeviceKind, u32)> = events
                .iter()
                .filter(|e| e.event_type() == "DeviceDetached")
                .filter_map(|e| e.device())
                .collect();
            let cancelled: Vec<(DeviceKind, u32)> = events
                .iter()
                .filter(|e| {
                    matches!(
                        e,
                        Event::JobDropped {
                            reason: DropReason::Disconnect,
                            ..
                        }
                    )
                })
                .filter_map(|e| e.device())
                .collect();
            for device in &cancelled {
                assert!(detached.contains(device));
            }
            for kind in DeviceKind::ALL {
                let count = cancelled.iter().filter(|(k, _)| *k == kind).count();
                assert_eq!(scalar(metrics, keys::DISCONNECT_DROPS, kind), count as f64);
            }

            detaches += detached.len();
            cancelled_in_episode += cancelled.len() as u64;
            previous = ages(&engine);
        }

        // Sensors sit next to the station and never lose it
        assert_eq!(engine.cumulative_drops().sensor.disconnect, 0);
        assert_eq!(engine.cumulative_drops().ue.disconnect, cancelled_in_episode);
    }

    assert!(detaches > 0, "no UE ever left coverage");
    assert!(frozen_non_zero > 0);
}
