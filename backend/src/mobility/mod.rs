//! Mobility model
//!
//! Advances UE positions once per step. Sensors never move.
//!
//! # Boundary policy
//!
//! Every candidate position passes through [`SimulationArea::apply_boundary`]
//! before it is stored, so a UE can never leave the area:
//! - `Clamp`: coordinates outside the area are pinned to the nearest edge
//! - `Reflect`: the overshoot is mirrored back into the area
//!
//! Out-of-bounds attempts are corrected, never reported as errors.

use crate::models::{Device, DeviceProfile, Position, SimulationState};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Rectangular simulation area `[0, width] x [0, height]` in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationArea {
    pub width: f64,
    pub height: f64,
}

impl Default for SimulationArea {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 200.0,
        }
    }
}

impl SimulationArea {
    pub fn center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn contains(&self, position: Position) -> bool {
        (0.0..=self.width).contains(&position.x) && (0.0..=self.height).contains(&position.y)
    }

    /// Uniformly drawn position inside the area
    pub fn random_position(&self, rng: &mut RngManager) -> Position {
        let x = rng.next_f64() * self.width;
        let y = rng.next_f64() * self.height;
        Position::new(x, y)
    }

    /// Bring `position` back inside the area according to `policy`
    pub fn apply_boundary(&self, position: Position, policy: BoundaryPolicy) -> Position {
        match policy {
            BoundaryPolicy::Clamp => Position::new(
                position.x.clamp(0.0, self.width),
                position.y.clamp(0.0, self.height),
            ),
            BoundaryPolicy::Reflect => Position::new(
                reflect(position.x, self.width),
                reflect(position.y, self.height),
            ),
        }
    }
}

fn reflect(value: f64, upper: f64) -> f64 {
    let mirrored = if value < 0.0 {
        -value
    } else if value > upper {
        2.0 * upper - value
    } else {
        value
    };
    // overshoot larger than the area itself
    mirrored.clamp(0.0, upper)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    Clamp,
    Reflect,
}

/// UE movement pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MobilityModel {
    /// Walk toward a uniformly drawn waypoint at the UE's velocity; draw a
    /// new waypoint on arrival
    RandomWaypoint,

    /// Independent uniform displacement in `[-max, max]` on each axis
    RandomWalk { max_displacement: f64 },

    /// UEs stay where they were placed
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityConfig {
    pub model: MobilityModel,
    pub boundary: BoundaryPolicy,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            model: MobilityModel::RandomWaypoint,
            boundary: BoundaryPolicy::Clamp,
        }
    }
}

impl MobilityConfig {
    /// Draw an initial position for every UE
    pub fn place_devices(&self, area: &SimulationArea, state: &mut SimulationState, rng: &mut RngManager) {
        for device in state.devices_mut().iter_mut().filter(|d| d.is_mobile()) {
            let position = area.random_position(rng);
            device.place(position);
        }
    }

    /// Advance every UE by one step
    pub fn move_devices(&self, area: &SimulationArea, state: &mut SimulationState, rng: &mut RngManager) {
        for device in state.devices_mut().iter_mut() {
            self.move_device(area, device, rng);
        }
    }

    fn move_device(&self, area: &SimulationArea, device: &mut Device, rng: &mut RngManager) {
        let current = device.position();

        let candidate = match (&self.model, device.profile_mut()) {
            (_, DeviceProfile::Sensor) => return,
            (MobilityModel::Static, _) => return,
            (MobilityModel::RandomWalk { max_displacement }, _) => {
                let dx = rng.uniform(-max_displacement, *max_displacement);
                let dy = rng.uniform(-max_displacement, *max_displacement);
                Position::new(current.x + dx, current.y + dy)
            }
            (MobilityModel::RandomWaypoint, DeviceProfile::Ue { velocity, waypoint }) => {
                let target = match waypoint {
                    Some(target) => *target,
                    None => {
                        let target = area.random_position(rng);
                        *waypoint = Some(target);
                        target
                    }
                };

                let distance = current.distance_to(&target);
                if distance <= *velocity {
                    *waypoint = None;
                    target
                } else {
                    let ratio = *velocity / distance;
                    Position::new(
                        current.x + (target.x - current.x) * ratio,
                        current.y + (target.y - current.y) * ratio,
                    )
                }
            }
        };

        device.set_position(area.apply_boundary(candidate, self.boundary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BaseStation;

    fn state() -> SimulationState {
        let station = BaseStation::new(0, Position::new(100.0, 100.0), 1e6, 10.0, 3500.0, 40.0, 40.0, 10);
        SimulationState::new(
            vec![
                Device::new_ue(0, 1.5, 5),
                Device::new_ue(1, 1.5, 5),
                Device::new_sensor(0, Position::new(10.0, 10.0), 5),
            ],
            vec![station],
        )
    }

    #[test]
    fn test_clamp_pins_to_edges() {
        let area = SimulationArea::default();
        let p = area.apply_boundary(Position::new(-5.0, 250.0), BoundaryPolicy::Clamp);
        assert_eq!(p, Position::new(0.0, 200.0));
    }

    #[test]
    fn test_reflect_mirrors_overshoot() {
        let area = SimulationArea::default();
        let p = area.apply_boundary(Position::new(-5.0, 210.0), BoundaryPolicy::Reflect);
        assert_eq!(p, Position::new(5.0, 190.0));

        // Overshoot wider than the area still lands inside
        let p = area.apply_boundary(Position::new(-500.0, 50.0), BoundaryPolicy::Reflect);
        assert!(area.contains(p));
    }

    #[test]
    fn test_random_walk_stays_in_area() {
        let area = SimulationArea {
            width: 10.0,
            height: 10.0,
        };
        for boundary in [BoundaryPolicy::Clamp, BoundaryPolicy::Reflect] {
            let config = MobilityConfig {
                model: MobilityModel::RandomWalk {
                    max_displacement: 25.0,
                },
                boundary,
            };
            let mut rng = RngManager::new(3);
            let mut state = state();
            config.place_devices(&area, &mut state, &mut rng);
            for _ in 0..200 {
                config.move_devices(&area, &mut state, &mut rng);
                for device in state.devices() {
                    if device.is_mobile() {
                        assert!(area.contains(device.position()));
                    }
                }
            }
        }
    }

    #[test]
    fn test_waypoint_step_bounded_by_velocity() {
        let area = SimulationArea::default();
        let config = MobilityConfig::default();
        let mut rng = RngManager::new(11);
        let mut state = state();
        config.place_devices(&area, &mut state, &mut rng);

        for _ in 0..100 {
            let before: Vec<Position> = state.devices().iter().map(|d| d.position()).collect();
            config.move_devices(&area, &mut state, &mut rng);
            for (device, prev) in state.devices().iter().zip(before) {
                assert!(device.position().distance_to(&prev) <= 1.5 + 1e-9);
                assert!(area.contains(device.position()));
            }
        }
    }

    #[test]
    fn test_sensors_never_move() {
        let area = SimulationArea::default();
        let config = MobilityConfig {
            model: MobilityModel::RandomWalk {
                max_displacement: 5.0,
            },
            boundary: BoundaryPolicy::Clamp,
        };
        let mut rng = RngManager::new(1);
        let mut state = state();
        for _ in 0..20 {
            config.move_devices(&area, &mut state, &mut rng);
        }
        let sensor = state.devices().iter().find(|d| !d.is_mobile()).unwrap();
        assert_eq!(sensor.position(), Position::new(10.0, 10.0));
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let area = SimulationArea::default();
        let config = MobilityConfig::default();
        let run = |seed| {
            let mut rng = RngManager::new(seed);
            let mut state = state();
            config.place_devices(&area, &mut state, &mut rng);
            for _ in 0..30 {
                config.move_devices(&area, &mut state, &mut rng);
            }
            state.devices().iter().map(|d| d.position()).collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
