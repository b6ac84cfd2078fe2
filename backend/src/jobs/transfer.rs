//! Uplink transfer stage
//!
//! Each connected device spends `rate × step_duration` bits on its uplink
//! queue, head first. A job whose last bit leaves the device moves to its
//! station's compute queue; several small jobs may complete in one step.

use crate::allocation::AllocationPlan;
use crate::channel::ChannelConfig;
use crate::jobs::JobStepReport;
use crate::models::{DropReason, Event, JobError, JobStage, SimulationState};

pub fn transfer_uplinks(
    state: &mut SimulationState,
    plan: &AllocationPlan,
    channel: &ChannelConfig,
    step_duration_s: f64,
    step: usize,
    report: &mut JobStepReport,
) -> Result<(), JobError> {
    let (devices, stations) = state.split_mut();

    for (index, device) in devices.iter_mut().enumerate() {
        let station_id = match device.station() {
            Some(id) => id,
            None => continue,
        };
        let station = match stations.iter_mut().find(|s| s.id() == station_id) {
            Some(s) => s,
            None => continue,
        };

        let kind = device.kind();
        let device_id = device.id();
        let rate = channel.data_rate(station, device.position(), plan.device_bandwidth(index));
        let mut budget = rate * step_duration_s;

        while budget > 0.0 {
            let job = match device.uplink_mut().front_mut() {
                Some(job) => job,
                None => break,
            };

            let first_bits = *job.stage() == JobStage::Generated;
            let sent = job.transmit(budget, step)?;
            budget -= sent;
            *report.transmitted_bits.get_mut(kind) += sent;

            if first_bits && sent > 0.0 {
                report.transfer_started.insert(index);
                report.events.push(Event::TransferStarted {
                    step,
                    job_id: job.id(),
                    kind,
                    device_id,
                });
            }

            if *job.stage() != JobStage::QueuedForCompute {
                break;
            }

            let job = match device.uplink_mut().pop_front() {
                Some(job) => job,
                None => break,
            };
            report.events.push(Event::TransferCompleted {
                step,
                job_id: job.id(),
                kind,
                device_id,
                station_id,
            });

            if let Err(mut rejected) = station.compute_queue_mut(kind).push(job) {
                rejected.drop_with(DropReason::Overflow, step)?;
                report.record_drop(&rejected, DropReason::Overflow, step);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{allocate, Action, EqualShare};
    use crate::models::{BaseStation, Device, DeviceKind, Job, Position};

    fn state() -> SimulationState {
        let station = BaseStation::new(0, Position::new(0.0, 0.0), 1e6, 10.0, 3500.0, 40.0, 40.0, 1);
        let mut ue = Device::new_ue(0, 1.5, 10);
        ue.place(Position::new(10.0, 0.0));
        ue.attach(0);
        SimulationState::new(vec![ue], vec![station])
    }

    #[test]
    fn test_small_jobs_complete_in_one_step() {
        let mut state = state();
        for id in 0..2 {
            state
                .device_mut(0)
                .unwrap()
                .uplink_mut()
                .push(Job::new(id, 0, DeviceKind::Ue, 0, 100.0, 1.0))
                .unwrap();
        }
        let plan = allocate(&Action::new(1.0, 1.0), &state, &EqualShare);
        let mut report = JobStepReport::default();
        transfer_uplinks(&mut state, &plan, &ChannelConfig::default(), 1.0, 0, &mut report).unwrap();

        // Station queue holds one job; the second overflows
        assert!(state.device(0).unwrap().uplink().is_empty());
        assert_eq!(state.station(0).unwrap().compute_queue(DeviceKind::Ue).len(), 1);
        assert_eq!(report.drops.ue.overflow, 1);
        assert_eq!(report.transmitted_bits.ue, 200.0);
        assert!(report.transfer_started.contains(&0));
    }

    #[test]
    fn test_large_job_spans_steps() {
        let mut state = state();
        state
            .device_mut(0)
            .unwrap()
            .uplink_mut()
            .push(Job::new(0, 0, DeviceKind::Ue, 0, 1e12, 1.0))
            .unwrap();
        let plan = allocate(&Action::new(1.0, 1.0), &state, &EqualShare);
        let channel = ChannelConfig::default();

        let mut first = JobStepReport::default();
        transfer_uplinks(&mut state, &plan, &channel, 1.0, 0, &mut first).unwrap();
        assert!(first.transfer_started.contains(&0));

        let mut second = JobStepReport::default();
        transfer_uplinks(&mut state, &plan, &channel, 1.0, 1, &mut second).unwrap();
        // Transfer already under way: not a new start
        assert!(second.transfer_started.is_empty());
        assert!(second.transmitted_bits.ue > 0.0);
        assert!(state.device(0).unwrap().uplink().front().unwrap().is_in_flight());
    }
}
