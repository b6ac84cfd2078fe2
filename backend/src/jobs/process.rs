//! Compute stage
//!
//! Each station serves its per-class compute queues FIFO with the compute
//! budget the allocation gives that class. Leftover budget of one class is
//! not lent to the other.

use crate::allocation::AllocationPlan;
use crate::jobs::JobStepReport;
use crate::models::{DeviceKind, Event, JobError, SimulationState};

pub fn serve_compute(
    state: &mut SimulationState,
    plan: &AllocationPlan,
    step: usize,
    report: &mut JobStepReport,
) -> Result<(), JobError> {
    let (devices, stations) = state.split_mut();

    for station in stations.iter_mut() {
        let allocation = plan.station(station.id());

        for kind in DeviceKind::ALL {
            let mut budget = allocation.map_or(0.0, |a| a.compute_for(kind));

            while budget > 0.0 {
                let job = match station.compute_queue_mut(kind).front_mut() {
                    Some(job) => job,
                    None => break,
                };

                budget -= job.serve(budget, step)?;
                if !job.is_finished() {
                    break;
                }

                let job = match station.compute_queue_mut(kind).pop_front() {
                    Some(job) => job,
                    None => break,
                };
                station.record_delivery(kind);

                let e2e_delay = job.e2e_delay().unwrap_or_default();
                *report.delivered.get_mut(kind) += 1;
                report.e2e_delays.get_mut(kind).push(e2e_delay);
                if let Some(index) = devices
                    .iter()
                    .position(|d| d.kind() == kind && d.id() == job.device_id())
                {
                    report.delivered_devices.insert(index);
                }
                report.events.push(Event::JobDelivered {
                    step,
                    job_id: job.id(),
                    kind,
                    device_id: job.device_id(),
                    e2e_delay,
                });
            }
        }
    }

    Ok(())
}
