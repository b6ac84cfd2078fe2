//! Channel model
//!
//! Computes the signal quality between a device and a base station and maps
//! it to an achievable data rate.
//!
//! Two deterministic path-loss models are offered:
//! - **Okumura–Hata** (urban, small/medium city correction)
//! - **Log-distance** with a configurable exponent and reference loss
//!
//! Units:
//! - Power: dBm
//! - Distance: metres (Okumura–Hata converts to km internally)
//! - Rate: bits per second
//!
//! Distances below `min_distance_m` are clamped so a device co-located with a
//! station never yields an infinite or NaN loss.

use crate::models::{BaseStation, Position};
use serde::{Deserialize, Serialize};

/// Receiver height used by the Okumura–Hata mobile antenna correction
pub const DEVICE_HEIGHT_M: f64 = 1.5;

/// Path-loss model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathLossModel {
    /// Okumura–Hata urban model driven by the station's frequency and height
    OkumuraHata,

    /// `PL(d) = PL(d0) + 10 n log10(d / d0)` with d0 = 1 m
    LogDistance {
        exponent: f64,
        reference_loss_db: f64,
    },
}

/// Channel parameters shared by every link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub model: PathLossModel,

    /// Receiver noise floor in dBm
    pub noise_floor_dbm: f64,

    /// Lower bound applied to link distances
    pub min_distance_m: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            model: PathLossModel::OkumuraHata,
            noise_floor_dbm: -90.0,
            min_distance_m: 1.0,
        }
    }
}

impl ChannelConfig {
    /// Path loss in dB between `station` and a device at `position`
    pub fn path_loss_db(&self, station: &BaseStation, position: Position) -> f64 {
        let distance_m = station.position().distance_to(&position).max(self.min_distance_m);

        match &self.model {
            PathLossModel::OkumuraHata => okumura_hata_loss_db(
                distance_m / 1000.0,
                station.frequency_mhz(),
                station.height_m(),
                DEVICE_HEIGHT_M,
            ),
            PathLossModel::LogDistance {
                exponent,
                reference_loss_db,
            } => reference_loss_db + 10.0 * exponent * distance_m.log10(),
        }
    }

    /// Signal-to-noise ratio in dB
    pub fn snr_db(&self, station: &BaseStation, position: Position) -> f64 {
        station.tx_power_dbm() - self.path_loss_db(station, position) - self.noise_floor_dbm
    }

    /// Signal-to-noise ratio as a linear power ratio
    pub fn snr_linear(&self, station: &BaseStation, position: Position) -> f64 {
        db_to_linear(self.snr_db(station, position))
    }

    /// Achievable rate in bit/s for a link given the bandwidth share it holds
    pub fn data_rate(&self, station: &BaseStation, position: Position, bandwidth_hz: f64) -> f64 {
        shannon_rate(bandwidth_hz, self.snr_linear(station, position))
    }
}

/// Okumura–Hata urban path loss in dB
///
/// # Formula
///
/// ```text
/// a(hm) = (1.1 log10 f - 0.7) hm - (1.56 log10 f - 0.8)
/// PL    = 69.55 + 26.16 log10 f - 13.82 log10 hb - a(hm)
///         + (44.9 - 6.55 log10 hb) log10 d
/// ```
///
/// with `f` in MHz, `hb`/`hm` in metres and `d` in km.
pub fn okumura_hata_loss_db(distance_km: f64, frequency_mhz: f64, station_height_m: f64, device_height_m: f64) -> f64 {
    let log_f = frequency_mhz.log10();
    let log_hb = station_height_m.log10();
    let mobile_correction = (1.1 * log_f - 0.7) * device_height_m - (1.56 * log_f - 0.8);

    69.55 + 26.16 * log_f - 13.82 * log_hb - mobile_correction
        + (44.9 - 6.55 * log_hb) * distance_km.log10()
}

/// Shannon capacity `B log2(1 + snr)`; non-positive bandwidth yields zero
pub fn shannon_rate(bandwidth_hz: f64, snr_linear: f64) -> f64 {
    if bandwidth_hz <= 0.0 || !snr_linear.is_finite() {
        return 0.0;
    }
    bandwidth_hz * (1.0 + snr_linear.max(0.0)).log2()
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}
