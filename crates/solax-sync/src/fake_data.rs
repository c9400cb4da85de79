// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Solax Sync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Synthetic Solax telemetry for installations without live credentials.
//!
//! One call produces one snapshot at the current instant: a half-sine
//! irradiance curve between the computed sunrise and sunset, modulated by a
//! sinusoidal cloud model, plus a household load model and a derived
//! battery state. Output keys match the live API field names so the
//! normalizer treats both sources identically.

use crate::config::FakeDataConfig;
use crate::error::Result;
use crate::source::{RawPayload, TelemetrySource};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, NaiveTime, TimeZone, Timelike, Utc};
use serde_json::json;
use std::f64::consts::{FRAC_2_PI, PI, TAU};
use tracing::debug;

/// Official sunrise/sunset zenith: 90°50' (solar disc radius + refraction).
const ZENITH_DEG: f64 = 90.833;

#[derive(Debug, Clone, Copy)]
struct SunTimes {
    sunrise: i64,
    sunset: i64,
}

/// Deterministic generator of plausible solar production data.
#[derive(Debug, Clone)]
pub struct FakeDataGenerator {
    config: FakeDataConfig,
}

impl FakeDataGenerator {
    pub fn new(config: FakeDataConfig) -> Self {
        Self { config }
    }

    /// Compute a telemetry snapshot for the given instant.
    pub fn snapshot_at(&self, now: DateTime<Local>) -> RawPayload {
        let timestamp = now.timestamp();
        let sun = self.sun_times(now);
        let daylight_seconds = (sun.sunset - sun.sunrise).max(1);
        let is_daytime = timestamp > sun.sunrise && timestamp < sun.sunset;

        let progress = progress(timestamp, sun.sunrise, sun.sunset);
        let base_intensity = if is_daytime { (PI * progress).sin() } else { 0.0 };
        let cloud_coverage = self.cloud_coverage(now);
        let cloud_factor = (1.0 - 0.7 * cloud_coverage).max(0.2);
        let intensity = (base_intensity * cloud_factor).max(0.0);

        let peak_power = self.config.peak_power_w;
        let ac_power = intensity * peak_power;

        // Cumulative half-sine integral, normalized to [0, 1] over the day.
        let energy_fraction = if is_daytime {
            (1.0 - (PI * progress).cos()) / 2.0
        } else {
            0.0
        };
        let daylight_hours = daylight_seconds as f64 / 3600.0;
        // Average of a half-sine over its half period is 2/pi of the peak.
        let daily_potential = (peak_power / 1000.0) * daylight_hours * FRAC_2_PI;
        let cloud_efficiency = (1.0 - 0.5 * cloud_coverage).max(0.25);
        let yield_today = daily_potential * energy_fraction * cloud_efficiency;
        let yield_total = self.config.base_total_yield_kwh + yield_today;

        let base_load = self.config.household_base_load_w;
        let consumption = consumption(timestamp, base_load, ac_power, is_daytime, progress);
        let feed_in_power = (ac_power - consumption).max(0.0);
        let self_consumption_power = (ac_power - feed_in_power).max(0.0);

        let seconds_since_midnight = i64::from(now.time().num_seconds_from_midnight());
        let base_consumption_energy =
            (base_load / 1000.0) * (seconds_since_midnight as f64 / 3600.0);
        let self_consumption_energy = if yield_today > 0.0 {
            let ratio = if self_consumption_power > 0.0 {
                self_consumption_power / ac_power.max(1.0)
            } else {
                0.3
            };
            (yield_today * ratio.min(0.7)).min(yield_today)
        } else {
            0.0
        };
        let consume_energy = base_consumption_energy + self_consumption_energy;
        let feed_in_energy = (yield_today - self_consumption_energy).max(0.0);

        let state_of_charge = state_of_charge(timestamp, sun, energy_fraction, cloud_coverage);
        let battery_power = battery_power(
            state_of_charge,
            consumption,
            feed_in_power,
            peak_power,
            is_daytime,
        );

        let (pv_power_1, pv_power_2) = split_pv_strings(ac_power);

        let mut payload = RawPayload::new();
        payload.insert("timestamp".to_string(), json!(timestamp));
        payload.insert("acpower".to_string(), json!(round_to(ac_power, 2)));
        payload.insert("yieldtoday".to_string(), json!(round_to(yield_today, 3)));
        payload.insert("yieldtotal".to_string(), json!(round_to(yield_total, 3)));
        payload.insert("feedinpower".to_string(), json!(round_to(feed_in_power, 2)));
        payload.insert("feedinenergy".to_string(), json!(round_to(feed_in_energy, 3)));
        payload.insert("consumeenergy".to_string(), json!(round_to(consume_energy, 3)));
        payload.insert("consumptionpower".to_string(), json!(round_to(consumption, 2)));
        payload.insert("soc".to_string(), json!(round_to(state_of_charge, 1)));
        payload.insert("batterypower".to_string(), json!(round_to(battery_power, 2)));
        payload.insert("pvpower1".to_string(), json!(round_to(pv_power_1, 2)));
        payload.insert("pvpower2".to_string(), json!(round_to(pv_power_2, 2)));
        payload.insert("cloud_coverage".to_string(), json!(round_to(cloud_coverage, 3)));
        payload.insert(
            "self_consumption_power".to_string(),
            json!(round_to(self_consumption_power, 2)),
        );

        debug!(
            "Generated fake Solax metrics: acpower={:.2}, soc={:.1}, cloud={:.3}",
            ac_power, state_of_charge, cloud_coverage
        );

        payload
    }

    /// Sunrise/sunset for the local date of `now` from the standard NOAA
    /// equations (fractional year, equation of time, declination, hour
    /// angle). Polar day/night or an inverted result falls back to a fixed
    /// 06:00-18:00 local window.
    fn sun_times(&self, now: DateTime<Local>) -> SunTimes {
        let date = now.date_naive();
        let latitude = self.config.latitude.to_radians();

        // Fractional year, evaluated at local noon of the date.
        let gamma = TAU / 365.0 * (f64::from(date.ordinal()) - 1.0);

        let eq_time_min = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());

        let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        let cos_hour_angle = ZENITH_DEG.to_radians().cos() / (latitude.cos() * declination.cos())
            - latitude.tan() * declination.tan();

        if !(-1.0..=1.0).contains(&cos_hour_angle) {
            return self.fallback_sun_times(now);
        }

        let hour_angle_deg = cos_hour_angle.acos().to_degrees();
        let sunrise_min = 720.0 - 4.0 * (self.config.longitude + hour_angle_deg) - eq_time_min;
        let sunset_min = 720.0 - 4.0 * (self.config.longitude - hour_angle_deg) - eq_time_min;

        let utc_midnight = Utc
            .from_utc_datetime(&date.and_time(NaiveTime::MIN))
            .timestamp();
        let sunrise = utc_midnight + (sunrise_min * 60.0).round() as i64;
        let sunset = utc_midnight + (sunset_min * 60.0).round() as i64;

        if sunset <= sunrise {
            return self.fallback_sun_times(now);
        }

        SunTimes { sunrise, sunset }
    }

    fn fallback_sun_times(&self, now: DateTime<Local>) -> SunTimes {
        let local_midnight = now.timestamp() - i64::from(now.time().num_seconds_from_midnight());

        SunTimes {
            sunrise: local_midnight + 6 * 3600,
            sunset: local_midnight + 18 * 3600,
        }
    }

    /// Weighted blend of a daily cycle, a seasonal weather front and a
    /// short-term ripple, scaled by the configured variability.
    fn cloud_coverage(&self, now: DateTime<Local>) -> f64 {
        let variability = self.config.cloud_variability;
        if variability <= 0.0 {
            return 0.0;
        }

        let day_of_year = f64::from(now.ordinal0());
        let minutes = f64::from(now.hour() * 60 + now.minute());

        let daily_cycle = 0.5 + 0.5 * (minutes / 1440.0 * TAU + day_of_year / 3.0).sin();
        let weather_front = 0.5 + 0.5 * (day_of_year / 365.0 * TAU).sin();
        let short_term = 0.5 + 0.5 * (minutes / 60.0 * PI + day_of_year).sin();

        let coverage = daily_cycle * 0.5 + weather_front * 0.3 + short_term * 0.2;

        coverage.clamp(0.0, 1.0) * variability
    }
}

fn progress(timestamp: i64, sunrise: i64, sunset: i64) -> f64 {
    if timestamp <= sunrise {
        return 0.0;
    }

    if timestamp >= sunset {
        return 1.0;
    }

    (timestamp - sunrise) as f64 / (sunset - sunrise).max(1) as f64
}

/// Household load: base load, a fast ripple, daytime/evening/morning boosts
/// and a bounded self-consumption term. Never drops below 200 W.
fn consumption(timestamp: i64, base_load: f64, ac_power: f64, is_daytime: bool, progress: f64) -> f64 {
    let variation = 60.0 * (timestamp as f64 / 900.0 + 1.3).sin();
    let day_boost = if is_daytime {
        ac_power * 0.12 + base_load * 0.1 + 140.0 * (PI * progress).sin()
    } else {
        0.0
    };
    let evening_boost = if !is_daytime && progress >= 1.0 {
        base_load * 0.25
    } else {
        0.0
    };
    let morning_boost = if !is_daytime && progress <= 0.0 {
        base_load * 0.15
    } else {
        0.0
    };

    let mut consumption = base_load + variation + day_boost + evening_boost + morning_boost;
    consumption += (ac_power * 0.35).min(base_load * 0.6).max(0.0);

    consumption.max(200.0)
}

fn state_of_charge(timestamp: i64, sun: SunTimes, energy_fraction: f64, cloud_coverage: f64) -> f64 {
    if timestamp <= sun.sunrise {
        let hours_until_sunrise = (sun.sunrise - timestamp) as f64 / 3600.0;
        return (55.0 - hours_until_sunrise * 5.0).max(20.0);
    }

    if timestamp >= sun.sunset {
        let hours_after_sunset = (timestamp - sun.sunset) as f64 / 3600.0;
        return (80.0 - hours_after_sunset * 7.0).max(12.0);
    }

    let charge = 25.0 + 75.0 * energy_fraction * (1.0 - 0.4 * cloud_coverage);

    charge.clamp(25.0, 97.0)
}

fn battery_power(
    state_of_charge: f64,
    consumption: f64,
    feed_in_power: f64,
    peak_power: f64,
    is_daytime: bool,
) -> f64 {
    if is_daytime {
        if state_of_charge < 95.0 && feed_in_power > 30.0 {
            return feed_in_power.min(peak_power * 0.25);
        }

        return -(consumption * 0.1).min(peak_power * 0.05);
    }

    let discharge = (consumption * 0.6).min(state_of_charge / 100.0 * peak_power * 0.2);

    if discharge > 0.0 { -discharge } else { 0.0 }
}

fn split_pv_strings(ac_power: f64) -> (f64, f64) {
    let primary = ac_power * 0.58;
    let secondary = ac_power - primary;

    (primary, secondary.max(0.0))
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[async_trait]
impl TelemetrySource for FakeDataGenerator {
    async fn fetch(&self) -> Result<RawPayload> {
        Ok(self.snapshot_at(Local::now()))
    }
}
