//! Named conversion functions applied to signal values before actuation.
//!
//! Actuator rows reference conversions by name; [`lookup`] resolves the
//! name to a typed function pointer at startup so a typo fails the run
//! before the first timestep rather than at first invocation. Every
//! conversion is a pure function of (site, timestamp, value).

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::config::SiteConfig;

/// A registered conversion: (site, simulated timestamp, raw signal value)
/// to the value written into the engine.
pub type ConvertFn = fn(&SiteConfig, NaiveDateTime, f64) -> f64;

/// Conversion name meaning "write the signal value through unchanged".
pub const NO_CONVERSION: &str = "none";

/// The registry of named conversions.
const REGISTRY: &[(&str, ConvertFn)] = &[
    ("fahrenheit_to_celsius", fahrenheit_to_celsius),
    ("mph_to_mps", mph_to_mps),
    ("inhg_to_pa", inhg_to_pa),
    ("ghi_to_dhi", ghi_to_dhi),
    ("ghi_to_dni", ghi_to_dni),
];

/// Resolves a conversion name to its function.
pub fn lookup(name: &str) -> Option<ConvertFn> {
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
}

/// All registered conversion names, for diagnostics.
pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(n, _)| *n).collect()
}

fn fahrenheit_to_celsius(_site: &SiteConfig, _time: NaiveDateTime, temp_f: f64) -> f64 {
    (temp_f - 32.0) * (5.0 / 9.0)
}

fn mph_to_mps(_site: &SiteConfig, _time: NaiveDateTime, speed_mph: f64) -> f64 {
    speed_mph * 0.44704
}

fn inhg_to_pa(_site: &SiteConfig, _time: NaiveDateTime, pressure_inhg: f64) -> f64 {
    pressure_inhg * 3386.39
}

/// Extraterrestrial solar constant in W/m².
const SOLAR_CONSTANT: f64 = 1361.0;

/// Cosine of the solar zenith angle at the site for a local-standard
/// timestamp. Declination and equation-of-time use the Cooper/Spencer
/// approximations; accuracy within a degree, which is enough for a
/// diffuse-fraction split.
fn cos_zenith(site: &SiteConfig, time: NaiveDateTime) -> f64 {
    let n = time.ordinal() as f64;
    let declination = (23.45_f64).to_radians() * (2.0 * PI * (284.0 + n) / 365.0).sin();

    let b = 2.0 * PI * (n - 81.0) / 364.0;
    let eot_minutes = 9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin();

    let clock_hours =
        time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0;
    let meridian = 15.0 * site.utc_offset_hours;
    let solar_hours = clock_hours + (site.longitude - meridian) * 4.0 / 60.0 + eot_minutes / 60.0;
    let hour_angle = (15.0 * (solar_hours - 12.0)).to_radians();

    let lat = site.latitude.to_radians();
    lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos()
}

/// Diffuse fraction of global horizontal irradiance per the Erbs model.
fn erbs_diffuse_fraction(kt: f64) -> f64 {
    if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.8 {
        1.0 - 0.09 * kt - 0.6 * (kt - 0.22).powi(2)
    } else {
        0.165
    }
}

/// Splits GHI (W/m²) into its diffuse horizontal component.
fn ghi_to_dhi(site: &SiteConfig, time: NaiveDateTime, ghi: f64) -> f64 {
    let cos_theta = cos_zenith(site, time);
    let ghi_0 = SOLAR_CONSTANT * cos_theta;
    if ghi_0 <= 0.0 {
        // Sun below the horizon.
        return 0.0;
    }
    let kt = ghi / ghi_0;
    ghi * erbs_diffuse_fraction(kt)
}

/// Derives direct normal irradiance from GHI (W/m²) via the Erbs split.
fn ghi_to_dni(site: &SiteConfig, time: NaiveDateTime, ghi: f64) -> f64 {
    let cos_theta = cos_zenith(site, time);
    let ghi_0 = SOLAR_CONSTANT * cos_theta;
    if ghi_0 <= 0.0 || cos_theta <= 0.0 {
        return 0.0;
    }
    let kt = ghi / ghi_0;
    let dhi = ghi * erbs_diffuse_fraction(kt);
    (ghi - dhi) / cos_theta
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, month, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid date")
    }

    fn golden_site() -> SiteConfig {
        SiteConfig {
            latitude: 39.74,
            longitude: -105.18,
            utc_offset_hours: -7.0,
        }
    }

    #[test]
    fn every_registered_name_resolves() {
        for name in names() {
            assert!(lookup(name).is_some(), "\"{name}\" should resolve");
        }
    }

    #[test]
    fn unknown_name_does_not_resolve() {
        assert!(lookup("celsius_to_kelvin").is_none());
        assert!(lookup("").is_none());
        // "none" is a table marker, not a registry entry.
        assert!(lookup(NO_CONVERSION).is_none());
    }

    #[test]
    fn fahrenheit_conversion() {
        let site = golden_site();
        let t = noon(6, 21);
        assert!((fahrenheit_to_celsius(&site, t, 32.0)).abs() < 1e-9);
        assert!((fahrenheit_to_celsius(&site, t, 212.0) - 100.0).abs() < 1e-9);
        assert!((fahrenheit_to_celsius(&site, t, -40.0) + 40.0).abs() < 1e-9);
    }

    #[test]
    fn wind_and_pressure_conversions() {
        let site = golden_site();
        let t = noon(6, 21);
        assert!((mph_to_mps(&site, t, 10.0) - 4.4704).abs() < 1e-9);
        assert!((inhg_to_pa(&site, t, 29.92) - 101_300.0).abs() < 100.0);
    }

    #[test]
    fn sun_up_at_summer_noon() {
        let cz = cos_zenith(&golden_site(), noon(6, 21));
        assert!(cz > 0.8, "midsummer noon sun should be high, got {cz}");
    }

    #[test]
    fn sun_down_at_midnight() {
        let t = NaiveDate::from_ymd_opt(2026, 6, 21)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        assert!(cos_zenith(&golden_site(), t) < 0.0);
    }

    #[test]
    fn erbs_split_is_zero_at_night() {
        let site = golden_site();
        let midnight = NaiveDate::from_ymd_opt(2026, 1, 15)
            .and_then(|d| d.and_hms_opt(1, 0, 0))
            .expect("valid date");
        assert_eq!(ghi_to_dhi(&site, midnight, 100.0), 0.0);
        assert_eq!(ghi_to_dni(&site, midnight, 100.0), 0.0);
    }

    #[test]
    fn erbs_split_partitions_daytime_ghi() {
        let site = golden_site();
        let t = noon(6, 21);
        let ghi = 800.0;
        let dhi = ghi_to_dhi(&site, t, ghi);
        let dni = ghi_to_dni(&site, t, ghi);
        assert!(dhi > 0.0 && dhi < ghi, "dhi should be a proper fraction, got {dhi}");
        assert!(dni > 0.0, "clear-sky noon should have beam irradiance");
        // Reconstruct GHI from the split.
        let cz = cos_zenith(&site, t);
        assert!((dhi + dni * cz - ghi).abs() < 1e-6);
    }

    #[test]
    fn overcast_sky_is_mostly_diffuse() {
        // Very low clearness index: nearly all of GHI stays diffuse.
        let site = golden_site();
        let t = noon(12, 21);
        let ghi = 50.0;
        let dhi = ghi_to_dhi(&site, t, ghi);
        assert!(dhi / ghi > 0.9, "overcast dhi fraction was {}", dhi / ghi);
    }
}
