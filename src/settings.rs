/*
 *  settings.rs
 *
 *  KioskClock - tides, weather & time
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

//! User settings file, a small JSON object:
//!
//! ```json
//! { "BedTime": "20:15:00", "GracePeriod": 10, "Brightness": 150 }
//! ```
//!
//! Keys are applied one at a time; a bad value is logged and skipped.

use chrono::{Duration, NaiveTime};
use dirs_next::home_dir;
use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bedtime::BedtimeWindow;

pub const GRACE_RANGE: std::ops::RangeInclusive<i64> = 1..=60;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings must be a JSON object")]
    NotObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub bedtime: NaiveTime,
    pub grace_minutes: u32,
    pub brightness: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bedtime: NaiveTime::from_hms_opt(20, 15, 0).unwrap_or_default(),
            grace_minutes: 10,
            brightness: 150,
        }
    }
}

impl Settings {
    pub fn window(&self) -> BedtimeWindow {
        BedtimeWindow { start: self.bedtime, grace: Duration::minutes(self.grace_minutes as i64) }
    }
}

pub fn default_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".kioskclock.json"))
}

/// `hh:mm:ss` or `hh:mm`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Integers may come as numbers or numeric strings.
fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Apply whatever keys in `json` are usable on top of `base`.
pub fn apply_json(base: Settings, json: &Value) -> Result<Settings, SettingsError> {
    let obj = json.as_object().ok_or(SettingsError::NotObject)?;
    let mut s = base;

    if let Some(v) = obj.get("BedTime") {
        match v.as_str().and_then(parse_time) {
            Some(t) => s.bedtime = t,
            None => warn!("Could not set bedtime to {v}"),
        }
    }
    if let Some(v) = obj.get("GracePeriod") {
        match as_int(v).filter(|g| GRACE_RANGE.contains(g)) {
            Some(g) => s.grace_minutes = g as u32,
            None => warn!("ignoring GracePeriod {v}, expected 1..=60 minutes"),
        }
    }
    if let Some(v) = obj.get("Brightness") {
        match as_int(v).and_then(|b| u8::try_from(b).ok()) {
            Some(b) => s.brightness = b,
            None => warn!("ignoring Brightness {v}, expected 0..=255"),
        }
    }
    Ok(s)
}

pub fn read(path: &Path) -> Result<Settings, SettingsError> {
    let text = std::fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&text)?;
    apply_json(Settings::default(), &json)
}

/// Settings from `path` (or the default location). Never fails: a missing or
/// broken file leaves the defaults in place.
pub fn load(path: Option<&Path>) -> Settings {
    let Some(path) = path.map(Path::to_path_buf).or_else(default_path) else {
        return Settings::default();
    };
    if !path.exists() {
        info!("no settings file at {}, using defaults", path.display());
        return Settings::default();
    }
    match read(&path) {
        Ok(s) => {
            info!("settings from {}: bedtime {} grace {} min brightness {}", path.display(), s.bedtime, s.grace_minutes, s.brightness);
            s
        }
        Err(e) => {
            warn!("settings file {} unusable: {e}", path.display());
            Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_keys() {
        let s = apply_json(Settings::default(), &json!({"BedTime": "21:30:15", "GracePeriod": 5, "Brightness": 80})).unwrap();
        assert_eq!(s.bedtime, NaiveTime::from_hms_opt(21, 30, 15).unwrap());
        assert_eq!(s.grace_minutes, 5);
        assert_eq!(s.brightness, 80);
        assert_eq!(s.window().grace, Duration::minutes(5));
    }

    #[test]
    fn test_short_time_and_string_numbers() {
        let s = apply_json(Settings::default(), &json!({"BedTime": "22:05", "GracePeriod": "15"})).unwrap();
        assert_eq!(s.bedtime, NaiveTime::from_hms_opt(22, 5, 0).unwrap());
        assert_eq!(s.grace_minutes, 15);
        assert_eq!(s.brightness, 150);
    }

    #[test]
    fn test_bad_values_skipped() {
        let s = apply_json(
            Settings::default(),
            &json!({"BedTime": "late", "GracePeriod": 90, "Brightness": 300}),
        ).unwrap();
        assert_eq!(s, Settings::default());

        let s = apply_json(Settings::default(), &json!({"BedTime": "19:00", "Brightness": -1})).unwrap();
        assert_eq!(s.bedtime, NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        assert_eq!(s.brightness, 150);
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(apply_json(Settings::default(), &json!([1, 2])), Err(SettingsError::NotObject)));
    }

    #[test]
    fn test_load_missing_and_broken() {
        assert_eq!(load(Some(Path::new("/nonexistent/settings.json"))), Settings::default());

        let path = std::env::temp_dir().join(format!("kioskclock-settings-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load(Some(&path)), Settings::default());
        std::fs::write(&path, r#"{"GracePeriod": 20}"#).unwrap();
        assert_eq!(load(Some(&path)).grace_minutes, 20);
        std::fs::remove_file(&path).ok();
    }
}
