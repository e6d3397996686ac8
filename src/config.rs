/*
 *  config.rs
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

use chrono::{NaiveDate, NaiveDateTime};
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::tides;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every section falls back to its defaults so
/// a YAML file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// e.g. "info" | "debug"
    pub log_level: Option<String>,
    pub display: DisplayConfig,
    pub sensor: SensorConfig,
    pub weather: WeatherConfig,
    pub tides: TidesConfig,
    pub moon: MoonConfig,
    pub household: HouseholdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Theme YAML.
    pub style: Option<PathBuf>,
    pub frameless: bool,
    /// Analog dial, pixels square (two pixels per text row).
    pub clock_size: u32,
    pub icon_size: u32,
    /// Moon preview on the console, pixels square.
    pub moon_preview: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { style: None, frameless: false, clock_size: 32, icon_size: 16, moon_preview: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// Clock ticks between readings.
    pub interval_ticks: i64,
    pub poll_ms: u64,
    /// Ticks past due before an unanswered request is abandoned.
    pub stuck_ticks: i64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "tcp://bbb1:5555".to_string(),
            interval_ticks: 60,
            poll_ms: 2,
            stuck_ticks: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ForecastKind {
    /// Day and night periods
    Daily,
    /// Hour by hour
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub lat: f64,
    pub lon: f64,
    pub kind: ForecastKind,
    pub initial_ticks: i64,
    pub interval_ticks: i64,
    pub retry_ticks: i64,
    pub icon_dir: PathBuf,
    pub user_agent: Option<String>,
    /// Sent as the From header, weather.gov asks for a contact.
    pub contact: Option<String>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weather.gov".to_string(),
            // Freeport, ME
            lat: 43.8672,
            lon: -70.0968,
            kind: ForecastKind::Daily,
            initial_ticks: 3,
            interval_ticks: 3600,
            retry_ticks: 360,
            icon_dir: PathBuf::from("icons"),
            user_agent: None,
            contact: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidesConfig {
    pub base_url: String,
    /// Station name or NOAA id.
    pub station: String,
    pub interval_secs: u64,
    pub user_agent: Option<String>,
    pub contact: Option<String>,
}

impl Default for TidesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tidesandcurrents.noaa.gov/api/datagetter".to_string(),
            station: "portland".to_string(),
            interval_secs: 3 * 3600,
            user_agent: None,
            contact: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoonConfig {
    pub domain: String,
    pub path: String,
    /// Local mirror of the 216px frames, also where saved frames go.
    pub cache_dir: PathBuf,
    pub size: u32,
    pub web: bool,
    pub save: bool,
    /// Fixed reference instant (UTC) instead of now.
    pub date: Option<NaiveDateTime>,
    pub interval_secs: u64,
}

impl Default for MoonConfig {
    fn default() -> Self {
        Self {
            domain: "https://svs.gsfc.nasa.gov".to_string(),
            path: "/vis/a000000/a005000/a005048/".to_string(),
            cache_dir: PathBuf::from("moon"),
            size: 216,
            web: false,
            save: false,
            date: None,
            interval_secs: 3600,
        }
    }
}

/// Shell commands for the LED ball and the screen. Unset entries are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseholdConfig {
    pub led_off: Option<String>,
    pub led_on: Option<String>,
    pub led_on2: Option<String>,
    pub led_ready: Option<String>,
    pub display_off: Option<String>,
    pub backlight: Option<PathBuf>,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            led_off: Some(r#"ssh bbb1 "./LEDBall_off.py" >/dev/null"#.to_string()),
            led_on: Some(r#"ssh bbb1 "./LEDBall_off.py && ./matrix.py 200" >/dev/null"#.to_string()),
            led_on2: Some(r#"ssh bbb1 "./LEDBall_off.py && ./matrix.py 300 3. 50" >/dev/null"#.to_string()),
            led_ready: Some(r#"ssh bbb1 "./LEDBall_off.py && ./matrix.py 200 5." >/dev/null"#.to_string()),
            display_off: Some("/usr/bin/xset dpms force off".to_string()),
            backlight: Some(PathBuf::from("/sys/class/backlight/rpi_backlight/brightness")),
        }
    }
}

/// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` or `YYYY-MM-DDTHH:MM:SS`.
fn parse_date(s: &str) -> Result<NaiveDateTime, String> {
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("expected YYYY-MM-DD[THH:MM[:SS]], got {s:?}"))
}

/// Command line. Anything given here wins over the YAML file.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "kioskclock", version, about = "Kiosk clock with sensors, weather, tides and moon phase")]
pub struct Cli {
    /// Increase debug level (-d debug, -dd trace)
    #[arg(short = 'd', long = "debug", action = ArgAction::Count)]
    pub debug: u8,
    /// Theme YAML for the console colors
    #[arg(short = 's', long, value_hint = ValueHint::FilePath)]
    pub style: Option<PathBuf>,
    /// Drop the title bar and section rules
    #[arg(short = 'f', long, action = ArgAction::SetTrue)]
    pub frameless: bool,
    /// Always fetch the moon from the web
    #[arg(short = 'w', long, action = ArgAction::SetTrue)]
    pub web: bool,
    /// Save fetched moon frames to the cache directory
    #[arg(long, action = ArgAction::SetTrue)]
    pub save: bool,
    /// Moon image size in pixels
    #[arg(long)]
    pub moon_size: Option<u32>,
    /// Reference date for the moon phase (UTC)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDateTime>,
    /// Forecast flavour
    #[arg(long, value_enum)]
    pub forecast: Option<ForecastKind>,
    /// Tide station name or id
    #[arg(long)]
    pub station: Option<String>,
    /// Sensor bridge endpoint, e.g. tcp://bbb1:5555
    #[arg(long)]
    pub sensor: Option<String>,
    /// Path to a YAML config file (overrides search)
    #[arg(short = 'c', long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// User settings JSON (bedtime, grace period, brightness)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub settings: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    /// Refresh every source once, draw one frame and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub once: bool,
}

/// Defaults, then YAML (explicit path or search), then CLI, then validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = if let Some(p) = cli.config.as_ref() {
        if !p.exists() {
            return Err(ConfigError::Validation(format!("Config file not found: {}", p.display())));
        }
        read_yaml(p)?
    } else if let Some(p) = find_config_file() {
        read_yaml(&p)?
    } else {
        Config::default()
    };

    apply_cli_overrides(&mut cfg, cli);
    validate(&cfg)?;
    Ok(cfg)
}

/// Pretty YAML of the effective config.
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        let p = home.join(".config/kioskclock/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/kioskclock.yaml");
        if p.exists() { return Some(p) }
    }
    for candidate in &["kioskclock.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.style.is_some()       { cfg.display.style = cli.style.clone(); }
    if cli.frameless             { cfg.display.frameless = true; }
    if cli.web                   { cfg.moon.web = true; }
    if cli.save                  { cfg.moon.save = true; }
    if let Some(s) = cli.moon_size { cfg.moon.size = s; }
    if cli.date.is_some()        { cfg.moon.date = cli.date; }
    if let Some(k) = cli.forecast  { cfg.weather.kind = k; }
    if let Some(s) = cli.station.as_ref() { cfg.tides.station = s.clone(); }
    if let Some(e) = cli.sensor.as_ref()  { cfg.sensor.endpoint = e.clone(); }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let w = &cfg.weather;
    if !(-90.0..=90.0).contains(&w.lat) || !(-180.0..=180.0).contains(&w.lon) {
        return Err(ConfigError::Validation(format!("weather lat/lon out of range: {}, {}", w.lat, w.lon)));
    }
    if w.interval_ticks <= 0 || w.retry_ticks <= 0 {
        return Err(ConfigError::Validation("weather interval_ticks/retry_ticks must be > 0".into()));
    }
    if cfg.sensor.interval_ticks <= 1 || cfg.sensor.poll_ms == 0 {
        return Err(ConfigError::Validation("sensor interval_ticks must be > 1 and poll_ms > 0".into()));
    }
    if cfg.sensor.enabled && cfg.sensor.endpoint.trim().is_empty() {
        return Err(ConfigError::Validation("sensor endpoint is empty".into()));
    }
    if cfg.moon.size == 0 {
        return Err(ConfigError::Validation("moon size must be > 0".into()));
    }
    if cfg.tides.interval_secs == 0 || cfg.moon.interval_secs == 0 {
        return Err(ConfigError::Validation("tide/moon intervals must be > 0".into()));
    }
    tides::resolve_station(&cfg.tides.station).map_err(|e| ConfigError::Validation(e.to_string()))?;
    if cfg.display.clock_size == 0 || cfg.display.icon_size == 0 {
        return Err(ConfigError::Validation("display clock_size/icon_size must be > 0".into()));
    }
    Ok(())
}
