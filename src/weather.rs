/*
 *  weather.rs
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

//! api.weather.gov forecast client.
//!
//! Two hops: the points endpoint resolves a lat/lon to the gridded forecast
//! URLs, then the chosen forecast is pulled in SI units. The client keeps its
//! own tick countdown; a failed pull leaves the previous periods on screen
//! with the first period flagged as stale.

use chrono::{DateTime, FixedOffset, Local};
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{ForecastKind, WeatherConfig};
use crate::http;

pub const STALE_SUFFIX: &str = " NOT UPDATED";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("points response has no {0} URL")]
    MissingForecastUrl(&'static str),
    #[error("forecast has no periods")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    forecast: Option<String>,
    forecast_hourly: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastProperties {
    update_time: Option<String>,
    generated_at: Option<String>,
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

/// Newer API revisions send temperatures as a quantitative value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Temperature {
    Plain(f64),
    Quantity {
        value: Option<f64>,
        #[serde(rename = "unitCode")]
        unit_code: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub name: String,
    pub start_time: Option<String>,
    pub is_daytime: Option<bool>,
    pub temperature: Option<Temperature>,
    pub temperature_unit: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub short_forecast: String,
    #[serde(default)]
    pub detailed_forecast: String,
    /// Set on the first period when a refresh failed.
    #[serde(skip)]
    pub stale: bool,
}

impl ForecastPeriod {
    /// Temperature in degrees C whatever unit the API used.
    pub fn temp_c(&self) -> Option<f64> {
        match self.temperature.as_ref()? {
            Temperature::Plain(v) => match self.temperature_unit.as_deref() {
                Some("F") => Some((v - 32.0) * 5.0 / 9.0),
                _ => Some(*v),
            },
            Temperature::Quantity { value, unit_code } => {
                let v = (*value)?;
                if unit_code.ends_with("degF") { Some((v - 32.0) * 5.0 / 9.0) } else { Some(v) }
            }
        }
    }

    /// Display label; hourly periods come without a name.
    pub fn label(&self) -> String {
        let mut label = if self.name.is_empty() {
            self.start_time
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Local).format("%a %H:%M").to_string())
                .unwrap_or_else(|| format!("#{}", self.number))
        } else {
            self.name.clone()
        };
        if self.stale {
            label.push_str(STALE_SUFFIX);
        }
        label
    }

    pub fn temp_text(&self) -> String {
        match self.temp_c() {
            Some(c) => format!("{c:4.1} C"),
            None => "  -- C".to_string(),
        }
    }

    pub fn detail_html(&self) -> String {
        format!("{}: <b>{}</b><br/>\n{}", self.label(), self.short_forecast, self.detailed_forecast)
    }

    pub fn detail_text(&self) -> String {
        format!("{}: {}\n{}", self.label(), self.short_forecast, self.detailed_forecast)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub periods: Vec<ForecastPeriod>,
    pub updated: Option<DateTime<FixedOffset>>,
    pub fetched: DateTime<Local>,
    pub stale: bool,
}

impl Forecast {
    /// Flag the first period as stale. Its label gains the suffix once.
    pub fn mark_stale(&mut self) {
        self.stale = true;
        if let Some(first) = self.periods.first_mut() {
            first.stale = true;
        }
    }
}

pub fn forecast_time_line(forecast: Option<&Forecast>) -> String {
    match forecast.and_then(|f| f.updated) {
        Some(t) => t.with_timezone(&Local).format("Forecast: %Y-%m-%d %H:%M").to_string(),
        None => "Forecast: never".to_string(),
    }
}

pub fn parse_forecast(body: &str) -> Result<Forecast, WeatherError> {
    let resp: ForecastResponse = serde_json::from_str(body)?;
    let props = resp.properties;
    if props.periods.is_empty() {
        return Err(WeatherError::Empty);
    }
    let updated = props
        .update_time
        .or(props.generated_at)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok());
    Ok(Forecast { periods: props.periods, updated, fetched: Local::now(), stale: false })
}

fn forecast_url(body: &str, kind: ForecastKind) -> Result<String, WeatherError> {
    let p = serde_json::from_str::<PointsResponse>(body)?.properties;
    match kind {
        ForecastKind::Daily => p.forecast.ok_or(WeatherError::MissingForecastUrl("forecast")),
        ForecastKind::Hourly => p.forecast_hourly.ok_or(WeatherError::MissingForecastUrl("forecastHourly")),
    }
}

/// Anything that can produce a forecast.
pub trait ForecastSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Forecast, WeatherError>> + Send;
}

pub struct WeatherGov {
    client: Client,
    base_url: String,
    lat: f64,
    lon: f64,
    kind: ForecastKind,
}

impl WeatherGov {
    pub fn new(cfg: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = http::build_client(&http::ClientOptions {
            user_agent: cfg.user_agent.as_deref(),
            from: cfg.contact.as_deref(),
            accept: "application/geo+json",
            ..Default::default()
        })?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            lat: cfg.lat,
            lon: cfg.lon,
            kind: cfg.kind,
        })
    }

    pub fn points_url(&self) -> String {
        format!("{}/points/{:.4},{:.4}", self.base_url, self.lat, self.lon)
    }
}

impl ForecastSource for WeatherGov {
    async fn fetch(&self) -> Result<Forecast, WeatherError> {
        let no_params: &[(&str, &str)] = &[];
        let points = http::get_text(&self.client, &self.points_url(), no_params, 3).await?;
        let url = forecast_url(&points, self.kind)?;
        debug!("forecast url {url}");
        let body = http::get_text(&self.client, &url, &[("units", "si")], 3).await?;
        parse_forecast(&body)
    }
}

/// Cadence in one second ticks.
#[derive(Debug, Clone, Copy)]
pub struct WeatherTiming {
    pub initial: i64,
    pub interval: i64,
    pub retry: i64,
}

impl Default for WeatherTiming {
    fn default() -> Self {
        Self { initial: 3, interval: 3600, retry: 360 }
    }
}

pub struct WeatherClient<S: ForecastSource> {
    source: S,
    timing: WeatherTiming,
    countdown: i64,
    forecast: Option<Forecast>,
    tx: watch::Sender<Option<Forecast>>,
}

impl<S: ForecastSource> WeatherClient<S> {
    pub fn new(source: S, timing: WeatherTiming) -> Self {
        let (tx, _) = watch::channel(None);
        Self { source, countdown: timing.initial, timing, forecast: None, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Forecast>> {
        self.tx.subscribe()
    }

    pub fn forecast(&self) -> Option<&Forecast> {
        self.forecast.as_ref()
    }

    pub fn countdown(&self) -> i64 {
        self.countdown
    }

    /// One tick. Returns true when a fetch was attempted.
    pub async fn tick(&mut self) -> bool {
        self.countdown -= 1;
        if self.countdown > 0 {
            return false;
        }
        self.refresh().await;
        true
    }

    /// Fetch now regardless of the countdown.
    pub async fn refresh(&mut self) {
        match self.source.fetch().await {
            Ok(f) => {
                info!("forecast updated, {} periods", f.periods.len());
                self.forecast = Some(f);
                self.countdown = self.timing.interval;
            }
            Err(e) => {
                error!("forecast update failed: {e}");
                if let Some(f) = self.forecast.as_mut() {
                    f.mark_stale();
                }
                self.countdown = self.timing.retry;
            }
        }
        self.tx.send_replace(self.forecast.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const FORECAST: &str = r#"{
      "properties": {
        "updateTime": "2025-06-15T09:41:22+00:00",
        "generatedAt": "2025-06-15T10:02:00+00:00",
        "periods": [
          {"number": 1, "name": "Today", "startTime": "2025-06-15T06:00:00-04:00", "isDaytime": true,
           "temperature": 22, "temperatureUnit": "C",
           "icon": "https://api.weather.gov/icons/land/day/sct?size=medium",
           "shortForecast": "Mostly Sunny", "detailedForecast": "Mostly sunny, with a high near 22."},
          {"number": 2, "name": "Tonight", "isDaytime": false,
           "temperature": 50, "temperatureUnit": "F",
           "icon": "https://api.weather.gov/icons/land/night/rain_showers,40?size=medium",
           "shortForecast": "Chance Rain Showers", "detailedForecast": "A chance of rain showers."}
        ]
      }
    }"#;

    struct Scripted(Mutex<VecDeque<Result<Forecast, WeatherError>>>);

    impl ForecastSource for Scripted {
        async fn fetch(&self) -> Result<Forecast, WeatherError> {
            self.0.lock().unwrap().pop_front().unwrap_or(Err(WeatherError::Empty))
        }
    }

    #[test]
    fn test_parse_forecast() {
        let f = parse_forecast(FORECAST).unwrap();
        assert_eq!(f.periods.len(), 2);
        assert_eq!(f.periods[0].name, "Today");
        assert_eq!(f.periods[0].temp_c(), Some(22.0));
        assert_eq!(f.periods[1].temp_c(), Some(10.0));
        assert_eq!(f.periods[1].temp_text(), "10.0 C");
        assert_eq!(f.updated.unwrap().to_rfc3339(), "2025-06-15T09:41:22+00:00");
    }

    #[test]
    fn test_quantity_temperature() {
        let p: ForecastPeriod = serde_json::from_str(
            r#"{"name":"x","temperature":{"value":-4.0,"unitCode":"wmoUnit:degF"}}"#,
        ).unwrap();
        assert_eq!(p.temp_c(), Some(-20.0));
    }

    #[test]
    fn test_empty_forecast_is_error() {
        assert!(matches!(parse_forecast(r#"{"properties":{"periods":[]}}"#), Err(WeatherError::Empty)));
        assert!(parse_forecast("<html>").is_err());
    }

    #[test]
    fn test_forecast_url_kinds() {
        let body = r#"{"properties":{"forecast":"https://a/f","forecastHourly":"https://a/h"}}"#;
        assert_eq!(forecast_url(body, ForecastKind::Daily).unwrap(), "https://a/f");
        assert_eq!(forecast_url(body, ForecastKind::Hourly).unwrap(), "https://a/h");
        assert!(forecast_url(r#"{"properties":{}}"#, ForecastKind::Daily).is_err());
    }

    #[test]
    fn test_detail_html() {
        let f = parse_forecast(FORECAST).unwrap();
        assert_eq!(
            f.periods[0].detail_html(),
            "Today: <b>Mostly Sunny</b><br/>\nMostly sunny, with a high near 22."
        );
    }

    #[test]
    fn test_mark_stale_once() {
        let mut f = parse_forecast(FORECAST).unwrap();
        f.mark_stale();
        f.mark_stale();
        assert_eq!(f.periods[0].label(), "Today NOT UPDATED");
        assert_eq!(f.periods[0].name, "Today");
        assert_eq!(f.periods[1].label(), "Tonight");
        assert!(f.stale);
    }

    #[test]
    fn test_stale_hourly_keeps_start_time() {
        let body = r#"{"properties":{"periods":[
            {"number":1,"name":"","startTime":"2025-06-15T10:00:00-04:00","temperature":20,"temperatureUnit":"C"},
            {"number":2,"name":"","startTime":"2025-06-15T11:00:00-04:00","temperature":21,"temperatureUnit":"C"}
        ]}}"#;
        let mut f = parse_forecast(body).unwrap();
        let fresh = f.periods[0].label();
        assert!(!fresh.is_empty());
        assert!(!fresh.starts_with('#'));

        f.mark_stale();
        f.mark_stale();
        assert_eq!(f.periods[0].label(), format!("{fresh}{STALE_SUFFIX}"));
        assert!(f.periods[0].detail_text().starts_with(&format!("{fresh}{STALE_SUFFIX}:")));
    }

    #[test]
    fn test_points_url() {
        let cfg = WeatherConfig::default();
        let gov = WeatherGov::new(&cfg).unwrap();
        assert_eq!(gov.points_url(), "https://api.weather.gov/points/43.8672,-70.0968");
    }

    #[tokio::test]
    async fn test_countdown_and_backoff() {
        let source = Scripted(Mutex::new(VecDeque::from(vec![
            parse_forecast(FORECAST),
            Err(WeatherError::Empty),
        ])));
        let mut client = WeatherClient::new(source, WeatherTiming { initial: 3, interval: 10, retry: 4 });
        let mut rx = client.subscribe();

        assert!(!client.tick().await);
        assert!(!client.tick().await);
        assert!(client.tick().await);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().periods[0].name, "Today");
        assert_eq!(client.countdown(), 10);

        for _ in 0..9 {
            assert!(!client.tick().await);
        }
        assert!(client.tick().await);
        assert_eq!(client.countdown(), 4);
        let f = rx.borrow_and_update().clone().unwrap();
        assert_eq!(f.periods.len(), 2);
        assert_eq!(f.periods[0].label(), "Today NOT UPDATED");

        // still failing: stays flagged once, retries on the short cadence
        for _ in 0..4 {
            client.tick().await;
        }
        assert_eq!(client.forecast().unwrap().periods[0].label(), "Today NOT UPDATED");
        assert_eq!(client.countdown(), 4);
    }

    #[tokio::test]
    async fn test_failure_without_previous_forecast() {
        let mut client = WeatherClient::new(Scripted(Mutex::new(VecDeque::new())), WeatherTiming::default());
        client.refresh().await;
        assert!(client.forecast().is_none());
        assert_eq!(client.countdown(), 360);
    }
}
