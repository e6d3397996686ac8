/*
 *  tides.rs
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

//! High/low tide predictions from NOAA CO-OPS.

use chrono::{DateTime, Duration, Local, NaiveDateTime};
use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::TidesConfig;
use crate::http;

pub const ERROR_TEXT: &str = "Error getting data.";
const NOAA_TIME: &str = "%Y-%m-%d %H:%M";
const QUERY_TIME: &str = "%Y%m%d %H:%M";

const STATIONS: &[(&str, u32)] = &[
    ("portland", 8418150),
    ("popham", 8417177),
    ("old orchard", 8418557),
    ("cousins", 8417997),
];

#[derive(Debug, Error)]
pub enum TideError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("NOAA error: {0}")]
    Api(String),
    #[error("bad prediction time {0:?}")]
    Time(String),
    #[error("unknown tide station {0:?}")]
    UnknownStation(String),
}

/// Station id for a known name, or a literal numeric id.
pub fn resolve_station(name: &str) -> Result<u32, TideError> {
    let key = name.trim().to_lowercase();
    STATIONS
        .iter()
        .find(|(n, _)| *n == key)
        .map(|(_, id)| *id)
        .or_else(|| key.parse::<u32>().ok())
        .ok_or_else(|| TideError::UnknownStation(name.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TideKind {
    High,
    Low,
}

impl TideKind {
    /// NOAA uses H/L, and HH/LL for the higher high and lower low.
    pub fn from_code(code: &str) -> Self {
        if code.trim_start().starts_with('H') { TideKind::High } else { TideKind::Low }
    }

    pub fn label(self) -> &'static str {
        match self {
            TideKind::High => "High",
            TideKind::Low => "Low",
        }
    }

    fn html_color(self) -> &'static str {
        match self {
            TideKind::High => "#AA5500",
            TideKind::Low => "#0055AA",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TideEvent {
    pub kind: TideKind,
    pub time: NaiveDateTime,
    /// Height above MLLW in meters.
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    t: String,
    #[serde(default)]
    v: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TideResponse {
    predictions: Option<Vec<RawPrediction>>,
    error: Option<ApiError>,
}

pub fn parse_predictions(body: &str) -> Result<Vec<TideEvent>, TideError> {
    let resp: TideResponse = serde_json::from_str(body)?;
    let Some(raw) = resp.predictions else {
        let msg = resp.error.map(|e| e.message).unwrap_or_else(|| "no predictions".to_string());
        return Err(TideError::Api(msg));
    };
    raw.into_iter()
        .map(|p| {
            let time = NaiveDateTime::parse_from_str(&p.t, NOAA_TIME).map_err(|_| TideError::Time(p.t.clone()))?;
            Ok(TideEvent { kind: TideKind::from_code(&p.kind), time, value: p.v.trim().parse().ok() })
        })
        .collect()
}

/// Query window around `now`: six hours back, 0.85 day forward.
pub fn window(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    (now - Duration::hours(6), now + Duration::minutes(1224))
}

/// Formatted tide panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TideReport {
    pub events: Vec<TideEvent>,
    pub text: String,
    pub html: String,
    pub error: bool,
    pub fetched: Option<DateTime<Local>>,
}

impl TideReport {
    pub fn from_events(events: Vec<TideEvent>) -> Self {
        let mut text = String::new();
        let mut html = String::new();
        for (n, ev) in events.iter().enumerate() {
            text.push_str(&format!("{}: {}  ", ev.kind.label(), ev.time.format(NOAA_TIME)));
            html.push_str(&format!(
                "<span style=\"color:{}\">{}:</span> {}&nbsp;&nbsp; ",
                ev.kind.html_color(),
                ev.kind.label(),
                ev.time.format("%H:%M")
            ));
            if n == 1 {
                html.push_str("<br>\n");
            }
        }
        Self { events, text, html, error: false, fetched: Some(Local::now()) }
    }

    pub fn failed() -> Self {
        Self {
            events: Vec::new(),
            text: ERROR_TEXT.to_string(),
            html: ERROR_TEXT.to_string(),
            error: true,
            fetched: Some(Local::now()),
        }
    }
}

pub trait TideSource: Send + Sync + 'static {
    fn predictions(
        &self,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> impl Future<Output = Result<Vec<TideEvent>, TideError>> + Send;
}

pub struct NoaaTides {
    client: Client,
    base_url: String,
    station: u32,
}

impl NoaaTides {
    pub fn new(cfg: &TidesConfig) -> Result<Self, TideError> {
        let station = resolve_station(&cfg.station)?;
        let client = http::build_client(&http::ClientOptions {
            user_agent: cfg.user_agent.as_deref(),
            from: cfg.contact.as_deref(),
            ..Default::default()
        })?;
        info!("tide station {} ({})", cfg.station, station);
        Ok(Self { client, base_url: cfg.base_url.clone(), station })
    }

    pub fn query(&self, begin: NaiveDateTime, end: NaiveDateTime) -> Vec<(&'static str, String)> {
        vec![
            ("station", self.station.to_string()),
            ("begin_date", begin.format(QUERY_TIME).to_string()),
            ("end_date", end.format(QUERY_TIME).to_string()),
            ("product", "predictions".to_string()),
            ("datum", "MLLW".to_string()),
            ("time_zone", "lst_ldt".to_string()),
            ("units", "metric".to_string()),
            ("interval", "hilo".to_string()),
            ("format", "json".to_string()),
        ]
    }
}

impl TideSource for NoaaTides {
    async fn predictions(&self, begin: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<TideEvent>, TideError> {
        let params = self.query(begin, end);
        let body = http::get_text(&self.client, &self.base_url, &params, 3).await?;
        parse_predictions(&body)
    }
}

pub struct TideClient<S: TideSource> {
    source: S,
    tx: watch::Sender<TideReport>,
}

impl<S: TideSource> TideClient<S> {
    pub fn new(source: S) -> Self {
        let (tx, _) = watch::channel(TideReport::default());
        Self { source, tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<TideReport> {
        self.tx.subscribe()
    }

    pub async fn refresh(&self, now: NaiveDateTime) -> TideReport {
        let (begin, end) = window(now);
        let report = match self.source.predictions(begin, end).await {
            Ok(events) => {
                let r = TideReport::from_events(events);
                debug!("Tides: {} {}", now, r.text);
                r
            }
            Err(e) => {
                error!("tide update failed: {e}");
                TideReport::failed()
            }
        };
        self.tx.send_replace(report.clone());
        report
    }
}
