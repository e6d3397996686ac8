/*
 *  sensor.rs
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

//! Sensor bridge client.
//!
//! The bridge is a small board on the LAN answering a one byte request with a
//! bracketed, comma separated list of readings. Polling is driven by the clock
//! tick: the countdown reaching 1 sends the request and every tick while it is
//! outstanding waits a couple of milliseconds for the answer.

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as TokMutex, watch};
use tokio::task::JoinHandle;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// Slots in a reading.
pub const READING_LEN: usize = 11;

/// The request datagram.
pub const REQUEST: &[u8] = b"a";

pub const INSIDE_TAG: usize = 0;
pub const INSIDE_TEMP: usize = 1;
pub const INSIDE_PRESSURE: usize = 2;
pub const INSIDE_HUMIDITY: usize = 3;
pub const OUTSIDE_TAG: usize = 4;
pub const OUTSIDE_TEMP: usize = 5;
pub const OUTSIDE_PRESSURE: usize = 6;
pub const OUTSIDE_HUMIDITY: usize = 7;
pub const CLOSET_TAG: usize = 8;
pub const CLOSET_HUMIDITY: usize = 9;
pub const CLOSET_TEMP: usize = 10;

const PLACEHOLDER: f64 = -99.9;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),
    #[error("sensor exchange aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("sensor transport not connected")]
    NotConnected,
}

/// One slot of a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Number(f64),
    /// Non-numeric token such as the location markers.
    Tag(String),
    /// Slot the payload did not provide.
    Missing,
}

impl SensorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    fn from_token(token: &str) -> Self {
        let t = token.trim();
        match t.parse::<f64>() {
            Ok(v) => SensorValue::Number(v),
            Err(_) => SensorValue::Tag(t.replace(['"', '\''], "")),
        }
    }
}

/// Fixed eleven slot reading, see the index constants above.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading(pub [SensorValue; READING_LEN]);

impl Default for SensorReading {
    fn default() -> Self {
        SensorReading(std::array::from_fn(|_| SensorValue::Number(PLACEHOLDER)))
    }
}

impl SensorReading {
    pub fn get(&self, idx: usize) -> Option<f64> {
        self.0.get(idx).and_then(SensorValue::as_f64)
    }

    pub fn inside_temp(&self) -> Option<f64> { self.get(INSIDE_TEMP) }
    pub fn inside_pressure(&self) -> Option<f64> { self.get(INSIDE_PRESSURE) }
    pub fn inside_humidity(&self) -> Option<f64> { self.get(INSIDE_HUMIDITY) }
    pub fn outside_temp(&self) -> Option<f64> { self.get(OUTSIDE_TEMP) }
    pub fn outside_pressure(&self) -> Option<f64> { self.get(OUTSIDE_PRESSURE) }
    pub fn outside_humidity(&self) -> Option<f64> { self.get(OUTSIDE_HUMIDITY) }
    pub fn closet_humidity(&self) -> Option<f64> { self.get(CLOSET_HUMIDITY) }
    pub fn closet_temp(&self) -> Option<f64> { self.get(CLOSET_TEMP) }
}

/// Parse a reply: drop the bracketing bytes, split on commas, numbers where
/// they parse and tags otherwise. Always eleven slots.
pub fn parse_payload(raw: &[u8]) -> SensorReading {
    let mut slots: [SensorValue; READING_LEN] = std::array::from_fn(|_| SensorValue::Missing);
    if raw.len() < 2 {
        warn!("sensor payload too short ({} bytes)", raw.len());
        return SensorReading(slots);
    }

    let body = String::from_utf8_lossy(&raw[1..raw.len() - 1]);
    let tokens: Vec<&str> = body.split(',').collect();
    if tokens.len() != READING_LEN {
        warn!("sensor payload has {} fields, expected {}", tokens.len(), READING_LEN);
    }
    for (slot, token) in slots.iter_mut().zip(tokens) {
        *slot = SensorValue::from_token(token);
    }
    SensorReading(slots)
}

/// What listeners see.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorSnapshot {
    pub reading: SensorReading,
    pub valid: bool,
    pub updated: Option<DateTime<Local>>,
}

/// Request/reply link to the bridge.
pub trait SensorTransport: Send + 'static {
    fn request(&mut self, payload: &[u8]) -> impl Future<Output = Result<Vec<u8>, SensorError>> + Send;

    /// Forget any half finished exchange.
    fn reset(&mut self) {}
}

/// ZeroMQ REQ socket, connected lazily and rebuilt after any failure.
pub struct ZmqTransport {
    endpoint: String,
    socket: Option<ReqSocket>,
}

impl ZmqTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), socket: None }
    }
}

async fn exchange(socket: &mut ReqSocket, payload: &[u8]) -> Result<Vec<u8>, SensorError> {
    socket.send(ZmqMessage::from(payload.to_vec())).await?;
    let reply = socket.recv().await?;
    let mut out = Vec::new();
    for frame in reply.into_vec() {
        out.extend_from_slice(&frame);
    }
    Ok(out)
}

impl SensorTransport for ZmqTransport {
    async fn request(&mut self, payload: &[u8]) -> Result<Vec<u8>, SensorError> {
        if self.socket.is_none() {
            let mut socket = ReqSocket::new();
            socket.connect(&self.endpoint).await?;
            info!("sensor bridge connected to {}", self.endpoint);
            self.socket = Some(socket);
        }
        let socket = self.socket.as_mut().ok_or(SensorError::NotConnected)?;
        let result = exchange(socket, payload).await;
        if result.is_err() {
            self.socket = None;
        }
        result
    }

    fn reset(&mut self) {
        self.socket = None;
    }
}

/// Polling knobs, all in clock ticks except the poll window.
#[derive(Debug, Clone)]
pub struct BridgeTiming {
    pub interval: i64,
    pub poll_window: Duration,
    /// Ticks past due before an unanswered request is abandoned.
    pub stuck_after: i64,
}

impl Default for BridgeTiming {
    fn default() -> Self {
        Self { interval: 60, poll_window: Duration::from_millis(2), stuck_after: 30 }
    }
}

type Exchange = JoinHandle<Result<Vec<u8>, SensorError>>;

pub struct SensorBridge<T: SensorTransport> {
    transport: Arc<TokMutex<T>>,
    in_flight: Option<Exchange>,
    countdown: i64,
    timing: BridgeTiming,
    snapshot: SensorSnapshot,
    tx: watch::Sender<SensorSnapshot>,
}

impl<T: SensorTransport> SensorBridge<T> {
    pub fn new(transport: T, timing: BridgeTiming) -> Self {
        let snapshot = SensorSnapshot::default();
        let (tx, _) = watch::channel(snapshot.clone());
        Self {
            transport: Arc::new(TokMutex::new(transport)),
            in_flight: None,
            // first tick sends
            countdown: 2,
            timing,
            snapshot,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SensorSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    pub fn countdown(&self) -> i64 {
        self.countdown
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn send_request(&mut self) {
        let transport = Arc::clone(&self.transport);
        debug!("sensor request sent");
        self.in_flight = Some(tokio::spawn(async move {
            let mut link = transport.lock().await;
            link.request(REQUEST).await
        }));
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot.clone());
    }

    /// Advance one clock tick.
    pub async fn tick(&mut self) {
        self.countdown -= 1;

        if self.countdown <= 1 && self.in_flight.is_none() {
            self.send_request();
        }

        if let Some(handle) = self.in_flight.as_mut() {
            match tokio::time::timeout(self.timing.poll_window, handle).await {
                Ok(outcome) => {
                    self.in_flight = None;
                    match outcome.map_err(SensorError::from).and_then(|r| r) {
                        Ok(raw) => {
                            self.snapshot = SensorSnapshot {
                                reading: parse_payload(&raw),
                                valid: true,
                                updated: Some(Local::now()),
                            };
                            self.countdown = self.timing.interval;
                            self.publish();
                            return;
                        }
                        Err(e) => {
                            warn!("sensor request failed: {e}");
                            self.transport.lock().await.reset();
                        }
                    }
                }
                // nothing yet, look again next tick
                Err(_) => {}
            }
        }

        if self.in_flight.is_some() && self.countdown < -self.timing.stuck_after {
            if let Some(handle) = self.in_flight.take() {
                warn!("sensor request unanswered after {} ticks, resetting", -self.countdown);
                handle.abort();
                self.transport.lock().await.reset();
            }
        }

        if self.countdown < -1 && self.snapshot.valid {
            info!("sensor reading stale, marking invalid");
            self.snapshot.valid = false;
            self.publish();
        }
    }
}
