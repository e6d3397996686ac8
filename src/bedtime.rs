/*
 *  bedtime.rs
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

//! Daily bedtime window.
//!
//! From `start` for `grace` the clock is highlighted. Entering the window
//! switches a lit LED ball to its "ready for bed" pattern; leaving it turns
//! the ball and the screen off. Both instants fire once per day, detected as
//! crossings between consecutive ticks.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use log::{debug, info};

const DAY_SECS: i64 = 86_400;

/// Crossings older than this (suspend, clock jumps) are ignored.
const MAX_LATE_SECS: i64 = 60;

/// LED ball state as last commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
    #[default]
    Off,
    On,
    OnAlternate,
    ReadyForBed,
}

impl Indicator {
    pub fn code(self) -> u8 {
        match self {
            Indicator::Off => 0,
            Indicator::On => 1,
            Indicator::OnAlternate => 2,
            Indicator::ReadyForBed => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Indicator::Off => "LED off",
            Indicator::On => "LED on",
            Indicator::OnAlternate => "LED on 2",
            Indicator::ReadyForBed => "LED bedtime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BedtimeWindow {
    pub start: NaiveTime,
    pub grace: Duration,
}

impl Default for BedtimeWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(20, 15, 0).unwrap_or_default(),
            grace: Duration::minutes(10),
        }
    }
}

impl BedtimeWindow {
    pub fn end(&self) -> NaiveTime {
        self.start.overflowing_add_signed(self.grace).0
    }

    /// `start <= t < start + grace`, wrapping past midnight.
    pub fn contains(&self, t: NaiveTime) -> bool {
        let offset = (t - self.start).num_seconds().rem_euclid(DAY_SECS);
        offset < self.grace.num_seconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedtimeAction {
    /// Switch the LED ball to its bedtime pattern.
    ReadyForBed,
    /// LED ball off and display off.
    LightsOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BedtimeStatus {
    pub highlighted: bool,
    pub actions: Vec<BedtimeAction>,
}

#[derive(Debug, Clone)]
pub struct BedtimeMonitor {
    window: BedtimeWindow,
    last_tick: Option<NaiveDateTime>,
    ready_fired: Option<NaiveDateTime>,
    lights_out_fired: Option<NaiveDateTime>,
}

/// Latest occurrence of `at` not after `now`.
fn latest_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today <= now { today } else { today - Duration::days(1) }
}

impl BedtimeMonitor {
    pub fn new(window: BedtimeWindow) -> Self {
        Self { window, last_tick: None, ready_fired: None, lights_out_fired: None }
    }

    pub fn window(&self) -> BedtimeWindow {
        self.window
    }

    pub fn set_window(&mut self, window: BedtimeWindow) {
        info!("bedtime {} grace {} min", window.start, window.grace.num_minutes());
        self.window = window;
    }

    /// Occurrence of `at` crossed since the previous tick, if any.
    fn crossed(&self, at: NaiveTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let occ = latest_occurrence(at, now);
        let late = now - occ;
        let hit = match self.last_tick {
            Some(prev) => prev < occ && late < Duration::seconds(MAX_LATE_SECS),
            None => late < Duration::seconds(1),
        };
        hit.then_some(occ)
    }

    pub fn tick(&mut self, now: NaiveDateTime, indicator: Indicator) -> BedtimeStatus {
        let mut status = BedtimeStatus { highlighted: self.window.contains(now.time()), actions: Vec::new() };

        if let Some(occ) = self.crossed(self.window.start, now) {
            let lit = matches!(indicator, Indicator::On | Indicator::OnAlternate);
            if lit && self.ready_fired != Some(occ) {
                debug!("bedtime reached at {now}");
                self.ready_fired = Some(occ);
                status.actions.push(BedtimeAction::ReadyForBed);
            }
        }

        if let Some(occ) = self.crossed(self.window.end(), now) {
            if self.lights_out_fired != Some(occ) {
                debug!("bedtime grace over at {now}");
                self.lights_out_fired = Some(occ);
                status.actions.push(BedtimeAction::LightsOut);
            }
        }

        self.last_tick = Some(now);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap().and_time(t(h, m, s))
    }

    /// Tick once a second over [from, to) and collect every action.
    fn run(mon: &mut BedtimeMonitor, from: NaiveDateTime, to: NaiveDateTime, ind: &mut Indicator) -> Vec<(NaiveDateTime, BedtimeAction)> {
        let mut out = Vec::new();
        let mut now = from;
        while now < to {
            for a in mon.tick(now, *ind).actions {
                *ind = match a {
                    BedtimeAction::ReadyForBed => Indicator::ReadyForBed,
                    BedtimeAction::LightsOut => Indicator::Off,
                };
                out.push((now, a));
            }
            now += Duration::seconds(1);
        }
        out
    }

    #[test]
    fn test_highlight_window() {
        let w = BedtimeWindow::default();
        assert!(!w.contains(t(20, 14, 59)));
        assert!(w.contains(t(20, 15, 0)));
        assert!(w.contains(t(20, 24, 59)));
        assert!(!w.contains(t(20, 25, 0)));
        assert_eq!(w.end(), t(20, 25, 0));
    }

    #[test]
    fn test_window_across_midnight() {
        let w = BedtimeWindow { start: t(23, 55, 0), grace: Duration::minutes(10) };
        assert!(w.contains(t(23, 59, 59)));
        assert!(w.contains(t(0, 4, 59)));
        assert!(!w.contains(t(0, 5, 0)));
        assert!(!w.contains(t(23, 54, 59)));
    }

    #[test]
    fn test_ready_for_bed_fires_once() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        let mut ind = Indicator::On;
        let acts = run(&mut mon, at(15, 20, 14, 0), at(15, 20, 30, 0), &mut ind);
        assert_eq!(
            acts,
            vec![
                (at(15, 20, 15, 0), BedtimeAction::ReadyForBed),
                (at(15, 20, 25, 0), BedtimeAction::LightsOut),
            ]
        );
        assert_eq!(ind, Indicator::Off);
    }

    #[test]
    fn test_ready_for_bed_skipped_when_off() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        let mut ind = Indicator::Off;
        let acts = run(&mut mon, at(15, 20, 14, 0), at(15, 20, 30, 0), &mut ind);
        assert_eq!(acts, vec![(at(15, 20, 25, 0), BedtimeAction::LightsOut)]);
    }

    #[test]
    fn test_ready_for_bed_idempotent_for_terminal_state() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        let status = mon.tick(at(15, 20, 15, 0), Indicator::ReadyForBed);
        assert!(status.highlighted);
        assert!(status.actions.is_empty());
    }

    #[test]
    fn test_repeated_tick_does_not_refire() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        let first = mon.tick(at(15, 20, 25, 0), Indicator::On);
        assert_eq!(first.actions, vec![BedtimeAction::LightsOut]);
        let again = mon.tick(at(15, 20, 25, 0), Indicator::On);
        assert!(again.actions.is_empty());
    }

    #[test]
    fn test_stalled_tick_still_fires() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        mon.tick(at(15, 20, 14, 59), Indicator::OnAlternate);
        let s = mon.tick(at(15, 20, 15, 2), Indicator::OnAlternate);
        assert_eq!(s.actions, vec![BedtimeAction::ReadyForBed]);
    }

    #[test]
    fn test_once_per_day() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        let mut ind = Indicator::On;
        let day1 = run(&mut mon, at(15, 20, 10, 0), at(15, 20, 30, 0), &mut ind);
        assert_eq!(day1.len(), 2);
        ind = Indicator::On;
        let day2 = run(&mut mon, at(16, 20, 10, 0), at(16, 20, 30, 0), &mut ind);
        assert_eq!(day2.len(), 2);
        assert_eq!(day2[1].0, at(16, 20, 25, 0));
    }

    #[test]
    fn test_no_fire_mid_window_start() {
        let mut mon = BedtimeMonitor::new(BedtimeWindow::default());
        let s = mon.tick(at(15, 20, 20, 0), Indicator::On);
        assert!(s.highlighted);
        assert!(s.actions.is_empty());
    }
}
