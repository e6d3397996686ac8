/*
 *  analog.rs
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

//! Analog dial geometry. Everything lives in a 200x200 logical square
//! centered on the origin, y pointing down, scaled onto the target later.

use chrono::{NaiveTime, Timelike};

pub const LOGICAL_SIZE: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandKind {
    Hour,
    Minute,
    Second,
}

/// A clock hand: rotation in degrees clockwise from 12 and its rotated triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub kind: HandKind,
    pub angle: f32,
    pub polygon: [(f32, f32); 3],
}

/// A tick mark segment on the dial rim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub major: bool,
    pub from: (f32, f32),
    pub to: (f32, f32),
}

const HOUR_HAND: [(f32, f32); 3] = [(7.0, 8.0), (-7.0, 8.0), (0.0, -40.0)];
const MINUTE_HAND: [(f32, f32); 3] = [(7.0, 8.0), (-7.0, 8.0), (0.0, -70.0)];
const SECOND_HAND: [(f32, f32); 3] = [(2.0, 4.0), (-2.0, 4.0), (0.0, -75.0)];

/// Rotate a point clockwise (screen coordinates) about the origin.
pub fn rotate((x, y): (f32, f32), degrees: f32) -> (f32, f32) {
    let (s, c) = degrees.to_radians().sin_cos();
    (x * c - y * s, x * s + y * c)
}

fn rotated(shape: &[(f32, f32); 3], degrees: f32) -> [(f32, f32); 3] {
    [rotate(shape[0], degrees), rotate(shape[1], degrees), rotate(shape[2], degrees)]
}

/// Hour, minute and second hands for `t`, in that order.
pub fn hands(t: NaiveTime) -> [Hand; 3] {
    let h = (t.hour() % 12) as f32;
    let m = t.minute() as f32;
    let s = t.second() as f32;

    let hour = 30.0 * (h + m / 60.0);
    let minute = 6.0 * (m + s / 60.0);
    let second = 6.0 * s;

    [
        Hand { kind: HandKind::Hour, angle: hour, polygon: rotated(&HOUR_HAND, hour) },
        Hand { kind: HandKind::Minute, angle: minute, polygon: rotated(&MINUTE_HAND, minute) },
        Hand { kind: HandKind::Second, angle: second, polygon: rotated(&SECOND_HAND, second) },
    ]
}

/// Twelve hour ticks (88..96) and the 48 remaining minute ticks (92..96).
pub fn ticks() -> Vec<Tick> {
    (0..60)
        .map(|i| {
            let major = i % 5 == 0;
            let inner = if major { 88.0 } else { 92.0 };
            let deg = i as f32 * 6.0;
            Tick { major, from: rotate((0.0, -inner), deg), to: rotate((0.0, -96.0), deg) }
        })
        .collect()
}

/// Map a logical point onto a square of `side` pixels with origin top-left.
pub fn to_pixels((x, y): (f32, f32), side: u32) -> (i32, i32) {
    let scale = side as f32 / LOGICAL_SIZE;
    let half = side as f32 / 2.0;
    ((half + x * scale).round() as i32, (half + y * scale).round() as i32)
}
