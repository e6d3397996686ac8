/*
 *  color.rs
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

//! Reading-to-color helpers shared by the sensor panel and the forecast icons.

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

/// Neutral gray used for anything flagged invalid.
pub const INVALID: Rgb888 = Rgb888::new(100, 100, 100);

/// Calibration profile: which breakpoint table maps the reading to a hue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Indoor temperature, degrees C.
    Inside,
    /// Outdoor temperature, degrees C.
    Outside,
    /// Barometric pressure, mbar.
    Pressure,
}

struct Calibration {
    points: &'static [f64],
    hues: &'static [f64],
    saturation: u8,
    value: u8,
}

const INSIDE: Calibration = Calibration {
    points: &[12.0, 20.0, 25.0, 32.0],
    hues: &[270.0, 145.0, 60.0, 0.0],
    saturation: 255,
    value: 150,
};

const OUTSIDE: Calibration = Calibration {
    points: &[-15.0, 16.0, 28.0, 40.0],
    hues: &[270.0, 145.0, 60.0, 0.0],
    saturation: 255,
    value: 150,
};

const PRESSURE: Calibration = Calibration {
    points: &[900.0, 950.0, 1000.0, 1020.0, 1040.0],
    hues: &[0.0, 60.0, 120.0, 240.0, 300.0],
    saturation: 255,
    value: 120,
};

impl Profile {
    fn calibration(self) -> &'static Calibration {
        match self {
            Profile::Inside => &INSIDE,
            Profile::Outside => &OUTSIDE,
            Profile::Pressure => &PRESSURE,
        }
    }

    /// Lowest and highest calibrated reading.
    pub fn range(self) -> (f64, f64) {
        let pts = self.calibration().points;
        (pts[0], pts[pts.len() - 1])
    }

    /// Hue in degrees for a reading, clamped to the calibrated range first.
    pub fn hue(self, reading: f64) -> f64 {
        let cal = self.calibration();
        let (lo, hi) = self.range();
        if reading.is_nan() {
            return cal.hues[0];
        }
        let x = reading.clamp(lo, hi);

        for (i, pair) in cal.points.windows(2).enumerate() {
            let (x0, x1) = (pair[0], pair[1]);
            if x <= x1 {
                let (h0, h1) = (cal.hues[i], cal.hues[i + 1]);
                return h0 + (x - x0) / (x1 - x0) * (h1 - h0);
            }
        }
        cal.hues[cal.hues.len() - 1]
    }
}

/// Color for a reading. `valid == false` always yields [`INVALID`].
pub fn color_for(profile: Profile, reading: f64, valid: bool) -> Rgb888 {
    if !valid {
        return INVALID;
    }
    let cal = profile.calibration();
    hsv_to_rgb(profile.hue(reading), cal.saturation, cal.value)
}

/// HSV (hue in degrees, saturation/value 0..=255) to RGB.
pub fn hsv_to_rgb(hue: f64, saturation: u8, value: u8) -> Rgb888 {
    let h = hue.rem_euclid(360.0) / 60.0;
    let s = saturation as f64 / 255.0;
    let v = value as f64 / 255.0;

    let c = v * s;
    let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |f: f64| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb888::new(to_u8(r), to_u8(g), to_u8(b))
}

/// `#rrggbb` for rich-text consumers.
pub fn to_hex(c: Rgb888) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoints_hit_exact_hues() {
        assert_eq!(Profile::Outside.hue(-15.0), 270.0);
        assert_eq!(Profile::Outside.hue(16.0), 145.0);
        assert_eq!(Profile::Outside.hue(28.0), 60.0);
        assert_eq!(Profile::Outside.hue(40.0), 0.0);
        assert_eq!(Profile::Inside.hue(20.0), 145.0);
        assert_eq!(Profile::Pressure.hue(1020.0), 240.0);
    }

    #[test]
    fn test_clamps_outside_range() {
        assert_eq!(Profile::Inside.hue(-40.0), 270.0);
        assert_eq!(Profile::Inside.hue(99.0), 0.0);
        assert_eq!(Profile::Pressure.hue(850.0), 0.0);
        assert_eq!(Profile::Pressure.hue(1100.0), 300.0);
        assert_eq!(color_for(Profile::Outside, 60.0, true), color_for(Profile::Outside, 40.0, true));
    }

    #[test]
    fn test_monotonic_between_breakpoints() {
        for profile in [Profile::Inside, Profile::Outside, Profile::Pressure] {
            let cal = profile.calibration();
            for (i, pair) in cal.points.windows(2).enumerate() {
                let rising = cal.hues[i + 1] > cal.hues[i];
                let mut prev = profile.hue(pair[0]);
                for step in 1..=20 {
                    let x = pair[0] + (pair[1] - pair[0]) * step as f64 / 20.0;
                    let h = profile.hue(x);
                    if rising { assert!(h >= prev, "{profile:?} at {x}"); }
                    else { assert!(h <= prev, "{profile:?} at {x}"); }
                    prev = h;
                }
            }
        }
    }

    #[test]
    fn test_continuous_at_breakpoints() {
        for profile in [Profile::Inside, Profile::Outside, Profile::Pressure] {
            for &bp in profile.calibration().points {
                let below = profile.hue(bp - 1e-6);
                let above = profile.hue(bp + 1e-6);
                assert!((below - above).abs() < 1e-2, "{profile:?} jumps at {bp}");
            }
        }
    }

    #[test]
    fn test_invalid_is_gray() {
        assert_eq!(color_for(Profile::Inside, 21.0, false), INVALID);
        assert_eq!(color_for(Profile::Pressure, 1013.0, false), Rgb888::new(100, 100, 100));
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 255, 255), Rgb888::new(255, 0, 0));
        assert_eq!(hsv_to_rgb(120.0, 255, 255), Rgb888::new(0, 255, 0));
        assert_eq!(hsv_to_rgb(240.0, 255, 255), Rgb888::new(0, 0, 255));
        assert_eq!(hsv_to_rgb(0.0, 0, 150), Rgb888::new(150, 150, 150));
        assert_eq!(to_hex(Rgb888::new(170, 85, 0)), "#aa5500");
    }
}
