/*
 *  input.rs
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

//! Line commands typed on the kiosk keyboard.

use chrono::NaiveTime;

use crate::bedtime::Indicator;
use crate::settings::{GRACE_RANGE, parse_time};

pub const HELP: &str = "> next  < prev  0-7 select  led off|on|on2  sleep  bedtime HH:MM  grace N  brightness N  r refresh  q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ShiftRight,
    ShiftLeft,
    Select(usize),
    Led(Indicator),
    Sleep,
    Bedtime(NaiveTime),
    Grace(u32),
    Brightness(u8),
    Refresh,
    Help,
    Quit,
}

/// Parse one input line. `Err` carries a message for the status line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let cmd = match (head.to_lowercase().as_str(), arg) {
        (">" | "n" | "next", _) => Command::ShiftRight,
        ("<" | "p" | "prev", _) => Command::ShiftLeft,
        (d, None) if d.len() == 1 && d.as_bytes()[0].is_ascii_digit() => {
            let slot = (d.as_bytes()[0] - b'0') as usize;
            if slot > 7 {
                return Err(format!("no forecast slot {slot}"));
            }
            Command::Select(slot)
        }
        ("led", Some(a)) => match a.to_lowercase().as_str() {
            "off" => Command::Led(Indicator::Off),
            "on" => Command::Led(Indicator::On),
            "on2" => Command::Led(Indicator::OnAlternate),
            other => return Err(format!("unknown led state {other:?}")),
        },
        ("sleep", _) => Command::Sleep,
        ("bedtime", Some(a)) => Command::Bedtime(parse_time(a).ok_or_else(|| format!("bad time {a:?}"))?),
        ("grace", Some(a)) => match a.parse::<i64>() {
            Ok(g) if GRACE_RANGE.contains(&g) => Command::Grace(g as u32),
            _ => return Err(format!("grace must be 1..=60 minutes, got {a:?}")),
        },
        ("brightness", Some(a)) => {
            Command::Brightness(a.parse::<u8>().map_err(|_| format!("brightness must be 0..=255, got {a:?}"))?)
        }
        ("r" | "refresh", _) => Command::Refresh,
        ("?" | "h" | "help", _) => Command::Help,
        ("q" | "quit" | "exit", _) => Command::Quit,
        (other, _) => return Err(format!("unknown command {other:?}, ? for help")),
    };
    Ok(Some(cmd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation() {
        assert_eq!(parse(">"), Ok(Some(Command::ShiftRight)));
        assert_eq!(parse(" p "), Ok(Some(Command::ShiftLeft)));
        assert_eq!(parse("3"), Ok(Some(Command::Select(3))));
        assert!(parse("9").is_err());
        assert_eq!(parse(""), Ok(None));
    }

    #[test]
    fn test_led_and_sleep() {
        assert_eq!(parse("led on2"), Ok(Some(Command::Led(Indicator::OnAlternate))));
        assert_eq!(parse("LED OFF"), Ok(Some(Command::Led(Indicator::Off))));
        assert!(parse("led blink").is_err());
        assert_eq!(parse("sleep"), Ok(Some(Command::Sleep)));
    }

    #[test]
    fn test_settings_commands() {
        assert_eq!(parse("bedtime 21:45"), Ok(Some(Command::Bedtime(NaiveTime::from_hms_opt(21, 45, 0).unwrap()))));
        assert_eq!(parse("grace 15"), Ok(Some(Command::Grace(15))));
        assert!(parse("grace 0").is_err());
        assert!(parse("grace 61").is_err());
        assert_eq!(parse("brightness 255"), Ok(Some(Command::Brightness(255))));
        assert!(parse("brightness 256").is_err());
        assert!(parse("bedtime soon").is_err());
    }

    #[test]
    fn test_misc() {
        assert_eq!(parse("q"), Ok(Some(Command::Quit)));
        assert_eq!(parse("?"), Ok(Some(Command::Help)));
        assert_eq!(parse("r"), Ok(Some(Command::Refresh)));
        assert!(parse("dance").is_err());
        // missing argument
        assert!(parse("led").is_err());
    }
}
