/*
 *  render.rs
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

//! Screen layout.
//!
//! [`project`] turns the application state into a [`Frame`]: a column of
//! raster panels (analog dial, forecast icon, moon) and a column of colored
//! text lines. [`ConsoleSink`] puts a frame on a true-color terminal using
//! half-block cells, two pixels per character.

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line as EgLine, PrimitiveStyle, Triangle};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io::{self, Write};
use std::path::Path;

use crate::analog::{self, HandKind};
use crate::canvas::Canvas;
use crate::color::{Profile, color_for, to_hex};
use crate::config::ConfigError;
use crate::icons;
use crate::pager::ForecastPager;
use crate::sensor::SensorReading;
use crate::state::AppState;
use crate::tides::{ERROR_TEXT, TideKind};
use crate::weather::forecast_time_line;

const DETAIL_WIDTH: usize = 64;

/// `#rrggbb` in theme files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub Rgb888);

impl HexColor {
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        Some(HexColor(Rgb888::new((v >> 16) as u8, (v >> 8) as u8, v as u8)))
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&to_hex(self.0))
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        HexColor::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("expected #rrggbb, got {s:?}")))
    }
}

/// Console colors, loaded from the `--style` YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub background: HexColor,
    pub text: HexColor,
    pub label: HexColor,
    pub rule: HexColor,
    pub high: HexColor,
    pub low: HexColor,
    pub bedtime: HexColor,
    pub selected: HexColor,
    pub dial: HexColor,
    pub hour_hand: HexColor,
    pub minute_hand: HexColor,
    pub second_hand: HexColor,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: HexColor(Rgb888::BLACK),
            text: HexColor(Rgb888::new(220, 220, 220)),
            label: HexColor(Rgb888::new(0x00, 0x55, 0x55)),
            rule: HexColor(Rgb888::new(60, 60, 60)),
            high: HexColor(Rgb888::new(0xAA, 0x55, 0x00)),
            low: HexColor(Rgb888::new(0x00, 0x55, 0xAA)),
            bedtime: HexColor(Rgb888::new(200, 100, 0)),
            selected: HexColor(Rgb888::new(255, 255, 255)),
            dial: HexColor(Rgb888::new(160, 160, 160)),
            hour_hand: HexColor(Rgb888::new(200, 0, 200)),
            minute_hand: HexColor(Rgb888::new(0, 200, 200)),
            second_hand: HexColor(Rgb888::new(200, 200, 200)),
        }
    }
}

impl Theme {
    pub fn load(path: Option<&Path>) -> Result<Theme, ConfigError> {
        match path {
            Some(p) => Ok(serde_yaml::from_str(&std::fs::read_to_string(p)?)?),
            None => Ok(Theme::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub frameless: bool,
    pub clock_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub fg: Option<Rgb888>,
    pub bold: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), fg: None, bold: false }
    }

    pub fn colored(text: impl Into<String>, fg: Rgb888) -> Self {
        Self { text: text.into(), fg: Some(fg), bold: false }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

pub type Line = Vec<Span>;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub panels: Vec<Canvas>,
    pub lines: Vec<Line>,
}

impl Frame {
    /// Text only, for logs and tests.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.iter().map(|s| s.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn mix(top: Rgb888, bottom: Rgb888, alpha: u8) -> Rgb888 {
    let a = alpha as u16;
    let m = |t: u8, b: u8| ((t as u16 * a + b as u16 * (255 - a)) / 255) as u8;
    Rgb888::new(m(top.r(), bottom.r()), m(top.g(), bottom.g()), m(top.b(), bottom.b()))
}

/// Analog dial for `state.now` on a `side` pixel square.
pub fn draw_dial(time: chrono::NaiveTime, side: u32, theme: &Theme) -> Canvas {
    let bg = theme.background.0;
    let mut canvas = Canvas::new(side, side, bg);
    let px = |p| {
        let (x, y) = analog::to_pixels(p, side);
        Point::new(x, y)
    };

    for tick in analog::ticks() {
        let c = if tick.major { theme.dial.0 } else { mix(theme.dial.0, bg, 128) };
        // infallible target
        let _ = EgLine::new(px(tick.from), px(tick.to))
            .into_styled(PrimitiveStyle::with_stroke(c, 1))
            .draw(&mut canvas);
    }

    for hand in analog::hands(time) {
        let c = match hand.kind {
            HandKind::Hour => theme.hour_hand.0,
            HandKind::Minute => mix(theme.minute_hand.0, bg, 191),
            HandKind::Second => mix(theme.second_hand.0, bg, 100),
        };
        let [a, b, tip] = hand.polygon;
        let _ = Triangle::new(px(a), px(b), px(tip))
            .into_styled(PrimitiveStyle::with_fill(c))
            .draw(&mut canvas);
    }
    canvas
}

fn temp_humidity(t: Option<f64>, h: Option<f64>) -> String {
    let t = t.map_or_else(|| "--.--".to_string(), |v| format!("{v:5.2}"));
    let h = h.map_or_else(|| " --.-".to_string(), |v| format!("{v:5.1}"));
    format!("{t} C  {h} %")
}

fn pressure(p: Option<f64>) -> String {
    p.map_or_else(|| "   --.-- mbar".to_string(), |v| format!("{v:7.2} mbar"))
}

fn sensor_lines(r: &SensorReading, valid: bool, theme: &Theme) -> Vec<Line> {
    let temp_line = |label: &str, t: Option<f64>, h: Option<f64>, profile: Profile| {
        let c = color_for(profile, t.unwrap_or(0.0), valid && t.is_some());
        vec![Span::colored(format!("{label:<10}"), theme.label.0), Span::colored(temp_humidity(t, h), c)]
    };
    let press_line = |label: &str, p: Option<f64>| {
        let c = color_for(Profile::Pressure, p.unwrap_or(0.0), valid && p.is_some());
        vec![Span::colored(format!("{label:<10}"), theme.label.0), Span::colored(pressure(p), c)]
    };
    vec![
        temp_line("Inside", r.inside_temp(), r.inside_humidity(), Profile::Inside),
        temp_line("Outside", r.outside_temp(), r.outside_humidity(), Profile::Outside),
        temp_line("Closet", r.closet_temp(), r.closet_humidity(), Profile::Inside),
        press_line("Pressure", r.inside_pressure()),
        press_line("Outside", r.outside_pressure()),
    ]
}

/// Greedy word wrap.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for para in text.lines() {
        let mut line = String::new();
        for word in para.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > width {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        out.push(line);
    }
    out
}

fn forecast_lines(state: &AppState, theme: &Theme) -> Vec<Line> {
    let mut lines = vec![vec![Span::colored(forecast_time_line(state.forecast.as_ref()), theme.label.0)]];
    let Some(forecast) = state.forecast.as_ref() else {
        return lines;
    };

    let len = forecast.periods.len();
    let pager = state.pager;
    for i in pager.visible(len) {
        let p = &forecast.periods[i];
        let selected = i == pager.selected();
        let marker = if selected { ">" } else { " " };
        let temp_c = p.temp_c();
        let name_color = if selected { theme.selected.0 } else { theme.text.0 };
        let mut name = Span::colored(format!("{marker}{} {:<18}", i - pager.offset(), p.label()), name_color);
        if selected {
            name = name.bold();
        }
        lines.push(vec![
            name,
            Span::colored(p.temp_text(), color_for(Profile::Outside, temp_c.unwrap_or(0.0), temp_c.is_some())),
            Span::colored(format!("  {}", icons::resolve(p.icon.as_deref()).description), theme.text.0),
        ]);
    }

    let more_left = if pager.offset() > 0 { "< more" } else { "      " };
    let more_right = if pager.offset() < ForecastPager::max_offset(len) { "more >" } else { "" };
    lines.push(vec![Span::colored(format!("{more_left}   {more_right}"), theme.rule.0)]);

    if let Some(p) = state.selected_period() {
        for l in wrap(&p.detail_text(), DETAIL_WIDTH) {
            lines.push(vec![Span::colored(l, theme.text.0)]);
        }
    }
    lines
}

fn tide_lines(state: &AppState, theme: &Theme) -> Vec<Line> {
    let t = &state.tides;
    if t.error {
        return vec![vec![Span::colored(ERROR_TEXT, theme.high.0)]];
    }
    if t.fetched.is_none() {
        return vec![vec![Span::colored("Tides pending", theme.rule.0)]];
    }
    t.events
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .flat_map(|ev| {
                    let c = match ev.kind {
                        TideKind::High => theme.high.0,
                        TideKind::Low => theme.low.0,
                    };
                    [Span::colored(format!("{}:", ev.kind.label()), c), Span::plain(format!(" {}   ", ev.time.format("%H:%M")))]
                })
                .collect::<Line>()
        })
        .collect()
}

fn rule(title: &str, theme: &Theme) -> Line {
    vec![Span::colored(format!("── {title} {}", "─".repeat(40usize.saturating_sub(title.len()))), theme.rule.0)]
}

/// Pure projection of the state onto a frame.
pub fn project(state: &AppState, theme: &Theme, layout: &Layout) -> Frame {
    let mut panels = vec![draw_dial(state.now.time(), layout.clock_size, theme)];
    if let Some((_, Some(icon))) = state.icon.as_ref() {
        let mut c = Canvas::new(icon.width, icon.height, theme.background.0);
        c.blit_rgba(Point::zero(), icon.width, icon.height, &icon.rgba);
        panels.push(c);
    }
    if let Some(moon) = state.moon.as_ref() {
        let (w, h) = moon.preview.dimensions();
        let mut c = Canvas::new(w, h, theme.background.0);
        c.blit_rgba(Point::zero(), w, h, moon.preview.as_raw());
        panels.push(c);
    }

    let mut lines: Vec<Line> = Vec::new();
    let section = |lines: &mut Vec<Line>, title: &str| {
        if !layout.frameless {
            lines.push(rule(title, theme));
        }
    };

    if !layout.frameless {
        lines.push(vec![Span::colored("KioskClock", theme.label.0).bold()]);
    }

    let clock = state.now.format("%a %b %d %H:%M:%S").to_string();
    lines.push(if state.bedtime.highlighted {
        vec![Span::colored(format!("{clock} Bedtime"), theme.bedtime.0).bold()]
    } else {
        vec![Span::colored(clock, theme.text.0).bold()]
    });

    section(&mut lines, "Sensors");
    if state.sensor_enabled {
        lines.extend(sensor_lines(&state.sensor.reading, state.sensor.valid, theme));
    } else {
        lines.push(vec![Span::colored("Sensors disabled", theme.rule.0)]);
    }

    section(&mut lines, "Forecast");
    lines.extend(forecast_lines(state, theme));

    section(&mut lines, "Tides");
    lines.extend(tide_lines(state, theme));

    section(&mut lines, "Moon");
    lines.push(vec![Span::colored(
        match state.moon.as_ref() {
            Some(m) => format!("frame {:04} ({})", m.index, if m.from_cache { "cache" } else { "web" }),
            None => "no frame yet".to_string(),
        },
        theme.text.0,
    )]);

    section(&mut lines, "Household");
    let s = &state.settings;
    lines.push(vec![Span::colored(
        format!(
            "{}  brightness {}  bedtime {} +{} min",
            state.indicator.label(),
            s.brightness,
            s.bedtime.format("%H:%M"),
            s.grace_minutes
        ),
        theme.text.0,
    )]);
    if let Some(msg) = state.message.as_ref() {
        lines.push(vec![Span::colored(msg.clone(), theme.label.0)]);
    }

    Frame { panels, lines }
}

/// Anything that can show a frame.
pub trait FrameSink {
    fn draw(&mut self, frame: &Frame) -> io::Result<()>;
}

fn term(c: Rgb888) -> Color {
    Color::Rgb { r: c.r(), g: c.g(), b: c.b() }
}

/// True-color terminal output.
pub struct ConsoleSink<W: Write> {
    out: W,
    fullscreen: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(fullscreen: bool) -> Self {
        Self { out: io::stdout(), fullscreen }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, fullscreen: bool) -> Self {
        Self { out, fullscreen }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn enter(&mut self) -> io::Result<()> {
        if self.fullscreen {
            execute!(self.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        }
        Ok(())
    }

    pub fn leave(&mut self) -> io::Result<()> {
        if self.fullscreen {
            execute!(self.out, ResetColor, Show, LeaveAlternateScreen)?;
        }
        Ok(())
    }
}

impl<W: Write> FrameSink for ConsoleSink<W> {
    fn draw(&mut self, frame: &Frame) -> io::Result<()> {
        let panel_width = frame.panels.iter().map(Canvas::width).max().unwrap_or(0);
        let mut cells: Vec<Vec<(Rgb888, Rgb888)>> = Vec::new();
        for (n, panel) in frame.panels.iter().enumerate() {
            if n > 0 {
                cells.push(Vec::new());
            }
            cells.extend(panel.half_block_rows());
        }

        let rows = cells.len().max(frame.lines.len());
        for row in 0..rows {
            if self.fullscreen {
                queue!(self.out, MoveTo(0, row as u16))?;
            }
            let cell_row = cells.get(row).map(Vec::as_slice).unwrap_or(&[]);
            for &(top, bottom) in cell_row {
                queue!(self.out, SetForegroundColor(term(top)), SetBackgroundColor(term(bottom)), Print('▀'))?;
            }
            queue!(self.out, ResetColor, Print(" ".repeat(panel_width - cell_row.len() + 2)))?;

            if let Some(line) = frame.lines.get(row) {
                for span in line {
                    if let Some(fg) = span.fg {
                        queue!(self.out, SetForegroundColor(term(fg)))?;
                    }
                    if span.bold {
                        queue!(self.out, SetAttribute(Attribute::Bold))?;
                    }
                    queue!(self.out, Print(&span.text), SetAttribute(Attribute::Reset), ResetColor)?;
                }
            }
            if self.fullscreen {
                queue!(self.out, Clear(ClearType::UntilNewLine))?;
            } else {
                queue!(self.out, Print("\n"))?;
            }
        }
        if self.fullscreen {
            queue!(self.out, Clear(ClearType::FromCursorDown))?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bedtime::BedtimeStatus;
    use crate::sensor::{SensorSnapshot, parse_payload};
    use crate::tides::{TideReport, parse_predictions};
    use crate::weather::parse_forecast;
    use chrono::NaiveDate;

    fn layout() -> Layout {
        Layout { frameless: false, clock_size: 20 }
    }

    fn state() -> AppState {
        let mut s = AppState {
            now: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap().and_hms_opt(20, 16, 3).unwrap(),
            sensor_enabled: true,
            ..AppState::default()
        };
        s.sensor = SensorSnapshot {
            reading: parse_payload(b"[i,21.5,1013.2,40.0,o,-3.25,1012.8,81.0,c,55.5,19.0]"),
            valid: true,
            updated: None,
        };
        s
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(HexColor::parse("#AA5500"), Some(HexColor(Rgb888::new(0xAA, 0x55, 0))));
        assert_eq!(HexColor::parse("AA5500"), None);
        assert_eq!(HexColor::parse("#12345"), None);
        let t: Theme = serde_yaml::from_str("high: \"#ff0000\"\n").unwrap();
        assert_eq!(t.high.0, Rgb888::RED);
        assert_eq!(t.low, Theme::default().low);
        assert!(serde_yaml::from_str::<Theme>("high: red\n").is_err());
    }

    #[test]
    fn test_digital_clock_and_bedtime() {
        let mut s = state();
        let f = project(&s, &Theme::default(), &layout());
        assert!(f.text().contains("Sun Jun 15 20:16:03"));
        assert!(!f.text().contains("Bedtime\n"));

        s.bedtime = BedtimeStatus { highlighted: true, actions: Vec::new() };
        let f = project(&s, &Theme::default(), &layout());
        let clock = f.lines.iter().flatten().find(|sp| sp.text.starts_with("Sun Jun 15")).unwrap();
        assert_eq!(clock.text, "Sun Jun 15 20:16:03 Bedtime");
        assert_eq!(clock.fg, Some(Rgb888::new(200, 100, 0)));
    }

    #[test]
    fn test_sensor_lines() {
        let f = project(&state(), &Theme::default(), &layout());
        let text = f.text();
        assert!(text.contains("21.50 C   40.0 %"));
        assert!(text.contains("-3.25 C   81.0 %"));
        assert!(text.contains("1013.20 mbar"));
        assert!(text.contains("19.00 C   55.5 %"));
    }

    #[test]
    fn test_invalid_sensor_is_gray() {
        let mut s = state();
        s.sensor.valid = false;
        let f = project(&s, &Theme::default(), &layout());
        let span = f.lines.iter().flatten().find(|sp| sp.text.contains("21.50")).unwrap();
        assert_eq!(span.fg, Some(crate::color::INVALID));
    }

    #[test]
    fn test_forecast_and_tides() {
        let mut s = state();
        let body = r#"{"properties":{"updateTime":"2025-06-15T09:41:22+00:00","periods":[
            {"name":"Tonight","temperature":12,"temperatureUnit":"C","shortForecast":"Clear",
             "detailedForecast":"Clear, with a low around 12.",
             "icon":"https://api.weather.gov/icons/land/night/skc?size=medium"}]}}"#;
        s.set_forecast(Some(parse_forecast(body).unwrap()));
        s.tides = TideReport::from_events(
            parse_predictions(r#"{"predictions":[{"t":"2025-06-15 04:12","v":"2.9","type":"H"},{"t":"2025-06-15 10:20","v":"0.1","type":"L"}]}"#).unwrap(),
        );
        let f = project(&s, &Theme::default(), &layout());
        let text = f.text();
        assert!(text.contains(">0 Tonight"));
        assert!(text.contains("Fair/clear"));
        assert!(text.contains("Tonight: Clear"));
        assert!(text.contains("High: 04:12"));
        assert!(text.contains("Low: 10:20"));

        s.tides = TideReport::failed();
        assert!(project(&s, &Theme::default(), &layout()).text().contains(ERROR_TEXT));
    }

    #[test]
    fn test_frameless_drops_rules() {
        let framed = project(&state(), &Theme::default(), &layout());
        let bare = project(&state(), &Theme::default(), &Layout { frameless: true, ..layout() });
        assert!(framed.text().contains("── Tides"));
        assert!(!bare.text().contains("──"));
        assert!(bare.lines.len() < framed.lines.len());
    }

    #[test]
    fn test_dial_has_hands() {
        let theme = Theme::default();
        let c = draw_dial(chrono::NaiveTime::from_hms_opt(3, 0, 0).unwrap(), 40, &theme);
        // hour hand points right from the center
        assert_eq!(c.pixel(23, 20), Some(theme.hour_hand.0));
        assert_eq!(c.pixel(0, 0), Some(theme.background.0));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
    }

    #[test]
    fn test_console_sink_output() {
        let frame = project(&state(), &Theme::default(), &layout());
        let mut sink = ConsoleSink::new(Vec::new(), false);
        sink.draw(&frame).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("KioskClock"));
        assert!(out.contains('▀'));
        assert!(out.lines().count() >= frame.lines.len());
    }
}
