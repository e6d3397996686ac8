/*
 *  shell.rs
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

//! The display shell owns every data source and the screen.
//!
//! One `tokio::select!` loop drives it: a one second clock tick (digital and
//! analog clock, bedtime, sensor poll), a one second weather tick with its own
//! long countdown, hour scale tide and moon intervals, keyboard lines and the
//! shutdown signals. After every event the watch channels are folded into
//! [`AppState`] and the frame is redrawn if it changed.

use chrono::{Local, NaiveDateTime};
use image::imageops::{self, FilterType};
use log::{debug, info, warn};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

use crate::bedtime::{BedtimeAction, BedtimeMonitor, Indicator};
use crate::config::Config;
use crate::household::Household;
use crate::icons::{self, IconSet};
use crate::input::{self, Command, HELP};
use crate::moon::{FrameSource, MoonClient, MoonFrame};
use crate::render::{self, Frame, FrameSink, Layout, Theme};
use crate::sensor::{SensorBridge, SensorSnapshot, SensorTransport};
use crate::settings::Settings;
use crate::state::{AppState, MoonView};
use crate::tides::{TideClient, TideReport, TideSource};
use crate::weather::{Forecast, ForecastSource, WeatherClient};

/// Waits for SIGINT, SIGTERM or SIGHUP.
pub async fn shutdown_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received. Initiating graceful shutdown."),
        _ = sigterm.recv() => info!("SIGTERM received. Initiating graceful shutdown."),
        _ = sighup.recv() => info!("SIGHUP received. Initiating graceful shutdown."),
    }
    Ok(())
}

pub struct DisplayShell<T, F, D, H>
where
    T: SensorTransport,
    F: ForecastSource,
    D: TideSource,
    H: Household,
{
    sensor: Option<SensorBridge<T>>,
    weather: WeatherClient<F>,
    tides: TideClient<D>,
    moon: Option<MoonClient>,
    household: H,
    icons: IconSet,
    bedtime: BedtimeMonitor,
    state: AppState,
    theme: Theme,
    layout: Layout,
    moon_preview: u32,
    tide_every: Duration,
    moon_every: Duration,
    sensor_rx: Option<watch::Receiver<SensorSnapshot>>,
    weather_rx: watch::Receiver<Option<Forecast>>,
    tide_rx: watch::Receiver<TideReport>,
    moon_rx: Option<watch::Receiver<Option<MoonFrame>>>,
}

impl<T, F, D, H> DisplayShell<T, F, D, H>
where
    T: SensorTransport,
    F: ForecastSource,
    D: TideSource,
    H: Household,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: &Config,
        settings: Settings,
        theme: Theme,
        sensor: Option<SensorBridge<T>>,
        weather: WeatherClient<F>,
        tides: TideClient<D>,
        moon: Option<MoonClient>,
        household: H,
    ) -> Self {
        let state = AppState { settings, sensor_enabled: sensor.is_some(), ..AppState::default() };
        Self {
            sensor_rx: sensor.as_ref().map(SensorBridge::subscribe),
            weather_rx: weather.subscribe(),
            tide_rx: tides.subscribe(),
            moon_rx: moon.as_ref().map(MoonClient::subscribe),
            sensor,
            weather,
            tides,
            moon,
            household,
            icons: IconSet::new(&cfg.weather.icon_dir, cfg.display.icon_size),
            bedtime: BedtimeMonitor::new(settings.window()),
            state,
            theme,
            layout: Layout {
                frameless: cfg.display.frameless,
                clock_size: cfg.display.clock_size,
            },
            moon_preview: cfg.display.moon_preview,
            tide_every: Duration::from_secs(cfg.tides.interval_secs.max(1)),
            moon_every: Duration::from_secs(cfg.moon.interval_secs.max(1)),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn household(&self) -> &H {
        &self.household
    }

    pub fn frame(&self) -> Frame {
        render::project(&self.state, &self.theme, &self.layout)
    }

    /// Apply the startup brightness.
    pub async fn start(&mut self) {
        self.household.set_brightness(self.state.settings.brightness).await;
    }

    async fn set_indicator(&mut self, state: Indicator) {
        self.state.indicator = state;
        self.household.set_indicator(state).await;
    }

    /// Clock tick: bedtime first, then the sensor poll.
    pub async fn on_clock_tick(&mut self, now: NaiveDateTime) {
        self.state.now = now;
        let status = self.bedtime.tick(now, self.state.indicator);
        for action in &status.actions {
            match action {
                BedtimeAction::ReadyForBed => {
                    info!("bedtime, setting the ready for bed pattern");
                    self.set_indicator(Indicator::ReadyForBed).await;
                }
                BedtimeAction::LightsOut => {
                    info!("lights out");
                    self.set_indicator(Indicator::Off).await;
                    self.household.display_off().await;
                }
            }
        }
        self.state.bedtime = status;

        if let Some(sensor) = self.sensor.as_mut() {
            sensor.tick().await;
        }
    }

    pub async fn on_weather_tick(&mut self) {
        self.weather.tick().await;
    }

    pub async fn refresh_tides(&mut self, now: NaiveDateTime) {
        self.tides.refresh(now).await;
    }

    pub async fn refresh_moon(&mut self) {
        if let Some(moon) = self.moon.as_ref() {
            moon.refresh().await;
        }
    }

    /// Keyboard line. Bad input lands on the status line.
    pub async fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
        match input::parse(line) {
            Ok(Some(cmd)) => self.handle(cmd).await,
            Ok(None) => ControlFlow::Continue(()),
            Err(msg) => {
                self.state.message = Some(msg);
                ControlFlow::Continue(())
            }
        }
    }

    pub async fn handle(&mut self, cmd: Command) -> ControlFlow<()> {
        debug!("command {cmd:?}");
        self.state.message = None;
        let len = self.state.period_count();
        match cmd {
            Command::ShiftRight => {
                self.state.pager.shift_right(len);
            }
            Command::ShiftLeft => {
                self.state.pager.shift_left();
            }
            Command::Select(slot) => {
                if !self.state.pager.select_visible(slot, len) {
                    self.state.message = Some(format!("no forecast period in slot {slot}"));
                }
            }
            Command::Led(state) => self.set_indicator(state).await,
            Command::Sleep => {
                self.set_indicator(Indicator::Off).await;
                self.household.display_off().await;
            }
            Command::Bedtime(t) => {
                self.state.settings.bedtime = t;
                self.bedtime.set_window(self.state.settings.window());
            }
            Command::Grace(minutes) => {
                self.state.settings.grace_minutes = minutes;
                self.bedtime.set_window(self.state.settings.window());
            }
            Command::Brightness(level) => {
                self.state.settings.brightness = level;
                self.household.set_brightness(level).await;
            }
            Command::Refresh => {
                info!("manual refresh");
                self.weather.refresh().await;
                self.refresh_tides(self.state.now).await;
                self.refresh_moon().await;
            }
            Command::Help => self.state.message = Some(HELP.to_string()),
            Command::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn moon_view(&self, frame: &MoonFrame) -> MoonView {
        let side = self.moon_preview.max(1);
        MoonView {
            index: frame.index,
            from_cache: frame.source == FrameSource::Cache,
            preview: imageops::resize(&frame.image, side, side, FilterType::Triangle),
        }
    }

    /// Fold whatever the sources published into the state.
    pub fn sync(&mut self) {
        if let Some(rx) = self.sensor_rx.as_mut() {
            if rx.has_changed().unwrap_or(false) {
                self.state.sensor = rx.borrow_and_update().clone();
            }
        }
        if self.weather_rx.has_changed().unwrap_or(false) {
            let forecast = self.weather_rx.borrow_and_update().clone();
            self.state.set_forecast(forecast);
        }
        if self.tide_rx.has_changed().unwrap_or(false) {
            self.state.tides = self.tide_rx.borrow_and_update().clone();
        }
        let moon = match self.moon_rx.as_mut() {
            Some(rx) if rx.has_changed().unwrap_or(false) => rx.borrow_and_update().clone(),
            _ => None,
        };
        if let Some(frame) = moon {
            self.state.moon = Some(self.moon_view(&frame));
        }
        self.sync_icon();
    }

    /// Current conditions icon (first period), rasterized once per asset.
    /// The selected period shows its condition as text only.
    fn sync_icon(&mut self) {
        let Some(period) = self.state.forecast.as_ref().and_then(|f| f.periods.first()) else {
            self.state.icon = None;
            return;
        };
        let info = icons::resolve(period.icon.as_deref());
        if self.state.icon.as_ref().is_some_and(|(shown, _)| *shown == info) {
            return;
        }
        let raster = self.icons.get(info).cloned();
        self.state.icon = Some((info, raster));
    }

    /// Fetch everything once and draw one frame.
    pub async fn run_once<S: FrameSink>(&mut self, sink: &mut S) -> std::io::Result<()> {
        let now = Local::now().naive_local();
        self.on_clock_tick(now).await;
        self.weather.refresh().await;
        self.refresh_tides(now).await;
        self.refresh_moon().await;
        self.sync();
        sink.draw(&self.frame())
    }

    pub async fn run<S, R>(&mut self, sink: &mut S, input: R) -> std::io::Result<()>
    where
        S: FrameSink,
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;

        let mut clock = interval(Duration::from_secs(1));
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut weather = interval(Duration::from_secs(1));
        weather.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tides = interval(self.tide_every);
        tides.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut moon = interval(self.moon_every);
        moon.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let has_moon = self.moon.is_some();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let mut shown: Option<Frame> = None;
        loop {
            tokio::select! {
                res = &mut shutdown => {
                    if let Err(e) = res {
                        warn!("signal handler failed: {e}");
                    }
                    break;
                }
                _ = clock.tick() => self.on_clock_tick(Local::now().naive_local()).await,
                _ = weather.tick() => self.on_weather_tick().await,
                _ = tides.tick() => self.refresh_tides(Local::now().naive_local()).await,
                _ = moon.tick(), if has_moon => self.refresh_moon().await,
                line = lines.next_line(), if input_open => match line {
                    Ok(Some(l)) => {
                        if self.handle_line(&l).await.is_break() {
                            info!("quit requested");
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("keyboard input closed");
                        input_open = false;
                    }
                    Err(e) => {
                        warn!("keyboard input failed: {e}");
                        input_open = false;
                    }
                },
            }

            self.sync();
            let frame = self.frame();
            if shown.as_ref() != Some(&frame) {
                sink.draw(&frame)?;
                shown = Some(frame);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::tests::Recorder;
    use crate::sensor::{BridgeTiming, SensorError};
    use crate::tides::{TideError, TideEvent, parse_predictions};
    use crate::weather::{WeatherError, WeatherTiming, parse_forecast};
    use chrono::{NaiveDate, NaiveTime};
    use std::future::Future;

    struct Bridge;

    impl SensorTransport for Bridge {
        fn request(&mut self, _req: &[u8]) -> impl Future<Output = Result<Vec<u8>, SensorError>> + Send {
            async { Ok(b"[i,20.0,1000.0,50.0,o,5.0,1001.0,60.0,c,40.0,18.0]".to_vec()) }
        }
    }

    struct Sky;

    impl ForecastSource for Sky {
        async fn fetch(&self) -> Result<Forecast, WeatherError> {
            let periods: Vec<String> = (0..10)
                .map(|i| {
                    let code = if i % 2 == 0 { "skc" } else { "rain" };
                    format!(
                        r#"{{"number":{i},"name":"P{i}","temperature":{i},"temperatureUnit":"C","icon":"https://api.weather.gov/icons/land/day/{code}?size=medium"}}"#
                    )
                })
                .collect();
            parse_forecast(&format!(r#"{{"properties":{{"periods":[{}]}}}}"#, periods.join(",")))
        }
    }

    struct Sea;

    impl TideSource for Sea {
        async fn predictions(&self, _b: NaiveDateTime, _e: NaiveDateTime) -> Result<Vec<TideEvent>, TideError> {
            parse_predictions(r#"{"predictions":[{"t":"2025-06-15 04:12","v":"2.9","type":"H"}]}"#)
        }
    }

    #[derive(Default)]
    struct Sink(Vec<Frame>);

    impl FrameSink for Sink {
        fn draw(&mut self, frame: &Frame) -> std::io::Result<()> {
            self.0.push(frame.clone());
            Ok(())
        }
    }

    fn shell(sensor: bool) -> DisplayShell<Bridge, Sky, Sea, Recorder> {
        let mut cfg = Config::default();
        cfg.weather.icon_dir = "/nonexistent/icons".into();
        cfg.display.clock_size = 20;
        DisplayShell::new(
            &cfg,
            Settings::default(),
            Theme::default(),
            sensor.then(|| SensorBridge::new(Bridge, BridgeTiming { poll_window: Duration::from_millis(200), ..BridgeTiming::default() })),
            WeatherClient::new(Sky, WeatherTiming::default()),
            TideClient::new(Sea),
            None,
            Recorder::default(),
        )
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[tokio::test]
    async fn test_bedtime_sequence() {
        let mut sh = shell(false);
        sh.handle(Command::Led(Indicator::On)).await;
        let mut now = at(20, 14, 58);
        while now < at(20, 25, 2) {
            sh.on_clock_tick(now).await;
            now += chrono::Duration::seconds(1);
        }
        assert_eq!(sh.household().calls, ["led 1", "led 3", "led 0", "display off"]);
        assert_eq!(sh.state().indicator, Indicator::Off);
        assert!(!sh.state().bedtime.highlighted);
    }

    #[tokio::test]
    async fn test_no_ready_for_bed_when_led_off() {
        let mut sh = shell(false);
        sh.on_clock_tick(at(20, 14, 59)).await;
        sh.on_clock_tick(at(20, 15, 0)).await;
        assert!(sh.state().bedtime.highlighted);
        assert!(sh.household().calls.is_empty());
    }

    #[tokio::test]
    async fn test_commands() {
        let mut sh = shell(false);
        assert!(sh.handle_line("brightness 90").await.is_continue());
        assert!(sh.handle_line("sleep").await.is_continue());
        assert_eq!(sh.household().calls, ["brightness 90", "led 0", "display off"]);

        sh.handle_line("bedtime 21:00").await;
        sh.handle_line("grace 5").await;
        assert_eq!(sh.state().settings.bedtime, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert_eq!(sh.state().settings.grace_minutes, 5);

        sh.handle_line("wobble").await;
        assert!(sh.state().message.as_deref().unwrap().contains("unknown command"));
        assert!(sh.handle_line("q").await.is_break());
    }

    #[tokio::test]
    async fn test_refresh_and_paging() {
        let mut sh = shell(false);
        sh.handle(Command::Refresh).await;
        sh.sync();
        assert_eq!(sh.state().period_count(), 10);
        assert_eq!(sh.state().tides.events.len(), 1);
        // no icon files, still an entry with the description
        let (info, raster) = sh.state().icon.clone().unwrap();
        assert_eq!(info.asset, "sunny.svg");
        assert!(raster.is_none());

        sh.handle(Command::ShiftRight).await;
        sh.handle(Command::ShiftRight).await;
        sh.handle(Command::ShiftRight).await;
        assert_eq!(sh.state().pager.offset(), 2);
        sh.handle(Command::Select(7)).await;
        assert_eq!(sh.state().selected_period().unwrap().name, "P9");
        assert!(sh.frame().text().contains(">7 P9"));
    }

    #[tokio::test]
    async fn test_icon_stays_on_current_conditions() {
        let mut sh = shell(false);
        sh.handle(Command::Refresh).await;
        sh.sync();
        assert_eq!(sh.state().icon.as_ref().unwrap().0.asset, "sunny.svg");

        sh.handle(Command::Select(1)).await;
        sh.sync();
        assert_eq!(sh.state().selected_period().unwrap().name, "P1");
        assert_eq!(sh.state().icon.as_ref().unwrap().0.asset, "sunny.svg");
        // the selected period's condition is still shown as text
        assert!(sh.frame().text().contains("Rain"));
    }

    #[tokio::test]
    async fn test_sensor_flows_into_state() {
        let mut sh = shell(true);
        assert!(sh.state().sensor_enabled);
        sh.on_clock_tick(at(12, 0, 0)).await;
        sh.sync();
        assert!(sh.state().sensor.valid);
        assert_eq!(sh.state().sensor.reading.outside_temp(), Some(5.0));
    }

    #[tokio::test]
    async fn test_run_once_draws() {
        let mut sh = shell(false);
        let mut sink = Sink::default();
        sh.run_once(&mut sink).await.unwrap();
        assert_eq!(sink.0.len(), 1);
        assert!(sink.0[0].text().contains("P0"));
    }

    #[tokio::test]
    async fn test_run_quits_on_q() {
        let mut sh = shell(false);
        let mut sink = Sink::default();
        let input: &[u8] = b">\nq\n";
        sh.run(&mut sink, input).await.unwrap();
        assert!(!sink.0.is_empty());
    }

    #[tokio::test]
    async fn test_start_sets_brightness() {
        let mut sh = shell(false);
        sh.start().await;
        assert_eq!(sh.household().calls, ["brightness 150"]);
    }
}
