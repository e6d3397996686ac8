/*
 *  main.rs
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

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use std::time::Duration;
use tokio::io::BufReader;

use kioskclock::config::{self, Cli};
use kioskclock::household::CommandHousehold;
use kioskclock::moon::MoonClient;
use kioskclock::render::{ConsoleSink, Theme};
use kioskclock::sensor::{BridgeTiming, SensorBridge, ZmqTransport};
use kioskclock::settings;
use kioskclock::shell::DisplayShell;
use kioskclock::tides::{NoaaTides, TideClient};
use kioskclock::weather::{WeatherClient, WeatherGov, WeatherTiming};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

fn log_level(debug: u8, configured: Option<&str>) -> &str {
    match debug {
        0 => configured.unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = config::load(&cli);

    let configured = loaded.as_ref().ok().and_then(|c| c.log_level.clone());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level(cli.debug, configured.as_deref())))
        .format_timestamp_secs()
        .init();

    let cfg = loaded.context("loading configuration")?;
    if cli.dump_config {
        print!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    info!("This is {}, tides, weather & time", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let settings = settings::load(cli.settings.as_deref());
    let theme = Theme::load(cfg.display.style.as_deref()).context("loading style")?;

    let sensor: Option<SensorBridge<ZmqTransport>> = if cfg.sensor.enabled {
        info!("sensor bridge at {}", cfg.sensor.endpoint);
        Some(SensorBridge::new(
            ZmqTransport::new(cfg.sensor.endpoint.clone()),
            BridgeTiming {
                interval: cfg.sensor.interval_ticks,
                poll_window: Duration::from_millis(cfg.sensor.poll_ms),
                stuck_after: cfg.sensor.stuck_ticks,
            },
        ))
    } else {
        warn!("sensor bridge disabled");
        None
    };

    let weather = WeatherClient::new(
        WeatherGov::new(&cfg.weather).context("weather client")?,
        WeatherTiming {
            initial: cfg.weather.initial_ticks,
            interval: cfg.weather.interval_ticks,
            retry: cfg.weather.retry_ticks,
        },
    );
    let tides = TideClient::new(NoaaTides::new(&cfg.tides).context("tide client")?);
    let moon = MoonClient::new(&cfg.moon).context("moon client")?;
    let household = CommandHousehold::new(cfg.household.clone());

    let mut shell = DisplayShell::new(&cfg, settings, theme, sensor, weather, tides, Some(moon), household);
    shell.start().await;

    if cli.once {
        let mut sink = ConsoleSink::stdout(false);
        shell.run_once(&mut sink).await.context("drawing")?;
        return Ok(());
    }

    let mut sink = ConsoleSink::stdout(true);
    sink.enter()?;
    let result = shell.run(&mut sink, BufReader::new(tokio::io::stdin())).await;
    sink.leave()?;
    result.context("display loop")?;

    info!("{} stopped", env!("CARGO_PKG_NAME"));
    Ok(())
}
