/*
 *  household.rs
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

//! LED ball, screen power and backlight.

use log::{debug, info, warn};
use std::future::Future;
use std::path::PathBuf;
use tokio::process::Command;

use crate::bedtime::Indicator;
use crate::config::HouseholdConfig;

pub trait Household {
    fn set_indicator(&mut self, state: Indicator) -> impl Future<Output = ()>;
    fn display_off(&mut self) -> impl Future<Output = ()>;
    fn set_brightness(&mut self, level: u8) -> impl Future<Output = ()>;
}

/// Runs the configured shell commands and writes the backlight file.
pub struct CommandHousehold {
    cfg: HouseholdConfig,
}

impl CommandHousehold {
    pub fn new(cfg: HouseholdConfig) -> Self {
        Self { cfg }
    }

    fn indicator_command(&self, state: Indicator) -> Option<&str> {
        match state {
            Indicator::Off => self.cfg.led_off.as_deref(),
            Indicator::On => self.cfg.led_on.as_deref(),
            Indicator::OnAlternate => self.cfg.led_on2.as_deref(),
            Indicator::ReadyForBed => self.cfg.led_ready.as_deref(),
        }
    }

    async fn run(what: &str, cmd: Option<&str>) {
        let Some(cmd) = cmd else {
            info!("{what}: no command configured");
            return;
        };
        debug!("{what}: {cmd}");
        match Command::new("sh").arg("-c").arg(cmd).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("{what}: command exited with {status}"),
            Err(e) => warn!("{what}: could not run command: {e}"),
        }
    }
}

impl Household for CommandHousehold {
    async fn set_indicator(&mut self, state: Indicator) {
        info!("Set LED ball: {}", state.label());
        let cmd = self.indicator_command(state).map(str::to_owned);
        Self::run("indicator", cmd.as_deref()).await;
    }

    async fn display_off(&mut self) {
        info!("Turning the display off");
        let cmd = self.cfg.display_off.clone();
        Self::run("display off", cmd.as_deref()).await;
    }

    async fn set_brightness(&mut self, level: u8) {
        let Some(path) = self.cfg.backlight.clone() else {
            info!("brightness {level}: no backlight configured");
            return;
        };
        write_brightness(path, level).await;
    }
}

async fn write_brightness(path: PathBuf, level: u8) {
    match tokio::fs::write(&path, format!("{level}\n")).await {
        Ok(()) => debug!("brightness {level} -> {}", path.display()),
        Err(e) => warn!("could not set brightness via {}: {e}", path.display()),
    }
}
