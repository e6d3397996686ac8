/*
 *  state.rs
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

use chrono::NaiveDateTime;
use image::RgbaImage;

use crate::bedtime::{BedtimeStatus, Indicator};
use crate::icons::{IconInfo, RgbaIcon};
use crate::pager::ForecastPager;
use crate::sensor::SensorSnapshot;
use crate::settings::Settings;
use crate::tides::TideReport;
use crate::weather::{Forecast, ForecastPeriod};

/// Moon frame as shown: catalog index, where it came from, console preview.
#[derive(Debug, Clone, PartialEq)]
pub struct MoonView {
    pub index: u32,
    pub from_cache: bool,
    pub preview: RgbaImage,
}

/// Everything the screen shows. Rendering is a projection of this.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub now: NaiveDateTime,
    pub bedtime: BedtimeStatus,
    pub indicator: Indicator,
    pub settings: Settings,
    pub sensor: SensorSnapshot,
    pub sensor_enabled: bool,
    pub forecast: Option<Forecast>,
    pub pager: ForecastPager,
    pub icon: Option<(IconInfo, Option<RgbaIcon>)>,
    pub tides: TideReport,
    pub moon: Option<MoonView>,
    pub message: Option<String>,
}

impl AppState {
    pub fn period_count(&self) -> usize {
        self.forecast.as_ref().map_or(0, |f| f.periods.len())
    }

    pub fn selected_period(&self) -> Option<&ForecastPeriod> {
        self.forecast.as_ref()?.periods.get(self.pager.selected())
    }

    /// Swap in a new forecast and keep the cursors inside it.
    pub fn set_forecast(&mut self, forecast: Option<Forecast>) {
        self.forecast = forecast;
        let len = self.period_count();
        self.pager.clamp(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::parse_forecast;

    #[test]
    fn test_set_forecast_clamps_pager() {
        let body = r#"{"properties":{"periods":[{"name":"A"},{"name":"B"},{"name":"C"}]}}"#;
        let mut s = AppState::default();
        s.pager.select_visible(2, 3);
        s.set_forecast(Some(parse_forecast(body).unwrap()));
        assert_eq!(s.selected_period().unwrap().name, "C");

        let body = r#"{"properties":{"periods":[{"name":"A"}]}}"#;
        s.set_forecast(Some(parse_forecast(body).unwrap()));
        assert_eq!(s.selected_period().unwrap().name, "A");
        s.set_forecast(None);
        assert!(s.selected_period().is_none());
    }
}
