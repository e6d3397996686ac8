/*
 *  lib.rs
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

//! Bedside kiosk clock: time, household sensors, forecast, tides and moon.

pub mod analog;
pub mod bedtime;
pub mod canvas;
pub mod color;
pub mod config;
pub mod household;
pub mod http;
pub mod icons;
pub mod input;
pub mod moon;
pub mod pager;
pub mod render;
pub mod sensor;
pub mod settings;
pub mod shell;
pub mod state;
pub mod tides;
pub mod weather;
