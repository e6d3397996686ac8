/*
 *  icons.rs
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

//! Forecast icon lookup and SVG rasterizing.
//!
//! This module uses `usvg` for SVG parsing and `resvg` for rendering.

use log::{debug, warn};
use regex::Regex;
use resvg::render;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree};

pub const UNKNOWN_ASSET: &str = "unknown.svg";

#[derive(Debug, Error)]
pub enum IconError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SVG parse error: {0}")]
    Parse(#[from] usvg::Error),
    #[error("Pixmap creation error: {0}x{1}")]
    Pixmap(u32, u32),
}

/// A condition code resolved to a local asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconInfo {
    pub asset: &'static str,
    pub description: &'static str,
}

const UNKNOWN: IconInfo = IconInfo { asset: UNKNOWN_ASSET, description: "Unknown" };

fn icon_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://api\.weather\.gov/icons/(.*)/(.*)/([a-z_]*)").expect("icon pattern")
    })
}

/// Condition short code from an icon URL, e.g. `rain_showers` from
/// `https://api.weather.gov/icons/land/night/rain_showers,40?size=medium`.
/// Double icons resolve to the later condition.
pub fn condition_code(url: &str) -> Option<&str> {
    icon_pattern()
        .captures(url)
        .and_then(|c| c.get(3))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

/// Static condition code table.
pub fn lookup(code: &str) -> IconInfo {
    let (asset, description) = match code {
        "skc" => ("sunny.svg", "Fair/clear"),
        "few" => ("lightcloud.svg", "A few clouds"),
        "sct" => ("lightcloud.svg", "Partly cloudy"),
        "bkn" => ("cloud.svg", "Mostly cloudy"),
        "ovc" => ("cloud.svg", "Overcast"),
        "wind_skc" => ("wind.svg", "Fair/clear and windy"),
        "wind_few" => ("wind.svg", "A few clouds and windy"),
        "wind_sct" => ("windcloud.svg", "Partly cloudy and windy"),
        "wind_bkn" => ("windcloud.svg", "Mostly cloudy and windy"),
        "wind_ovc" => ("windcloud.svg", "Overcast and windy"),
        "snow" => ("snow.svg", "Snow"),
        "rain_snow" => ("snow.svg", "Rain/snow"),
        "rain_sleet" => ("snow.svg", "Rain/sleet"),
        "snow_sleet" => ("rainsnow.svg", "Snow/sleet"),
        "fzra" => ("rainsnow.svg", "Freezing rain"),
        "rain_fzra" => ("rainsnow.svg", "Rain/freezing rain"),
        "snow_fzra" => ("rainsnow.svg", "Freezing rain/snow"),
        "sleet" => ("rainsnow.svg", "Sleet"),
        "rain" => ("rain.svg", "Rain"),
        "rain_showers" => ("rain.svg", "Rain showers (high cloud cover)"),
        "rain_showers_hi" => ("rain.svg", "Rain showers (low cloud cover)"),
        "tsra" => ("thunder.svg", "Thunderstorm (high cloud cover)"),
        "tsra_sct" => ("thunder.svg", "Thunderstorm (medium cloud cover)"),
        "tsra_hi" => ("thunder.svg", "Thunderstorm (low cloud cover)"),
        "tornado" => (UNKNOWN_ASSET, "Tornado"),
        "hurricane" => (UNKNOWN_ASSET, "Hurricane conditions"),
        "tropical_storm" => (UNKNOWN_ASSET, "Tropical storm conditions"),
        "dust" => (UNKNOWN_ASSET, "Dust"),
        "smoke" => (UNKNOWN_ASSET, "Smoke"),
        "haze" => ("haze.svg", "Haze"),
        "hot" => ("hot.svg", "Hot"),
        "cold" => (UNKNOWN_ASSET, "Cold"),
        "blizzard" => (UNKNOWN_ASSET, "Blizzard"),
        "fog" => ("fog.svg", "Fog/mist"),
        _ => return UNKNOWN,
    };
    IconInfo { asset, description }
}

/// Icon for a period's icon URL; anything unrecognised is `unknown.svg`.
pub fn resolve(icon_url: Option<&str>) -> IconInfo {
    icon_url.and_then(condition_code).map(lookup).unwrap_or(UNKNOWN)
}

/// A rasterized icon in straight (non-premultiplied) RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaIcon {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Rasterize SVG text into a `size` square, aspect preserved and centered.
pub fn rasterize(svg: &str, size: u32) -> Result<RgbaIcon, IconError> {
    let tree = Tree::from_str(svg, &Options::default())?;
    let mut pixmap = Pixmap::new(size, size).ok_or(IconError::Pixmap(size, size))?;

    let svg_size = tree.size();
    let scale = (size as f32 / svg_size.width()).min(size as f32 / svg_size.height());
    let dx = (size as f32 - svg_size.width() * scale) / 2.0;
    let dy = (size as f32 - svg_size.height() * scale) / 2.0;
    render(&tree, Transform::from_scale(scale, scale).post_translate(dx, dy), &mut pixmap.as_mut());

    let rgba = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Ok(RgbaIcon { width: size, height: size, rgba })
}

/// Icon directory with a per-asset raster cache. Assets that fail to load
/// are remembered so the warning is logged once.
#[derive(Debug)]
pub struct IconSet {
    dir: PathBuf,
    size: u32,
    cache: HashMap<&'static str, Option<RgbaIcon>>,
}

impl IconSet {
    pub fn new(dir: impl AsRef<Path>, size: u32) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), size, cache: HashMap::new() }
    }

    pub fn get(&mut self, info: IconInfo) -> Option<&RgbaIcon> {
        let (dir, size) = (&self.dir, self.size);
        self.cache
            .entry(info.asset)
            .or_insert_with(|| {
                let path = dir.join(info.asset);
                match std::fs::read_to_string(&path).map_err(IconError::from).and_then(|s| rasterize(&s, size)) {
                    Ok(icon) => {
                        debug!("icon {} rasterized at {}px", path.display(), size);
                        Some(icon)
                    }
                    Err(e) => {
                        warn!("icon {} unavailable: {}", path.display(), e);
                        None
                    }
                }
            })
            .as_ref()
    }
}
