/*
 *  moon.rs
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

//! Moon phase frames from the NASA SVS "Moon Phase and Libration" set.
//!
//! The set holds one frame per hour of the year. Small displays read a local
//! mirror of the 216px JPEG frames; larger ones pull the 4K or 6K TIFF and
//! crop the moon out of the 16:9 frame.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use log::{debug, error, info, warn};
use reqwest::Client;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::MoonConfig;
use crate::http;

/// Frames in the catalog, one per hour of a non-leap year.
pub const CATALOG_SIZE: u32 = 8760;

/// Largest display size still served from the local JPEG mirror.
pub const CACHE_MAX_SIZE: u32 = 500;

#[derive(Debug, Error)]
pub enum MoonError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Archive resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Small,
    Uhd,
    Full,
}

impl Tier {
    pub fn for_size(size: u32) -> Self {
        if size > 2160 {
            Tier::Full
        } else if size > 216 {
            Tier::Uhd
        } else {
            Tier::Small
        }
    }

    fn dir(self) -> &'static str {
        match self {
            Tier::Full => "frames/5760x3240_16x9_30p/plain",
            Tier::Uhd => "frames/3840x2160_16x9_30p/plain",
            Tier::Small => "frames/216x216_1x1_30p",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Tier::Small => "jpg",
            Tier::Full | Tier::Uhd => "tif",
        }
    }
}

/// Catalog index for `now`: rounded hours since Jan 1 00:00 UTC. Past the
/// end of the catalog (the set belongs to one year) the last frame is used.
/// The set has no frame 0000, so the first half hour of the year shows frame 1.
pub fn image_index(now: DateTime<Utc>) -> u32 {
    let jan_one = Utc
        .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let hours = ((now - jan_one).num_seconds() as f64 / 3600.0).round() as u32;
    if hours > CATALOG_SIZE {
        warn!("moon frame {hours} past the catalog end, are we in a new year?");
    }
    hours.clamp(1, CATALOG_SIZE)
}

pub fn frame_name(index: u32, tier: Tier) -> String {
    format!("moon.{index:04}.{}", tier.extension())
}

pub fn frame_url(domain: &str, path: &str, index: u32, tier: Tier) -> String {
    format!(
        "{}/{}/{}/{}",
        domain.trim_end_matches('/'),
        path.trim_matches('/'),
        tier.dir(),
        frame_name(index, tier)
    )
}

/// Center crop to a square on the smaller dimension.
pub fn crop_square(img: &DynamicImage) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let side = w.min(h);
    img.crop_imm((w - side) / 2, (h - side) / 2, side, side)
}

/// Decode, crop and scale a frame to `size` x `size`.
pub fn prepare(bytes: &[u8], size: u32) -> Result<RgbaImage, MoonError> {
    let img = image::load_from_memory(bytes)?;
    debug!("moon frame {}x{}", img.width(), img.height());
    Ok(crop_square(&img).resize_exact(size, size, FilterType::Lanczos3).to_rgba8())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Cache,
    Web,
}

#[derive(Debug, Clone)]
pub struct MoonFrame {
    pub index: u32,
    pub source: FrameSource,
    pub image: RgbaImage,
}

pub struct MoonClient {
    client: Client,
    domain: String,
    path: String,
    cache_dir: PathBuf,
    size: u32,
    web: bool,
    save: bool,
    date: Option<NaiveDateTime>,
    tx: watch::Sender<Option<MoonFrame>>,
}

impl MoonClient {
    pub fn new(cfg: &MoonConfig) -> Result<Self, MoonError> {
        let client = http::build_client(&http::ClientOptions {
            accept: "image/*",
            timeout: std::time::Duration::from_secs(60),
            ..Default::default()
        })?;
        let (tx, _) = watch::channel(None);
        Ok(Self {
            client,
            domain: cfg.domain.clone(),
            path: cfg.path.clone(),
            cache_dir: cfg.cache_dir.clone(),
            size: cfg.size,
            web: cfg.web,
            save: cfg.save,
            date: cfg.date,
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<MoonFrame>> {
        self.tx.subscribe()
    }

    fn reference_time(&self) -> DateTime<Utc> {
        self.date.map(|d| d.and_utc()).unwrap_or_else(Utc::now)
    }

    fn cache_path(&self, index: u32) -> PathBuf {
        self.cache_dir.join(frame_name(index, Tier::Small))
    }

    /// Whether a frame should come from the local mirror.
    pub fn wants_cache(&self, index: u32) -> bool {
        !self.web && self.size <= CACHE_MAX_SIZE && self.cache_path(index).is_file()
    }

    pub async fn load(&self) -> Result<MoonFrame, MoonError> {
        let index = image_index(self.reference_time());
        debug!("We are using moon image number: {index}");

        if self.wants_cache(index) {
            let bytes = tokio::fs::read(self.cache_path(index)).await?;
            let image = prepare(&bytes, self.size)?;
            return Ok(MoonFrame { index, source: FrameSource::Cache, image });
        }

        let tier = Tier::for_size(self.size);
        let url = frame_url(&self.domain, &self.path, index, tier);
        info!("Getting moon image from url: {url}");
        let no_params: &[(&str, &str)] = &[];
        let bytes = http::get_bytes(&self.client, &url, no_params, 2).await?;

        if self.save {
            let dest = self.cache_dir.join(frame_name(index, tier));
            tokio::fs::create_dir_all(&self.cache_dir).await?;
            tokio::fs::write(&dest, &bytes).await?;
            info!("moon frame saved to {}", dest.display());
        }

        let image = prepare(&bytes, self.size)?;
        Ok(MoonFrame { index, source: FrameSource::Web, image })
    }

    /// Load and publish. A failure keeps the last frame on display.
    pub async fn refresh(&self) {
        match self.load().await {
            Ok(frame) => {
                self.tx.send_replace(Some(frame));
            }
            Err(e) => error!("moon update failed: {e}"),
        }
    }
}
