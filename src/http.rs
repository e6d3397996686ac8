/*
 *  http.rs
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

use flate2::read::GzDecoder;
use log::{debug, warn};
use reqwest::{Client, header};
use serde::Serialize;
use std::io::Read;
use std::time::Duration;

pub const VERSION: &str = concat!("KioskClock/", env!("CARGO_PKG_VERSION"));

/// Per-service client settings.
#[derive(Debug, Clone)]
pub struct ClientOptions<'a> {
    pub user_agent: Option<&'a str>,
    pub from: Option<&'a str>,
    pub accept: &'static str,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for ClientOptions<'_> {
    fn default() -> Self {
        Self {
            user_agent: None,
            from: None,
            accept: "application/json",
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(20),
        }
    }
}

fn header_or(name: &str, value: Option<&str>, fallback: &'static str) -> header::HeaderValue {
    match value.map(header::HeaderValue::from_str) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            warn!("ignoring unusable {name} header value");
            header::HeaderValue::from_static(fallback)
        }
        None => header::HeaderValue::from_static(fallback),
    }
}

/// Build a client with the default header set every service here uses.
pub fn build_client(opts: &ClientOptions<'_>) -> Result<Client, reqwest::Error> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::USER_AGENT, header_or("User-Agent", opts.user_agent, VERSION));
    headers.insert(header::ACCEPT, header::HeaderValue::from_static(opts.accept));
    headers.insert(header::ACCEPT_ENCODING, header::HeaderValue::from_static("gzip, deflate"));
    headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, header::HeaderValue::from_static("close"));
    if let Some(from) = opts.from {
        if let Ok(v) = header::HeaderValue::from_str(from) {
            headers.insert(header::FROM, v);
        }
    }

    Client::builder()
        .connect_timeout(opts.connect_timeout)
        .default_headers(headers)
        .timeout(opts.timeout)
        .build()
}

/// GET with a bounded number of attempts on transport errors. HTTP error
/// statuses are not retried.
pub async fn get_bytes<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    params: &T,
    max_retries: u8,
) -> Result<Vec<u8>, reqwest::Error> {
    let mut retries = 0;
    loop {
        match client.get(url).query(params).send().await {
            Ok(response) => {
                let response = response.error_for_status()?;
                let raw = response.bytes().await?;
                debug!("GET {url}: {} bytes", raw.len());
                return Ok(raw.to_vec());
            }
            Err(e) => {
                retries += 1;
                if retries >= max_retries {
                    return Err(e);
                }
                warn!("GET {url} failed ({e}), retry {retries}/{max_retries}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// GET a text body, tolerating servers that gzip regardless of negotiation.
pub async fn get_text<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    params: &T,
    max_retries: u8,
) -> Result<String, reqwest::Error> {
    let raw = get_bytes(client, url, params, max_retries).await?;
    Ok(decode_body(&raw))
}

/// Gunzip when the payload is gzip, otherwise treat it as plain text.
pub fn decode_body(raw: &[u8]) -> String {
    let mut decoder = GzDecoder::new(raw);
    let mut decoded = String::new();
    match decoder.read_to_string(&mut decoded) {
        Ok(_) => decoded,
        Err(_) => String::from_utf8_lossy(raw).to_string(),
    }
}
