//! Station connectivity check via WFS `GetCapabilities`.

use crate::error::FetchError;
use crate::fetch::auth::UrlParam;
use crate::fetch::{AUTH_PARAM, HttpClient, classify, redact_url};
use crate::registry::Station;
use reqwest::Url;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_WORKSPACE: &str = "dha_coregis";
/// Statuses that count as a live server. Other 2xx answers are reported as errors.
const ACCEPTED_STATUSES: [u16; 2] = [200, 201];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Connected,
    Error,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeDetails {
    pub address: String,
    pub test_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub server: String,
    pub status: ProbeStatus,
    pub message: String,
    pub details: ProbeDetails,
}

/// Capabilities URL for `station`, with the token shown as `REDACTED`.
pub fn capabilities_url(station: &Station) -> Result<Url, FetchError> {
    let mut url = Url::parse(&format!("{}/{PROBE_WORKSPACE}/wfs", station.base_url()))
        .map_err(|e| FetchError::Unreachable(format!("invalid station address: {e}")))?;
    url.query_pairs_mut()
        .append_pair("service", "WFS")
        .append_pair("version", "2.0.0")
        .append_pair("request", "GetCapabilities");
    Ok(url)
}

/// Checks whether `station` answers a capabilities request within
/// [`PROBE_TIMEOUT`]. Always produces a report; never errors.
pub async fn check_station<C: HttpClient>(client: &C, station: &Station) -> ProbeReport {
    let (status, message, test_url) = match capabilities_url(station) {
        Ok(url) => {
            let mut shown = url.clone();
            shown.query_pairs_mut().append_pair(AUTH_PARAM, "x");
            let test_url = redact_url(shown.as_str(), AUTH_PARAM);
            info!(station = %station.id, url = %test_url, "Testing connection");

            let (status, message) = match request_status(client, station, url).await {
                Ok(code) if ACCEPTED_STATUSES.contains(&code) => (
                    ProbeStatus::Connected,
                    "Successfully connected to server".to_string(),
                ),
                Ok(code) => {
                    warn!(station = %station.id, code, "Server returned error status");
                    (
                        ProbeStatus::Error,
                        format!("Server returned status code: {code}"),
                    )
                }
                Err(e) => {
                    warn!(station = %station.id, error = %e, "Connection failed");
                    (
                        ProbeStatus::Disconnected,
                        format!("Could not connect to server: {e}"),
                    )
                }
            };
            (status, message, test_url)
        }
        Err(e) => (
            ProbeStatus::Disconnected,
            format!("Could not connect to server: {e}"),
            String::new(),
        ),
    };

    ProbeReport {
        server: station.id.clone(),
        status,
        message,
        details: ProbeDetails {
            address: station.address.clone(),
            test_url,
        },
    }
}

/// Status code of a capabilities request; the body is not read.
async fn request_status<C: HttpClient>(
    client: &C,
    station: &Station,
    url: Url,
) -> Result<u16, FetchError> {
    let client = UrlParam::authkey(client, &station.token);
    let req = reqwest::Request::new(reqwest::Method::GET, url);
    let started = Instant::now();

    match tokio::time::timeout(PROBE_TIMEOUT, client.execute(req)).await {
        Ok(Ok(resp)) => Ok(resp.status().as_u16()),
        Ok(Err(e)) => Err(classify(e, started.elapsed())),
        Err(_) => Err(FetchError::Timeout(PROBE_TIMEOUT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_url() {
        let station = Station::new("quetta", "10.9.9.9", "tkn");
        let url = capabilities_url(&station).unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.9.9.9/geoserver/dha_coregis/wfs?service=WFS&version=2.0.0&request=GetCapabilities"
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ProbeStatus::Disconnected).unwrap(),
            serde_json::json!("disconnected")
        );
    }
}
