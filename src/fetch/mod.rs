//! Feature queries against station GeoServers.
//!
//! [`FeatureSource`] is the seam the orchestrator talks to. [`WfsFetcher`]
//! implements it over any [`HttpClient`], issuing one WFS `GetFeature` per
//! [`DatasetRequest`] under a hard deadline and mapping every outcome to a
//! value: a list of property bags, or a [`FetchError`].

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::FetchError;
use crate::normalize::Properties;
use crate::registry::Station;
use crate::report::kinds::DatasetSpec;
use async_trait::async_trait;
use auth::UrlParam;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Query parameter carrying the station access token.
pub const AUTH_PARAM: &str = "authkey";

const WFS_VERSION: &str = "1.0.0";
const OUTPUT_FORMAT: &str = "application/json";

/// One remote query: which station, which layer, and how long to wait.
#[derive(Debug, Clone)]
pub struct DatasetRequest {
    pub station: Arc<Station>,
    pub dataset: &'static DatasetSpec,
    pub timeout: Duration,
}

impl DatasetRequest {
    /// GetFeature URL for this request, without the access token.
    pub fn url(&self) -> Result<Url, FetchError> {
        if self.station.address.trim().is_empty() {
            return Err(FetchError::Unreachable(format!(
                "station {} has no address configured",
                self.station.id
            )));
        }
        let base = format!("{}/{}/ows", self.station.base_url(), self.dataset.workspace);
        let mut url = Url::parse(&base).map_err(|e| {
            FetchError::Unreachable(format!(
                "invalid station address {:?}: {e}",
                self.station.address
            ))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("service", "WFS")
                .append_pair("version", WFS_VERSION)
                .append_pair("request", "GetFeature")
                .append_pair("typeName", &self.dataset.type_name());
            if let Some(max) = self.dataset.max_features {
                query.append_pair("maxFeatures", &max.to_string());
            }
            query.append_pair("outputFormat", OUTPUT_FORMAT);
        }

        Ok(url)
    }
}

#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Runs one dataset query. Never panics; a collection with no features
    /// is `Ok(vec![])`.
    async fn fetch(&self, request: &DatasetRequest) -> Result<Vec<Properties>, FetchError>;
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Option<Vec<Feature>>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Properties>,
}

/// Extracts the property bags from a GeoJSON feature collection body.
pub fn parse_features(bytes: &[u8]) -> Result<Vec<Properties>, FetchError> {
    let collection: FeatureCollection = serde_json::from_slice(bytes)
        .map_err(|e| FetchError::MalformedBody(e.to_string()))?;

    Ok(collection
        .features
        .unwrap_or_default()
        .into_iter()
        .map(|f| f.properties.unwrap_or_default())
        .collect())
}

/// GETs `url` and returns the body, failing on transport errors, non-2xx
/// statuses, or when the whole exchange outlives `timeout`.
///
/// Missing the deadline reports `timeout`; a client-side timeout that fires
/// first (connection setup) reports the time actually spent.
pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    url: Url,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);
    let started = Instant::now();

    let exchange = async {
        let resp = client
            .execute(req)
            .await
            .map_err(|e| classify(e, started.elapsed()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                code: status.as_u16(),
            });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| classify(e, started.elapsed()))?;
        Ok::<_, FetchError>(body.to_vec())
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Maps a reqwest error onto the fetch taxonomy. The URL is stripped first
/// since it carries the access token.
pub(crate) fn classify(err: reqwest::Error, elapsed: Duration) -> FetchError {
    let err = err.without_url();
    if err.is_timeout() {
        FetchError::Timeout(elapsed)
    } else if let Some(status) = err.status() {
        FetchError::BadStatus {
            code: status.as_u16(),
        }
    } else if err.is_decode() {
        FetchError::MalformedBody(error_chain(&err))
    } else {
        FetchError::Unreachable(error_chain(&err))
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Replaces the value of `param` in `url` with `REDACTED`, for logging.
pub fn redact_url(url: &str, param: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return "<invalid url>".to_string();
    };

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k.eq_ignore_ascii_case(param) {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    if !pairs.is_empty() {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parsed.to_string()
}

/// WFS feature fetcher over an [`HttpClient`].
pub struct WfsFetcher<C> {
    client: C,
}

impl<C: HttpClient> WfsFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> FeatureSource for WfsFetcher<C> {
    async fn fetch(&self, request: &DatasetRequest) -> Result<Vec<Properties>, FetchError> {
        let url = request.url()?;
        debug!(url = %url, timeout_ms = request.timeout.as_millis() as u64, "Querying station");

        let client = UrlParam::authkey(&self.client, &request.station.token);
        let bytes = fetch_bytes(&client, url, request.timeout).await?;
        debug!(bytes = bytes.len(), "Feature collection received, parsing");

        parse_features(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::kinds::ReportKind;

    fn request(address: &str, kind: ReportKind) -> DatasetRequest {
        DatasetRequest {
            station: Arc::new(Station::new("multan", address, "secret-token")),
            dataset: &kind.descriptor().datasets[0],
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_url_has_wfs_parameters_and_no_token() {
        let url = request("10.0.0.5:8080", ReportKind::TownPlan).url().unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("10.0.0.5"));
        assert_eq!(url.path(), "/geoserver/dha_coregis_v2/ows");
        assert!(query.contains(&("service".into(), "WFS".into())));
        assert!(query.contains(&("request".into(), "GetFeature".into())));
        assert!(query.contains(&(
            "typeName".into(),
            "dha_coregis_v2:phase_plot_category_summary".into()
        )));
        assert!(query.contains(&("maxFeatures".into(), "50".into())));
        assert!(query.contains(&("outputFormat".into(), "application/json".into())));
        assert!(!url.as_str().contains("secret-token"));
    }

    #[test]
    fn test_url_without_feature_cap() {
        let url = request("10.0.0.5", ReportKind::Land).url().unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "maxFeatures"));
    }

    #[test]
    fn test_blank_address_is_unreachable() {
        let err = request("", ReportKind::Land).url().unwrap_err();
        assert!(matches!(err, FetchError::Unreachable(_)));
    }

    #[test]
    fn test_parse_features() {
        let body = br#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": null, "properties": { "Phase": "Phase 1" } },
                { "type": "Feature", "properties": null },
                { "type": "Feature" }
            ]
        }"#;
        let features = parse_features(body).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["Phase"], "Phase 1");
        assert!(features[1].is_empty());
        assert!(features[2].is_empty());
    }

    #[test]
    fn test_parse_empty_collection_is_success() {
        assert!(parse_features(br#"{"type":"FeatureCollection"}"#).unwrap().is_empty());
        assert!(parse_features(br#"{"features":[]}"#).unwrap().is_empty());
        assert!(parse_features(br#"{"features":null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        let xml = b"<ows:ExceptionReport>Unknown layer</ows:ExceptionReport>";
        assert!(matches!(parse_features(xml), Err(FetchError::MalformedBody(_))));
        assert!(matches!(
            parse_features(br#"{"features": {"a": 1}}"#),
            Err(FetchError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_redact_url() {
        let redacted = redact_url(
            "http://10.0.0.5/geoserver/wfs?service=WFS&authkey=abc123&request=GetCapabilities",
            AUTH_PARAM,
        );
        assert!(!redacted.contains("abc123"));
        assert!(redacted.contains("authkey=REDACTED"));
        assert!(redacted.contains("request=GetCapabilities"));
    }

    #[test]
    fn test_redact_invalid_url_hides_everything() {
        assert_eq!(redact_url("not a url authkey=abc", AUTH_PARAM), "<invalid url>");
    }
}
