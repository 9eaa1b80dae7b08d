//! Remote current-conditions source (Open-Meteo compatible).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FetchError;

pub const DEFAULT_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,dew_point_2m,wind_speed_10m,precipitation,cloud_cover";

const USER_AGENT: &str = "drysense";

/// Latitude/longitude in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Current conditions as reported by the remote service. Any field may be
/// absent from the payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteSnapshot {
    /// °C
    #[serde(rename = "temperature_2m")]
    pub temperature: Option<f64>,
    /// %
    #[serde(rename = "relative_humidity_2m")]
    pub humidity: Option<f64>,
    /// °C
    #[serde(rename = "dew_point_2m")]
    pub dew_point: Option<f64>,
    /// km/h
    #[serde(rename = "wind_speed_10m")]
    pub wind_kmh: Option<f64>,
    /// mm/hr
    pub precipitation: Option<f64>,
    /// %
    pub cloud_cover: Option<f64>,
}

impl RemoteSnapshot {
    /// Illuminance estimate from cloud cover.
    pub fn illuminance(&self) -> Option<f64> {
        self.cloud_cover
            .map(|cloud| (1.0 - cloud / 100.0).clamp(0.0, 1.0) * 60_000.0)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<RemoteSnapshot>,
}

/// A single atomic current-conditions fetch.
pub trait RemoteWeather {
    fn current(&self, at: Coordinate) -> Result<RemoteSnapshot, FetchError>;
}

/// Never called; for installations that run on sensors alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemote;

impl RemoteWeather for NoRemote {
    fn current(&self, _at: Coordinate) -> Result<RemoteSnapshot, FetchError> {
        Err(FetchError::Request("remote weather is not available".into()))
    }
}

/// Blocking Open-Meteo client.
///
/// Owns a current-thread runtime so the synchronous tick can wait on the
/// request without the host running an executor. Must not be called from
/// inside another tokio runtime.
pub struct OpenMeteoClient {
    endpoint: Url,
    timeout: Duration,
    client: Client,
    runtime: tokio::runtime::Runtime,
}

impl OpenMeteoClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| FetchError::Request(format!("invalid endpoint '{endpoint}': {e}")))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self {
            endpoint,
            timeout,
            client,
            runtime,
        })
    }

    fn request_url(&self, at: Coordinate) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &at.latitude.to_string())
            .append_pair("longitude", &at.longitude.to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("wind_speed_unit", "kmh");
        url
    }

    async fn fetch(&self, url: Url) -> Result<RemoteSnapshot, FetchError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        let body: ForecastResponse = resp.json().await?;
        body.current.ok_or(FetchError::MalformedPayload)
    }
}

impl RemoteWeather for OpenMeteoClient {
    fn current(&self, at: Coordinate) -> Result<RemoteSnapshot, FetchError> {
        let url = self.request_url(at);
        tracing::debug!(%url, "fetching current conditions");
        // The timer must be created inside the runtime.
        self.runtime
            .block_on(async { tokio::time::timeout(self.timeout, self.fetch(url)).await })
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::io::Write;

    fn client_for(server: &mockito::ServerGuard) -> OpenMeteoClient {
        OpenMeteoClient::new(
            &format!("{}/v1/forecast", server.url()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn parses_current_block() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("latitude".into(), "51.5".into()),
                Matcher::UrlEncoded("longitude".into(), "-0.12".into()),
                Matcher::UrlEncoded("current".into(), CURRENT_FIELDS.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"latitude":51.5,"current":{"time":"2026-06-01T12:00","temperature_2m":21.4,
                "relative_humidity_2m":48,"dew_point_2m":9.9,"wind_speed_10m":14.4,
                "precipitation":0.0,"cloud_cover":25}}"#,
            )
            .create();

        let snapshot = client_for(&server)
            .current(Coordinate::new(51.5, -0.12))
            .unwrap();
        mock.assert();
        assert_eq!(snapshot.temperature, Some(21.4));
        assert_eq!(snapshot.humidity, Some(48.0));
        assert_eq!(snapshot.wind_kmh, Some(14.4));
        assert_eq!(snapshot.illuminance(), Some(45_000.0));
    }

    #[test]
    fn missing_current_block_is_malformed() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"latitude":51.5,"longitude":-0.12}"#)
            .create();

        let err = client_for(&server)
            .current(Coordinate::new(51.5, -0.12))
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedPayload));
    }

    #[test]
    fn http_error_status_is_reported() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(503)
            .create();

        let err = client_for(&server)
            .current(Coordinate::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
    }

    #[test]
    fn slow_response_times_out() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v1/forecast")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(3));
                w.write_all(br#"{"current":{}}"#)
            })
            .create();

        let client = OpenMeteoClient::new(
            &format!("{}/v1/forecast", server.url()),
            Duration::from_secs(1),
        )
        .unwrap();
        let started = std::time::Instant::now();
        let err = client.current(Coordinate::new(51.5, -0.12)).unwrap_err();
        assert!(matches!(err, FetchError::Timeout(1)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn illuminance_clamps_cloud_cover() {
        let snap = |cloud| RemoteSnapshot {
            cloud_cover: Some(cloud),
            ..Default::default()
        };
        assert_eq!(snap(0.0).illuminance(), Some(60_000.0));
        assert_eq!(snap(100.0).illuminance(), Some(0.0));
        assert_eq!(snap(130.0).illuminance(), Some(0.0));
        assert_eq!(RemoteSnapshot::default().illuminance(), None);
    }

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(OpenMeteoClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
