//! Address lookup through a Nominatim search service
use crate::error::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!(
    "PupoMap-Admin/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/riccardotornesello/pupomap)"
);

/// The best match for an address
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Location {
    pub(crate) lat: f64,
    pub(crate) lng: f64,
    pub(crate) display_name: String,
}

/// A single search hit as returned by Nominatim. Coordinates are encoded as
/// strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

impl TryFrom<Place> for Location {
    type Error = Error;

    fn try_from(place: Place) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| Error::Upstream(format!("Geocoder returned invalid coordinate '{s}'")))
        };
        Ok(Location {
            lat: parse(&place.lat)?,
            lng: parse(&place.lon)?,
            display_name: place.display_name,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Geocoder {
    http: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub(crate) fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look up `address` and return the first match, if any
    pub(crate) async fn search(&self, address: &str) -> Result<Option<Location>, Error> {
        debug!(address, "Geocoding address");
        let places: Vec<Place> = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("limit", "1"), ("q", address)])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!("Geocoding request failed: {e}");
                Error::Upstream("Geocoding service unavailable".to_string())
            })?
            .json()
            .await
            .map_err(|e| {
                warn!("Unable to parse geocoding response: {e}");
                Error::Upstream("Invalid response from geocoding service".to_string())
            })?;
        places.into_iter().next().map(Location::try_from).transpose()
    }
}
