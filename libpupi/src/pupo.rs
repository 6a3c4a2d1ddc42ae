//! Objects to manage the festival landmarks ("pupi") shown on the map
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

const OSM_VIEWER_URL: &str = "https://www.openstreetmap.org/";

/// A festival landmark as it is stored in the database
#[derive(Debug, sqlx::FromRow, Deserialize, Serialize, PartialEq, Clone)]
pub struct Pupo {
    /// A unique ID that identifies this pupo in the database
    pub id: i64,

    /// The display name of the pupo
    pub name: String,

    /// A longer description of what the pupo represents
    pub description: String,

    /// Latitude of the location where the pupo is exhibited
    pub lat: f64,

    /// Longitude of the location where the pupo is exhibited
    pub lng: f64,

    /// A url (or other reference) to a picture of the pupo
    #[serde(alias = "imageUrl")]
    pub image: String,

    /// The artist or group that built the pupo
    pub artist: String,

    /// The theme of the pupo, e.g. "Satira Politica", "Tradizionale", "Fantasia"
    pub theme: String,

    /// An optional street address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Pupo {
    /// Returns a link to an OpenStreetMap view centered on this pupo
    pub fn map_viewer_uri(&self, zoom: u8) -> String {
        format!(
            "{OSM_VIEWER_URL}?mlat={lat}&mlon={lng}#map={zoom}/{lat}/{lng}",
            lat = self.lat,
            lng = self.lng
        )
    }

    /// Merge the fields that are specified in `patch` into a copy of this
    /// pupo. The merged record is validated before it is returned, so a patch
    /// can never produce a record that could not have been created.
    pub fn apply(&self, patch: PupoInput) -> Result<Pupo> {
        let mut merged = PupoInput::from(self);
        if patch.name.is_some() {
            merged.name = patch.name;
        }
        if patch.description.is_some() {
            merged.description = patch.description;
        }
        if patch.lat.is_some() {
            merged.lat = patch.lat;
        }
        if patch.lng.is_some() {
            merged.lng = patch.lng;
        }
        if patch.image.is_some() {
            merged.image = patch.image;
        }
        if patch.artist.is_some() {
            merged.artist = patch.artist;
        }
        if patch.theme.is_some() {
            merged.theme = patch.theme;
        }
        if patch.address.is_some() {
            merged.address = patch.address;
        }
        merged.validate().map(|data| data.with_id(self.id))
    }
}

/// The validated contents of a pupo that has not been assigned an id yet
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PupoData {
    pub name: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub image: String,
    pub artist: String,
    pub theme: String,
    pub address: Option<String>,
}

impl PupoData {
    pub fn with_id(self, id: i64) -> Pupo {
        Pupo {
            id,
            name: self.name,
            description: self.description,
            lat: self.lat,
            lng: self.lng,
            image: self.image,
            artist: self.artist,
            theme: self.theme,
            address: self.address,
        }
    }
}

/// Unvalidated pupo fields as submitted by a client. Every field is optional
/// so the same type serves for creating a new pupo and for partial updates.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct PupoInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "coordinate")]
    pub lng: Option<f64>,
    #[serde(default, alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl From<&Pupo> for PupoInput {
    fn from(p: &Pupo) -> Self {
        Self {
            name: Some(p.name.clone()),
            description: Some(p.description.clone()),
            lat: Some(p.lat),
            lng: Some(p.lng),
            image: Some(p.image.clone()),
            artist: Some(p.artist.clone()),
            theme: Some(p.theme.clone()),
            address: p.address.clone(),
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingField(field))
}

/// Checks that a latitude/longitude pair is finite and lies within valid global ranges
pub fn valid_coordinates(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

impl PupoInput {
    /// Are all fields unspecified?
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check that all required fields are present and that the coordinates
    /// are valid. Text fields are trimmed and a blank address is dropped.
    pub fn validate(self) -> Result<PupoData> {
        let name = required(self.name, "name")?;
        let description = required(self.description, "description")?;
        let lat = self.lat.ok_or(Error::MissingField("lat"))?;
        let lng = self.lng.ok_or(Error::MissingField("lng"))?;
        let image = required(self.image, "image")?;
        let artist = required(self.artist, "artist")?;
        let theme = required(self.theme, "theme")?;
        if !valid_coordinates(lat, lng) {
            return Err(Error::InvalidCoordinates { lat, lng });
        }
        let address = self
            .address
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(PupoData {
            name,
            description,
            lat,
            lng,
            image,
            artist,
            theme,
            address,
        })
    }
}

/// Clients send coordinates either as json numbers or as strings taken
/// straight from a text input. A string that cannot be parsed becomes NaN so
/// that validation reports it as an invalid coordinate rather than a
/// malformed request.
fn coordinate<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(de)? {
        None => None,
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::String(s)) => match s.trim() {
            "" => None,
            s => Some(s.parse().unwrap_or(f64::NAN)),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> PupoInput {
        PupoInput {
            name: Some("Il Pupo del Porto".into()),
            description: Some("Un vecchio pescatore".into()),
            lat: Some(40.0565),
            lng: Some(17.978),
            image: Some("https://example.com/porto.jpg".into()),
            artist: Some("Associazione Porto".into()),
            theme: Some("Tradizionale".into()),
            address: None,
        }
    }

    #[test]
    fn test_validate_ok() {
        let data = input().validate().expect("valid input rejected");
        assert_eq!(data.name, "Il Pupo del Porto");
        assert_eq!(data.address, None);
        let pupo = data.with_id(7);
        assert_eq!(pupo.id, 7);
        assert_eq!(pupo.lat, 40.0565);
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut i = input();
        i.name = Some("   ".into());
        assert!(matches!(i.validate(), Err(Error::MissingField("name"))));

        let mut i = input();
        i.theme = None;
        assert!(matches!(i.validate(), Err(Error::MissingField("theme"))));

        let mut i = input();
        i.lng = None;
        assert!(matches!(i.validate(), Err(Error::MissingField("lng"))));
    }

    #[test]
    fn test_validate_coordinates() {
        for (lat, lng) in [
            (90.5, 0.0),
            (-90.1, 0.0),
            (0.0, 180.01),
            (0.0, -181.0),
            (f64::NAN, 0.0),
            (0.0, f64::INFINITY),
        ] {
            let mut i = input();
            i.lat = Some(lat);
            i.lng = Some(lng);
            assert!(
                matches!(i.validate(), Err(Error::InvalidCoordinates { .. })),
                "accepted ({lat}, {lng})"
            );
        }

        // the edges of the ranges and zero are fine
        for (lat, lng) in [(90.0, 180.0), (-90.0, -180.0), (0.0, 0.0)] {
            let mut i = input();
            i.lat = Some(lat);
            i.lng = Some(lng);
            assert!(i.validate().is_ok(), "rejected ({lat}, {lng})");
        }
    }

    #[test]
    fn test_deserialize_coordinates_from_strings() {
        let i: PupoInput = serde_json::from_value(json!({
            "name": "x",
            "lat": "40.05",
            "lng": 17.9,
            "imageUrl": "https://example.com/x.jpg",
        }))
        .expect("failed to deserialize");
        assert_eq!(i.lat, Some(40.05));
        assert_eq!(i.lng, Some(17.9));
        assert_eq!(i.image.as_deref(), Some("https://example.com/x.jpg"));

        let i: PupoInput = serde_json::from_value(json!({"lat": "north", "lng": ""}))
            .expect("failed to deserialize");
        assert!(i.lat.expect("lat should be set").is_nan());
        assert_eq!(i.lng, None);

        let i: PupoInput = serde_json::from_value(json!({"lat": null})).unwrap();
        assert_eq!(i.lat, None);
        assert!(i.is_empty());
    }

    #[test]
    fn test_apply_patch() {
        let pupo = input().validate().unwrap().with_id(3);
        let patched = pupo
            .apply(PupoInput {
                name: Some("Nuovo nome".into()),
                address: Some("Via Roma 1".into()),
                ..Default::default()
            })
            .expect("patch failed");
        assert_eq!(patched.id, 3);
        assert_eq!(patched.name, "Nuovo nome");
        assert_eq!(patched.address.as_deref(), Some("Via Roma 1"));
        assert_eq!(patched.description, pupo.description);

        // a blank address clears it again
        let cleared = patched
            .apply(PupoInput {
                address: Some("".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cleared.address, None);

        // patches can't break the invariants
        assert!(matches!(
            pupo.apply(PupoInput {
                lat: Some(123.0),
                ..Default::default()
            }),
            Err(Error::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            pupo.apply(PupoInput {
                artist: Some("".into()),
                ..Default::default()
            }),
            Err(Error::MissingField("artist"))
        ));
    }

    #[test]
    fn test_serialize_omits_empty_address() {
        let pupo = input().validate().unwrap().with_id(1);
        let value = serde_json::to_value(&pupo).unwrap();
        assert!(value.get("address").is_none());
        assert_eq!(value["image"], "https://example.com/porto.jpg");
    }

    #[test]
    fn test_map_viewer_uri() {
        let pupo = input().validate().unwrap().with_id(1);
        assert_eq!(
            pupo.map_viewer_uri(17),
            "https://www.openstreetmap.org/?mlat=40.0565&mlon=17.978#map=17/40.0565/17.978"
        );
    }
}
