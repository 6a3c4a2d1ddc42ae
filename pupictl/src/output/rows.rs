use libpupi::pupo::Pupo;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct PupoRow {
    id: i64,
    name: String,
    artist: String,
    theme: String,
    #[tabled(display("tabled::derive::display::option", ""))]
    address: Option<String>,
}

impl PupoRow {
    pub(crate) fn new(pupo: &Pupo) -> Self {
        Self {
            id: pupo.id,
            name: pupo.name.clone(),
            artist: pupo.artist.clone(),
            theme: pupo.theme.clone(),
            address: pupo.address.clone(),
        }
    }
}

#[derive(Tabled, Serialize)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct PupoRowFull {
    id: i64,
    name: String,
    description: String,
    artist: String,
    theme: String,
    #[tabled(rename = "Latitude")]
    lat: f64,
    #[tabled(rename = "Longitude")]
    lng: f64,
    #[tabled(display("tabled::derive::display::option", ""))]
    address: Option<String>,
    image: String,
    map: String,
}

impl PupoRowFull {
    pub(crate) fn new(pupo: &Pupo) -> Self {
        Self {
            id: pupo.id,
            name: pupo.name.clone(),
            description: pupo.description.clone(),
            artist: pupo.artist.clone(),
            theme: pupo.theme.clone(),
            lat: pupo.lat,
            lng: pupo.lng,
            address: pupo.address.clone(),
            image: pupo.image.clone(),
            map: pupo.map_viewer_uri(17),
        }
    }
}

#[derive(Tabled, Serialize, Debug, PartialEq)]
#[tabled(rename_all = "PascalCase")]
pub(crate) struct VoteRow {
    id: i64,
    name: String,
    votes: i64,
}

impl VoteRow {
    /// One row per pupo, most voted first. Pupi without votes are listed with
    /// a count of zero.
    pub(crate) fn from_counts(pupi: &[Pupo], counts: &BTreeMap<i64, i64>) -> Vec<Self> {
        let mut rows: Vec<Self> = pupi
            .iter()
            .map(|p| Self {
                id: p.id,
                name: p.name.clone(),
                votes: counts.get(&p.id).copied().unwrap_or_default(),
            })
            .collect();
        rows.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.name.cmp(&b.name)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libpupi::pupo::PupoData;

    fn pupo(id: i64, name: &str) -> Pupo {
        PupoData {
            name: name.into(),
            description: "d".into(),
            lat: 40.0,
            lng: 18.0,
            image: "i.jpg".into(),
            artist: "a".into(),
            theme: "t".into(),
            address: None,
        }
        .with_id(id)
    }

    #[test]
    fn test_vote_rows() {
        let pupi = vec![pupo(1, "Drago"), pupo(2, "Befana"), pupo(3, "Sindaco")];
        let counts = BTreeMap::from([(3, 4), (1, 1)]);
        let rows = VoteRow::from_counts(&pupi, &counts);
        let summary: Vec<_> = rows.iter().map(|r| (r.id, r.votes)).collect();
        assert_eq!(summary, vec![(3, 4), (1, 1), (2, 0)]);
    }
}
