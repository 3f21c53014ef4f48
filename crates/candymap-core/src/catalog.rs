//! The static catalog of houses.
//!
//! Houses are loaded once at startup and never change afterwards. Every other
//! store refers to a house by its catalog id, never by its display name: two
//! houses at the same street and number still get distinct ids.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Map centre used for entries that were never geocoded.
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    lat: -23.205337,
    lon: -45.957613,
};

/// Geographic position of a house.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// A point of interest that can be visited, voted on and noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    /// Stable catalog id (join key for every store)
    pub id: String,

    /// Display name, usually "street, number"
    pub display_name: String,

    /// Free-form description (residents, decorations)
    #[serde(default)]
    pub description: String,

    /// Postal address used for geocoding
    #[serde(default)]
    pub address: Option<String>,

    /// Map position
    pub coordinates: Coordinates,

    /// Whether the coordinates came from geocoding or the default centre
    #[serde(default)]
    pub geocoded: bool,

    /// Picture shown in the popup
    #[serde(default)]
    pub image: Option<String>,
}

impl House {
    /// Create a house with required fields.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            address: None,
            coordinates,
            geocoded: true,
            image: None,
        }
    }
}

/// One entry of the prepared catalog file (`casas.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    /// Explicit stable id; derived when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "nome")]
    pub name: String,

    #[serde(rename = "descricao", default)]
    pub description: String,

    #[serde(default)]
    pub address: Option<String>,

    /// `[lat, lon]`
    #[serde(default)]
    pub coords: Option<[f64; 2]>,

    #[serde(default)]
    pub geocoded: Option<bool>,

    #[serde(rename = "img", default)]
    pub image: Option<String>,
}

/// Read-only list of houses with id lookup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    houses: Vec<House>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate or empty ids.
    pub fn new(houses: Vec<House>) -> Result<Self> {
        let mut index = HashMap::with_capacity(houses.len());
        for (pos, house) in houses.iter().enumerate() {
            if house.id.trim().is_empty() {
                return Err(Error::Catalog(format!("house at position {} has an empty id", pos)));
            }
            if index.insert(house.id.clone(), pos).is_some() {
                return Err(Error::Catalog(format!("duplicate house id: {}", house.id)));
            }
        }
        Ok(Self { houses, index })
    }

    /// Build a catalog from prepared entries, deriving ids where missing.
    ///
    /// A derived id depends only on the address (or the name when there is
    /// no address), so adding or reordering rows never changes another
    /// house's id.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let houses = entries
            .into_iter()
            .map(|entry| {
                let key = entry
                    .address
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| entry.name.trim())
                    .to_string();
                let id = match entry.id {
                    Some(id) => id,
                    None => {
                        let occurrence = seen.entry(key.clone()).or_insert(0);
                        *occurrence += 1;
                        Self::generate_id(&key, *occurrence)
                    }
                };
                let (coordinates, geocoded) = match entry.coords {
                    Some([lat, lon]) if lat.is_finite() && lon.is_finite() => {
                        (Coordinates { lat, lon }, entry.geocoded.unwrap_or(true))
                    }
                    _ => (DEFAULT_COORDINATES, false),
                };
                House {
                    id,
                    display_name: entry.name.trim().to_string(),
                    description: entry.description,
                    address: entry.address,
                    coordinates,
                    geocoded,
                    image: entry.image,
                }
            })
            .collect();
        Self::new(houses)
    }

    /// Parse the prepared catalog JSON array.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    /// Derive a stable id from an address.
    ///
    /// `occurrence` counts repeats of the same address in the catalog, from 1.
    /// Only the second and later repeats are salted (`address#2`, ...).
    pub fn generate_id(address: &str, occurrence: usize) -> String {
        let address = address.trim();
        let hash = if occurrence > 1 {
            blake3::hash(format!("{}#{}", address, occurrence).as_bytes())
        } else {
            blake3::hash(address.as_bytes())
        };
        hex::encode(&hash.as_bytes()[..8])
    }

    /// Number of houses.
    pub fn len(&self) -> usize {
        self.houses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    /// Look up a house by id.
    pub fn get(&self, id: &str) -> Option<&House> {
        self.index.get(id).map(|&pos| &self.houses[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a house, failing with [`Error::UnknownHouse`].
    pub fn require(&self, id: &str) -> Result<&House> {
        self.get(id).ok_or_else(|| Error::UnknownHouse(id.to_string()))
    }

    /// Catalog position of a house (used for deterministic tie-breaking).
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Houses in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &House> {
        self.houses.iter()
    }

    pub fn houses(&self) -> &[House] {
        &self.houses
    }
}
