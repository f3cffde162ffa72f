//! People and planets loaded from a TOML seed file.
//!
//! ## Seed file format
//!
//! ```toml
//! [[people]]
//! name = "Luke Skywalker"
//! birth_year = "19BBY"
//! gender = "male"
//!
//! [[planets]]
//! name = "Tatooine"
//! climate = "arid"
//! terrain = "desert"
//! ```
//!
//! Only empty tables are filled, so restarting with the same file is a no-op.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::store::{NewPerson, NewPlanet, Store, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid seed data in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("{kind} entry #{index} in {path} has an empty name")]
    EmptyName {
        path: String,
        kind: &'static str,
        index: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    #[serde(default)]
    people: Vec<PersonEntry>,
    #[serde(default)]
    planets: Vec<PlanetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonEntry {
    name: String,
    birth_year: Option<String>,
    gender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanetEntry {
    name: String,
    climate: Option<String>,
    terrain: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedData {
    pub people: Vec<NewPerson>,
    pub planets: Vec<NewPlanet>,
}

/// Rows actually written by [`apply_seed`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub people: usize,
    pub planets: usize,
}

pub fn load_seed_file(path: &Path) -> Result<SeedData, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let parsed: SeedFile = toml::from_str(&raw).map_err(|source| SeedError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let mut data = SeedData::default();

    for (index, entry) in parsed.people.into_iter().enumerate() {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            return Err(SeedError::EmptyName {
                path: path.display().to_string(),
                kind: "people",
                index: index + 1,
            });
        }
        data.people.push(NewPerson {
            name,
            birth_year: entry.birth_year,
            gender: entry.gender,
        });
    }

    for (index, entry) in parsed.planets.into_iter().enumerate() {
        let name = entry.name.trim().to_string();
        if name.is_empty() {
            return Err(SeedError::EmptyName {
                path: path.display().to_string(),
                kind: "planets",
                index: index + 1,
            });
        }
        data.planets.push(NewPlanet {
            name,
            climate: entry.climate,
            terrain: entry.terrain,
        });
    }

    Ok(data)
}

/// Insert seed rows into whichever of the two tables is still empty.
pub async fn apply_seed(store: &Store, data: &SeedData) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    if store.list_people().await?.is_empty() {
        for person in &data.people {
            store.insert_person(person).await?;
            report.people += 1;
        }
    } else {
        info!("people table already populated; skipping seed");
    }

    if store.list_planets().await?.is_empty() {
        for planet in &data.planets {
            store.insert_planet(planet).await?;
            report.planets += 1;
        }
    } else {
        info!("planets table already populated; skipping seed");
    }

    Ok(report)
}
