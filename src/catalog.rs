// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Title catalog loading.
//!
//! The catalog is a JSON array of title records, loaded once at startup and
//! immutable afterwards.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TitleRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub year: Option<u32>,
}

pub struct Catalog {
    titles: Vec<TitleRecord>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {path:?}"))?;
        let titles: Vec<TitleRecord> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse catalog {path:?}"))?;
        let catalog = Self::from_records(titles)?;
        log::info!("loaded {} title(s) from {path:?}", catalog.len());
        Ok(catalog)
    }

    pub fn from_records(titles: Vec<TitleRecord>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(titles.len());
        for (idx, record) in titles.iter().enumerate() {
            if by_id.insert(record.id.clone(), idx).is_some() {
                anyhow::bail!("duplicate title id in catalog: {}", record.id);
            }
        }
        Ok(Self { titles, by_id })
    }

    pub fn titles(&self) -> &[TitleRecord] {
        &self.titles
    }

    pub fn get(&self, id: &str) -> Option<&TitleRecord> {
        self.by_id.get(id).map(|&idx| &self.titles[idx])
    }

    /// Display string for a title id; falls back to the id itself for titles
    /// the catalog does not know (e.g. the fallback image's title).
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|t| t.title.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
