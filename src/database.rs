//! Device database for metaprobe.
//!
//! A JSON file with four categories (cameras, phones, lenses, software),
//! each mapping a stable id to an entry of known specifications. The
//! database is loaded once at startup and treated as read-only during
//! extraction; the update path merges new entries and persists the result,
//! and must not run while extractions are in flight.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::similarity::SimilarityStrategy;
use crate::value::{MetaValue, MetadataRecord};

/// A known camera, phone, or lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeviceEntry {
    pub make: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub megapixels: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens_mount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DeviceEntry {
    /// Map database fields to the output keys used in a device profile.
    pub fn to_profile_fields(&self) -> MetadataRecord {
        let mut fields = MetadataRecord::new();

        let mut put = |key: &str, value: Option<&String>| {
            if let Some(v) = value {
                if !v.is_empty() {
                    fields.insert(key.to_string(), v.clone().into());
                }
            }
        };

        put("Manufacturer", Some(&self.make));
        put("FullModel", Some(&self.model));
        put("ReleaseDate", self.release_date.as_ref());
        put("SensorType", self.sensor_type.as_ref());
        put("SensorSize", self.sensor_size.as_ref());
        put("MaxResolution", self.max_resolution.as_ref());
        put("LensMount", self.lens_mount.as_ref());
        put("ScreenSize", self.screen_size.as_ref());
        put("OperatingSystem", self.os.as_ref());
        put("Processor", self.cpu.as_ref());
        put("Storage", self.storage.as_ref());
        put("Battery", self.battery.as_ref());
        put("Weight", self.weight.as_ref());
        put("Dimensions", self.dimensions.as_ref());
        put("Price", self.price.as_ref());
        put("ProductURL", self.url.as_ref());

        if let Some(mp) = self.megapixels {
            fields.insert("Megapixels".to_string(), MetaValue::Float(mp));
        }

        fields
    }
}

/// A known image-processing application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SoftwareEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Which device category a lookup or search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCategory {
    Cameras,
    Phones,
    Lenses,
    Software,
}

impl DeviceCategory {
    pub fn device_type(&self) -> &'static str {
        match self {
            DeviceCategory::Cameras => "Camera",
            DeviceCategory::Phones => "Smartphone",
            DeviceCategory::Lenses => "Camera Lens",
            DeviceCategory::Software => "Software",
        }
    }
}

/// The loaded device database.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeviceDatabase {
    #[serde(default)]
    pub cameras: BTreeMap<String, DeviceEntry>,
    #[serde(default)]
    pub phones: BTreeMap<String, DeviceEntry>,
    #[serde(default)]
    pub lenses: BTreeMap<String, DeviceEntry>,
    #[serde(default)]
    pub software: BTreeMap<String, SoftwareEntry>,
}

impl DeviceDatabase {
    /// Load the database from a JSON file.
    ///
    /// A missing file yields an empty database with a warning; a present but
    /// malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Device database not found at {}, starting empty", path.display());
            return Ok(DeviceDatabase::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read device database from {}", path.display()))?;
        let db: DeviceDatabase = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse device database at {}", path.display()))?;

        debug!(
            "Loaded device database: {} cameras, {} phones, {} lenses, {} software",
            db.cameras.len(),
            db.phones.len(),
            db.lenses.len(),
            db.software.len()
        );
        Ok(db)
    }

    /// Write the database back to disk as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize device database")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write device database to {}", path.display()))?;

        info!("Device database saved to {}", path.display());
        Ok(())
    }

    /// Merge another database into this one and persist the result.
    ///
    /// Incoming entries replace existing entries with the same id. Must not
    /// run concurrently with extraction reads.
    pub fn update_and_persist(&mut self, incoming: DeviceDatabase, path: &Path) -> Result<()> {
        self.cameras.extend(incoming.cameras);
        self.phones.extend(incoming.phones);
        self.lenses.extend(incoming.lenses);
        self.software.extend(incoming.software);
        self.save(path)
    }

    /// Entry counts per category plus a total.
    pub fn stats(&self) -> BTreeMap<String, usize> {
        let mut stats = BTreeMap::new();
        stats.insert("cameras".to_string(), self.cameras.len());
        stats.insert("phones".to_string(), self.phones.len());
        stats.insert("lenses".to_string(), self.lenses.len());
        stats.insert("software".to_string(), self.software.len());
        stats.insert(
            "total".to_string(),
            self.cameras.len() + self.phones.len() + self.lenses.len() + self.software.len(),
        );
        stats
    }

    fn category_entries(&self, category: DeviceCategory) -> Option<&BTreeMap<String, DeviceEntry>> {
        match category {
            DeviceCategory::Cameras => Some(&self.cameras),
            DeviceCategory::Phones => Some(&self.phones),
            DeviceCategory::Lenses => Some(&self.lenses),
            DeviceCategory::Software => None,
        }
    }

    /// Find the database entry for a make/model pair.
    ///
    /// Three tiers, first success wins: exact case-insensitive match, exact
    /// make with fuzzy model (containment either way or similarity > 0.8),
    /// then weighted similarity over the whole category
    /// (`0.4 * make + 0.6 * model`, accepted above 0.7).
    pub fn lookup(
        &self,
        make: &str,
        model: &str,
        category: DeviceCategory,
        similarity: SimilarityStrategy,
    ) -> Option<&DeviceEntry> {
        let entries = self.category_entries(category)?;
        if make.is_empty() || model.is_empty() {
            return None;
        }

        let make_lower = make.to_lowercase();
        let model_lower = model.to_lowercase();

        for entry in entries.values() {
            if entry.make.to_lowercase() == make_lower && entry.model.to_lowercase() == model_lower
            {
                return Some(entry);
            }
        }

        for entry in entries.values() {
            let db_make = entry.make.to_lowercase();
            let db_model = entry.model.to_lowercase();
            if db_make == make_lower
                && (db_model.contains(&model_lower)
                    || model_lower.contains(&db_model)
                    || similarity.score(&db_model, &model_lower) > 0.8)
            {
                return Some(entry);
            }
        }

        let mut best: Option<(&DeviceEntry, f64)> = None;
        for entry in entries.values() {
            let make_score = similarity.score(&entry.make, &make_lower);
            let model_score = similarity.score(&entry.model, &model_lower);
            let combined = make_score * 0.4 + model_score * 0.6;
            if combined > 0.7 && best.is_none_or(|(_, score)| combined > score) {
                best = Some((entry, combined));
            }
        }

        best.map(|(entry, _)| entry)
    }

    /// Look up a processing application by name (exact or containment).
    pub fn software_lookup(&self, name: &str) -> Option<&SoftwareEntry> {
        let name_lower = name.to_lowercase();
        self.software.values().find(|entry| {
            let db_name = entry.name.to_lowercase();
            db_name == name_lower || name_lower.contains(&db_name) || db_name.contains(&name_lower)
        })
    }

    /// Search the database by free-text query, optionally restricted to one
    /// category. Results are sorted by relevance and capped at 20.
    pub fn search(&self, query: &str, category: Option<DeviceCategory>) -> Vec<MetadataRecord> {
        if query.is_empty() {
            return Vec::new();
        }
        let query = query.to_lowercase();

        let categories = match category {
            Some(c) => vec![c],
            None => vec![
                DeviceCategory::Cameras,
                DeviceCategory::Phones,
                DeviceCategory::Lenses,
            ],
        };

        let mut results = Vec::new();
        for cat in categories {
            let Some(entries) = self.category_entries(cat) else {
                continue;
            };
            for entry in entries.values() {
                let make = entry.make.to_lowercase();
                let model = entry.model.to_lowercase();
                let combined = format!("{} {}", make, model);
                if make.contains(&query) || model.contains(&query) || combined.contains(&query) {
                    let mut result = entry.to_profile_fields();
                    result.insert("DeviceType".to_string(), cat.device_type().into());
                    results.push(result);
                }
            }
        }

        results.sort_by(|a, b| {
            search_relevance(b, &query).total_cmp(&search_relevance(a, &query))
        });
        results.truncate(20);
        results
    }
}

/// Relevance score for a search hit: exact and partial name matches,
/// plus a small recency bonus for newer release dates.
fn search_relevance(result: &MetadataRecord, query: &str) -> f64 {
    let mut score = 0.0;

    if let Some(manufacturer) = result.get("Manufacturer").and_then(|v| v.as_str()) {
        let manufacturer = manufacturer.to_lowercase();
        if query == manufacturer {
            score += 3.0;
        } else if manufacturer.contains(query) {
            score += 1.5;
        }
    }

    if let Some(model) = result.get("FullModel").and_then(|v| v.as_str()) {
        let model = model.to_lowercase();
        if query == model {
            score += 5.0;
        } else if model.contains(query) {
            score += 2.5;
        } else if query.contains(&model) {
            score += 1.0;
        }
    }

    if let Some(release) = result.get("ReleaseDate").and_then(|v| v.as_str()) {
        if let Some(year) = release
            .split(|c: char| !c.is_ascii_digit())
            .find(|part| part.len() == 4)
            .and_then(|part| part.parse::<i64>().ok())
        {
            score += (((year - 2000) as f64) / 10.0).clamp(0.0, 2.0);
        }
    }

    score
}
