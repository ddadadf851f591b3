//! Extraction orchestration for metaprobe.
//!
//! Ties the pipeline together: merge the raw tag maps delivered by the
//! per-format decoders (primary source wins on key collisions), normalize
//! the merged map, resolve GPS when GPS-like keys are present, and fold in
//! the device profile. The result is the final ordered metadata record.

use anyhow::{Result, bail};
use log::debug;

use crate::device::DeviceIdentifier;
use crate::geocode::GeocodingService;
use crate::gps::GpsResolver;
use crate::normalize::normalize;
use crate::value::{MetadataRecord, RawTagMap, raw_tag_map_from_json};

/// Runs the full extraction pipeline over decoder output.
pub struct Extractor {
    identifier: DeviceIdentifier,
    gps: GpsResolver,
}

impl Extractor {
    pub fn new(identifier: DeviceIdentifier, geocoder: Box<dyn GeocodingService>) -> Self {
        Extractor {
            identifier,
            gps: GpsResolver::new(geocoder),
        }
    }

    pub fn identifier(&self) -> &DeviceIdentifier {
        &self.identifier
    }

    /// Run the pipeline over sources in precedence order (primary first).
    pub fn extract(&mut self, sources: &[RawTagMap]) -> MetadataRecord {
        let merged = merge_sources(sources);
        let mut record = normalize(&merged);

        if GpsResolver::has_gps_like_keys(&record) {
            for (key, value) in self.gps.resolve(&record) {
                record.insert(key, value);
            }
        }

        let profile = self.identifier.profile(&record);
        for (key, value) in profile {
            record.entry(key).or_insert(value);
        }

        record
    }
}

/// Merge raw tag maps by precedence: the first source that defines a key
/// keeps it.
pub fn merge_sources(sources: &[RawTagMap]) -> RawTagMap {
    let mut merged = RawTagMap::new();
    for source in sources {
        for (key, value) in source {
            if merged.contains_key(key) {
                debug!("Dropping lower-precedence value for {}", key);
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Parse decoder output from JSON: either one tag mapping or an array of
/// mappings in precedence order.
pub fn sources_from_json(value: serde_json::Value) -> Result<Vec<RawTagMap>> {
    match value {
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                bail!("Invalid input: expected at least one tag mapping");
            }
            items.into_iter().map(raw_tag_map_from_json).collect()
        }
        other => Ok(vec![raw_tag_map_from_json(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DeviceDatabase, DeviceEntry};
    use crate::geocode::NullGeocodingService;
    use crate::value::{MetaValue, TagValue};

    fn raw(pairs: &[(&str, TagValue)]) -> RawTagMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn extractor() -> Extractor {
        let mut db = DeviceDatabase::default();
        db.phones.insert(
            "apple_iphone_12".to_string(),
            DeviceEntry {
                make: "Apple".to_string(),
                model: "iPhone 12".to_string(),
                os: Some("iOS".to_string()),
                ..Default::default()
            },
        );
        Extractor::new(DeviceIdentifier::new(db), Box::new(NullGeocodingService))
    }

    #[test]
    fn test_merge_primary_wins() {
        let primary = raw(&[("Make", TagValue::Text("Apple".into()))]);
        let secondary = raw(&[
            ("Make", TagValue::Text("SHOULD LOSE".into())),
            ("Model", TagValue::Text("iPhone 12".into())),
        ]);
        let merged = merge_sources(&[primary, secondary]);
        assert_eq!(merged.get("Make"), Some(&TagValue::Text("Apple".into())));
        assert_eq!(merged.get("Model"), Some(&TagValue::Text("iPhone 12".into())));
    }

    #[test]
    fn test_end_to_end_smartphone_with_gps() {
        let source = raw(&[
            ("GPS:GPSLatitude", TagValue::Float(40.7128)),
            ("GPS:GPSLatitudeRef", TagValue::Text("N".into())),
            ("GPS:GPSLongitude", TagValue::Float(74.0060)),
            ("GPS:GPSLongitudeRef", TagValue::Text("W".into())),
            ("Make", TagValue::Text("Apple".into())),
            ("Model", TagValue::Text("iPhone 12".into())),
        ]);
        let record = extractor().extract(&[source]);

        assert_eq!(record.get("Latitude"), Some(&MetaValue::Float(40.7128)));
        assert_eq!(record.get("Longitude"), Some(&MetaValue::Float(-74.0060)));
        assert_eq!(record.get("DeviceType"), Some(&"Smartphone".into()));
        assert_eq!(record.get("PrivacyRisk"), Some(&"High".into()));
    }

    #[test]
    fn test_profile_never_overwrites_extraction_fields() {
        // The record carries its own Manufacturer; the profile must not
        // replace it
        let source = raw(&[
            ("Make", TagValue::Text("fujifilm".into())),
            ("Model", TagValue::Text("X100V".into())),
            ("Manufacturer", TagValue::Text("As Extracted".into())),
        ]);
        let record = extractor().extract(&[source]);
        assert_eq!(record.get("Manufacturer"), Some(&"As Extracted".into()));
    }

    #[test]
    fn test_gps_skipped_without_gps_keys() {
        let source = raw(&[("Make", TagValue::Text("Canon".into()))]);
        let record = extractor().extract(&[source]);
        assert!(!record.contains_key("Latitude"));
        assert!(!record.contains_key("GoogleMapsURL"));
    }

    #[test]
    fn test_sources_from_json_object_and_array() {
        let single = sources_from_json(serde_json::json!({"Make": "Apple"})).unwrap();
        assert_eq!(single.len(), 1);

        let multi = sources_from_json(serde_json::json!([
            {"Make": "Apple"},
            {"Model": "iPhone 12"}
        ]))
        .unwrap();
        assert_eq!(multi.len(), 2);

        assert!(sources_from_json(serde_json::json!([])).is_err());
        assert!(sources_from_json(serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_record_is_ordered() {
        let source = raw(&[
            ("Model", TagValue::Text("iPhone 12".into())),
            ("Make", TagValue::Text("Apple".into())),
            ("ISOSpeedRatings", TagValue::Integer(32)),
        ]);
        let record = extractor().extract(&[source]);
        let keys: Vec<&String> = record.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
