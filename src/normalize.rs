//! Tag normalization for metaprobe.
//!
//! This module turns a merged raw tag map into the canonical metadata record:
//! every value is cleaned and type-coerced (see `value`), null and empty
//! values are dropped, and a handful of derived fields are computed from
//! whatever survived. The output map is lexically ordered so records are
//! deterministic and diffable.
//!
//! Derived fields never overwrite a key the decoders already supplied.

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::value::{MetaValue, MetadataRecord, RawTagMap};

/// Canonical aspect ratios and their display names. A derived ratio only
/// gets a name when the nearest entry is within 5% relative tolerance.
const COMMON_RATIOS: &[(f64, &str)] = &[
    (1.0, "1:1 (Square)"),
    (1.33, "4:3"),
    (1.5, "3:2"),
    (1.78, "16:9"),
    (1.85, "1.85:1 (Cinema)"),
    (2.35, "2.35:1 (Cinemascope)"),
    (0.75, "3:4 (Portrait)"),
    (0.67, "2:3 (Portrait)"),
    (0.56, "9:16 (Portrait)"),
];

/// EXIF-style date formats, tried in order; first match wins.
const DATE_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_ONLY_FORMATS: &[&str] = &["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d"];

/// Source key → derived key pairs for human-formatted dates.
const DATE_DERIVATIONS: &[(&str, &str)] = &[
    ("DateTimeOriginal", "DateTaken"),
    ("CreateDate", "DateCreated"),
    ("ModifyDate", "DateModified"),
];

/// Clean and type-coerce a merged raw tag map into the canonical record.
///
/// Per-value failures (undecodable bytes, empty containers) drop the value
/// and continue; this function never fails as a whole.
pub fn normalize(merged_raw: &RawTagMap) -> MetadataRecord {
    let mut record = MetadataRecord::new();

    for (key, value) in merged_raw {
        match value.clean() {
            Some(cleaned) => {
                record.insert(key.clone(), cleaned);
            }
            None => debug!("Dropping empty/undecodable tag: {}", key),
        }
    }

    add_derived_fields(&mut record);
    record
}

/// Compute derived fields from keys already present in the record.
fn add_derived_fields(record: &mut MetadataRecord) {
    add_dimension_fields(record);
    add_date_fields(record);
    add_camera_info(record);
    add_exposure_info(record);
}

fn add_dimension_fields(record: &mut MetadataRecord) {
    let width = record.get("ImageWidth").and_then(|v| v.as_f64());
    let height = record.get("ImageHeight").and_then(|v| v.as_f64());

    let (Some(width), Some(height)) = (width, height) else {
        return;
    };
    if width <= 0.0 || height <= 0.0 {
        return;
    }

    let aspect_ratio = width / height;
    if !record.contains_key("AspectRatio") {
        record.insert(
            "AspectRatio".to_string(),
            MetaValue::Float(round_to(aspect_ratio, 3)),
        );
    }

    if !record.contains_key("AspectRatioName") {
        if let Some(name) = ratio_name(aspect_ratio) {
            record.insert("AspectRatioName".to_string(), name.into());
        }
    }

    if !record.contains_key("Megapixels") {
        let megapixels = (width * height) / 1_000_000.0;
        record.insert(
            "Megapixels".to_string(),
            MetaValue::Float(round_to(megapixels, 2)),
        );
    }
}

/// Name of the nearest canonical ratio, if within 5% relative tolerance.
fn ratio_name(aspect_ratio: f64) -> Option<&'static str> {
    let (closest, name) = COMMON_RATIOS
        .iter()
        .min_by(|(a, _), (b, _)| {
            (a - aspect_ratio)
                .abs()
                .total_cmp(&(b - aspect_ratio).abs())
        })
        .copied()?;

    if ((closest - aspect_ratio) / closest).abs() < 0.05 {
        Some(name)
    } else {
        None
    }
}

fn add_date_fields(record: &mut MetadataRecord) {
    for (source_key, target_key) in DATE_DERIVATIONS {
        if record.contains_key(*target_key) {
            continue;
        }
        let Some(date_str) = record.get(*source_key).and_then(|v| v.as_str()) else {
            continue;
        };
        if let Some(formatted) = parse_exif_date(date_str) {
            record.insert(target_key.to_string(), formatted.into());
        }
    }
}

/// Parse an EXIF-style date string against the fixed format list and render
/// it as `%Y-%m-%d %H:%M:%S`. Date-only inputs get a midnight time.
pub fn parse_exif_date(date_str: &str) -> Option<String> {
    let date_str = date_str.trim();

    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    for format in DATE_ONLY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, format) {
            let dt = date.and_hms_opt(0, 0, 0)?;
            return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }

    None
}

fn add_camera_info(record: &mut MetadataRecord) {
    if record.contains_key("CameraInfo") {
        return;
    }

    let parts: Vec<String> = ["Make", "Model", "Software"]
        .iter()
        .filter_map(|key| record.get(*key).map(|v| v.to_string()))
        .collect();

    if !parts.is_empty() {
        record.insert("CameraInfo".to_string(), parts.join(" - ").into());
    }
}

fn add_exposure_info(record: &mut MetadataRecord) {
    if record.contains_key("ExposureInfo") {
        return;
    }

    let mut parts = Vec::new();

    if let Some(value) = record.get("FNumber") {
        match value.as_f64() {
            Some(f) => parts.push(format!("F-Stop: f/{}", trim_float(f))),
            None => parts.push(format!("F-Stop: {}", value)),
        }
    }

    if let Some(value) = record.get("ExposureTime") {
        match value.as_f64() {
            Some(t) => parts.push(format!("Exposure Time: {}", format_exposure_time(t))),
            None => parts.push(format!("Exposure Time: {}", value)),
        }
    }

    if let Some(value) = record.get("ISOSpeedRatings") {
        parts.push(format!("ISO: {}", value));
    }

    if let Some(value) = record.get("FocalLength") {
        match value.as_f64() {
            Some(f) => parts.push(format!("Focal Length: {}mm", trim_float(f))),
            None => parts.push(format!("Focal Length: {}", value)),
        }
    }

    if !parts.is_empty() {
        record.insert("ExposureInfo".to_string(), parts.join(", ").into());
    }
}

/// Format an exposure time in seconds: sub-second values become the nearest
/// `1/<n>s` fraction, everything else is rendered as plain seconds.
pub fn format_exposure_time(seconds: f64) -> String {
    if seconds > 0.0 && seconds < 1.0 {
        format!("1/{}s", (1.0 / seconds).round() as i64)
    } else {
        format!("{}s", trim_float(seconds))
    }
}

pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Render a float without a trailing ".0" so `f/2.0` reads as `f/2`.
pub(crate) fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
