//! First-matching-alias lookup.
//!
//! Decoders spell the same logical field many ways ("Make", "EXIF:Make",
//! "Image Make"). Every component that reads the record resolves such fields
//! through one shared helper: scan an ordered alias list and take the first
//! key present with a non-empty value.

use crate::value::{MetaValue, MetadataRecord};

/// Return the value of the first alias present in the record.
pub fn first_matching<'a>(record: &'a MetadataRecord, aliases: &[&str]) -> Option<&'a MetaValue> {
    aliases.iter().find_map(|key| record.get(*key))
}

/// Like [`first_matching`], but resolves to a cleaned, non-empty string.
pub fn first_matching_text(record: &MetadataRecord, aliases: &[&str]) -> Option<String> {
    for key in aliases {
        if let Some(value) = record.get(*key) {
            let text = value.to_string();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Like [`first_matching`], but resolves to a numeric value.
pub fn first_matching_number(record: &MetadataRecord, aliases: &[&str]) -> Option<f64> {
    aliases.iter().find_map(|key| record.get(*key).and_then(|v| v.as_f64()))
}
