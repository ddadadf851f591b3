//! GPS resolution for metaprobe.
//!
//! Raw metadata spells coordinates many different ways: EXIF rational
//! triples, XMP decimal strings, IPTC place names, or free-text fields with
//! embedded coordinates. The resolver detects which scheme is present,
//! decodes it to signed decimal degrees (south/west negative), and enriches
//! the result with DMS strings, a map URL, and a reverse-geocoded location
//! name.
//!
//! Detection runs over four mutually exclusive tiers in strict order; the
//! first tier with a matching key wins and later tiers are never consulted.

use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::alias::{first_matching, first_matching_number, first_matching_text};
use crate::geocode::{GeocodingService, Location};
use crate::value::{MetaValue, MetadataRecord};

const EXIF_LAT_KEYS: &[&str] = &[
    "GPS:GPSLatitude",
    "GPSLatitude",
    "GPS GPSLatitude",
    "EXIF:GPSLatitude",
];
const EXIF_LON_KEYS: &[&str] = &[
    "GPS:GPSLongitude",
    "GPSLongitude",
    "GPS GPSLongitude",
    "EXIF:GPSLongitude",
];
const EXIF_LAT_REF_KEYS: &[&str] = &[
    "GPS:GPSLatitudeRef",
    "GPSLatitudeRef",
    "GPS GPSLatitudeRef",
    "EXIF:GPSLatitudeRef",
];
const EXIF_LON_REF_KEYS: &[&str] = &[
    "GPS:GPSLongitudeRef",
    "GPSLongitudeRef",
    "GPS GPSLongitudeRef",
    "EXIF:GPSLongitudeRef",
];
const EXIF_ALT_KEYS: &[&str] = &[
    "GPS:GPSAltitude",
    "GPSAltitude",
    "GPS GPSAltitude",
    "EXIF:GPSAltitude",
];
const EXIF_ALT_REF_KEYS: &[&str] = &[
    "GPS:GPSAltitudeRef",
    "GPSAltitudeRef",
    "GPS GPSAltitudeRef",
    "EXIF:GPSAltitudeRef",
];

const XMP_LAT_KEYS: &[&str] = &["XMP:GPSLatitude", "XMP:Latitude", "XMP-exif:GPSLatitude"];
const XMP_LON_KEYS: &[&str] = &["XMP:GPSLongitude", "XMP:Longitude", "XMP-exif:GPSLongitude"];
const XMP_ALT_KEYS: &[&str] = &["XMP:GPSAltitude", "XMP:Altitude", "XMP-exif:GPSAltitude"];

const IPTC_LOCATION_KEYS: &[&str] = &[
    "IPTC:City",
    "IPTC:Province-State",
    "IPTC:Country",
    "IPTC:Sub-location",
    "IPTC:LocationCode",
    "IPTC:LocationName",
];

/// Decimal coordinate pair like "12.345, -67.890"
static DECIMAL_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+\.\d+)\s*,\s*(-?\d+\.\d+)").unwrap()
});

/// DMS coordinate pair like `12° 34' 56" N, 67° 89' 12" W`
static DMS_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\d+)°\s*(\d+)['′]?\s*(\d+(?:\.\d+)?)["″]?\s*([NS])\s*,\s*(\d+)°\s*(\d+)['′]?\s*(\d+(?:\.\d+)?)["″]?\s*([EW])"#,
    )
    .unwrap()
});

/// Single DMS coordinate like `12° 34' 56" N`
static DMS_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+)°\s*(\d+)['′]?\s*(\d+(?:\.\d+)?)["″]?\s*([NSEW])"#).unwrap()
});

/// Degrees-only coordinate like `12.345° N`
static DEGREES_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)°\s*([NSEW])").unwrap());

/// Resolves GPS information from a normalized metadata record.
///
/// Holds the reverse-geocoding collaborator and a per-instance cache of
/// geocoding results keyed by coordinates rounded to 6 decimal places.
pub struct GpsResolver {
    geocoder: Box<dyn GeocodingService>,
    cache: HashMap<String, Option<Location>>,
}

impl GpsResolver {
    pub fn new(geocoder: Box<dyn GeocodingService>) -> Self {
        GpsResolver {
            geocoder,
            cache: HashMap::new(),
        }
    }

    /// True when the record carries any key a tier could match on.
    pub fn has_gps_like_keys(record: &MetadataRecord) -> bool {
        has_any_key(record, EXIF_LAT_KEYS)
            || has_any_key(record, EXIF_LON_KEYS)
            || has_any_key(record, XMP_LAT_KEYS)
            || has_any_key(record, XMP_LON_KEYS)
            || has_any_key(record, IPTC_LOCATION_KEYS)
            || record.keys().any(|k| is_gps_like_key(k))
    }

    /// Resolve GPS information from the record.
    ///
    /// Returns a map of GPS output fields, empty when no tier matched or the
    /// matched tier's values could not be decoded.
    pub fn resolve(&mut self, record: &MetadataRecord) -> MetadataRecord {
        let mut gps_info = if has_any_key(record, EXIF_LAT_KEYS)
            || has_any_key(record, EXIF_LON_KEYS)
        {
            debug!("GPS detection: EXIF tier matched");
            self.parse_exif_gps(record)
        } else if has_any_key(record, XMP_LAT_KEYS) || has_any_key(record, XMP_LON_KEYS) {
            debug!("GPS detection: XMP tier matched");
            parse_xmp_gps(record)
        } else if has_any_key(record, IPTC_LOCATION_KEYS) {
            debug!("GPS detection: IPTC tier matched");
            parse_iptc_location(record)
        } else {
            parse_generic_gps(record)
        };

        let lat = gps_info.get("Latitude").and_then(|v| v.as_f64());
        let lon = gps_info.get("Longitude").and_then(|v| v.as_f64());
        if let (Some(lat), Some(lon)) = (lat, lon) {
            self.enrich_coordinates(&mut gps_info, lat, lon);
        }

        gps_info
    }

    fn parse_exif_gps(&self, record: &MetadataRecord) -> MetadataRecord {
        let mut gps_info = MetadataRecord::new();

        let lat = extract_coordinate(record, EXIF_LAT_KEYS);
        let lon = extract_coordinate(record, EXIF_LON_KEYS);
        let lat_ref = extract_ref(record, EXIF_LAT_REF_KEYS, "N");
        let lon_ref = extract_ref(record, EXIF_LON_REF_KEYS, "E");

        if let Some(lat) = lat {
            let signed = if lat_ref == "N" { lat } else { -lat };
            gps_info.insert("Latitude".to_string(), MetaValue::Float(signed));
        }
        if let Some(lon) = lon {
            let signed = if lon_ref == "E" { lon } else { -lon };
            gps_info.insert("Longitude".to_string(), MetaValue::Float(signed));
        }

        if let Some(alt) = extract_altitude(record, EXIF_ALT_KEYS, Some(EXIF_ALT_REF_KEYS)) {
            gps_info.insert("Altitude".to_string(), MetaValue::Float(alt));
        }

        extract_additional_gps_info(record, &mut gps_info);
        gps_info
    }

    fn enrich_coordinates(&mut self, gps_info: &mut MetadataRecord, lat: f64, lon: f64) {
        let formatted = format!("{}, {}", lat, lon);
        gps_info.insert("Location".to_string(), formatted.clone().into());
        gps_info.insert("Coordinates".to_string(), formatted.into());

        gps_info.insert("LatitudeDMS".to_string(), decimal_to_dms(lat, true).into());
        gps_info.insert("LongitudeDMS".to_string(), decimal_to_dms(lon, false).into());

        gps_info.insert(
            "GoogleMapsURL".to_string(),
            format!("https://www.google.com/maps/search/?api=1&query={},{}", lat, lon).into(),
        );

        if let Some(location) = self.cached_reverse_geocode(lat, lon) {
            if let Some(city) = &location.city {
                gps_info.insert("City".to_string(), city.clone().into());
            }
            if let Some(county) = &location.county {
                gps_info.insert("County".to_string(), county.clone().into());
            }
            if let Some(state) = &location.state {
                gps_info.insert("State".to_string(), state.clone().into());
            }
            if let Some(country) = &location.country {
                gps_info.insert("Country".to_string(), country.clone().into());
            }
            if let Some(code) = &location.country_code {
                gps_info.insert("CountryCode".to_string(), code.clone().into());
            }
            if !location.formatted_address.is_empty() {
                gps_info.insert(
                    "LocationName".to_string(),
                    location.formatted_address.clone().into(),
                );
            }
        }
    }

    /// Best-effort reverse geocoding; failures log and resolve to nothing.
    fn cached_reverse_geocode(&mut self, lat: f64, lon: f64) -> Option<Location> {
        let cache_key = format!("{:.6},{:.6}", lat, lon);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Geocoding cache hit for {}", cache_key);
            return cached.clone();
        }

        let result = match self.geocoder.reverse_geocode(lat, lon) {
            Ok(location) => location,
            Err(e) => {
                warn!("Reverse geocoding failed for {}: {}", cache_key, e);
                None
            }
        };

        self.cache.insert(cache_key, result.clone());
        result
    }
}

fn has_any_key(record: &MetadataRecord, keys: &[&str]) -> bool {
    keys.iter().any(|k| record.contains_key(*k))
}

fn is_gps_like_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("gps") || lower.contains("location") || lower.contains("coordinates")
}

/// Decode a coordinate value from the first matching alias.
///
/// Accepts plain numbers, numeric strings, DMS strings, 3-element
/// degree/minute/second sequences, and mappings with `degrees`/`minutes`/
/// `seconds` keys.
fn extract_coordinate(record: &MetadataRecord, keys: &[&str]) -> Option<f64> {
    let value = first_matching(record, keys)?;
    decode_coordinate(value)
}

fn decode_coordinate(value: &MetaValue) -> Option<f64> {
    match value {
        MetaValue::Integer(n) => Some(*n as f64),
        MetaValue::Float(n) => Some(*n),
        MetaValue::Text(s) => {
            if let Ok(n) = s.trim().parse::<f64>() {
                Some(n)
            } else {
                dms_to_decimal(s).ok()
            }
        }
        MetaValue::List(items) if items.len() == 3 => {
            let degrees = items[0].as_f64()?;
            let minutes = items[1].as_f64()?;
            let seconds = items[2].as_f64()?;
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        MetaValue::Record(map) => {
            let degrees = map.get("degrees")?.as_f64()?;
            let minutes = map.get("minutes")?.as_f64()?;
            let seconds = map.get("seconds")?.as_f64()?;
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        _ => None,
    }
}

/// Extract a hemisphere reference, defaulting when absent or unrecognized.
fn extract_ref(record: &MetadataRecord, keys: &[&str], default: &str) -> String {
    for key in keys {
        if let Some(MetaValue::Text(s)) = record.get(*key) {
            let trimmed = s.trim();
            if matches!(trimmed, "N" | "S" | "E" | "W") {
                return trimmed.to_string();
            }
        }
    }
    default.to_string()
}

/// Extract altitude in meters. An altitude reference of `1` means below sea
/// level and negates the value; any other or absent reference means above.
fn extract_altitude(
    record: &MetadataRecord,
    alt_keys: &[&str],
    ref_keys: Option<&[&str]>,
) -> Option<f64> {
    let mut altitude = None;
    for key in alt_keys {
        match record.get(*key) {
            Some(MetaValue::Integer(n)) => {
                altitude = Some(*n as f64);
                break;
            }
            Some(MetaValue::Float(n)) => {
                altitude = Some(*n);
                break;
            }
            Some(MetaValue::Text(s)) => {
                if let Ok(n) = s.replace('m', "").trim().parse::<f64>() {
                    altitude = Some(n);
                    break;
                }
            }
            _ => {}
        }
    }
    let altitude = altitude?;

    let below_sea_level = ref_keys.is_some_and(|keys| {
        first_matching(record, keys).is_some_and(|v| match v {
            MetaValue::Integer(1) => true,
            MetaValue::Text(s) => s.trim() == "1",
            _ => false,
        })
    });

    Some(if below_sea_level { -altitude } else { altitude })
}

/// Timestamp, date, heading, and speed fields that ride along with EXIF GPS.
fn extract_additional_gps_info(record: &MetadataRecord, gps_info: &mut MetadataRecord) {
    let timestamp_keys = [
        "GPS:GPSTimeStamp",
        "GPSTimeStamp",
        "GPS GPSTimeStamp",
        "EXIF:GPSTimeStamp",
    ];
    for key in timestamp_keys {
        match record.get(key) {
            Some(MetaValue::Text(s)) => {
                gps_info.insert("GPSTimeStamp".to_string(), s.clone().into());
                break;
            }
            Some(MetaValue::List(items)) if items.len() == 3 => {
                let parts: Option<Vec<i64>> = items.iter().map(|v| v.as_i64()).collect();
                if let Some(parts) = parts {
                    gps_info.insert(
                        "GPSTimeStamp".to_string(),
                        format!("{:02}:{:02}:{:02}", parts[0], parts[1], parts[2]).into(),
                    );
                    break;
                }
            }
            _ => {}
        }
    }

    let date_keys = [
        "GPS:GPSDateStamp",
        "GPSDateStamp",
        "GPS GPSDateStamp",
        "EXIF:GPSDateStamp",
    ];
    if let Some(date) = first_matching_text(record, &date_keys) {
        gps_info.insert("GPSDateStamp".to_string(), date.into());
    }

    let direction_keys = [
        "GPS:GPSImgDirection",
        "GPSImgDirection",
        "GPS GPSImgDirection",
        "EXIF:GPSImgDirection",
    ];
    if let Some(direction) = first_matching_number(record, &direction_keys) {
        gps_info.insert("GPSDirection".to_string(), MetaValue::Float(direction));
    }

    let speed_keys = ["GPS:GPSSpeed", "GPSSpeed", "GPS GPSSpeed", "EXIF:GPSSpeed"];
    if let Some(speed) = first_matching_number(record, &speed_keys) {
        gps_info.insert("GPSSpeed".to_string(), MetaValue::Float(speed));
    }

    let speed_ref_keys = [
        "GPS:GPSSpeedRef",
        "GPSSpeedRef",
        "GPS GPSSpeedRef",
        "EXIF:GPSSpeedRef",
    ];
    if let Some(speed_ref) = first_matching_text(record, &speed_ref_keys) {
        let unit = match speed_ref.as_str() {
            "K" => Some("km/h"),
            "M" => Some("mph"),
            "N" => Some("knots"),
            _ => None,
        };
        if let Some(unit) = unit {
            gps_info.insert("GPSSpeedRef".to_string(), unit.into());
        }
    }
}

fn parse_xmp_gps(record: &MetadataRecord) -> MetadataRecord {
    let mut gps_info = MetadataRecord::new();

    // XMP carries signed decimals, no separate hemisphere reference
    if let Some(lat) = extract_coordinate(record, XMP_LAT_KEYS) {
        gps_info.insert("Latitude".to_string(), MetaValue::Float(lat));
    }
    if let Some(lon) = extract_coordinate(record, XMP_LON_KEYS) {
        gps_info.insert("Longitude".to_string(), MetaValue::Float(lon));
    }
    if let Some(alt) = extract_altitude(record, XMP_ALT_KEYS, None) {
        gps_info.insert("Altitude".to_string(), MetaValue::Float(alt));
    }

    gps_info
}

/// IPTC has no coordinates, only textual place components.
fn parse_iptc_location(record: &MetadataRecord) -> MetadataRecord {
    let mut location_info = MetadataRecord::new();
    let mut components = Vec::new();

    if let Some(sub) = first_matching_text(record, &["IPTC:Sub-location", "IPTC:Sublocation"]) {
        components.push(sub.clone());
        location_info.insert("Sublocation".to_string(), sub.into());
    }
    if let Some(city) = first_matching_text(record, &["IPTC:City"]) {
        components.push(city.clone());
        location_info.insert("City".to_string(), city.into());
    }
    if let Some(state) =
        first_matching_text(record, &["IPTC:Province-State", "IPTC:State", "IPTC:Province"])
    {
        components.push(state.clone());
        location_info.insert("State".to_string(), state.into());
    }
    if let Some(country) = first_matching_text(record, &["IPTC:Country"]) {
        components.push(country.clone());
        location_info.insert("Country".to_string(), country.into());
    }

    if !components.is_empty() {
        location_info.insert("LocationName".to_string(), components.join(", ").into());
    }

    location_info
}

/// Scan for any key whose name looks GPS-like and try to pull a coordinate
/// pair out of its string value. Loose by design of the matching rule; kept
/// for compatibility with records from unknown sources.
fn parse_generic_gps(record: &MetadataRecord) -> MetadataRecord {
    let mut gps_info = MetadataRecord::new();

    for (key, value) in record {
        let MetaValue::Text(text) = value else {
            continue;
        };
        if !is_gps_like_key(key) {
            continue;
        }
        if let Some((lat, lon)) = extract_coordinates_from_string(text) {
            debug!("Generic GPS scan matched key {}", key);
            gps_info.insert("Latitude".to_string(), MetaValue::Float(lat));
            gps_info.insert("Longitude".to_string(), MetaValue::Float(lon));
            break;
        }
    }

    gps_info
}

/// Pull a coordinate pair out of free text: decimal pair first, DMS pair as
/// the fallback. Out-of-range candidates are rejected.
pub fn extract_coordinates_from_string(text: &str) -> Option<(f64, f64)> {
    if let Some(caps) = DECIMAL_PAIR_RE.captures(text) {
        if let Some(pair) = decode_decimal_pair(&caps) {
            return Some(pair);
        }
    }

    DMS_PAIR_RE.captures(text).and_then(|caps| decode_dms_pair(&caps))
}

/// Extract every coordinate pair found in a text string: all decimal pairs,
/// then all DMS pairs, each validated against coordinate ranges.
pub fn extract_coordinates_from_text(text: &str) -> Vec<(f64, f64)> {
    let mut coordinates = Vec::new();

    for caps in DECIMAL_PAIR_RE.captures_iter(text) {
        if let Some(pair) = decode_decimal_pair(&caps) {
            coordinates.push(pair);
        }
    }

    for caps in DMS_PAIR_RE.captures_iter(text) {
        if let Some(pair) = decode_dms_pair(&caps) {
            coordinates.push(pair);
        }
    }

    coordinates
}

fn decode_decimal_pair(caps: &regex::Captures) -> Option<(f64, f64)> {
    let lat: f64 = caps[1].parse().ok()?;
    let lon: f64 = caps[2].parse().ok()?;
    if is_valid_coordinate(lat, lon) {
        Some((lat, lon))
    } else {
        None
    }
}

fn decode_dms_pair(caps: &regex::Captures) -> Option<(f64, f64)> {
    let lat_deg: f64 = caps[1].parse().ok()?;
    let lat_min: f64 = caps[2].parse().ok()?;
    let lat_sec: f64 = caps[3].parse().ok()?;
    let mut lat = lat_deg + lat_min / 60.0 + lat_sec / 3600.0;
    if &caps[4] == "S" {
        lat = -lat;
    }

    let lon_deg: f64 = caps[5].parse().ok()?;
    let lon_min: f64 = caps[6].parse().ok()?;
    let lon_sec: f64 = caps[7].parse().ok()?;
    let mut lon = lon_deg + lon_min / 60.0 + lon_sec / 3600.0;
    if &caps[8] == "W" {
        lon = -lon;
    }

    if is_valid_coordinate(lat, lon) {
        Some((lat, lon))
    } else {
        None
    }
}

/// Convert signed decimal degrees to a DMS string like `40° 26' 46.00" N`.
pub fn decimal_to_dms(coord: f64, is_latitude: bool) -> String {
    let direction = if is_latitude {
        if coord >= 0.0 { "N" } else { "S" }
    } else if coord >= 0.0 {
        "E"
    } else {
        "W"
    };

    let coord = coord.abs();
    let degrees = coord.trunc() as i64;
    let minutes_float = (coord - degrees as f64) * 60.0;
    let minutes = minutes_float.trunc() as i64;
    let seconds = (minutes_float - minutes as f64) * 60.0;

    format!("{}° {}' {:.2}\" {}", degrees, minutes, seconds, direction)
}

/// Parse a DMS string back to signed decimal degrees.
///
/// Tries full DMS, then degrees-with-direction, then a bare decimal.
pub fn dms_to_decimal(dms_str: &str) -> anyhow::Result<f64> {
    if let Some(caps) = DMS_SINGLE_RE.captures(dms_str) {
        let degrees: f64 = caps[1].parse()?;
        let minutes: f64 = caps[2].parse()?;
        let seconds: f64 = caps[3].parse()?;
        let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;
        if matches!(&caps[4], "S" | "W") {
            decimal = -decimal;
        }
        return Ok(decimal);
    }

    if let Some(caps) = DEGREES_ONLY_RE.captures(dms_str) {
        let mut degrees: f64 = caps[1].parse()?;
        if matches!(&caps[2], "S" | "W") {
            degrees = -degrees;
        }
        return Ok(degrees);
    }

    dms_str
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow::anyhow!("Could not parse DMS coordinate: {}", dms_str))
}

/// Render a coordinate pair in the common display formats: signed decimal,
/// DMS, degrees-decimal-minutes, and map links.
pub fn format_coordinates(latitude: f64, longitude: f64) -> MetadataRecord {
    let mut formats = MetadataRecord::new();
    formats.insert(
        "Decimal".to_string(),
        MetaValue::Text(format!("{}, {}", latitude, longitude)),
    );
    formats.insert(
        "DMS".to_string(),
        MetaValue::Text(format!(
            "{}, {}",
            decimal_to_dms(latitude, true),
            decimal_to_dms(longitude, false)
        )),
    );
    formats.insert(
        "DDM".to_string(),
        MetaValue::Text(format!(
            "{}, {}",
            decimal_to_ddm(latitude, true),
            decimal_to_ddm(longitude, false)
        )),
    );
    formats.insert(
        "GoogleMapsURL".to_string(),
        MetaValue::Text(format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            latitude, longitude
        )),
    );
    formats.insert(
        "OpenStreetMapURL".to_string(),
        MetaValue::Text(format!(
            "https://www.openstreetmap.org/?mlat={}&mlon={}&zoom=15",
            latitude, longitude
        )),
    );
    formats
}

fn decimal_to_ddm(coord: f64, is_latitude: bool) -> String {
    let direction = if is_latitude {
        if coord >= 0.0 { "N" } else { "S" }
    } else if coord >= 0.0 {
        "E"
    } else {
        "W"
    };

    let coord = coord.abs();
    let degrees = coord.trunc() as i64;
    let minutes = (coord - degrees as f64) * 60.0;

    format!("{}° {:.4}' {}", degrees, minutes, direction)
}

pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial bearing from point 1 to point 2, in degrees (0-360, 0 = North).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Map a bearing to one of eight cardinal sectors, each 45° wide and
/// centered on its direction (N spans 337.5°-22.5°).
pub fn cardinal_direction(bearing: f64) -> &'static str {
    const SECTORS: &[(f64, f64, &str)] = &[
        (22.5, 67.5, "NE"),
        (67.5, 112.5, "E"),
        (112.5, 157.5, "SE"),
        (157.5, 202.5, "S"),
        (202.5, 247.5, "SW"),
        (247.5, 292.5, "W"),
        (292.5, 337.5, "NW"),
    ];

    for (start, end, direction) in SECTORS {
        if *start <= bearing && bearing < *end {
            return direction;
        }
    }
    "N"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{NullGeocodingService, OfflineGeocodingService};

    fn record_with(pairs: &[(&str, MetaValue)]) -> MetadataRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn resolver() -> GpsResolver {
        GpsResolver::new(Box::new(NullGeocodingService))
    }

    #[test]
    fn test_exif_gps_with_references() {
        let record = record_with(&[
            ("GPS:GPSLatitude", MetaValue::Float(40.7128)),
            ("GPS:GPSLatitudeRef", "N".into()),
            ("GPS:GPSLongitude", MetaValue::Float(74.0060)),
            ("GPS:GPSLongitudeRef", "W".into()),
        ]);
        let gps = resolver().resolve(&record);

        assert_eq!(gps.get("Latitude"), Some(&MetaValue::Float(40.7128)));
        assert_eq!(gps.get("Longitude"), Some(&MetaValue::Float(-74.0060)));
        assert_eq!(
            gps.get("GoogleMapsURL").and_then(|v| v.as_str()),
            Some("https://www.google.com/maps/search/?api=1&query=40.7128,-74.006")
        );
    }

    #[test]
    fn test_missing_reference_defaults_north_east() {
        let record = record_with(&[
            ("GPSLatitude", MetaValue::Float(51.5)),
            ("GPSLongitude", MetaValue::Float(0.1)),
        ]);
        let gps = resolver().resolve(&record);
        assert_eq!(gps.get("Latitude"), Some(&MetaValue::Float(51.5)));
        assert_eq!(gps.get("Longitude"), Some(&MetaValue::Float(0.1)));
    }

    #[test]
    fn test_dms_triple_coordinate() {
        let record = record_with(&[
            (
                "GPS:GPSLatitude",
                MetaValue::List(vec![
                    MetaValue::Integer(40),
                    MetaValue::Integer(26),
                    MetaValue::Float(46.0),
                ]),
            ),
            ("GPS:GPSLatitudeRef", "S".into()),
        ]);
        let gps = resolver().resolve(&record);
        let lat = gps.get("Latitude").and_then(|v| v.as_f64()).unwrap();
        assert!((lat - (-40.446111)).abs() < 1e-4);
    }

    #[test]
    fn test_coordinate_mapping_shape() {
        let mut dms = std::collections::BTreeMap::new();
        dms.insert("degrees".to_string(), MetaValue::Integer(40));
        dms.insert("minutes".to_string(), MetaValue::Integer(26));
        dms.insert("seconds".to_string(), MetaValue::Float(46.0));
        let record = record_with(&[("GPS:GPSLatitude", MetaValue::Record(dms))]);
        let gps = resolver().resolve(&record);
        let lat = gps.get("Latitude").and_then(|v| v.as_f64()).unwrap();
        assert!((lat - 40.446111).abs() < 1e-4);
    }

    #[test]
    fn test_tier_exclusivity_exif_wins() {
        // EXIF and XMP tiers populated with different values
        let record = record_with(&[
            ("GPS:GPSLatitude", MetaValue::Float(10.0)),
            ("GPS:GPSLongitude", MetaValue::Float(20.0)),
            ("XMP:GPSLatitude", MetaValue::Float(-55.0)),
            ("XMP:GPSLongitude", MetaValue::Float(-66.0)),
        ]);
        let gps = resolver().resolve(&record);
        assert_eq!(gps.get("Latitude"), Some(&MetaValue::Float(10.0)));
        assert_eq!(gps.get("Longitude"), Some(&MetaValue::Float(20.0)));
    }

    #[test]
    fn test_xmp_tier_signed_decimals() {
        let record = record_with(&[
            ("XMP:GPSLatitude", "-33.8688".into()),
            ("XMP:GPSLongitude", "151.2093".into()),
        ]);
        let gps = resolver().resolve(&record);
        assert_eq!(gps.get("Latitude"), Some(&MetaValue::Float(-33.8688)));
        assert_eq!(gps.get("Longitude"), Some(&MetaValue::Float(151.2093)));
    }

    #[test]
    fn test_iptc_location_components() {
        let record = record_with(&[
            ("IPTC:City", "Chicago".into()),
            ("IPTC:Province-State", "Illinois".into()),
            ("IPTC:Country", "United States".into()),
        ]);
        let gps = resolver().resolve(&record);
        assert_eq!(
            gps.get("LocationName").and_then(|v| v.as_str()),
            Some("Chicago, Illinois, United States")
        );
        assert!(!gps.contains_key("Latitude"));
    }

    #[test]
    fn test_generic_scan_decimal_pair() {
        let record = record_with(&[("UserLocation", "shot at 41.8781, -87.6298 downtown".into())]);
        let gps = resolver().resolve(&record);
        assert_eq!(gps.get("Latitude"), Some(&MetaValue::Float(41.8781)));
        assert_eq!(gps.get("Longitude"), Some(&MetaValue::Float(-87.6298)));
    }

    #[test]
    fn test_generic_scan_rejects_out_of_range() {
        let record = record_with(&[("GPSNotes", "123.456, 999.999".into())]);
        let gps = resolver().resolve(&record);
        assert!(gps.is_empty());
    }

    #[test]
    fn test_altitude_reference_negates() {
        let record = record_with(&[
            ("GPS:GPSLatitude", MetaValue::Float(1.0)),
            ("GPS:GPSLongitude", MetaValue::Float(1.0)),
            ("GPS:GPSAltitude", MetaValue::Float(120.5)),
            ("GPS:GPSAltitudeRef", MetaValue::Integer(1)),
        ]);
        let gps = resolver().resolve(&record);
        assert_eq!(gps.get("Altitude"), Some(&MetaValue::Float(-120.5)));
    }

    #[test]
    fn test_timestamp_triple_formats() {
        let record = record_with(&[
            ("GPS:GPSLatitude", MetaValue::Float(1.0)),
            ("GPS:GPSLongitude", MetaValue::Float(1.0)),
            (
                "GPS:GPSTimeStamp",
                MetaValue::List(vec![
                    MetaValue::Integer(14),
                    MetaValue::Integer(5),
                    MetaValue::Integer(9),
                ]),
            ),
            ("GPS:GPSSpeedRef", "K".into()),
            ("GPS:GPSSpeed", MetaValue::Float(42.0)),
            ("GPSImgDirection", MetaValue::Float(271.5)),
        ]);
        let gps = resolver().resolve(&record);
        assert_eq!(gps.get("GPSTimeStamp"), Some(&"14:05:09".into()));
        assert_eq!(gps.get("GPSSpeedRef"), Some(&"km/h".into()));
        assert_eq!(gps.get("GPSSpeed"), Some(&MetaValue::Float(42.0)));
        assert_eq!(gps.get("GPSDirection"), Some(&MetaValue::Float(271.5)));
    }

    #[test]
    fn test_dms_round_trip() {
        let dms = decimal_to_dms(40.446111, true);
        assert_eq!(dms, "40° 26' 46.00\" N");
        let decimal = dms_to_decimal(&dms).unwrap();
        assert!((decimal - 40.446111).abs() < 1e-4);
    }

    #[test]
    fn test_dms_to_decimal_variants() {
        assert!((dms_to_decimal("12° 30' 0\" S").unwrap() + 12.5).abs() < 1e-9);
        assert!((dms_to_decimal("12.5° W").unwrap() + 12.5).abs() < 1e-9);
        assert!((dms_to_decimal("12.5").unwrap() - 12.5).abs() < 1e-9);
        assert!(dms_to_decimal("nowhere").is_err());
    }

    #[test]
    fn test_reverse_geocode_enrichment_and_cache() {
        let mut resolver = GpsResolver::new(Box::new(OfflineGeocodingService));
        let record = record_with(&[
            ("GPS:GPSLatitude", MetaValue::Float(41.8781)),
            ("GPS:GPSLongitude", MetaValue::Float(87.6298)),
            ("GPS:GPSLongitudeRef", "W".into()),
        ]);

        let gps = resolver.resolve(&record);
        assert_eq!(gps.get("City"), Some(&"Chicago".into()));
        assert_eq!(
            gps.get("LocationName").and_then(|v| v.as_str()),
            Some("Chicago, Cook County, Illinois, United States")
        );

        // Second resolve hits the cache
        let again = resolver.resolve(&record);
        assert_eq!(again.get("City"), Some(&"Chicago".into()));
        assert_eq!(resolver.cache.len(), 1);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Chicago to New York is roughly 1145 km
        let d = haversine_distance(41.8781, -87.6298, 40.7128, -74.0060);
        assert!((d - 1145.0).abs() < 10.0);
    }

    #[test]
    fn test_bearing_and_cardinal() {
        let due_north = bearing(0.0, 0.0, 10.0, 0.0);
        assert!(due_north.abs() < 1e-6);
        assert_eq!(cardinal_direction(due_north), "N");

        let due_east = bearing(0.0, 0.0, 0.0, 10.0);
        assert!((due_east - 90.0).abs() < 1e-6);
        assert_eq!(cardinal_direction(due_east), "E");

        assert_eq!(cardinal_direction(22.5), "NE");
        assert_eq!(cardinal_direction(300.0), "NW");
        assert_eq!(cardinal_direction(337.5), "N");
        assert_eq!(cardinal_direction(350.0), "N");
    }

    #[test]
    fn test_extract_every_coordinate_pair_in_text() {
        let text = "Shot at 40.7128, -74.0060 then 51.5074, -0.1278; \
                    logged as 12° 30' 0\" S, 45° 15' 0\" W; noise at 999.0, 999.0";
        let found = extract_coordinates_from_text(text);

        assert_eq!(found.len(), 3);
        assert_eq!(found[0], (40.7128, -74.0060));
        assert_eq!(found[1], (51.5074, -0.1278));
        let (lat, lon) = found[2];
        assert!((lat + 12.5).abs() < 1e-9);
        assert!((lon + 45.25).abs() < 1e-9);
    }

    #[test]
    fn test_extract_from_text_without_coordinates() {
        assert!(extract_coordinates_from_text("no numbers of note here").is_empty());
    }

    #[test]
    fn test_format_coordinates_all_shapes() {
        let formats = format_coordinates(40.7128, -74.0060);
        assert_eq!(formats.get("Decimal"), Some(&"40.7128, -74.006".into()));
        assert_eq!(
            formats.get("DMS"),
            Some(&"40° 42' 46.08\" N, 74° 0' 21.60\" W".into())
        );
        assert_eq!(
            formats.get("DDM"),
            Some(&"40° 42.7680' N, 74° 0.3600' W".into())
        );
        assert_eq!(
            formats.get("GoogleMapsURL"),
            Some(&"https://www.google.com/maps/search/?api=1&query=40.7128,-74.006".into())
        );
        assert_eq!(
            formats.get("OpenStreetMapURL"),
            Some(&"https://www.openstreetmap.org/?mlat=40.7128&mlon=-74.006&zoom=15".into())
        );
    }

    #[test]
    fn test_has_gps_like_keys() {
        let with = record_with(&[("GPS:GPSLatitude", MetaValue::Float(1.0))]);
        let without = record_with(&[("Make", "Canon".into())]);
        assert!(GpsResolver::has_gps_like_keys(&with));
        assert!(!GpsResolver::has_gps_like_keys(&without));
    }
}
