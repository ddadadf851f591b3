//! Device identification for metaprobe.
//!
//! Builds a device profile from a normalized metadata record: make and
//! model, a heuristic device-type classification, lens details for
//! dedicated cameras, database-backed specifications, processing software,
//! camera settings, and a privacy assessment of the record.

use log::debug;
use regex::Regex;
use std::sync::LazyLock;

use crate::alias::first_matching_text;
use crate::database::{DeviceCategory, DeviceDatabase};
use crate::similarity::SimilarityStrategy;
use crate::value::{MetaValue, MetadataRecord};

const MAKE_KEYS: &[&str] = &[
    "Make",
    "make",
    "EXIF:Make",
    "IFD0:Make",
    "Image Make",
    "Manufacturer",
    "CameraManufacturer",
    "DeviceManufacturer",
    "EXIF:Manufacturer",
    "XMP:Manufacturer",
    "IPTC:Manufacturer",
];

const MODEL_KEYS: &[&str] = &[
    "Model",
    "model",
    "EXIF:Model",
    "IFD0:Model",
    "Image Model",
    "CameraModel",
    "DeviceModel",
    "EXIF:CameraModel",
    "XMP:Model",
    "IPTC:Model",
];

const SOFTWARE_KEYS: &[&str] = &[
    "Software",
    "software",
    "EXIF:Software",
    "IFD0:Software",
    "Image Software",
    "ProcessingSoftware",
    "CreatorTool",
    "XMP:CreatorTool",
    "XMP:Software",
    "IPTC:ProcessingSoftware",
];

const SMARTPHONE_MAKERS: &[&str] = &[
    "apple", "iphone", "samsung", "huawei", "xiaomi", "google", "pixel", "oneplus", "oppo",
    "vivo", "motorola", "lg", "htc", "nokia", "asus", "lenovo", "zte", "realme", "honor", "poco",
];

const TABLET_INDICATORS: &[&str] = &["ipad", "tab", "tablet", "pad", "galaxy tab"];

const CAMERA_MAKERS: &[&str] = &[
    "canon", "nikon", "sony", "fuji", "fujifilm", "olympus", "panasonic", "pentax", "leica",
    "hasselblad", "kodak", "sigma", "ricoh",
];

const DRONE_MAKERS: &[&str] = &["dji", "parrot", "autel", "skydio", "yuneec"];

const ACTION_CAMERA_INDICATORS: &[&str] = &["gopro", "hero", "action", "insta360"];

/// Lowercase prefix/word -> canonical manufacturer spelling.
const KNOWN_MANUFACTURERS: &[(&str, &str)] = &[
    ("apple", "Apple"),
    ("samsung", "Samsung"),
    ("huawei", "Huawei"),
    ("xiaomi", "Xiaomi"),
    ("google", "Google"),
    ("oneplus", "OnePlus"),
    ("oppo", "OPPO"),
    ("vivo", "Vivo"),
    ("motorola", "Motorola"),
    ("lg", "LG"),
    ("sony", "Sony"),
    ("htc", "HTC"),
    ("nokia", "Nokia"),
    ("asus", "ASUS"),
    ("lenovo", "Lenovo"),
    ("zte", "ZTE"),
    ("canon", "Canon"),
    ("nikon", "Nikon"),
    ("fujifilm", "Fujifilm"),
    ("fuji", "Fujifilm"),
    ("olympus", "Olympus"),
    ("panasonic", "Panasonic"),
    ("pentax", "Pentax"),
    ("leica", "Leica"),
    ("hasselblad", "Hasselblad"),
    ("kodak", "Kodak"),
    ("sigma", "Sigma"),
    ("ricoh", "Ricoh"),
    ("gopro", "GoPro"),
    ("dji", "DJI"),
];

/// Lowercase fragment -> canonical software name.
const KNOWN_SOFTWARE: &[(&str, &str)] = &[
    ("photoshop", "Adobe Photoshop"),
    ("lightroom", "Adobe Lightroom"),
    ("gimp", "GIMP"),
    ("affinity", "Affinity Photo"),
    ("capture one", "Capture One"),
    ("luminar", "Luminar"),
    ("snapseed", "Snapseed"),
    ("instagram", "Instagram"),
    ("vsco", "VSCO"),
    ("pixlr", "Pixlr"),
    ("paintshop", "PaintShop Pro"),
    ("photolab", "DxO PhotoLab"),
    ("acdsee", "ACDSee"),
    ("aperture", "Apple Aperture"),
    ("photos", "Apple Photos"),
    ("picasa", "Google Picasa"),
    ("darktable", "Darktable"),
    ("rawtherapee", "RawTherapee"),
    ("pixelmator", "Pixelmator"),
];

/// Lowercase lens-model fragment -> lens manufacturer. Ordered so longer,
/// more specific keys come before their prefixes (ef-s before ef).
const LENS_MANUFACTURERS: &[(&str, &str)] = &[
    ("canon", "Canon"),
    ("ef-s", "Canon"),
    ("ef-m", "Canon"),
    ("ef", "Canon"),
    ("rf", "Canon"),
    ("nikkor", "Nikon"),
    ("nikon", "Nikon"),
    ("sony", "Sony"),
    ("zeiss", "Zeiss"),
    ("leica", "Leica"),
    ("sigma", "Sigma"),
    ("tamron", "Tamron"),
    ("tokina", "Tokina"),
    ("samyang", "Samyang"),
    ("rokinon", "Rokinon"),
    ("voigtlander", "Voigtlander"),
    ("olympus", "Olympus"),
    ("zuiko", "Olympus"),
    ("panasonic", "Panasonic"),
    ("lumix", "Panasonic"),
    ("fujinon", "Fujifilm"),
    ("fujifilm", "Fujifilm"),
    ("fuji", "Fujifilm"),
    ("pentax", "Pentax"),
    ("hasselblad", "Hasselblad"),
    ("schneider", "Schneider"),
    ("mamiya", "Mamiya"),
    ("meyer", "Meyer-Optik"),
    ("laowa", "Laowa"),
    ("venus", "Venus Optics"),
    ("irix", "Irix"),
    ("ttartisan", "TTArtisan"),
    ("7artisans", "7Artisans"),
];

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)*)").unwrap());

static SOFTWARE_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)+)").unwrap());

/// Identifies the capture device behind a metadata record.
pub struct DeviceIdentifier {
    db: DeviceDatabase,
    similarity: SimilarityStrategy,
}

impl DeviceIdentifier {
    pub fn new(db: DeviceDatabase) -> Self {
        DeviceIdentifier {
            db,
            similarity: SimilarityStrategy::default(),
        }
    }

    pub fn with_strategy(db: DeviceDatabase, similarity: SimilarityStrategy) -> Self {
        DeviceIdentifier { db, similarity }
    }

    pub fn database(&self) -> &DeviceDatabase {
        &self.db
    }

    /// Build the full device profile: identification, software details,
    /// camera settings, and the privacy assessment.
    pub fn profile(&self, record: &MetadataRecord) -> MetadataRecord {
        let mut profile = self.identify(record);

        if let Some(MetaValue::Text(software)) = profile.get("Software").cloned() {
            for (key, value) in self.software_profile(&software) {
                profile.entry(key).or_insert(value);
            }
        }

        for (key, value) in camera_settings(record) {
            profile.insert(key, value);
        }

        let device_type = profile
            .get("DeviceType")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();
        for (key, value) in assess_privacy(record, &device_type) {
            profile.insert(key, value);
        }

        profile
    }

    /// Identify make, model, device type, lens, and database-backed specs.
    pub fn identify(&self, record: &MetadataRecord) -> MetadataRecord {
        let mut device_info = MetadataRecord::new();

        let (make, model) = extract_make_model(record);
        let software = first_matching_text(record, SOFTWARE_KEYS);

        if let Some(make) = &make {
            device_info.insert("DeviceMake".to_string(), make.clone().into());
        }
        if let Some(model) = &model {
            device_info.insert("DeviceModel".to_string(), model.clone().into());
        }
        if let Some(software) = &software {
            device_info.insert("Software".to_string(), software.clone().into());
        }

        let device_type = classify(make.as_deref(), model.as_deref(), record);
        if let Some(device_type) = &device_type {
            device_info.insert("DeviceType".to_string(), device_type.clone().into());
        }

        if device_type.as_deref() == Some("Camera") {
            for (key, value) in lens_info(record) {
                device_info.insert(key, value);
            }
        }

        for (key, value) in additional_info(record, device_type.as_deref()) {
            device_info.insert(key, value);
        }

        if let (Some(make), Some(model)) = (&make, &model) {
            let category = match device_type.as_deref() {
                Some("Smartphone") | Some("Tablet") => DeviceCategory::Phones,
                _ => DeviceCategory::Cameras,
            };
            if let Some(entry) = self.db.lookup(make, model, category, self.similarity) {
                debug!("Database match for {} {}: {}", make, model, entry.model);
                for (key, value) in entry.to_profile_fields() {
                    device_info.entry(key).or_insert(value);
                }
            }
        }

        if let Some(make) = &make {
            if !device_info.contains_key("Manufacturer") {
                let normalized = normalize_manufacturer(make);
                if normalized != *make {
                    device_info.insert("Manufacturer".to_string(), normalized.into());
                }
            }
        }

        if let (Some(make), Some(model)) = (&make, &model) {
            if !device_info.contains_key("DeviceName") {
                device_info.insert("DeviceName".to_string(), format!("{} {}", make, model).into());
            }
        }

        device_info
    }

    /// Resolve software details from the database, falling back to the
    /// built-in name table with a version sniffed out of the raw string.
    pub fn software_profile(&self, software: &str) -> MetadataRecord {
        let mut info = MetadataRecord::new();

        if let Some(entry) = self.db.software_lookup(software) {
            info.insert("SoftwareName".to_string(), entry.name.clone().into());
            if let Some(version) = &entry.version {
                info.insert("SoftwareVersion".to_string(), version.clone().into());
            }
            if let Some(company) = &entry.company {
                info.insert("SoftwareCompany".to_string(), company.clone().into());
            }
            if let Some(kind) = &entry.kind {
                info.insert("SoftwareType".to_string(), kind.clone().into());
            }
            if let Some(url) = &entry.url {
                info.insert("SoftwareURL".to_string(), url.clone().into());
            }
            return info;
        }

        let software_lower = software.to_lowercase();
        for (fragment, name) in KNOWN_SOFTWARE {
            if software_lower.contains(fragment) {
                info.insert("SoftwareName".to_string(), (*name).into());
                if let Some(caps) = SOFTWARE_VERSION_RE.captures(software) {
                    info.insert("SoftwareVersion".to_string(), caps[1].to_string().into());
                }
                return info;
            }
        }

        info.insert("SoftwareName".to_string(), software.to_string().into());
        info
    }
}

/// Extract make and model, stripping a duplicated make prefix from the model
/// ("Canon Canon EOS R5" style records are common).
fn extract_make_model(record: &MetadataRecord) -> (Option<String>, Option<String>) {
    let make = first_matching_text(record, MAKE_KEYS);
    let mut model = first_matching_text(record, MODEL_KEYS);

    if let (Some(make), Some(m)) = (&make, &model) {
        if m.len() >= make.len()
            && m.is_char_boundary(make.len())
            && m[..make.len()].eq_ignore_ascii_case(make)
        {
            let stripped = m[make.len()..].trim().to_string();
            if !stripped.is_empty() {
                model = Some(stripped);
            }
        }
    }

    (make, model)
}

/// Classify the device type from make, model, and supporting fields.
fn classify(make: Option<&str>, model: Option<&str>, record: &MetadataRecord) -> Option<String> {
    if let Some(explicit) = record.get("DeviceType").and_then(|v| v.as_str()) {
        return Some(explicit.to_string());
    }

    if make.is_none() && model.is_none() {
        return None;
    }

    let make_lower = make.unwrap_or("").to_lowercase();
    let model_lower = model.unwrap_or("").to_lowercase();

    if SMARTPHONE_MAKERS.iter().any(|m| make_lower.contains(m)) {
        if TABLET_INDICATORS.iter().any(|t| model_lower.contains(t)) {
            return Some("Tablet".to_string());
        }
        return Some("Smartphone".to_string());
    }

    if CAMERA_MAKERS.iter().any(|m| make_lower.contains(m)) {
        return Some("Camera".to_string());
    }

    if DRONE_MAKERS.iter().any(|m| make_lower.contains(m)) {
        return Some("Drone".to_string());
    }

    if ACTION_CAMERA_INDICATORS
        .iter()
        .any(|i| make_lower.contains(i) || model_lower.contains(i))
    {
        return Some("Action Camera".to_string());
    }

    if !model_lower.is_empty() {
        if ["phone", "smartphone"].iter().any(|i| model_lower.contains(i)) {
            return Some("Smartphone".to_string());
        }
        if ["camera", "dslr", "mirrorless"].iter().any(|i| model_lower.contains(i)) {
            return Some("Camera".to_string());
        }
        if model_lower.contains("drone") {
            return Some("Drone".to_string());
        }
    }

    // Lens metadata only shows up on interchangeable-lens bodies
    let lens_indicators = ["Lens", "LensModel", "LensInfo", "LensSerialNumber"];
    if lens_indicators.iter().any(|k| record.contains_key(*k)) {
        return Some("Camera".to_string());
    }

    // Exposure data appears on phones too, so require the full set
    if (record.contains_key("FocalLength") || record.contains_key("FNumber"))
        && record.contains_key("ISO")
        && record.contains_key("ExposureTime")
    {
        return Some("Camera".to_string());
    }

    if make.is_some() || model.is_some() {
        return Some("Digital Camera".to_string());
    }

    None
}

fn lens_info(record: &MetadataRecord) -> MetadataRecord {
    let mut lens = MetadataRecord::new();

    let model_keys = [
        "LensModel",
        "Lens",
        "EXIF:LensModel",
        "MakerNotes:LensModel",
        "XMP:LensModel",
        "Lens Model",
        "Lens Info",
        "LensInfo",
    ];
    if let Some(model) = first_matching_text(record, &model_keys) {
        lens.insert("LensModel".to_string(), model.into());
    }

    let make_keys = [
        "LensMake",
        "EXIF:LensMake",
        "MakerNotes:LensMake",
        "XMP:LensMake",
        "Lens Make",
    ];
    if let Some(make) = first_matching_text(record, &make_keys) {
        lens.insert("LensMake".to_string(), make.into());
    }

    let serial_keys = [
        "LensSerialNumber",
        "EXIF:LensSerialNumber",
        "MakerNotes:LensSerialNumber",
        "XMP:LensSerialNumber",
        "Lens Serial Number",
    ];
    if let Some(serial) = first_matching_text(record, &serial_keys) {
        lens.insert("LensSerialNumber".to_string(), serial.into());
    }

    let spec_keys = [
        "LensSpecification",
        "EXIF:LensSpecification",
        "MakerNotes:LensSpecification",
        "XMP:LensSpecification",
        "Lens Specification",
    ];
    for key in spec_keys {
        if let Some(MetaValue::List(items)) = record.get(key) {
            if items.len() >= 4 {
                let values: Option<Vec<f64>> =
                    items.iter().take(4).map(|v| v.as_f64()).collect();
                if let Some(v) = values {
                    lens.insert("MinFocalLength".to_string(), MetaValue::Float(v[0]));
                    lens.insert("MaxFocalLength".to_string(), MetaValue::Float(v[1]));
                    lens.insert("MinAperture".to_string(), MetaValue::Float(v[2]));
                    lens.insert("MaxAperture".to_string(), MetaValue::Float(v[3]));

                    let focal = if v[0] == v[1] {
                        format!("{}mm", trim(v[0]))
                    } else {
                        format!("{}-{}mm", trim(v[0]), trim(v[1]))
                    };
                    let aperture = if v[2] == v[3] {
                        format!("f/{}", trim(v[2]))
                    } else {
                        format!("f/{}-{}", trim(v[2]), trim(v[3]))
                    };
                    lens.insert(
                        "LensSpecification".to_string(),
                        format!("{} {}", focal, aperture).into(),
                    );
                }
            }
            break;
        }
    }

    if !lens.contains_key("LensMake") {
        if let Some(model) = lens.get("LensModel").and_then(|v| v.as_str()) {
            if let Some(make) = lens_make_from_model(model) {
                lens.insert("LensMake".to_string(), make.into());
            }
        }
    }

    let combined = match (
        lens.get("LensMake").and_then(|v| v.as_str()),
        lens.get("LensModel").and_then(|v| v.as_str()),
    ) {
        (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
        (None, Some(model)) => Some(model.to_string()),
        _ => None,
    };
    if let Some(combined) = combined {
        lens.insert("Lens".to_string(), combined.into());
    }

    lens
}

/// Infer the lens manufacturer from the model string: prefix match first,
/// then a whole-word containment check.
fn lens_make_from_model(lens_model: &str) -> Option<&'static str> {
    let model_lower = lens_model.to_lowercase();

    for (fragment, manufacturer) in LENS_MANUFACTURERS {
        if model_lower.starts_with(fragment) {
            return Some(manufacturer);
        }
        if contains_word(&model_lower, fragment) {
            return Some(manufacturer);
        }
    }

    None
}

/// Word-boundary containment check without building a regex per candidate.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = begin == 0
            || !haystack[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after_ok = end == haystack.len()
            || !haystack[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}

/// Serial number, firmware, owner, shooting mode, and OS details.
fn additional_info(record: &MetadataRecord, device_type: Option<&str>) -> MetadataRecord {
    let mut info = MetadataRecord::new();

    let serial_keys = [
        "SerialNumber",
        "CameraSerialNumber",
        "BodySerialNumber",
        "EXIF:SerialNumber",
        "MakerNotes:SerialNumber",
        "XMP:SerialNumber",
        "Camera Serial Number",
    ];
    if let Some(serial) = first_matching_text(record, &serial_keys) {
        info.insert("DeviceSerialNumber".to_string(), serial.into());
    }

    let firmware_keys = [
        "FirmwareVersion",
        "Firmware",
        "EXIF:FirmwareVersion",
        "MakerNotes:FirmwareVersion",
        "XMP:FirmwareVersion",
    ];
    if let Some(firmware) = first_matching_text(record, &firmware_keys) {
        info.insert("FirmwareVersion".to_string(), firmware.into());
    }

    let owner_keys = [
        "OwnerName",
        "CameraOwnerName",
        "EXIF:OwnerName",
        "MakerNotes:OwnerName",
        "XMP:OwnerName",
        "Owner",
    ];
    if let Some(owner) = first_matching_text(record, &owner_keys) {
        info.insert("OwnerName".to_string(), owner.into());
    }

    if matches!(device_type, Some("Camera") | Some("Digital Camera") | Some("Action Camera")) {
        if let Some(mode) = shooting_mode(record) {
            info.insert("ShootingMode".to_string(), mode.into());
        }
    }

    if matches!(device_type, Some("Smartphone") | Some("Tablet")) {
        let os_keys = [
            "OSVersion",
            "OperatingSystem",
            "Software",
            "XMP:OSVersion",
            "XMP:OperatingSystem",
        ];
        if let Some(os_string) = first_matching_text(record, &os_keys) {
            if os_string.contains("iOS") || os_string.contains("iPhone OS") {
                info.insert("OperatingSystem".to_string(), "iOS".into());
                if let Some(caps) = VERSION_RE.captures(&os_string) {
                    info.insert("OSVersion".to_string(), caps[1].to_string().into());
                }
            } else if os_string.contains("Android") {
                info.insert("OperatingSystem".to_string(), "Android".into());
                if let Some(caps) = VERSION_RE.captures(&os_string) {
                    info.insert("OSVersion".to_string(), caps[1].to_string().into());
                }
            } else {
                info.insert("OSVersion".to_string(), os_string.into());
            }
        }
    }

    info
}

fn shooting_mode(record: &MetadataRecord) -> Option<String> {
    let mode_keys = [
        "ExposureMode",
        "ExposureProgram",
        "SceneCaptureType",
        "EXIF:ExposureMode",
        "EXIF:ExposureProgram",
        "EXIF:SceneCaptureType",
        "MakerNotes:ExposureMode",
        "XMP:ExposureMode",
    ];

    for key in mode_keys {
        let Some(value) = record.get(key) else {
            continue;
        };

        if key.ends_with("ExposureProgram") {
            if let Some(code) = value.as_i64() {
                return Some(exposure_program_name(code));
            }
        }
        if key.ends_with("SceneCaptureType") {
            if let Some(code) = value.as_i64() {
                return Some(scene_type_name(code));
            }
        }
        return Some(value.to_string());
    }

    None
}

fn exposure_program_name(code: i64) -> String {
    match code {
        0 => "Not Defined".to_string(),
        1 => "Manual".to_string(),
        2 => "Program AE".to_string(),
        3 => "Aperture Priority".to_string(),
        4 => "Shutter Priority".to_string(),
        5 => "Creative (Slow Speed)".to_string(),
        6 => "Action (High Speed)".to_string(),
        7 => "Portrait".to_string(),
        8 => "Landscape".to_string(),
        9 => "Bulb".to_string(),
        other => format!("Unknown ({})", other),
    }
}

fn scene_type_name(code: i64) -> String {
    match code {
        0 => "Standard".to_string(),
        1 => "Landscape".to_string(),
        2 => "Portrait".to_string(),
        3 => "Night".to_string(),
        4 => "Night Portrait".to_string(),
        5 => "Backlight".to_string(),
        6 => "Backlight Portrait".to_string(),
        7 => "Macro".to_string(),
        8 => "Sports".to_string(),
        9 => "Action".to_string(),
        10 => "Fireworks".to_string(),
        11 => "Children".to_string(),
        12 => "Pets".to_string(),
        other => format!("Unknown ({})", other),
    }
}

/// Camera settings folded into the profile under reader-friendly names.
pub fn camera_settings(record: &MetadataRecord) -> MetadataRecord {
    const SETTING_KEYS: &[(&str, &str)] = &[
        ("FNumber", "Aperture"),
        ("ApertureValue", "Aperture"),
        ("FocalLength", "FocalLength"),
        ("FocalLengthIn35mmFormat", "FocalLength35mm"),
        ("ExposureTime", "ExposureTime"),
        ("ShutterSpeedValue", "ShutterSpeed"),
        ("ISOSpeedRatings", "ISO"),
        ("ISO", "ISO"),
        ("WhiteBalance", "WhiteBalance"),
        ("MeteringMode", "MeteringMode"),
        ("ExposureProgram", "ExposureProgram"),
        ("ExposureMode", "ExposureMode"),
        ("ExposureCompensation", "ExposureCompensation"),
        ("Flash", "Flash"),
        ("FlashMode", "FlashMode"),
        ("FocusMode", "FocusMode"),
        ("DigitalZoomRatio", "DigitalZoom"),
    ];

    let mut settings = MetadataRecord::new();

    for (tag, setting) in SETTING_KEYS {
        if settings.contains_key(*setting) {
            continue;
        }
        let candidates = [
            tag.to_string(),
            format!("EXIF:{}", tag),
            format!("MakerNotes:{}", tag),
            format!("XMP:{}", tag),
            format!("Image {}", tag),
        ];
        for key in &candidates {
            let Some(value) = record.get(key) else {
                continue;
            };

            let formatted = match (*setting, value.as_f64()) {
                ("Aperture", Some(n)) if value.as_str().is_none() => {
                    MetaValue::Text(format!("f/{}", trim(n)))
                }
                ("FocalLength", Some(n)) if value.as_str().is_none() => {
                    MetaValue::Text(format!("{}mm", trim(n)))
                }
                ("ExposureTime", Some(n)) if value.as_str().is_none() => {
                    MetaValue::Text(crate::normalize::format_exposure_time(n))
                }
                _ => value.clone(),
            };

            settings.insert(setting.to_string(), formatted);
            break;
        }
    }

    if let Some(code) = settings.get("Flash").and_then(|v| v.as_i64()) {
        settings.insert("Flash".to_string(), flash_description(code).into());
    }
    if let Some(code) = settings.get("MeteringMode").and_then(|v| v.as_i64()) {
        let name = match code {
            0 => "Unknown".to_string(),
            1 => "Average".to_string(),
            2 => "Center-weighted average".to_string(),
            3 => "Spot".to_string(),
            4 => "Multi-spot".to_string(),
            5 => "Pattern".to_string(),
            6 => "Partial".to_string(),
            255 => "Other".to_string(),
            other => format!("Unknown ({})", other),
        };
        settings.insert("MeteringMode".to_string(), name.into());
    }
    if let Some(code) = settings.get("WhiteBalance").and_then(|v| v.as_i64()) {
        let name = match code {
            0 => "Auto".to_string(),
            1 => "Manual".to_string(),
            other => format!("Unknown ({})", other),
        };
        settings.insert("WhiteBalance".to_string(), name.into());
    }

    settings
}

fn flash_description(code: i64) -> String {
    match code {
        0 => "No Flash".to_string(),
        1 => "Flash Fired".to_string(),
        5 => "Flash Fired, Return not detected".to_string(),
        7 => "Flash Fired, Return detected".to_string(),
        8 => "On, Flash did not fire".to_string(),
        9 => "Flash Fired, Compulsory mode".to_string(),
        13 => "Flash Fired, Compulsory mode, Return not detected".to_string(),
        15 => "Flash Fired, Compulsory mode, Return detected".to_string(),
        16 => "Off, Flash did not fire".to_string(),
        24 => "Off, Flash did not fire, Return not detected".to_string(),
        25 => "Flash Fired, Auto mode".to_string(),
        29 => "Flash Fired, Auto mode, Return not detected".to_string(),
        31 => "Flash Fired, Auto mode, Return detected".to_string(),
        32 => "No flash function".to_string(),
        65 => "Flash Fired, Red-eye reduction".to_string(),
        69 => "Flash Fired, Red-eye reduction, Return not detected".to_string(),
        71 => "Flash Fired, Red-eye reduction, Return detected".to_string(),
        73 => "Flash Fired, Compulsory mode, Red-eye reduction".to_string(),
        77 => "Flash Fired, Compulsory mode, Red-eye reduction, Return not detected".to_string(),
        79 => "Flash Fired, Compulsory mode, Red-eye reduction, Return detected".to_string(),
        89 => "Flash Fired, Auto mode, Red-eye reduction".to_string(),
        93 => "Flash Fired, Auto mode, Red-eye reduction, Return not detected".to_string(),
        95 => "Flash Fired, Auto mode, Red-eye reduction, Return detected".to_string(),
        other => format!("Unknown ({})", other),
    }
}

/// Canonical spelling for a manufacturer, via exact or prefix match.
pub fn normalize_manufacturer(make: &str) -> String {
    let make_lower = make.to_lowercase();
    for (key, normalized) in KNOWN_MANUFACTURERS {
        if make_lower == *key || make_lower.starts_with(key) {
            return normalized.to_string();
        }
    }
    make.to_string()
}

/// Scan the record for privacy-sensitive categories and compute the risk
/// level.
///
/// GPS escalates to High; serials, owner info, and device identifiers to
/// Medium unless already High; timestamps and software alone stay Low.
pub fn assess_privacy(record: &MetadataRecord, device_type: &str) -> MetadataRecord {
    let mut risk = "Low";
    let mut sensitive_present = false;
    let mut recommendations: Vec<MetaValue> = Vec::new();
    let mut sensitive_fields: Vec<MetaValue> = Vec::new();

    let gps_keys = [
        "GPS:GPSLatitude",
        "GPS:GPSLongitude",
        "GPSLatitude",
        "GPSLongitude",
        "Latitude",
        "Longitude",
    ];
    if gps_keys.iter().any(|k| record.contains_key(*k)) {
        sensitive_fields.push("GPS Location".into());
        recommendations.push("Remove GPS data to protect location privacy".into());
        sensitive_present = true;
        risk = "High";
    }

    let serial_keys = [
        "SerialNumber",
        "CameraSerialNumber",
        "BodySerialNumber",
        "LensSerialNumber",
    ];
    if serial_keys.iter().any(|k| record.contains_key(*k)) {
        sensitive_fields.push("Serial Number".into());
        recommendations.push("Remove serial numbers to prevent device tracking".into());
        sensitive_present = true;
        if risk != "High" {
            risk = "Medium";
        }
    }

    let owner_keys = [
        "OwnerName",
        "CameraOwnerName",
        "Artist",
        "Author",
        "Creator",
        "By-line",
    ];
    if owner_keys.iter().any(|k| record.contains_key(*k)) {
        sensitive_fields.push("Owner/Author Information".into());
        recommendations.push("Remove owner/author information for anonymity".into());
        sensitive_present = true;
        if risk != "High" {
            risk = "Medium";
        }
    }

    if matches!(device_type, "Smartphone" | "Tablet") {
        let id_fragments = ["DeviceID", "UniqueID", "IMEI", "UUID"];
        if record
            .keys()
            .any(|key| id_fragments.iter().any(|f| key.contains(f)))
        {
            sensitive_fields.push("Device Identifier".into());
            recommendations.push("Remove unique device identifiers".into());
            sensitive_present = true;
            if risk != "High" {
                risk = "Medium";
            }
        }
    }

    let timestamp_keys = ["DateTimeOriginal", "CreateDate", "ModifyDate", "DateCreated"];
    if timestamp_keys.iter().any(|k| record.contains_key(*k)) {
        sensitive_fields.push("Timestamp".into());
        recommendations
            .push("Consider removing timestamps if time information is sensitive".into());
        // Timestamps alone stay Low
        sensitive_present = true;
    }

    let software_keys = ["Software", "ProcessingSoftware", "CreatorTool"];
    if software_keys.iter().any(|k| record.contains_key(*k)) {
        sensitive_fields.push("Software Information".into());
        recommendations
            .push("Consider removing software information to hide workflow details".into());
        sensitive_present = true;
    }

    let mut assessment = MetadataRecord::new();
    if sensitive_present {
        recommendations.push("Use metadata cleaning tools before sharing images publicly".into());
        assessment.insert(
            "SensitiveFields".to_string(),
            MetaValue::List(sensitive_fields),
        );
    } else {
        recommendations.push("No sensitive metadata detected".into());
    }

    assessment.insert("PrivacyRisk".to_string(), risk.into());
    assessment.insert(
        "SensitiveDataPresent".to_string(),
        MetaValue::Boolean(sensitive_present),
    );
    assessment.insert(
        "Recommendations".to_string(),
        MetaValue::List(recommendations),
    );
    assessment
}

fn trim(value: f64) -> String {
    crate::normalize::trim_float(value)
}
