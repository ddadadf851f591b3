//! # metaprobe
//!
//! A command-line tool and library that normalizes and enriches image
//! metadata for forensic and privacy review.
//!
//! Raw per-format tag mappings (EXIF, XMP, IPTC, or anything decoder-shaped)
//! go in; one canonical, ordered metadata record comes out. Along the way
//! the engine reconciles key aliases, cleans and type-coerces values,
//! resolves GPS coordinates across incompatible encodings, identifies the
//! capture device with fuzzy database lookup, and assesses the privacy risk
//! of what the record reveals.
//!
//! ## Features
//!
//! - Merges decoder outputs with source precedence
//! - Cleans text, decodes byte runs, converts rationals safely
//! - Derives aspect ratio, megapixels, and formatted dates
//! - Four-tier GPS detection (EXIF, XMP, IPTC, generic scan)
//! - Reverse geocoding with per-session caching
//! - Device identification backed by a JSON device database
//! - Privacy-risk assessment with concrete recommendations

// Export modules for integration testing
pub mod alias;
pub mod config;
pub mod database;
pub mod device;
pub mod extract;
pub mod geocode;
pub mod gps;
pub mod normalize;
pub mod similarity;
pub mod value;

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::error::Error;
    use std::fs;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn cargo_bin() -> Command {
        let cargo = StdCommand::new(env!("CARGO"))
            .arg("build")
            .output()
            .expect("Failed to build binary");

        assert!(cargo.status.success(), "Failed to build metaprobe");

        Command::cargo_bin("metaprobe").expect("Failed to find metaprobe binary")
    }

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let config_path = dir.path().join("config.yaml");
        let db_path = dir.path().join("device_database.json");
        let config_content = format!(
            "database_file: \"{}\"\ngeocoder: none\ngeocoder_user_agent: metaprobe-test\ngeocoder_timeout_secs: 5\n",
            db_path.display()
        );
        fs::write(&config_path, config_content).expect("Failed to write config");

        let db_content = r#"{
  "cameras": {
    "canon_eos_r5": {"make": "Canon", "model": "EOS R5", "sensor_type": "CMOS"}
  },
  "phones": {
    "apple_iphone_12": {"make": "Apple", "model": "iPhone 12", "os": "iOS"}
  },
  "lenses": {},
  "software": {}
}"#;
        fs::write(&db_path, db_content).expect("Failed to write device database");

        config_path
    }

    #[test]
    fn test_config_generation() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        // Create a config file with init command
        let mut cmd = cargo_bin();
        cmd.arg("init")
            .current_dir(temp_dir.path())
            .assert()
            .success();

        // Check if config file exists
        assert!(config_path.exists(), "Config file should be created");

        // Read the config file content
        let content = fs::read_to_string(&config_path)?;
        assert!(
            content.contains("database_file"),
            "Config should contain database_file"
        );
        assert!(
            content.contains("geocoder"),
            "Config should contain geocoder"
        );

        Ok(())
    }

    #[test]
    fn test_init_command_with_force() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");

        // Create initial config
        let initial_content = "database_file: existing.json";
        fs::write(&config_path, initial_content)?;

        // Run init command without force (should not overwrite)
        let mut cmd = cargo_bin();
        let output = cmd
            .arg("init")
            .current_dir(temp_dir.path())
            .assert()
            .success();

        // Check stdout for "already exists" message
        let stdout = String::from_utf8(output.get_output().stdout.clone())?;
        assert!(
            stdout.contains("Config file already exists"),
            "Should detect existing config"
        );

        // Check content wasn't changed
        let content = fs::read_to_string(&config_path)?;
        assert_eq!(
            content, initial_content,
            "Content should not be changed without --force"
        );

        // Run init command with force (should overwrite)
        let mut cmd = cargo_bin();
        cmd.arg("init")
            .arg("--force")
            .current_dir(temp_dir.path())
            .assert()
            .success();

        // Check content was changed
        let new_content = fs::read_to_string(&config_path)?;
        assert_ne!(
            new_content, initial_content,
            "Content should be changed with --force"
        );
        assert!(
            new_content.contains("geocoder"),
            "New config should contain geocoder"
        );

        Ok(())
    }

    #[test]
    fn test_init_with_custom_config_path() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let custom_path = temp_dir.path().join("custom_config.yaml");

        // Run init with custom config path
        let mut cmd = cargo_bin();
        cmd.arg("init")
            .arg("--config")
            .arg(&custom_path)
            .assert()
            .success();

        // Check custom config was created
        assert!(custom_path.exists(), "Custom config file should be created");

        Ok(())
    }

    #[test]
    fn test_extract_command() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(&temp_dir);

        let input_path = temp_dir.path().join("tags.json");
        fs::write(
            &input_path,
            r#"{
  "GPS:GPSLatitude": 40.7128,
  "GPS:GPSLatitudeRef": "N",
  "GPS:GPSLongitude": 74.0060,
  "GPS:GPSLongitudeRef": "W",
  "Make": "Apple",
  "Model": "iPhone 12"
}"#,
        )?;

        let mut cmd = cargo_bin();
        let output = cmd
            .arg("extract")
            .arg(&input_path)
            .arg("--config")
            .arg(&config_path)
            .assert()
            .success();

        let stdout = String::from_utf8(output.get_output().stdout.clone())?;
        let record: serde_json::Value = serde_json::from_str(&stdout)?;
        assert_eq!(record["Latitude"], serde_json::json!(40.7128));
        assert_eq!(record["Longitude"], serde_json::json!(-74.0060));
        assert_eq!(record["DeviceType"], serde_json::json!("Smartphone"));
        assert_eq!(record["PrivacyRisk"], serde_json::json!("High"));

        Ok(())
    }

    #[test]
    fn test_extract_rejects_non_mapping_input() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(&temp_dir);

        let input_path = temp_dir.path().join("tags.json");
        fs::write(&input_path, "\"just a string\"")?;

        let mut cmd = cargo_bin();
        cmd.arg("extract")
            .arg(&input_path)
            .arg("--config")
            .arg(&config_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid input"));

        Ok(())
    }

    #[test]
    fn test_status_command() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(&temp_dir);

        let mut cmd = cargo_bin();
        let output = cmd
            .arg("status")
            .arg("--config")
            .arg(&config_path)
            .assert()
            .success();

        let stdout = String::from_utf8(output.get_output().stdout.clone())?;
        assert!(
            stdout.contains("metaprobe Status"),
            "Should show status header"
        );
        assert!(
            stdout.contains("Device database:"),
            "Should show database section"
        );
        assert!(stdout.contains("cameras: 1"), "Should show camera count");
        assert!(stdout.contains("phones: 1"), "Should show phone count");
        assert!(stdout.contains("total: 2"), "Should show total count");

        Ok(())
    }

    #[test]
    fn test_search_command() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let config_path = write_config(&temp_dir);

        let mut cmd = cargo_bin();
        let output = cmd
            .arg("search")
            .arg("iphone")
            .arg("--config")
            .arg(&config_path)
            .assert()
            .success();

        let stdout = String::from_utf8(output.get_output().stdout.clone())?;
        assert!(stdout.contains("iPhone 12"), "Should find the phone");
        assert!(stdout.contains("Smartphone"), "Should show the device type");

        Ok(())
    }

    #[test]
    fn test_missing_config_error() -> Result<(), Box<dyn Error>> {
        let temp_dir = TempDir::new()?;
        let nonexistent_path = temp_dir.path().join("does_not_exist.yaml");
        let input_path = temp_dir.path().join("tags.json");
        fs::write(&input_path, "{}")?;

        // Run extract with nonexistent config path
        let mut cmd = cargo_bin();
        cmd.arg("extract")
            .arg(&input_path)
            .arg("--config")
            .arg(&nonexistent_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Config file not found"));

        Ok(())
    }
}
