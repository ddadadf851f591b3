//! Reverse geocoding for metaprobe.
//!
//! This module converts geographic coordinates (latitude/longitude) into
//! human-readable location information (city, county, state, country).
//!
//! It defines the `Location` struct to store address components and the
//! `GeocodingService` trait as an interface for different implementations.
//! Three services are provided: a Nominatim-backed service for live lookups,
//! an offline service that resolves a handful of coordinate ranges without
//! network access, and a null service that resolves nothing (for runs where
//! geocoding is disabled).

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Represents a geographic location with address components
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Location {
    /// The full formatted address (e.g., "Chicago, Illinois, United States")
    pub formatted_address: String,
    /// City or locality name
    pub city: Option<String>,
    /// County or district
    pub county: Option<String>,
    /// State, province, or administrative area
    pub state: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// ISO country code, when the service provides one
    pub country_code: Option<String>,
}

impl Location {
    /// Build the formatted address by joining the present components.
    pub fn from_components(
        city: Option<String>,
        county: Option<String>,
        state: Option<String>,
        country: Option<String>,
        country_code: Option<String>,
    ) -> Self {
        let formatted_address = [&city, &county, &state, &country]
            .iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<&str>>()
            .join(", ");

        Location {
            formatted_address,
            city,
            county,
            state,
            country,
            country_code,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted_address)
    }
}

/// Interface for reverse geocoding services
pub trait GeocodingService {
    /// Convert latitude and longitude to a location.
    ///
    /// `Ok(None)` means the service has no answer for these coordinates;
    /// `Err` is reserved for transport and protocol failures.
    fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<Location>>;
}

/// Geocoding service that never resolves anything.
///
/// Used when geocoding is disabled; coordinate enrichment still runs, only
/// the address fields are skipped.
pub struct NullGeocodingService;

impl GeocodingService for NullGeocodingService {
    fn reverse_geocode(&self, _latitude: f64, _longitude: f64) -> Result<Option<Location>> {
        Ok(None)
    }
}

/// Offline geocoding service for testing and air-gapped use.
///
/// Resolves a few well-known metropolitan coordinate ranges and answers
/// `None` for everything else.
pub struct OfflineGeocodingService;

impl GeocodingService for OfflineGeocodingService {
    fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<Location>> {
        // Chicago area (roughly)
        if latitude > 41.5 && latitude < 42.0 && longitude > -88.0 && longitude < -87.5 {
            return Ok(Some(Location::from_components(
                Some("Chicago".to_string()),
                Some("Cook County".to_string()),
                Some("Illinois".to_string()),
                Some("United States".to_string()),
                Some("us".to_string()),
            )));
        }

        // New York area (roughly)
        if latitude > 40.5 && latitude < 41.0 && longitude > -74.5 && longitude < -73.5 {
            return Ok(Some(Location::from_components(
                Some("New York".to_string()),
                None,
                Some("New York".to_string()),
                Some("United States".to_string()),
                Some("us".to_string()),
            )));
        }

        // San Francisco area (roughly)
        if latitude > 37.5 && latitude < 38.0 && longitude > -123.0 && longitude < -122.0 {
            return Ok(Some(Location::from_components(
                Some("San Francisco".to_string()),
                None,
                Some("California".to_string()),
                Some("United States".to_string()),
                Some("us".to_string()),
            )));
        }

        // London area (roughly)
        if latitude > 51.0 && latitude < 52.0 && longitude > -0.5 && longitude < 0.5 {
            return Ok(Some(Location::from_components(
                Some("London".to_string()),
                None,
                Some("England".to_string()),
                Some("United Kingdom".to_string()),
                Some("gb".to_string()),
            )));
        }

        Ok(None)
    }
}

/// Geocoding service backed by the OSM Nominatim reverse endpoint.
pub struct NominatimGeocodingService {
    client: reqwest::blocking::Client,
    base_url: String,
}

/// Subset of the Nominatim reverse response we care about.
#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl NominatimGeocodingService {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        Self::with_base_url("https://nominatim.openstreetmap.org", user_agent, timeout_secs)
    }

    /// Construct against a custom endpoint (self-hosted instances, tests).
    pub fn with_base_url(base_url: &str, user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client for geocoding")?;

        Ok(NominatimGeocodingService {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl GeocodingService for NominatimGeocodingService {
    fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<Location>> {
        let url = format!("{}/reverse", self.base_url);
        debug!("Reverse geocoding {:.6},{:.6} via {}", latitude, longitude, url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "json".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .context("Geocoding request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Geocoding service returned status {}", response.status());
        }

        let body: NominatimResponse = response
            .json()
            .context("Failed to parse geocoding response")?;

        let Some(address) = body.address else {
            return Ok(None);
        };

        let city = address.city.or(address.town).or(address.village);
        Ok(Some(Location::from_components(
            city,
            address.county,
            address.state,
            address.country,
            address.country_code,
        )))
    }
}

/// Factory function to create the geocoding service the config asks for
pub fn create_geocoding_service(config: &crate::config::Config) -> Result<Box<dyn GeocodingService>> {
    use crate::config::GeocoderKind;

    match config.geocoder {
        GeocoderKind::Nominatim => Ok(Box::new(NominatimGeocodingService::new(
            &config.geocoder_user_agent,
            config.geocoder_timeout_secs,
        )?)),
        GeocoderKind::Offline => Ok(Box::new(OfflineGeocodingService)),
        GeocoderKind::None => Ok(Box::new(NullGeocodingService)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_geocoding_chicago() {
        let service = OfflineGeocodingService;
        let result = service.reverse_geocode(41.8781, -87.6298).unwrap().unwrap();

        assert_eq!(
            result.formatted_address,
            "Chicago, Cook County, Illinois, United States"
        );
        assert_eq!(result.city, Some("Chicago".to_string()));
        assert_eq!(result.state, Some("Illinois".to_string()));
        assert_eq!(result.country, Some("United States".to_string()));
    }

    #[test]
    fn test_offline_geocoding_unknown_location() {
        let service = OfflineGeocodingService;
        let result = service.reverse_geocode(0.0, 0.0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_null_service_resolves_nothing() {
        let service = NullGeocodingService;
        assert!(service.reverse_geocode(41.8781, -87.6298).unwrap().is_none());
    }

    #[test]
    fn test_location_display() {
        let location = Location::from_components(
            Some("Test City".to_string()),
            None,
            Some("Test State".to_string()),
            Some("Test Country".to_string()),
            None,
        );

        assert_eq!(
            format!("{}", location),
            "Test City, Test State, Test Country"
        );
    }

    #[test]
    fn test_nominatim_parses_response() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/reverse")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"address": {"city": "New York", "state": "New York",
                    "country": "United States", "country_code": "us"}}"#,
            )
            .create();

        let service =
            NominatimGeocodingService::with_base_url(&server.url(), "metaprobe-test", 5).unwrap();
        let result = service.reverse_geocode(40.7128, -74.0060).unwrap().unwrap();

        assert_eq!(result.city, Some("New York".to_string()));
        assert_eq!(result.country_code, Some("us".to_string()));
        mock.assert();
    }

    #[test]
    fn test_nominatim_town_falls_back_to_city() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/reverse")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"address": {"town": "Woodstock", "country": "United States"}}"#)
            .create();

        let service =
            NominatimGeocodingService::with_base_url(&server.url(), "metaprobe-test", 5).unwrap();
        let result = service.reverse_geocode(42.0, -74.1).unwrap().unwrap();
        assert_eq!(result.city, Some("Woodstock".to_string()));
    }

    #[test]
    fn test_nominatim_error_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/reverse")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create();

        let service =
            NominatimGeocodingService::with_base_url(&server.url(), "metaprobe-test", 5).unwrap();
        assert!(service.reverse_geocode(0.0, 0.0).is_err());
    }
}
