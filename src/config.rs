//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The loaded `AppConfig` is passed explicitly into each component;
//! nothing reads configuration from ambient globals.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{RentalWindow, RentwatchError};

/// Base URL of the rentalcars.com search results page.
pub const SEARCH_BASE_URL: &str = "https://www.rentalcars.com/search-results";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub location: LocationConfig,
    pub pickup: DateTimeConfig,
    pub dropoff: DateTimeConfig,
    pub drivers_age: u32,
    pub transmission: String,
    pub car_category: String,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    pub name: String,
    pub iata: String,
    /// "lat,lon" as the search form expects it.
    pub coordinates: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DateTimeConfig {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl DateTimeConfig {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_cheap_percentile")]
    pub cheap_percentile: f64,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub desktop_notify: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            cheap_percentile: default_cheap_percentile(),
            poll_interval_minutes: default_poll_interval_minutes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            desktop_notify: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_dashboard_port(),
        }
    }
}

fn default_cheap_percentile() -> f64 {
    0.25
}

/// Longest accepted poll interval: 30 days.
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 30 * 24 * 60;

fn default_poll_interval_minutes() -> u64 {
    360
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data").join("prices.db")
}

fn default_dashboard_port() -> u16 {
    8080
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RentwatchError> {
        let pickup = self
            .pickup
            .date()
            .ok_or_else(|| RentwatchError::Config("pickup date does not exist".into()))?;
        let dropoff = self
            .dropoff
            .date()
            .ok_or_else(|| RentwatchError::Config("dropoff date does not exist".into()))?;
        if dropoff < pickup {
            return Err(RentwatchError::Config(format!(
                "dropoff {dropoff} is before pickup {pickup}"
            )));
        }
        if !(0.0..=1.0).contains(&self.watch.cheap_percentile) {
            return Err(RentwatchError::Config(format!(
                "cheap_percentile must be within [0, 1], got {}",
                self.watch.cheap_percentile
            )));
        }
        if !(1..=MAX_POLL_INTERVAL_MINUTES).contains(&self.watch.poll_interval_minutes) {
            return Err(RentwatchError::Config(format!(
                "poll_interval_minutes must be within [1, {MAX_POLL_INTERVAL_MINUTES}], got {}",
                self.watch.poll_interval_minutes
            )));
        }
        Ok(())
    }

    /// Pickup date as `YYYY-MM-DD`.
    pub fn pickup_date(&self) -> String {
        format_ymd(&self.pickup)
    }

    /// Dropoff date as `YYYY-MM-DD`.
    pub fn dropoff_date(&self) -> String {
        format_ymd(&self.dropoff)
    }

    /// The rental window this configuration searches for.
    pub fn window(&self) -> RentalWindow {
        RentalWindow::new(self.pickup_date(), self.dropoff_date())
    }

    /// Whole days between pickup and dropoff, never less than one.
    pub fn rental_days(&self) -> u32 {
        match (self.pickup.date(), self.dropoff.date()) {
            (Some(pickup), Some(dropoff)) => {
                let days = (dropoff - pickup).num_days().max(1);
                u32::try_from(days).unwrap_or(u32::MAX)
            }
            _ => 1,
        }
    }

    /// Short label for messages, e.g. "Rentalcars ALC".
    pub fn label(&self) -> String {
        format!("Rentalcars {}", self.location.iata)
    }

    /// Query parameters of the search form, in the order the site uses.
    pub fn search_params(&self) -> Vec<(&'static str, String)> {
        let loc = &self.location;
        let pu = &self.pickup;
        let dropoff = &self.dropoff;
        vec![
            ("location", String::new()),
            ("dropLocation", String::new()),
            ("locationName", loc.name.clone()),
            ("locationIata", loc.iata.clone()),
            ("dropLocationName", loc.name.clone()),
            ("dropLocationIata", loc.iata.clone()),
            ("coordinates", loc.coordinates.clone()),
            ("dropCoordinates", loc.coordinates.clone()),
            ("driversAge", self.drivers_age.to_string()),
            ("puDay", pu.day.to_string()),
            ("puMonth", pu.month.to_string()),
            ("puYear", pu.year.to_string()),
            ("puMinute", pu.minute.to_string()),
            ("puHour", pu.hour.to_string()),
            ("doDay", dropoff.day.to_string()),
            ("doMonth", dropoff.month.to_string()),
            ("doYear", dropoff.year.to_string()),
            ("doMinute", dropoff.minute.to_string()),
            ("doHour", dropoff.hour.to_string()),
            ("ftsType", "A".to_string()),
            ("dropFtsType", "A".to_string()),
            ("filterCriteria_transmission", self.transmission.clone()),
            ("filterCriteria_carCategory", self.car_category.clone()),
        ]
    }

    /// Fully-qualified search URL with form-encoded parameters.
    pub fn search_url(&self) -> String {
        let query = self
            .search_params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, encode_form_value(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{SEARCH_BASE_URL}?{query}")
    }
}

/// Minimal valid configuration used by tests across the crate.
#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
drivers_age = 30
transmission = "automatic"
car_category = "small"

[location]
name = "Alicante Airport"
iata = "ALC"
coordinates = "38.2822,-0.558156"

[pickup]
year = 2026
month = 7
day = 1
hour = 10
minute = 0

[dropoff]
year = 2026
month = 7
day = 8
hour = 10
minute = 30
"#;

#[cfg(test)]
impl AppConfig {
    pub fn sample() -> Self {
        Self::from_toml(SAMPLE_CONFIG).expect("sample config is valid")
    }
}

fn format_ymd(dt: &DateTimeConfig) -> String {
    format!("{:04}-{:02}-{:02}", dt.year, dt.month, dt.day)
}

/// `application/x-www-form-urlencoded` value: percent-encoding with spaces as `+`.
fn encode_form_value(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
