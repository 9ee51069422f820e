//! Venue display resolution.
//!
//! Sessions carry a human-readable venue string resolved once at generation
//! time through a fallback chain: campus venue name, then campus name with
//! city, then location city, then a placeholder.

use serde::{Deserialize, Serialize};

use crate::tournament::Tournament;

/// Placeholder used when no venue information is available
pub const UNRESOLVED_VENUE: &str = "TBD";

/// Location data known about a tournament
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueInfo {
    /// Assigned location id, used to match assistant instructors
    pub location_id: Option<i64>,
    /// Specific venue on a campus (e.g. "Court 3")
    pub campus_venue_name: Option<String>,
    /// Campus name
    pub campus_name: Option<String>,
    /// City of the campus
    pub campus_city: Option<String>,
    /// City of the location record
    pub location_city: Option<String>,
}

impl VenueInfo {
    /// Venue info for a location known only by city
    pub fn city(city: impl Into<String>) -> Self {
        Self {
            location_city: Some(city.into()),
            ..Self::default()
        }
    }

    /// Venue info for a campus
    pub fn campus(name: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            campus_name: Some(name.into()),
            campus_city: Some(city.into()),
            ..Self::default()
        }
    }

    /// Set the specific venue on the campus
    pub fn with_venue_name(mut self, venue: impl Into<String>) -> Self {
        self.campus_venue_name = Some(venue.into());
        self
    }

    /// Set the location id
    pub fn with_location_id(mut self, location_id: i64) -> Self {
        self.location_id = Some(location_id);
        self
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Resolve the display string for a venue
pub fn display_name(info: &VenueInfo) -> String {
    if let Some(venue) = present(&info.campus_venue_name) {
        return venue.to_string();
    }

    if let Some(campus) = present(&info.campus_name) {
        return match present(&info.campus_city).or_else(|| present(&info.location_city)) {
            Some(city) => format!("{campus}, {city}"),
            None => campus.to_string(),
        };
    }

    present(&info.location_city)
        .map(str::to_string)
        .unwrap_or_else(|| UNRESOLVED_VENUE.to_string())
}

/// Resolves the venue string stamped onto generated sessions
///
/// Implemented for any `Fn(&Tournament) -> String`, so callers can inject a
/// plain closure.
pub trait VenueResolver: Send + Sync {
    /// Display string for the tournament's sessions
    fn resolve(&self, tournament: &Tournament) -> String;
}

impl<F> VenueResolver for F
where
    F: Fn(&Tournament) -> String + Send + Sync,
{
    fn resolve(&self, tournament: &Tournament) -> String {
        self(tournament)
    }
}

/// Default resolver applying [`display_name`] to the tournament's location
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackVenueResolver;

impl VenueResolver for FallbackVenueResolver {
    fn resolve(&self, tournament: &Tournament) -> String {
        display_name(&tournament.location)
    }
}
