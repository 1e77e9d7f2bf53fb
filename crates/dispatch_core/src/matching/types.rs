use std::fmt;

use uuid::Uuid;

use crate::model::VehicleTier;

/// A driver eligible for a ride, with the data ranking needs.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
    pub rating: f64,
}

/// Why matching produced no candidate, computed by successively relaxing
/// the matching query. `Display` gives the user-facing message stored as
/// the ride's failure reason.
#[derive(Debug, Clone, PartialEq)]
pub enum NoMatchReason {
    /// No drivers of this tier exist in the region at all.
    NoDriversInRegion { tier: VehicleTier, region: String },
    /// Drivers exist but every one is busy, on a ride or offline.
    NoneAvailable { tier: VehicleTier, region: String },
    /// No driver has reported a location within the search radius.
    NoLocationsInRadius { radius_km: f64 },
    /// Available drivers exist but none is within the search radius.
    NoneWithinRadius {
        tier: VehicleTier,
        region: String,
        radius_km: f64,
    },
    /// Fallback when relaxation finds candidates but ranking still failed.
    NoSuitableDriver,
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDriversInRegion { tier, region } => write!(
                f,
                "No {tier} drivers found in {region} region. Please try a different vehicle tier or region."
            ),
            Self::NoneAvailable { tier, region } => write!(
                f,
                "No available {tier} drivers in {region}. All drivers are currently busy or offline."
            ),
            Self::NoLocationsInRadius { radius_km } => write!(
                f,
                "No drivers found within {radius_km:.1} km of pickup location. Drivers may need to update their location."
            ),
            Self::NoneWithinRadius {
                tier,
                region,
                radius_km,
            } => write!(
                f,
                "Available {tier} drivers in {region} are not within {radius_km:.1} km of pickup location."
            ),
            Self::NoSuitableDriver => {
                write!(f, "No suitable driver found. Please try again later.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_cite_tier_region_and_radius() {
        let reason = NoMatchReason::NoDriversInRegion {
            tier: VehicleTier::Luxury,
            region: "downtown".into(),
        };
        let message = reason.to_string();
        assert!(message.contains("LUXURY"));
        assert!(message.contains("downtown"));

        let reason = NoMatchReason::NoLocationsInRadius { radius_km: 5.0 };
        assert!(reason.to_string().contains("5.0 km"));
    }
}
