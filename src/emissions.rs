//! CO2 savings of a trip compared to driving the same distance by car.
//!
//! Footprints are lifecycle estimates per kilometer (manufacturing, battery,
//! charging) and are intentionally coarse; they feed trip summaries and
//! aggregate totals, not carbon accounting.

use crate::VehicleType;

/// Average passenger car emissions (g CO2 per km).
pub const CAR_BASELINE_G_PER_KM: f64 = 120.0;

/// Lifecycle footprint of a vehicle (g CO2 per km).
pub fn footprint_g_per_km(vehicle: VehicleType) -> f64 {
    match vehicle {
        VehicleType::Scooter => 35.0,
        VehicleType::Bike => 0.0,
        VehicleType::EBike => 22.0,
        VehicleType::Unicycle => 30.0,
    }
}

/// Grams of CO2 avoided by riding `distance_m` instead of driving.
///
/// Never negative; invalid distances count as zero.
pub fn co2_saved_grams(distance_m: f64, vehicle: VehicleType) -> f64 {
    if !distance_m.is_finite() || distance_m <= 0.0 {
        return 0.0;
    }
    let saved_per_km = (CAR_BASELINE_G_PER_KM - footprint_g_per_km(vehicle)).max(0.0);
    distance_m / 1000.0 * saved_per_km
}
