//! Geographic location resolved for a visit.

/// Location data attached to a visit once the location stage has processed it.
///
/// A visit without a `VisitLocation` has not been processed yet. A visit whose
/// location [`is_empty`](Self::is_empty) was processed, but no geolocation data
/// applied to it (local address, malformed address, or address unknown to the
/// geolocation database).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisitLocation {
    pub country_code: String,
    pub country_name: String,
    pub region_name: String,
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl VisitLocation {
    /// The "attempted, nothing usable" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.country_code.is_empty()
            && self.country_name.is_empty()
            && self.region_name.is_empty()
            && self.city_name.is_empty()
            && self.timezone.is_empty()
            && self.latitude == 0.0
            && self.longitude == 0.0
    }
}
