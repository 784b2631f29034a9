/// A scan request: sweep photon energy `start -> end` (eV), tagging
/// `point_count` points within `total_time` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRange {
    pub start: f64,
    pub end: f64,
    pub point_count: u32,
    pub total_time: f64,
}

impl EnergyRange {
    pub fn new(start: f64, end: f64, point_count: u32, total_time: f64) -> Self {
        Self {
            start,
            end,
            point_count,
            total_time,
        }
    }
}

/// Crystal lattice spacing in ångström.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrystalGeometry {
    pub d_spacing: f64,
}

impl CrystalGeometry {
    pub fn new(d_spacing: f64) -> Self {
        Self { d_spacing }
    }

    /// Build from the "2d" value some beamline tables quote, in ångström.
    pub fn from_two_d(two_d: f64) -> Self {
        Self {
            d_spacing: two_d / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_d_is_halved() {
        assert_eq!(CrystalGeometry::from_two_d(6.2711), CrystalGeometry::new(3.13555));
    }
}
