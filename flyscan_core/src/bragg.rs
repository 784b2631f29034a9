//! Photon energy <-> Bragg angle for a crystal of lattice spacing `d`.
//!
//! `λ = 2 d sin θ` and `E = 1 / (K λ)` with `K` the energy-to-wavenumber
//! constant. Energies in eV, angles in degrees, `d` in ångström.

use crate::error::ScanError;

/// Wavenumber per electron-volt, m⁻¹·eV⁻¹ (1 / hc in those units).
pub const ENERGY_WAVENUMBER: f64 = 8.065_543_937e5;

const METRES_PER_ANGSTROM: f64 = 1e-10;

fn check_d_spacing(d_spacing: f64) -> Result<(), ScanError> {
    if d_spacing.is_finite() && d_spacing > 0.0 {
        Ok(())
    } else {
        Err(ScanError::OutOfRange(format!(
            "d-spacing must be positive, got {d_spacing} Å"
        )))
    }
}

/// Lowest energy the crystal can diffract (θ = 90°).
pub fn min_energy(d_spacing: f64) -> f64 {
    1.0 / (ENERGY_WAVENUMBER * 2.0 * d_spacing * METRES_PER_ANGSTROM)
}

pub fn angle_from_energy(energy_ev: f64, d_spacing: f64) -> Result<f64, ScanError> {
    check_d_spacing(d_spacing)?;
    if !(energy_ev.is_finite() && energy_ev > 0.0) {
        return Err(ScanError::OutOfRange(format!(
            "energy must be positive, got {energy_ev} eV"
        )));
    }
    let wavelength_m = 1.0 / (ENERGY_WAVENUMBER * energy_ev);
    let ratio = wavelength_m / (2.0 * d_spacing * METRES_PER_ANGSTROM);
    if ratio > 1.0 {
        return Err(ScanError::OutOfRange(format!(
            "{energy_ev} eV is below the {:.3} eV minimum for d = {d_spacing} Å",
            min_energy(d_spacing)
        )));
    }
    Ok(ratio.asin().to_degrees())
}

pub fn energy_from_angle(angle_deg: f64, d_spacing: f64) -> Result<f64, ScanError> {
    check_d_spacing(d_spacing)?;
    if !(angle_deg > 0.0 && angle_deg < 90.0) {
        return Err(ScanError::OutOfRange(format!(
            "Bragg angle must lie in (0°, 90°), got {angle_deg}°"
        )));
    }
    let wavelength_m = 2.0 * d_spacing * METRES_PER_ANGSTROM * angle_deg.to_radians().sin();
    Ok(1.0 / (ENERGY_WAVENUMBER * wavelength_m))
}
