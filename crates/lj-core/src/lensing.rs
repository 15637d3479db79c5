//! Apparent parameters of individual lensed images.
//!
//! A gravitationally lensed image sees the source through a magnification
//! `mu`, a time delay `dt` and a Morse phase shift fixed by the image type.
//! The apparent ("effective") parameters inferred from a single image are
//! related to the source parameters by
//!
//! - `d_eff = d / sqrt(|mu|)`
//! - `t_eff = t + dt`
//! - `phase_eff = phase - pi * n_j`
//!
//! where `n_j` is the Morse index (0, 1/2, 1 for type I/II/III images).

use crate::{Error, Result};

/// Lensed image type, classified by the Morse index of the stationary point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// Minimum of the time-delay surface (`n_j = 0`).
    TypeI,
    /// Saddle point (`n_j = 1/2`).
    TypeII,
    /// Maximum (`n_j = 1`).
    TypeIII,
}

impl ImageType {
    /// Morse index `n_j`.
    pub fn morse_index(self) -> f64 {
        match self {
            ImageType::TypeI => 0.0,
            ImageType::TypeII => 0.5,
            ImageType::TypeIII => 1.0,
        }
    }

    /// Phase shift `-pi * n_j` applied to the coalescence phase.
    pub fn morse_phase_shift(self) -> f64 {
        -std::f64::consts::PI * self.morse_index()
    }
}

/// Per-image lensing quantities relating source to apparent parameters.
#[derive(Debug, Clone, Copy)]
pub struct ImageLensing {
    /// Magnification `mu` (sign encodes parity; only `|mu|` enters the distance).
    pub magnification: f64,
    /// Time delay relative to the unlensed arrival, in the same unit as the time column.
    pub time_delay: f64,
    /// Image type fixing the Morse phase shift.
    pub image_type: ImageType,
}

impl ImageLensing {
    /// Apparent luminosity distance `d / sqrt(|mu|)`.
    pub fn effective_luminosity_distance(&self, luminosity_distance: f64) -> Result<f64> {
        let mu = self.magnification;
        if !mu.is_finite() || mu == 0.0 {
            return Err(Error::Validation(format!(
                "magnification must be finite and non-zero, got {mu}"
            )));
        }
        Ok(luminosity_distance / mu.abs().sqrt())
    }

    /// Apparent coalescence time `t + dt`.
    pub fn effective_geocent_time(&self, geocent_time: f64) -> f64 {
        geocent_time + self.time_delay
    }

    /// Apparent coalescence phase `phase - pi * n_j`.
    pub fn effective_phase(&self, phase: f64) -> f64 {
        phase + self.image_type.morse_phase_shift()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_morse_phase_shifts() {
        assert_eq!(ImageType::TypeI.morse_phase_shift(), 0.0);
        assert!((ImageType::TypeII.morse_phase_shift() + PI / 2.0).abs() < 1e-15);
        assert!((ImageType::TypeIII.morse_phase_shift() + PI).abs() < 1e-15);
    }

    #[test]
    fn test_effective_distance_uses_abs_magnification() {
        let img = ImageLensing { magnification: -4.0, time_delay: 0.0, image_type: ImageType::TypeII };
        let d = img.effective_luminosity_distance(1000.0).unwrap();
        assert!((d - 500.0).abs() < 1e-12, "d_eff = {d}");
    }

    #[test]
    fn test_zero_magnification_rejected() {
        let img = ImageLensing { magnification: 0.0, time_delay: 0.0, image_type: ImageType::TypeI };
        assert!(img.effective_luminosity_distance(1000.0).is_err());
    }

    #[test]
    fn test_effective_time_and_phase() {
        let img =
            ImageLensing { magnification: 2.0, time_delay: 86400.0, image_type: ImageType::TypeII };
        assert!((img.effective_geocent_time(1e9) - (1e9 + 86400.0)).abs() < 1e-6);
        assert!((img.effective_phase(1.0) - (1.0 - PI / 2.0)).abs() < 1e-15);
    }
}
