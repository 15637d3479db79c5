//! Derived mass coordinates.
//!
//! Compact-binary priors are often declared over chirp mass and mass ratio
//! rather than the component masses the sampler works in. These helpers add
//! the derived columns to a table ahead of prior evaluation.

use crate::{Result, SampleTable};

/// Column name of the first component mass.
pub const MASS_1: &str = "mass_1";
/// Column name of the second component mass.
pub const MASS_2: &str = "mass_2";
/// Column name of the derived chirp mass.
pub const CHIRP_MASS: &str = "chirp_mass";
/// Column name of the derived mass ratio.
pub const MASS_RATIO: &str = "mass_ratio";

/// Chirp mass `(m1 m2)^(3/5) / (m1 + m2)^(1/5)`.
#[inline]
pub fn chirp_mass(m1: f64, m2: f64) -> f64 {
    (m1 * m2).powf(0.6) / (m1 + m2).powf(0.2)
}

/// Mass ratio `m2 / m1` (conventionally <= 1 for m1 >= m2).
#[inline]
pub fn mass_ratio(m1: f64, m2: f64) -> f64 {
    m2 / m1
}

/// Append `chirp_mass` and `mass_ratio` columns when both component masses
/// are present and the derived columns are not.
///
/// Tables without mass columns are returned unchanged, so the helper is safe
/// to call unconditionally ahead of every prior evaluation.
pub fn with_derived_mass_parameters(table: &SampleTable) -> Result<SampleTable> {
    let (Some(m1), Some(m2)) = (table.column(MASS_1), table.column(MASS_2)) else {
        return Ok(table.clone());
    };
    if table.params().contains(CHIRP_MASS) || table.params().contains(MASS_RATIO) {
        return Ok(table.clone());
    }
    let mc: Vec<f64> = m1.iter().zip(m2).map(|(&a, &b)| chirp_mass(a, b)).collect();
    let q: Vec<f64> = m1.iter().zip(m2).map(|(&a, &b)| mass_ratio(a, b)).collect();
    table.with_appended_columns([(CHIRP_MASS.to_string(), mc), (MASS_RATIO.to_string(), q)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParameterSet;

    #[test]
    fn test_chirp_mass_equal_masses() {
        // For m1 = m2 = m: Mc = m * 2^(-1/5).
        let m = 30.0;
        let expected = m * 2f64.powf(-0.2);
        assert!((chirp_mass(m, m) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_derived_columns_added() {
        let params = ParameterSet::new([MASS_1, MASS_2, "luminosity_distance"]).unwrap();
        let table =
            SampleTable::from_rows(params, &[vec![36.0, 29.0, 410.0], vec![30.0, 30.0, 500.0]])
                .unwrap();
        let out = with_derived_mass_parameters(&table).unwrap();
        assert!(out.params().contains(CHIRP_MASS));
        assert!(out.params().contains(MASS_RATIO));
        let q = out.column(MASS_RATIO).unwrap();
        assert!((q[0] - 29.0 / 36.0).abs() < 1e-12);
        assert!((q[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_mass_columns_is_identity() {
        let params = ParameterSet::new(["x", "y"]).unwrap();
        let table = SampleTable::from_rows(params.clone(), &[vec![1.0, 2.0]]).unwrap();
        let out = with_derived_mass_parameters(&table).unwrap();
        assert_eq!(out.params(), &params);
    }
}
