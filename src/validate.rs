//! Input validation shared by kernel builders and solvers.
//!
//! Checks run once at entry; failures never leave partially written
//! outputs behind.

use crate::error::QsmError;

/// Every spatial extent must be positive.
pub(crate) fn check_shape(name: &'static str, shape: [usize; 3]) -> Result<(), QsmError> {
    if shape.iter().any(|&n| n == 0) {
        return Err(QsmError::shape_mismatch(
            name,
            format!("shape {:?} has an empty axis", shape),
        ));
    }
    Ok(())
}

/// Voxel sizes must be finite and positive.
pub(crate) fn check_voxel_size(vsz: [f64; 3]) -> Result<(), QsmError> {
    for &v in &vsz {
        if !v.is_finite() || v <= 0.0 {
            return Err(QsmError::invalid_value("vsz", v));
        }
    }
    Ok(())
}

/// The B-field direction must be finite and nonzero. Returns the unit
/// vector.
pub(crate) fn check_direction(bdir: [f64; 3]) -> Result<[f64; 3], QsmError> {
    for &b in &bdir {
        if !b.is_finite() {
            return Err(QsmError::invalid_value("bdir", b));
        }
    }
    let norm2 = bdir[0] * bdir[0] + bdir[1] * bdir[1] + bdir[2] * bdir[2];
    if norm2 == 0.0 {
        return Err(QsmError::invalid_value("bdir", 0.0));
    }
    let norm = norm2.sqrt();
    Ok([bdir[0] / norm, bdir[1] / norm, bdir[2] / norm])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_voxel_size() {
        assert!(check_voxel_size([1.0, 0.5, 2.0]).is_ok());
        assert!(check_voxel_size([1.0, 0.0, 1.0]).is_err());
        assert!(check_voxel_size([1.0, -0.6, 1.0]).is_err());
        assert!(check_voxel_size([f64::NAN, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_check_direction_normalizes() {
        let b = check_direction([0.0, 0.0, 2.0]).unwrap();
        assert_eq!(b, [0.0, 0.0, 1.0]);

        let b = check_direction([3.0, 4.0, 0.0]).unwrap();
        assert!((b[0] - 0.6).abs() < 1e-15);
        assert!((b[1] - 0.8).abs() < 1e-15);

        assert!(check_direction([0.0, 0.0, 0.0]).is_err());
        assert!(check_direction([f64::INFINITY, 0.0, 0.0]).is_err());
    }
}
