//! Mask utilities: bounding boxes, binary erosion, and geometric masks.
//!
//! Masks are flat `u8` volumes in Fortran (column-major) order, nonzero
//! meaning inside. Erosion uses the 18-connectivity neighborhood (the
//! 3x3x3 cube minus its eight corners), the stencil used to trim unreliable
//! boundary voxels before dipole inversion.

use crate::error::QsmError;
use crate::parallel;

/// Values a mask can hold, with the comparison rule used by
/// [`crop_indices`]: exact for integers, approximate for floats.
pub trait MaskValue: Copy + Send + Sync {
    fn differs(self, outside: Self) -> bool;
}

impl MaskValue for u8 {
    #[inline]
    fn differs(self, outside: Self) -> bool {
        self != outside
    }
}

impl MaskValue for f32 {
    #[inline]
    fn differs(self, outside: Self) -> bool {
        let tol = (f32::EPSILON).sqrt() * self.abs().max(outside.abs());
        (self - outside).abs() > tol
    }
}

impl MaskValue for f64 {
    #[inline]
    fn differs(self, outside: Self) -> bool {
        let tol = (f64::EPSILON).sqrt() * self.abs().max(outside.abs());
        (self - outside).abs() > tol
    }
}

/// Inclusive bounding box of all voxels differing from `outside`.
///
/// Returns `(lo, hi)` corner indices. When every voxel equals `outside`
/// the full-volume box is returned.
pub fn crop_indices<T: MaskValue>(
    m: &[T],
    shape: [usize; 3],
    outside: T,
) -> Result<([usize; 3], [usize; 3]), QsmError> {
    let [nx, ny, nz] = shape;
    if m.len() != nx * ny * nz {
        return Err(QsmError::shape_mismatch(
            "crop_indices",
            format!("mask length {} does not match shape {:?}", m.len(), shape),
        ));
    }

    let mut lo = [usize::MAX; 3];
    let mut hi = [0usize; 3];
    let mut found = false;

    for k in 0..nz {
        for j in 0..ny {
            let start = j * nx + k * nx * ny;
            let row = &m[start..start + nx];
            for (i, &v) in row.iter().enumerate() {
                if v.differs(outside) {
                    found = true;
                    lo[0] = lo[0].min(i);
                    lo[1] = lo[1].min(j);
                    lo[2] = lo[2].min(k);
                    hi[0] = hi[0].max(i);
                    hi[1] = hi[1].max(j);
                    hi[2] = hi[2].max(k);
                }
            }
        }
    }

    if !found {
        return Ok(([0, 0, 0], [nx - 1, ny - 1, nz - 1]));
    }
    Ok((lo, hi))
}

/// Extract the inclusive box `(lo, hi)` from a volume. Returns the cropped
/// buffer and its shape.
pub fn crop<T>(
    x: &[T],
    shape: [usize; 3],
    lo: [usize; 3],
    hi: [usize; 3],
) -> Result<(Vec<T>, [usize; 3]), QsmError>
where
    T: Copy + Send + Sync + Default,
{
    let [nx, ny, nz] = shape;
    if x.len() != nx * ny * nz {
        return Err(QsmError::shape_mismatch(
            "crop",
            format!("input length {} does not match shape {:?}", x.len(), shape),
        ));
    }
    for i in 0..3 {
        if lo[i] > hi[i] || hi[i] >= shape[i] {
            return Err(QsmError::shape_mismatch(
                "crop",
                format!("box {:?}..{:?} exceeds shape {:?}", lo, hi, shape),
            ));
        }
    }

    let cshape = [hi[0] - lo[0] + 1, hi[1] - lo[1] + 1, hi[2] - lo[2] + 1];
    let [cnx, cny, _cnz] = cshape;
    let mut out = vec![T::default(); cshape.iter().product()];

    parallel::for_each_slab(&mut out, cnx * cny, |k, slab| {
        for j in 0..cny {
            let src = lo[0] + (lo[1] + j) * nx + (lo[2] + k) * nx * ny;
            slab[j * cnx..(j + 1) * cnx].copy_from_slice(&x[src..src + cnx]);
        }
    });
    Ok((out, cshape))
}

/// 18-connectivity stencil: the 3x3x3 cube minus its eight corners,
/// center included (19 taps).
const ERODE_OFFSETS: [(i32, i32, i32); 19] = [
    (0, 0, 0),
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
    (-1, -1, 0),
    (-1, 1, 0),
    (1, -1, 0),
    (1, 1, 0),
    (-1, 0, -1),
    (-1, 0, 1),
    (1, 0, -1),
    (1, 0, 1),
    (0, -1, -1),
    (0, -1, 1),
    (0, 1, -1),
    (0, 1, 1),
];

/// Binary erosion with the 18-connectivity stencil, applied `iter` times.
///
/// A voxel survives a round when all 19 stencil taps are nonzero in the
/// previous round. Voxels within `t` of the volume boundary are zero after
/// round `t`. `iter == 0` returns a copy of the input.
pub fn erode_mask(m: &[u8], shape: [usize; 3], iter: usize) -> Result<Vec<u8>, QsmError> {
    let [nx, ny, nz] = shape;
    if m.len() != nx * ny * nz {
        return Err(QsmError::shape_mismatch(
            "erode_mask",
            format!("mask length {} does not match shape {:?}", m.len(), shape),
        ));
    }

    let mut a = m.to_vec();
    if iter == 0 {
        return Ok(a);
    }
    let mut b = vec![0u8; m.len()];

    for t in 1..=iter {
        let (kx0, kx1) = (t, nx.saturating_sub(t));
        let (ky0, ky1) = (t, ny.saturating_sub(t));
        let (kz0, kz1) = (t, nz.saturating_sub(t));
        parallel::fill(&mut b, 0);
        let src = &a;
        parallel::for_each_slab(&mut b, nx * ny, |k, slab| {
            if k < kz0 || k >= kz1 {
                return;
            }
            for j in ky0..ky1 {
                for i in kx0..kx1 {
                    let inside = ERODE_OFFSETS.iter().all(|&(dx, dy, dz)| {
                        let idx = (i as i32 + dx) as usize
                            + (j as i32 + dy) as usize * nx
                            + (k as i32 + dz) as usize * nx * ny;
                        src[idx] != 0
                    });
                    slab[i + j * nx] = inside as u8;
                }
            }
        });
        std::mem::swap(&mut a, &mut b);
    }
    Ok(a)
}

/// Binary sphere mask centered at `center` (voxel coordinates) with the
/// given radius in voxels.
pub fn sphere_mask(shape: [usize; 3], center: [f64; 3], radius: f64) -> Vec<u8> {
    let [nx, ny, _nz] = shape;
    let mut mask = vec![0u8; shape.iter().product()];
    let r2 = radius * radius;

    parallel::for_each_slab(&mut mask, nx * ny, |k, slab| {
        let dz = k as f64 - center[2];
        for j in 0..ny {
            let dy = j as f64 - center[1];
            for i in 0..nx {
                let dx = i as f64 - center[0];
                if dx * dx + dy * dy + dz * dz <= r2 {
                    slab[i + j * nx] = 1;
                }
            }
        }
    });
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_indices_box() {
        let shape = [6, 5, 4];
        let mut m = vec![0u8; 6 * 5 * 4];
        m[2 + 6 + 30] = 1;
        m[4 + 3 * 6 + 2 * 30] = 1;

        let (lo, hi) = crop_indices(&m, shape, 0).unwrap();
        assert_eq!(lo, [2, 1, 1]);
        assert_eq!(hi, [4, 3, 2]);
    }

    #[test]
    fn test_crop_indices_empty_mask() {
        let shape = [4, 3, 2];
        let m = vec![0u8; 24];
        let (lo, hi) = crop_indices(&m, shape, 0).unwrap();
        assert_eq!(lo, [0, 0, 0], "empty mask must return the full box");
        assert_eq!(hi, [3, 2, 1]);
    }

    #[test]
    fn test_crop_indices_float_approximate() {
        let shape = [3, 1, 1];
        // A value within roundoff of the outside level does not count.
        let m = vec![1.0f64, 1.0 + 1e-12, 2.0];
        let (lo, hi) = crop_indices(&m, shape, 1.0).unwrap();
        assert_eq!(lo, [2, 0, 0]);
        assert_eq!(hi, [2, 0, 0]);
    }

    #[test]
    fn test_crop_extracts_box() {
        let shape = [4, 4, 4];
        let x: Vec<f64> = (0..64).map(|i| i as f64).collect();
        let (out, cshape) = crop(&x, shape, [1, 1, 1], [2, 3, 2]).unwrap();
        assert_eq!(cshape, [2, 3, 2]);
        assert_eq!(out.len(), 12);
        assert_eq!(out[0], x[1 + 4 + 16]);
        assert_eq!(out[1], x[2 + 4 + 16]);
        assert_eq!(out[out.len() - 1], x[2 + 3 * 4 + 2 * 16]);
    }

    #[test]
    fn test_erode_full_cube() {
        let shape = [5, 5, 5];
        let m = vec![1u8; 125];
        let out = erode_mask(&m, shape, 1).unwrap();

        for k in 0..5 {
            for j in 0..5 {
                for i in 0..5 {
                    let v = out[i + 5 * j + 25 * k];
                    let interior =
                        (1..4).contains(&i) && (1..4).contains(&j) && (1..4).contains(&k);
                    assert_eq!(
                        v,
                        interior as u8,
                        "erosion of a full cube must leave the interior block, voxel ({},{},{})",
                        i, j, k
                    );
                }
            }
        }
    }

    #[test]
    fn test_erode_zero_iterations_is_copy() {
        let shape = [4, 4, 4];
        let m = sphere_mask(shape, [1.5, 1.5, 1.5], 1.6);
        let out = erode_mask(&m, shape, 0).unwrap();
        assert_eq!(out, m);
    }

    #[test]
    fn test_erode_monotone() {
        let shape = [9, 9, 9];
        let m = sphere_mask(shape, [4.0, 4.0, 4.0], 4.0);
        let e1 = erode_mask(&m, shape, 1).unwrap();
        let e2 = erode_mask(&m, shape, 2).unwrap();

        for i in 0..m.len() {
            assert!(e1[i] <= m[i], "erosion must shrink the mask at {}", i);
            assert!(e2[i] <= e1[i], "erosion must be monotone at {}", i);
        }
        let n1: usize = e1.iter().map(|&v| v as usize).sum();
        assert!(n1 > 0, "one round should keep the sphere core");
    }

    #[test]
    fn test_erode_respects_corner_exclusion() {
        // A mask missing only a cube corner: the center survives because
        // corners are not part of the 18-connectivity stencil.
        let shape = [3, 3, 3];
        let mut m = vec![1u8; 27];
        m[0] = 0; // corner (0,0,0)
        let out = erode_mask(&m, shape, 1).unwrap();
        assert_eq!(out[1 + 3 + 9], 1, "corner voxels must not affect erosion");

        // Removing a face neighbor kills the center.
        let mut m2 = vec![1u8; 27];
        m2[1 + 3] = 0; // face neighbor (1,1,0)
        let out2 = erode_mask(&m2, shape, 1).unwrap();
        assert_eq!(out2[1 + 3 + 9], 0, "face voxels must affect erosion");
    }

    #[test]
    fn test_erode_exhausts_small_mask() {
        let shape = [4, 4, 4];
        let m = vec![1u8; 64];
        let out = erode_mask(&m, shape, 3).unwrap();
        assert!(
            out.iter().all(|&v| v == 0),
            "three rounds must exhaust a 4-cube"
        );
    }

    #[test]
    fn test_sphere_mask_basic() {
        let mask = sphere_mask([10, 10, 10], [5.0, 5.0, 5.0], 3.0);
        assert_eq!(mask.len(), 1000);
        assert_eq!(mask[5 + 5 * 10 + 5 * 100], 1, "center voxel should be inside");
        assert_eq!(mask[0], 0, "corner should be outside");

        let count: usize = mask.iter().map(|&m| m as usize).sum();
        assert!(count > 50 && count < 200, "sphere voxel count {} seems wrong", count);
    }
}
