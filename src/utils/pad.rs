//! Centered padding and unpadding of 3D volumes.
//!
//! `pad` writes a centered copy of the input into a larger volume and
//! fills the border according to a boundary policy; `unpad` reads the
//! centered block back out. The centered block starts at offset
//! `(out - in + 1) / 2` along each axis, so a pad followed by an unpad at
//! the original shape is exact for every policy.

use crate::error::QsmError;
use crate::parallel;

/// Border handling for [`pad`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadMode {
    /// Constant fill value.
    Fill,
    /// Periodic wrap of the input.
    Circular,
    /// Clamp to the nearest edge voxel.
    Replicate,
    /// Mirror with the edge voxel repeated.
    Symmetric,
    /// Mirror without repeating the edge voxel.
    Reflect,
}

impl PadMode {
    /// Parse a border-policy name. Unrecognized names are rejected.
    pub fn from_str(s: &str) -> Result<Self, QsmError> {
        match s {
            "fill" => Ok(PadMode::Fill),
            "circular" => Ok(PadMode::Circular),
            "replicate" => Ok(PadMode::Replicate),
            "symmetric" => Ok(PadMode::Symmetric),
            "reflect" => Ok(PadMode::Reflect),
            _ => Err(QsmError::invalid_option("pad mode", s)),
        }
    }
}

#[inline]
fn wrap_index(s: isize, n: usize) -> usize {
    s.rem_euclid(n as isize) as usize
}

#[inline]
fn clamp_index(s: isize, n: usize) -> usize {
    s.clamp(0, n as isize - 1) as usize
}

/// Mirror with edge repeat: period 2n, `-1 -> 0`, `n -> n-1`.
#[inline]
fn symmetric_index(s: isize, n: usize) -> usize {
    let p = 2 * n as isize;
    let s = s.rem_euclid(p);
    if s >= n as isize {
        (p - 1 - s) as usize
    } else {
        s as usize
    }
}

/// Mirror without edge repeat: period 2n-2, `-1 -> 1`, `n -> n-2`.
#[inline]
fn reflect_index(s: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let p = 2 * (n as isize - 1);
    let s = s.rem_euclid(p);
    if s >= n as isize {
        (p - s) as usize
    } else {
        s as usize
    }
}

fn check_shapes(
    name: &'static str,
    data_len: usize,
    out_len: usize,
    in_shape: [usize; 3],
    out_shape: [usize; 3],
) -> Result<(), QsmError> {
    let in_n: usize = in_shape.iter().product();
    let out_n: usize = out_shape.iter().product();
    if in_n == 0 || out_n == 0 {
        return Err(QsmError::shape_mismatch(
            name,
            format!("shapes {:?} and {:?} must be nonempty", in_shape, out_shape),
        ));
    }
    if data_len != in_n {
        return Err(QsmError::shape_mismatch(
            name,
            format!("input length {} does not match shape {:?}", data_len, in_shape),
        ));
    }
    if out_len != out_n {
        return Err(QsmError::shape_mismatch(
            name,
            format!("output length {} does not match shape {:?}", out_len, out_shape),
        ));
    }
    for i in 0..3 {
        if out_shape[i] < in_shape[i] {
            return Err(QsmError::shape_mismatch(
                name,
                format!(
                    "output shape {:?} is smaller than input shape {:?} along axis {}",
                    out_shape, in_shape, i
                ),
            ));
        }
    }
    Ok(())
}

/// Centered offset of the input block inside the output volume.
#[inline]
pub(crate) fn pad_offset(in_shape: [usize; 3], out_shape: [usize; 3]) -> [usize; 3] {
    [
        (out_shape[0] - in_shape[0] + 1) / 2,
        (out_shape[1] - in_shape[1] + 1) / 2,
        (out_shape[2] - in_shape[2] + 1) / 2,
    ]
}

fn pad_with<T, F>(
    out: &mut [T],
    x: &[T],
    in_shape: [usize; 3],
    out_shape: [usize; 3],
    fill: T,
    remap: F,
) where
    T: Copy + Send + Sync,
    F: Fn(isize, usize) -> Option<usize> + Sync + Copy,
{
    let [inx, iny, inz] = in_shape;
    let [onx, ony, _onz] = out_shape;
    let [ox, oy, oz] = pad_offset(in_shape, out_shape);

    parallel::for_each_slab(out, onx * ony, |k, slab| {
        let sk = remap(k as isize - oz as isize, inz);
        let k_interior = k >= oz && k < oz + inz;
        for j in 0..ony {
            let row = &mut slab[j * onx..(j + 1) * onx];
            let sj = remap(j as isize - oy as isize, iny);
            match (sk, sj) {
                (Some(zk), Some(yj)) => {
                    let base = yj * inx + zk * inx * iny;
                    if k_interior && j >= oy && j < oy + iny {
                        // Interior row: border cells around a straight copy.
                        for (i, v) in row[..ox].iter_mut().enumerate() {
                            *v = match remap(i as isize - ox as isize, inx) {
                                Some(si) => x[base + si],
                                None => fill,
                            };
                        }
                        row[ox..ox + inx].copy_from_slice(&x[base..base + inx]);
                        for (di, v) in row[ox + inx..].iter_mut().enumerate() {
                            let i = ox + inx + di;
                            *v = match remap(i as isize - ox as isize, inx) {
                                Some(si) => x[base + si],
                                None => fill,
                            };
                        }
                    } else {
                        for (i, v) in row.iter_mut().enumerate() {
                            *v = match remap(i as isize - ox as isize, inx) {
                                Some(si) => x[base + si],
                                None => fill,
                            };
                        }
                    }
                }
                // Only the fill policy maps coordinates to nothing.
                _ => {
                    for v in row.iter_mut() {
                        *v = fill;
                    }
                }
            }
        }
    });
}

/// Pad `x` to `out_shape` with the block centered and the border written
/// according to `mode`. `fill` is used by [`PadMode::Fill`] only.
pub fn pad<T>(
    x: &[T],
    in_shape: [usize; 3],
    out_shape: [usize; 3],
    mode: PadMode,
    fill: T,
) -> Result<Vec<T>, QsmError>
where
    T: Copy + Send + Sync,
{
    let mut out = vec![fill; out_shape.iter().product()];
    pad_into(&mut out, x, in_shape, out_shape, mode, fill)?;
    Ok(out)
}

/// Pad `x` into a caller-provided buffer of `out_shape`. Every output
/// voxel is written, so the buffer may hold stale values on entry.
pub fn pad_into<T>(
    out: &mut [T],
    x: &[T],
    in_shape: [usize; 3],
    out_shape: [usize; 3],
    mode: PadMode,
    fill: T,
) -> Result<(), QsmError>
where
    T: Copy + Send + Sync,
{
    check_shapes("pad", x.len(), out.len(), in_shape, out_shape)?;
    match mode {
        PadMode::Fill => pad_with(out, x, in_shape, out_shape, fill, |s, n| {
            if s >= 0 && s < n as isize {
                Some(s as usize)
            } else {
                None
            }
        }),
        PadMode::Circular => pad_with(out, x, in_shape, out_shape, fill, |s, n| {
            Some(wrap_index(s, n))
        }),
        PadMode::Replicate => pad_with(out, x, in_shape, out_shape, fill, |s, n| {
            Some(clamp_index(s, n))
        }),
        PadMode::Symmetric => pad_with(out, x, in_shape, out_shape, fill, |s, n| {
            Some(symmetric_index(s, n))
        }),
        PadMode::Reflect => pad_with(out, x, in_shape, out_shape, fill, |s, n| {
            Some(reflect_index(s, n))
        }),
    }
    Ok(())
}

/// Extract the centered `in_shape` block from a padded volume.
pub fn unpad<T>(y: &[T], out_shape: [usize; 3], in_shape: [usize; 3]) -> Result<Vec<T>, QsmError>
where
    T: Copy + Send + Sync + Default,
{
    let mut x = vec![T::default(); in_shape.iter().product()];
    unpad_into(&mut x, y, out_shape, in_shape)?;
    Ok(x)
}

/// Extract the centered block into a caller-provided buffer.
pub fn unpad_into<T>(
    x: &mut [T],
    y: &[T],
    out_shape: [usize; 3],
    in_shape: [usize; 3],
) -> Result<(), QsmError>
where
    T: Copy + Send + Sync,
{
    check_shapes("unpad", x.len(), y.len(), in_shape, out_shape)?;
    let [inx, iny, _inz] = in_shape;
    let [onx, ony, _onz] = out_shape;
    let [ox, oy, oz] = pad_offset(in_shape, out_shape);

    parallel::for_each_slab(x, inx * iny, |k, slab| {
        for j in 0..iny {
            let src = ox + (j + oy) * onx + (k + oz) * onx * ony;
            slab[j * inx..(j + 1) * inx].copy_from_slice(&y[src..src + inx]);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_mode_parsing() {
        assert_eq!(PadMode::from_str("fill").unwrap(), PadMode::Fill);
        assert_eq!(PadMode::from_str("reflect").unwrap(), PadMode::Reflect);
        assert!(
            PadMode::from_str("mirror").is_err(),
            "unknown mode names must be rejected"
        );
    }

    #[test]
    fn test_pad_fill_centered_block() {
        let x = vec![7.0; 27];
        let out = pad(&x, [3, 3, 3], [5, 5, 5], PadMode::Fill, 0.0).unwrap();
        assert_eq!(out.len(), 125);

        for k in 0..5 {
            for j in 0..5 {
                for i in 0..5 {
                    let v = out[i + 5 * j + 25 * k];
                    let interior = (1..4).contains(&i) && (1..4).contains(&j) && (1..4).contains(&k);
                    if interior {
                        assert_eq!(v, 7.0, "interior voxel ({},{},{})", i, j, k);
                    } else {
                        assert_eq!(v, 0.0, "border voxel ({},{},{})", i, j, k);
                    }
                }
            }
        }
    }

    #[test]
    fn test_pad_reflect_line() {
        // A 3-voxel line padded to 7 with reflect: [c, b, a, b, c, b, a].
        let x = vec![1.0, 2.0, 3.0];
        let out = pad(&x, [3, 1, 1], [7, 1, 1], PadMode::Reflect, 0.0).unwrap();
        assert_eq!(out, vec![3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_pad_symmetric_line() {
        // Symmetric repeats the edge voxel: [b, a, a, b, c, c, b].
        let x = vec![1.0, 2.0, 3.0];
        let out = pad(&x, [3, 1, 1], [7, 1, 1], PadMode::Symmetric, 0.0).unwrap();
        assert_eq!(out, vec![2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn test_pad_circular_line() {
        let x = vec![1.0, 2.0, 3.0];
        let out = pad(&x, [3, 1, 1], [7, 1, 1], PadMode::Circular, 0.0).unwrap();
        assert_eq!(out, vec![2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_pad_replicate_line() {
        let x = vec![1.0, 2.0, 3.0];
        let out = pad(&x, [3, 1, 1], [7, 1, 1], PadMode::Replicate, 0.0).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_pad_rejects_shrinking() {
        let x = vec![0.0; 27];
        let err = pad(&x, [3, 3, 3], [3, 2, 3], PadMode::Fill, 0.0).unwrap_err();
        assert!(
            matches!(err, QsmError::ShapeMismatch { .. }),
            "shrinking pad must fail with ShapeMismatch, got {:?}",
            err
        );
    }

    #[test]
    fn test_pad_unpad_roundtrip_all_modes() {
        let in_shape = [4, 3, 5];
        let out_shape = [9, 3, 8];
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();

        for mode in [
            PadMode::Fill,
            PadMode::Circular,
            PadMode::Replicate,
            PadMode::Symmetric,
            PadMode::Reflect,
        ] {
            let padded = pad(&x, in_shape, out_shape, mode, -1.0).unwrap();
            let back = unpad(&padded, out_shape, in_shape).unwrap();
            assert_eq!(back, x, "pad/unpad roundtrip failed for {:?}", mode);
        }
    }

    #[test]
    fn test_pad_into_overwrites_stale_border() {
        let x = vec![5.0; 8];
        let mut out = vec![9.0; 4 * 4 * 4];
        pad_into(&mut out, &x, [2, 2, 2], [4, 4, 4], PadMode::Fill, 0.0).unwrap();
        let stale = out.iter().filter(|&&v| v == 9.0).count();
        assert_eq!(stale, 0, "pad_into must rewrite every voxel");
        let interior: f64 = out.iter().sum();
        assert_eq!(interior, 8.0 * 5.0);
    }
}
