//! FFT plans and 3D transforms for the dipole inversion pipeline.
//!
//! Real volumes are transformed with a real-to-complex FFT along the
//! contiguous x axis (via `realfft`) followed by complex transforms along
//! y and z (via `rustfft`), producing the half-complex spectrum layout
//! `(nx/2 + 1, ny, nz)`. The complex-to-complex path used for asymmetric
//! point spread functions transforms all three axes with `rustfft`.
//!
//! Line batches are scheduled on the crate worker pool, so FFT-level
//! parallelism shares the same bounded pool as the stencil primitives and
//! cannot oversubscribe the machine.
//!
//! Volumes are flat buffers in Fortran (column-major) order with shape
//! (nx, ny, nz): `index = i + j*nx + k*nx*ny`.

use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

use crate::parallel::{self, MIN_PARALLEL_LEN};

/// Index into a 3D array stored in Fortran order (column-major):
/// `index = i + j*nx + k*nx*ny`.
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// DFT sample frequencies for an axis of length `n` with sample spacing `d`.
/// Matches numpy.fft.fftfreq(n, d).
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let mut freq = vec![0.0; n];
    let val = 1.0 / (n as f64 * d);

    if n % 2 == 0 {
        // Even: [0, 1, ..., n/2-1, -n/2, ..., -1]
        for i in 0..n / 2 {
            freq[i] = (i as f64) * val;
        }
        for i in n / 2..n {
            freq[i] = ((i as i64) - (n as i64)) as f64 * val;
        }
    } else {
        // Odd: [0, 1, ..., (n-1)/2, -(n-1)/2, ..., -1]
        for i in 0..=(n - 1) / 2 {
            freq[i] = (i as f64) * val;
        }
        for i in (n + 1) / 2..n {
            freq[i] = ((i as i64) - (n as i64)) as f64 * val;
        }
    }
    freq
}

/// Nonnegative DFT sample frequencies for the leading axis of a
/// real-to-complex transform: `n/2 + 1` values spaced by `1/(n*d)`.
/// Matches numpy.fft.rfftfreq(n, d).
pub fn rfftfreq(n: usize, d: f64) -> Vec<f64> {
    let val = 1.0 / (n as f64 * d);
    (0..n / 2 + 1).map(|i| i as f64 * val).collect()
}

fn batch_rows(line_len: usize) -> usize {
    (MIN_PARALLEL_LEN / line_len.max(1)).max(1)
}

/// Transform every contiguous x line of `data` in place.
fn transform_x(data: &mut [Complex64], nx: usize, plan: &Arc<dyn Fft<f64>>) {
    let scratch_len = plan.get_inplace_scratch_len();
    if data.len() < MIN_PARALLEL_LEN {
        let mut scratch = vec![Complex64::default(); scratch_len];
        for row in data.chunks_exact_mut(nx) {
            plan.process_with_scratch(row, &mut scratch);
        }
        return;
    }
    parallel::install(|| {
        use rayon::prelude::*;
        data.par_chunks_exact_mut(nx)
            .with_min_len(batch_rows(nx))
            .for_each_init(
                || vec![Complex64::default(); scratch_len],
                |scratch, row| plan.process_with_scratch(row, scratch),
            );
    });
}

/// Transform every y line in place, one (x, y) slab per z index.
fn transform_y(data: &mut [Complex64], nx: usize, ny: usize, plan: &Arc<dyn Fft<f64>>) {
    let scratch_len = plan.get_inplace_scratch_len();
    let slab = nx * ny;
    let process_slab =
        |line: &mut Vec<Complex64>, scratch: &mut Vec<Complex64>, chunk: &mut [Complex64]| {
            for i in 0..nx {
                for j in 0..ny {
                    line[j] = chunk[i + j * nx];
                }
                plan.process_with_scratch(line, scratch);
                for j in 0..ny {
                    chunk[i + j * nx] = line[j];
                }
            }
        };
    if data.len() < MIN_PARALLEL_LEN {
        let mut line = vec![Complex64::default(); ny];
        let mut scratch = vec![Complex64::default(); scratch_len];
        for chunk in data.chunks_exact_mut(slab) {
            process_slab(&mut line, &mut scratch, chunk);
        }
        return;
    }
    parallel::install(|| {
        use rayon::prelude::*;
        data.par_chunks_exact_mut(slab).for_each_init(
            || {
                (
                    vec![Complex64::default(); ny],
                    vec![Complex64::default(); scratch_len],
                )
            },
            |(line, scratch), chunk| process_slab(line, scratch, chunk),
        );
    });
}

/// Transform every z line in place. Lines along z are strided by a full
/// slab, so they are gathered into contiguous pencils in `zbuf`,
/// transformed there, and scattered back.
fn transform_z(
    data: &mut [Complex64],
    nx: usize,
    ny: usize,
    nz: usize,
    plan: &Arc<dyn Fft<f64>>,
    zbuf: &mut [Complex64],
) {
    debug_assert_eq!(zbuf.len(), data.len(), "transform_z: pencil buffer size");
    let scratch_len = plan.get_inplace_scratch_len();
    let slab = nx * ny;

    if data.len() < MIN_PARALLEL_LEN {
        let mut scratch = vec![Complex64::default(); scratch_len];
        for (c, pencil) in zbuf.chunks_exact_mut(nz).enumerate() {
            let (i, j) = (c % nx, c / nx);
            for k in 0..nz {
                pencil[k] = data[i + j * nx + k * slab];
            }
            plan.process_with_scratch(pencil, &mut scratch);
        }
        for (r, row) in data.chunks_exact_mut(nx).enumerate() {
            let (j, k) = (r % ny, r / ny);
            for (i, v) in row.iter_mut().enumerate() {
                *v = zbuf[k + (i + j * nx) * nz];
            }
        }
        return;
    }

    let src: &[Complex64] = data;
    parallel::install(|| {
        use rayon::prelude::*;
        zbuf.par_chunks_exact_mut(nz)
            .enumerate()
            .with_min_len(batch_rows(nz))
            .for_each_init(
                || vec![Complex64::default(); scratch_len],
                |scratch, (c, pencil)| {
                    let (i, j) = (c % nx, c / nx);
                    for k in 0..nz {
                        pencil[k] = src[i + j * nx + k * slab];
                    }
                    plan.process_with_scratch(pencil, scratch);
                },
            );
    });
    let zsrc: &[Complex64] = zbuf;
    parallel::install(|| {
        use rayon::prelude::*;
        data.par_chunks_exact_mut(nx)
            .enumerate()
            .with_min_len(batch_rows(nx))
            .for_each(|(r, row)| {
                let (j, k) = (r % ny, r / ny);
                for (i, v) in row.iter_mut().enumerate() {
                    *v = zsrc[k + (i + j * nx) * nz];
                }
            });
    });
}

/// 3D FFT (in-place, complex-to-complex).
///
/// Transforms data in Fortran order with shape (nx, ny, nz).
/// Matches numpy.fft.fftn behavior.
pub fn fft3d(data: &mut [Complex64], nx: usize, ny: usize, nz: usize) {
    let mut planner = FftPlanner::new();
    let fft_x = planner.plan_fft(nx, FftDirection::Forward);
    let fft_y = planner.plan_fft(ny, FftDirection::Forward);
    let fft_z = planner.plan_fft(nz, FftDirection::Forward);
    let mut zbuf = vec![Complex64::default(); data.len()];

    transform_x(data, nx, &fft_x);
    transform_y(data, nx, ny, &fft_y);
    transform_z(data, nx, ny, nz, &fft_z, &mut zbuf);
}

/// 3D IFFT (in-place, complex-to-complex).
///
/// Transforms data in Fortran order with shape (nx, ny, nz).
/// Matches numpy.fft.ifftn behavior (includes the 1/N normalization).
pub fn ifft3d(data: &mut [Complex64], nx: usize, ny: usize, nz: usize) {
    let mut planner = FftPlanner::new();
    let ifft_x = planner.plan_fft(nx, FftDirection::Inverse);
    let ifft_y = planner.plan_fft(ny, FftDirection::Inverse);
    let ifft_z = planner.plan_fft(nz, FftDirection::Inverse);
    let mut zbuf = vec![Complex64::default(); data.len()];

    transform_x(data, nx, &ifft_x);
    transform_y(data, nx, ny, &ifft_y);
    transform_z(data, nx, ny, nz, &ifft_z, &mut zbuf);

    let scale = 1.0 / (nx * ny * nz) as f64;
    parallel::map_inplace(data, |v| v * scale);
}

/// Plan bundle for the real-FFT pipeline over one padded shape.
///
/// Owns the x-axis real plans and the y/z complex plans for the lifetime
/// of a solve. Nothing is cached across solves; a plan is created for the
/// padded shape of one solve and dropped with it.
pub struct RfftPlan {
    shape: [usize; 3],
    spectrum_shape: [usize; 3],
    r2c_x: Arc<dyn RealToComplex<f64>>,
    c2r_x: Arc<dyn ComplexToReal<f64>>,
    fft_y: Arc<dyn Fft<f64>>,
    ifft_y: Arc<dyn Fft<f64>>,
    fft_z: Arc<dyn Fft<f64>>,
    ifft_z: Arc<dyn Fft<f64>>,
}

impl RfftPlan {
    /// Plan forward and inverse transforms for a real volume of `shape`.
    pub fn new(shape: [usize; 3]) -> Self {
        let [nx, ny, nz] = shape;
        let mut rplanner = RealFftPlanner::<f64>::new();
        let r2c_x = rplanner.plan_fft_forward(nx);
        let c2r_x = rplanner.plan_fft_inverse(nx);

        let mut planner = FftPlanner::new();
        let fft_y = planner.plan_fft(ny, FftDirection::Forward);
        let ifft_y = planner.plan_fft(ny, FftDirection::Inverse);
        let fft_z = planner.plan_fft(nz, FftDirection::Forward);
        let ifft_z = planner.plan_fft(nz, FftDirection::Inverse);

        RfftPlan {
            shape,
            spectrum_shape: [nx / 2 + 1, ny, nz],
            r2c_x,
            c2r_x,
            fft_y,
            ifft_y,
            fft_z,
            ifft_z,
        }
    }

    /// Real-volume shape (nx, ny, nz) the plan was built for.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Half-complex spectrum shape (nx/2 + 1, ny, nz).
    pub fn spectrum_shape(&self) -> [usize; 3] {
        self.spectrum_shape
    }

    /// Number of elements in the half-complex spectrum.
    pub fn spectrum_len(&self) -> usize {
        self.spectrum_shape.iter().product()
    }

    /// Allocate a zeroed spectrum-sized buffer.
    pub fn make_spectrum(&self) -> Vec<Complex64> {
        vec![Complex64::default(); self.spectrum_len()]
    }

    /// Forward transform: real volume to half-complex spectrum.
    ///
    /// `src` is consumed as scratch by the x-axis transform and holds
    /// unspecified values afterwards. `zbuf` must be spectrum sized.
    pub fn forward(&self, src: &mut [f64], spectrum: &mut [Complex64], zbuf: &mut [Complex64]) {
        let [nx, ny, nz] = self.shape;
        let hx = self.spectrum_shape[0];
        assert_eq!(src.len(), nx * ny * nz, "forward: input size");
        assert_eq!(spectrum.len(), hx * ny * nz, "forward: spectrum size");

        let scratch_len = self.r2c_x.get_scratch_len();
        if spectrum.len() < MIN_PARALLEL_LEN {
            let mut scratch = vec![Complex64::default(); scratch_len];
            for (row_in, row_out) in src
                .chunks_exact_mut(nx)
                .zip(spectrum.chunks_exact_mut(hx))
            {
                self.r2c_x
                    .process_with_scratch(row_in, row_out, &mut scratch)
                    .expect("real FFT row length mismatch");
            }
        } else {
            parallel::install(|| {
                use rayon::prelude::*;
                src.par_chunks_exact_mut(nx)
                    .zip(spectrum.par_chunks_exact_mut(hx))
                    .with_min_len(batch_rows(nx))
                    .for_each_init(
                        || vec![Complex64::default(); scratch_len],
                        |scratch, (row_in, row_out)| {
                            self.r2c_x
                                .process_with_scratch(row_in, row_out, scratch)
                                .expect("real FFT row length mismatch");
                        },
                    );
            });
        }

        transform_y(spectrum, hx, ny, &self.fft_y);
        transform_z(spectrum, hx, ny, nz, &self.fft_z, zbuf);
    }

    /// Inverse transform: half-complex spectrum to real volume, scaled by
    /// `1/(nx*ny*nz)`.
    ///
    /// The spectrum contents are consumed. `zbuf` must be spectrum sized.
    pub fn inverse(&self, spectrum: &mut [Complex64], dst: &mut [f64], zbuf: &mut [Complex64]) {
        let [nx, ny, nz] = self.shape;
        let hx = self.spectrum_shape[0];
        assert_eq!(dst.len(), nx * ny * nz, "inverse: output size");
        assert_eq!(spectrum.len(), hx * ny * nz, "inverse: spectrum size");

        transform_z(spectrum, hx, ny, nz, &self.ifft_z, zbuf);
        transform_y(spectrum, hx, ny, &self.ifft_y);

        let nyquist = nx % 2 == 0;
        let scratch_len = self.c2r_x.get_scratch_len();
        let finish_row = |line: &mut [Complex64]| {
            // The DC bin (and the Nyquist bin for even nx) of a real signal
            // is real; clear roundoff noise before the half-complex inverse.
            line[0].im = 0.0;
            if nyquist {
                line[hx - 1].im = 0.0;
            }
        };
        if spectrum.len() < MIN_PARALLEL_LEN {
            let mut scratch = vec![Complex64::default(); scratch_len];
            for (row_spec, row_out) in spectrum
                .chunks_exact_mut(hx)
                .zip(dst.chunks_exact_mut(nx))
            {
                finish_row(row_spec);
                self.c2r_x
                    .process_with_scratch(row_spec, row_out, &mut scratch)
                    .expect("real inverse FFT row length mismatch");
            }
        } else {
            parallel::install(|| {
                use rayon::prelude::*;
                spectrum
                    .par_chunks_exact_mut(hx)
                    .zip(dst.par_chunks_exact_mut(nx))
                    .with_min_len(batch_rows(nx))
                    .for_each_init(
                        || vec![Complex64::default(); scratch_len],
                        |scratch, (row_spec, row_out)| {
                            finish_row(row_spec);
                            self.c2r_x
                                .process_with_scratch(row_spec, row_out, scratch)
                                .expect("real inverse FFT row length mismatch");
                        },
                    );
            });
        }

        let scale = 1.0 / (nx * ny * nz) as f64;
        parallel::map_inplace(dst, |v| v * scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_volume(nx: usize, ny: usize, nz: usize) -> Vec<f64> {
        (0..nx * ny * nz)
            .map(|i| (0.3 * i as f64).sin() + 0.1 * (i % 7) as f64)
            .collect()
    }

    #[test]
    fn test_fft_ifft_roundtrip() {
        let (nx, ny, nz) = (4, 4, 4);
        let original: Vec<f64> = (0..nx * ny * nz).map(|i| i as f64).collect();

        let mut data: Vec<Complex64> = original
            .iter()
            .map(|&x| Complex64::new(x, 0.0))
            .collect();

        fft3d(&mut data, nx, ny, nz);
        ifft3d(&mut data, nx, ny, nz);

        for (i, (&orig, result)) in original.iter().zip(data.iter()).enumerate() {
            assert!(
                (result.re - orig).abs() < 1e-10,
                "Mismatch at index {}: expected {}, got {}",
                i, orig, result.re
            );
            assert!(
                result.im.abs() < 1e-10,
                "Imaginary part not zero at index {}: {}",
                i, result.im
            );
        }
    }

    #[test]
    fn test_fft_roundtrip_non_cubic() {
        let (nx, ny, nz) = (6, 5, 3);
        let original = test_volume(nx, ny, nz);
        let mut data: Vec<Complex64> = original
            .iter()
            .map(|&x| Complex64::new(x, 0.0))
            .collect();

        fft3d(&mut data, nx, ny, nz);
        ifft3d(&mut data, nx, ny, nz);

        for (i, (&orig, result)) in original.iter().zip(data.iter()).enumerate() {
            assert!(
                (result.re - orig).abs() < 1e-10,
                "non-cubic roundtrip mismatch at {}",
                i
            );
        }
    }

    #[test]
    fn test_fftfreq() {
        // Even n=4
        let freq = fftfreq(4, 1.0);
        assert!((freq[0] - 0.0).abs() < 1e-10);
        assert!((freq[1] - 0.25).abs() < 1e-10);
        assert!((freq[2] - (-0.5)).abs() < 1e-10);
        assert!((freq[3] - (-0.25)).abs() < 1e-10);

        // Odd n=5
        let freq = fftfreq(5, 1.0);
        assert!((freq[0] - 0.0).abs() < 1e-10);
        assert!((freq[1] - 0.2).abs() < 1e-10);
        assert!((freq[2] - 0.4).abs() < 1e-10);
        assert!((freq[3] - (-0.4)).abs() < 1e-10);
        assert!((freq[4] - (-0.2)).abs() < 1e-10);
    }

    #[test]
    fn test_rfftfreq() {
        let freq = rfftfreq(8, 0.5);
        assert_eq!(freq.len(), 5);
        for (i, &f) in freq.iter().enumerate() {
            assert!(
                (f - i as f64 / 4.0).abs() < 1e-12,
                "rfftfreq mismatch at {}",
                i
            );
        }
    }

    #[test]
    fn test_rfft_matches_complex_fft() {
        let (nx, ny, nz) = (8, 6, 5);
        let vol = test_volume(nx, ny, nz);

        let mut cdata: Vec<Complex64> = vol.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        fft3d(&mut cdata, nx, ny, nz);

        let plan = RfftPlan::new([nx, ny, nz]);
        let hx = plan.spectrum_shape()[0];
        let mut src = vol.clone();
        let mut spectrum = plan.make_spectrum();
        let mut zbuf = plan.make_spectrum();
        plan.forward(&mut src, &mut spectrum, &mut zbuf);

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..hx {
                    let a = spectrum[idx3d(i, j, k, hx, ny)];
                    let b = cdata[idx3d(i, j, k, nx, ny)];
                    assert!(
                        (a - b).norm() < 1e-8,
                        "half spectrum mismatch at ({},{},{}): {} vs {}",
                        i, j, k, a, b
                    );
                }
            }
        }
    }

    #[test]
    fn test_rfft_roundtrip() {
        let (nx, ny, nz) = (16, 10, 7);
        let vol = test_volume(nx, ny, nz);

        let plan = RfftPlan::new([nx, ny, nz]);
        let mut src = vol.clone();
        let mut spectrum = plan.make_spectrum();
        let mut zbuf = plan.make_spectrum();
        let mut out = vec![0.0; nx * ny * nz];

        plan.forward(&mut src, &mut spectrum, &mut zbuf);
        plan.inverse(&mut spectrum, &mut out, &mut zbuf);

        for (i, (&orig, &result)) in vol.iter().zip(out.iter()).enumerate() {
            assert!(
                (result - orig).abs() < 1e-10,
                "real roundtrip mismatch at {}: expected {}, got {}",
                i, orig, result
            );
        }
    }
}
