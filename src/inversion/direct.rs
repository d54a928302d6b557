//! Direct dipole inversion by regularized k-space division.
//!
//! All three solvers share one pipeline: pad the field and mask to a fast
//! FFT shape, build the dipole kernel on the half-complex grid, replace it
//! in place with a regularized inverse, then filter each echo through
//! forward transform, pointwise multiply, inverse transform, mask
//! multiply, and unpad.
//!
//! References:
//! Shmueli, K., et al. (2009). "Magnetic susceptibility mapping of brain
//! tissue in vivo using MRI phase data."
//! Magnetic Resonance in Medicine, 62:1510-1522.
//! Wharton, S., Schafer, A., Bowtell, R. (2010). "Susceptibility mapping
//! in the human brain using threshold-based k-space division."
//! Magnetic Resonance in Medicine, 63:1292-1304.

use crate::error::QsmError;
use crate::fft::RfftPlan;
use crate::kernels::{dipole_kernel, laplace_kernel, DipoleMethod};
use crate::parallel;
use crate::utils::{fast_fft_size, pad, pad_into, unpad_into, PadMode};
use crate::validate::{check_direction, check_shape, check_voxel_size};

/// Tikhonov regularizer choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TikhReg {
    /// Penalize the solution norm.
    Identity,
    /// Penalize the solution gradient.
    Gradient,
    /// Penalize the solution Laplacian.
    Laplacian,
}

impl TikhReg {
    /// Parse a regularizer name. Unrecognized names are rejected.
    pub fn from_str(s: &str) -> Result<Self, QsmError> {
        match s {
            "identity" => Ok(TikhReg::Identity),
            "gradient" => Ok(TikhReg::Gradient),
            "laplacian" => Ok(TikhReg::Laplacian),
            _ => Err(QsmError::invalid_option("reg", s)),
        }
    }
}

/// Options for [`tkd`].
#[derive(Clone, Copy, Debug)]
pub struct TkdOpts {
    /// Kernel magnitude threshold below which the inverse is clamped to
    /// `copysign(1/thr, D)`.
    pub thr: f64,
    /// Per-axis kernel extent fed to the fast-size rounding; negative
    /// values leave that axis unpadded.
    pub pad: [isize; 3],
    /// Main-field direction, normalized internally.
    pub bdir: [f64; 3],
    /// Dipole kernel construction.
    pub dkernel: DipoleMethod,
}

impl Default for TkdOpts {
    fn default() -> Self {
        TkdOpts {
            thr: 0.2,
            pad: [0; 3],
            bdir: [0.0, 0.0, 1.0],
            dkernel: DipoleMethod::KSpace,
        }
    }
}

/// Options for [`tsvd`].
#[derive(Clone, Copy, Debug)]
pub struct TsvdOpts {
    /// Kernel magnitude threshold below which the inverse is zeroed.
    pub thr: f64,
    pub pad: [isize; 3],
    pub bdir: [f64; 3],
    pub dkernel: DipoleMethod,
}

impl Default for TsvdOpts {
    fn default() -> Self {
        TsvdOpts {
            thr: 0.2,
            pad: [0; 3],
            bdir: [0.0, 0.0, 1.0],
            dkernel: DipoleMethod::KSpace,
        }
    }
}

/// Options for [`tikh`].
#[derive(Clone, Copy, Debug)]
pub struct TikhOpts {
    /// Regularization strength.
    pub lambda: f64,
    /// Quadratic penalty.
    pub reg: TikhReg,
    pub pad: [isize; 3],
    pub bdir: [f64; 3],
    pub dkernel: DipoleMethod,
}

impl Default for TikhOpts {
    fn default() -> Self {
        TikhOpts {
            lambda: 1e-2,
            reg: TikhReg::Identity,
            pad: [0; 3],
            bdir: [0.0, 0.0, 1.0],
            dkernel: DipoleMethod::KSpace,
        }
    }
}

enum Inverse {
    Tkd { thr: f64 },
    Tsvd { thr: f64 },
    Tikh { lambda: f64, reg: TikhReg },
}

/// Truncated k-space division.
///
/// `f` is the unwrapped tissue field, rank 3 or 4 (`dims`), `mask` the
/// region of interest over the spatial axes, `vsz` the voxel size in mm.
/// Returns the susceptibility map with the shape of `f`.
pub fn tkd(
    f: &[f64],
    mask: &[u8],
    dims: &[usize],
    vsz: [f64; 3],
    opts: &TkdOpts,
) -> Result<Vec<f64>, QsmError> {
    kdiv(
        f,
        mask,
        dims,
        vsz,
        opts.pad,
        opts.bdir,
        opts.dkernel,
        Inverse::Tkd { thr: opts.thr },
    )
}

/// Truncated singular value decomposition.
///
/// Identical to [`tkd`] except that sub-threshold kernel values map to
/// zero instead of a clamped inverse.
pub fn tsvd(
    f: &[f64],
    mask: &[u8],
    dims: &[usize],
    vsz: [f64; 3],
    opts: &TsvdOpts,
) -> Result<Vec<f64>, QsmError> {
    kdiv(
        f,
        mask,
        dims,
        vsz,
        opts.pad,
        opts.bdir,
        opts.dkernel,
        Inverse::Tsvd { thr: opts.thr },
    )
}

/// Tikhonov-regularized k-space division with identity, gradient, or
/// Laplacian penalty.
pub fn tikh(
    f: &[f64],
    mask: &[u8],
    dims: &[usize],
    vsz: [f64; 3],
    opts: &TikhOpts,
) -> Result<Vec<f64>, QsmError> {
    kdiv(
        f,
        mask,
        dims,
        vsz,
        opts.pad,
        opts.bdir,
        opts.dkernel,
        Inverse::Tikh {
            lambda: opts.lambda,
            reg: opts.reg,
        },
    )
}

fn validate_solve(
    f: &[f64],
    mask: &[u8],
    dims: &[usize],
    vsz: [f64; 3],
    bdir: [f64; 3],
) -> Result<([usize; 3], usize), QsmError> {
    if dims.len() != 3 && dims.len() != 4 {
        return Err(QsmError::InvalidRank {
            name: "field",
            rank: dims.len(),
        });
    }
    let shape = [dims[0], dims[1], dims[2]];
    check_shape("field", shape)?;
    let n_echo = if dims.len() == 4 { dims[3] } else { 1 };
    if n_echo == 0 {
        return Err(QsmError::shape_mismatch("field", "echo axis is empty"));
    }

    let n_vol: usize = shape.iter().product();
    if f.len() != n_vol * n_echo {
        return Err(QsmError::shape_mismatch(
            "field",
            format!("length {} does not match dims {:?}", f.len(), dims),
        ));
    }
    if mask.len() != n_vol {
        return Err(QsmError::shape_mismatch(
            "mask",
            format!(
                "length {} does not match spatial shape {:?}",
                mask.len(),
                shape
            ),
        ));
    }
    check_voxel_size(vsz)?;
    check_direction(bdir)?;
    Ok((shape, n_echo))
}

/// Shared pipeline: pad, plan, build the inverse kernel, filter each echo.
#[allow(clippy::too_many_arguments)]
fn kdiv(
    f: &[f64],
    mask: &[u8],
    dims: &[usize],
    vsz: [f64; 3],
    pad_extent: [isize; 3],
    bdir: [f64; 3],
    dkernel: DipoleMethod,
    inverse: Inverse,
) -> Result<Vec<f64>, QsmError> {
    let (shape, n_echo) = validate_solve(f, mask, dims, vsz, bdir)?;
    let n_vol: usize = shape.iter().product();

    let padded = fast_fft_size(shape, pad_extent, true);
    let mask_p = pad(mask, shape, padded, PadMode::Fill, 0u8)?;

    let plan = RfftPlan::new(padded);
    let mut d = dipole_kernel(padded, vsz, bdir, dkernel)?;
    apply_inverse(&mut d, padded, vsz, &inverse)?;

    let mut out = vec![0.0; f.len()];
    let mut fp = vec![0.0; padded.iter().product()];
    let mut spectrum = plan.make_spectrum();
    let mut zbuf = plan.make_spectrum();

    for t in 0..n_echo {
        let f_t = &f[t * n_vol..(t + 1) * n_vol];
        pad_into(&mut fp, f_t, shape, padded, PadMode::Fill, 0.0)?;
        plan.forward(&mut fp, &mut spectrum, &mut zbuf);
        parallel::zip_map_inplace(&mut spectrum, &d, |s, di| s * di);
        plan.inverse(&mut spectrum, &mut fp, &mut zbuf);
        parallel::zip_map_inplace(&mut fp, &mask_p, |v, m| if m != 0 { v } else { 0.0 });
        unpad_into(&mut out[t * n_vol..(t + 1) * n_vol], &fp, padded, shape)?;
    }
    Ok(out)
}

/// Replace the dipole kernel with its regularized inverse, in place on the
/// half-complex grid.
fn apply_inverse(
    d: &mut [f64],
    padded: [usize; 3],
    vsz: [f64; 3],
    inverse: &Inverse,
) -> Result<(), QsmError> {
    let strength = match *inverse {
        Inverse::Tkd { thr } | Inverse::Tsvd { thr } => thr,
        Inverse::Tikh { lambda, .. } => lambda,
    };
    // With no regularization every method degenerates to plain division,
    // zero where the kernel vanishes.
    if strength == 0.0 {
        parallel::map_inplace(d, |di| if di != 0.0 { di.recip() } else { 0.0 });
        return Ok(());
    }

    match *inverse {
        Inverse::Tkd { thr } => {
            let clamp = thr.recip();
            parallel::map_inplace(d, |di| {
                if di.abs() > thr {
                    di.recip()
                } else {
                    clamp.copysign(di)
                }
            });
        }
        Inverse::Tsvd { thr } => {
            parallel::map_inplace(d, |di| if di.abs() > thr { di.recip() } else { 0.0 });
        }
        Inverse::Tikh { lambda, reg } => match reg {
            TikhReg::Identity => {
                parallel::map_inplace(d, |di| di / (di * di + lambda));
            }
            TikhReg::Gradient => {
                // Divergence of gradient: the penalty spectrum is the
                // negated Laplacian.
                let gamma = laplace_kernel(padded, vsz, true)?;
                parallel::zip_map_inplace(d, &gamma, |di, g| {
                    let den = di * di + lambda * g;
                    if den != 0.0 {
                        di / den
                    } else {
                        0.0
                    }
                });
            }
            TikhReg::Laplacian => {
                let l = laplace_kernel(padded, vsz, false)?;
                parallel::zip_map_inplace(d, &l, |di, li| {
                    let den = di * di + lambda * li * li;
                    if den != 0.0 {
                        di / den
                    } else {
                        0.0
                    }
                });
            }
        },
    }
    Ok(())
}
