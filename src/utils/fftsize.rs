//! Fast FFT size selection.
//!
//! FFT back ends are fastest on sizes whose prime factorization contains
//! only small primes. Before planning, padded dimensions are rounded up to
//! the next such composite; real-to-complex planning additionally prefers
//! an even leading axis.

/// True when `n` factors over {2, 3, 5, 7}.
fn is_fast(mut n: usize) -> bool {
    for p in [2, 3, 5, 7] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// Smallest integer >= `n` that factors over {2, 3, 5, 7}.
fn next_fast(n: usize) -> usize {
    let mut m = n.max(1);
    while !is_fast(m) {
        m += 1;
    }
    m
}

/// Round `sz` up to fast FFT dimensions, leaving room for a kernel of
/// extent `ksz`.
///
/// Per axis the result is the smallest fast integer of at least
/// `sz[i] + max(ksz[i], 1) - 1`. Axes with `ksz[i] < 0` pass through
/// unchanged. When `rfft` is true and at least one axis was padded, the
/// first padded axis is additionally rounded up to an even fast integer:
/// up to three re-rounding attempts from the next integer, then one forced
/// re-round after adding one.
pub fn fast_fft_size(sz: [usize; 3], ksz: [isize; 3], rfft: bool) -> [usize; 3] {
    let mut out = sz;
    let mut first_padded = None;

    for i in 0..3 {
        if ksz[i] < 0 {
            continue;
        }
        let target = sz[i] + (ksz[i].max(1) as usize) - 1;
        out[i] = next_fast(target);
        if first_padded.is_none() {
            first_padded = Some(i);
        }
    }

    if rfft {
        if let Some(i) = first_padded {
            let mut s = out[i];
            let mut tries = 0;
            while s % 2 != 0 && tries < 3 {
                s = next_fast(s + 1);
                tries += 1;
            }
            if s % 2 != 0 {
                s = next_fast(s + 1);
            }
            out[i] = s;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_unpadded() {
        assert_eq!(
            fast_fft_size([7, 11, 13], [-1, -1, -1], true),
            [7, 11, 13],
            "negative kernel extents should leave all axes untouched"
        );
    }

    #[test]
    fn test_known_values() {
        assert_eq!(fast_fft_size([7, 7, 7], [0, -1, -1], false)[0], 7);
        assert_eq!(fast_fft_size([7, 7, 7], [3, -1, -1], false)[0], 9);
        assert_eq!(fast_fft_size([7, 7, 7], [3, -1, -1], true)[0], 10);
    }

    #[test]
    fn test_even_first_padded_axis() {
        // x passes through, y is the first padded axis and must come out even.
        let out = fast_fft_size([9, 9, 9], [-1, 0, 0], true);
        assert_eq!(out[0], 9, "unpadded axis must not change");
        assert_eq!(out[1] % 2, 0, "first padded axis must be even for rfft");
        assert!(out[1] >= 9);
        // The later padded axis keeps its plain fast size.
        assert_eq!(out[2], 9);
    }

    #[test]
    fn test_monotone_and_factored() {
        for n in 1..200usize {
            let out = fast_fft_size([n, n, n], [5, 5, 5], false);
            for i in 0..3 {
                assert!(out[i] >= n + 4, "size must cover input plus kernel");
                assert!(is_fast(out[i]), "{} is not 7-smooth", out[i]);
            }
        }
    }

    #[test]
    fn test_rfft_forces_even_on_odd_smooth_run() {
        // 25 is an odd fast size; the even preference has to re-round.
        let out = fast_fft_size([25, 3, 3], [0, -1, -1], true);
        assert_eq!(out[0] % 2, 0);
        assert!(is_fast(out[0]));
        assert!(out[0] >= 25);
    }
}
