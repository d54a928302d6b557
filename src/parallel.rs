//! Parallel primitives over flat volume buffers.
//!
//! Every heavy loop in the crate runs on a single process-wide worker pool,
//! bounded by the machine core count. The pool is built lazily on first use
//! and can be resized with [`set_num_workers`] or rebuilt with
//! [`reset_workers`] between solves.
//!
//! Operations partition flat index ranges into batches of at least
//! [`MIN_PARALLEL_LEN`] elements; ranges shorter than one batch execute on
//! the calling thread. Iterations are independent, so writes within one
//! operation are race free, and the operation returning establishes a
//! happens-before with everything that runs after it.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, RwLock};

/// Minimum number of elements per parallel batch. Buffers smaller than this
/// are processed serially on the calling thread.
pub const MIN_PARALLEL_LEN: usize = 1024;

struct PoolState {
    pool: Arc<ThreadPool>,
    workers: usize,
}

static POOL: RwLock<Option<PoolState>> = RwLock::new(None);

fn core_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn build_pool(workers: usize) -> PoolState {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .expect("failed to build worker pool");
    PoolState {
        pool: Arc::new(pool),
        workers,
    }
}

fn pool() -> Arc<ThreadPool> {
    if let Some(state) = POOL
        .read()
        .expect("worker pool lock poisoned")
        .as_ref()
    {
        return Arc::clone(&state.pool);
    }
    let mut guard = POOL.write().expect("worker pool lock poisoned");
    let state = guard.get_or_insert_with(|| build_pool(core_count()));
    Arc::clone(&state.pool)
}

/// Number of workers the pool is configured with.
pub fn num_workers() -> usize {
    match POOL.read().expect("worker pool lock poisoned").as_ref() {
        Some(state) => state.workers,
        None => core_count(),
    }
}

/// Resize the worker pool. The count is clamped to `1..=core count`.
///
/// Must not be called while a solve is in progress.
pub fn set_num_workers(workers: usize) {
    let workers = workers.clamp(1, core_count());
    *POOL.write().expect("worker pool lock poisoned") = Some(build_pool(workers));
}

/// Rebuild the worker pool at its current size, discarding any task state
/// left behind by an interrupted parallel operation.
///
/// Must not be called while a solve is in progress.
pub fn reset_workers() {
    let workers = num_workers();
    *POOL.write().expect("worker pool lock poisoned") = Some(build_pool(workers));
}

/// Run `op` inside the worker pool.
pub(crate) fn install<R, F>(op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    pool().install(op)
}

/// Fill `y` with `v`.
pub fn fill<T>(y: &mut [T], v: T)
where
    T: Copy + Send + Sync,
{
    if y.len() < MIN_PARALLEL_LEN {
        for yi in y.iter_mut() {
            *yi = v;
        }
        return;
    }
    install(|| {
        y.par_chunks_mut(MIN_PARALLEL_LEN).for_each(|chunk| {
            for yi in chunk.iter_mut() {
                *yi = v;
            }
        });
    });
}

/// Copy `x` into `y`. The slices must have equal length.
pub fn copy<T>(y: &mut [T], x: &[T])
where
    T: Copy + Send + Sync,
{
    assert_eq!(y.len(), x.len(), "copy: length mismatch");
    if y.len() < MIN_PARALLEL_LEN {
        y.copy_from_slice(x);
        return;
    }
    install(|| {
        y.par_chunks_mut(MIN_PARALLEL_LEN)
            .zip(x.par_chunks(MIN_PARALLEL_LEN))
            .for_each(|(yc, xc)| yc.copy_from_slice(xc));
    });
}

/// Map `x` through `f` into `y`. The slices must have equal length.
pub fn map<T, U, F>(y: &mut [U], x: &[T], f: F)
where
    T: Copy + Send + Sync,
    U: Copy + Send + Sync,
    F: Fn(T) -> U + Sync,
{
    assert_eq!(y.len(), x.len(), "map: length mismatch");
    if y.len() < MIN_PARALLEL_LEN {
        for (yi, &xi) in y.iter_mut().zip(x.iter()) {
            *yi = f(xi);
        }
        return;
    }
    install(|| {
        y.par_chunks_mut(MIN_PARALLEL_LEN)
            .zip(x.par_chunks(MIN_PARALLEL_LEN))
            .for_each(|(yc, xc)| {
                for (yi, &xi) in yc.iter_mut().zip(xc.iter()) {
                    *yi = f(xi);
                }
            });
    });
}

/// Combine `y` with `x` element by element: `y[i] = f(y[i], x[i])`.
///
/// This is the workhorse behind the pointwise spectrum multiplies in the
/// solver pipeline.
pub fn zip_map_inplace<T, U, F>(y: &mut [T], x: &[U], f: F)
where
    T: Copy + Send + Sync,
    U: Copy + Send + Sync,
    F: Fn(T, U) -> T + Sync,
{
    assert_eq!(y.len(), x.len(), "zip_map_inplace: length mismatch");
    if y.len() < MIN_PARALLEL_LEN {
        for (yi, &xi) in y.iter_mut().zip(x.iter()) {
            *yi = f(*yi, xi);
        }
        return;
    }
    install(|| {
        y.par_chunks_mut(MIN_PARALLEL_LEN)
            .zip(x.par_chunks(MIN_PARALLEL_LEN))
            .for_each(|(yc, xc)| {
                for (yi, &xi) in yc.iter_mut().zip(xc.iter()) {
                    *yi = f(*yi, xi);
                }
            });
    });
}

/// Map `y` in place: `y[i] = f(y[i])`.
pub fn map_inplace<T, F>(y: &mut [T], f: F)
where
    T: Copy + Send + Sync,
    F: Fn(T) -> T + Sync,
{
    if y.len() < MIN_PARALLEL_LEN {
        for yi in y.iter_mut() {
            *yi = f(*yi);
        }
        return;
    }
    install(|| {
        y.par_chunks_mut(MIN_PARALLEL_LEN).for_each(|yc| {
            for yi in yc.iter_mut() {
                *yi = f(*yi);
            }
        });
    });
}

/// Run `op` over contiguous slabs of `data`, `slab_len` elements each.
/// `op` receives the slab index and the slab. The slab count must divide
/// the buffer exactly.
pub(crate) fn for_each_slab<T, F>(data: &mut [T], slab_len: usize, op: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    debug_assert_eq!(data.len() % slab_len, 0, "for_each_slab: ragged slabs");
    if data.len() < MIN_PARALLEL_LEN {
        for (idx, slab) in data.chunks_exact_mut(slab_len).enumerate() {
            op(idx, slab);
        }
        return;
    }
    install(|| {
        data.par_chunks_exact_mut(slab_len)
            .enumerate()
            .for_each(|(idx, slab)| op(idx, slab));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_large() {
        let mut y = vec![0.0f64; 5000];
        fill(&mut y, 2.5);
        assert!(y.iter().all(|&v| v == 2.5), "fill should write every element");
    }

    #[test]
    fn test_fill_small_serial() {
        let mut y = vec![0u8; 10];
        fill(&mut y, 1);
        assert!(y.iter().all(|&v| v == 1));
    }

    #[test]
    fn test_copy_roundtrip() {
        let x: Vec<f64> = (0..4096).map(|i| i as f64).collect();
        let mut y = vec![0.0; 4096];
        copy(&mut y, &x);
        assert_eq!(x, y, "copy should be exact");
    }

    #[test]
    fn test_map_and_zip_map() {
        let x: Vec<f64> = (0..2048).map(|i| i as f64).collect();
        let mut y = vec![0.0; 2048];
        map(&mut y, &x, |v| 2.0 * v);
        for (i, &yi) in y.iter().enumerate() {
            assert_eq!(yi, 2.0 * i as f64, "map mismatch at {}", i);
        }
        zip_map_inplace(&mut y, &x, |yi, xi| yi - xi);
        for (i, &yi) in y.iter().enumerate() {
            assert_eq!(yi, i as f64, "zip_map_inplace mismatch at {}", i);
        }
    }

    #[test]
    fn test_worker_configuration() {
        let n = num_workers();
        assert!(n >= 1, "pool should have at least one worker");

        set_num_workers(1);
        assert_eq!(num_workers(), 1);

        // Oversized requests clamp to the core count.
        set_num_workers(usize::MAX);
        assert!(num_workers() >= 1);

        reset_workers();
        let mut y = vec![0.0f64; 4096];
        fill(&mut y, 1.0);
        assert!(y.iter().all(|&v| v == 1.0), "pool should work after reset");
    }

    #[test]
    fn test_for_each_slab_indices() {
        let mut data = vec![0usize; 8 * 512];
        for_each_slab(&mut data, 512, |idx, slab| {
            for v in slab.iter_mut() {
                *v = idx;
            }
        });
        for (i, &v) in data.iter().enumerate() {
            assert_eq!(v, i / 512, "slab index mismatch at {}", i);
        }
    }
}
