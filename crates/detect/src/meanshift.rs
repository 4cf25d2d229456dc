//! Module for the per-point mean-shift iteration

// crate modules
use crate::kernel::Kernel;
use crate::weights::WeightFunction;

// wxtools modules
use wxtools_field::FeatureSpace;
use wxtools_index::{FeatureSpaceIndex, SearchParams};
use wxtools_utils::SliceExt;

// external crates
use kdam::{BarBuilder, BarExt};
use log::{debug, warn};
use rayon::prelude::*;

// standard library
use std::sync::Mutex;

/// The per-point mode-seeking iteration
///
/// For a sample neighbourhood `N(x)` found by range search, one step moves
/// the trajectory to the kernel- and saliency-weighted sample mean
///
/// ```text
/// m(x) = Σ K(‖xᵢ − x‖/h) · w(xᵢ) · xᵢ  /  Σ K(‖xᵢ − x‖/h) · w(xᵢ)
/// ```
///
/// and the iteration stops when the step length falls below ε or the
/// iteration cap is reached. All accumulation is in f64.
#[derive(Debug)]
pub struct MeanshiftOperation<'a> {
    fs: &'a FeatureSpace,
    index: &'a FeatureSpaceIndex,
    kernel: Kernel,
    weight: Option<&'a WeightFunction>,
    params: SearchParams,
    epsilon: f64,
    max_iterations: usize,
}

impl<'a> MeanshiftOperation<'a> {
    /// Set up the iteration over a feature space and its index
    ///
    /// The default ε is one tenth of the smallest bandwidth component.
    pub fn new(
        fs: &'a FeatureSpace,
        index: &'a FeatureSpaceIndex,
        kernel: Kernel,
        weight: Option<&'a WeightFunction>,
        bandwidth: &[f64],
        epsilon: Option<f64>,
        max_iterations: usize,
    ) -> Self {
        let epsilon = epsilon.unwrap_or_else(|| 0.1 * bandwidth.min_value());
        Self {
            fs,
            index,
            kernel,
            weight,
            params: SearchParams::Range {
                bandwidth: bandwidth.to_vec(),
            },
            epsilon,
            max_iterations,
        }
    }

    /// Iterate one origin to its terminal position
    ///
    /// Returns the total shift from the origin (not the last step) and the
    /// convergence flag. A degenerate denominator or a non-finite
    /// intermediate yields a zero shift and `false`; such points are
    /// excluded from aggregation and counted by the caller.
    pub fn meanshift(&self, origin: &[f64]) -> (Vec<f64>, bool) {
        let zero = vec![0.0; origin.len()];
        let mut x = origin.to_vec();

        for _ in 0..self.max_iterations {
            let neighbours = self.index.search(&x, &self.params);

            let mut numerator = vec![0.0; x.len()];
            let mut denominator = 0.0;
            for neighbour in &neighbours {
                let sample = &self.fs.points[neighbour.point];
                let kw = self.kernel.apply(neighbour.distance)
                    * self.weight.map_or(1.0, |w| w.evaluate(sample));
                denominator += kw;
                for (acc, value) in numerator.iter_mut().zip(&sample.values) {
                    *acc += kw * value;
                }
            }

            if denominator == 0.0 {
                return (zero, false);
            }

            let next: Vec<f64> = numerator.iter().map(|v| v / denominator).collect();
            if next.iter().any(|v| !v.is_finite()) {
                return (zero, false);
            }

            let step = next.distance_to(&x);
            x = next;
            if step < self.epsilon {
                break;
            }
        }

        let shift = x.iter().zip(origin).map(|(a, b)| a - b).collect();
        (shift, true)
    }
}

/// Run the mean-shift iteration for every point of the feature space
///
/// A pure map, parallel across points with rayon: workers read the shared
/// feature space and each result is written back to its own point, so the
/// outcome never depends on scheduling. The progress bar sits behind a
/// mutex and is the only shared mutable state.
///
/// Returns the number of non-convergent points; a summary is logged when
/// any occur.
#[allow(clippy::too_many_arguments)]
pub fn apply_meanshift(
    fs: &mut FeatureSpace,
    index: &FeatureSpaceIndex,
    kernel: Kernel,
    weight: Option<&WeightFunction>,
    bandwidth: &[f64],
    epsilon: Option<f64>,
    max_iterations: usize,
    show_progress: bool,
) -> usize {
    let progress = Mutex::new(
        BarBuilder::default()
            .total(fs.len())
            .desc("mean-shift")
            .disable(!show_progress)
            .build()
            .expect("Failed to initialise progress bar"),
    );

    let results: Vec<(Vec<f64>, bool)> = {
        let operation = MeanshiftOperation::new(
            fs,
            index,
            kernel,
            weight,
            bandwidth,
            epsilon,
            max_iterations,
        );
        fs.points
            .par_iter()
            .map(|point| {
                let result = operation.meanshift(&point.values);
                if let Ok(mut bar) = progress.lock() {
                    let _ = bar.update(1);
                }
                result
            })
            .collect()
    };

    let rank = fs.spatial_rank();
    let mut failures = 0_usize;
    for (point, (shift, converged)) in fs.points.iter_mut().zip(results) {
        point.shift = shift[..rank].to_vec();
        point.converged = converged;
        if !converged {
            failures += 1;
        }
    }

    debug!("mean-shift complete over {} points", fs.len());
    if failures > 0 {
        warn!("{failures} points did not converge and are excluded from clustering");
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxtools_field::{CoordinateSystem, Point};

    /// A 1D field with a single triangular bump centred on x = 5
    fn bump_space() -> FeatureSpace {
        let cs = CoordinateSystem::new(
            vec!["x".to_string()],
            vec![(0..11).map(f64::from).collect()],
        )
        .unwrap();
        let points = (0..11_usize)
            .map(|i| {
                let x = i as f64;
                let value = 10.0 - (x - 5.0).abs();
                Point::new(vec![i], vec![x], vec![x, value])
            })
            .collect();
        FeatureSpace::from_points(cs, vec!["rain".to_string()], points)
    }

    #[test]
    fn shifts_point_towards_the_bump() {
        let fs = bump_space();
        let columns: Vec<usize> = (0..fs.value_rank()).collect();
        let index = FeatureSpaceIndex::build(&fs.points, &columns, None);
        let bandwidth = vec![3.0, 21.0];

        let operation =
            MeanshiftOperation::new(&fs, &index, Kernel::Gaussian, None, &bandwidth, None, 100);

        let (shift, converged) = operation.meanshift(&fs.points[2].values);
        assert!(converged);
        assert!(shift[0] > 0.0, "shift should point at the bump");
    }

    #[test]
    fn parallel_sweep_writes_every_point() {
        let mut fs = bump_space();
        let columns: Vec<usize> = (0..fs.value_rank()).collect();
        let index = FeatureSpaceIndex::build(&fs.points, &columns, None);
        let bandwidth = vec![3.0, 21.0];

        let failures = apply_meanshift(
            &mut fs,
            &index,
            Kernel::Gaussian,
            None,
            &bandwidth,
            None,
            100,
            false,
        );

        assert_eq!(failures, 0);
        assert!(fs.points.iter().all(|p| p.converged));
        // the ends of the line definitely move inwards
        assert!(fs.points[0].shift[0] > 0.0);
        assert!(fs.points[10].shift[0] < 0.0);
    }

    #[test]
    fn sweep_is_deterministic() {
        let bandwidth = vec![3.0, 21.0];
        let run = || {
            let mut fs = bump_space();
            let columns: Vec<usize> = (0..fs.value_rank()).collect();
            let index = FeatureSpaceIndex::build(&fs.points, &columns, None);
            apply_meanshift(
                &mut fs,
                &index,
                Kernel::Epanechnikov,
                None,
                &bandwidth,
                None,
                100,
                false,
            );
            fs.points.iter().map(|p| p.shift.clone()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn final_position_is_origin_plus_shift() {
        let mut fs = bump_space();
        let columns: Vec<usize> = (0..fs.value_rank()).collect();
        let index = FeatureSpaceIndex::build(&fs.points, &columns, None);
        let bandwidth = vec![3.0, 21.0];

        let operation =
            MeanshiftOperation::new(&fs, &index, Kernel::Gaussian, None, &bandwidth, None, 100);
        let terminal: Vec<Vec<f64>> = fs
            .points
            .iter()
            .map(|p| {
                let (shift, _) = operation.meanshift(&p.values);
                p.values.iter().zip(&shift).map(|(v, s)| v + s).collect()
            })
            .collect();
        drop(operation);

        apply_meanshift(
            &mut fs,
            &index,
            Kernel::Gaussian,
            None,
            &bandwidth,
            None,
            100,
            false,
        );

        for (point, terminal) in fs.points.iter().zip(terminal) {
            let reconstructed: Vec<f64> = point
                .coordinate
                .iter()
                .zip(&point.shift)
                .map(|(c, s)| c + s)
                .collect();
            assert_eq!(reconstructed.distance_to(&terminal[..1]), 0.0);
        }
    }
}
