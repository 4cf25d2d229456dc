//! Module for the closed weight-function family

// crate modules
use crate::kernel::Kernel;

// wxtools modules
use wxtools_field::{FeatureSpace, Point};
use wxtools_index::KdTree;
use wxtools_utils::SliceExt;

// external crates
use log::debug;

/// A precomputed scalar field over the full grid
///
/// Weight functions are evaluated once per gridpoint up front so that the
/// mean-shift inner loop only ever does a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightGrid {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<f64>,
}

impl WeightGrid {
    /// A zero-filled grid of the given shape
    pub fn new(shape: Vec<usize>) -> Self {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        let data = vec![0.0; shape.iter().product()];
        Self {
            shape,
            strides,
            data,
        }
    }

    fn offset(&self, gridpoint: &[usize]) -> usize {
        gridpoint
            .iter()
            .zip(&self.strides)
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Store the saliency at a gridpoint
    pub fn set(&mut self, gridpoint: &[usize], value: f64) {
        let offset = self.offset(gridpoint);
        self.data[offset] = value;
    }

    /// Saliency at a gridpoint
    pub fn get(&self, gridpoint: &[usize]) -> f64 {
        self.data[self.offset(gridpoint)]
    }

    /// Check that every stored value is finite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

/// Domain weight functions mapping a point to a non-negative saliency
///
/// A closed family, precomputed into a [WeightGrid] at construction:
///
/// - [WeightFunction::InverseDistance] favours points close to a fixed
///   centre of interest
/// - [WeightFunction::Lookup] wraps an externally supplied grid
/// - [WeightFunction::Composite] combines per-variable normalised values
///   with fixed multipliers, optionally convolved with a kernel over the
///   spatial neighbourhood
#[derive(Debug, Clone, PartialEq)]
pub enum WeightFunction {
    /// Saliency decays with distance from a centre
    InverseDistance(WeightGrid),
    /// Externally precomputed saliency field
    Lookup(WeightGrid),
    /// Linear combination of normalised variables, optionally smoothed
    Composite(WeightGrid),
}

impl WeightFunction {
    /// Saliency `1 / (1 + ‖p − centre‖)` over the feature space
    pub fn inverse_distance(fs: &FeatureSpace, center: &[f64]) -> Self {
        let mut grid = WeightGrid::new(fs.coordinate_system.shape());
        for point in &fs.points {
            let distance = point.coordinate.distance_to(center);
            grid.set(&point.gridpoint, 1.0 / (1.0 + distance));
        }
        Self::InverseDistance(grid)
    }

    /// Wrap an externally supplied saliency field
    pub fn lookup(grid: WeightGrid) -> Self {
        Self::Lookup(grid)
    }

    /// Multiplier-weighted sum of normalised variable values
    ///
    /// Each variable is scaled to `[0, 1]` against the given limits
    /// (filtered limits when a scale-space filter ran, the valid range
    /// otherwise) and multiplied by its fixed multiplier. When a smoothing
    /// kernel and bandwidth are given, the raw saliency is additionally
    /// convolved over each point's spatial neighbourhood.
    pub fn composite(
        fs: &FeatureSpace,
        multipliers: &[f64],
        limits_min: &[f64],
        limits_max: &[f64],
        smoothing: Option<(Kernel, &[f64])>,
    ) -> Self {
        let raw = |point: &Point| -> f64 {
            let mut sum = 0.0;
            for (variable, multiplier) in multipliers.iter().enumerate() {
                let span = limits_max[variable] - limits_min[variable];
                if span > 0.0 {
                    sum += multiplier * (point.value(variable) - limits_min[variable]) / span;
                }
            }
            sum
        };

        let mut grid = WeightGrid::new(fs.coordinate_system.shape());
        match smoothing {
            None => {
                for point in &fs.points {
                    grid.set(&point.gridpoint, raw(point));
                }
            }
            Some((kernel, bandwidth)) => {
                debug!("smoothing composite weights with {kernel} kernel");
                let columns: Vec<usize> = (0..fs.spatial_rank()).collect();
                let tree = KdTree::build(&fs.points, &columns);
                for point in &fs.points {
                    let weight: f64 = tree
                        .range(&point.coordinate, bandwidth)
                        .iter()
                        .map(|hit| kernel.apply(hit.distance) * raw(&fs.points[hit.point]))
                        .sum();
                    grid.set(&point.gridpoint, weight);
                }
            }
        }
        Self::Composite(grid)
    }

    /// Saliency of a point, a plain grid lookup
    #[inline]
    pub fn evaluate(&self, point: &Point) -> f64 {
        match self {
            Self::InverseDistance(grid) | Self::Lookup(grid) | Self::Composite(grid) => {
                grid.get(&point.gridpoint)
            }
        }
    }

    /// Check that the precomputed field is finite everywhere
    pub fn is_finite(&self) -> bool {
        match self {
            Self::InverseDistance(grid) | Self::Lookup(grid) | Self::Composite(grid) => {
                grid.is_finite()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxtools_field::CoordinateSystem;

    fn space() -> FeatureSpace {
        let cs = CoordinateSystem::new(
            vec!["x".to_string()],
            vec![(0..5).map(f64::from).collect()],
        )
        .unwrap();
        let points = (0..5_usize)
            .map(|i| {
                let x = i as f64;
                Point::new(vec![i], vec![x], vec![x, x * 2.0])
            })
            .collect();
        FeatureSpace::from_points(cs, vec!["rain".to_string()], points)
    }

    #[test]
    fn inverse_distance_peaks_at_the_centre() {
        let fs = space();
        let wf = WeightFunction::inverse_distance(&fs, &[2.0]);

        assert_eq!(wf.evaluate(&fs.points[2]), 1.0);
        assert_eq!(wf.evaluate(&fs.points[0]), 1.0 / 3.0);
        assert!(wf.is_finite());
    }

    #[test]
    fn composite_normalises_against_the_limits() {
        let fs = space();
        let wf = WeightFunction::composite(&fs, &[10.0], &[0.0], &[8.0], None);

        // value 8.0 at x=4 normalises to 1.0, times the multiplier
        assert_eq!(wf.evaluate(&fs.points[4]), 10.0);
        assert_eq!(wf.evaluate(&fs.points[0]), 0.0);
    }

    #[test]
    fn smoothed_composite_spreads_the_signal() {
        let fs = space();
        let sharp = WeightFunction::composite(&fs, &[1.0], &[0.0], &[8.0], None);
        let smooth = WeightFunction::composite(
            &fs,
            &[1.0],
            &[0.0],
            &[8.0],
            Some((Kernel::Uniform, &[1.0])),
        );

        // the uniform kernel sums each point with both neighbours
        assert!(smooth.evaluate(&fs.points[2]) > sharp.evaluate(&fs.points[2]));
    }

    #[test]
    fn degenerate_limits_contribute_nothing() {
        let fs = space();
        let wf = WeightFunction::composite(&fs, &[5.0], &[3.0], &[3.0], None);
        assert!(fs.points.iter().all(|p| wf.evaluate(p) == 0.0));
    }
}
