//! Module for the cluster type

// crate modules
use crate::histogram::Histogram;

// wxtools modules
use wxtools_field::Point;

// standard library
use std::collections::{HashMap, HashSet};

/// Axis-aligned bounding box in grid space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridBounds {
    /// Smallest gridpoint index per dimension
    pub min: Vec<usize>,
    /// Largest gridpoint index per dimension
    pub max: Vec<usize>,
}

/// A cluster of feature-space points sharing one mean-shift mode
///
/// Clusters hold indices into the feature-space point arena rather than the
/// points themselves; every method that needs point data takes the arena as
/// a parameter. Histograms are computed lazily and cached, and the cache is
/// invalidated whenever the point set changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Unique identifier within a list, [Cluster::NO_ID] until assigned
    pub id: u64,
    /// The convergent mean-shift mode in feature space
    pub mode: Vec<f64>,
    /// Indices into the feature-space point arena
    pub points: Vec<usize>,
    histograms: HashMap<usize, Histogram>,
}

impl Cluster {
    /// Reserved sentinel for an unassigned identifier
    pub const NO_ID: u64 = 0;

    /// Initialise an empty, unidentified cluster at a mode
    pub fn new(mode: Vec<f64>) -> Self {
        Self {
            id: Self::NO_ID,
            mode,
            points: Vec::new(),
            histograms: HashMap::new(),
        }
    }

    /// Number of points in the cluster
    pub fn size(&self) -> usize {
        self.points.len()
    }

    /// Add a point index, invalidating cached histograms
    pub fn add_point(&mut self, index: usize) {
        self.points.push(index);
        self.histograms.clear();
    }

    /// Take another cluster's points, invalidating cached histograms
    pub fn absorb(&mut self, other: &mut Cluster) {
        self.points.append(&mut other.points);
        self.histograms.clear();
    }

    /// Drop all cached histograms
    pub fn invalidate_histograms(&mut self) {
        self.histograms.clear();
    }

    /// Cached binned distribution of one variable over the cluster
    pub fn histogram(
        &mut self,
        arena: &[Point],
        variable: usize,
        n_bins: usize,
        valid_min: f64,
        valid_max: f64,
    ) -> &Histogram {
        if !self.histograms.contains_key(&variable) {
            let histogram = self.compute_histogram(arena, variable, n_bins, valid_min, valid_max);
            self.histograms.insert(variable, histogram);
        }
        &self.histograms[&variable]
    }

    /// Pure histogram recompute, bypassing the cache
    pub fn compute_histogram(
        &self,
        arena: &[Point],
        variable: usize,
        n_bins: usize,
        valid_min: f64,
        valid_max: f64,
    ) -> Histogram {
        Histogram::from_values(
            self.points.iter().map(|&p| arena[p].value(variable)),
            n_bins,
            valid_min,
            valid_max,
        )
    }

    /// Spatial centre weighted by one variable
    ///
    /// Falls back to the unweighted centre when the weights sum to zero.
    pub fn weighed_center(&self, arena: &[Point], spatial_rank: usize, variable: usize) -> Vec<f64> {
        let mut center = vec![0.0; spatial_rank];
        let mut weight_sum = 0.0;

        for &p in &self.points {
            let weight = arena[p].value(variable);
            for (c, x) in center.iter_mut().zip(&arena[p].coordinate) {
                *c += weight * x;
            }
            weight_sum += weight;
        }

        if weight_sum == 0.0 {
            for &p in &self.points {
                for (c, x) in center.iter_mut().zip(&arena[p].coordinate) {
                    *c += x;
                }
            }
            weight_sum = self.points.len() as f64;
        }

        center.iter_mut().for_each(|c| *c /= weight_sum);
        center
    }

    /// Fraction of this cluster's gridpoints that lie in the other cluster
    ///
    /// The two clusters may come from different frames, so each brings its
    /// own arena.
    pub fn percent_covered_by(
        &self,
        arena: &[Point],
        other: &Cluster,
        other_arena: &[Point],
    ) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let covering: HashSet<&[usize]> = other
            .points
            .iter()
            .map(|&p| other_arena[p].gridpoint.as_slice())
            .collect();
        let covered = self
            .points
            .iter()
            .filter(|&&p| covering.contains(arena[p].gridpoint.as_slice()))
            .count();
        covered as f64 / self.points.len() as f64
    }

    /// Axis-aligned bounding box of the cluster in grid space
    pub fn bounds(&self, arena: &[Point]) -> GridBounds {
        let rank = arena[self.points[0]].gridpoint.len();
        let mut min = vec![usize::MAX; rank];
        let mut max = vec![0_usize; rank];

        for &p in &self.points {
            for (d, &i) in arena[p].gridpoint.iter().enumerate() {
                min[d] = min[d].min(i);
                max[d] = max[d].max(i);
            }
        }

        GridBounds { min, max }
    }

    /// Whether this mode lies within the resolution vector of another
    ///
    /// Compares the spatial components componentwise, which is the mode
    /// uniqueness criterion at grid resolution.
    pub fn mode_within_resolution(&self, other: &Cluster, resolution: &[f64]) -> bool {
        self.mode
            .iter()
            .zip(&other.mode)
            .zip(resolution)
            .all(|((a, b), r)| (a - b).abs() <= *r)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Vec<Point> {
        vec![
            Point::new(vec![0, 0], vec![0.0, 0.0], vec![0.0, 0.0, 1.0]),
            Point::new(vec![0, 1], vec![0.0, 1.0], vec![0.0, 1.0, 3.0]),
            Point::new(vec![1, 0], vec![1.0, 0.0], vec![1.0, 0.0, 0.0]),
            Point::new(vec![1, 1], vec![1.0, 1.0], vec![1.0, 1.0, 4.0]),
        ]
    }

    fn cluster_of(points: &[usize]) -> Cluster {
        let mut cluster = Cluster::new(vec![0.0, 0.0, 0.0]);
        for &p in points {
            cluster.add_point(p);
        }
        cluster
    }

    #[test]
    fn weighed_center_leans_towards_heavy_points() {
        let arena = arena();
        let cluster = cluster_of(&[0, 1]);

        // weights 1.0 at y=0 and 3.0 at y=1
        let center = cluster.weighed_center(&arena, 2, 0);
        assert_eq!(center, vec![0.0, 0.75]);
    }

    #[test]
    fn weighed_center_with_zero_weights_is_the_mean(){
        let arena = arena();
        let cluster = cluster_of(&[0, 2]);

        // point 2 carries weight 0, point 0 weight 1
        let center = cluster.weighed_center(&arena, 2, 0);
        assert_eq!(center, vec![0.0, 0.0]);

        let mut zeroed = arena.clone();
        for p in &mut zeroed {
            let n = p.coordinate.len();
            p.values[n] = 0.0;
        }
        let center = cluster.weighed_center(&zeroed, 2, 0);
        assert_eq!(center, vec![0.5, 0.0]);
    }

    #[test]
    fn coverage_counts_shared_gridpoints() {
        let arena = arena();
        let a = cluster_of(&[0, 1]);
        let b = cluster_of(&[1, 2, 3]);

        assert_eq!(a.percent_covered_by(&arena, &b, &arena), 0.5);
        assert!((b.percent_covered_by(&arena, &a, &arena) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn bounds_span_the_point_set() {
        let arena = arena();
        let cluster = cluster_of(&[0, 3]);
        let bounds = cluster.bounds(&arena);
        assert_eq!(bounds.min, vec![0, 0]);
        assert_eq!(bounds.max, vec![1, 1]);
    }

    #[test]
    fn histogram_cache_invalidates_on_mutation() {
        let arena = arena();
        let mut cluster = cluster_of(&[0, 1]);

        assert_eq!(cluster.histogram(&arena, 0, 4, 0.0, 4.0).sum(), 2);
        cluster.add_point(3);
        assert_eq!(cluster.histogram(&arena, 0, 4, 0.0, 4.0).sum(), 3);

        let pure = cluster.compute_histogram(&arena, 0, 4, 0.0, 4.0);
        assert_eq!(&pure, cluster.histogram(&arena, 0, 4, 0.0, 4.0));
    }
}
