//! Module for the whitening index variant

// crate modules
use crate::kdtree::{Entry, KdTree};
use crate::search::Neighbour;

// wxtools modules
use wxtools_field::Point;

// external crates
use nalgebra::{DMatrix, DVector};

/// The constant radius used for the whitening transformation
pub const WHITE_RADIUS: f64 = 1.0;

/// A point index over a pre-whitened coordinate space
///
/// The indexed columns are premultiplied by the diagonal transformation
/// `Ω = diag(white_radius / bandwidth[i])`, turning the anisotropic
/// bandwidth ellipse into a sphere of radius [WHITE_RADIUS]. Range searches
/// then reduce to a fixed-radius search in the whitened space and return
/// the same bandwidth-scaled distances as the plain tree.
///
/// Whitening a large feature space is a noticeable up-front cost, so the
/// plain index stays the default.
#[derive(Debug)]
pub struct WhiteningIndex {
    tree: KdTree,
    bandwidth: Vec<f64>,
    omega: DVector<f64>,
}

impl WhiteningIndex {
    /// Whiten the selected columns and build the underlying tree
    pub fn build(points: &[Point], columns: &[usize], bandwidth: &[f64]) -> Self {
        let dimension = columns.len();
        let omega = DVector::from_iterator(
            dimension,
            bandwidth.iter().map(|h| WHITE_RADIUS / h),
        );

        // feature space as a (points × dimensions) matrix, then transformed
        let matrix = DMatrix::from_fn(points.len(), dimension, |row, col| {
            points[row].values[columns[col]]
        });
        let white = &matrix * DMatrix::from_diagonal(&omega);

        let entries = points
            .iter()
            .enumerate()
            .map(|(index, point)| Entry {
                point: index,
                gridpoint: point.gridpoint.clone(),
                key: white.row(index).iter().copied().collect(),
            })
            .collect();

        Self {
            tree: KdTree::from_entries(columns.to_vec(), entries),
            bandwidth: bandwidth.to_vec(),
            omega,
        }
    }

    /// The bandwidth this index was whitened for
    pub fn bandwidth(&self) -> &[f64] {
        &self.bandwidth
    }

    /// Transform a query into the whitened space
    fn transform(&self, query: &[f64]) -> Vec<f64> {
        query
            .iter()
            .zip(self.omega.iter())
            .map(|(x, w)| x * w)
            .collect()
    }

    /// Fixed-radius search in the whitened space
    ///
    /// Only the bandwidth the index was built with can be served; the
    /// caller selects whitening per pipeline run, so the bandwidths always
    /// line up.
    pub fn range(&self, query: &[f64], bandwidth: &[f64]) -> Vec<Neighbour> {
        debug_assert_eq!(bandwidth, self.bandwidth.as_slice());
        let white_query = self.transform(query);
        let white_bandwidth = vec![WHITE_RADIUS; white_query.len()];
        self.tree.range(&white_query, &white_bandwidth)
    }

    /// k-NN in the whitened space, distances bandwidth-scaled
    pub fn knn(&self, query: &[f64], k: usize) -> Vec<Neighbour> {
        self.tree.knn(&self.transform(query), k)
    }

    /// Whiten and insert a single point
    pub fn insert(&mut self, index: usize, point: &Point) {
        let key = self.transform(
            &self
                .tree
                .columns()
                .iter()
                .map(|&c| point.values[c])
                .collect::<Vec<f64>>(),
        );
        self.tree.insert(Entry {
            point: index,
            gridpoint: point.gridpoint.clone(),
            key,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitened_distances_are_bandwidth_scaled() {
        let points = vec![
            Point::new(vec![0], vec![0.0], vec![0.0, 0.0]),
            Point::new(vec![1], vec![1.0], vec![3.0, 4.0]),
        ];
        let index = WhiteningIndex::build(&points, &[0, 1], &[6.0, 8.0]);

        let hits = index.range(&[0.0, 0.0], &[6.0, 8.0]);
        assert_eq!(hits.len(), 2);
        let far = hits.iter().find(|n| n.point == 1).unwrap();
        // (3/6)² + (4/8)² = 0.5, distance = sqrt(0.5)
        assert!((far.distance - 0.5_f64.sqrt()).abs() < 1e-12);
    }
}
