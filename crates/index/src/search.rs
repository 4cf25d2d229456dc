//! Search parameters and the closed index dispatch

// crate modules
use crate::kdtree::KdTree;
use crate::whitening::WhiteningIndex;

// wxtools modules
use wxtools_field::Point;

/// One search result: arena index plus the query distance
///
/// For range searches the distance is bandwidth-scaled (`‖Δ/h‖`); for k-NN
/// it is the plain Euclidean key distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbour {
    /// Index of the point in the feature-space arena
    pub point: usize,
    /// Distance from the query
    pub distance: f64,
}

/// Selects range or k-NN search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchParams {
    /// All points within the per-dimension bandwidth box, filtered by
    /// normalised Euclidean distance
    Range {
        /// Per-dimension search radius
        bandwidth: Vec<f64>,
    },
    /// The k nearest points, ties by ascending gridpoint order
    Knn {
        /// Number of neighbours
        k: usize,
    },
}

/// Closed dispatch over the plain and whitening index variants
///
/// The whitened variant trades index build time for cheaper anisotropic
/// searches and is selected by configuration.
#[derive(Debug)]
pub enum FeatureSpaceIndex {
    /// Direct k-d tree over the raw columns
    Plain(KdTree),
    /// Fixed-radius searches in a pre-whitened space
    Whitened(WhiteningIndex),
}

impl FeatureSpaceIndex {
    /// Build an index over the given columns of a point arena
    ///
    /// Passing a bandwidth enables the whitening variant, which serves
    /// range searches of exactly that bandwidth.
    pub fn build(points: &[Point], columns: &[usize], whitening: Option<&[f64]>) -> Self {
        match whitening {
            Some(bandwidth) => {
                Self::Whitened(WhiteningIndex::build(points, columns, bandwidth))
            }
            None => Self::Plain(KdTree::build(points, columns)),
        }
    }

    /// Run a search against either variant
    pub fn search(&self, query: &[f64], params: &SearchParams) -> Vec<Neighbour> {
        match (self, params) {
            (Self::Plain(tree), SearchParams::Range { bandwidth }) => {
                tree.range(query, bandwidth)
            }
            (Self::Plain(tree), SearchParams::Knn { k }) => tree.knn(query, *k),
            (Self::Whitened(index), SearchParams::Range { bandwidth }) => {
                index.range(query, bandwidth)
            }
            (Self::Whitened(index), SearchParams::Knn { k }) => index.knn(query, *k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Point> {
        (0..10)
            .map(|i| {
                let x = f64::from(i);
                Point::new(vec![i as usize], vec![x], vec![x, x * 2.0])
            })
            .collect()
    }

    #[test]
    fn plain_and_whitened_range_agree() {
        let points = points();
        let bandwidth = vec![2.0, 5.0];
        let plain = FeatureSpaceIndex::build(&points, &[0, 1], None);
        let white = FeatureSpaceIndex::build(&points, &[0, 1], Some(&bandwidth));

        let params = SearchParams::Range {
            bandwidth: bandwidth.clone(),
        };
        let mut a = plain.search(&[4.0, 8.0], &params);
        let mut b = white.search(&[4.0, 8.0], &params);
        a.sort_by_key(|n| n.point);
        b.sort_by_key(|n| n.point);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.point, y.point);
            assert!((x.distance - y.distance).abs() < 1e-12);
        }
    }
}
