//! Module for the k-d tree point index

// crate modules
use crate::search::Neighbour;

// wxtools modules
use wxtools_field::Point;

/// One indexed point: arena index, gridpoint, and the indexed key
///
/// The key holds the selected columns of the point's `values` vector, so
/// the same tree type serves both purely spatial indexes and full
/// feature-space indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Index of the point in the feature-space arena
    pub point: usize,
    /// Gridpoint, kept for deterministic k-NN tie-breaking
    pub gridpoint: Vec<usize>,
    /// Selected `values` components the tree is keyed on
    pub key: Vec<f64>,
}

#[derive(Debug)]
struct Node {
    entry: Entry,
    left: Option<usize>,
    right: Option<usize>,
}

/// A k-d tree over selected feature-space columns
///
/// Supports range searches (per-dimension bandwidth box, filtered to the
/// normalised ellipse) and k-NN queries. Insertion is supported; deletion
/// is not. An empty result is always valid.
///
/// ```rust
/// # use wxtools_index::KdTree;
/// # use wxtools_field::Point;
/// let points = vec![
///     Point::new(vec![0, 0], vec![0.0, 0.0], vec![0.0, 0.0]),
///     Point::new(vec![0, 1], vec![0.0, 1.0], vec![0.0, 1.0]),
///     Point::new(vec![5, 5], vec![5.0, 5.0], vec![5.0, 5.0]),
/// ];
/// let tree = KdTree::build(&points, &[0, 1]);
///
/// let hits = tree.range(&[0.0, 0.0], &[1.5, 1.5]);
/// assert_eq!(hits.len(), 2);
/// ```
#[derive(Debug)]
pub struct KdTree {
    columns: Vec<usize>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    /// Build a tree over the given columns of a point arena
    pub fn build(points: &[Point], columns: &[usize]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(index, point)| Entry {
                point: index,
                gridpoint: point.gridpoint.clone(),
                key: columns.iter().map(|&c| point.values[c]).collect(),
            })
            .collect();
        Self::from_entries(columns.to_vec(), entries)
    }

    /// Build a tree from pre-computed entries
    ///
    /// Used by the whitening index, which transforms the keys before they
    /// go into the tree.
    pub fn from_entries(columns: Vec<usize>, entries: Vec<Entry>) -> Self {
        let mut tree = Self {
            columns,
            nodes: Vec::with_capacity(entries.len()),
            root: None,
        };
        tree.root = tree.build_node(entries, 0);
        tree
    }

    /// Number of indexed dimensions
    pub fn dimension(&self) -> usize {
        self.columns.len()
    }

    /// The `values` columns this tree is keyed on
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check for an empty tree
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Median split on the cycling axis
    fn build_node(&mut self, mut entries: Vec<Entry>, depth: usize) -> Option<usize> {
        if entries.is_empty() {
            return None;
        }
        let axis = depth % self.dimension();
        entries.sort_by(|a, b| a.key[axis].total_cmp(&b.key[axis]));

        let median = entries.len() / 2;
        let right = entries.split_off(median + 1);
        let entry = entries.pop().expect("median split keeps one entry");

        let index = self.nodes.len();
        self.nodes.push(Node {
            entry,
            left: None,
            right: None,
        });

        let left = self.build_node(entries, depth + 1);
        let right = self.build_node(right, depth + 1);
        self.nodes[index].left = left;
        self.nodes[index].right = right;

        Some(index)
    }

    /// Insert a single entry without rebalancing
    pub fn insert(&mut self, entry: Entry) {
        let index = self.nodes.len();
        self.nodes.push(Node {
            entry,
            left: None,
            right: None,
        });

        let Some(mut current) = self.root else {
            self.root = Some(index);
            return;
        };

        let mut depth = 0;
        loop {
            let axis = depth % self.dimension();
            let go_left = self.nodes[index].entry.key[axis] < self.nodes[current].entry.key[axis];
            let next = if go_left {
                self.nodes[current].left
            } else {
                self.nodes[current].right
            };
            match next {
                Some(child) => current = child,
                None => {
                    if go_left {
                        self.nodes[current].left = Some(index);
                    } else {
                        self.nodes[current].right = Some(index);
                    }
                    return;
                }
            }
        }
    }

    /// All points within the per-dimension bandwidth box of the query,
    /// filtered to the normalised ellipse
    ///
    /// Returned distances are bandwidth-scaled, i.e. `‖Δ/h‖ ≤ 1`, which is
    /// what the kernels expect.
    pub fn range(&self, query: &[f64], bandwidth: &[f64]) -> Vec<Neighbour> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.range_recursive(root, 0, query, bandwidth, &mut out);
        }
        out
    }

    fn range_recursive(
        &self,
        node: usize,
        depth: usize,
        query: &[f64],
        bandwidth: &[f64],
        out: &mut Vec<Neighbour>,
    ) {
        let axis = depth % self.dimension();
        let key = &self.nodes[node].entry.key;

        let inside_box = key
            .iter()
            .zip(query)
            .zip(bandwidth)
            .all(|((k, q), h)| (k - q).abs() <= *h);
        if inside_box {
            let distance = scaled_distance(key, query, bandwidth);
            if distance <= 1.0 {
                out.push(Neighbour {
                    point: self.nodes[node].entry.point,
                    distance,
                });
            }
        }

        if let Some(left) = self.nodes[node].left {
            if query[axis] - bandwidth[axis] <= key[axis] {
                self.range_recursive(left, depth + 1, query, bandwidth, out);
            }
        }
        if let Some(right) = self.nodes[node].right {
            if query[axis] + bandwidth[axis] >= key[axis] {
                self.range_recursive(right, depth + 1, query, bandwidth, out);
            }
        }
    }

    /// The k nearest points by Euclidean key distance
    ///
    /// Exact ties are broken by ascending gridpoint lexicographic order, so
    /// the result never depends on tree layout.
    pub fn knn(&self, query: &[f64], k: usize) -> Vec<Neighbour> {
        if k == 0 {
            return Vec::new();
        }
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        if let Some(root) = self.root {
            self.knn_recursive(root, 0, query, k, &mut best);
        }
        best.into_iter()
            .map(|(distance, node)| Neighbour {
                point: self.nodes[node].entry.point,
                distance,
            })
            .collect()
    }

    fn knn_recursive(
        &self,
        node: usize,
        depth: usize,
        query: &[f64],
        k: usize,
        best: &mut Vec<(f64, usize)>,
    ) {
        let axis = depth % self.dimension();
        let key = &self.nodes[node].entry.key;
        let distance = euclidean_distance(key, query);

        // sorted insert, ordering on (distance, gridpoint)
        let position = best
            .iter()
            .position(|&(d, n)| {
                distance.total_cmp(&d).then_with(|| {
                    self.nodes[node]
                        .entry
                        .gridpoint
                        .cmp(&self.nodes[n].entry.gridpoint)
                }) == std::cmp::Ordering::Less
            })
            .unwrap_or(best.len());
        best.insert(position, (distance, node));
        best.truncate(k);

        let diff = query[axis] - key[axis];
        let (near, far) = if diff < 0.0 {
            (self.nodes[node].left, self.nodes[node].right)
        } else {
            (self.nodes[node].right, self.nodes[node].left)
        };

        if let Some(near) = near {
            self.knn_recursive(near, depth + 1, query, k, best);
        }
        let worst = if best.len() < k {
            f64::INFINITY
        } else {
            best[best.len() - 1].0
        };
        if let Some(far) = far {
            if diff.abs() <= worst {
                self.knn_recursive(far, depth + 1, query, k, best);
            }
        }
    }
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn scaled_distance(a: &[f64], b: &[f64], bandwidth: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .zip(bandwidth)
        .map(|((x, y), h)| {
            let d = (x - y) / h;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn grid_points() -> Vec<Point> {
        let mut points = Vec::new();
        for i in 0..5_usize {
            for j in 0..5_usize {
                let coordinate = vec![i as f64, j as f64];
                points.push(Point::new(vec![i, j], coordinate.clone(), coordinate));
            }
        }
        points
    }

    #[test]
    fn range_is_an_ellipse_not_a_box() {
        let points = grid_points();
        let tree = KdTree::build(&points, &[0, 1]);

        // bandwidth (1, 1): corners of the box are outside the unit circle
        let hits = tree.range(&[2.0, 2.0], &[1.0, 1.0]);
        assert_eq!(hits.len(), 5);
        for hit in &hits {
            assert!(hit.distance <= 1.0);
        }
    }

    #[test]
    fn anisotropic_bandwidth_stretches_the_search() {
        let points = grid_points();
        let tree = KdTree::build(&points, &[0, 1]);

        let hits = tree.range(&[2.0, 2.0], &[2.0, 1.0]);
        let found: Vec<usize> = hits.iter().map(|h| h.point).collect();
        // (0,2) and (4,2) are inside, (2,0)/(2,4) are on the rim too
        assert!(found.contains(&points.iter().position(|p| p.gridpoint == [0, 2]).unwrap()));
        assert!(found.contains(&points.iter().position(|p| p.gridpoint == [4, 2]).unwrap()));
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(10)]
    fn knn_returns_k_sorted(#[case] k: usize) {
        let points = grid_points();
        let tree = KdTree::build(&points, &[0, 1]);

        let hits = tree.knn(&[0.1, 0.1], k);
        assert_eq!(hits.len(), k);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(points[hits[0].point].gridpoint, vec![0, 0]);
    }

    #[test]
    fn knn_ties_break_by_gridpoint_order() {
        let points = grid_points();
        let tree = KdTree::build(&points, &[0, 1]);

        // (1,2), (2,1), (2,3), (3,2) are all at distance 1 from (2,2)
        let hits = tree.knn(&[2.0, 2.0], 3);
        assert_eq!(points[hits[0].point].gridpoint, vec![2, 2]);
        assert_eq!(points[hits[1].point].gridpoint, vec![1, 2]);
        assert_eq!(points[hits[2].point].gridpoint, vec![2, 1]);
    }

    #[test]
    fn inserted_points_are_found() {
        let points = grid_points();
        let mut tree = KdTree::build(&points, &[0, 1]);

        tree.insert(Entry {
            point: 99,
            gridpoint: vec![9, 9],
            key: vec![2.4, 2.4],
        });
        let hits = tree.range(&[2.5, 2.5], &[0.5, 0.5]);
        assert!(hits.iter().any(|h| h.point == 99));
    }

    #[test]
    fn empty_result_is_valid() {
        let points = grid_points();
        let tree = KdTree::build(&points, &[0, 1]);
        assert!(tree.range(&[100.0, 100.0], &[1.0, 1.0]).is_empty());
    }
}
