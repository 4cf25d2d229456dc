//! Graph aggregation of the converged shift field into clusters

// crate modules
use crate::cluster::Cluster;
use crate::cluster_list::ClusterList;

// wxtools modules
use wxtools_field::FeatureSpace;
use wxtools_index::KdTree;
use wxtools_utils::SliceExt;

// external crates
use itertools::Itertools;
use log::{debug, info};

// standard library
use std::collections::BTreeMap;

impl ClusterList {
    /// Aggregate a feature space with populated shifts into clusters
    ///
    /// Every converged point is linked to its graph predecessor, the
    /// nearest point to `p + shift` within the resolution neighbourhood.
    /// Predecessor chains end in modes (points that are their own
    /// predecessor), and all points sharing a mode form one cluster whose
    /// `mode` attribute is that point's feature-space position.
    ///
    /// Modes closer than the resolution vector are duplicates of the same
    /// density maximum and are merged, the surviving mode being their
    /// arithmetic mean. Non-convergent points stay unclustered.
    pub fn aggregate(fs: &mut FeatureSpace, resolution: &[f64], source_file: &str) -> ClusterList {
        let columns: Vec<usize> = (0..fs.spatial_rank()).collect();
        let tree = KdTree::build(&fs.points, &columns);

        let n = fs.len();
        let mut predecessor = vec![usize::MAX; n];
        for index in 0..n {
            if fs.points[index].converged {
                predecessor[index] = predecessor_of(fs, &tree, resolution, index);
            }
        }

        let mut mode_of: Vec<Option<usize>> = vec![None; n];
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for index in 0..n {
            if !fs.points[index].converged {
                continue;
            }
            let mode = resolve_mode(fs, &predecessor, &mut mode_of, index);
            groups.entry(mode).or_default().push(index);
        }
        debug!("{} raw modes before duplicate resolution", groups.len());

        let mut list = ClusterList::new(source_file.to_string(), fs.variable_names().to_vec());
        for (mode, members) in groups {
            let mut cluster = Cluster::new(fs.points[mode].values.clone());
            for p in members {
                cluster.add_point(p);
            }
            list.clusters.push(cluster);
        }

        list.merge_duplicate_modes(resolution);
        list.rebind(fs);

        info!(
            "aggregated {} points into {} clusters",
            list.clusters.iter().map(Cluster::size).sum::<usize>(),
            list.len()
        );
        list
    }

    /// Merge clusters whose modes coincide at grid resolution
    pub(crate) fn merge_duplicate_modes(&mut self, resolution: &[f64]) {
        'scan: loop {
            for (i, j) in (0..self.clusters.len()).tuple_combinations() {
                if self.clusters[i].mode_within_resolution(&self.clusters[j], resolution) {
                    let mut other = self.clusters.remove(j);
                    let survivor = &mut self.clusters[i];
                    survivor.mode = survivor
                        .mode
                        .iter()
                        .zip(&other.mode)
                        .map(|(a, b)| 0.5 * (a + b))
                        .collect();
                    survivor.absorb(&mut other);
                    continue 'scan;
                }
            }
            break;
        }
    }
}

/// The best graph predecessor of a point along its shift
///
/// Nearest converged point to `p + shift`; exact distance ties go to the
/// steeper incoming shift, then to gridpoint order. A point with an empty
/// neighbourhood is its own predecessor and therefore a mode.
fn predecessor_of(
    fs: &FeatureSpace,
    tree: &KdTree,
    resolution: &[f64],
    index: usize,
) -> usize {
    let point = &fs.points[index];
    let target: Vec<f64> = point
        .coordinate
        .iter()
        .zip(&point.shift)
        .map(|(c, s)| c + s)
        .collect();

    let mut best = index;
    let mut best_distance = f64::INFINITY;

    for hit in tree.range(&target, resolution) {
        let candidate = &fs.points[hit.point];
        if !candidate.converged {
            continue;
        }
        let distance = candidate.coordinate.distance_to(&target);
        let replace = match distance.total_cmp(&best_distance) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => {
                let steeper = candidate
                    .shift
                    .norm()
                    .total_cmp(&fs.points[best].shift.norm());
                steeper == std::cmp::Ordering::Greater
                    || (steeper == std::cmp::Ordering::Equal
                        && candidate.gridpoint < fs.points[best].gridpoint)
            }
            std::cmp::Ordering::Greater => false,
        };
        if replace {
            best = hit.point;
            best_distance = distance;
        }
    }

    best
}

/// Follow predecessors to a fixed point, memoising along the way
///
/// Predecessor loops collapse onto the member with the steepest shift so
/// that the result never depends on traversal order.
fn resolve_mode(
    fs: &FeatureSpace,
    predecessor: &[usize],
    mode_of: &mut [Option<usize>],
    start: usize,
) -> usize {
    let mut path = Vec::new();
    let mut current = start;

    let mode = loop {
        if let Some(mode) = mode_of[current] {
            break mode;
        }
        if let Some(position) = path.iter().position(|&p| p == current) {
            let cycle = &path[position..];
            break cycle
                .iter()
                .copied()
                .max_by(|&a: &usize, &b: &usize| {
                    fs.points[a]
                        .shift
                        .norm()
                        .total_cmp(&fs.points[b].shift.norm())
                        .then_with(|| fs.points[b].gridpoint.cmp(&fs.points[a].gridpoint))
                })
                .expect("cycles are never empty");
        }
        path.push(current);
        let next = predecessor[current];
        if next == current {
            break current;
        }
        current = next;
    };

    for p in path {
        mode_of[p] = Some(mode);
    }
    mode_of[mode] = Some(mode);
    mode
}
