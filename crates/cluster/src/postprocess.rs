//! Post-processing passes over an aggregated cluster list

// crate modules
use crate::cluster_list::ClusterList;

// wxtools modules
use wxtools_field::FeatureSpace;
use wxtools_index::KdTree;

// external crates
use itertools::Itertools;
use log::{debug, info};

// standard library
use std::collections::HashSet;

impl ClusterList {
    /// Discard clusters with fewer points than the given minimum
    ///
    /// Point back-references are rebound afterwards, so the arena stays
    /// consistent with the surviving clusters.
    pub fn apply_size_threshold(&mut self, fs: &mut FeatureSpace, min_cluster_size: usize) {
        let before = self.clusters.len();
        self.clusters.retain(|c| c.size() >= min_cluster_size);
        if self.clusters.len() != before {
            info!(
                "size threshold {} dropped {} of {} clusters",
                min_cluster_size,
                before - self.clusters.len(),
                before
            );
        }
        self.rebind(fs);
    }

    /// Merge neighbouring clusters across smooth boundaries
    ///
    /// For each pair of adjacent clusters the boundary points (points of
    /// one cluster within grid resolution of any point of the other) are
    /// analysed in the given variable. The pair merges when the crossing is
    /// smooth (relative variability CV = σ/μ below `cv_threshold`) and the
    /// boundary carries signal (dynamic-range factor above
    /// `drf_threshold`). After every merge the pairwise scan restarts;
    /// the pass ends when no pair qualifies, which also makes it
    /// idempotent.
    pub fn aggregate_by_boundary_analysis(
        &mut self,
        fs: &mut FeatureSpace,
        variable: usize,
        cv_threshold: f64,
        drf_threshold: f64,
    ) {
        let resolution = fs.coordinate_system.resolution();
        let columns: Vec<usize> = (0..fs.spatial_rank()).collect();
        let tree = KdTree::build(&fs.points, &columns);
        let observed_range = fs.observed_max(variable) - fs.observed_min(variable);

        let mut merges = 0_usize;
        'scan: loop {
            for (i, j) in (0..self.clusters.len()).tuple_combinations() {
                let boundary = boundary_points(self, fs, &tree, &resolution, i, j);
                if boundary.is_empty() {
                    continue;
                }

                let values: Vec<f64> = boundary
                    .iter()
                    .map(|&p| fs.points[p].value(variable))
                    .collect();
                let cv = relative_variability(&values);
                let drf = dynamic_range_factor(&values, observed_range);
                debug!("boundary {i}/{j}: {} points, CV {cv:.3}, DRF {drf:.3}", values.len());

                if cv < cv_threshold && drf > drf_threshold {
                    let mut other = self.clusters.remove(j);
                    let survivor = &mut self.clusters[i];
                    survivor.mode = survivor
                        .mode
                        .iter()
                        .zip(&other.mode)
                        .map(|(a, b)| 0.5 * (a + b))
                        .collect();
                    survivor.absorb(&mut other);
                    merges += 1;
                    continue 'scan;
                }
            }
            break;
        }

        if merges > 0 {
            info!("boundary analysis merged {merges} cluster pairs");
        }
        self.rebind(fs);
    }

    /// Absorb undersized clusters into their strongest neighbour
    ///
    /// Every cluster below `min_cluster_size` that touches a neighbour
    /// (boundary points within grid resolution) is coalesced into the
    /// touching cluster whose mode carries the highest value of the given
    /// variable. Restarts until stable.
    pub fn coalesce_with_strongest_neighbour(
        &mut self,
        fs: &mut FeatureSpace,
        variable: usize,
        min_cluster_size: usize,
    ) {
        let resolution = fs.coordinate_system.resolution();
        let columns: Vec<usize> = (0..fs.spatial_rank()).collect();
        let tree = KdTree::build(&fs.points, &columns);
        let mode_value = fs.spatial_rank() + variable;

        'scan: loop {
            for i in 0..self.clusters.len() {
                if self.clusters[i].size() >= min_cluster_size {
                    continue;
                }

                let strongest = (0..self.clusters.len())
                    .filter(|&j| j != i)
                    .filter(|&j| !boundary_points(self, fs, &tree, &resolution, i, j).is_empty())
                    .max_by(|&a, &b| {
                        self.clusters[a].mode[mode_value]
                            .total_cmp(&self.clusters[b].mode[mode_value])
                    });

                if let Some(j) = strongest {
                    debug!(
                        "coalescing cluster {i} ({} points) into neighbour {j}",
                        self.clusters[i].size()
                    );
                    let mut small = self.clusters.remove(i);
                    let j = if j > i { j - 1 } else { j };
                    self.clusters[j].absorb(&mut small);
                    continue 'scan;
                }
            }
            break;
        }

        self.rebind(fs);
    }
}

/// Points of either cluster within grid resolution of the other
fn boundary_points(
    list: &ClusterList,
    fs: &FeatureSpace,
    tree: &KdTree,
    resolution: &[f64],
    i: usize,
    j: usize,
) -> Vec<usize> {
    let members_i: HashSet<usize> = list.clusters[i].points.iter().copied().collect();
    let members_j: HashSet<usize> = list.clusters[j].points.iter().copied().collect();

    let mut boundary = Vec::new();
    for (own, other) in [(&members_i, &members_j), (&members_j, &members_i)] {
        for &p in own.iter().sorted() {
            let touches = tree
                .range(&fs.points[p].coordinate, resolution)
                .iter()
                .any(|hit| other.contains(&hit.point));
            if touches {
                boundary.push(p);
            }
        }
    }
    boundary
}

/// Relative variability CV = σ/μ of a value sample
///
/// Undefined spreads (fewer than two points, zero mean) report infinite
/// variability so they never read as a smooth crossing.
fn relative_variability(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::INFINITY;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return f64::INFINITY;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt() / mean
}

/// Fraction of the variable's observed range spanned by the boundary values
fn dynamic_range_factor(values: &[f64], observed_range: f64) -> f64 {
    if observed_range <= 0.0 || values.is_empty() {
        return 0.0;
    }
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    (max - min) / observed_range
}
