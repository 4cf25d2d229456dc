//! Module for the cluster list and its identifier bookkeeping

// crate modules
use crate::cluster::Cluster;

// wxtools modules
use wxtools_field::FeatureSpace;
use wxtools_utils::{f, ValueExt};

/// An ordered list of clusters plus the tracking bookkeeping
///
/// Identifiers are unique within a list. After tracking,
/// `tracked_ids ∪ new_ids` covers exactly the current frame's identifiers
/// and `dropped_ids` refers to the previous frame only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterList {
    /// The clusters, in aggregation order
    pub clusters: Vec<Cluster>,
    /// Identifiers carried over from the previous frame
    pub tracked_ids: Vec<u64>,
    /// Identifiers assigned fresh in this frame
    pub new_ids: Vec<u64>,
    /// Previous-frame identifiers that did not survive
    pub dropped_ids: Vec<u64>,
    /// Set once a tracking run has completed on this list
    pub tracking_performed: bool,
    /// Provenance of the gridded input
    pub source_file: String,
    /// Names of the feature variables used in the run
    pub feature_variables: Vec<String>,
}

impl ClusterList {
    /// Initialise an empty list
    pub fn new(source_file: String, feature_variables: Vec<String>) -> Self {
        Self {
            source_file,
            feature_variables,
            ..Default::default()
        }
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Check for an empty list
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Largest identifier in the list, [Cluster::NO_ID] when none assigned
    pub fn highest_id(&self) -> u64 {
        self.clusters
            .iter()
            .map(|c| c.id)
            .max()
            .unwrap_or(Cluster::NO_ID)
    }

    /// Reset every identifier to [Cluster::NO_ID]
    ///
    /// Prepares the current frame for re-identification by the tracker.
    pub fn erase_identifiers(&mut self) {
        for cluster in &mut self.clusters {
            cluster.id = Cluster::NO_ID;
        }
    }

    /// Rewrite all point back-references to match the current list
    ///
    /// Any list mutation that removes or reorders clusters invalidates the
    /// arena's `cluster` indices; this makes them consistent again.
    pub fn rebind(&self, fs: &mut FeatureSpace) {
        fs.reset_clustering();
        for (index, cluster) in self.clusters.iter().enumerate() {
            for &p in &cluster.points {
                fs.points[p].cluster = Some(index);
            }
        }
    }

    /// Human-readable summary of the list
    ///
    /// One line per cluster with identifier, size, and mode, prefixed by
    /// the provenance and variable lines wrapped to terminal width.
    pub fn summary(&self, run_parameters: &str) -> String {
        let mut out = String::new();
        out.push_str(&f!("source: {}\n", self.source_file));
        out.push_str(&textwrap::fill(
            &f!("variables: {}", self.feature_variables.join(", ")),
            80,
        ));
        out.push('\n');
        if !run_parameters.is_empty() {
            out.push_str(&textwrap::fill(&f!("parameters: {run_parameters}"), 80));
            out.push('\n');
        }

        out.push_str(&f!("clusters: {}\n", self.clusters.len()));
        for cluster in &self.clusters {
            let mode = cluster
                .mode
                .iter()
                .map(|m| m.sci(3, 2))
                .collect::<Vec<String>>()
                .join(" ");
            out.push_str(&f!(
                "  #{:<6} {:>8} points   mode [{}]\n",
                cluster.id,
                cluster.size(),
                mode
            ));
        }

        if self.tracking_performed {
            out.push_str(&f!("tracked ids: {:?}\n", self.tracked_ids));
            out.push_str(&f!("new ids    : {:?}\n", self.new_ids));
            out.push_str(&f!("dropped ids: {:?}\n", self.dropped_ids));
        }

        out
    }
}
