//! Read and write operations for cluster files
//!
//! A cluster file is a versioned JSON document carrying everything needed
//! to rebuild a [ClusterList] and its point arena: the source provenance,
//! the feature variables, the coordinate axes, a free-form run-parameter
//! string, and one record per cluster (identifier, mode, gridpoints,
//! per-point feature values, bounding box).
//!
//! Writing then reading reproduces the list exactly; reading then writing
//! reproduces the document byte-for-byte modulo floating-point printing.

// crate modules
use crate::cluster::Cluster;
use crate::cluster_list::ClusterList;
use crate::error::{Error, Result};

// wxtools modules
use wxtools_field::{CoordinateSystem, FeatureSpace, Point};

// external crates
use log::{debug, info};
use serde::{Deserialize, Serialize};

// standard library
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Version written to and expected from cluster files
pub const FILE_VERSION: u32 = 1;

/// Serde view of the on-disk document
#[derive(Debug, Serialize, Deserialize)]
struct ClusterDocument {
    file_version: u32,
    source_file: String,
    run_parameters: String,
    feature_variables: Vec<String>,
    dimensions: Vec<AxisRecord>,
    clusters: Vec<ClusterRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AxisRecord {
    name: String,
    values: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClusterRecord {
    id: u64,
    mode: Vec<f64>,
    gridpoints: Vec<Vec<usize>>,
    values: Vec<Vec<f64>>,
    bounds: BoundsRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct BoundsRecord {
    min: Vec<usize>,
    max: Vec<usize>,
}

/// Everything a cluster file rebuilds on read
#[derive(Debug)]
pub struct ClusterFileData {
    /// The reconstructed point arena
    pub feature_space: FeatureSpace,
    /// The cluster list, back-references bound into the arena
    pub cluster_list: ClusterList,
    /// The free-form run-parameter string of the producing run
    pub run_parameters: String,
}

/// Write a cluster list to a cluster file
///
/// On any failure the partially written file is removed, so a path either
/// holds a complete document or nothing.
pub fn write_cluster_file<P: AsRef<Path>>(
    path: P,
    list: &ClusterList,
    fs: &FeatureSpace,
    run_parameters: &str,
) -> Result<()> {
    let result = write_document(path.as_ref(), list, fs, run_parameters);
    if result.is_err() {
        let _ = std::fs::remove_file(path.as_ref());
    }
    result
}

fn write_document(
    path: &Path,
    list: &ClusterList,
    fs: &FeatureSpace,
    run_parameters: &str,
) -> Result<()> {
    let cs = &fs.coordinate_system;
    let document = ClusterDocument {
        file_version: FILE_VERSION,
        source_file: list.source_file.clone(),
        run_parameters: run_parameters.to_string(),
        feature_variables: list.feature_variables.clone(),
        dimensions: cs
            .dimensions()
            .iter()
            .enumerate()
            .map(|(d, name)| AxisRecord {
                name: name.clone(),
                values: cs.axis(d).to_vec(),
            })
            .collect(),
        clusters: list
            .clusters
            .iter()
            .map(|cluster| {
                let bounds = cluster.bounds(&fs.points);
                ClusterRecord {
                    id: cluster.id,
                    mode: cluster.mode.clone(),
                    gridpoints: cluster
                        .points
                        .iter()
                        .map(|&p| fs.points[p].gridpoint.clone())
                        .collect(),
                    values: cluster
                        .points
                        .iter()
                        .map(|&p| fs.points[p].feature_values().to_vec())
                        .collect(),
                    bounds: BoundsRecord {
                        min: bounds.min,
                        max: bounds.max,
                    },
                }
            })
            .collect(),
    };

    info!(
        "writing {} clusters to {}",
        document.clusters.len(),
        path.display()
    );
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(())
}

/// Read a cluster file back into a list and its point arena
pub fn read_cluster_file<P: AsRef<Path>>(path: P) -> Result<ClusterFileData> {
    debug!("reading cluster file {}", path.as_ref().display());
    let reader = BufReader::new(File::open(path)?);
    let document: ClusterDocument = serde_json::from_reader(reader)?;

    if document.file_version != FILE_VERSION {
        return Err(Error::UnsupportedVersion {
            expected: FILE_VERSION,
            found: document.file_version,
        });
    }

    let (names, axes) = document
        .dimensions
        .into_iter()
        .map(|axis| (axis.name, axis.values))
        .unzip();
    let cs = CoordinateSystem::new(names, axes)?;

    let mut arena: Vec<Point> = Vec::new();
    let mut clusters = Vec::with_capacity(document.clusters.len());

    for (index, record) in document.clusters.into_iter().enumerate() {
        let mut cluster = Cluster::new(record.mode);
        cluster.id = record.id;

        for (gridpoint, features) in record.gridpoints.into_iter().zip(record.values) {
            let coordinate = cs.coordinate(&gridpoint);
            let mut values = coordinate.clone();
            values.extend_from_slice(&features);

            let mut point = Point::new(gridpoint, coordinate, values);
            point.cluster = Some(index);
            cluster.add_point(arena.len());
            arena.push(point);
        }

        clusters.push(cluster);
    }

    let feature_space =
        FeatureSpace::from_points(cs, document.feature_variables.clone(), arena);
    let cluster_list = ClusterList {
        clusters,
        source_file: document.source_file,
        feature_variables: document.feature_variables,
        ..Default::default()
    };

    Ok(ClusterFileData {
        feature_space,
        cluster_list,
        run_parameters: document.run_parameters,
    })
}
