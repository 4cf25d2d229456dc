//! Module for feature-space construction

// crate modules
use crate::coordinate::CoordinateSystem;
use crate::error::{Error, Result};
use crate::point::Point;
use crate::store::DataStore;

// external crates
use log::{debug, info};

// standard library
use std::collections::HashMap;

/// Per-variable acceptance bounds for feature-space construction
///
/// Keys are variable indices. Cells with any variable below its lower
/// threshold or above its upper threshold are excluded, as are cells where
/// any variable reads as fill.
#[derive(Debug, Clone, Default)]
pub struct Thresholds {
    /// Minimum accepted value per variable index
    pub lower: HashMap<usize, f64>,
    /// Maximum accepted value per variable index
    pub upper: HashMap<usize, f64>,
}

/// The set of accepted grid cells lifted into (coordinate ⊕ value) vectors
///
/// Owns the point arena the whole pipeline works over. Points are only ever
/// mutated by the mean-shift engine (writes `shift`) and the cluster
/// aggregation (writes `cluster`).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpace {
    /// The coordinate system the points are gridded on
    pub coordinate_system: CoordinateSystem,
    /// The point arena
    pub points: Vec<Point>,
    variable_names: Vec<String>,
    observed_min: Vec<f64>,
    observed_max: Vec<f64>,
}

impl FeatureSpace {
    /// Construct a feature space from a data store
    ///
    /// Walks every gridpoint of the domain, reads all variables, and accepts
    /// the cell if nothing is missing and all thresholds hold. The observed
    /// per-variable minima and maxima of the accepted cells are recorded for
    /// downstream normalisation.
    pub fn from_store(
        coordinate_system: CoordinateSystem,
        store: &dyn DataStore,
        thresholds: &Thresholds,
    ) -> Result<Self> {
        if store.rank() != coordinate_system.rank() {
            return Err(Error::RankMismatch {
                expected: coordinate_system.rank(),
                found: store.rank(),
            });
        }

        let n_variables = store.variable_names().len();
        let variable_names = store.variable_names().to_vec();
        let mut observed_min = vec![f64::INFINITY; n_variables];
        let mut observed_max = vec![f64::NEG_INFINITY; n_variables];
        let mut points = Vec::new();

        let mut rejected = 0_usize;
        'cells: for offset in 0..coordinate_system.size() {
            let gridpoint = coordinate_system.gridpoint_at(offset);

            let mut features = Vec::with_capacity(n_variables);
            for variable in 0..n_variables {
                let value = match store.read(variable, &gridpoint) {
                    Some(value) => value,
                    None => continue 'cells,
                };
                if let Some(&lower) = thresholds.lower.get(&variable) {
                    if value < lower {
                        rejected += 1;
                        continue 'cells;
                    }
                }
                if let Some(&upper) = thresholds.upper.get(&variable) {
                    if value > upper {
                        rejected += 1;
                        continue 'cells;
                    }
                }
                features.push(value);
            }

            for (variable, value) in features.iter().enumerate() {
                observed_min[variable] = observed_min[variable].min(*value);
                observed_max[variable] = observed_max[variable].max(*value);
            }

            let coordinate = coordinate_system.coordinate(&gridpoint);
            let mut values = coordinate.clone();
            values.extend_from_slice(&features);
            points.push(Point::new(gridpoint, coordinate, values));
        }

        info!(
            "feature space holds {} of {} cells ({} rejected by thresholds)",
            points.len(),
            coordinate_system.size(),
            rejected
        );

        Ok(Self {
            coordinate_system,
            points,
            variable_names,
            observed_min,
            observed_max,
        })
    }

    /// Rebuild a feature space from an existing point arena
    ///
    /// Used when a cluster file is read back in and the arena has to be
    /// reconstructed from the per-cluster records.
    pub fn from_points(
        coordinate_system: CoordinateSystem,
        variable_names: Vec<String>,
        points: Vec<Point>,
    ) -> Self {
        let n_variables = variable_names.len();
        let mut observed_min = vec![f64::INFINITY; n_variables];
        let mut observed_max = vec![f64::NEG_INFINITY; n_variables];
        for point in &points {
            for (variable, value) in point.feature_values().iter().enumerate() {
                observed_min[variable] = observed_min[variable].min(*value);
                observed_max[variable] = observed_max[variable].max(*value);
            }
        }
        debug!("rebuilt feature space from {} points", points.len());

        Self {
            coordinate_system,
            points,
            variable_names,
            observed_min,
            observed_max,
        }
    }

    /// Number of points in the feature space
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check for an empty feature space
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of spatial dimensions
    pub fn spatial_rank(&self) -> usize {
        self.coordinate_system.rank()
    }

    /// Number of feature variables
    pub fn n_variables(&self) -> usize {
        self.variable_names.len()
    }

    /// Total length of every point's `values` vector
    pub fn value_rank(&self) -> usize {
        self.spatial_rank() + self.n_variables()
    }

    /// Names of the feature variables
    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    /// Index of a feature variable by name
    pub fn variable_index(&self, name: &str) -> Result<usize> {
        self.variable_names
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Smallest accepted value of a variable
    pub fn observed_min(&self, variable: usize) -> f64 {
        self.observed_min[variable]
    }

    /// Largest accepted value of a variable
    pub fn observed_max(&self, variable: usize) -> f64 {
        self.observed_max[variable]
    }

    /// Clear all cluster back-references
    pub fn reset_clustering(&mut self) {
        for point in &mut self.points {
            point.cluster = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ArrayStore, Variable};

    fn store() -> ArrayStore {
        let cs = CoordinateSystem::new(
            vec!["x".to_string(), "y".to_string()],
            vec![vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]],
        )
        .unwrap();
        ArrayStore::new(
            cs,
            vec![Variable {
                name: "rain".to_string(),
                valid_min: 0.0,
                valid_max: 100.0,
                fill_value: -9999.0,
                data: vec![1.0, 2.0, 3.0, 4.0, -9999.0, 6.0, 7.0, 8.0, 9.0],
            }],
        )
        .unwrap()
    }

    #[test]
    fn fill_cells_are_excluded() {
        let store = store();
        let fs = FeatureSpace::from_store(
            store.coordinate_system().clone(),
            &store,
            &Thresholds::default(),
        )
        .unwrap();

        assert_eq!(fs.len(), 8);
        assert!(fs.points.iter().all(|p| p.gridpoint != vec![1, 1]));
        assert_eq!(fs.observed_min(0), 1.0);
        assert_eq!(fs.observed_max(0), 9.0);
    }

    #[test]
    fn thresholds_cut_both_ends() {
        let store = store();
        let thresholds = Thresholds {
            lower: HashMap::from([(0, 3.0)]),
            upper: HashMap::from([(0, 8.0)]),
        };
        let fs = FeatureSpace::from_store(
            store.coordinate_system().clone(),
            &store,
            &thresholds,
        )
        .unwrap();

        assert_eq!(fs.len(), 5);
        assert!(fs.points.iter().all(|p| (3.0..=8.0).contains(&p.value(0))));
    }

    #[test]
    fn values_are_coordinates_then_features() {
        let store = store();
        let fs = FeatureSpace::from_store(
            store.coordinate_system().clone(),
            &store,
            &Thresholds::default(),
        )
        .unwrap();

        let point = &fs.points[0];
        assert_eq!(point.values.len(), fs.value_rank());
        assert_eq!(&point.values[..2], point.coordinate.as_slice());
        assert_eq!(point.value(0), point.values[2]);
    }
}
