//! Data store contract and the in-memory gridded implementation

// crate modules
use crate::coordinate::CoordinateSystem;
use crate::error::{Error, Result};

// external crates
use log::debug;
use serde::Deserialize;

// standard library
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Contract for a fully materialised multi-variable gridded input
///
/// This is the seam to the file readers. The detection pipeline only ever
/// sees this trait, so anything that can deliver a typed gridded array plus
/// metadata can feed it.
pub trait DataStore {
    /// Number of spatial dimensions
    fn rank(&self) -> usize;

    /// Number of gridpoints per dimension
    fn dimensions(&self) -> Vec<usize>;

    /// Names of the feature variables, in variable-index order
    fn variable_names(&self) -> &[String];

    /// Lower bound of the valid range of a variable
    fn valid_min(&self, variable: usize) -> f64;

    /// Upper bound of the valid range of a variable
    fn valid_max(&self, variable: usize) -> f64;

    /// Sentinel marking missing cells of a variable
    fn fill_value(&self, variable: usize) -> f64;

    /// Value of a variable at a gridpoint, `None` for missing cells
    fn read(&self, variable: usize, gridpoint: &[usize]) -> Option<f64>;
}

/// One gridded variable of an [ArrayStore]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Variable {
    /// Variable name, e.g. "reflectivity"
    pub name: String,
    /// Lower bound of the valid range
    pub valid_min: f64,
    /// Upper bound of the valid range
    pub valid_max: f64,
    /// Sentinel for missing cells
    pub fill_value: f64,
    /// Row-major flattened grid data
    pub data: Vec<f64>,
}

/// In-memory [DataStore] over row-major flattened variable arrays
///
/// The concrete store used by the pipeline and the scale-space filter. File
/// readers produce one of these; tests build them directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayStore {
    coordinate_system: CoordinateSystem,
    variables: Vec<Variable>,
    names: Vec<String>,
}

impl ArrayStore {
    /// Initialise a store after validating data lengths against the grid
    pub fn new(coordinate_system: CoordinateSystem, variables: Vec<Variable>) -> Result<Self> {
        let expected = coordinate_system.size();
        for variable in &variables {
            if variable.data.len() != expected {
                return Err(Error::UnexpectedDataLength {
                    name: variable.name.clone(),
                    expected,
                    found: variable.data.len(),
                });
            }
        }
        let names = variables.iter().map(|v| v.name.clone()).collect();
        Ok(Self {
            coordinate_system,
            variables,
            names,
        })
    }

    /// The coordinate system the data are gridded on
    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    /// All variables, in variable-index order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Index of a variable by name
    pub fn variable_index(&self, name: &str) -> Result<usize> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// A store restricted to the named variables, in the given order
    pub fn select(&self, names: &[String]) -> Result<ArrayStore> {
        let variables = names
            .iter()
            .map(|name| {
                self.variable_index(name)
                    .map(|index| self.variables[index].clone())
            })
            .collect::<Result<Vec<Variable>>>()?;
        ArrayStore::new(self.coordinate_system.clone(), variables)
    }

    /// Replace the data of a variable, e.g. with a filtered version
    pub fn replace_data(&mut self, variable: usize, data: Vec<f64>) -> Result<()> {
        let expected = self.coordinate_system.size();
        if data.len() != expected {
            return Err(Error::UnexpectedDataLength {
                name: self.variables[variable].name.clone(),
                expected,
                found: data.len(),
            });
        }
        self.variables[variable].data = data;
        Ok(())
    }

}

impl DataStore for ArrayStore {
    fn rank(&self) -> usize {
        self.coordinate_system.rank()
    }

    fn dimensions(&self) -> Vec<usize> {
        self.coordinate_system.shape()
    }

    fn variable_names(&self) -> &[String] {
        &self.names
    }

    fn valid_min(&self, variable: usize) -> f64 {
        self.variables[variable].valid_min
    }

    fn valid_max(&self, variable: usize) -> f64 {
        self.variables[variable].valid_max
    }

    fn fill_value(&self, variable: usize) -> f64 {
        self.variables[variable].fill_value
    }

    fn read(&self, variable: usize, gridpoint: &[usize]) -> Option<f64> {
        let offset = self.coordinate_system.offset(gridpoint);
        let value = self.variables[variable].data[offset];
        if value == self.variables[variable].fill_value {
            None
        } else {
            Some(value)
        }
    }
}

/// Serde view of the gridded input document
#[derive(Debug, Deserialize)]
struct GridDocument {
    dimensions: Vec<GridAxis>,
    variables: Vec<Variable>,
}

/// One dimension of the gridded input document
#[derive(Debug, Deserialize)]
struct GridAxis {
    name: String,
    values: Vec<f64>,
}

/// Read a gridded input file into an [ArrayStore]
///
/// The file is a JSON document listing the dimension axes and the row-major
/// flattened data per variable:
///
/// ```json
/// {
///   "dimensions": [
///     { "name": "x", "values": [0.0, 1.0, 2.0] },
///     { "name": "y", "values": [0.0, 1.0, 2.0] }
///   ],
///   "variables": [
///     {
///       "name": "reflectivity",
///       "valid_min": 0.0,
///       "valid_max": 75.0,
///       "fill_value": -9999.0,
///       "data": [0.0, 1.5, ...]
///     }
///   ]
/// }
/// ```
pub fn read_grid_file<P: AsRef<Path>>(path: P) -> Result<ArrayStore> {
    debug!("reading grid document {}", path.as_ref().display());
    let reader = BufReader::new(File::open(path)?);
    let document: GridDocument = serde_json::from_reader(reader)?;

    let (names, axes) = document
        .dimensions
        .into_iter()
        .map(|axis| (axis.name, axis.values))
        .unzip();

    let coordinate_system = CoordinateSystem::new(names, axes)?;
    ArrayStore::new(coordinate_system, document.variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ArrayStore {
        let cs = CoordinateSystem::new(
            vec!["x".to_string(), "y".to_string()],
            vec![vec![0.0, 1.0], vec![0.0, 1.0]],
        )
        .unwrap();
        ArrayStore::new(
            cs,
            vec![Variable {
                name: "rain".to_string(),
                valid_min: 0.0,
                valid_max: 100.0,
                fill_value: -1.0,
                data: vec![5.0, -1.0, 2.0, 8.0],
            }],
        )
        .unwrap()
    }

    #[test]
    fn read_returns_none_for_fill() {
        let store = store();
        assert_eq!(store.read(0, &[0, 0]), Some(5.0));
        assert_eq!(store.read(0, &[0, 1]), None);
        assert_eq!(store.read(0, &[1, 1]), Some(8.0));
    }

    #[test]
    fn rejects_short_data() {
        let cs = CoordinateSystem::new(
            vec!["x".to_string()],
            vec![vec![0.0, 1.0, 2.0]],
        )
        .unwrap();
        let result = ArrayStore::new(
            cs,
            vec![Variable {
                name: "rain".to_string(),
                valid_min: 0.0,
                valid_max: 1.0,
                fill_value: -1.0,
                data: vec![0.0],
            }],
        );
        assert!(matches!(
            result,
            Err(Error::UnexpectedDataLength { .. })
        ));
    }
}
