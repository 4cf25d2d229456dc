//! Module for the feature-space point

/// One grid cell accepted into the feature space
///
/// `values` always holds the spatial coordinate components followed by the
/// feature variable values, so its length is the spatial rank plus the
/// number of variables. The `shift` vector stays zero until the mean-shift
/// engine writes the total displacement from the point to its terminal
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Integer gridpoint indexing the source grid
    pub gridpoint: Vec<usize>,
    /// Real-valued spatial position
    pub coordinate: Vec<f64>,
    /// Coordinate components followed by feature values
    pub values: Vec<f64>,
    /// Total mean-shift displacement, spatial components only
    pub shift: Vec<f64>,
    /// Cleared by the mean-shift engine on a degenerate denominator or a
    /// non-finite intermediate; such points never join a cluster
    pub converged: bool,
    /// Index of the owning cluster in the cluster list, if any
    pub cluster: Option<usize>,
}

impl Point {
    /// Initialise a point with a zero shift and no cluster
    pub fn new(gridpoint: Vec<usize>, coordinate: Vec<f64>, values: Vec<f64>) -> Self {
        let shift = vec![0.0; coordinate.len()];
        Self {
            gridpoint,
            coordinate,
            values,
            shift,
            converged: true,
            cluster: None,
        }
    }

    /// The feature components of `values`, skipping the coordinates
    pub fn feature_values(&self) -> &[f64] {
        &self.values[self.coordinate.len()..]
    }

    /// Value of one feature variable at this point
    ///
    /// ```rust
    /// # use wxtools_field::Point;
    /// let p = Point::new(vec![0, 1], vec![0.0, 10.0], vec![0.0, 10.0, 42.5]);
    /// assert_eq!(p.value(0), 42.5);
    /// ```
    pub fn value(&self, variable: usize) -> f64 {
        self.values[self.coordinate.len() + variable]
    }
}
