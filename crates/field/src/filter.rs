//! Module for the scale-space pre-filter

// crate modules
use crate::coordinate::CoordinateSystem;
use crate::error::{Error, Result};
use crate::store::ArrayStore;

// external crates
use log::{debug, info};

/// Separable Gaussian smoothing of each variable over the spatial grid
///
/// Applied before feature-space construction to move the detection to a
/// coarser scale. Each variable has its own σ, given in grid-cell units,
/// and smoothing is skipped entirely for σ ≤ 0.
///
/// The filtered per-variable minima and maxima are recorded during
/// application so that weight functions can normalise against the smoothed
/// field rather than the raw one.
///
/// ```rust, no_run
/// # use wxtools_field::{read_grid_file, ScaleSpaceFilter};
/// let store = read_grid_file("scan.json").unwrap();
///
/// let mut filter = ScaleSpaceFilter::new(vec![2.0]);
/// let smoothed = filter.apply(&store).unwrap();
/// let limits = (filter.filtered_min(0), filter.filtered_max(0));
/// ```
#[derive(Debug, Clone)]
pub struct ScaleSpaceFilter {
    sigma: Vec<f64>,
    filtered_min: Vec<f64>,
    filtered_max: Vec<f64>,
}

impl ScaleSpaceFilter {
    /// Initialise a filter with one σ per variable
    pub fn new(sigma: Vec<f64>) -> Self {
        Self {
            sigma,
            filtered_min: Vec::new(),
            filtered_max: Vec::new(),
        }
    }

    /// Smooth every variable of the store, recording filtered limits
    ///
    /// Missing cells contribute nothing to their neighbours and stay
    /// missing in the output; tap weights are renormalised over the cells
    /// that are actually present.
    pub fn apply(&mut self, store: &ArrayStore) -> Result<ArrayStore> {
        if self.sigma.len() != store.variables().len() {
            return Err(Error::InvalidParameter(format!(
                "expected {} scale-space sigmas, found {}",
                store.variables().len(),
                self.sigma.len()
            )));
        }

        let cs = store.coordinate_system().clone();
        let mut result = store.clone();
        self.filtered_min = vec![f64::INFINITY; self.sigma.len()];
        self.filtered_max = vec![f64::NEG_INFINITY; self.sigma.len()];

        for variable in 0..self.sigma.len() {
            let sigma = self.sigma[variable];
            let fill = result.variables()[variable].fill_value;

            if sigma > 0.0 {
                let taps = gaussian_taps(sigma);
                debug!(
                    "smoothing variable {variable} with sigma {sigma} ({} taps per axis)",
                    taps.len()
                );

                let mut data = result.variables()[variable].data.clone();
                for dimension in 0..cs.rank() {
                    data = smooth_dimension(&cs, &data, fill, dimension, &taps);
                }
                result.replace_data(variable, data)?;
            }

            for &value in &result.variables()[variable].data {
                if value != fill {
                    self.filtered_min[variable] = self.filtered_min[variable].min(value);
                    self.filtered_max[variable] = self.filtered_max[variable].max(value);
                }
            }

            info!(
                "variable {variable} limits after filtering: [{}, {}]",
                self.filtered_min[variable], self.filtered_max[variable]
            );
        }

        Ok(result)
    }

    /// Smallest filtered value of a variable
    pub fn filtered_min(&self, variable: usize) -> f64 {
        self.filtered_min[variable]
    }

    /// Largest filtered value of a variable
    pub fn filtered_max(&self, variable: usize) -> f64 {
        self.filtered_max[variable]
    }
}

/// Discrete Gaussian taps truncated at 3σ
fn gaussian_taps(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as isize;
    (-radius..=radius)
        .map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
        .collect()
}

/// One pass of the separable convolution along a single dimension
fn smooth_dimension(
    cs: &CoordinateSystem,
    data: &[f64],
    fill: f64,
    dimension: usize,
    taps: &[f64],
) -> Vec<f64> {
    let shape = cs.shape();
    let radius = (taps.len() / 2) as isize;
    let mut out = vec![fill; data.len()];

    for offset in 0..data.len() {
        if data[offset] == fill {
            continue;
        }

        let gridpoint = cs.gridpoint_at(offset);
        let mut sum = 0.0;
        let mut weight_sum = 0.0;

        for (t, weight) in taps.iter().enumerate() {
            let i = gridpoint[dimension] as isize + t as isize - radius;
            if i < 0 || i >= shape[dimension] as isize {
                continue;
            }
            let mut neighbour = gridpoint.clone();
            neighbour[dimension] = i as usize;
            let value = data[cs.offset(&neighbour)];
            if value == fill {
                continue;
            }
            sum += weight * value;
            weight_sum += weight;
        }

        // the centre tap always contributes, so the sum is never zero
        out[offset] = sum / weight_sum;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Variable;

    fn spike_store() -> ArrayStore {
        let cs = CoordinateSystem::new(
            vec!["x".to_string()],
            vec![(0..9).map(f64::from).collect()],
        )
        .unwrap();
        let mut data = vec![0.0; 9];
        data[4] = 10.0;
        ArrayStore::new(
            cs,
            vec![Variable {
                name: "rain".to_string(),
                valid_min: 0.0,
                valid_max: 100.0,
                fill_value: -9999.0,
                data,
            }],
        )
        .unwrap()
    }

    #[test]
    fn sigma_zero_is_a_passthrough() {
        let store = spike_store();
        let mut filter = ScaleSpaceFilter::new(vec![0.0]);
        let result = filter.apply(&store).unwrap();

        assert_eq!(result, store);
        assert_eq!(filter.filtered_min(0), 0.0);
        assert_eq!(filter.filtered_max(0), 10.0);
    }

    #[test]
    fn spike_is_spread_and_limits_recorded() {
        let store = spike_store();
        let mut filter = ScaleSpaceFilter::new(vec![1.0]);
        let result = filter.apply(&store).unwrap();

        let data = &result.variables()[0].data;
        assert!(data[4] < 10.0);
        assert!(data[3] > 0.0 && data[5] > 0.0);
        assert_eq!(data[3], data[5]);
        assert_eq!(filter.filtered_max(0), data[4]);
    }

    #[test]
    fn fill_cells_stay_missing() {
        let cs = CoordinateSystem::new(
            vec!["x".to_string()],
            vec![vec![0.0, 1.0, 2.0, 3.0, 4.0]],
        )
        .unwrap();
        let store = ArrayStore::new(
            cs,
            vec![Variable {
                name: "rain".to_string(),
                valid_min: 0.0,
                valid_max: 100.0,
                fill_value: -1.0,
                data: vec![4.0, -1.0, 4.0, 4.0, 4.0],
            }],
        )
        .unwrap();

        let mut filter = ScaleSpaceFilter::new(vec![1.0]);
        let result = filter.apply(&store).unwrap();
        let data = &result.variables()[0].data;

        assert_eq!(data[1], -1.0);
        // a uniform field smooths to itself wherever the taps renormalise
        assert!((data[3] - 4.0).abs() < 1e-12);
    }
}
