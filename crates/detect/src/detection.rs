//! The detection pipeline driver

// crate modules
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::meanshift::apply_meanshift;
use crate::weights::{WeightFunction, WeightGrid};

// wxtools modules
use wxtools_cluster::ClusterList;
use wxtools_field::{ArrayStore, DataStore, FeatureSpace, ScaleSpaceFilter, Thresholds};
use wxtools_index::FeatureSpaceIndex;

// external crates
use log::info;

// standard library
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation handle, checked between pipeline stages
///
/// Cancellation is coarse-grained: in-flight parallel work finishes its
/// current point, then the pipeline aborts with [Error::Cancelled] at the
/// next stage boundary. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Selects the weight function applied during mean-shift
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WeightSpec {
    /// Unweighted samples
    #[default]
    None,
    /// Saliency decays with distance from a centre of interest
    InverseDistance {
        /// Spatial centre the saliency decays from
        center: Vec<f64>,
    },
    /// An externally precomputed saliency field
    Lookup(WeightGrid),
    /// Multiplier-weighted sum of normalised variables
    Composite {
        /// One fixed multiplier per feature variable
        multipliers: Vec<f64>,
        /// Convolve the raw saliency with the run kernel over the spatial
        /// bandwidth
        smoothed: bool,
    },
}

/// Configuration of the optional boundary-analysis merge pass
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryAnalysisParams {
    /// Variable analysed across cluster boundaries
    pub variable: String,
    /// Merge only below this relative variability (smooth crossing)
    pub cv_threshold: f64,
    /// Merge only above this dynamic-range factor (signal present)
    pub drf_threshold: f64,
}

/// Everything a detection run needs to know
#[derive(Debug, Clone)]
pub struct DetectionParams {
    /// Feature variables to lift into the feature space; empty means all
    pub variables: Vec<String>,
    /// Search bandwidth per feature-space dimension (spatial ⊕ variables)
    pub bandwidth: Vec<f64>,
    /// Kernel weighing samples in the mean-shift sums
    pub kernel: Kernel,
    /// Weight function applied to each sample
    pub weight: WeightSpec,
    /// Clusters below this size are dropped (and feed coalescence)
    pub min_cluster_size: usize,
    /// Per-variable scale-space σ in grid cells; `None` skips filtering
    pub scale: Option<Vec<f64>>,
    /// Per-variable lower acceptance thresholds, by name
    pub lower_thresholds: HashMap<String, f64>,
    /// Per-variable upper acceptance thresholds, by name
    pub upper_thresholds: HashMap<String, f64>,
    /// Optional boundary-analysis merge pass
    pub boundary_analysis: Option<BoundaryAnalysisParams>,
    /// Optional coalescence pass, naming the strength variable
    pub coalescence: Option<String>,
    /// Use the whitening index variant
    pub whitening: bool,
    /// Convergence threshold; default is a tenth of the smallest bandwidth
    pub epsilon: Option<f64>,
    /// Iteration cap per point
    pub max_iterations: usize,
    /// Show the mean-shift progress bar
    pub show_progress: bool,
    /// Provenance recorded on the resulting cluster list
    pub source_file: String,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            bandwidth: Vec::new(),
            kernel: Kernel::default(),
            weight: WeightSpec::default(),
            min_cluster_size: 1,
            scale: None,
            lower_thresholds: HashMap::new(),
            upper_thresholds: HashMap::new(),
            boundary_analysis: None,
            coalescence: None,
            whitening: false,
            epsilon: None,
            max_iterations: 100,
            show_progress: true,
            source_file: String::new(),
        }
    }
}

/// A finished detection run: the cluster list plus its point arena
#[derive(Debug)]
pub struct DetectionOutput {
    /// The arena the cluster list indexes into
    pub feature_space: FeatureSpace,
    /// The detected clusters
    pub cluster_list: ClusterList,
}

/// Encapsulates all steps of a complete detection run
///
/// ```rust, no_run
/// # use wxtools_detect::{CancelToken, Detection, DetectionParams};
/// # use wxtools_field::read_grid_file;
/// let store = read_grid_file("scan.json").unwrap();
/// let params = DetectionParams {
///     variables: vec!["reflectivity".to_string()],
///     bandwidth: vec![4.0, 4.0, 10.0],
///     min_cluster_size: 10,
///     ..Default::default()
/// };
///
/// let output = Detection::run(&store, &params, &CancelToken::new()).unwrap();
/// println!("{} clusters", output.cluster_list.len());
/// ```
#[derive(Debug)]
pub struct Detection;

impl Detection {
    /// Run the full pipeline over a data store
    ///
    /// Stages in order: scale-space filter, feature-space construction,
    /// weight precomputation, index build, mean-shift, graph aggregation,
    /// post-processing. The cancellation token is checked between stages.
    pub fn run(
        store: &ArrayStore,
        params: &DetectionParams,
        cancel: &CancelToken,
    ) -> Result<DetectionOutput> {
        cancel.checkpoint()?;

        let variables = if params.variables.is_empty() {
            store.variable_names().to_vec()
        } else {
            params.variables.clone()
        };
        let store = store.select(&variables)?;
        let rank = store.coordinate_system().rank();
        validate(params, rank, variables.len())?;

        // scale-space filtering, keeping the limits for normalisation
        let (store, limits_min, limits_max) = match &params.scale {
            Some(sigma) => {
                let mut filter = ScaleSpaceFilter::new(sigma.clone());
                let filtered = filter.apply(&store)?;
                let min: Vec<f64> = (0..variables.len()).map(|v| filter.filtered_min(v)).collect();
                let max: Vec<f64> = (0..variables.len()).map(|v| filter.filtered_max(v)).collect();
                (filtered, min, max)
            }
            None => {
                let min: Vec<f64> = (0..variables.len()).map(|v| store.valid_min(v)).collect();
                let max: Vec<f64> = (0..variables.len()).map(|v| store.valid_max(v)).collect();
                (store, min, max)
            }
        };
        cancel.checkpoint()?;

        let mut thresholds = Thresholds::default();
        for (name, value) in &params.lower_thresholds {
            thresholds.lower.insert(store.variable_index(name)?, *value);
        }
        for (name, value) in &params.upper_thresholds {
            thresholds.upper.insert(store.variable_index(name)?, *value);
        }

        let mut fs =
            FeatureSpace::from_store(store.coordinate_system().clone(), &store, &thresholds)?;
        if fs.is_empty() {
            info!("no cells passed the thresholds, returning an empty list");
            return Ok(DetectionOutput {
                feature_space: fs,
                cluster_list: ClusterList::new(params.source_file.clone(), variables),
            });
        }
        cancel.checkpoint()?;

        let weight = build_weight(params, &fs, rank, &limits_min, &limits_max);
        if let Some(weight) = &weight {
            if !weight.is_finite() {
                return Err(Error::NumericInstability(
                    "weight function precomputation".to_string(),
                ));
            }
        }
        cancel.checkpoint()?;

        let columns: Vec<usize> = (0..fs.value_rank()).collect();
        let index = FeatureSpaceIndex::build(
            &fs.points,
            &columns,
            params.whitening.then_some(params.bandwidth.as_slice()),
        );
        cancel.checkpoint()?;

        apply_meanshift(
            &mut fs,
            &index,
            params.kernel,
            weight.as_ref(),
            &params.bandwidth,
            params.epsilon,
            params.max_iterations,
            params.show_progress,
        );
        cancel.checkpoint()?;

        let resolution = fs.coordinate_system.resolution();
        let mut list = ClusterList::aggregate(&mut fs, &resolution, &params.source_file);
        cancel.checkpoint()?;

        if let Some(analysis) = &params.boundary_analysis {
            let variable = fs.variable_index(&analysis.variable)?;
            list.aggregate_by_boundary_analysis(
                &mut fs,
                variable,
                analysis.cv_threshold,
                analysis.drf_threshold,
            );
        }
        if let Some(name) = &params.coalescence {
            let variable = fs.variable_index(name)?;
            list.coalesce_with_strongest_neighbour(&mut fs, variable, params.min_cluster_size);
        }
        list.apply_size_threshold(&mut fs, params.min_cluster_size);

        Ok(DetectionOutput {
            feature_space: fs,
            cluster_list: list,
        })
    }
}

fn validate(params: &DetectionParams, rank: usize, n_variables: usize) -> Result<()> {
    let expected = rank + n_variables;
    if params.bandwidth.len() != expected {
        return Err(Error::InvalidParameter(format!(
            "expected {expected} bandwidth components (spatial rank {rank} + {n_variables} variables), found {}",
            params.bandwidth.len()
        )));
    }
    if params.bandwidth.iter().any(|h| *h <= 0.0) {
        return Err(Error::InvalidParameter(
            "bandwidth components must be positive".to_string(),
        ));
    }
    if let Some(epsilon) = params.epsilon {
        if epsilon <= 0.0 {
            return Err(Error::InvalidParameter(
                "epsilon must be positive".to_string(),
            ));
        }
    }
    if let WeightSpec::Composite { multipliers, .. } = &params.weight {
        if multipliers.len() != n_variables {
            return Err(Error::InvalidParameter(format!(
                "expected {n_variables} composite multipliers, found {}",
                multipliers.len()
            )));
        }
    }
    if let WeightSpec::InverseDistance { center } = &params.weight {
        if center.len() != rank {
            return Err(Error::InvalidParameter(format!(
                "expected a rank-{rank} centre for the inverse-distance weight, found {}",
                center.len()
            )));
        }
    }
    if let Some(sigma) = &params.scale {
        if sigma.len() != n_variables {
            return Err(Error::InvalidParameter(format!(
                "expected {n_variables} scale-space sigmas, found {}",
                sigma.len()
            )));
        }
    }
    Ok(())
}

fn build_weight(
    params: &DetectionParams,
    fs: &FeatureSpace,
    rank: usize,
    limits_min: &[f64],
    limits_max: &[f64],
) -> Option<WeightFunction> {
    match &params.weight {
        WeightSpec::None => None,
        WeightSpec::InverseDistance { center } => {
            Some(WeightFunction::inverse_distance(fs, center))
        }
        WeightSpec::Lookup(grid) => Some(WeightFunction::lookup(grid.clone())),
        WeightSpec::Composite {
            multipliers,
            smoothed,
        } => {
            let smoothing = smoothed.then(|| (params.kernel, &params.bandwidth[..rank]));
            Some(WeightFunction::composite(
                fs,
                multipliers,
                limits_min,
                limits_max,
                smoothing,
            ))
        }
    }
}
