use super::track::TrackingOpts;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, ValueHint};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use wxtools_cluster::{read_cluster_file, write_cluster_file};
use wxtools_detect::{
    BoundaryAnalysisParams, CancelToken, Detection, DetectionParams, Kernel, WeightSpec,
};
use wxtools_field::{read_grid_file, DataStore};
use wxtools_track::Tracking;
use wxtools_utils::OptionExt;

/// Detect clusters in a gridded input file.
#[derive(Parser)]
pub struct Opts {
    /// Path to the gridded input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
    /// Path the cluster file is written to.
    #[arg(long, short, value_hint = ValueHint::FilePath)]
    output: PathBuf,
    /// Feature variables to cluster on; defaults to all in the input.
    #[arg(long, short = 'V', value_delimiter = ',')]
    variables: Vec<String>,
    /// Bandwidth per feature-space dimension, spatial dimensions first.
    #[arg(long, short, required = true, value_delimiter = ',')]
    bandwidth: Vec<f64>,
    /// Kernel: gaussian, gaussian-normal, epanechnikov, or uniform.
    #[arg(default_value = "gaussian", long, short)]
    kernel: Kernel,
    /// Weight function: none, inverse-distance, or composite.
    #[arg(default_value = "none", long, short)]
    weight: String,
    /// Spatial centre for the inverse-distance weight.
    #[arg(long, value_delimiter = ',')]
    center: Vec<f64>,
    /// Per-variable multipliers for the composite weight; defaults to 1.
    #[arg(long, value_delimiter = ',')]
    multipliers: Vec<f64>,
    /// Convolve the composite weight with the kernel over the bandwidth.
    #[arg(long)]
    smooth_weights: bool,
    /// Discard clusters with fewer points than this.
    #[arg(default_value_t = 10, long, short = 's')]
    min_size: usize,
    /// Per-variable scale-space sigma in grid cells; 0 skips a variable.
    #[arg(long, value_delimiter = ',')]
    scale: Vec<f64>,
    /// Lower acceptance threshold per variable, as name=value.
    #[arg(long, value_parser = parse_threshold)]
    lower_threshold: Vec<(String, f64)>,
    /// Upper acceptance threshold per variable, as name=value.
    #[arg(long, value_parser = parse_threshold)]
    upper_threshold: Vec<(String, f64)>,
    /// Merge neighbouring clusters by boundary analysis on this variable.
    #[arg(long, value_name = "VARIABLE")]
    boundary_analysis: Option<String>,
    /// Relative variability below which a boundary reads as smooth.
    #[arg(default_value_t = 0.1, long)]
    cv_threshold: f64,
    /// Dynamic-range factor above which a boundary carries signal.
    #[arg(default_value_t = 0.3, long)]
    drf_threshold: f64,
    /// Coalesce undersized clusters into the strongest neighbour by this
    /// variable.
    #[arg(long, value_name = "VARIABLE")]
    coalesce: Option<String>,
    /// Use the whitening index variant.
    #[arg(long)]
    whitening: bool,
    /// Do not print the progress bar.
    #[arg(long)]
    no_progress: bool,
    /// Track against this previous cluster file after detection.
    #[arg(long, value_name = "CLUSTER_FILE", value_hint = ValueHint::FilePath)]
    tracking: Option<PathBuf>,
    /// Variable the inline tracking correlates on; defaults to the first.
    #[arg(long, value_name = "VARIABLE")]
    tracking_variable: Option<String>,
    #[command(flatten)]
    tracking_opts: TrackingOpts,
}

impl Opts {
    pub fn run(&self) -> Result<ExitCode> {
        let store = read_grid_file(&self.input)
            .with_context(|| format!("failed to read {}", self.input.display()))?;

        let n_variables = if self.variables.is_empty() {
            store.variable_names().len()
        } else {
            self.variables.len()
        };

        let weight = match self.weight.as_str() {
            "none" => WeightSpec::None,
            "inverse-distance" => {
                ensure!(
                    !self.center.is_empty(),
                    "the inverse-distance weight needs --center"
                );
                WeightSpec::InverseDistance {
                    center: self.center.clone(),
                }
            }
            "composite" => WeightSpec::Composite {
                multipliers: if self.multipliers.is_empty() {
                    vec![1.0; n_variables]
                } else {
                    self.multipliers.clone()
                },
                smoothed: self.smooth_weights,
            },
            other => bail!("unknown weight function \"{other}\""),
        };

        let params = DetectionParams {
            variables: self.variables.clone(),
            bandwidth: self.bandwidth.clone(),
            kernel: self.kernel,
            weight,
            min_cluster_size: self.min_size,
            scale: (!self.scale.is_empty()).then(|| self.scale.clone()),
            lower_thresholds: self.lower_threshold.iter().cloned().collect::<HashMap<_, _>>(),
            upper_thresholds: self.upper_threshold.iter().cloned().collect::<HashMap<_, _>>(),
            boundary_analysis: self.boundary_analysis.clone().map(|variable| {
                BoundaryAnalysisParams {
                    variable,
                    cv_threshold: self.cv_threshold,
                    drf_threshold: self.drf_threshold,
                }
            }),
            coalescence: self.coalesce.clone(),
            whitening: self.whitening,
            epsilon: None,
            max_iterations: 100,
            show_progress: !self.no_progress,
            source_file: self.input.display().to_string(),
        };

        info!(
            "kernel: {}, weight function: {}, whitening: {}",
            self.kernel, self.weight, self.whitening
        );
        info!(
            "boundary analysis: {}, coalescence: {}",
            self.boundary_analysis.display(),
            self.coalesce.display()
        );

        let output = Detection::run(&store, &params, &CancelToken::new())
            .context("detection failed")?;
        let fs = output.feature_space;
        let mut list = output.cluster_list;

        if let Some(previous_path) = &self.tracking {
            let previous = read_cluster_file(previous_path)
                .with_context(|| format!("failed to read {}", previous_path.display()))?;
            let mut previous_list = previous.cluster_list;

            let name = match &self.tracking_variable {
                Some(name) => name.clone(),
                None => list.feature_variables[0].clone(),
            };
            let variable = fs.variable_index(&name)?;
            let store_variable = store.variable_index(&name)?;

            let tracking = Tracking::new(self.tracking_opts.to_params())?;
            tracking.track(
                &mut previous_list,
                &previous.feature_space.points,
                &mut list,
                &fs.points,
                fs.spatial_rank(),
                variable,
                store.valid_min(store_variable),
                store.valid_max(store_variable),
            )?;
        }

        let run_parameters = std::env::args().skip(1).collect::<Vec<String>>().join(" ");
        write_cluster_file(&self.output, &list, &fs, &run_parameters)
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        info!("wrote {} clusters to {}", list.len(), self.output.display());

        print!("{}", list.summary(&run_parameters));
        Ok(ExitCode::SUCCESS)
    }
}

/// Parse a "name=value" threshold argument
fn parse_threshold(s: &str) -> core::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, found \"{s}\""))?;
    let value = value
        .parse()
        .map_err(|_| format!("\"{value}\" is not a number"))?;
    Ok((name.to_string(), value))
}
