use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, ValueHint};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use wxtools_cluster::{read_cluster_file, write_cluster_file};
use wxtools_track::{Tracking, TrackingParams};

/// Tracking parameters shared with the inline mode of `detect`
#[derive(Args)]
pub struct TrackingOpts {
    /// Weight of the displacement term.
    #[arg(default_value_t = 1.0 / 3.0, long)]
    pub dist_weight: f64,
    /// Weight of the histogram size term.
    #[arg(default_value_t = 1.0 / 3.0, long)]
    pub size_weight: f64,
    /// Weight of the rank-correlation term.
    #[arg(default_value_t = 1.0 / 3.0, long)]
    pub corr_weight: f64,
    /// Time between the two frames in seconds.
    #[arg(default_value_t = 300.0, long)]
    pub delta_t: f64,
    /// Largest time delta tracking is attempted over, in seconds.
    #[arg(default_value_t = 930.0, long)]
    pub max_delta_t: f64,
    /// Physical maximum object speed in coordinate units per second.
    #[arg(default_value_t = 27.0, long)]
    pub max_velocity: f64,
    /// Coverage above which merge/split candidates qualify.
    #[arg(default_value_t = 0.33, long)]
    pub merge_threshold: f64,
    /// Also accept pairings within the running mean-velocity bound.
    #[arg(long)]
    pub mean_velocity_constraint: bool,
    /// Allowed deviation factor from the running mean velocity.
    #[arg(default_value_t = 0.5, long)]
    pub mean_velocity_security: f64,
    /// Bin count of the correlation histograms.
    #[arg(default_value_t = 25, long)]
    pub histogram_bins: usize,
}

impl TrackingOpts {
    pub fn to_params(&self) -> TrackingParams {
        TrackingParams {
            dist_weight: self.dist_weight,
            size_weight: self.size_weight,
            corr_weight: self.corr_weight,
            delta_t: self.delta_t,
            max_delta_t: self.max_delta_t,
            max_velocity: self.max_velocity,
            merge_threshold: self.merge_threshold,
            use_mean_velocity_constraint: self.mean_velocity_constraint,
            mean_velocity_security: self.mean_velocity_security,
            histogram_bins: self.histogram_bins,
        }
    }
}

/// Track clusters across two cluster files.
#[derive(Parser)]
pub struct Opts {
    /// Cluster file of the previous frame.
    #[arg(long, value_hint = ValueHint::FilePath)]
    previous: PathBuf,
    /// Cluster file of the current frame.
    #[arg(long, value_hint = ValueHint::FilePath)]
    current: PathBuf,
    /// Output path; the current cluster file is rewritten by default.
    #[arg(long, short, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
    /// Variable the histogram correlation runs on; defaults to the first.
    #[arg(long, value_name = "VARIABLE")]
    variable: Option<String>,
    #[command(flatten)]
    tracking: TrackingOpts,
}

impl Opts {
    pub fn run(&self) -> Result<ExitCode> {
        let previous = read_cluster_file(&self.previous)
            .with_context(|| format!("failed to read {}", self.previous.display()))?;
        let current = read_cluster_file(&self.current)
            .with_context(|| format!("failed to read {}", self.current.display()))?;

        let mut previous_list = previous.cluster_list;
        let mut current_list = current.cluster_list;
        ensure!(
            !current_list.feature_variables.is_empty(),
            "the current cluster file carries no feature variables"
        );

        let name = match &self.variable {
            Some(name) => name.clone(),
            None => current_list.feature_variables[0].clone(),
        };
        let variable = current.feature_space.variable_index(&name)?;
        let previous_variable = previous.feature_space.variable_index(&name)?;

        // the cluster file carries no valid ranges, so the histograms bin
        // over the observed range of both frames
        let valid_min = previous
            .feature_space
            .observed_min(previous_variable)
            .min(current.feature_space.observed_min(variable));
        let valid_max = previous
            .feature_space
            .observed_max(previous_variable)
            .max(current.feature_space.observed_max(variable));

        let tracking = Tracking::new(self.tracking.to_params())?;
        tracking.track(
            &mut previous_list,
            &previous.feature_space.points,
            &mut current_list,
            &current.feature_space.points,
            current.feature_space.spatial_rank(),
            variable,
            valid_min,
            valid_max,
        )?;

        let output = self.output.as_ref().unwrap_or(&self.current);
        write_cluster_file(
            output,
            &current_list,
            &current.feature_space,
            &current.run_parameters,
        )
        .with_context(|| format!("failed to write {}", output.display()))?;
        info!(
            "tracked {} of {} clusters, {} new, {} dropped",
            current_list.tracked_ids.len(),
            current_list.len(),
            current_list.new_ids.len(),
            current_list.dropped_ids.len()
        );

        print!("{}", current_list.summary(&current.run_parameters));
        Ok(ExitCode::SUCCESS)
    }
}
