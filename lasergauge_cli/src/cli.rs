//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "lasergauge", version, about = "Laser-line height gauge")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when absent
    #[arg(long, value_name = "FILE", default_value = "etc/lasergauge.toml")]
    pub config: PathBuf,

    /// Emit results and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to
    /// `logging.level` from the config, then `info`
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the acquisition protocol once and report the ridge point
    Detect {
        /// Write the median laser-off/on frames and the ridge mask into DIR
        #[arg(long, value_name = "DIR")]
        save_frames: Option<PathBuf>,
    },
    /// Detect the laser line in a pair of image files (no rig involved)
    DetectFiles {
        /// Image taken with the laser on
        #[arg(long, value_name = "PNG")]
        on: PathBuf,
        /// Image taken with the laser off
        #[arg(long, value_name = "PNG")]
        off: PathBuf,
        /// Write the ridge mask here
        #[arg(long, value_name = "PNG")]
        mask: Option<PathBuf>,
    },
    /// Sweep down from the start pose, fit and persist a calibration model
    Calibrate {
        /// Start pose `x,y,z,rx,ry,rz`; defaults to the rig's current pose
        #[arg(long, value_name = "POSE", value_parser = parse_pose, allow_hyphen_values = true)]
        start: Option<[f64; 6]>,
        /// Also write the accepted samples to a CSV
        #[arg(long, value_name = "FILE")]
        export_csv: Option<PathBuf>,
    },
    /// Refit a model from a samples CSV (height_mm,pixel_delta)
    Fit {
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,
        /// Highest polynomial degree to consider; config value when absent
        #[arg(long)]
        max_degree: Option<usize>,
    },
    /// Measure the height at one XY position (calibration XY when omitted)
    Measure {
        #[arg(long, requires = "y", allow_hyphen_values = true)]
        x: Option<f64>,
        #[arg(long, requires = "x", allow_hyphen_values = true)]
        y: Option<f64>,
    },
    /// Measure a rectangular XY grid, row by row
    Scan {
        /// Grid origin `x,y`
        #[arg(long, value_name = "X,Y", value_parser = parse_xy, allow_hyphen_values = true)]
        origin: (f64, f64),
        /// Spacing between grid points in mm
        #[arg(long, default_value_t = 5.0)]
        pitch: f64,
        #[arg(long, default_value_t = 3)]
        cols: usize,
        #[arg(long, default_value_t = 3)]
        rows: usize,
    },
    /// Print the stored calibration artifact
    Show,
    /// List calibration artifacts in the storage directory
    List,
    /// Quick health check (config, storage, rig)
    SelfCheck,
}

fn parse_floats<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {N} comma-separated numbers, got {}", parts.len()));
    }
    let mut out = [0.0; N];
    for (slot, p) in out.iter_mut().zip(parts) {
        let v: f64 = p.parse().map_err(|_| format!("'{p}' is not a number"))?;
        if !v.is_finite() {
            return Err(format!("'{p}' is not finite"));
        }
        *slot = v;
    }
    Ok(out)
}

pub fn parse_pose(s: &str) -> Result<[f64; 6], String> {
    parse_floats::<6>(s)
}

pub fn parse_xy(s: &str) -> Result<(f64, f64), String> {
    parse_floats::<2>(s).map(|[x, y]| (x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pose_and_xy_parse() {
        assert_eq!(
            parse_pose("1, 2,3,180,0,-90").unwrap(),
            [1.0, 2.0, 3.0, 180.0, 0.0, -90.0]
        );
        assert_eq!(parse_xy("-5,2.5").unwrap(), (-5.0, 2.5));
        assert!(parse_xy("1").is_err());
        assert!(parse_pose("1,2,3,4,5,nan").is_err());
        assert!(parse_xy("a,b").is_err());
    }
}
