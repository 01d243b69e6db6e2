//! Command-line argument parsing.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::analyser::DEFAULT_FFT_SIZE;
use crate::buffer::WrapPolicy;
use crate::sampler::{DEFAULT_CAPACITY, DEFAULT_PERIOD_MS};
use crate::types::Threshold;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChartStyle {
    #[default]
    Bar,
    Line,
}

impl ChartStyle {
    pub fn toggled(self) -> ChartStyle {
        match self {
            ChartStyle::Bar => ChartStyle::Line,
            ChartStyle::Line => ChartStyle::Bar,
        }
    }
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "levelwatch")]
#[command(about = "Microphone sound level meter with a live terminal chart", long_about = None)]
pub struct Args {
    /// Level above which the chart turns red
    #[arg(long, value_name = "LEVEL", default_value_t = 20.0)]
    pub threshold: f64,

    /// Sampling period in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_PERIOD_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub period_ms: u64,

    /// Number of samples kept on the chart
    #[arg(long, value_name = "SAMPLES", default_value_t = DEFAULT_CAPACITY, value_parser = parse_capacity)]
    pub capacity: usize,

    /// Analysis window in samples (power of two, 32..=32768)
    #[arg(long, value_name = "SAMPLES", default_value_t = DEFAULT_FFT_SIZE, value_parser = parse_fft_size)]
    pub fft_size: usize,

    /// Upper bound of the level axis
    #[arg(long, value_name = "LEVEL", default_value_t = 60.0)]
    pub y_max: f64,

    /// Chart style
    #[arg(long, value_enum, default_value_t = ChartStyle::Bar)]
    pub style: ChartStyle,

    /// Hide the horizontal threshold line
    #[arg(long)]
    pub no_threshold_line: bool,

    /// Store wrap-boundary samples in slot 0 instead of the last slot
    #[arg(long)]
    pub single_wrap_write: bool,

    /// Input device (substring of its name); default input when omitted
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Start capturing immediately
    #[arg(long)]
    pub autostart: bool,

    /// Print the available input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Write logs to this file (stderr logging is off while the UI runs)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            anyhow::bail!("--threshold must be a non-negative number");
        }
        if !self.y_max.is_finite() || self.y_max <= 0.0 {
            anyhow::bail!("--y-max must be a positive number");
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn wrap_policy(&self) -> WrapPolicy {
        if self.single_wrap_write {
            WrapPolicy::SingleWrite
        } else {
            WrapPolicy::MarkWrap
        }
    }

    pub fn initial_threshold(&self) -> Threshold {
        Threshold::new(self.threshold)
    }

    /// Filter used when `RUST_LOG` is unset. stderr shares the tty with the
    /// TUI, so logging stays off unless a log file is given or no TUI runs.
    pub fn default_log_filter(&self) -> &'static str {
        if self.log_file.is_some() || self.list_devices {
            "warn"
        } else {
            "off"
        }
    }
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{}", e))?;
    if n < 2 {
        return Err("capacity must be at least 2".to_string());
    }
    Ok(n)
}

fn parse_fft_size(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{}", e))?;
    if !n.is_power_of_two() || !(32..=32768).contains(&n) {
        return Err("fft size must be a power of two between 32 and 32768".to_string());
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_meter() {
        let args = Args::parse_from(["levelwatch"]);
        assert_eq!(args.threshold, 20.0);
        assert_eq!(args.period(), Duration::from_millis(250));
        assert_eq!(args.capacity, 240);
        assert_eq!(args.fft_size, 1024);
        assert_eq!(args.y_max, 60.0);
        assert_eq!(args.style, ChartStyle::Bar);
        assert_eq!(args.wrap_policy(), WrapPolicy::MarkWrap);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn line_style_and_wrap_flag() {
        let args = Args::parse_from([
            "levelwatch",
            "--style",
            "line",
            "--single-wrap-write",
            "--threshold",
            "25",
        ]);
        assert_eq!(args.style, ChartStyle::Line);
        assert_eq!(args.wrap_policy(), WrapPolicy::SingleWrite);
        assert_eq!(args.initial_threshold().value(), 25.0);
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(Args::try_parse_from(["levelwatch", "--capacity", "1"]).is_err());
        assert!(Args::try_parse_from(["levelwatch", "--fft-size", "1000"]).is_err());
        assert!(Args::try_parse_from(["levelwatch", "--fft-size", "16"]).is_err());
        assert!(Args::try_parse_from(["levelwatch", "--period-ms", "0"]).is_err());
    }

    #[test]
    fn validate_rejects_negative_threshold() {
        let args = Args::parse_from(["levelwatch", "--threshold=-3"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn logging_is_off_without_a_log_file() {
        let args = Args::parse_from(["levelwatch"]);
        assert_eq!(args.default_log_filter(), "off");

        let args = Args::parse_from(["levelwatch", "--log-file", "levelwatch.log"]);
        assert_eq!(args.default_log_filter(), "warn");

        let args = Args::parse_from(["levelwatch", "--list-devices"]);
        assert_eq!(args.default_log_filter(), "warn");
    }

    #[test]
    fn style_toggles() {
        assert_eq!(ChartStyle::Bar.toggled(), ChartStyle::Line);
        assert_eq!(ChartStyle::Line.toggled(), ChartStyle::Bar);
    }
}
