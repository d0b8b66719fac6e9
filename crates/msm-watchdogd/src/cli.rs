//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/msm-watchdog.json";

#[derive(Debug, Parser)]
#[command(name = "msm-watchdogd")]
#[command(about = "Arm the MSM hardware watchdog and keep it petted until shutdown")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the `enabled` setting
    #[arg(long, value_name = "BOOL")]
    pub enable: Option<bool>,

    /// Write the download-mode markers before arming
    #[arg(long)]
    pub debug_mode: bool,

    /// Physical memory device to map registers from
    #[arg(long, value_name = "PATH", default_value = "/dev/mem")]
    pub dev_mem: PathBuf,

    /// Override the timer block base address (hex with 0x prefix, or decimal)
    #[arg(long, value_name = "ADDR", value_parser = parse_address)]
    pub timer_base: Option<u64>,

    /// Record register writes instead of touching hardware
    #[arg(long)]
    pub dry_run: bool,

    /// Exit cleanly instead of failing when the watchdog cannot be armed
    #[arg(long)]
    pub continue_unprotected: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Config file to load and whether it was named explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }

    /// Log filter directive for the verbosity count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn parse_address(value: &str) -> Result<u64, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid address `{value}`: {err}"))
}
