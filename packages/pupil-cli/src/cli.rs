use clap::{Args, Parser, Subcommand};
use pupil_rs::PipelineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pupilflat",
    version,
    about = "Build flat pupillometry files from eye-tracking runs",
    long_about = "Decimate per-run pupil recordings, align them to behavioral trials and\n\
                  write one flat CSV per subject and task.\n\
                  Set $PUPIL_DATA_DIR and $PUPIL_BEHAVIORAL_CSV or pass --data-dir / --behavioral."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the flat files of one subject
    Process(ProcessArgs),
    /// List subjects found in the data directory
    Subjects(SubjectsArgs),
    /// List the variables stored in a run file
    Inspect(InspectArgs),
    /// Summarize a subject's behavioral trials
    Behavior(BehaviorArgs),
}

/// Settings shared by every subcommand. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the run files
    #[arg(long, env = "PUPIL_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Behavioral trial table (CSV)
    #[arg(long, env = "PUPIL_BEHAVIORAL_CSV", global = true)]
    pub behavioral: Option<PathBuf>,

    /// Directory for the flat files
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Recording rate in Hz
    #[arg(long, global = true)]
    pub original_rate: Option<u32>,

    /// Output rate in Hz; must divide the recording rate
    #[arg(long, global = true)]
    pub target_rate: Option<u32>,

    /// Anti-aliasing filter order
    #[arg(long, global = true)]
    pub filter_order: Option<usize>,
}

impl PipelineArgs {
    /// Defaults, then the config file, then flags and environment.
    pub fn resolve(&self) -> Result<PipelineConfig, String> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path).map_err(|e| e.to_string())?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.behavioral {
            config.behavioral_csv = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(rate) = self.original_rate {
            config.original_rate = rate;
        }
        if let Some(rate) = self.target_rate {
            config.target_rate = rate;
        }
        if let Some(order) = self.filter_order {
            config.filter_order = order;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct ProcessArgs {
    /// Subject number, e.g. 178 (prompted for when omitted)
    #[arg(long)]
    pub subject: Option<String>,

    /// Print the processing report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct SubjectsArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Run file (.mat or .csv)
    #[arg(long)]
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct BehaviorArgs {
    /// Subject number, e.g. 178
    #[arg(long)]
    pub subject: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Accept "178" as well as the full label "BAP178".
pub fn subject_id<'a>(input: &'a str, prefix: &str) -> &'a str {
    let input = input.trim();
    input.strip_prefix(prefix).unwrap_or(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_subject_id() {
        assert_eq!(subject_id("178", "BAP"), "178");
        assert_eq!(subject_id(" BAP178\n", "BAP"), "178");
    }

    #[test]
    fn test_resolve_defaults() {
        let config = PipelineArgs::default().resolve().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pupil.json");
        fs::write(&path, r#"{"original_rate": 1000, "target_rate": 100, "filter_order": 6}"#)
            .unwrap();

        let args = PipelineArgs {
            config: Some(path),
            target_rate: Some(250),
            ..PipelineArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.original_rate, 1000);
        assert_eq!(config.target_rate, 250);
        assert_eq!(config.filter_order, 6);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let args = PipelineArgs {
            original_rate: Some(2000),
            target_rate: Some(300),
            ..PipelineArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
