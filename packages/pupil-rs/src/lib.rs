pub mod behavioral;
pub mod config;
pub mod discovery;
pub mod downsample;
pub mod error;
pub mod filters;
pub mod flat;
pub mod pipeline;
pub mod readers;
pub mod segment;
pub mod types;

pub use behavioral::{summarize, BehavioralSummary, BehavioralTable};
pub use config::PipelineConfig;
pub use discovery::{discover_subjects, SubjectRuns};
pub use error::{PupilError, Result};
pub use pipeline::{process_subject, RunStatus, SubjectReport, TaskReport};
pub use readers::{inspect_file, FileStructure, SignalFields};
pub use types::*;
