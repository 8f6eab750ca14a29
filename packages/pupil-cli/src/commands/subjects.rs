use crate::cli::{PipelineArgs, SubjectsArgs};
use crate::exit_codes;
use crate::output;
use crate::prompt;
use pupil_rs::{discover_subjects, TaskCode};
use serde::Serialize;

#[derive(Serialize)]
struct SubjectEntry {
    subject_id: String,
    label: String,
    adt_runs: usize,
    vdt_runs: usize,
    files: Vec<String>,
}

pub fn execute(pipeline: &PipelineArgs, args: SubjectsArgs) -> i32 {
    let config = match pipeline.resolve() {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let subjects = match discover_subjects(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if args.json {
        let entries: Vec<SubjectEntry> = subjects
            .values()
            .map(|runs| SubjectEntry {
                subject_id: runs.subject_id.clone(),
                label: config.subject_label(&runs.subject_id),
                adt_runs: runs.runs(TaskCode::Adt).len(),
                vdt_runs: runs.runs(TaskCode::Vdt).len(),
                files: TaskCode::ALL
                    .into_iter()
                    .flat_map(|task| runs.runs(task))
                    .map(|run| run.file_name())
                    .collect(),
            })
            .collect();
        if let Err(e) = output::print_json(&entries) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else if subjects.is_empty() {
        println!("No subjects found in {}", config.data_dir.display());
    } else {
        for runs in subjects.values() {
            println!("{}", prompt::describe(&config.subject_prefix, runs));
        }
    }

    exit_codes::SUCCESS
}
