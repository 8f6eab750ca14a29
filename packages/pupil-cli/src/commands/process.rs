use crate::cli::{subject_id, PipelineArgs, ProcessArgs};
use crate::exit_codes;
use crate::output;
use crate::prompt;
use pupil_rs::pipeline::RunStatus;
use pupil_rs::{discover_subjects, process_subject, PhaseLabel, SubjectReport};
use std::time::Instant;

pub fn execute(pipeline: &PipelineArgs, args: ProcessArgs) -> i32 {
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
    if subjects.is_empty() {
        eprintln!(
            "Error: No run files found in {}",
            config.data_dir.display()
        );
        return exit_codes::INPUT_ERROR;
    }

    let id = match args.subject.as_deref() {
        Some(input) => {
            let id = subject_id(input, &config.subject_prefix);
            if !subjects.contains_key(id) {
                eprintln!(
                    "Error: Subject '{}' not found. Available: {}",
                    input,
                    subjects.keys().cloned().collect::<Vec<_>>().join(", ")
                );
                return exit_codes::INPUT_ERROR;
            }
            id.to_string()
        }
        None => {
            let stdin = std::io::stdin();
            match prompt::select_subject(
                &subjects,
                &config.subject_prefix,
                stdin.lock(),
                std::io::stderr(),
            ) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    eprintln!("No subject selected");
                    return exit_codes::CANCELLED;
                }
                Err(e) => {
                    eprintln!("Error: Failed to read selection: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
        }
    };

    let Some(runs) = subjects.get(&id) else {
        return exit_codes::INPUT_ERROR;
    };
    eprintln!("{}", prompt::describe(&config.subject_prefix, runs));

    let start_time = Instant::now();
    let report = match process_subject(&config, &id, runs) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if args.json {
        if let Err(e) = output::print_json(&report) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        print_summary(&report);
    }
    eprintln!("Done in {:.1}s", start_time.elapsed().as_secs_f64());

    let written = report.files_written().len();
    if written == 0 {
        eprintln!("Error: No output files were written");
        exit_codes::EXECUTION_ERROR
    } else if report.is_incomplete() {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::SUCCESS
    }
}

fn print_summary(report: &SubjectReport) {
    println!(
        "{}: {} behavioral trials, {} Hz -> {} Hz",
        report.subject, report.behavioral_trials, report.original_rate, report.target_rate
    );
    if report.behavioral_rows_skipped > 0 {
        println!(
            "  {} behavioral row(s) skipped as unparseable",
            report.behavioral_rows_skipped
        );
    }
    for task in &report.tasks {
        println!();
        println!("{} ({} behavioral trials)", task.task, task.behavioral_trials);
        if task.runs.is_empty() {
            println!("  no run files");
            continue;
        }
        for run in &task.runs {
            let status = match run.status {
                RunStatus::Processed => format!(
                    "{} -> {} samples, {} per trial, {} trials",
                    run.raw_samples, run.downsampled_samples, run.samples_per_trial, run.trials_written
                ),
                RunStatus::Skipped => "skipped".to_string(),
                RunStatus::Failed => "failed".to_string(),
            };
            println!("  session {} run {}: {}", run.session, run.run, status);
            if let Some(ref message) = run.message {
                println!("    {}", message);
            }
        }
        match task.output_file {
            Some(ref path) => {
                println!(
                    "  wrote {} ({} trials, {} samples)",
                    path.display(),
                    task.trials_written,
                    task.samples_written
                );
                for phase in PhaseLabel::ALL {
                    println!(
                        "    {:<9} {:>8} ({:.1}%)",
                        phase.as_str(),
                        task.phase_counts.get(&phase).copied().unwrap_or(0),
                        task.phase_percentage(phase)
                    );
                }
            }
            None => match task.error {
                Some(ref error) => println!("  failed: {}", error),
                None => println!("  no output written"),
            },
        }
        for warning in &task.warnings {
            println!("  warning: {}", warning);
        }
    }
}
