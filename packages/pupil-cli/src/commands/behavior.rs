use crate::cli::{subject_id, BehaviorArgs, PipelineArgs};
use crate::exit_codes;
use crate::output;
use pupil_rs::{summarize, BehavioralTable};

pub fn execute(pipeline: &PipelineArgs, args: BehaviorArgs) -> i32 {
    let config = match pipeline.resolve() {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let table = match BehavioralTable::load(&config.behavioral_csv) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let label = config.subject_label(subject_id(&args.subject, &config.subject_prefix));
    let summary = summarize(&table, &label);
    if summary.total_trials == 0 {
        eprintln!("Error: No behavioral data for subject {}", label);
        return exit_codes::INPUT_ERROR;
    }

    if args.json {
        if let Err(e) = output::print_json(&summary) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
        return exit_codes::SUCCESS;
    }

    println!("{}: {} behavioral trials", summary.subject, summary.total_trials);
    if summary.skipped_rows > 0 {
        println!("{} unparseable row(s) skipped", summary.skipped_rows);
    }
    println!("By task:");
    for (task, count) in &summary.by_task {
        println!("  {:<8} {}", task, count);
    }
    println!("By session:");
    for (session, count) in &summary.by_session {
        println!("  {:<8} {}", session, count);
    }
    println!("By run:");
    for (run, count) in &summary.by_run {
        println!("  {:<8} {}", run, count);
    }
    if summary.timing_columns.is_empty() {
        println!("No timing columns in the behavioral table");
    } else {
        println!("Timing columns: {}", summary.timing_columns.join(", "));
    }

    exit_codes::SUCCESS
}
