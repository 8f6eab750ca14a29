use crate::cli::{InspectArgs, PipelineArgs};
use crate::exit_codes;
use crate::output;
use pupil_rs::inspect_file;

pub fn execute(pipeline: &PipelineArgs, args: InspectArgs) -> i32 {
    let config = match pipeline.resolve() {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let structure = match inspect_file(&args.file, &config.signal_fields()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if args.json {
        if let Err(e) = output::print_json(&structure) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
        return exit_codes::SUCCESS;
    }

    println!("{} ({})", structure.path, structure.format);
    println!("{:<24} {:<10} {:<12} {:>10}", "Variable", "Class", "Size", "Elements");
    println!("{}", "-".repeat(59));
    for var in &structure.variables {
        let dims: Vec<String> = var.dims.iter().map(|d| d.to_string()).collect();
        println!(
            "{:<24} {:<10} {:<12} {:>10}",
            var.name,
            var.class,
            dims.join("x"),
            var.len
        );
    }

    let timing: Vec<&str> = structure.timing_variables().map(|v| v.name.as_str()).collect();
    println!();
    if timing.is_empty() {
        println!("No timing-related variables");
    } else {
        println!("Timing-related variables: {}", timing.join(", "));
    }

    exit_codes::SUCCESS
}
