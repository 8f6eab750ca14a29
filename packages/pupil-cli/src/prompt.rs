use pupil_rs::{SubjectRuns, TaskCode};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// "BAP178 - ADT: 2 runs, VDT: 1 runs"
pub fn describe(prefix: &str, runs: &SubjectRuns) -> String {
    format!(
        "{}{} - ADT: {} runs, VDT: {} runs",
        prefix,
        runs.subject_id,
        runs.runs(TaskCode::Adt).len(),
        runs.runs(TaskCode::Vdt).len()
    )
}

/// Ask for a subject until a known one is entered.
///
/// Returns `None` on end of input or `q`.
pub fn select_subject<R: BufRead, W: Write>(
    subjects: &BTreeMap<String, SubjectRuns>,
    prefix: &str,
    mut input: R,
    mut out: W,
) -> std::io::Result<Option<String>> {
    writeln!(out, "Available subjects:")?;
    for runs in subjects.values() {
        writeln!(out, "  {}", describe(prefix, runs))?;
    }

    let mut line = String::new();
    loop {
        write!(out, "Enter subject number (q to quit): ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(None);
        }
        let answer = crate::cli::subject_id(&line, prefix);
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        if subjects.contains_key(answer) {
            return Ok(Some(answer.to_string()));
        }
        if !answer.is_empty() {
            writeln!(out, "Subject '{}' not found", answer)?;
        }
    }
}
