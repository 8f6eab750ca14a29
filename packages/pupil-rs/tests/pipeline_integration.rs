use pupil_rs::pipeline::RunStatus;
use pupil_rs::{discover_subjects, process_subject, PhaseLabel, PipelineConfig, PupilError, TaskCode};
use std::fs;
use std::path::Path;

const HEADER: &str = "sub,mvc,ses,task,run,trial,stimLev,isOddball,isStrength,iscorr,resp1,resp1RT,resp2,resp2RT,auc_rel_mvc,resp1_isdiff";

fn behavioral_csv(dir: &Path, rows: &[(&str, &str, u32, u32, u32)]) -> std::path::PathBuf {
    let mut text = format!("{}\n", HEADER);
    for (sub, task, ses, run, trial) in rows {
        text.push_str(&format!(
            "{},40.5,{},{},{},{},0.25,0,1,1,1,0.6,2,1.2,0.3,0\n",
            sub, ses, task, run, trial
        ));
    }
    let path = dir.join("behavior.csv");
    fs::write(&path, text).unwrap();
    path
}

fn csv_run(dir: &Path, name: &str, samples: &[f64]) {
    let mut text = String::from("smp_timestamp,sample\n");
    for (i, s) in samples.iter().enumerate() {
        text.push_str(&format!("{},{}\n", i as f64 * 0.5, s));
    }
    fs::write(dir.join(name), text).unwrap();
}

/// Uncompressed level-5 MAT file with double row vectors
fn mat_run(dir: &Path, name: &str, vars: &[(&str, &[f64])]) {
    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    let mut out = Vec::new();
    let mut text = b"MATLAB 5.0 MAT-file".to_vec();
    text.resize(116, b' ');
    out.extend_from_slice(&text);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&0x0100u16.to_le_bytes());
    out.extend_from_slice(b"IM");
    for (var, values) in vars {
        let mut body = Vec::new();
        push_u32(&mut body, 6);
        push_u32(&mut body, 8);
        push_u32(&mut body, 6);
        push_u32(&mut body, 0);
        push_u32(&mut body, 5);
        push_u32(&mut body, 8);
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&(values.len() as i32).to_le_bytes());
        push_u32(&mut body, 1);
        push_u32(&mut body, var.len() as u32);
        let mut name_bytes = var.as_bytes().to_vec();
        name_bytes.resize((var.len() + 7) / 8 * 8, 0);
        body.extend_from_slice(&name_bytes);
        push_u32(&mut body, 9);
        push_u32(&mut body, (values.len() * 8) as u32);
        for v in values.iter() {
            body.extend_from_slice(&v.to_le_bytes());
        }
        push_u32(&mut out, 14);
        push_u32(&mut out, body.len() as u32);
        out.extend_from_slice(&body);
    }
    fs::write(dir.join(name), out).unwrap();
}

/// Eye-tracker export: 1x1 struct `S` whose field `output` is a 1x1 struct
/// holding `sample` and `smp_timestamp`
fn eyetrack_mat_run(dir: &Path, name: &str, samples: &[f64], times: &[f64]) {
    fn element(data_type: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&data_type.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out.resize((out.len() + 7) / 8 * 8, 0);
        out
    }
    fn matrix(name: &str, class: u8, cols: usize, body: &[u8]) -> Vec<u8> {
        let mut content = element(6, &[class, 0, 0, 0, 0, 0, 0, 0]);
        let dims: Vec<u8> = [1i32, cols as i32].iter().flat_map(|d| d.to_le_bytes()).collect();
        content.extend(element(5, &dims));
        content.extend(element(1, name.as_bytes()));
        content.extend_from_slice(body);
        element(14, &content)
    }
    fn doubles(values: &[f64]) -> Vec<u8> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        matrix("", 6, values.len(), &element(9, &data))
    }
    fn structure(name: &str, fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = element(5, &16i32.to_le_bytes());
        let mut names = Vec::new();
        for (field, _) in fields {
            let mut padded = field.as_bytes().to_vec();
            padded.resize(16, 0);
            names.extend(padded);
        }
        body.extend(element(1, &names));
        for (_, value) in fields {
            body.extend_from_slice(value);
        }
        matrix(name, 2, 1, &body)
    }

    let output = structure(
        "",
        &[("sample", doubles(samples)), ("smp_timestamp", doubles(times))],
    );
    let mut out = b"MATLAB 5.0 MAT-file".to_vec();
    out.resize(116, b' ');
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&0x0100u16.to_le_bytes());
    out.extend_from_slice(b"IM");
    out.extend(structure("S", &[("output", output)]));
    fs::write(dir.join(name), out).unwrap();
}

/// Row indices (0-based, header excluded) whose pupil field is empty
fn empty_pupil_rows(text: &str) -> Vec<usize> {
    text.lines()
        .skip(1)
        .enumerate()
        .filter(|(_, line)| line.starts_with(','))
        .map(|(i, _)| i)
        .collect()
}

fn pupil_at(text: &str, row: usize) -> f64 {
    let line = text.lines().nth(row + 1).unwrap();
    line.split(',').next().unwrap().parse().unwrap()
}

fn config(dir: &Path, behavioral: std::path::PathBuf) -> PipelineConfig {
    PipelineConfig {
        data_dir: dir.to_path_buf(),
        behavioral_csv: behavioral,
        output_dir: dir.join("flat"),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_decimated_subject_build() {
    let tmp = tempfile::tempdir().unwrap();
    let mut rows = Vec::new();
    for trial in 1..=5 {
        rows.push(("BAP178", "aud", 2, 1, trial));
    }
    for trial in 1..=4 {
        rows.push(("BAP178", "aud", 2, 2, trial));
    }
    rows.push(("BAP178", "vis", 2, 1, 1));
    rows.push(("BAP201", "aud", 2, 1, 1));
    let behavioral = behavioral_csv(tmp.path(), &rows);

    let signal: Vec<f64> = (0..4000)
        .map(|i| 3000.0 + 50.0 * (i as f64 * 0.001).sin())
        .collect();
    csv_run(tmp.path(), "subjectBAP178_Aoddball_session2_run2_eyetrack_cleaned.csv", &signal);
    csv_run(tmp.path(), "subjectBAP178_Aoddball_session2_run1_eyetrack_cleaned.csv", &signal);

    let config = config(tmp.path(), behavioral);
    let subjects = discover_subjects(&config).unwrap();
    let report = process_subject(&config, "178", &subjects["178"]).unwrap();

    let adt = &report.tasks[0];
    assert_eq!(adt.task, TaskCode::Adt);
    assert_eq!(adt.runs.len(), 2);
    assert_eq!((adt.runs[0].session, adt.runs[0].run), (2, 1));
    assert_eq!(adt.runs[0].downsampled_samples, 500);
    assert_eq!(adt.runs[0].samples_per_trial, 100);
    assert_eq!(adt.runs[1].samples_per_trial, 125);
    assert_eq!(adt.trials_written, 9);
    assert_eq!(adt.samples_written, 1000);
    assert_eq!(adt.phase_counts[&PhaseLabel::Baseline], 200);

    let path = config.output_dir.join("BAP178_ADT_DS250.csv");
    assert_eq!(adt.output_file.as_deref(), Some(path.as_path()));
    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1001);
    assert!(lines[0].starts_with("pupil,time,trial_index,run_index,session_index,duration_index,trial_label,sub"));

    let second: Vec<&str> = lines[2].split(',').collect();
    let pupil: f64 = second[0].parse().unwrap();
    assert!((pupil - 3000.4).abs() < 0.5);
    assert_eq!(&second[1..8], &["4", "1", "1", "2", "1", "baseline", "BAP178"]);
    assert!(lines[501].contains(",1,2,2,1,baseline,BAP178,40.5,2,aud,2,1,"));

    // VDT has behavior but no run files
    assert!(report.tasks[1].output_file.is_none());
    assert!(!config.output_dir.join("BAP178_VDT_DS250.csv").exists());
}

#[test]
fn test_decimated_zero_block_is_written_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let behavioral = behavioral_csv(tmp.path(), &[("BAP178", "aud", 2, 1, 1)]);

    // 2 s at 2000 Hz with a 20 ms blink
    let mut signal = vec![3000.0; 4000];
    for v in &mut signal[2000..2040] {
        *v = 0.0;
    }
    csv_run(tmp.path(), "subjectBAP178_Aoddball_session2_run1_eyetrack_cleaned.csv", &signal);

    let config = config(tmp.path(), behavioral);
    let subjects = discover_subjects(&config).unwrap();
    let report = process_subject(&config, "178", &subjects["178"]).unwrap();
    assert_eq!(report.tasks[0].samples_written, 500);

    let text = fs::read_to_string(config.output_dir.join("BAP178_ADT_DS250.csv")).unwrap();
    assert_eq!(empty_pupil_rows(&text), vec![250, 251, 252, 253, 254]);
    for row in [0, 100, 249, 255, 400, 499] {
        assert!((pupil_at(&text, row) - 3000.0).abs() < 0.01, "row {}", row);
    }
}

#[test]
fn test_non_finite_samples_are_written_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let behavioral = behavioral_csv(
        tmp.path(),
        &[("BAP178", "vis", 1, 2, 1), ("BAP178", "vis", 1, 2, 2)],
    );

    let mut signal: Vec<f64> = (0..4000)
        .map(|i| 3000.0 + 20.0 * (i as f64 * 0.002).sin())
        .collect();
    signal[100] = f64::INFINITY;
    signal[3990] = f64::NAN;
    csv_run(tmp.path(), "subjectBAP178_Voddball_session1_run2_eyetrack_cleaned.csv", &signal);

    let config = config(tmp.path(), behavioral);
    let subjects = discover_subjects(&config).unwrap();
    let report = process_subject(&config, "178", &subjects["178"]).unwrap();
    let vdt = &report.tasks[1];
    assert_eq!(vdt.runs[0].status, RunStatus::Processed);
    assert_eq!(vdt.samples_written, 500);

    let text = fs::read_to_string(config.output_dir.join("BAP178_VDT_DS250.csv")).unwrap();
    assert_eq!(empty_pupil_rows(&text), vec![12, 498]);
    for row in [0, 11, 13, 250, 497, 499] {
        let expected = 3000.0 + 20.0 * ((row * 8) as f64 * 0.002).sin();
        assert!((pupil_at(&text, row) - expected).abs() < 0.5, "row {}", row);
    }
}

#[test]
fn test_nested_mat_run_is_decimated() {
    let tmp = tempfile::tempdir().unwrap();
    let behavioral = behavioral_csv(tmp.path(), &[("BAP178", "aud", 2, 1, 1)]);
    let mut samples = vec![3050.0; 800];
    samples[401] = 0.0;
    let times: Vec<f64> = (0..800).map(|i| i as f64 * 0.5).collect();
    eyetrack_mat_run(
        tmp.path(),
        "subjectBAP178_Aoddball_session2_run1_eyetrack_cleaned.mat",
        &samples,
        &times,
    );

    let config = config(tmp.path(), behavioral);
    let subjects = discover_subjects(&config).unwrap();
    let report = process_subject(&config, "178", &subjects["178"]).unwrap();
    assert_eq!(report.tasks[0].runs[0].downsampled_samples, 100);

    let text = fs::read_to_string(config.output_dir.join("BAP178_ADT_DS250.csv")).unwrap();
    assert_eq!(empty_pupil_rows(&text), vec![50]);
    assert!(text.lines().nth(2).unwrap().split(',').nth(1) == Some("4"));
}

#[test]
fn test_rebuild_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let behavioral = behavioral_csv(
        tmp.path(),
        &[("BAP178", "vis", 1, 1, 1), ("BAP178", "vis", 1, 1, 2)],
    );
    let signal: Vec<f64> = (0..1600).map(|i| 2500.0 + (i % 37) as f64).collect();
    csv_run(tmp.path(), "subjectBAP178_Voddball_session1_run1_eyetrack_cleaned.csv", &signal);

    let config = config(tmp.path(), behavioral);
    let subjects = discover_subjects(&config).unwrap();
    let path = config.output_dir.join("BAP178_VDT_DS250.csv");

    process_subject(&config, "178", &subjects["178"]).unwrap();
    let first = fs::read(&path).unwrap();
    process_subject(&config, "178", &subjects["178"]).unwrap();
    let second = fs::read(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_mat_run_at_target_rate_keeps_dropouts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let behavioral = behavioral_csv(tmp.path(), &[("BAP178", "aud", 3, 2, 1)]);
    let samples = [3100.0, 0.0, 3102.0, 3103.0, 3104.0];
    let times = [1.0, 1.004, 1.008, 1.012, 1.016];
    mat_run(
        tmp.path(),
        "subjectBAP178_Aoddball_session3_run2_eyetrack_cleaned.mat",
        &[("sample", &samples), ("smp_timestamp", &times)],
    );

    let config = PipelineConfig {
        original_rate: 250,
        ..config(tmp.path(), behavioral)
    };
    let subjects = discover_subjects(&config).unwrap();
    let report = process_subject(&config, "178", &subjects["178"]).unwrap();
    assert_eq!(report.tasks[0].samples_written, 5);

    let text = fs::read_to_string(config.output_dir.join("BAP178_ADT_DS250.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[1].starts_with("3100,1,1,2,3,1,baseline,"));
    assert!(lines[2].starts_with(",1.004,1,2,3,2,fixation,"));
    assert!(lines[5].starts_with("3104,1.016,1,2,3,5,response,"));
}

#[test]
fn test_trials_beyond_signal_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let behavioral = behavioral_csv(
        tmp.path(),
        &[("BAP178", "aud", 1, 1, 1), ("BAP178", "aud", 1, 1, 7)],
    );
    csv_run(
        tmp.path(),
        "subjectBAP178_Aoddball_session1_run1_eyetrack_cleaned.csv",
        &[10.0; 100],
    );
    let config = PipelineConfig {
        original_rate: 250,
        ..config(tmp.path(), behavioral)
    };
    let subjects = discover_subjects(&config).unwrap();
    let report = process_subject(&config, "178", &subjects["178"]).unwrap();

    let adt = &report.tasks[0];
    assert_eq!(adt.runs[0].status, RunStatus::Processed);
    assert_eq!(adt.trials_written, 1);
    assert_eq!(adt.samples_written, 50);
    assert_eq!(adt.warnings.len(), 1);
    assert!(adt.warnings[0].contains("Trial 7"));
}

#[test]
fn test_missing_behavioral_table_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), tmp.path().join("absent.csv"));
    let err = process_subject(&config, "178", &Default::default()).unwrap_err();
    assert!(matches!(err, PupilError::FileNotFound(_)));
}
