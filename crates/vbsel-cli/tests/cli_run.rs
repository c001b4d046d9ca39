use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vbsel"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("vbsel_cli_{}_{}_{}", std::process::id(), nanos, name));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const GOOD: &str = r#"["LooseBadJet","JVT50Jet"]"#;
const GOOD_B: &str = r#"["LooseBadJet","JVT50Jet","BTag77MV2c10"]"#;

fn jet(pt: f64, eta: f64, phi: f64, flags: &str) -> String {
    format!(r#"{{"pt":{pt},"eta":{eta},"phi":{phi},"m":8.0,"flags":{flags}}}"#)
}

fn event(jets: &[String], weight: f64) -> String {
    format!(
        r#"{{"jets":[{}],"met":{{"et":50.0,"phi":0.5}},"process_id":410470,"weights":[{weight}]}}"#,
        jets.join(",")
    )
}

/// One accepted event, one with three jets, one with a bad jet.
fn write_events(dir: &std::path::Path) -> PathBuf {
    let four = vec![
        jet(100.0, 0.4, 0.0, GOOD_B),
        jet(80.0, -0.6, 1.6, GOOD_B),
        jet(60.0, 1.2, -1.6, GOOD),
        jet(40.0, -1.4, 3.0, GOOD),
    ];
    let three = four[..3].to_vec();
    let mut bad = four.clone();
    bad.push(jet(25.0, 0.1, 2.2, r#"["JVT50Jet"]"#));
    let lines = [event(&four, 1.5), String::new(), event(&three, 1.0), event(&bad, 1.0)];
    let path = dir.join("events.jsonl");
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

#[test]
fn run_writes_all_outputs() {
    let dir = tmp_dir("run");
    std::fs::create_dir_all(&dir).unwrap();
    let input = write_events(&dir);
    let config = dir.join("analysis.yaml");
    std::fs::write(&config, "regions:\n  SR_2b: \"bjets_n >= 2\"\n").unwrap();
    let out_dir = dir.join("out");

    let out = run(&[
        "run",
        "--config",
        config.to_string_lossy().as_ref(),
        "--input",
        input.to_string_lossy().as_ref(),
        "--out-dir",
        out_dir.to_string_lossy().as_ref(),
        "--threads",
        "1",
    ]);
    assert!(out.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["processed"], 3);
    assert_eq!(summary["accepted"], 1);
    assert_eq!(summary["rows"], 1);

    let cutflow: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("cutflow.json")).unwrap()).unwrap();
    assert_eq!(cutflow["skipped"]["bad_jet"], 1);
    assert_eq!(cutflow["skipped"]["too_few_jets"], 1);
    assert_eq!(cutflow["regions"][0]["name"], "inclusive");
    assert_eq!(cutflow["regions"][1]["name"], "SR_2b");
    assert_eq!(cutflow["regions"][1]["events"], 1);

    let hists: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("histograms.json")).unwrap()).unwrap();
    let hists = hists.as_array().unwrap();
    let jets_n = hists.iter().find(|h| h["name"] == "jets_n").unwrap();
    assert_eq!(jets_n["entries"], 1);
    assert_eq!(jets_n["bin_content"][4], 1.5);

    let batches = vbsel_io::read_parquet(&out_dir.join("ntuple.parquet")).unwrap();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 1);
    let schema = batches[0].schema();
    assert!(schema.field_with_name("meff_4j").is_ok());
    assert!(schema.field_with_name("region_SR_2b").is_ok());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_streams_rows_across_batches() {
    let dir = tmp_dir("run_batches");
    std::fs::create_dir_all(&dir).unwrap();
    let four = [
        jet(100.0, 0.4, 0.0, GOOD_B),
        jet(80.0, -0.6, 1.6, GOOD_B),
        jet(60.0, 1.2, -1.6, GOOD),
        jet(40.0, -1.4, 3.0, GOOD),
    ];
    let lines: Vec<String> = (0..7).map(|i| event(&four, 1.0 + i as f64)).collect();
    let input = dir.join("events.jsonl");
    std::fs::write(&input, lines.join("\n") + "\n").unwrap();
    let config = dir.join("analysis.yaml");
    std::fs::write(&config, "batch_size: 2\nchunk_size: 1\n").unwrap();
    let out_dir = dir.join("out");

    let out = run(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--input",
        input.to_str().unwrap(),
        "--out-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["accepted"], 7);
    assert_eq!(summary["rows"], 7);

    let batches = vbsel_io::read_parquet(&out_dir.join("ntuple.parquet")).unwrap();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 7);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_refuses_non_empty_out_dir() {
    let dir = tmp_dir("run_nonempty");
    std::fs::create_dir_all(&dir).unwrap();
    let input = write_events(&dir);

    // `dir` already holds the input file.
    let args = [
        "run",
        "--input",
        input.to_str().unwrap(),
        "--out-dir",
        dir.to_str().unwrap(),
    ];
    let out = run(&args);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--overwrite"));

    let mut args = args.to_vec();
    args.push("--overwrite");
    let out = run(&args);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.join("ntuple.parquet").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_reports_unsorted_input_line() {
    let dir = tmp_dir("run_unsorted");
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("events.jsonl");
    let sorted = event(&[jet(50.0, 0.0, 0.0, GOOD), jet(40.0, 1.0, 1.0, GOOD)], 1.0);
    let unsorted = event(&[jet(40.0, 0.0, 0.0, GOOD), jet(50.0, 1.0, 1.0, GOOD)], 1.0);
    std::fs::write(&input, format!("{sorted}\n{unsorted}\n")).unwrap();

    let out = run(&[
        "run",
        "--input",
        input.to_str().unwrap(),
        "--out-dir",
        dir.join("out").to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("line 2"), "stderr={stderr}");
    assert!(stderr.contains("jets are not ordered"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn validate_reports_regions() {
    let dir = tmp_dir("validate");
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("analysis.yaml");
    std::fs::write(&config, "regions:\n  SR_meff: \"meff_incl > 1500\"\n").unwrap();

    let out = run(&["validate", "--config", config.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["valid"], true);
    assert_eq!(v["regions"], serde_json::json!(["inclusive", "SR_meff"]));
    assert_eq!(v["overlap_steps"], 5);

    std::fs::write(&config, "regions:\n  SR: \"no_such_variable > 1\"\n").unwrap();
    let out = run(&["validate", "--config", config.to_str().unwrap()]);
    assert!(!out.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn config_prints_loadable_defaults() {
    let dir = tmp_dir("config");
    std::fs::create_dir_all(&dir).unwrap();
    let out = run(&["config"]);
    assert!(out.status.success());
    let yaml = String::from_utf8_lossy(&out.stdout);
    assert!(yaml.contains("min_signal_jets: 4"));

    let path = dir.join("defaults.yaml");
    std::fs::write(&path, yaml.as_bytes()).unwrap();
    let out = run(&["validate", "--config", path.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("vbsel "));
}
