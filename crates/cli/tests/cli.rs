use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const MINIMAL: &str = "\
#MUTATION TYPES
m1 0.5 f 0.0

#MUTATION RATE
0.0

#GENOMIC ELEMENT TYPES
g1 m1 1.0

#CHROMOSOME ORGANIZATION
g1 1 1000

#RECOMBINATION RATE
1000 0.0

#GENERATIONS
10

#DEMOGRAPHY AND STRUCTURE
1 P p1 100

#OUTPUT
10 A

#SEED
7
";

#[test]
fn run_minimal_model() {
    let file = write_temp(MINIMAL);
    Command::cargo_bin("germline")
        .unwrap()
        .args(["run"])
        .arg(file.path())
        .args(["--progress", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#OUT: 10 A"))
        .stdout(predicate::str::contains("p1 100"))
        .stdout(predicate::str::contains("Completed 10 generations (seed 7)"));
}

#[test]
fn invalid_mutation_type_prints_canonical_syntax() {
    let bad = MINIMAL.replace("m1 0.5 f 0.0", "m1 0.2 x 0.0");
    let file = write_temp(&bad);
    Command::cargo_bin("germline")
        .unwrap()
        .args(["run"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid mutation type"))
        .stderr(predicate::str::contains("Required syntax:"))
        .stderr(predicate::str::contains("#MUTATION TYPES"))
        .stderr(predicate::str::contains("m1 0.2 g -0.05 0.2"));
}

#[test]
fn validate_accepts_good_file() {
    let file = write_temp(MINIMAL);
    Command::cargo_bin("germline")
        .unwrap()
        .args(["validate"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("valid parameter file"));
}

#[test]
fn validate_rejects_unknown_section() {
    let bad = format!("{MINIMAL}\n#NOT A SECTION\n1\n");
    let file = write_temp(&bad);
    Command::cargo_bin("germline")
        .unwrap()
        .args(["validate"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown parameter"));
}

#[test]
fn fixed_seed_runs_are_identical() {
    let content = MINIMAL.replace("0.0\n\n#GENOMIC", "1e-4\n\n#GENOMIC");
    let file = write_temp(&content);
    let run = || {
        Command::cargo_bin("germline")
            .unwrap()
            .args(["run"])
            .arg(file.path())
            .args(["--progress", "false", "--seed", "99"])
            .output()
            .unwrap()
    };
    let first = run();
    let second = run();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn describe_prints_json_summary() {
    let file = write_temp(MINIMAL);
    Command::cargo_bin("germline")
        .unwrap()
        .args(["run"])
        .arg(file.path())
        .args(["--describe"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"generations\": 10"))
        .stdout(predicate::str::contains("\"seed\": 7"));
}

#[test]
fn script_callbacks_are_loaded() {
    let params = write_temp(MINIMAL);
    let script = write_temp("modifyChild() { T; }");
    Command::cargo_bin("germline")
        .unwrap()
        .args(["run"])
        .arg(params.path())
        .arg("--script")
        .arg(script.path())
        .args(["--progress", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#OUT: 10 A"));
}

#[test]
fn rejecting_callback_exits_nonzero() {
    let params = write_temp(MINIMAL);
    let script = write_temp("modifyChild() { F; }");
    Command::cargo_bin("germline")
        .unwrap()
        .args(["run"])
        .arg(params.path())
        .arg("--script")
        .arg(script.path())
        .args(["--progress", "false"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CallbackLimit"));
}
