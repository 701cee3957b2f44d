use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn shaderpad() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shaderpad"))
}

#[test]
fn preprocesses_file_to_stdout() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("demo.frag");
    fs::write(&shader, "#define PI 3.14159\nfloat c = 2.0 * PI;\n").unwrap();

    let output = shaderpad()
        .arg(&shader)
        .output()
        .expect("failed to run shaderpad");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("2.0 * 3.14159"));
}

#[test]
fn writes_output_file() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("demo.frag");
    let out = dir.path().join("out.frag");
    fs::write(&shader, "#define X 5\nfloat v = X;\n").unwrap();

    let status = shaderpad()
        .arg(&shader)
        .args(["--output", out.to_str().unwrap()])
        .status()
        .expect("failed to run shaderpad");

    assert!(status.success());
    let written = fs::read_to_string(&out).unwrap();
    assert!(written.contains("float v = 5;"));
}

#[test]
fn diagnostics_fail_the_run_unless_best_effort() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("broken.frag");
    fs::write(&shader, "float v=1.0;\n#endif\n").unwrap();

    let output = shaderpad()
        .arg(&shader)
        .output()
        .expect("failed to run shaderpad");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("#endif without matching"));

    let relaxed = shaderpad()
        .arg(&shader)
        .arg("--best-effort")
        .status()
        .expect("failed to rerun shaderpad");
    assert!(relaxed.success());
}

#[test]
fn json_mode_exposes_line_mapping_and_errors() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("demo.frag");
    fs::write(&shader, "#ifdef FOO\nfloat a;\n#endif\nfloat b;\n").unwrap();

    let output = shaderpad()
        .arg(&shader)
        .arg("--json")
        .output()
        .expect("failed to run shaderpad");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert!(parsed["code"].as_str().unwrap().contains("float b;"));
    assert_eq!(parsed["line_mapping"]["4"], 4);
    assert!(parsed["errors"].as_array().unwrap().is_empty());
}

#[test]
fn lists_macro_names() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("demo.frag");
    fs::write(&shader, "#define A 1\n#define B(x) x\nfloat v=1.0;\n").unwrap();

    let output = shaderpad()
        .arg(&shader)
        .arg("--macros")
        .output()
        .expect("failed to run shaderpad");

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "A\nB\n");
}

#[test]
fn translates_saved_driver_errors() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("demo.frag");
    let log = dir.path().join("driver.log");
    // Lines 1-2 splice into one output line, so output line 2 is original 3.
    fs::write(&shader, "float a = 1.0 \\\n+ 2.0;\nbroken;\n").unwrap();
    fs::write(&log, "ERROR: 0:2: 'broken' : syntax error\n").unwrap();

    let output = shaderpad()
        .arg(&shader)
        .args(["--translate-errors", log.to_str().unwrap()])
        .output()
        .expect("failed to run shaderpad");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("ERROR: 0:3: 'broken' : syntax error"));
}
