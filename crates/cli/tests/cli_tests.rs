// Integration tests for the gridcalc binary: scripts, config and exit codes.
//
// Every test points --config at a file in a temp dir so the user's own
// config never leaks in.
//
// Run with: cargo test -p gridcalc-cli --test cli_tests

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("gridcalc.toml");
        std::fs::write(&config_path, config).unwrap();
        Self { dir, config: config_path }
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn gridcalc(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gridcalc"));
        cmd.arg("--config").arg(&self.config);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.gridcalc().args(args).output().expect("run gridcalc")
    }

    fn run_script(&self, script: &Path, extra: &[&str]) -> Output {
        let mut cmd = self.gridcalc();
        cmd.arg("run").arg(script).args(extra);
        cmd.output().expect("run gridcalc")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// gridcalc run
// ===========================================================================

#[test]
fn run_script_file() {
    let fx = Fixture::new("");
    let script = fx.script(
        "sheet.grid",
        "# totals\nset A1 =B1+C1\nset B1 2\nset C1 '3\nget A1\nprint texts\n",
    );

    let output = fx.run_script(&script, &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "A1\t5\t=B1+C1\n(1, 3)\n=B1+C1\t2\t'3\n");
}

#[test]
fn run_reads_stdin() {
    let fx = Fixture::new("[output]\nshow_size = false\n");
    let mut child = fx
        .gridcalc()
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"set A1 =1/0\nset B1 =A1\nprint values\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "#DIV/0!\t#DIV/0!\n");
}

#[test]
fn run_failing_lines_exit_3_and_continue() {
    let fx = Fixture::new("");
    let script = fx.script(
        "bad.grid",
        "set A1 =B1\nset B1 =A1\nset C1 =(1\nset D1 ok\nget D1\n",
    );

    let output = fx.run_script(&script, &[]);
    assert_eq!(output.status.code(), Some(3));

    let err = stderr(&output);
    assert!(err.contains("line 2: Circular reference"), "stderr: {}", err);
    assert!(err.contains("line 3: formula syntax error"), "stderr: {}", err);
    assert!(err.contains("2 of 5 commands failed"), "stderr: {}", err);
    assert_eq!(stdout(&output), "D1\tok\tok\n");
}

#[test]
fn run_missing_script_is_usage_error() {
    let fx = Fixture::new("");
    let output = fx.run_script(&fx.dir.path().join("missing.grid"), &[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("cannot open script"));
}

#[test]
fn run_json_flag_overrides_config() {
    let fx = Fixture::new("[output]\nformat = \"tsv\"\n");
    let script = fx.script("s.grid", "set B2 =2*3\nprint values\n");

    let output = fx.run_script(&script, &["--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(json["size"]["rows"], 1);
    assert_eq!(json["origin"], "B2");
    assert_eq!(json["cells"][0]["text"], "=2*3");
    assert_eq!(json["cells"][0]["value"], 6.0);
}

// ===========================================================================
// gridcalc example
// ===========================================================================

#[test]
fn example_prints_demo_sheet() {
    let fx = Fixture::new("[output]\nshow = \"both\"\n");
    let output = fx.run(&["example"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let expected = "\
(5, 4)
texts:
=(1+2)*3\t=1+2*3\t\t
some\ttext\there\t
\t\t'and'\t'here
\t\t\t
\t=1/0\t\t
values:
9\t7\t\t
some\ttext\there\t
\t\tand'\there
\t\t\t
\t#DIV/0!\t\t
";
    assert_eq!(stdout(&output), expected);
}

#[test]
fn example_show_flag() {
    let fx = Fixture::new("");
    let output = fx.run(&["example", "--show", "texts"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("(5, 4)\n=(1+2)*3\t=1+2*3"));
}

// ===========================================================================
// config and logging
// ===========================================================================

#[test]
fn invalid_config_exits_4() {
    let fx = Fixture::new("[output]\nformat = \"xml\"\n");
    let output = fx.run(&["example"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("invalid config"));
}

#[test]
fn missing_explicit_config_exits_4() {
    let fx = Fixture::new("");
    let output = Command::new(env!("CARGO_BIN_EXE_gridcalc"))
        .arg("--config")
        .arg(fx.dir.path().join("nope.toml"))
        .arg("example")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn log_level_flag_enables_engine_debug() {
    let fx = Fixture::new("log_level = \"off\"\n");
    let script = fx.script("s.grid", "set A1 1\n");

    let quiet = fx.run_script(&script, &[]);
    assert!(stderr(&quiet).is_empty(), "stderr: {}", stderr(&quiet));

    let loud = fx.run_script(&script, &["--log-level", "debug"]);
    assert!(loud.status.success());
    assert!(stderr(&loud).contains("set A1"), "stderr: {}", stderr(&loud));
}

#[test]
fn bad_arguments_exit_2() {
    let fx = Fixture::new("");
    let output = fx.run(&["run", "--format", "xml"]);
    assert_eq!(output.status.code(), Some(2));
}
