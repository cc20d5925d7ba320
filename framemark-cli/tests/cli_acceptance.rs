use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    videos: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let videos = base.join("videos");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        seed_video_folder(&videos);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            videos,
        }
    }

    fn video(&self, name: &str) -> String {
        self.videos.join(name).to_string_lossy().into_owned()
    }

    fn folder(&self) -> String {
        self.videos.to_string_lossy().into_owned()
    }
}

/// Two placeholder videos plus a file the scanner must ignore.
fn seed_video_folder(videos: &PathBuf) {
    fs::create_dir_all(videos).expect("failed to create video folder");
    fs::write(videos.join("a.mp4"), b"placeholder").expect("failed to write a.mp4");
    fs::write(videos.join("b.mov"), b"placeholder").expect("failed to write b.mov");
    fs::write(videos.join("notes.txt"), b"not a video").expect("failed to write notes.txt");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("framemark"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute framemark: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "framemark {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_bin(env, args);
    assert_success(args, &output);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_err(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_bin(env, args);
    assert!(
        !output.status.success(),
        "expected framemark {:?} to fail, stdout:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout)
    );
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn scan_lists_videos_and_remembers_folder() {
    let env = CliTestEnv::new();
    let folder = env.folder();

    let stdout = run_ok(&env, &["scan", &folder]);
    assert!(stdout.contains("a.mp4"), "missing a.mp4 in:\n{stdout}");
    assert!(stdout.contains("b.mov"), "missing b.mov in:\n{stdout}");
    assert!(!stdout.contains("notes.txt"));
    assert!(stdout.contains("2 videos, 0 labeled"));

    let recent = env.xdg_state.join("framemark/recent.toml");
    let content = fs::read_to_string(&recent).expect("recent folder should be saved");
    assert!(content.contains("last_folder"));

    // No DIR: falls back to the remembered folder
    let stdout = run_ok(&env, &["scan", "--sort", "name", "--desc"]);
    let a = stdout.find("a.mp4").expect("a.mp4 listed");
    let b = stdout.find("b.mov").expect("b.mov listed");
    assert!(b < a, "descending name order expected:\n{stdout}");
}

#[test]
fn scan_without_folder_or_memory_fails() {
    let env = CliTestEnv::new();
    let stderr = run_err(&env, &["scan"]);
    assert!(stderr.contains("none remembered"), "stderr:\n{stderr}");
}

#[test]
fn mark_list_summarize_and_delete() {
    let env = CliTestEnv::new();
    let video = env.video("a.mp4");
    let folder = env.folder();

    let stdout = run_ok(
        &env,
        &["mark", &video, "--from", "10", "--to", "12", "--fps", "30"],
    );
    assert!(
        stdout.contains("Recorded event #0 (accident): frames 300-360, warning from 150"),
        "stdout:\n{stdout}"
    );
    let label_file = env.videos.join("a.json");
    let content = fs::read_to_string(&label_file).expect("label file should exist");
    assert!(content.contains("    \"video_name\": \"a.mp4\""));
    assert!(content.contains("\"start_frame\": 300"));

    let stdout = run_ok(&env, &["events", &video, "--fps", "30", "--at", "11"]);
    assert!(stdout.contains("frames 300-360"), "stdout:\n{stdout}");
    assert!(stdout.contains("[active]"), "stdout:\n{stdout}");

    let stdout = run_ok(&env, &["events", &video, "--fps", "30", "--at", "7"]);
    assert!(stdout.contains("[warning]"), "stdout:\n{stdout}");

    let stdout = run_ok(&env, &["summary", &folder]);
    assert!(
        stdout.contains("Videos: 2  Labeled: 1  Events: 1"),
        "stdout:\n{stdout}"
    );

    let stdout = run_ok(&env, &["summary", &folder, "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("summary JSON");
    assert_eq!(report["total_events"], 1);
    assert_eq!(report["events"][0]["video_name"], "a.mp4");
    assert_eq!(report["events"][0]["end_frame"], 360);

    let stdout = run_ok(&env, &["delete", &video, "0", "--fps", "30"]);
    assert!(stdout.contains("Deleted event #0; 0 remaining"));
    let content = fs::read_to_string(&label_file).expect("label file should remain");
    assert!(content.contains("\"events\": []"));

    let stdout = run_ok(&env, &["scan", &folder]);
    assert!(stdout.contains("2 videos, 0 labeled"));
}

#[test]
fn custom_label_is_written() {
    let env = CliTestEnv::new();
    let video = env.video("b.mov");

    run_ok(
        &env,
        &[
            "mark", &video, "--from", "1", "--to", "2", "--fps", "25", "--label", "near-miss",
        ],
    );
    let content = fs::read_to_string(env.videos.join("b.json")).expect("label file");
    assert!(content.contains("\"label\": \"near-miss\""));
    assert!(content.contains("\"fps\": 25.0"));
}

#[test]
fn reversed_mark_is_rejected() {
    let env = CliTestEnv::new();
    let video = env.video("a.mp4");

    let stderr = run_err(
        &env,
        &["mark", &video, "--from", "12", "--to", "10", "--fps", "30"],
    );
    assert!(stderr.contains("precedes start frame"), "stderr:\n{stderr}");
    assert!(!env.videos.join("a.json").exists());
}

#[test]
fn mark_without_known_frame_rate_fails() {
    let env = CliTestEnv::new();
    let video = env.video("a.mp4");

    let stderr = run_err(&env, &["mark", &video, "--from", "1", "--to", "2"]);
    assert!(stderr.contains("pass --fps"), "stderr:\n{stderr}");
}

#[test]
fn delete_missing_event_fails() {
    let env = CliTestEnv::new();
    let video = env.video("a.mp4");

    let stderr = run_err(&env, &["delete", &video, "4", "--fps", "30"]);
    assert!(stderr.contains("has no event #4"), "stderr:\n{stderr}");
}

#[test]
fn stats_prints_samples() {
    let env = CliTestEnv::new();
    let stdout = run_ok(&env, &["stats", "--samples", "1"]);
    assert!(stdout.starts_with("cpu"), "stdout:\n{stdout}");
    assert!(stdout.contains("memory"));
}
