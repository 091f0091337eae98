use std::{env, fs, path::Path, process::Command};

#[test]
fn basic_test() {
    let test_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("test_sim");
    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir_all(&test_dir).unwrap();

    let toml_string = r#"
[corpus]
n_documents = 50
n_topics = 5
prob_quality_direction = [0.7, 0.3]

[user]
n_users = 4
fanatic_ratio = 0.5

[session]
initial_budget = 200.0
n_candidates = 10
slate_size = 5
choice_model = "softmax"

[output]
sessions_per_user = 3
"#;

    let config_path = test_dir.join("config.toml");
    fs::write(&config_path, toml_string).expect("failed to write config.toml");

    let test_dir = test_dir.to_str().unwrap();

    fn run_cli(args: &[&str]) {
        let bin = env!("CARGO_BIN_EXE_suadere");
        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        assert!(
            output.status.success(),
            "Command failed:\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    run_cli(&["--sim-dir", test_dir, "create"]);
    run_cli(&["--sim-dir", test_dir, "create"]);

    run_cli(&["--sim-dir", test_dir, "resume", "--run-idx", "0"]);
    run_cli(&["--sim-dir", test_dir, "resume", "--run-idx", "0"]);

    run_cli(&["--sim-dir", test_dir, "resume", "--run-idx", "1"]);
    run_cli(&["--sim-dir", test_dir, "resume", "--run-idx", "1"]);

    run_cli(&["--sim-dir", test_dir, "analyze"]);

    for run_idx in 0..2 {
        let results = Path::new(test_dir)
            .join(format!("run-{run_idx:04}"))
            .join("results.json");
        assert!(results.is_file());
    }

    run_cli(&["--sim-dir", test_dir, "clean"]);

    fs::remove_dir_all(test_dir).ok();
}
