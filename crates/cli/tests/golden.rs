//! Golden tests for the JSON output of the `stow` binary
//!
//! Every JSON message is one compact object per line; these tests pin the
//! shapes scripts depend on.
//!
//! Run with: `cargo test -p stow-cli --features golden`

#![cfg(feature = "golden")]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn stow(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stow"))
        .args(args)
        .env("STOW_CONFIG_DIR", config_dir)
        .env_remove("STOW_LOG")
        .output()
        .expect("Failed to execute stow")
}

/// Parse every non-empty line as a JSON object
fn json_lines(bytes: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Each line should be JSON"))
        .collect()
}

mod alias_tests {
    use super::*;

    #[test]
    fn test_alias_set_and_list_json() {
        let config = TempDir::new().unwrap();

        let output = stow(
            config.path(),
            &[
                "alias",
                "set",
                "local",
                "http://localhost:9000",
                "accesskey",
                "secretkey",
                "--json",
            ],
        );
        assert!(output.status.success());
        let lines = json_lines(&output.stdout);
        insta::assert_json_snapshot!(lines, @r#"
        [
          {
            "info": "Alias 'local' configured successfully."
          }
        ]
        "#);

        let output = stow(config.path(), &["alias", "list", "--json"]);
        assert!(output.status.success());
        let lines = json_lines(&output.stdout);
        insta::assert_json_snapshot!(lines, @r#"
        [
          {
            "name": "local",
            "endpoint": "http://localhost:9000",
            "region": "us-east-1",
            "bucket_lookup": "auto"
          }
        ]
        "#);
    }

    #[test]
    fn test_alias_remove_missing_json() {
        let config = TempDir::new().unwrap();

        let output = stow(config.path(), &["alias", "remove", "ghost", "--json"]);
        assert_eq!(output.status.code(), Some(5));
        assert!(output.stdout.is_empty());
        let lines = json_lines(&output.stderr);
        insta::assert_json_snapshot!(lines, @r#"
        [
          {
            "error": "Alias 'ghost' not found"
          }
        ]
        "#);
    }
}

mod session_tests {
    use super::*;

    #[test]
    fn test_session_clear_all_json() {
        let config = TempDir::new().unwrap();

        let output = stow(config.path(), &["session", "clear", "all", "--json"]);
        assert!(output.status.success());
        let lines = json_lines(&output.stdout);
        insta::assert_json_snapshot!(lines, @r#"
        [
          {
            "info": "Cleared 0 session(s)."
          }
        ]
        "#);
    }

    #[test]
    fn test_session_list_empty_json() {
        let config = TempDir::new().unwrap();

        let output = stow(config.path(), &["session", "list", "--json"]);
        assert!(output.status.success());
        assert!(json_lines(&output.stdout).is_empty());
    }

    #[test]
    fn test_session_resume_missing_json() {
        let config = TempDir::new().unwrap();

        let output = stow(config.path(), &["session", "resume", "Missingx", "--json"]);
        assert_eq!(output.status.code(), Some(5));
        let lines = json_lines(&output.stderr);
        assert_eq!(lines.len(), 1);
        assert!(lines[0]["error"].as_str().unwrap().contains("Missingx"));
        assert!(!config.path().join("session").join("Missingx").exists());
    }

    #[test]
    fn test_quiet_copy_keeps_session_record() {
        let config = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let src = work.path().join("notes.txt");
        let dst = work.path().join("copy.txt");
        std::fs::write(&src, b"hello").unwrap();

        let output = stow(
            config.path(),
            &[
                "cp",
                "-q",
                src.to_str().unwrap(),
                dst.to_str().unwrap(),
            ],
        );
        assert!(output.status.success());
        assert_eq!(std::fs::read(&dst).unwrap(), b"hello");

        let output = stow(config.path(), &["session", "list", "--json"]);
        let lines = json_lines(&output.stdout);
        assert_eq!(lines.len(), 1);
        let session = &lines[0];
        assert_eq!(session["type"], "copy");
        assert_eq!(session["pending"], 0);
        assert_eq!(session["id"].as_str().unwrap().len(), 8);
        assert_eq!(
            session["urls"],
            serde_json::json!([src.to_str().unwrap(), dst.to_str().unwrap()])
        );
    }
}

mod ls_tests {
    use super::*;

    #[test]
    fn test_ls_json_fields() {
        let config = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        std::fs::write(work.path().join("a.txt"), b"12345").unwrap();
        std::fs::create_dir(work.path().join("sub")).unwrap();

        let output = stow(
            config.path(),
            &["ls", "--json", work.path().to_str().unwrap()],
        );
        assert!(output.status.success());

        let lines = json_lines(&output.stdout);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "file");
        assert_eq!(lines[0]["name"], "a.txt");
        assert_eq!(lines[0]["size"], "5 B");
        assert!(lines[0]["last-modified"].is_string());
        assert_eq!(lines[1]["type"], "directory");
        assert_eq!(
            lines[1]["name"],
            format!("sub{}", std::path::MAIN_SEPARATOR)
        );
    }

    #[test]
    fn test_ls_missing_target_exit_code() {
        let config = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let missing = work.path().join("absent");

        let output = stow(
            config.path(),
            &["ls", "--json", missing.to_str().unwrap()],
        );
        assert_eq!(output.status.code(), Some(5));
        assert_eq!(json_lines(&output.stderr).len(), 1);
    }
}
