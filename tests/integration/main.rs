//! Integration tests for docker-image-cache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Binary with the runner environment stripped so the host CI cannot leak in
    fn image_cache() -> Command {
        let mut cmd = cargo_bin_cmd!("docker-image-cache");
        for var in [
            "GITHUB_STATE",
            "GITHUB_OUTPUT",
            "ACTIONS_RESULTS_URL",
            "ACTIONS_RUNTIME_TOKEN",
            "RUNNER_DEBUG",
            "DOCKER_IMAGE_CACHE_DIR",
            "DOCKER_IMAGE_CACHE_ARCHIVE",
            "INPUT_KEY",
            "INPUT_READ-ONLY",
            "STATE_cache-hit",
            "STATE_docker-images-list",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    #[test]
    fn help_displays() {
        image_cache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache Docker images"));
    }

    #[test]
    fn version_displays() {
        image_cache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("docker-image-cache"));
    }

    #[test]
    fn unknown_command_fails() {
        image_cache().arg("prune").assert().failure();
    }

    #[test]
    fn load_requires_key() {
        let cache = TempDir::new().unwrap();

        image_cache()
            .arg("load")
            .arg("--cache-dir")
            .arg(cache.path())
            .assert()
            .failure()
            .stdout(predicate::str::contains(
                "::error::Failed to load Docker images: Input required and not supplied: key",
            ));
    }

    #[test]
    fn save_requires_key() {
        let cache = TempDir::new().unwrap();

        image_cache()
            .arg("save")
            .arg("--cache-dir")
            .arg(cache.path())
            .assert()
            .failure()
            .stdout(predicate::str::contains(
                "Failed to save Docker images: Input required and not supplied: key",
            ));
    }

    #[test]
    fn save_skips_after_cache_hit() {
        let cache = TempDir::new().unwrap();

        image_cache()
            .arg("save")
            .arg("--cache-dir")
            .arg(cache.path())
            .env("INPUT_KEY", "images-v1")
            .env("STATE_cache-hit", "true")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Cache hit on key images-v1, skipping cache save.",
            ));
    }

    #[test]
    fn save_skips_in_read_only_mode() {
        let cache = TempDir::new().unwrap();

        image_cache()
            .arg("save")
            .arg("--cache-dir")
            .arg(cache.path())
            .env("INPUT_KEY", "images-v1")
            .env("STATE_cache-hit", "false")
            .env("INPUT_READ-ONLY", "true")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "skipping cache save due to read-only mode",
            ));
    }

    #[test]
    fn load_without_backend_fails() {
        image_cache()
            .arg("load")
            .env("INPUT_KEY", "images-v1")
            .assert()
            .failure()
            .stdout(predicate::str::contains("Cache service is unavailable"));
    }
}

#[cfg(unix)]
mod workflow_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const FAKE_DOCKER: &str = r#"#!/bin/sh
case "$1" in
  image) cat "$FAKE_DOCKER_IMAGES" ;;
  save) echo "$@" >> "$FAKE_DOCKER_LOG"; printf 'image-layers' > "$3" ;;
  load) echo "$@" >> "$FAKE_DOCKER_LOG" ;;
  *) exit 1 ;;
esac
"#;

    /// A job workspace with a fake `docker` on PATH and runner env files
    struct Job {
        dir: TempDir,
    }

    impl Job {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let bin = dir.path().join("bin");
            fs::create_dir(&bin).unwrap();

            let docker = bin.join("docker");
            fs::write(&docker, FAKE_DOCKER).unwrap();
            fs::set_permissions(&docker, fs::Permissions::from_mode(0o755)).unwrap();

            fs::create_dir(dir.path().join("cache")).unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn set_images(&self, images: &str) {
            fs::write(self.path("images.txt"), images).unwrap();
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.path(name)).unwrap_or_default()
        }

        fn command(&self, phase: &str) -> Command {
            self.command_with_archive(phase, &self.path("docker-images.tar"))
        }

        fn command_with_archive(&self, phase: &str, archive: &Path) -> Command {
            let path = format!(
                "{}:{}",
                self.path("bin").display(),
                std::env::var("PATH").unwrap_or_default()
            );

            let mut cmd = cargo_bin_cmd!("docker-image-cache");
            cmd.arg(phase)
                .arg("--cache-dir")
                .arg(self.path("cache"))
                .arg("--archive-path")
                .arg(archive)
                .current_dir(self.dir.path())
                .env("PATH", path)
                .env("SHELL", "/bin/sh")
                .env("FAKE_DOCKER_IMAGES", self.path("images.txt"))
                .env("FAKE_DOCKER_LOG", self.path("docker.log"))
                .env("GITHUB_STATE", self.path("state"))
                .env("GITHUB_OUTPUT", self.path("output"))
                .env("INPUT_KEY", "images-v1")
                .env_remove("INPUT_READ-ONLY")
                .env_remove("STATE_cache-hit")
                .env_remove("STATE_docker-images-list")
                .env_remove("RUNNER_DEBUG");
            cmd
        }
    }

    fn has_entries(dir: &Path) -> bool {
        fs::read_dir(dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    #[test]
    fn miss_then_save_then_hit() {
        let job = Job::new();

        // First run: nothing cached, record the preinstalled images
        job.set_images("ubuntu:22.04\nnode:20\n");
        job.command("load")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache miss"));

        let state = job.read("state");
        assert!(state.contains("cache-hit<<ghadelimiter_"));
        assert!(state.contains("docker-images-list<<ghadelimiter_"));
        assert!(state.contains("ubuntu:22.04\nnode:20"));
        assert!(job.read("output").contains("cache-hit<<ghadelimiter_"));

        // The job builds one image; save only that one
        job.set_images("ubuntu:22.04\nnode:20\napp:latest\n");
        job.command("save")
            .env("STATE_cache-hit", "false")
            .env("STATE_docker-images-list", "ubuntu:22.04\nnode:20")
            .assert()
            .success()
            .stdout(predicate::str::contains("Saving 1 new Docker images"));

        let log = job.read("docker.log");
        assert!(log.contains("save --output"));
        assert!(log.contains("app:latest"));
        assert!(!log.contains("node:20"));
        assert!(has_entries(&job.path("cache")));

        // Next run: exact key restored, images loaded from the archive
        fs::remove_file(job.path("docker-images.tar")).unwrap();
        fs::remove_file(job.path("output")).unwrap();
        job.command("load")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache hit: Restoring Docker images"));

        assert_eq!(job.read("docker-images.tar"), "image-layers");
        assert!(job.read("docker.log").contains("load --input"));
        assert!(job.read("output").contains("\ntrue\n"));
    }

    #[test]
    fn save_without_new_images_uploads_nothing() {
        let job = Job::new();
        job.set_images("ubuntu:22.04\n");

        job.command("save")
            .env("STATE_docker-images-list", "ubuntu:22.04")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "No new Docker images detected. Skipping cache save.",
            ));

        assert!(!has_entries(&job.path("cache")));
        assert!(job.read("docker.log").is_empty());
    }

    #[test]
    fn failing_docker_fails_the_job() {
        let job = Job::new();
        // No images file: `cat` fails, so listing images fails
        job.command("load")
            .assert()
            .failure()
            .stdout(predicate::str::contains("::error::Command execution failed"));

        // The phase still completes and records an empty baseline
        assert!(job.read("state").contains("docker-images-list<<ghadelimiter_"));
    }

    #[test]
    fn relative_archive_path_restores_into_working_directory() {
        let job = Job::new();
        let archive = Path::new("images.tar");

        job.set_images("app:latest
");
        job.command_with_archive("save", archive)
            .env("STATE_cache-hit", "false")
            .assert()
            .success();
        assert_eq!(job.read("images.tar"), "image-layers");

        fs::remove_file(job.path("images.tar")).unwrap();
        job.command_with_archive("load", archive)
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache hit: Restoring Docker images"));

        assert_eq!(job.read("images.tar"), "image-layers");
        assert!(job
            .read("docker.log")
            .contains(&format!("load --input {}", job.path("images.tar").display())));
    }
}
