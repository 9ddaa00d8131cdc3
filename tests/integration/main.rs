//! Integration tests for Deplayer

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn deplayer() -> Command {
        cargo_bin_cmd!("deplayer")
    }

    /// Scratch workspace with its own config, cache and build context
    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let ws = Self {
                dir: TempDir::new().unwrap(),
            };
            fs::create_dir_all(ws.context()).unwrap();
            fs::write(
                ws.context().join("package.json"),
                r#"{"name":"app","dependencies":{"left-pad":"1.0.0"}}"#,
            )
            .unwrap();
            ws.write_config("");
            ws
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn context(&self) -> PathBuf {
            self.path("app")
        }

        fn config_path(&self) -> PathBuf {
            self.path("config.toml")
        }

        fn write_config(&self, extra: &str) {
            let config = format!(
                "[layer]\ndestination_path = '{}'\n\n[archive]\nscratch_dir = '{}'\n\n[cache]\ndir = '{}'\n\n{}",
                self.path("srv").display(),
                self.path("scratch").display(),
                self.path("cache").display(),
                extra
            );
            fs::write(self.config_path(), config).unwrap();
        }

        fn cmd(&self) -> Command {
            let mut cmd = deplayer();
            cmd.env("DEPLAYER_CONFIG", self.config_path());
            cmd
        }
    }

    #[cfg(unix)]
    fn fake_npm(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-npm");
        fs::write(
            &path,
            "#!/bin/sh\nmkdir -p node_modules/left-pad\necho 'module.exports = 1;' > node_modules/left-pad/index.js\n",
        )
        .unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        deplayer()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached dependency layers"));
    }

    #[test]
    fn version_displays() {
        deplayer()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("deplayer"));
    }

    #[test]
    fn config_path_honors_env() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[staging]"))
            .stdout(predicate::str::contains("gcp-build"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        deplayer()
            .env("DEPLAYER_CONFIG", &path)
            .args(["config", "init"])
            .assert()
            .success();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("destination_path"));
    }

    #[test]
    fn invalid_config_is_internal_error() {
        let ws = Workspace::new();
        fs::write(ws.config_path(), "[layer\n").unwrap();

        ws.cmd().args(["config", "show"]).assert().code(2);
    }

    #[test]
    fn cache_list_empty() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached layers found"));
    }

    #[test]
    fn cache_gc_empty() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["cache", "gc", "--days", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached layers older than 1 days"));
    }

    #[test]
    fn key_is_stable_hex() {
        let ws = Workspace::new();
        let run = || {
            let out = ws
                .cmd()
                .args(["key", "--context"])
                .arg(ws.context())
                .output()
                .unwrap();
            assert!(out.status.success());
            String::from_utf8(out.stdout).unwrap().trim().to_string()
        };

        let first = run();
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(first, run());
    }

    #[test]
    fn key_depends_on_destination() {
        let ws = Workspace::new();
        let key_for = |dest: &str| {
            let out = ws
                .cmd()
                .args(["key", "--destination", dest, "--context"])
                .arg(ws.context())
                .output()
                .unwrap();
            String::from_utf8(out.stdout).unwrap()
        };

        assert_ne!(key_for("/srv"), key_for("/app"));
    }

    #[test]
    fn key_missing_descriptor_is_user_error() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["key", "-d", "package-lock.json", "--context"])
            .arg(ws.context())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("package-lock.json"));
    }

    #[test]
    fn build_missing_context_fails() {
        let ws = Workspace::new();
        ws.cmd()
            .args(["build", "--context"])
            .arg(ws.path("nope"))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Error:"));
    }

    #[cfg(unix)]
    #[test]
    fn build_then_reuse() {
        let ws = Workspace::new();
        let npm = fake_npm(ws.dir.path());
        ws.write_config(&format!("[installer]\nprogram = '{}'\n", npm.display()));

        let build = |out: &str| {
            ws.cmd()
                .args(["build", "--context"])
                .arg(ws.context())
                .arg("--output")
                .arg(ws.path(out))
                .assert()
                .success()
        };

        build("out1").stdout(predicate::str::contains("Built layer"));
        assert!(ws.path("out1/image.json").exists());
        assert!(ws.path("out1/layer-0.tar.gz").exists());
        assert!(ws.path("srv/node_modules/left-pad/index.js").exists());

        build("out2").stdout(predicate::str::contains("Reused cached layer"));
        assert_eq!(
            fs::read(ws.path("out1/layer-0.tar.gz")).unwrap(),
            fs::read(ws.path("out2/layer-0.tar.gz")).unwrap()
        );

        ws.cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_match("^[0-9a-f]{64}\n$").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn build_no_cache_skips_store() {
        let ws = Workspace::new();
        let npm = fake_npm(ws.dir.path());
        ws.write_config(&format!("[installer]\nprogram = '{}'\n", npm.display()));

        ws.cmd()
            .args(["build", "--no-cache", "--context"])
            .arg(ws.context())
            .arg("--output")
            .arg(ws.path("out"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Built layer"));

        assert!(!ws.path("cache").exists());
    }
}
