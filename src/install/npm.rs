//! npm installer

use super::{InstallMode, Installer};
use crate::config::schema::InstallerConfig;
use crate::error::DeplayerResult;
use crate::process::{run_command, CommandSpec};
use async_trait::async_trait;
use std::path::Path;

/// Installer that invokes the npm CLI
#[derive(Debug, Clone)]
pub struct NpmInstaller {
    program: String,
    dev_env: (String, String),
}

impl NpmInstaller {
    pub fn new(config: &InstallerConfig) -> Self {
        Self {
            program: config.program.clone(),
            dev_env: (config.dev_env_var.clone(), config.dev_env_value.clone()),
        }
    }

    /// Arguments for an install in the given mode
    pub fn install_args(mode: &InstallMode) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        match mode {
            InstallMode::Production => args.push("--production".to_string()),
            InstallMode::Package(spec) => {
                args.push("--production".to_string());
                args.push(spec.to_string());
            }
            InstallMode::Development => {}
        }
        args
    }

    fn command(&self, name: &str, dir: &Path, args: Vec<String>) -> CommandSpec {
        CommandSpec::new(name, &self.program)
            .args(args)
            .cwd(dir)
            .user_error()
    }

    fn with_dev_env(&self, spec: CommandSpec) -> CommandSpec {
        spec.env(&self.dev_env.0, &self.dev_env.1)
    }
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self::new(&InstallerConfig::default())
    }
}

#[async_trait]
impl Installer for NpmInstaller {
    async fn install(&self, dir: &Path, mode: &InstallMode) -> DeplayerResult<()> {
        let spec = self.command("npm_install", dir, Self::install_args(mode));
        let spec = match mode {
            InstallMode::Development => self.with_dev_env(spec),
            _ => spec,
        };
        run_command(&spec).await.map(|_| ())
    }

    async fn run_script(&self, dir: &Path, script: &str) -> DeplayerResult<()> {
        let name = format!("npm_run_script_{}", script.replace('-', "_"));
        let args = vec!["run-script".to_string(), script.to_string()];
        let spec = self.with_dev_env(self.command(&name, dir, args));
        run_command(&spec).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "npm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PackageSpec;
    use crate::error::DeplayerError;
    use std::fs;
    use tempfile::TempDir;

    /// Installer whose "npm" is a shell script recording its argv and env
    fn recording_installer(dir: &TempDir, exit_code: i32) -> NpmInstaller {
        let script = dir.path().join("fake-npm");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$* NODE_ENV=$NODE_ENV\" >> \"$(pwd)/calls.log\"\nexit {}\n",
                exit_code
            ),
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }

        NpmInstaller::new(&InstallerConfig {
            program: script.display().to_string(),
            ..InstallerConfig::default()
        })
    }

    #[test]
    fn production_args() {
        assert_eq!(
            NpmInstaller::install_args(&InstallMode::Production),
            vec!["install", "--production"]
        );
    }

    #[test]
    fn package_args_append_scope() {
        let mode = InstallMode::Package(PackageSpec::new("left-pad", "1.0.0"));
        assert_eq!(
            NpmInstaller::install_args(&mode),
            vec!["install", "--production", "left-pad@1.0.0"]
        );
    }

    #[test]
    fn development_args() {
        assert_eq!(
            NpmInstaller::install_args(&InstallMode::Development),
            vec!["install"]
        );
    }

    #[tokio::test]
    async fn dev_marker_only_for_development() {
        let bin = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let npm = recording_installer(&bin, 0);

        npm.install(work.path(), &InstallMode::Production).await.unwrap();
        npm.install(work.path(), &InstallMode::Development).await.unwrap();
        npm.run_script(work.path(), "gcp-build").await.unwrap();

        let log = fs::read_to_string(work.path().join("calls.log")).unwrap();
        let calls: Vec<&str> = log.lines().collect();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("install --production"));
        assert!(!calls[0].contains("NODE_ENV=development"));
        assert_eq!(calls[1], "install NODE_ENV=development");
        assert_eq!(calls[2], "run-script gcp-build NODE_ENV=development");
    }

    #[tokio::test]
    async fn failing_install_is_user_error() {
        let bin = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let npm = recording_installer(&bin, 1);

        let err = npm
            .install(work.path(), &InstallMode::Production)
            .await
            .unwrap_err();

        assert!(err.is_user_error());
        assert!(matches!(err, DeplayerError::Install { ref step, .. } if step == "npm_install"));
    }
}
