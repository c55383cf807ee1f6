use std::path::PathBuf;
use std::process::Command;

use eyre::{bail, Context, Result};

use super::PathSet;

/// Compile and link information of system packages.
pub type PackageInfo = PathSet;

/// Queries the system package database.
pub trait PackageQuery: Send + Sync {
    fn query(&self, packages: &[String]) -> Result<PackageInfo>;
}

/// [`PackageQuery`] backed by the `pkg-config` executable.
#[derive(Clone, Debug)]
pub struct PkgConfig {
    program: PathBuf,
}

impl PkgConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        PkgConfig {
            program: program.into(),
        }
    }

    fn run(&self, option: &str, packages: &[String]) -> Result<String> {
        let output = Command::new(&self.program)
            .arg(option)
            .args(packages)
            .output()
            .wrap_err_with(|| format!("Cannot run `{}`", self.program.to_string_lossy()))?;

        if !output.status.success() {
            bail!(
                "`{} {option} {}` failed: {}",
                self.program.to_string_lossy(),
                packages.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for PkgConfig {
    fn default() -> Self {
        PkgConfig::new(which::which("pkg-config").unwrap_or_else(|_| PathBuf::from("pkg-config")))
    }
}

impl PackageQuery for PkgConfig {
    fn query(&self, packages: &[String]) -> Result<PackageInfo> {
        let mut info = PackageInfo::default();
        if packages.is_empty() {
            return Ok(info);
        }

        info.extend(parse_flags(&self.run("--cflags-only-I", packages)?));
        info.extend(parse_flags(&self.run("--libs-only-L", packages)?));
        info.extend(parse_flags(&self.run("--libs-only-l", packages)?));

        Ok(info)
    }
}

/// Collect `-I`, `-L`, and `-l` flags, other flags are ignored.
fn parse_flags(output: &str) -> PackageInfo {
    let mut info = PackageInfo::default();
    for flag in output.split_whitespace() {
        if let Some(dir) = flag.strip_prefix("-I") {
            info.include_dirs.push(PathBuf::from(dir));
        } else if let Some(dir) = flag.strip_prefix("-L") {
            info.library_dirs.push(PathBuf::from(dir));
        } else if let Some(lib) = flag.strip_prefix("-l") {
            info.libraries.push(lib.to_owned());
        }
    }
    info
}
