//! Conversion of binding sources into C++ translation units.

use std::path::{Path, PathBuf};
use std::process::Command;

use eyre::{bail, Context, Result};
use tracing::debug;

use crate::error::BuildError;

/// Language level binding sources are translated with.
pub const LANGUAGE_LEVEL: u8 = 3;

/// Output of preprocessing a single binding source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Preprocessed {
    pub units: Vec<PathBuf>,
    pub language_level: u8,
}

/// Translates binding sources into host-compilable units.
pub trait Preprocessor: Send + Sync {
    fn preprocess(
        &self,
        source: &Path,
        build_dir: &Path,
        include_path: &[PathBuf],
    ) -> Result<Preprocessed, BuildError>;
}

/// Runs the `cython` executable in C++ mode.
pub struct Cython {
    program: PathBuf,
    project_root: PathBuf,
}

impl Cython {
    pub fn new(program: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Cython {
            program: program.into(),
            project_root: project_root.into(),
        }
    }

    /// Generated unit for `source`, mirroring its location in the project.
    pub fn unit_path(&self, source: &Path, build_dir: &Path) -> PathBuf {
        let relative = source.strip_prefix(&self.project_root).unwrap_or(source);
        build_dir.join(relative).with_extension("cpp")
    }
}

impl Preprocessor for Cython {
    fn preprocess(
        &self,
        source: &Path,
        build_dir: &Path,
        include_path: &[PathBuf],
    ) -> Result<Preprocessed, BuildError> {
        let unit = self.unit_path(source, build_dir);
        if let Some(parent) = unit.parent() {
            std::fs::create_dir_all(parent).map_err(|err| BuildError::Preprocess {
                source_file: source.to_owned(),
                message: format!("cannot create `{}`: {err}", parent.to_string_lossy()),
            })?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("-{LANGUAGE_LEVEL}")).arg("--cplus");
        for include in include_path {
            cmd.arg("-I").arg(include);
        }
        cmd.arg("-o").arg(&unit).arg(source);

        debug!("Running {cmd:?}");
        let output = cmd.output().map_err(|err| BuildError::Spawn {
            program: self.program.clone(),
            err,
        })?;

        if !output.status.success() {
            return Err(BuildError::Preprocess {
                source_file: source.to_owned(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(Preprocessed {
            units: vec![unit],
            language_level: LANGUAGE_LEVEL,
        })
    }
}

/// Supplies the header and import-library directories of the binding
/// runtime.
pub trait BindingRuntime: Send + Sync {
    fn include_dirs(&self) -> Result<Vec<PathBuf>>;

    /// Directories holding the interpreter's import libraries. Only MSVC
    /// links need them, the headers request the library by name.
    fn library_dirs(&self) -> Result<Vec<PathBuf>>;
}

/// Asks a Python module for its include directory. The interpreter's own
/// headers are added after it.
pub struct PythonModule {
    python: String,
    module: String,
}

impl PythonModule {
    pub fn new(python: impl Into<String>, module: impl Into<String>) -> Self {
        PythonModule {
            python: python.into(),
            module: module.into(),
        }
    }

    /// Run `script` and return the non-empty lines it prints as paths.
    fn query_paths(&self, script: &str) -> Result<Vec<PathBuf>> {
        let output = Command::new(&self.python)
            .arg("-c")
            .arg(script)
            .output()
            .wrap_err_with(|| format!("Cannot run `{}`", self.python))?;

        if !output.status.success() {
            bail!(
                "Cannot query Python module `{}`: {}",
                self.module,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

impl BindingRuntime for PythonModule {
    fn include_dirs(&self) -> Result<Vec<PathBuf>> {
        let module = &self.module;
        self.query_paths(&format!(
            "import {module}, sysconfig; print({module}.get_include()); print(sysconfig.get_paths()['include'])"
        ))
    }

    fn library_dirs(&self) -> Result<Vec<PathBuf>> {
        self.query_paths("import os, sys; print(os.path.join(sys.base_exec_prefix, 'libs'))")
    }
}

/// Runtime directories given in the configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FixedRuntime {
    pub include_dir: PathBuf,
    pub library_dir: Option<PathBuf>,
}

impl BindingRuntime for FixedRuntime {
    fn include_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(vec![self.include_dir.clone()])
    }

    fn library_dirs(&self) -> Result<Vec<PathBuf>> {
        Ok(self.library_dir.iter().cloned().collect())
    }
}
