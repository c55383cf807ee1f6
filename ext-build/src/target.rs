//! Discovery of sources and assembly of extension targets.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use eyre::{bail, ensure, eyre, Context, Result};
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::Project;
use crate::paths::PathSet;
use crate::preprocess::Preprocessor;
use crate::toolchain::{Toolchain, ToolchainConfig};

pub const BINDING_EXTENSION: &str = "pyx";

/// One extension module to compile and link.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildTarget {
    name: String,
    binding_source: PathBuf,
    units: Vec<PathBuf>,
    language_level: u8,
    device_sources: Arc<[PathBuf]>,
    include_dirs: Vec<PathBuf>,
    library_dirs: Vec<PathBuf>,
    libraries: Vec<String>,
    runtime_library_dirs: Vec<PathBuf>,
    flags: Arc<ToolchainConfig>,
}

impl BuildTarget {
    /// Dotted module name, e.g. `avcuda.codec.decode`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding_source(&self) -> &Path {
        &self.binding_source
    }

    /// Translation units generated from the binding source.
    pub fn units(&self) -> &[PathBuf] {
        &self.units
    }

    pub fn language_level(&self) -> u8 {
        self.language_level
    }

    /// Device sources, shared by all targets of a build.
    pub fn device_sources(&self) -> &Arc<[PathBuf]> {
        &self.device_sources
    }

    /// Every source to compile, device sources first.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.device_sources
            .iter()
            .chain(self.units.iter())
            .map(PathBuf::as_path)
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn library_dirs(&self) -> &[PathBuf] {
        &self.library_dirs
    }

    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    /// Library directories searched by the loader when the module is
    /// imported.
    pub fn runtime_library_dirs(&self) -> &[PathBuf] {
        &self.runtime_library_dirs
    }

    pub fn flags(&self) -> &ToolchainConfig {
        &self.flags
    }

    /// Path of the module relative to the output directory.
    pub fn module_path(&self, extension: &str) -> PathBuf {
        let mut path: PathBuf = self.name.split('.').collect();
        path.set_extension(extension);
        path
    }
}

/// Source tree layout of a project.
#[derive(Clone, Debug)]
pub struct SourceLayout {
    pub root: PathBuf,
    pub package_dir: PathBuf,
    pub device_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl From<&Project> for SourceLayout {
    fn from(project: &Project) -> Self {
        SourceLayout {
            root: project.root.clone(),
            package_dir: project.package_dir(),
            device_dir: project.device_dir(),
            build_dir: project.build_dir(),
        }
    }
}

/// Parameters shared by every target of a build.
#[derive(Clone, Debug)]
pub struct SharedParams {
    pub paths: PathSet,
    pub runtime_includes: Vec<PathBuf>,
    /// Library directories of the binding runtime, searched after the
    /// resolved ones.
    pub binding_library_dirs: Vec<PathBuf>,
    pub flags: Arc<ToolchainConfig>,
}

/// Recursively find files with `extension` below `dir`.
pub fn discover_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.wrap_err_with(|| format!("Cannot walk `{}`", dir.to_string_lossy()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            sources.push(path.to_owned());
        }
    }
    Ok(sources)
}

/// Dotted module name of `source` relative to `root`.
pub fn module_name(root: &Path, source: &Path) -> Result<String> {
    let relative = source.strip_prefix(root).wrap_err_with(|| {
        format!(
            "`{}` is not inside `{}`",
            source.to_string_lossy(),
            root.to_string_lossy()
        )
    })?;

    let stem = relative.with_extension("");
    stem.components()
        .map(|component| match component {
            Component::Normal(part) => part
                .to_str()
                .ok_or_else(|| eyre!("Module path is not UTF-8: {}", source.to_string_lossy())),
            _ => bail!("Unexpected component in module path: {}", source.to_string_lossy()),
        })
        .process_results(|mut parts| parts.join("."))
}

/// Build one target per binding source found in the package directory.
pub fn assemble_targets(
    layout: &SourceLayout,
    preprocessor: &dyn Preprocessor,
    shared: &SharedParams,
) -> Result<Vec<BuildTarget>> {
    ensure!(
        layout.package_dir.is_dir(),
        "Package directory `{}` does not exist",
        layout.package_dir.to_string_lossy()
    );

    let device_sources: Arc<[PathBuf]> = if layout.device_dir.is_dir() {
        discover_sources(&layout.device_dir, Toolchain::DEVICE_EXTENSION)?.into()
    } else {
        Arc::from(Vec::new())
    };
    debug!("Found {} device source(s)", device_sources.len());

    let mut include_dirs = vec![layout.package_dir.clone()];
    include_dirs.extend(shared.runtime_includes.iter().cloned());
    include_dirs.extend(shared.paths.include_dirs.iter().cloned());

    let mut library_dirs = shared.paths.library_dirs.clone();
    library_dirs.extend(shared.binding_library_dirs.iter().cloned());

    let mut names = HashSet::new();
    let mut targets = Vec::new();
    for binding_source in discover_sources(&layout.package_dir, BINDING_EXTENSION)? {
        let name = module_name(&layout.root, &binding_source)?;
        ensure!(names.insert(name.clone()), "Duplicate module name: {name}");

        let preprocessed = preprocessor
            .preprocess(&binding_source, &layout.build_dir, &shared.runtime_includes)
            .wrap_err_with(|| format!("Cannot preprocess module {name}"))?;

        info!(
            "Target {name}: {} unit(s), {} device source(s)",
            preprocessed.units.len(),
            device_sources.len()
        );

        targets.push(BuildTarget {
            name,
            binding_source,
            units: preprocessed.units,
            language_level: preprocessed.language_level,
            device_sources: Arc::clone(&device_sources),
            include_dirs: include_dirs.clone(),
            library_dirs: library_dirs.clone(),
            libraries: shared.paths.libraries.clone(),
            runtime_library_dirs: shared.paths.runtime_library_dirs.clone(),
            flags: Arc::clone(&shared.flags),
        });
    }

    Ok(targets)
}
