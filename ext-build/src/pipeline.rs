//! Compiling and linking assembled targets.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use rayon::prelude::*;
use tracing::info;

use crate::driver::Driver;
use crate::error::BuildError;
use crate::target::BuildTarget;
use crate::toolchain::{Platform, Toolchain};

/// A link of all objects of one target.
#[derive(Debug)]
pub struct LinkRequest<'a> {
    pub objects: &'a [PathBuf],
    pub output: &'a Path,
    pub library_dirs: &'a [PathBuf],
    pub libraries: &'a [String],
    pub runtime_library_dirs: &'a [PathBuf],
}

/// Links object files into a loadable module.
pub trait LinkStep: Send + Sync {
    fn link(&self, request: &LinkRequest<'_>) -> Result<(), BuildError>;
}

/// Where objects and modules are written.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub platform: Platform,
}

impl OutputLayout {
    pub fn temp_dir(&self) -> PathBuf {
        self.build_dir.join("temp")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.build_dir.join("lib")
    }

    /// Object file for `source`. Objects are kept per target, since device
    /// sources are compiled once for every target.
    pub fn object_path(&self, target: &BuildTarget, source: &Path) -> PathBuf {
        let relative = source
            .strip_prefix(&self.build_dir)
            .or_else(|_| source.strip_prefix(&self.root))
            .unwrap_or_else(|_| Path::new(source.file_name().unwrap_or(source.as_os_str())));

        let mut object = self.temp_dir().join(target.name()).join(relative);
        let mut file_name = object.file_name().unwrap_or_default().to_owned();
        file_name.push(".");
        file_name.push(self.platform.object_extension());
        object.set_file_name(file_name);
        object
    }

    pub fn module_path(&self, target: &BuildTarget) -> PathBuf {
        self.lib_dir()
            .join(target.module_path(self.platform.module_extension()))
    }
}

/// Compile every source of `target` and link the module.
///
/// Device sources are compiled before the generated host units; the link
/// only starts once every object exists.
pub fn build_target(
    target: &BuildTarget,
    driver: &Driver<'_>,
    linker: &dyn LinkStep,
    outputs: &OutputLayout,
) -> Result<PathBuf, BuildError> {
    let (device, host): (Vec<&Path>, Vec<&Path>) = target.sources().partition(|source| {
        Toolchain::for_extension(source.extension().and_then(|ext| ext.to_str()))
            == Toolchain::Device
    });

    let mut objects = Vec::with_capacity(device.len() + host.len());
    for group in [device, host] {
        let compiled = group
            .into_par_iter()
            .map(|source| {
                let object = outputs.object_path(target, source);
                driver.compile(target, source, &object).map(|()| object)
            })
            .collect::<Result<Vec<_>, _>>()?;
        objects.extend(compiled);
    }

    let output = outputs.module_path(target);
    linker.link(&LinkRequest {
        objects: &objects,
        output: &output,
        library_dirs: target.library_dirs(),
        libraries: target.libraries(),
        runtime_library_dirs: target.runtime_library_dirs(),
    })?;

    info!("Built {} -> {}", target.name(), output.to_string_lossy());
    Ok(output)
}

/// Build all targets in parallel. The first failure aborts the build.
///
/// `jobs` bounds the number of worker threads, all cores are used when
/// it is `None`.
pub fn build_all(
    targets: &[BuildTarget],
    driver: &Driver<'_>,
    linker: &dyn LinkStep,
    outputs: &OutputLayout,
    jobs: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .wrap_err("Cannot create build thread pool")?;

    let modules = pool.install(|| {
        targets
            .par_iter()
            .map(|target| build_target(target, driver, linker, outputs))
            .collect::<Result<Vec<_>, _>>()
    })?;

    Ok(modules)
}
