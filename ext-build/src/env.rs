//! Build settings read from the process environment.

use std::path::{Path, PathBuf};

use crate::arch::{ArchitectureSpec, DEFAULT_ARCH_LIST};
use crate::toolchain::Platform;

pub const GPU_HOME_VAR: &str = "GPU_HOME";
pub const GPU_PATH_VAR: &str = "GPU_PATH";
pub const GPU_ARCH_LIST_VAR: &str = "GPU_ARCH_LIST";

/// Root of an installed GPU SDK.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GpuSdk {
    root: PathBuf,
}

impl GpuSdk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GpuSdk { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn include_dir(&self) -> PathBuf {
        self.root.join("include")
    }

    /// The device compiler shipped with the SDK for `platform`.
    pub fn nvcc(&self, platform: Platform) -> PathBuf {
        let nvcc = match platform {
            Platform::Posix => "nvcc",
            Platform::Windows => "nvcc.exe",
        };
        self.root.join("bin").join(nvcc)
    }
}

#[derive(Clone, Debug)]
pub struct BuildEnv {
    pub gpu: Option<GpuSdk>,
    pub archs: ArchitectureSpec,
}

impl BuildEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through `lookup`, which returns the value of an
    /// environment variable when it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let gpu = non_empty(GPU_HOME_VAR)
            .or_else(|| non_empty(GPU_PATH_VAR))
            .map(GpuSdk::new);

        let archs: ArchitectureSpec = lookup(GPU_ARCH_LIST_VAR)
            .unwrap_or_else(|| DEFAULT_ARCH_LIST.to_owned())
            .parse()
            .unwrap_or_default();

        BuildEnv { gpu, archs }
    }
}
