use tracing::warn;

use super::{PackageQuery, PathResolver, PathSet};
use crate::env::GpuSdk;

/// GPU libraries linked on POSIX systems: device linkage, then runtime.
pub const POSIX_GPU_LIBRARIES: [&str; 2] = ["cudadevrt", "cudart"];

/// Resolves media-codec paths through a package query.
pub struct PosixResolver<Q> {
    query: Q,
    packages: Vec<String>,
}

impl<Q: PackageQuery> PosixResolver<Q> {
    pub fn new(query: Q, packages: Vec<String>) -> Self {
        PosixResolver { query, packages }
    }
}

impl<Q: PackageQuery> PathResolver for PosixResolver<Q> {
    fn resolve(&self, gpu: Option<&GpuSdk>) -> PathSet {
        let mut paths = PathSet::default();

        match self.query.query(&self.packages) {
            Ok(info) => paths.extend(info),
            Err(err) => warn!(
                "Cannot query media packages {}: {err:#}",
                self.packages.join(", ")
            ),
        }

        if let Some(gpu) = gpu {
            paths.include_dirs.push(gpu.include_dir());
            let lib_dir = gpu.root().join("lib64");
            paths.library_dirs.push(lib_dir.clone());
            paths.runtime_library_dirs.push(lib_dir);
            paths
                .libraries
                .extend(POSIX_GPU_LIBRARIES.iter().map(|&lib| lib.to_owned()));
        }

        paths
    }
}
