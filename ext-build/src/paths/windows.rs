use super::{PathResolver, PathSet};
use crate::config::WindowsMediaDirs;
use crate::env::GpuSdk;

/// GPU image-processing and runtime libraries linked on Windows.
pub const WINDOWS_GPU_LIBRARIES: [&str; 8] = [
    "nppicc", "cudart", "nppif", "nppc", "nppig", "nppim", "nppist", "nppisu",
];

/// Resolves media-codec paths from manually configured directories.
///
/// The directories are not checked, a missing SDK surfaces as a compiler
/// error.
pub struct WindowsResolver {
    media: WindowsMediaDirs,
    libraries: Vec<String>,
}

impl WindowsResolver {
    pub fn new(media: WindowsMediaDirs, libraries: Vec<String>) -> Self {
        WindowsResolver { media, libraries }
    }
}

impl PathResolver for WindowsResolver {
    fn resolve(&self, gpu: Option<&GpuSdk>) -> PathSet {
        let mut paths = PathSet {
            include_dirs: vec![self.media.include_dir.clone()],
            library_dirs: vec![self.media.lib_dir.clone()],
            libraries: self.libraries.clone(),
            // The loader finds DLLs through PATH, nothing is embedded.
            runtime_library_dirs: Vec::new(),
        };

        if let Some(gpu) = gpu {
            paths.include_dirs.push(gpu.include_dir());
            paths.library_dirs.push(gpu.root().join("lib").join("x64"));
            paths
                .libraries
                .extend(WINDOWS_GPU_LIBRARIES.iter().map(|&lib| lib.to_owned()));
        }

        paths
    }
}
