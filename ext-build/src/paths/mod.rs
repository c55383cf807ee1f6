//! Include and library search paths for a target.

use std::path::PathBuf;

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

use crate::config::Media;
use crate::env::GpuSdk;
use crate::toolchain::Platform;

mod pkg_config;
pub use pkg_config::{PackageInfo, PackageQuery, PkgConfig};

mod posix;
pub use posix::PosixResolver;

mod windows;
pub use windows::WindowsResolver;

/// Search paths and libraries required to compile and link a target.
///
/// Entries are only ever appended, so later directories are searched
/// after earlier ones.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathSet {
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    /// Directories embedded in the module for the loader to search at
    /// import time. Only used on POSIX.
    pub runtime_library_dirs: Vec<PathBuf>,
}

impl PathSet {
    pub fn extend(&mut self, other: PathSet) {
        self.include_dirs.extend(other.include_dirs);
        self.library_dirs.extend(other.library_dirs);
        self.libraries.extend(other.libraries);
        self.runtime_library_dirs.extend(other.runtime_library_dirs);
    }
}

/// Resolves the [`PathSet`] for the host platform.
///
/// Resolution does not fail: missing SDKs leave their entries out and the
/// compiler reports what it cannot find.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, gpu: Option<&GpuSdk>) -> PathSet;
}

/// Select the resolver for `platform`.
pub fn resolver_for(platform: Platform, media: &Media) -> Result<Box<dyn PathResolver>> {
    match platform {
        Platform::Posix => Ok(Box::new(PosixResolver::new(
            PkgConfig::default(),
            media.packages.clone(),
        ))),
        Platform::Windows => {
            let dirs = media.windows.clone().ok_or_else(|| {
                eyre!("Windows builds need `[media.windows]` with `include-dir` and `lib-dir`")
            })?;
            Ok(Box::new(WindowsResolver::new(dirs, media.libraries.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowsMediaDirs;

    fn media(windows: Option<WindowsMediaDirs>) -> Media {
        Media {
            packages: vec!["libavcodec".into()],
            libraries: vec!["avcodec".into()],
            windows,
        }
    }

    #[test]
    fn windows_needs_explicit_media_dirs() {
        assert!(resolver_for(Platform::Windows, &media(None)).is_err());

        let dirs = WindowsMediaDirs {
            include_dir: PathBuf::from(r"C:\ffmpeg\include"),
            lib_dir: PathBuf::from(r"C:\ffmpeg\lib"),
        };
        let resolver = resolver_for(Platform::Windows, &media(Some(dirs))).unwrap();
        let paths = resolver.resolve(None);
        assert_eq!(paths.include_dirs, [PathBuf::from(r"C:\ffmpeg\include")]);
        assert_eq!(paths.libraries, ["avcodec"]);
    }

    #[test]
    fn posix_does_not_need_media_dirs() {
        assert!(resolver_for(Platform::Posix, &media(None)).is_ok());
    }
}
