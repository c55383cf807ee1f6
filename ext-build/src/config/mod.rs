use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use eyre::{bail, ensure, Context, Result};

mod file;

use crate::toolchain::Platform;

pub const DEFAULT_BUILD_DIR: &str = "build";
pub const DEVICE_SOURCE_DIR: &str = "cuda";

/// A project as described by its `build.toml`.
#[derive(Clone, Debug)]
pub struct Project {
    /// Directory containing `build.toml`.
    pub root: PathBuf,
    pub general: General,
    pub toolchain: Toolchain,
    pub media: Media,
    pub binding: Binding,
}

impl Project {
    pub fn from_file(build_toml: impl AsRef<Path>) -> Result<Self> {
        let build_toml = build_toml.as_ref();

        let mut toml_data = String::new();
        File::open(build_toml)
            .wrap_err_with(|| format!("Cannot open {} for reading", build_toml.to_string_lossy()))?
            .read_to_string(&mut toml_data)
            .wrap_err_with(|| format!("Cannot read from {}", build_toml.to_string_lossy()))?;

        let absolute = std::path::absolute(build_toml)?;
        let root = match absolute.parent() {
            Some(parent) => parent.to_owned(),
            None => bail!(
                "Cannot get parent path of `{}`",
                build_toml.to_string_lossy()
            ),
        };

        Self::from_toml(&toml_data, root, Platform::current())
            .wrap_err_with(|| format!("Invalid configuration in {}", build_toml.to_string_lossy()))
    }

    pub fn from_toml(toml_data: &str, root: impl Into<PathBuf>, platform: Platform) -> Result<Self> {
        let build: file::Build = toml::from_str(toml_data).wrap_err("Cannot parse TOML")?;
        Self::from_build(build, root.into(), platform)
    }

    fn from_build(build: file::Build, root: PathBuf, platform: Platform) -> Result<Self> {
        let name = build.general.name;
        ensure!(!name.trim().is_empty(), "`general.name` must not be empty");
        ensure!(
            Path::new(&name).components().count() == 1,
            "`general.name` must be a single directory name: {name}"
        );

        let toolchain = build.toolchain.unwrap_or_default();

        Ok(Project {
            root,
            general: General {
                name,
                build_dir: build
                    .general
                    .build_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR)),
            },
            toolchain: Toolchain {
                host_compiler: toolchain
                    .host_compiler
                    .unwrap_or_else(|| platform.default_host_compiler()),
                host_flags: toolchain
                    .host_flags
                    .unwrap_or_else(|| platform.default_host_flags()),
                device_flags: toolchain
                    .device_flags
                    .unwrap_or_else(|| platform.default_device_flags()),
            },
            media: Media {
                packages: build.media.pkg_config.unwrap_or_else(|| {
                    vec!["libavcodec".to_owned(), "libavutil".to_owned()]
                }),
                libraries: build
                    .media
                    .libraries
                    .unwrap_or_else(|| vec!["avcodec".to_owned(), "avutil".to_owned()]),
                windows: build.media.windows.map(|windows| WindowsMediaDirs {
                    include_dir: windows.include_dir,
                    lib_dir: windows.lib_dir,
                }),
            },
            binding: Binding {
                python: build
                    .binding
                    .python
                    .unwrap_or_else(|| platform.default_python().to_owned()),
                module: build.binding.module.unwrap_or_else(|| "av".to_owned()),
                include: build.binding.include,
                library_dir: build.binding.library_dir,
                preprocessor: build
                    .binding
                    .preprocessor
                    .unwrap_or_else(|| PathBuf::from("cython")),
            },
        })
    }

    /// Directory holding the binding sources.
    pub fn package_dir(&self) -> PathBuf {
        self.root.join(&self.general.name)
    }

    /// Directory holding the device-kernel sources.
    pub fn device_dir(&self) -> PathBuf {
        self.package_dir().join(DEVICE_SOURCE_DIR)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.general.build_dir)
    }
}

#[derive(Clone, Debug)]
pub struct General {
    /// Name of the package, which is also its directory.
    pub name: String,
    pub build_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct Toolchain {
    pub host_compiler: PathBuf,
    pub host_flags: Vec<String>,
    pub device_flags: Vec<String>,
}

/// Media-codec SDK settings.
#[derive(Clone, Debug)]
pub struct Media {
    /// `pkg-config` packages queried on POSIX systems.
    pub packages: Vec<String>,
    /// Libraries linked on Windows.
    pub libraries: Vec<String>,
    pub windows: Option<WindowsMediaDirs>,
}

/// Manually configured SDK directories, Windows has no package query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WindowsMediaDirs {
    pub include_dir: PathBuf,
    pub lib_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub python: String,
    /// Python module providing the binding runtime headers.
    pub module: String,
    /// Explicit runtime include directory, skips querying Python.
    pub include: Option<PathBuf>,
    /// Interpreter import-library directory used with `include`.
    pub library_dir: Option<PathBuf>,
    pub preprocessor: PathBuf,
}
