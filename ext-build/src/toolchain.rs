use std::{fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::arch::ArchitectureSpec;

/// Host operating system family, selects path resolution and defaults.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn default_host_compiler(&self) -> PathBuf {
        match self {
            Platform::Posix => PathBuf::from("c++"),
            Platform::Windows => PathBuf::from("cl.exe"),
        }
    }

    pub fn default_host_flags(&self) -> Vec<String> {
        let flags: &[&str] = match self {
            Platform::Posix => &["-std=c++17", "-fPIC", "-O3"],
            Platform::Windows => &["/std:c++17"],
        };
        flags.iter().map(|&flag| flag.to_owned()).collect()
    }

    pub fn default_device_flags(&self) -> Vec<String> {
        let flags: &[&str] = match self {
            Platform::Posix => &[
                "-c",
                "-std=c++17",
                "--compiler-options=-fPIC",
                "--ptxas-options=-v",
            ],
            Platform::Windows => &[
                "-c",
                "--compiler-options=/std:c++17",
                "--ptxas-options=-v",
            ],
        };
        flags.iter().map(|&flag| flag.to_owned()).collect()
    }

    pub fn default_python(&self) -> &'static str {
        match self {
            Platform::Posix => "python3",
            Platform::Windows => "python",
        }
    }

    /// File extension of loadable extension modules.
    pub fn module_extension(&self) -> &'static str {
        match self {
            Platform::Posix => "so",
            Platform::Windows => "pyd",
        }
    }

    pub fn object_extension(&self) -> &'static str {
        match self {
            Platform::Posix => "o",
            Platform::Windows => "obj",
        }
    }
}

/// Compiler family a source file is dispatched to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Toolchain {
    Host,
    Device,
}

impl Toolchain {
    /// Extension of device-kernel sources.
    pub const DEVICE_EXTENSION: &'static str = "cu";

    pub fn for_extension(extension: Option<&str>) -> Self {
        match extension {
            Some(Self::DEVICE_EXTENSION) => Toolchain::Device,
            _ => Toolchain::Host,
        }
    }
}

impl Display for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Toolchain::Host => write!(f, "host"),
            Toolchain::Device => write!(f, "device"),
        }
    }
}

/// Compile flags per toolchain. The device flags already carry the
/// architecture flags.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ToolchainConfig {
    host: Vec<String>,
    device: Vec<String>,
}

impl ToolchainConfig {
    pub fn new(host_flags: Vec<String>, device_flags: Vec<String>, archs: &ArchitectureSpec) -> Self {
        let mut device = device_flags;
        device.extend(archs.gencode_flags());
        ToolchainConfig {
            host: host_flags,
            device,
        }
    }

    pub fn flags(&self, toolchain: Toolchain) -> &[String] {
        match toolchain {
            Toolchain::Host => &self.host,
            Toolchain::Device => &self.device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_flags_are_base_plus_arch_flags() {
        let archs: ArchitectureSpec = "75,86".parse().unwrap();
        let base = Platform::Windows.default_device_flags();
        let config = ToolchainConfig::new(vec!["/std:c++17".into()], base.clone(), &archs);

        let mut expected = base;
        expected.extend(archs.gencode_flags());
        assert_eq!(config.flags(Toolchain::Device), expected);
        assert_eq!(config.flags(Toolchain::Host), ["/std:c++17"]);
    }

    #[test]
    fn toolchain_for_extension() {
        assert_eq!(Toolchain::for_extension(Some("cu")), Toolchain::Device);
        assert_eq!(Toolchain::for_extension(Some("cpp")), Toolchain::Host);
        assert_eq!(Toolchain::for_extension(Some("cuh")), Toolchain::Host);
        assert_eq!(Toolchain::for_extension(None), Toolchain::Host);
    }
}
