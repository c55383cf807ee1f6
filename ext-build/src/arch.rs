use std::{fmt::Display, str::FromStr};

use itertools::Itertools;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Architecture for which intermediate (PTX) code is always embedded, so
/// that modules can be JIT-compiled on GPUs newer than the listed ones.
pub const FALLBACK_ARCH: &str = "86";

/// Default value of `GPU_ARCH_LIST`.
pub const DEFAULT_ARCH_LIST: &str = "75,86";

/// Ordered list of GPU architecture identifiers (compute capabilities).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ArchitectureSpec(Vec<String>);

impl ArchitectureSpec {
    pub fn new(archs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ArchitectureSpec(archs.into_iter().map(Into::into).collect())
    }

    pub fn archs(&self) -> &[String] {
        &self.0
    }

    /// `nvcc` flags for the architectures, followed by the PTX fallback.
    ///
    /// Identifiers are not validated, the device compiler reports
    /// malformed ones.
    pub fn gencode_flags(&self) -> Vec<String> {
        let mut flags = Vec::with_capacity(2 * self.0.len() + 2);
        for arch in &self.0 {
            flags.push("-gencode".to_owned());
            flags.push(format!("arch=compute_{arch},code=sm_{arch}"));
        }
        flags.push("-gencode".to_owned());
        flags.push(format!(
            "arch=compute_{FALLBACK_ARCH},code=compute_{FALLBACK_ARCH}"
        ));
        flags
    }
}

/// Parses a comma-separated list. Segments are trimmed and empty ones are
/// skipped, so `" 75,,86"` yields `["75", "86"]`.
impl FromStr for ArchitectureSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ArchitectureSpec(
            s.split(',')
                .map(str::trim)
                .filter(|arch| !arch.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        ))
    }
}

impl Display for ArchitectureSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

impl<'de> Deserialize<'de> for ArchitectureSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for ArchitectureSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
