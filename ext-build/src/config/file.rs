use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Build {
    pub general: General,
    pub toolchain: Option<Toolchain>,

    #[serde(default)]
    pub media: Media,

    #[serde(default)]
    pub binding: Binding,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct General {
    pub name: String,
    pub build_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Toolchain {
    pub host_compiler: Option<PathBuf>,
    pub host_flags: Option<Vec<String>>,
    pub device_flags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Media {
    pub pkg_config: Option<Vec<String>>,
    pub libraries: Option<Vec<String>>,
    pub windows: Option<MediaWindows>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct MediaWindows {
    pub include_dir: PathBuf,
    pub lib_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Binding {
    pub python: Option<String>,
    pub module: Option<String>,
    pub include: Option<PathBuf>,
    pub library_dir: Option<PathBuf>,
    pub preprocessor: Option<PathBuf>,
}
