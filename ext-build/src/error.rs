use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::env::{GPU_HOME_VAR, GPU_PATH_VAR};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "Cannot compile device source `{}`: no GPU SDK found. Set `{home}` or `{path}`",
        .source_file.to_string_lossy(),
        home = GPU_HOME_VAR,
        path = GPU_PATH_VAR
    )]
    MissingGpuToolchain { source_file: PathBuf },

    #[error("Cannot preprocess `{}`: {message}", .source_file.to_string_lossy())]
    Preprocess {
        source_file: PathBuf,
        message: String,
    },

    #[error("Cannot run `{}`", .program.to_string_lossy())]
    Spawn {
        program: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error(
        "`{}` failed on `{}` ({status})",
        .program.to_string_lossy(),
        .input.to_string_lossy()
    )]
    CompilerFailed {
        program: PathBuf,
        input: PathBuf,
        status: ExitStatus,
    },
}
