//! Per-file compiler selection.
//!
//! Every source of a target is dispatched on its extension: device-kernel
//! sources go to the GPU SDK's compiler with the device flags, everything
//! else to the host compiler with the host flags. The decision is a pure
//! function of the source and the target configuration, so concurrent
//! compilations never share compiler state.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::env::GpuSdk;
use crate::error::BuildError;
use crate::target::BuildTarget;
use crate::toolchain::{Platform, Toolchain, ToolchainConfig};

/// Compilers available to a build.
#[derive(Clone, Debug)]
pub struct Compilers {
    pub host: PathBuf,
    pub gpu: Option<GpuSdk>,
    /// Platform the compilers run on.
    pub platform: Platform,
}

/// Executable and flags for compiling one source file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompilerInvocation {
    pub toolchain: Toolchain,
    pub executable: PathBuf,
    pub flags: Vec<String>,
}

/// Select the compiler and flags for `source`.
///
/// Fails for device sources when no GPU SDK is available. Host sources
/// never need the SDK.
pub fn dispatch(
    source: &Path,
    flags: &ToolchainConfig,
    compilers: &Compilers,
) -> Result<CompilerInvocation, BuildError> {
    let toolchain = Toolchain::for_extension(source.extension().and_then(|ext| ext.to_str()));
    let executable = match toolchain {
        Toolchain::Device => match &compilers.gpu {
            Some(gpu) => gpu.nvcc(compilers.platform),
            None => {
                return Err(BuildError::MissingGpuToolchain {
                    source_file: source.to_owned(),
                })
            }
        },
        Toolchain::Host => compilers.host.clone(),
    };

    Ok(CompilerInvocation {
        toolchain,
        executable,
        flags: flags.flags(toolchain).to_vec(),
    })
}

/// A single compilation handed to the underlying compile step.
#[derive(Debug)]
pub struct CompileRequest<'a> {
    pub invocation: &'a CompilerInvocation,
    pub source: &'a Path,
    pub object: &'a Path,
    pub include_dirs: &'a [PathBuf],
}

/// Compiles one source file to an object file.
pub trait CompileStep: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), BuildError>;
}

/// Dispatches the sources of a target to a [`CompileStep`].
pub struct Driver<'a> {
    compilers: &'a Compilers,
    step: &'a dyn CompileStep,
}

impl<'a> Driver<'a> {
    pub fn new(compilers: &'a Compilers, step: &'a dyn CompileStep) -> Self {
        Driver { compilers, step }
    }

    pub fn compile(
        &self,
        target: &BuildTarget,
        source: &Path,
        object: &Path,
    ) -> Result<(), BuildError> {
        let invocation = dispatch(source, target.flags(), self.compilers)?;
        debug!(
            "{}: compiling {} with {} ({})",
            target.name(),
            source.to_string_lossy(),
            invocation.executable.to_string_lossy(),
            invocation.toolchain
        );
        self.step.compile(&CompileRequest {
            invocation: &invocation,
            source,
            object,
            include_dirs: target.include_dirs(),
        })
    }
}
