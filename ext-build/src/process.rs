//! Compile and link steps that run the real tools.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::driver::{CompileRequest, CompileStep};
use crate::error::BuildError;
use crate::pipeline::{LinkRequest, LinkStep};
use crate::toolchain::Toolchain;

/// Command-line conventions of a host compiler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flavor {
    Gnu,
    Msvc,
}

impl Flavor {
    pub fn detect(compiler: &Path) -> Self {
        match compiler.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) if stem.eq_ignore_ascii_case("cl") || stem.eq_ignore_ascii_case("clang-cl") => {
                Flavor::Msvc
            }
            _ => Flavor::Gnu,
        }
    }
}

fn run(mut cmd: Command, program: &Path, input: &Path) -> Result<(), BuildError> {
    debug!("Running {cmd:?}");
    let status = cmd.status().map_err(|err| BuildError::Spawn {
        program: program.to_owned(),
        err,
    })?;

    if !status.success() {
        return Err(BuildError::CompilerFailed {
            program: program.to_owned(),
            input: input.to_owned(),
            status,
        });
    }

    Ok(())
}

/// Runs the executable selected by the driver.
#[derive(Clone, Debug)]
pub struct ProcessCompiler {
    host_flavor: Flavor,
}

impl ProcessCompiler {
    pub fn new(host_flavor: Flavor) -> Self {
        ProcessCompiler { host_flavor }
    }

    pub fn command(&self, request: &CompileRequest<'_>) -> Command {
        let invocation = request.invocation;
        let mut cmd = Command::new(&invocation.executable);

        match (invocation.toolchain, self.host_flavor) {
            // The device flags carry the compile-only flag.
            (Toolchain::Device, _) => {
                for include in request.include_dirs {
                    cmd.arg("-I").arg(include);
                }
                cmd.arg(request.source).arg("-o").arg(request.object);
            }
            (Toolchain::Host, Flavor::Gnu) => {
                for include in request.include_dirs {
                    cmd.arg("-I").arg(include);
                }
                cmd.arg("-c")
                    .arg(request.source)
                    .arg("-o")
                    .arg(request.object);
            }
            (Toolchain::Host, Flavor::Msvc) => {
                cmd.arg("/nologo").arg("/c");
                for include in request.include_dirs {
                    cmd.arg(format!("/I{}", include.to_string_lossy()));
                }
                cmd.arg(request.source)
                    .arg(format!("/Fo{}", request.object.to_string_lossy()));
            }
        }

        cmd.args(&invocation.flags);
        cmd
    }
}

impl CompileStep for ProcessCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), BuildError> {
        if let Some(parent) = request.object.parent() {
            std::fs::create_dir_all(parent).map_err(|err| BuildError::Spawn {
                program: request.invocation.executable.clone(),
                err,
            })?;
        }
        run(
            self.command(request),
            &request.invocation.executable,
            request.source,
        )
    }
}

/// Links object files into a shared module.
#[derive(Clone, Debug)]
pub struct ProcessLinker {
    linker: PathBuf,
    flavor: Flavor,
}

impl ProcessLinker {
    /// Linker matching the host compiler: the compiler driver itself for
    /// GNU-style compilers, `link.exe` for MSVC.
    pub fn for_host(host_compiler: &Path) -> Self {
        match Flavor::detect(host_compiler) {
            Flavor::Gnu => ProcessLinker {
                linker: host_compiler.to_owned(),
                flavor: Flavor::Gnu,
            },
            Flavor::Msvc => ProcessLinker {
                linker: host_compiler.with_file_name("link.exe"),
                flavor: Flavor::Msvc,
            },
        }
    }

    pub fn command(&self, request: &LinkRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.linker);
        match self.flavor {
            Flavor::Gnu => {
                cmd.arg("-shared").args(request.objects);
                for dir in request.library_dirs {
                    cmd.arg("-L").arg(dir);
                }
                for lib in request.libraries {
                    cmd.arg(format!("-l{lib}"));
                }
                for dir in request.runtime_library_dirs {
                    cmd.arg(format!("-Wl,-rpath,{}", dir.to_string_lossy()));
                }
                cmd.arg("-o").arg(request.output);
            }
            // DLLs are found through PATH, runtime directories are not
            // embedded.
            Flavor::Msvc => {
                cmd.arg("/nologo").arg("/DLL").args(request.objects);
                for dir in request.library_dirs {
                    cmd.arg(format!("/LIBPATH:{}", dir.to_string_lossy()));
                }
                for lib in request.libraries {
                    cmd.arg(format!("{lib}.lib"));
                }
                cmd.arg(format!("/OUT:{}", request.output.to_string_lossy()));
            }
        }
        cmd
    }
}

impl LinkStep for ProcessLinker {
    fn link(&self, request: &LinkRequest<'_>) -> Result<(), BuildError> {
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent).map_err(|err| BuildError::Spawn {
                program: self.linker.clone(),
                err,
            })?;
        }
        run(self.command(request), &self.linker, request.output)
    }
}
