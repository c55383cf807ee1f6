//! Resolving a project into build targets and building them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{bail, eyre, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::arch::ArchitectureSpec;
use crate::config::Project;
use crate::driver::{CompileStep, Compilers, Driver};
use crate::env::BuildEnv;
use crate::paths::{resolver_for, PathResolver};
use crate::pipeline::{build_all, LinkStep, OutputLayout};
use crate::preprocess::{BindingRuntime, Cython, FixedRuntime, Preprocessor, PythonModule};
use crate::process::{Flavor, ProcessCompiler, ProcessLinker};
use crate::target::{assemble_targets, BuildTarget, SharedParams, SourceLayout};
use crate::toolchain::{Platform, ToolchainConfig};

/// External tools a build relies on.
pub struct Collaborators {
    pub resolver: Box<dyn PathResolver>,
    pub runtime: Box<dyn BindingRuntime>,
    pub preprocessor: Box<dyn Preprocessor>,
    pub compiler: Box<dyn CompileStep>,
    pub linker: Box<dyn LinkStep>,
}

impl Collaborators {
    /// The real tools for `project` on `platform`.
    pub fn for_project(project: &Project, platform: Platform) -> Result<Self> {
        let runtime: Box<dyn BindingRuntime> = match &project.binding.include {
            Some(include) => Box::new(FixedRuntime {
                include_dir: project.root.join(include),
                library_dir: project
                    .binding
                    .library_dir
                    .as_ref()
                    .map(|dir| project.root.join(dir)),
            }),
            None => Box::new(PythonModule::new(
                &project.binding.python,
                &project.binding.module,
            )),
        };

        let host_compiler = &project.toolchain.host_compiler;

        Ok(Collaborators {
            resolver: resolver_for(platform, &project.media)?,
            runtime,
            preprocessor: Box::new(Cython::new(&project.binding.preprocessor, &project.root)),
            compiler: Box::new(ProcessCompiler::new(Flavor::detect(host_compiler))),
            linker: Box::new(ProcessLinker::for_host(host_compiler)),
        })
    }
}

/// Targets of a project together with everything needed to build them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Plan {
    pub name: String,
    pub gpu_root: Option<PathBuf>,
    pub archs: ArchitectureSpec,
    pub targets: Vec<BuildTarget>,

    #[serde(skip)]
    pub compilers: Compilers,
    #[serde(skip)]
    pub outputs: OutputLayout,
}

impl Plan {
    /// Resolve paths and flags once, then assemble one target per binding
    /// source.
    pub fn new(
        project: &Project,
        env: &BuildEnv,
        platform: Platform,
        collaborators: &Collaborators,
    ) -> Result<Self> {
        if env.gpu.is_none() {
            warn!("No GPU SDK found, device sources cannot be compiled");
        }

        let paths = collaborators.resolver.resolve(env.gpu.as_ref());
        let runtime_includes = collaborators
            .runtime
            .include_dirs()
            .wrap_err("Cannot find binding runtime headers")?;
        let binding_library_dirs = match platform {
            Platform::Windows => collaborators
                .runtime
                .library_dirs()
                .wrap_err("Cannot find binding runtime import libraries")?,
            Platform::Posix => Vec::new(),
        };
        let flags = ToolchainConfig::new(
            project.toolchain.host_flags.clone(),
            project.toolchain.device_flags.clone(),
            &env.archs,
        );

        let layout = SourceLayout::from(project);
        let targets = assemble_targets(
            &layout,
            collaborators.preprocessor.as_ref(),
            &SharedParams {
                paths,
                runtime_includes,
                binding_library_dirs,
                flags: Arc::new(flags),
            },
        )?;
        info!("Planned {} target(s) for {}", targets.len(), project.general.name);

        Ok(Plan {
            name: project.general.name.clone(),
            gpu_root: env.gpu.as_ref().map(|gpu| gpu.root().to_owned()),
            archs: env.archs.clone(),
            targets,
            compilers: Compilers {
                host: project.toolchain.host_compiler.clone(),
                gpu: env.gpu.clone(),
                platform,
            },
            outputs: OutputLayout {
                root: layout.root,
                build_dir: layout.build_dir,
                platform,
            },
        })
    }

    /// Compile and link every target, returning the built modules.
    pub fn build(&self, collaborators: &Collaborators, jobs: Option<usize>) -> Result<Vec<PathBuf>> {
        let driver = Driver::new(&self.compilers, collaborators.compiler.as_ref());
        build_all(
            &self.targets,
            &driver,
            collaborators.linker.as_ref(),
            &self.outputs,
            jobs,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).wrap_err("Cannot serialize build plan")
    }

    pub fn target(&self, name: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|target| target.name() == name)
    }

    pub fn build_dir(&self) -> &Path {
        &self.outputs.build_dir
    }
}

/// Write a serialized plan to `path`, creating missing parent directories.
///
/// An existing file is only replaced when `force` is set.
pub fn write_plan(path: &Path, json: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!(
            "File already exists: {}\nUse `--force` to overwrite.",
            path.to_string_lossy()
        );
    }

    let parent = path
        .parent()
        .ok_or_else(|| eyre!("Cannot get parent of `{}`", path.to_string_lossy()))?;
    if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Cannot create directory `{}`", parent.to_string_lossy()))?;
    }

    std::fs::write(path, json).wrap_err_with(|| format!("Cannot create: {}", path.to_string_lossy()))
}
