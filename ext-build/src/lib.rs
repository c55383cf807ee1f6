//! Build orchestration for extension modules that mix binding sources and
//! GPU kernels.

pub mod arch;
pub use arch::ArchitectureSpec;

pub mod config;
pub use config::Project;

pub mod driver;
pub use driver::{dispatch, CompileRequest, CompileStep, CompilerInvocation, Compilers, Driver};

pub mod env;
pub use env::{BuildEnv, GpuSdk};

mod error;
pub use error::BuildError;

pub mod paths;
pub use paths::{PathResolver, PathSet};

pub mod pipeline;
pub use pipeline::{LinkRequest, LinkStep};

mod plan;
pub use plan::{write_plan, Collaborators, Plan};

pub mod preprocess;

pub mod process;

pub mod target;
pub use target::BuildTarget;

pub mod toolchain;
pub use toolchain::{Platform, Toolchain, ToolchainConfig};
