use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ext_build::preprocess::{FixedRuntime, Preprocessed, Preprocessor, LANGUAGE_LEVEL};
use ext_build::process::ProcessLinker;
use ext_build::{
    BuildEnv, BuildError, Collaborators, CompileRequest, CompileStep, CompilerInvocation,
    GpuSdk, LinkRequest, LinkStep, PathResolver, PathSet, Plan, Platform, Project, Toolchain,
};

struct StaticResolver;

impl PathResolver for StaticResolver {
    fn resolve(&self, gpu: Option<&GpuSdk>) -> PathSet {
        let mut paths = PathSet {
            include_dirs: vec![PathBuf::from("/usr/include/ffmpeg")],
            library_dirs: vec![PathBuf::from("/usr/lib/ffmpeg")],
            libraries: vec!["avcodec".into(), "avutil".into()],
            ..Default::default()
        };
        if let Some(gpu) = gpu {
            paths.include_dirs.push(gpu.include_dir());
            paths.library_dirs.push(gpu.root().join("lib64"));
            paths.libraries.push("cudart".into());
            paths.runtime_library_dirs.push(gpu.root().join("lib64"));
        }
        paths
    }
}

struct StubPreprocessor;

impl Preprocessor for StubPreprocessor {
    fn preprocess(
        &self,
        source: &Path,
        build_dir: &Path,
        _include_path: &[PathBuf],
    ) -> Result<Preprocessed, BuildError> {
        let stem = source.file_stem().unwrap();
        Ok(Preprocessed {
            units: vec![build_dir.join(stem).with_extension("cpp")],
            language_level: LANGUAGE_LEVEL,
        })
    }
}

#[derive(Clone, Debug)]
struct Linked {
    output: PathBuf,
    objects: Vec<PathBuf>,
    library_dirs: Vec<PathBuf>,
    libraries: Vec<String>,
    runtime_library_dirs: Vec<PathBuf>,
}

#[derive(Clone, Default)]
struct Log {
    compiled: Arc<Mutex<Vec<(PathBuf, CompilerInvocation)>>>,
    linked: Arc<Mutex<Vec<Linked>>>,
}

impl CompileStep for Log {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<(), BuildError> {
        self.compiled
            .lock()
            .unwrap()
            .push((request.source.to_owned(), request.invocation.clone()));
        Ok(())
    }
}

impl LinkStep for Log {
    fn link(&self, request: &LinkRequest<'_>) -> Result<(), BuildError> {
        self.linked
            .lock()
            .unwrap()
            .push(Linked {
                output: request.output.to_owned(),
                objects: request.objects.to_vec(),
                library_dirs: request.library_dirs.to_vec(),
                libraries: request.libraries.to_vec(),
                runtime_library_dirs: request.runtime_library_dirs.to_vec(),
            });
        Ok(())
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

fn project(root: &Path, device_sources: bool) -> Project {
    touch(&root.join("avcuda/core.pyx"));
    touch(&root.join("avcuda/codec/decode.pyx"));
    if device_sources {
        touch(&root.join("avcuda/cuda/kernel.cu"));
        touch(&root.join("avcuda/cuda/color/nv12.cu"));
    }
    fs::write(
        root.join("build.toml"),
        r#"
[general]
name = "avcuda"

[toolchain]
host-compiler = "c++"
host-flags = ["-std=c++17"]
device-flags = ["-c", "--ptxas-options=-v"]
"#,
    )
    .unwrap();
    Project::from_file(root.join("build.toml")).unwrap()
}

fn env(vars: &[(&str, &str)]) -> BuildEnv {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    BuildEnv::from_lookup(move |name: &str| {
        vars.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
}

fn collaborators(log: &Log) -> Collaborators {
    Collaborators {
        resolver: Box::new(StaticResolver),
        runtime: Box::new(FixedRuntime {
            include_dir: PathBuf::from("/site-packages/av/include"),
            library_dir: Some(PathBuf::from(r"C:\Python312\libs")),
        }),
        preprocessor: Box::new(StubPreprocessor),
        compiler: Box::new(log.clone()),
        linker: Box::new(log.clone()),
    }
}

#[test]
fn host_only_build_without_gpu_sdk() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path(), false);
    let log = Log::default();
    let collaborators = collaborators(&log);

    let plan = Plan::new(&project, &env(&[]), Platform::Posix, &collaborators).unwrap();
    assert_eq!(plan.targets.len(), 2);

    let modules = plan.build(&collaborators, Some(2)).unwrap();
    assert_eq!(modules.len(), 2);

    let compiled = log.compiled.lock().unwrap();
    assert_eq!(compiled.len(), 2);
    for (_, invocation) in compiled.iter() {
        assert_eq!(invocation.toolchain, Toolchain::Host);
        assert_eq!(invocation.flags, ["-std=c++17"]);
    }

    let linked: HashSet<PathBuf> = log
        .linked
        .lock()
        .unwrap()
        .iter()
        .map(|linked| linked.output.clone())
        .collect();
    let lib_dir = dir.path().join("build/lib");
    assert_eq!(
        linked,
        HashSet::from([
            lib_dir.join("avcuda/core.so"),
            lib_dir.join("avcuda/codec/decode.so"),
        ])
    );
}

#[test]
fn device_sources_without_gpu_sdk_fail_before_compiling() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path(), true);
    let log = Log::default();
    let collaborators = collaborators(&log);

    let plan = Plan::new(&project, &env(&[]), Platform::Posix, &collaborators).unwrap();
    let err = plan.build(&collaborators, None).unwrap_err();

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingGpuToolchain { source_file }) => {
            assert_eq!(source_file.extension().unwrap(), "cu");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("GPU_HOME") && message.contains("GPU_PATH"));

    assert!(log.compiled.lock().unwrap().is_empty());
    assert!(log.linked.lock().unwrap().is_empty());
}

#[test]
fn device_and_host_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path(), true);
    let log = Log::default();
    let collaborators = collaborators(&log);

    let env = env(&[("GPU_PATH", "/opt/gpu"), ("GPU_ARCH_LIST", "75,86")]);
    let plan = Plan::new(&project, &env, Platform::Posix, &collaborators).unwrap();
    plan.build(&collaborators, Some(1)).unwrap();

    let nvcc = PathBuf::from("/opt/gpu/bin/nvcc");
    let compiled = log.compiled.lock().unwrap();
    // Two targets, each with two device sources and one unit.
    assert_eq!(compiled.len(), 6);

    for (source, invocation) in compiled.iter() {
        if source.extension().unwrap() == "cu" {
            assert_eq!(invocation.toolchain, Toolchain::Device);
            assert_eq!(invocation.executable, nvcc);
            assert_eq!(
                invocation.flags,
                [
                    "-c",
                    "--ptxas-options=-v",
                    "-gencode",
                    "arch=compute_75,code=sm_75",
                    "-gencode",
                    "arch=compute_86,code=sm_86",
                    "-gencode",
                    "arch=compute_86,code=compute_86",
                ]
            );
        } else {
            assert_eq!(invocation.toolchain, Toolchain::Host);
            assert_eq!(invocation.executable, PathBuf::from("c++"));
            assert_eq!(invocation.flags, ["-std=c++17"]);
        }
    }

    let linked = log.linked.lock().unwrap();
    assert_eq!(linked.len(), 2);
    for linked in linked.iter() {
        assert_eq!(linked.objects.len(), 3);
        assert_eq!(linked.runtime_library_dirs, [PathBuf::from("/opt/gpu/lib64")]);
        assert!(!linked.library_dirs.contains(&PathBuf::from(r"C:\Python312\libs")));
    }
}

#[test]
fn targets_share_device_sources_and_paths() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path(), true);
    let log = Log::default();
    let collaborators = collaborators(&log);

    let env = env(&[("GPU_HOME", "/opt/gpu")]);
    let plan = Plan::new(&project, &env, Platform::Posix, &collaborators).unwrap();

    let core = plan.target("avcuda.core").unwrap();
    let decode = plan.target("avcuda.codec.decode").unwrap();
    assert!(Arc::ptr_eq(core.device_sources(), decode.device_sources()));
    assert_eq!(core.device_sources().len(), 2);
    assert_eq!(core.include_dirs(), decode.include_dirs());
    assert_eq!(core.libraries(), ["avcodec", "avutil", "cudart"]);
    assert_eq!(core.language_level(), 3);
}

#[test]
fn plan_serializes_targets() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path(), false);
    let log = Log::default();
    let collaborators = collaborators(&log);

    let plan = Plan::new(&project, &env(&[]), Platform::Posix, &collaborators).unwrap();
    let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();

    assert_eq!(json["name"], "avcuda");
    assert_eq!(json["archs"], "75,86");
    assert!(json["gpu-root"].is_null());

    let names: HashSet<&str> = json["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|target| target["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, HashSet::from(["avcuda.core", "avcuda.codec.decode"]));
    assert_eq!(json["targets"][0]["flags"]["host"][0], "-std=c++17");
}

#[test]
fn windows_link_gets_interpreter_import_libraries() {
    let dir = tempfile::tempdir().unwrap();
    let project = project(dir.path(), true);
    let log = Log::default();
    let collaborators = collaborators(&log);

    let env = env(&[("GPU_HOME", "/opt/gpu")]);
    let plan = Plan::new(&project, &env, Platform::Windows, &collaborators).unwrap();
    let modules = plan.build(&collaborators, Some(2)).unwrap();
    assert!(modules
        .iter()
        .all(|module| module.extension().unwrap() == "pyd"));

    let compiled = log.compiled.lock().unwrap();
    assert!(compiled
        .iter()
        .filter(|(_, invocation)| invocation.toolchain == Toolchain::Device)
        .all(|(_, invocation)| invocation.executable == PathBuf::from("/opt/gpu/bin/nvcc.exe")));

    let python_libs = PathBuf::from(r"C:\Python312\libs");
    let linked = log.linked.lock().unwrap();
    assert_eq!(linked.len(), 2);
    for linked in linked.iter() {
        assert_eq!(linked.library_dirs.last(), Some(&python_libs));

        let cmd = ProcessLinker::for_host(Path::new("cl.exe")).command(&LinkRequest {
            objects: &linked.objects,
            output: &linked.output,
            library_dirs: &linked.library_dirs,
            libraries: &linked.libraries,
            runtime_library_dirs: &linked.runtime_library_dirs,
        });
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&r"/LIBPATH:C:\Python312\libs".to_owned()));
        assert!(!args.iter().any(|arg| arg.contains("rpath")));
    }
}
