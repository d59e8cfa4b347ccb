//! Two-stage Dockerfile plan.
//!
//! The builder stage compiles placeholder entry points against the real
//! manifests first, so the dependency layer is only invalidated when
//! `Cargo.toml`/`Cargo.lock` change. The runtime stage is a distroless image
//! holding nothing but the release binary.

use serde::{Deserialize, Serialize};
use std::fmt;

const BUILDER_STAGE: &str = "builder";
const PLACEHOLDER_MAIN: &str = "fn main() {}";
/// Matches a committed lockfile and copies nothing when there is none
const LOCKFILE_GLOB: &str = "Cargo.lock*";
const RESOLVE_LOCKFILE: &str = "test -f Cargo.lock || cargo generate-lockfile";

/// How OpenSSL ends up in the release binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpensslLinkage {
    /// musl build with OpenSSL linked in, runs on `distroless/static`
    Static,
    /// glibc build linking the system libssl, runs on `distroless/base`
    Dynamic,
}

impl OpensslLinkage {
    fn builder_image(&self) -> &'static str {
        match self {
            OpensslLinkage::Static => "rust:1-alpine",
            OpensslLinkage::Dynamic => "rust:1-bookworm",
        }
    }

    fn runtime_image(&self) -> &'static str {
        match self {
            OpensslLinkage::Static => "gcr.io/distroless/static-debian12",
            OpensslLinkage::Dynamic => "gcr.io/distroless/base-debian12",
        }
    }

    fn toolchain_setup(&self) -> Vec<Instruction> {
        match self {
            OpensslLinkage::Static => vec![
                Instruction::Run(
                    "apk add --no-cache musl-dev pkgconfig openssl-dev openssl-libs-static"
                        .to_string(),
                ),
                Instruction::Env("OPENSSL_STATIC".to_string(), "1".to_string()),
            ],
            OpensslLinkage::Dynamic => vec![Instruction::Run(
                "apt-get update && apt-get install -y --no-install-recommends pkg-config libssl-dev && rm -rf /var/lib/apt/lists/*"
                    .to_string(),
            )],
        }
    }
}

/// A workspace member whose manifest and sources go into the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub path: String,
    pub lib: bool,
    pub bin: bool,
}

impl Member {
    pub fn new(path: impl Into<String>, lib: bool, bin: bool) -> Self {
        Self {
            path: path.into(),
            lib,
            bin,
        }
    }

    fn entry_points(&self) -> Vec<String> {
        let mut files = Vec::new();
        if self.lib {
            files.push(format!("{}/src/lib.rs", self.path));
        }
        if self.bin {
            files.push(format!("{}/src/main.rs", self.path));
        }
        files
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    From {
        image: String,
        alias: Option<String>,
    },
    Workdir(String),
    Run(String),
    Env(String, String),
    Copy {
        from: Option<String>,
        sources: Vec<String>,
        dest: String,
    },
    Entrypoint(Vec<String>),
}

impl Instruction {
    fn copy(sources: Vec<String>, dest: impl Into<String>) -> Self {
        Instruction::Copy {
            from: None,
            sources,
            dest: dest.into(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::From { image, alias } => match alias {
                Some(alias) => write!(f, "FROM {} AS {}", image, alias),
                None => write!(f, "FROM {}", image),
            },
            Instruction::Workdir(dir) => write!(f, "WORKDIR {}", dir),
            Instruction::Run(cmd) => write!(f, "RUN {}", cmd),
            Instruction::Env(key, value) => write!(f, "ENV {}={}", key, value),
            Instruction::Copy {
                from,
                sources,
                dest,
            } => {
                write!(f, "COPY ")?;
                if let Some(stage) = from {
                    write!(f, "--from={} ", stage)?;
                }
                write!(f, "{} {}", sources.join(" "), dest)
            }
            Instruction::Entrypoint(args) => {
                let quoted: Vec<String> = args.iter().map(|a| format!("\"{}\"", a)).collect();
                write!(f, "ENTRYPOINT [{}]", quoted.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: Option<String>,
    pub instructions: Vec<Instruction>,
}

/// Inputs of the release image build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerfileSpec {
    /// Cargo package that owns the binary
    pub package: String,
    /// Binary name, also the entrypoint path in the runtime image
    pub binary: String,
    /// Working directory inside the builder stage
    pub workdir: String,
    /// Workspace members in manifest order
    pub members: Vec<Member>,
    pub linkage: OpensslLinkage,
}

impl Default for DockerfileSpec {
    fn default() -> Self {
        Self {
            package: "course-bot".to_string(),
            binary: "course-bot".to_string(),
            workdir: "/app".to_string(),
            members: vec![
                Member::new("image-builder", true, true),
                Member::new("crawler", true, false),
                Member::new("bot", true, true),
            ],
            linkage: OpensslLinkage::Static,
        }
    }
}

impl DockerfileSpec {
    pub fn new(linkage: OpensslLinkage) -> Self {
        Self {
            linkage,
            ..Self::default()
        }
    }

    /// Path of the binary inside the runtime image
    pub fn entrypoint(&self) -> String {
        format!("/{}", self.binary)
    }

    fn build_command(&self) -> String {
        format!("cargo build --release --locked -p {}", self.package)
    }

    fn entry_points(&self) -> Vec<String> {
        self.members.iter().flat_map(Member::entry_points).collect()
    }

    fn builder_stage(&self) -> Stage {
        let mut instructions = vec![Instruction::From {
            image: self.linkage.builder_image().to_string(),
            alias: Some(BUILDER_STAGE.to_string()),
        }];
        instructions.extend(self.linkage.toolchain_setup());
        instructions.push(Instruction::Workdir(self.workdir.clone()));

        // Manifests only: this layer and everything up to the first build
        // depends on nothing under src/.
        instructions.push(Instruction::copy(
            vec!["Cargo.toml".to_string(), LOCKFILE_GLOB.to_string()],
            "./",
        ));
        for member in &self.members {
            instructions.push(Instruction::copy(
                vec![format!("{}/Cargo.toml", member.path)],
                format!("{}/", member.path),
            ));
        }

        let src_dirs: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("{}/src", m.path))
            .collect();
        let mut placeholder = format!("mkdir -p {}", src_dirs.join(" "));
        let libs: Vec<String> = self
            .members
            .iter()
            .filter(|m| m.lib)
            .map(|m| format!("{}/src/lib.rs", m.path))
            .collect();
        if !libs.is_empty() {
            placeholder.push_str(&format!(" && touch {}", libs.join(" ")));
        }
        for member in self.members.iter().filter(|m| m.bin) {
            placeholder.push_str(&format!(
                " && echo '{}' > {}/src/main.rs",
                PLACEHOLDER_MAIN, member.path
            ));
        }
        instructions.push(Instruction::Run(placeholder));
        instructions.push(Instruction::Run(RESOLVE_LOCKFILE.to_string()));
        instructions.push(Instruction::Run("cargo fetch --locked".to_string()));
        instructions.push(Instruction::Run(self.build_command()));

        for dir in &src_dirs {
            instructions.push(Instruction::copy(vec![dir.clone()], dir.clone()));
        }
        // Real sources can be older than the placeholder artifacts.
        instructions.push(Instruction::Run(format!(
            "touch {}",
            self.entry_points().join(" ")
        )));
        instructions.push(Instruction::Run(self.build_command()));

        Stage {
            name: Some(BUILDER_STAGE.to_string()),
            instructions,
        }
    }

    fn runtime_stage(&self) -> Stage {
        Stage {
            name: None,
            instructions: vec![
                Instruction::From {
                    image: self.linkage.runtime_image().to_string(),
                    alias: None,
                },
                Instruction::Copy {
                    from: Some(BUILDER_STAGE.to_string()),
                    sources: vec![format!("{}/target/release/{}", self.workdir, self.binary)],
                    dest: self.entrypoint(),
                },
                Instruction::Entrypoint(vec![self.entrypoint()]),
            ],
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        vec![self.builder_stage(), self.runtime_stage()]
    }

    /// Render the Dockerfile text
    pub fn render(&self) -> String {
        self.stages()
            .iter()
            .map(|stage| {
                stage
                    .instructions
                    .iter()
                    .map(|i| format!("{}\n", i))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether every builder instruction before the first source copy only
    /// depends on manifests, with at least one dependency build among them.
    pub fn cache_inputs_before_sources(&self) -> bool {
        let builder = self.builder_stage();
        let mut built_dependencies = false;
        for instruction in &builder.instructions {
            match instruction {
                Instruction::Copy { sources, .. } => {
                    let manifests_only = sources
                        .iter()
                        .all(|s| s.ends_with("Cargo.toml") || s.starts_with("Cargo.lock"));
                    if !manifests_only {
                        return built_dependencies;
                    }
                }
                Instruction::Run(cmd) if cmd.starts_with("cargo build") => {
                    built_dependencies = true;
                }
                _ => {}
            }
        }
        false
    }
}
