use crate::image::ImageRef;
use crate::{ImageBuilderError, ImageBuilderResult};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Container runtime types supported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Podman container runtime
    Podman,
    /// Docker container runtime
    Docker,
    /// No container runtime available
    None,
}

impl ContainerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::None => "",
        }
    }

    /// Check if this runtime is available
    pub fn is_available(&self) -> bool {
        matches!(self, ContainerRuntime::Podman | ContainerRuntime::Docker)
    }
}

fn responds_to_version(command: &str) -> bool {
    Command::new(command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Detect available container runtime, Docker first since the Makefile
/// drives `docker build`
pub fn detect_runtime() -> ContainerRuntime {
    if responds_to_version("docker") {
        return ContainerRuntime::Docker;
    }

    if responds_to_version("podman") {
        return ContainerRuntime::Podman;
    }

    ContainerRuntime::None
}

/// Arguments of the single `build` invocation for `image`
pub fn build_args(image: &ImageRef, dockerfile: &Path, context: &Path) -> Vec<String> {
    vec![
        "build".to_string(),
        "-t".to_string(),
        image.tag(),
        "-f".to_string(),
        dockerfile.display().to_string(),
        context.display().to_string(),
    ]
}

/// Build and tag the release image
pub fn build_image(
    runtime: &ContainerRuntime,
    image: &ImageRef,
    dockerfile: &Path,
    context: &Path,
) -> ImageBuilderResult<String> {
    if !runtime.is_available() {
        return Err(ImageBuilderError::NoRuntimeAvailable);
    }
    image.validate()?;

    if !dockerfile.exists() {
        return Err(ImageBuilderError::InvalidConfig(format!(
            "Dockerfile not found: {}",
            dockerfile.display()
        )));
    }

    let args = build_args(image, dockerfile, context);
    debug!("Running {} {}", runtime.command(), args.join(" "));

    let output = Command::new(runtime.command())
        .args(&args)
        .output()
        .map_err(|e| {
            ImageBuilderError::BuildFailed(format!("failed to run {}: {}", runtime.command(), e))
        })?;

    if !output.status.success() {
        return Err(ImageBuilderError::BuildFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    let tag = image.tag();
    info!("Built image {}", tag);
    Ok(tag)
}
