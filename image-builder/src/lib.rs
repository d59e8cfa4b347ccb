//! Container image building utilities for ntnu-course-bot
//!
//! This crate describes the build/deploy contract of the bot: how the image
//! tag is formed, which two-stage Dockerfile produces the release image, which
//! development shell the flake exposes, and how `docker build` is invoked.

pub mod devshell;
pub mod dockerfile;
pub mod image;
pub mod runtime;

use thiserror::Error;

pub use devshell::DevShell;
pub use dockerfile::{DockerfileSpec, Instruction, OpensslLinkage, Stage};
pub use image::ImageRef;
pub use runtime::{build_args, build_image, detect_runtime, ContainerRuntime};

/// Errors related to image building
#[derive(Error, Debug)]
pub enum ImageBuilderError {
    #[error("Build failed: {0}")]
    BuildFailed(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No container runtime available. Please install Docker or Podman.")]
    NoRuntimeAvailable,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ImageBuilderResult<T> = Result<T, ImageBuilderError>;
