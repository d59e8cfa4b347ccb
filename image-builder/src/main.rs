use clap::{Parser, Subcommand};
use image_builder::{
    build_image, detect_runtime, DevShell, DockerfileSpec, ImageRef, OpensslLinkage,
};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "image-builder")]
#[command(about = "Build contract of the ntnu-course-bot container image")]
struct Cli {
    /// Registry host and namespace
    #[arg(long, env = "REGISTRY")]
    registry: Option<String>,
    /// Image name
    #[arg(long, env = "IMAGE")]
    image: Option<String>,
    /// Image version
    #[arg(long, env = "VERSION")]
    version: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the image tag
    Tag,
    /// Print the Dockerfile
    Dockerfile {
        /// Link OpenSSL dynamically
        #[arg(long)]
        dynamic: bool,
    },
    /// Print the development flake
    Devshell,
    /// Build the image with the local container runtime
    Build {
        /// Use Dockerfile.dynamic
        #[arg(long)]
        dynamic: bool,
        /// Build context
        #[arg(long, default_value = ".")]
        context: PathBuf,
    },
}

fn linkage(dynamic: bool) -> OpensslLinkage {
    if dynamic {
        OpensslLinkage::Dynamic
    } else {
        OpensslLinkage::Static
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let image = ImageRef::from_env_overrides(|key| match key {
        "REGISTRY" => cli.registry.clone(),
        "IMAGE" => cli.image.clone(),
        "VERSION" => cli.version.clone(),
        _ => None,
    });
    image.validate()?;

    match cli.command {
        Commands::Tag => println!("{}", image.tag()),
        Commands::Dockerfile { dynamic } => {
            print!("{}", DockerfileSpec::new(linkage(dynamic)).render());
        }
        Commands::Devshell => print!("{}", DevShell::default().render_flake()),
        Commands::Build { dynamic, context } => {
            let dockerfile = context.join(if dynamic {
                "Dockerfile.dynamic"
            } else {
                "Dockerfile"
            });
            let runtime = detect_runtime();
            match build_image(&runtime, &image, &dockerfile, &context) {
                Ok(tag) => println!("{}", tag),
                Err(e) => {
                    error!("Image build failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
