//! Image reference and tag computation.

use crate::{ImageBuilderError, ImageBuilderResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REGISTRY: &str = "registry.h.jw910731.dev/nix";
pub const DEFAULT_IMAGE: &str = "ntnu-course-bot";
pub const DEFAULT_VERSION: &str = "0.1.0";

/// Reference to the bot's container image, `registry/image:version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Registry host and namespace, e.g. `registry.h.jw910731.dev/nix`
    pub registry: String,
    /// Repository name inside the registry
    pub image: String,
    /// Tag applied to the image
    pub version: String,
}

impl Default for ImageRef {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl ImageRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Apply `REGISTRY`, `IMAGE` and `VERSION` overrides, the same variables
    /// the Makefile accepts on the command line.
    pub fn from_env_overrides<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut image = Self::default();
        if let Some(registry) = lookup("REGISTRY") {
            image.registry = registry;
        }
        if let Some(name) = lookup("IMAGE") {
            image.image = name;
        }
        if let Some(version) = lookup("VERSION") {
            image.version = version;
        }
        image
    }

    /// The full image tag. Plain concatenation, no normalisation.
    pub fn tag(&self) -> String {
        format!("{}/{}:{}", self.registry, self.image, self.version)
    }

    pub fn validate(&self) -> ImageBuilderResult<()> {
        for (field, value) in [
            ("registry", &self.registry),
            ("image", &self.image),
            ("version", &self.version),
        ] {
            if value.is_empty() {
                return Err(ImageBuilderError::InvalidConfig(format!(
                    "{} cannot be empty",
                    field
                )));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(ImageBuilderError::InvalidConfig(format!(
                    "{} cannot contain whitespace: {:?}",
                    field, value
                )));
            }
        }

        if self.image.contains(':') {
            return Err(ImageBuilderError::InvalidConfig(format!(
                "image cannot contain ':': {}",
                self.image
            )));
        }

        if self.version.contains(['/', ':']) {
            return Err(ImageBuilderError::InvalidConfig(format!(
                "version cannot contain '/' or ':': {}",
                self.version
            )));
        }

        Ok(())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_tag() {
        let image = ImageRef::default();
        assert_eq!(
            image.tag(),
            "registry.h.jw910731.dev/nix/ntnu-course-bot:0.1.0"
        );
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_tag_is_plain_concatenation() {
        let cases = [
            ("localhost:5000", "bot", "latest", "localhost:5000/bot:latest"),
            ("ghcr.io/org/team", "course-bot", "1.2.3", "ghcr.io/org/team/course-bot:1.2.3"),
            ("r", "i", "v", "r/i:v"),
        ];
        for (registry, name, version, expected) in cases {
            let image = ImageRef::new()
                .with_registry(registry)
                .with_image(name)
                .with_version(version);
            assert_eq!(image.tag(), expected);
            assert_eq!(image.to_string(), expected);
        }
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("VERSION", "0.2.0")].into_iter().collect();
        let image = ImageRef::from_env_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(image.registry, DEFAULT_REGISTRY);
        assert_eq!(image.image, DEFAULT_IMAGE);
        assert_eq!(
            image.tag(),
            "registry.h.jw910731.dev/nix/ntnu-course-bot:0.2.0"
        );

        let untouched = ImageRef::from_env_overrides(|_| None);
        assert_eq!(untouched, ImageRef::default());
    }

    #[test]
    fn test_validation() {
        assert!(ImageRef::new().with_registry("").validate().is_err());
        assert!(ImageRef::new().with_image("bad name").validate().is_err());
        assert!(ImageRef::new().with_image("bot:1").validate().is_err());
        assert!(ImageRef::new().with_version("1/2").validate().is_err());
        assert!(ImageRef::new().with_version("").validate().is_err());
        assert!(ImageRef::new()
            .with_registry("localhost:5000")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_serialization() {
        let image = ImageRef::default();
        let json = serde_json::to_string(&image).unwrap();
        let deserialized: ImageRef = serde_json::from_str(&json).unwrap();
        assert_eq!(image, deserialized);
    }
}
