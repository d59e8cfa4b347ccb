//! Development shell descriptor.
//!
//! Mirrors the devenv module inside `flake.nix`. Only used for local
//! development; the Docker build never reads it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LLVM: &str = "llvmPackages_18";

const FLAKE_HEADER: &str = r#"{
  inputs = {
    nixpkgs.url = "github:cachix/devenv-nixpkgs/rolling";
    devenv.url = "github:cachix/devenv";
    fenix.url = "github:nix-community/fenix";
    fenix.inputs.nixpkgs.follows = "nixpkgs";
  };

  outputs = { self, nixpkgs, devenv, ... } @ inputs:
    let
      systems = [ "x86_64-linux" "aarch64-linux" "x86_64-darwin" "aarch64-darwin" ];
      forEachSystem = nixpkgs.lib.genAttrs systems;
    in
    {
      devShells = forEachSystem (system:
        let
          pkgs = nixpkgs.legacyPackages.${system};
        in
        {
          default = devenv.lib.mkShell {
            inherit inputs pkgs;
            modules = [
              {
"#;

const FLAKE_FOOTER: &str = r#"              }
            ];
          };
        });
    };
}
"#;

const MODULE_INDENT: &str = "                ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevShell {
    /// `languages.rust.channel`
    pub rust_channel: String,
    /// Attribute paths under `pkgs`
    pub packages: Vec<String>,
    /// Environment variables, values are Nix string bodies
    pub env: BTreeMap<String, String>,
    /// Attribute path of the stdenv under `pkgs`
    pub stdenv: String,
}

impl Default for DevShell {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert(
            "LIBCLANG_PATH".to_string(),
            format!("${{pkgs.{}.libclang.lib}}/lib", LLVM),
        );
        Self {
            rust_channel: "stable".to_string(),
            packages: vec![
                "pkg-config".to_string(),
                format!("{}.clang", LLVM),
                format!("{}.llvm", LLVM),
            ],
            env,
            stdenv: format!("{}.stdenv", LLVM),
        }
    }
}

impl DevShell {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    fn module_lines(&self) -> Vec<String> {
        let packages: Vec<String> = self
            .packages
            .iter()
            .map(|p| format!("pkgs.{}", p))
            .collect();
        let mut lines = vec![format!("packages = [ {} ];", packages.join(" "))];
        for (key, value) in &self.env {
            lines.push(format!("env.{} = \"{}\";", key, value));
        }
        lines.push("languages.rust.enable = true;".to_string());
        lines.push(format!(
            "languages.rust.channel = \"{}\";",
            self.rust_channel
        ));
        lines.push(format!("stdenv = pkgs.{};", self.stdenv));
        lines
    }

    /// Render the full `flake.nix`
    pub fn render_flake(&self) -> String {
        let mut out = String::from(FLAKE_HEADER);
        for line in self.module_lines() {
            out.push_str(MODULE_INDENT);
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(FLAKE_FOOTER);
        out
    }
}
