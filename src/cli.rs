// src/cli.rs
//! CLI definitions for the bountu package engine
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations live in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bountu")]
#[command(author, version)]
#[command(about = "Package acquisition and sync for a git-hosted package catalog", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone the package repository and verify it is usable
    Sync,

    /// Fetch and fast-forward an existing mirror
    Refresh,

    /// List every package in the catalog
    List,

    /// Search the catalog
    Search {
        /// Text matched against id, name, description and tags
        query: String,

        /// Restrict to one category
        #[arg(long)]
        category: Option<String>,

        /// Only installed packages
        #[arg(long)]
        installed: bool,

        /// Only packages with an update available
        #[arg(long)]
        updates: bool,

        /// Only packages that need maintenance
        #[arg(long)]
        maintenance: bool,
    },

    /// Show details for one package
    Info {
        /// Package id
        id: String,
    },

    /// Install a package
    Install {
        /// Package id
        id: String,
    },

    /// Remove an installed package
    Remove {
        /// Package id
        id: String,
    },

    /// Update one package, or every package with an update
    Update {
        /// Package id
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Update every installed package with a newer version
        #[arg(long)]
        all: bool,
    },

    /// Reinstall a package in place
    Repair {
        /// Package id
        id: String,
    },

    /// Show mirror, maintenance and install state
    Status,

    /// Add a package definition to the local mirror
    CreatePackage(CreatePackageArgs),
}

#[derive(Args)]
pub struct CreatePackageArgs {
    /// Package id (directory name under packages/)
    pub id: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Package version
    #[arg(long)]
    pub version: String,

    /// One-line description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Category name
    #[arg(long, default_value = "utilities")]
    pub category: String,

    /// Artifact download URL
    #[arg(long)]
    pub url: String,

    /// SHA-256 of the artifact
    #[arg(long, default_value = "")]
    pub checksum: String,

    /// Unpacked size in bytes
    #[arg(long, default_value_t = 0)]
    pub size: u64,

    /// Target platform
    #[arg(long, default_value = "android")]
    pub platform: String,

    /// Target architecture
    #[arg(long, default_value = "all")]
    pub architecture: String,

    /// Required package id (repeatable)
    #[arg(long = "depends")]
    pub dependencies: Vec<String>,

    /// Conflicting package id (repeatable)
    #[arg(long = "conflicts")]
    pub conflicts: Vec<String>,

    /// Search tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// File whose contents become the post-install script
    #[arg(long)]
    pub install_script: Option<PathBuf>,

    /// File whose contents become the pre-remove script
    #[arg(long)]
    pub uninstall_script: Option<PathBuf>,

    /// Project homepage
    #[arg(long)]
    pub homepage: Option<String>,

    /// License identifier
    #[arg(long)]
    pub license: Option<String>,
}
