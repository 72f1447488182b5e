// src/commands.rs
//! Command handlers for the bountu CLI

use anyhow::{Context, Result};
use bountu::catalog::{Category, PackageDescriptor, PackageFilter, RawMetadata};
use bountu::progress::CliProgress;
use bountu::sync::SyncResult;
use bountu::{PackageManager, APP_VERSION};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::CreatePackageArgs;

/// Run the initial sync gate
pub fn cmd_sync(manager: &PackageManager) -> Result<()> {
    info!("Syncing from {}", manager.config().repository.remote_url);
    match manager.initial_sync() {
        SyncResult::Success {
            package_count,
            commit,
        } => {
            println!(
                "Synced {} packages at {}",
                package_count,
                commit.as_deref().map(short_commit).unwrap_or("unknown commit")
            );
            Ok(())
        }
        SyncResult::Failed(failure) => Err(anyhow::anyhow!("Sync failed: {}", failure)),
    }
}

/// Fetch and fast-forward the mirror
pub fn cmd_refresh(manager: &PackageManager) -> Result<()> {
    let outcome = manager.refresh().context("Failed to refresh package repository")?;
    if outcome.has_updates {
        println!(
            "Updated {} -> {}",
            outcome.previous_commit.as_deref().map(short_commit).unwrap_or("none"),
            short_commit(&outcome.current_commit)
        );
    } else {
        println!("Already up to date at {}", short_commit(&outcome.current_commit));
    }
    Ok(())
}

pub fn cmd_list(manager: &PackageManager) -> Result<()> {
    let catalog = manager.catalog().context("Failed to load catalog")?;
    if catalog.is_empty() {
        println!("No packages available");
        return Ok(());
    }
    for package in catalog.iter() {
        print_summary(package);
    }
    println!("\n{} packages", catalog.len());
    Ok(())
}

pub fn cmd_search(
    manager: &PackageManager,
    query: &str,
    category: Option<&str>,
    installed: bool,
    updates: bool,
    maintenance: bool,
) -> Result<()> {
    let category = match category {
        Some(name) => Some(
            Category::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown category '{}'", name))?,
        ),
        None => None,
    };
    let filter = PackageFilter {
        category,
        installed_only: installed,
        updates_only: updates,
        maintenance_only: maintenance,
        ..PackageFilter::query(query)
    };

    let catalog = manager.catalog().context("Failed to load catalog")?;
    let matches = catalog.search(&filter);
    if matches.is_empty() {
        println!("No packages match '{}'", query);
        return Ok(());
    }
    for package in &matches {
        print_summary(package);
    }
    println!("\n{} matches", matches.len());
    Ok(())
}

pub fn cmd_info(manager: &PackageManager, id: &str) -> Result<()> {
    let package = manager
        .package(id)
        .with_context(|| format!("Failed to load package '{}'", id))?;

    println!("{} ({})", package.name, package.id);
    println!("  Version:      {}", package.version);
    println!("  Category:     {}", package.category);
    println!("  Description:  {}", package.description);
    println!("  Size:         {}", human_size(package.size_bytes));
    println!("  Platform:     {} / {}", package.platform, package.architecture);
    if !package.dependencies.is_empty() {
        println!("  Depends:      {}", package.dependencies.join(", "));
    }
    if !package.conflicts.is_empty() {
        println!("  Conflicts:    {}", package.conflicts.join(", "));
    }
    if !package.tags.is_empty() {
        println!("  Tags:         {}", package.tags.join(", "));
    }
    if let Some(homepage) = &package.homepage {
        println!("  Homepage:     {}", homepage);
    }
    if let Some(license) = &package.license {
        println!("  License:      {}", license);
    }
    if let Some(reason) = package.installability.reason() {
        println!("  Unavailable:  {}", reason);
    }
    match &package.status.installed_version {
        Some(installed) => {
            println!("  Installed:    {}", installed);
            if package.status.needs_update {
                println!("  Update:       {} available", package.version);
            }
            if let Some(reason) = &package.status.maintenance_reason {
                println!("  Maintenance:  {}", reason);
            }
        }
        None => println!("  Installed:    no"),
    }
    Ok(())
}

/// Refuse mutating commands while the catalog is in maintenance
fn ensure_not_in_maintenance(manager: &PackageManager) -> Result<()> {
    let status = manager.resolver().load_maintenance_status();
    if status.blocks(APP_VERSION) {
        return Err(anyhow::anyhow!(
            "{}: {} (estimated: {})",
            status.title,
            status.message,
            status.estimated_time
        ));
    }
    Ok(())
}

pub fn cmd_install(manager: &PackageManager, id: &str) -> Result<()> {
    ensure_not_in_maintenance(manager)?;

    let progress = CliProgress::new(format!("Installing {}", id));
    match manager.install(id, &progress) {
        Ok(outcome) => {
            progress.finish_with_message(format!("Installed {} {}", outcome.id, outcome.version));
            if let Some(code) = outcome.script_exit_code
                && code != 0
            {
                warn!("Post-install script for {} exited with {}", outcome.id, code);
            }
            println!(
                "Installed {} {} to {} ({} commands)",
                outcome.id,
                outcome.version,
                outcome.install_path.display(),
                outcome.shims.len()
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon_with_message(format!("Failed to install {}", id));
            Err(e).with_context(|| format!("Failed to install '{}'", id))
        }
    }
}

pub fn cmd_remove(manager: &PackageManager, id: &str) -> Result<()> {
    manager
        .uninstall(id)
        .with_context(|| format!("Failed to remove '{}'", id))?;
    println!("Removed {}", id);
    Ok(())
}

pub fn cmd_update(manager: &PackageManager, id: &str) -> Result<()> {
    ensure_not_in_maintenance(manager)?;

    let progress = CliProgress::new(format!("Updating {}", id));
    match manager.update(id, &progress) {
        Ok(outcome) => {
            progress.finish_with_message(format!("Updated {} to {}", outcome.id, outcome.version));
            Ok(())
        }
        Err(e) => {
            progress.abandon_with_message(format!("Failed to update {}", id));
            Err(e).with_context(|| format!("Failed to update '{}'", id))
        }
    }
}

/// Update every package with a pending update; one failure does not stop the rest
pub fn cmd_update_all(manager: &PackageManager) -> Result<()> {
    ensure_not_in_maintenance(manager)?;

    let results = manager.update_all().context("Failed to load catalog")?;
    if results.is_empty() {
        println!("All packages are up to date");
        return Ok(());
    }

    let mut failed = 0;
    for (id, result) in &results {
        match result {
            Ok(outcome) => println!("Updated {} to {}", id, outcome.version),
            Err(e) => {
                failed += 1;
                println!("Failed to update {}: {}", id, e);
            }
        }
    }

    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} updates failed",
            failed,
            results.len()
        ));
    }
    Ok(())
}

pub fn cmd_repair(manager: &PackageManager, id: &str) -> Result<()> {
    ensure_not_in_maintenance(manager)?;

    let progress = CliProgress::new(format!("Repairing {}", id));
    match manager.repair(id, &progress) {
        Ok(outcome) => {
            progress.finish_with_message(format!("Repaired {} {}", outcome.id, outcome.version));
            Ok(())
        }
        Err(e) => {
            progress.abandon_with_message(format!("Failed to repair {}", id));
            Err(e).with_context(|| format!("Failed to repair '{}'", id))
        }
    }
}

pub fn cmd_status(manager: &PackageManager) -> Result<()> {
    let status = manager.status().context("Failed to read engine status")?;

    println!("Mirror:         {}", status.mirror.local_path);
    println!("Remote:         {}", status.mirror.remote_url);
    println!("Initialized:    {}", if status.initialized { "yes" } else { "no" });
    if let Some(commit) = &status.mirror.current_commit_hash {
        println!("Commit:         {}", short_commit(commit));
    }
    if let Some(last) = &status.mirror.last_successful_sync {
        println!("Last sync:      {}", last);
    }
    match status.sync_age {
        Some(age) => println!("Sync age:       {}", human_duration(age)),
        None => println!("Sync age:       never"),
    }
    if status.sync_required {
        println!("Sync required:  yes (run 'bountu sync')");
    }

    if status.maintenance.enabled {
        println!(
            "Maintenance:    {} - {}",
            status.maintenance.title, status.maintenance.message
        );
    }

    let app = &status.app_config;
    if app.update_required(APP_VERSION) {
        println!(
            "Client:         {} is below the minimum {}, please upgrade",
            APP_VERSION, app.min_version
        );
    } else if app.update_available(APP_VERSION) {
        println!("Client:         {} ({} available)", APP_VERSION, app.latest_version);
    } else {
        println!("Client:         {}", APP_VERSION);
    }
    if !app.message.is_empty() {
        println!("Notice:         {}", app.message);
    }

    if let Some(stats) = status.stats {
        println!();
        println!("Packages:       {}", stats.total);
        println!("Installed:      {}", stats.installed);
        println!("Updates:        {}", stats.updates_available);
        println!("Maintenance:    {}", stats.needs_maintenance);
        println!("Disk usage:     {}", human_size(stats.installed_size_bytes));
    }
    Ok(())
}

fn read_script(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| {
        fs::read_to_string(p).with_context(|| format!("Failed to read script {}", p.display()))
    })
    .transpose()
}

pub fn cmd_create_package(manager: &PackageManager, args: CreatePackageArgs) -> Result<()> {
    if Category::parse(&args.category).is_none() {
        warn!("Unknown category '{}', package will be listed under utilities", args.category);
    }

    let metadata = RawMetadata {
        install_script: read_script(args.install_script.as_deref())?,
        uninstall_script: read_script(args.uninstall_script.as_deref())?,
        id: args.id,
        name: args.name,
        version: args.version,
        description: args.description,
        category: args.category,
        size: args.size,
        dependencies: args.dependencies,
        conflicts: args.conflicts,
        tags: args.tags,
        download_url: args.url,
        checksum_sha256: args.checksum,
        platform: args.platform,
        architecture: args.architecture,
        homepage: args.homepage,
        license: args.license,
        maintainer: Some(manager.config().author.name.clone()),
    };

    let commit = manager
        .create_custom_package(&metadata)
        .with_context(|| format!("Failed to create package '{}'", metadata.id))?;
    println!("Created {} {} ({})", metadata.id, metadata.version, short_commit(&commit));
    Ok(())
}

fn print_summary(package: &PackageDescriptor) {
    let marker = match (&package.status.installed_version, package.status.needs_update) {
        _ if package.status.needs_maintenance => "!",
        (Some(_), true) => "^",
        (Some(_), false) => "*",
        (None, _) if !package.is_installable() => "-",
        (None, _) => " ",
    };
    println!(
        "{} {:<20} {:<12} {:<12} {}",
        marker, package.id, package.version, package.category, package.description
    );
}

fn short_commit(commit: &str) -> &str {
    commit.get(..10).unwrap_or(commit)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

fn human_duration(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..60 => format!("{}s", secs),
        60..3600 => format!("{}m", secs / 60),
        3600..86400 => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        _ => format!("{}d {}h", secs / 86400, (secs % 86400) / 3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1024), "1.0 KiB");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(Duration::from_secs(42)), "42s");
        assert_eq!(human_duration(Duration::from_secs(120)), "2m");
        assert_eq!(human_duration(Duration::from_secs(3 * 3600 + 600)), "3h 10m");
        assert_eq!(human_duration(Duration::from_secs(2 * 86400 + 3600)), "2d 1h");
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456789");
        assert_eq!(short_commit("abc"), "abc");
    }
}
