// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package download, archive extraction, and layout initialization.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use tracing::{debug, info};

use vext_adapters::TelemetryOp;
use vext_core::{codes, ExtError};

use crate::instance::HandlerInstance;

/// Download retry tunables. Production values are fixed; tests shrink the
/// delay so retry exhaustion runs in milliseconds.
#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    /// Retry rounds over the shuffled URI list.
    pub rounds: u32,
    /// Sleep between rounds.
    pub retry_delay: Duration,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self { rounds: 5, retry_delay: Duration::from_secs(60) }
    }
}

fn extract_zip(source: &Path, target: &Path) -> std::io::Result<()> {
    let file = fs::File::open(source)?;
    let mut archive = zip::ZipArchive::new(file).map_err(std::io::Error::other)?;
    archive.extract(target).map_err(std::io::Error::other)
}

/// Unzip a package into the handler base dir. On failure the zip and any
/// partially extracted tree are deleted so the next attempt starts clean.
fn unzip_package(source: &Path, target: &Path) -> bool {
    info!(pkg = %source.display(), "unzipping extension package");
    match extract_zip(source, target) {
        Ok(()) => true,
        Err(e) => {
            info!(pkg = %source.display(), error = %e, "error while unzipping extension package");
            let _ = fs::remove_file(source);
            if target.exists() {
                let _ = fs::remove_dir_all(target);
            }
            false
        }
    }
}

impl HandlerInstance {
    async fn download_one(&self, uri: &str, destination: &Path) -> bool {
        info!(handler = %self.full_name(), uri, "downloading extension package");
        match self.ctx.protocol.download_ext_handler_pkg(uri, destination).await {
            Ok(()) => true,
            Err(e) => {
                info!(uri, error = %e, "error downloading extension package");
                if destination.exists() {
                    let _ = fs::remove_file(destination);
                }
                false
            }
        }
    }

    /// Fetch and unpack the decided package.
    ///
    /// An existing destination zip is tried first as a cached hit. Misses
    /// retry up to `policy.rounds` rounds, shuffling the URI list each
    /// round and sleeping `policy.retry_delay` after each failed round.
    pub async fn download(&mut self, policy: &DownloadPolicy) -> Result<(), ExtError> {
        let started = Instant::now();
        self.set_operation(TelemetryOp::Download);

        let pkg = self.pkg.clone().ok_or_else(|| ExtError::download("No package uri found"))?;
        if pkg.uris.is_empty() {
            return Err(ExtError::download("No package uri found"));
        }

        let basename = pkg.uris[0].rsplit('/').next().unwrap_or(&pkg.uris[0]);
        let destination = self.ctx.conf.lib_dir.join(format!("{basename}.zip"));
        let base_dir = self.paths.base_dir();

        let mut package_exists = false;
        if destination.exists() {
            info!(pkg = %destination.display(), "using existing extension package");
            if unzip_package(&destination, &base_dir) {
                package_exists = true;
            } else {
                info!("the existing extension package is invalid, ignoring it");
            }
        }

        if !package_exists {
            let mut downloaded = false;
            let mut uris = pkg.uris.clone();
            let mut rng = rand::rng();
            for _round in 0..policy.rounds {
                uris.shuffle(&mut rng);
                for uri in &uris {
                    if !self.download_one(uri, &destination).await {
                        continue;
                    }
                    if unzip_package(&destination, &base_dir) {
                        downloaded = true;
                        break;
                    }
                }
                if downloaded {
                    break;
                }
                info!(
                    handler = %self.full_name(),
                    "failed to download the extension package from all uris, will retry"
                );
                tokio::time::sleep(policy.retry_delay).await;
            }

            if !downloaded {
                return Err(ExtError::download_with_code(
                    codes::PLUGIN_MANIFEST_DOWNLOAD_ERROR,
                    "Failed to download extension",
                ));
            }

            let duration = started.elapsed().as_millis() as u64;
            self.report_event("Download succeeded", true, Some(duration), true);
        }

        self.pkg_file = Some(destination);
        Ok(())
    }

    /// Lay out the freshly unpacked tree: execute bits, canonical manifest
    /// location, 0700 status/config dirs, placeholder status, resource
    /// accounting, and the handler environment file.
    pub async fn initialize(&mut self) -> Result<(), ExtError> {
        info!(handler = %self.full_name(), "initializing extension");
        let base_dir = self.paths.base_dir();

        add_user_execute_bit(&base_dir)
            .map_err(|e| ExtError::extension(format!("Failed to set execute bits: {e}")))?;

        let man_file = find_file(&base_dir, "HandlerManifest.json")
            .ok_or_else(|| ExtError::download("HandlerManifest.json not found"))?;
        if let Err(e) = save_canonical_manifest(&man_file, &self.paths.manifest_file()) {
            self.clean_install_artifacts();
            return Err(ExtError::download(format!("Failed to save HandlerManifest.json: {e}")));
        }

        if let Err(e) = self.create_layout_dirs() {
            self.clean_install_artifacts();
            return Err(ExtError::download(format!(
                "Failed to initialize extension '{}': {e}",
                self.full_name()
            )));
        }

        self.ctx.exec.create_extension_cgroups(&self.full_name()).await;

        if let Err(e) = vext_storage::write_handler_env(&self.paths) {
            self.clean_install_artifacts();
            return Err(e);
        }
        Ok(())
    }

    fn create_layout_dirs(&self) -> std::io::Result<()> {
        use std::os::unix::fs::DirBuilderExt;

        for dir in [self.paths.status_dir(), self.paths.conf_dir()] {
            if !dir.is_dir() {
                fs::DirBuilder::new().recursive(true).mode(0o700).create(&dir)?;
            }
        }

        // Reinstalls over surviving settings get a transitioning
        // placeholder so the control plane sees work in progress.
        let (seq_no, status_file) = self.status_file_path(None);
        if status_file.is_some() {
            vext_storage::write_placeholder_status(&self.paths, seq_no)?;
        }
        Ok(())
    }

    /// Remove the partial tree and package after a failed initialization.
    fn clean_install_artifacts(&self) {
        let base_dir = self.paths.base_dir();
        if base_dir.exists() {
            let _ = fs::remove_dir_all(&base_dir);
        }
        if let Some(pkg_file) = &self.pkg_file {
            if pkg_file.exists() {
                let _ = fs::remove_file(pkg_file);
            }
        }
        debug!(handler = %self.full_name(), "cleaned up partial install artifacts");
    }
}

/// Add the user execute bit to every file under `dir`, recursively.
fn add_user_execute_bit(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            add_user_execute_bit(&path)?;
        } else {
            let metadata = entry.metadata()?;
            let mut perms = metadata.permissions();
            perms.set_mode(perms.mode() | 0o100);
            fs::set_permissions(&path, perms)?;
        }
    }
    Ok(())
}

/// Depth-first search for a file name under `dir` (packages sometimes nest
/// their payload one level down).
fn find_file(dir: &Path, file_name: &str) -> Option<std::path::PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).collect();
    entries.sort();
    for path in &entries {
        if path.is_file() && path.file_name().is_some_and(|n| n == file_name) {
            return Some(path.clone());
        }
    }
    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_file(&path, file_name) {
                return Some(found);
            }
        }
    }
    None
}

/// Copy the found manifest to its canonical location at the base dir root.
fn save_canonical_manifest(found: &Path, canonical: &Path) -> std::io::Result<()> {
    if found == canonical {
        return Ok(());
    }
    let contents = fs::read_to_string(found)?;
    fs::write(canonical, contents)
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
