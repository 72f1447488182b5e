// src/archive/deb.rs

//! Debian package extraction
//!
//! A `.deb` is an AR container holding `debian-binary`, `control.tar.*`
//! and `data.tar.*`. Only the data member is extracted. It is spooled to a
//! temp file and handed to the tar extractor matching its own suffix;
//! control members are never written to the destination.

use super::{ArchiveFormat, ExtractError, extract_as};
use crate::progress::{ProgressReporter, StageProgress};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;

const DATA_MEMBER_PREFIX: &str = "data.tar";

/// Share of deb progress spent spooling the data member
const SPOOL_WEIGHT: f32 = 0.2;

pub(super) fn extract_deb(
    file_path: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressReporter,
) -> Result<(), ExtractError> {
    let file = File::open(file_path).map_err(|e| ExtractError::io(file_path, e))?;
    let mut archive = ar::Archive::new(BufReader::new(file));

    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.map_err(|e| ExtractError::corrupt(file_path, e))?;
        let name = String::from_utf8_lossy(entry.header().identifier())
            .trim_end_matches('/')
            .to_string();

        if !name.starts_with(DATA_MEMBER_PREFIX) {
            debug!("Skipping deb member {}", name);
            continue;
        }

        // Sub-suffix of the member picks the inner decoder
        let format = match ArchiveFormat::from_file_name(&name) {
            Some(
                format @ (ArchiveFormat::Tar
                | ArchiveFormat::TarGz
                | ArchiveFormat::TarXz
                | ArchiveFormat::TarZst),
            ) => format,
            _ => {
                return Err(ExtractError::UnsupportedFormat(format!(
                    "deb data member '{}'",
                    name
                )));
            }
        };

        let spooled = tempfile::Builder::new()
            .prefix("bountu-deb-")
            .suffix(&format!("-{}", name))
            .tempfile()
            .map_err(|e| ExtractError::io(&std::env::temp_dir(), e))?;
        {
            let mut out = spooled.as_file();
            io::copy(&mut entry, &mut out).map_err(|e| ExtractError::corrupt(file_path, e))?;
        }
        progress.report(SPOOL_WEIGHT);
        debug!("Spooled {} to {}", name, spooled.path().display());

        let inner = StageProgress::new(progress, SPOOL_WEIGHT, 1.0);
        return extract_as(format, spooled.path(), dest_dir, &inner);
    }

    Err(ExtractError::NoDataMember(file_path.to_path_buf()))
}
