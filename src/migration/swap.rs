//! Promotion of the encrypted copy to the live path.
//!
//! ```text
//! live      → live.backup        (plus -wal / -shm / -journal)
//! live.temp → live
//! ```
//!
//! Only the second step can leave the canonical path empty, so a failure
//! there moves everything back.  A crash between the two steps is undone
//! by [`recover_interrupted`] on the next run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::StoreLayout;
use crate::errors::MigrationError;

/// File move used during promotion; injectable for failure tests.
pub type Renamer = dyn Fn(&Path, &Path) -> io::Result<()> + Send + Sync;

/// The default [`Renamer`].
pub fn fs_rename(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// Move the legacy store aside and the temp store into its place.
///
/// On failure every completed move is reversed, so the legacy store is
/// live again, and `SwapFailed` is returned.
pub(crate) fn promote(layout: &StoreLayout, rename: &Renamer) -> Result<(), MigrationError> {
    let live = layout.live();
    let backup = layout.backup();

    let mut plan = vec![(live.to_path_buf(), backup.clone())];
    plan.extend(
        StoreLayout::sidecars(live)
            .zip(StoreLayout::sidecars(&backup))
            .filter(|(from, _)| from.exists()),
    );

    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(plan.len());
    for (from, to) in plan {
        if let Err(e) = rename(&from, &to) {
            return Err(roll_back(
                &moved,
                rename,
                format!("moving {} aside: {e}", from.display()),
            ));
        }
        moved.push((from, to));
    }

    if let Err(e) = rename(&layout.temp(), live) {
        return Err(roll_back(
            &moved,
            rename,
            format!("moving encrypted store into place: {e}"),
        ));
    }

    info!(path = %live.display(), "encrypted store promoted");
    Ok(())
}

fn roll_back(moved: &[(PathBuf, PathBuf)], rename: &Renamer, cause: String) -> MigrationError {
    error!(cause = %cause, "store promotion failed, restoring legacy store");

    let mut unrestored = Vec::new();
    for (original, moved_to) in moved.iter().rev() {
        if let Err(e) = rename(moved_to, original) {
            error!(
                from = %moved_to.display(),
                to = %original.display(),
                error = %e,
                "failed to restore file"
            );
            unrestored.push(moved_to.display().to_string());
        }
    }

    if unrestored.is_empty() {
        info!("legacy store restored after failed promotion");
        MigrationError::SwapFailed(cause)
    } else {
        MigrationError::SwapFailed(format!(
            "{cause}; could not restore {}",
            unrestored.join(", ")
        ))
    }
}

/// Undo a promotion that died between its two renames.
///
/// Returns `true` if the backup was moved back to the live path.
pub(crate) fn recover_interrupted(
    layout: &StoreLayout,
    rename: &Renamer,
) -> Result<bool, MigrationError> {
    let live = layout.live();
    let backup = layout.backup();
    if live.exists() || !backup.exists() {
        return Ok(false);
    }

    rename(&backup, live).map_err(|e| {
        MigrationError::SwapFailed(format!("restoring interrupted backup: {e}"))
    })?;
    for (from, to) in StoreLayout::sidecars(&backup).zip(StoreLayout::sidecars(live)) {
        if from.exists() {
            rename(&from, &to).map_err(|e| {
                MigrationError::SwapFailed(format!("restoring {}: {e}", from.display()))
            })?;
        }
    }
    Ok(true)
}

/// Delete the backup and its side-cars. Failures are logged, not returned.
pub(crate) fn discard_backup(layout: &StoreLayout) {
    remove_store_files(&layout.backup());
}

/// Delete `path` and its side-cars, ignoring files that do not exist.
pub(crate) fn remove_store_files(path: &Path) {
    for file in std::iter::once(path.to_path_buf()).chain(StoreLayout::sidecars(path)) {
        match fs::remove_file(&file) {
            Ok(()) => info!(path = %file.display(), "removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %file.display(), error = %e, "could not remove file"),
        }
    }
}
