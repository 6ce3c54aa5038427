//! Whole-file commit with backup and temp-file rename
//!
//! Given the live file `F`:
//! 1. snapshot the database into `F.tmp`
//! 2. copy `F` to `F.bak`
//! 3. remove `F`
//! 4. rename `F.tmp` to `F`
//! 5. remove `F.bak` (and any leftover `F.tmp`)
//!
//! A failure in steps 3-4 removes `F` if present and renames `F.bak` back, so a
//! readable file is at `F` or `F.bak` at every instant: either the old or the
//! new content. Step 5 only removes a backup written by the same commit.

use crate::error::{CommitStep, ForestError, Result};
use rusqlite::{Connection, DatabaseName};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-system operations used by the commit sequence
///
/// The default methods go straight to `std::fs`; tests override individual
/// steps to simulate failures.
pub trait FileOps: Send + Sync + fmt::Debug {
    /// Write a full snapshot of `conn` to `dst`
    fn write_snapshot(&self, conn: &Connection, dst: &Path) -> io::Result<()> {
        conn.backup(DatabaseName::Main, dst, None)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Plain `std::fs` implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {}

/// `F` with `suffix` appended, e.g. `tree.db` -> `tree.db.bak`
pub fn sibling(live: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = live.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn step(step: CommitStep) -> impl FnOnce(io::Error) -> ForestError {
    move |source| ForestError::CommitFailed { step, source }
}

/// Persist the whole database to `live`
pub fn commit(conn: &Connection, live: &Path, ops: &dyn FileOps, keep_backup: bool) -> Result<()> {
    let tmp = sibling(live, "tmp");
    let bak = sibling(live, "bak");

    let mut backed_up = false;
    let result = promote(conn, live, &tmp, &bak, ops, &mut backed_up);

    if let Err(err) = result {
        warn!("Commit of {:?} failed: {}", live, err);
        if backed_up {
            rollback(live, &bak, ops);
        }
        discard(&tmp, ops);
        return Err(err);
    }

    // A backup this commit did not write may be the only good copy left
    if backed_up && !keep_backup {
        discard(&bak, ops);
    }
    discard(&tmp, ops);
    debug!("Committed {:?}", live);
    Ok(())
}

fn promote(
    conn: &Connection,
    live: &Path,
    tmp: &Path,
    bak: &Path,
    ops: &dyn FileOps,
    backed_up: &mut bool,
) -> Result<()> {
    // A stale temp file from an interrupted commit would not open as a database
    if ops.exists(tmp) {
        ops.remove(tmp).map_err(step(CommitStep::WriteTemp))?;
    }
    ops.write_snapshot(conn, tmp)
        .map_err(step(CommitStep::WriteTemp))?;

    // Nothing to back up before the very first commit
    if ops.exists(live) {
        if let Err(e) = ops.copy(live, bak) {
            // The live file is intact; a partial copy is worthless
            discard(bak, ops);
            return Err(step(CommitStep::Backup)(e));
        }
        *backed_up = true;
        ops.remove(live).map_err(step(CommitStep::RemoveLive))?;
    }

    ops.rename(tmp, live).map_err(step(CommitStep::Promote))?;
    Ok(())
}

fn rollback(live: &Path, bak: &Path, ops: &dyn FileOps) {
    if ops.exists(live) {
        if let Err(e) = ops.remove(live) {
            warn!("Rollback could not remove {:?}: {}", live, e);
            return;
        }
    }
    match ops.rename(bak, live) {
        Ok(()) => debug!("Restored {:?} from backup", live),
        // The backup stays on disk for manual recovery
        Err(e) => warn!("Rollback could not restore {:?} from {:?}: {}", live, bak, e),
    }
}

fn discard(path: &Path, ops: &dyn FileOps) {
    if ops.exists(path) {
        if let Err(e) = ops.remove(path) {
            warn!("Could not remove {:?}: {}", path, e);
        }
    }
}
