//! Host isolation probe.
//!
//! The engine requires an execution environment it can own exclusively; the
//! probe verifies the host actually provides one before any load attempt is
//! made. A failed probe is terminal for the session, unlike a failed load.

use std::fs;
use std::path::PathBuf;

/// Reports whether the host environment provides the isolation guarantees
/// the engine requires.
pub trait IsolationProbe: Send + Sync {
    /// Verify the precondition. `Err` carries a human-readable detail of
    /// what the environment is missing.
    fn verify(&self) -> Result<(), String>;
}

/// Production probe: the engine scratch directory must be creatable and
/// restrictable to the owning user. A directory other users can write into
/// would let them tamper with staged inputs and outputs mid-run.
#[derive(Debug, Clone)]
pub struct ScratchDirIsolation {
    scratch_dir: PathBuf,
}

impl ScratchDirIsolation {
    /// Create a probe for the given scratch directory.
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }
}

impl IsolationProbe for ScratchDirIsolation {
    fn verify(&self) -> Result<(), String> {
        fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            format!(
                "cannot create scratch directory {}: {}",
                self.scratch_dir.display(),
                e
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = fs::metadata(&self.scratch_dir).map_err(|e| {
                format!(
                    "cannot stat scratch directory {}: {}",
                    self.scratch_dir.display(),
                    e
                )
            })?;

            let mut permissions = metadata.permissions();
            if permissions.mode() & 0o077 != 0 {
                permissions.set_mode(0o700);
                fs::set_permissions(&self.scratch_dir, permissions).map_err(|e| {
                    format!(
                        "scratch directory {} is accessible to other users and cannot be restricted: {}",
                        self.scratch_dir.display(),
                        e
                    )
                })?;

                let mode = fs::metadata(&self.scratch_dir)
                    .map_err(|e| format!("cannot re-stat scratch directory: {}", e))?
                    .permissions()
                    .mode();
                if mode & 0o077 != 0 {
                    return Err(format!(
                        "scratch directory {} remains accessible to other users (mode {:o})",
                        self.scratch_dir.display(),
                        mode & 0o777
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verify_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("nested/engine-scratch");

        let probe = ScratchDirIsolation::new(scratch.clone());
        assert!(probe.verify().is_ok());
        assert!(scratch.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_restricts_group_and_world_access() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("scratch");
        fs::create_dir(&scratch).unwrap();
        fs::set_permissions(&scratch, fs::Permissions::from_mode(0o777)).unwrap();

        let probe = ScratchDirIsolation::new(scratch.clone());
        assert!(probe.verify().is_ok());

        let mode = fs::metadata(&scratch).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_verify_uncreatable_directory_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let probe = ScratchDirIsolation::new(blocker.join("scratch"));
        let err = probe.verify().unwrap_err();
        assert!(err.contains("cannot create scratch directory"));
    }
}
