//! Filesystem-backed baseline store.
//!
//! Last-writer-wins per name. The root and its `diffs/` subdirectory are
//! created at mode 0o700 on first use; image files are written at 0o600.

use std::path::{Path, PathBuf};

use act_types::BridgeError;

/// Mapping from baseline name to PNG bytes under a root directory.
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    /// Store rooted at `<state_dir>/baselines`. Nothing is created until the
    /// first write.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            root: state_dir.join("baselines"),
        }
    }

    /// Directory holding the baseline PNGs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject names that could escape the store root: path separators and
    /// the `..` substring. Checked before any filesystem access.
    pub fn validate_name(name: &str) -> Result<(), BridgeError> {
        if name.is_empty() {
            return Err(BridgeError::invalid_input("baseline name must not be empty"));
        }
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(BridgeError::invalid_input(format!(
                "invalid baseline name: {name:?}"
            )));
        }
        Ok(())
    }

    /// Write a baseline, overwriting any previous one. Returns the path.
    pub fn save(&self, name: &str, png: &[u8]) -> Result<PathBuf, BridgeError> {
        Self::validate_name(name)?;
        self.ensure_dirs()?;
        let path = self.root.join(format!("{name}.png"));
        write_owner_only(&path, png)?;
        Ok(path)
    }

    /// Read a baseline, or `None` when it has never been saved.
    pub fn load(&self, name: &str) -> Result<Option<Vec<u8>>, BridgeError> {
        Self::validate_name(name)?;
        let path = self.root.join(format!("{name}.png"));
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::storage(e.to_string())),
        }
    }

    /// Whether a baseline exists on disk.
    pub fn exists(&self, name: &str) -> Result<bool, BridgeError> {
        Self::validate_name(name)?;
        Ok(self.root.join(format!("{name}.png")).is_file())
    }

    /// Names (without extension) of every stored baseline, sorted.
    pub fn list(&self) -> Result<Vec<String>, BridgeError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BridgeError::storage(e.to_string())),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BridgeError::storage(e.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(stem) = file_name.strip_suffix(".png") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Write the diff image for a mismatched comparison. Returns the path.
    pub fn save_diff(&self, name: &str, png: &[u8]) -> Result<PathBuf, BridgeError> {
        Self::validate_name(name)?;
        self.ensure_dirs()?;
        let path = self.root.join("diffs").join(format!("{name}.diff.png"));
        write_owner_only(&path, png)?;
        Ok(path)
    }

    fn ensure_dirs(&self) -> Result<(), BridgeError> {
        let diffs = self.root.join("diffs");
        std::fs::create_dir_all(&diffs).map_err(|e| BridgeError::storage(e.to_string()))?;
        set_mode(&self.root, 0o700);
        set_mode(&diffs, 0o700);
        Ok(())
    }
}

fn write_owner_only(path: &Path, bytes: &[u8]) -> Result<(), BridgeError> {
    std::fs::write(path, bytes).map_err(|e| BridgeError::storage(e.to_string()))?;
    set_mode(path, 0o600);
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}
