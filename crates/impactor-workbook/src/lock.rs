//! Detection of concurrent writers on a spreadsheet file.
//!
//! Office suites leave an owner file next to a workbook while it is open:
//! Excel writes `~$<name>`, LibreOffice writes `.~lock.<name>#`. Either one
//! means saving now would race the other writer.

use crate::error::IoError;
use std::path::{Path, PathBuf};

/// Return the owner file that marks `path` as open elsewhere, if any.
pub fn lock_holder(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut candidates = vec![
        dir.join(format!("~${name}")),
        dir.join(format!(".~lock.{name}#")),
    ];
    if let Some(truncated) = excel_truncated_owner(name) {
        candidates.push(dir.join(truncated));
    }

    candidates.into_iter().find(|c| c.exists())
}

/// Excel's owner file for names whose stem runs past 7 characters: one
/// leading character is dropped for an 8-character stem, two for longer.
/// Shorter stems keep the full name, so no other sibling is consulted.
fn excel_truncated_owner(name: &str) -> Option<String> {
    let stem_len = Path::new(name).file_stem()?.to_str()?.chars().count();
    let drop = match stem_len {
        0..=7 => return None,
        8 => 1,
        _ => 2,
    };
    let tail: String = name.chars().skip(drop).collect();
    Some(format!("~${tail}"))
}

/// Fail with [`IoError::StorageBusy`] when another writer holds `path`.
pub fn ensure_unlocked(path: &Path) -> Result<(), IoError> {
    match lock_holder(path) {
        Some(holder) => Err(IoError::StorageBusy {
            path: path.to_path_buf(),
            holder: Some(holder),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_owner_file_means_unlocked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.xlsx");
        assert!(lock_holder(&path).is_none());
        assert!(ensure_unlocked(&path).is_ok());
    }

    #[test]
    fn excel_owner_file_marks_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.xlsx");
        std::fs::write(dir.path().join("~$incidents.xlsx"), b"owner").unwrap();

        let err = ensure_unlocked(&path).unwrap_err();
        match err {
            IoError::StorageBusy { holder, .. } => {
                assert!(holder.unwrap().ends_with("~$incidents.xlsx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn libreoffice_owner_file_marks_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.xlsx");
        std::fs::write(dir.path().join(".~lock.incidents.xlsx#"), b"owner").unwrap();
        assert!(ensure_unlocked(&path).unwrap_err().is_storage_busy());
    }

    #[test]
    fn truncated_excel_owner_file_marks_busy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("~$cidents.xlsx"), b"owner").unwrap();
        std::fs::write(dir.path().join("~$ncident.xlsx"), b"owner").unwrap();

        assert!(lock_holder(&dir.path().join("incidents.xlsx")).is_some());
        assert!(lock_holder(&dir.path().join("incident.xlsx")).is_some());
    }

    #[test]
    fn short_names_ignore_unrelated_owner_files() {
        let dir = tempfile::tempdir().unwrap();
        // Owner file of a different workbook, "report.xlsx" minus its first two chars.
        std::fs::write(dir.path().join("~$port.xlsx"), b"owner").unwrap();

        let path = dir.path().join("report.xlsx");
        assert!(lock_holder(&path).is_none());
        assert!(ensure_unlocked(&path).is_ok());
    }
}
