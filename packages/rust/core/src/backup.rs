//! Snapshot of an existing output directory before it is overwritten.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{info, instrument};

use doctidy_shared::{DocTidyError, Result};

/// Copy `output_dir` to `<backup_root>/backup_<YYYYmmdd_HHMMSS>`.
///
/// Returns `None` when there is nothing to back up.
#[instrument(skip_all, fields(output = %output_dir.display()))]
pub fn backup_output(
    output_dir: &Path,
    backup_root: &Path,
    stamp: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    if !output_dir.is_dir() {
        return Ok(None);
    }
    if backup_root.starts_with(output_dir) {
        return Err(DocTidyError::validation(format!(
            "backup directory {} is inside the output directory {}",
            backup_root.display(),
            output_dir.display()
        )));
    }

    let name = format!("backup_{}", stamp.format("%Y%m%d_%H%M%S"));
    let mut target = backup_root.join(&name);
    let mut n = 2;
    while target.exists() {
        target = backup_root.join(format!("{name}-{n}"));
        n += 1;
    }

    copy_dir(output_dir, &target)?;
    info!(path = %target.display(), "backup created");
    Ok(Some(target))
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| DocTidyError::io(to, e))?;

    let entries = std::fs::read_dir(from).map_err(|e| DocTidyError::io(from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DocTidyError::io(from, e))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| DocTidyError::io(&source, e))?;

        if file_type.is_dir() {
            copy_dir(&source, &dest)?;
        } else {
            std::fs::copy(&source, &dest).map_err(|e| DocTidyError::io(&source, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("doctidy-backup-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 23)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    #[test]
    fn copies_tree_with_timestamped_name() {
        let tmp = temp_dir();
        let output = tmp.join("knowledge-base");
        std::fs::create_dir_all(output.join("03-data-operations")).unwrap();
        std::fs::write(output.join("README.md"), "# KB").unwrap();
        std::fs::write(output.join("03-data-operations/add-record.md"), "# Add").unwrap();

        let backups = tmp.join("backups");
        let path = backup_output(&output, &backups, stamp()).unwrap().unwrap();
        assert_eq!(path, backups.join("backup_20250123_140509"));
        assert_eq!(std::fs::read_to_string(path.join("README.md")).unwrap(), "# KB");
        assert!(path.join("03-data-operations/add-record.md").exists());

        let again = backup_output(&output, &backups, stamp()).unwrap().unwrap();
        assert_eq!(again, backups.join("backup_20250123_140509-2"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_output_is_not_backed_up() {
        let tmp = temp_dir();
        let result = backup_output(&tmp.join("absent"), &tmp.join("backups"), stamp()).unwrap();
        assert!(result.is_none());
        assert!(!tmp.join("backups").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn backup_inside_output_is_rejected() {
        let tmp = temp_dir();
        let err = backup_output(&tmp, &tmp.join("backups"), stamp()).unwrap_err();
        assert!(err.to_string().contains("inside the output directory"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
