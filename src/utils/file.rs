use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate};

use crate::error::{Context, Result};

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Local calendar date of the file's last modification, or `None` when the file is absent.
pub fn modified_date(path: &Path) -> Result<Option<NaiveDate>> {
    let metadata = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(anyhow::Error::from(err)
                .context(format!("Failed to stat {}", path.display()))
                .into());
        }
    };

    let modified = metadata
        .modified()
        .with_context(|| format!("No modification time for {}", path.display()))?;
    Ok(Some(DateTime::<Local>::from(modified).date_naive()))
}

/// Write the file through a sibling temp file and rename it into place.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    ensure_parent_dir(path)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    if let Err(err) = write(tmp_path) {
        let _ = fs::remove_file(tmp_path);
        return Err(err);
    }

    fs::rename(tmp_path, path).map_err(|err| {
        let _ = fs::remove_file(tmp_path);
        err
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_has_no_modified_date() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        assert_eq!(modified_date(&missing).unwrap(), None);
    }

    #[test]
    fn atomic_write_replaces_target_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("table.csv");

        write_atomically(&target, |tmp| {
            fs::write(tmp, "a,b\n1,2\n")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "a,b\n1,2\n");
        assert!(!dir.path().join("nested").join("table.csv.tmp").exists());
        assert_eq!(
            modified_date(&target).unwrap(),
            Some(Local::now().date_naive())
        );
    }

    #[test]
    fn failed_write_leaves_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("table.csv");
        fs::write(&target, "old").unwrap();

        let result = write_atomically(&target, |tmp| {
            fs::write(tmp, "partial")?;
            Err(crate::error::SyncError::message("boom"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
    }
}
