use std::path::{Path, PathBuf};

/// Scratch directory inside an output directory. Everything written here is
/// deleted when the value is dropped, so an export that fails halfway leaves
/// nothing behind.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
}

impl StagingArea {
    pub fn create(out_dir: &Path) -> std::io::Result<Self> {
        let path = out_dir.join(format!(".admitd-staging-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir(&path)?;
        tracing::debug!(path = %path.display(), "staging area created");
        Ok(Self { path })
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Move a finished file out of the staging area, replacing `dest`.
    pub fn publish(&self, name: &str, dest: &Path) -> std::io::Result<()> {
        let from = self.file(name);
        if std::fs::rename(&from, dest).is_err() {
            std::fs::copy(&from, dest)?;
        }
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "staging area not removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn published_file_survives_and_staging_is_removed() {
        let out = tempfile::tempdir().expect("tempdir");
        let dest = out.path().join("card.pdf");
        {
            let staging = StagingArea::create(out.path()).expect("staging");
            std::fs::write(staging.file("card.pdf"), b"%PDF").expect("write");
            staging.publish("card.pdf", &dest).expect("publish");
        }
        assert_eq!(entries(out.path()), vec!["card.pdf".to_string()]);
    }

    #[test]
    fn failure_path_leaves_nothing_behind() {
        let out = tempfile::tempdir().expect("tempdir");
        let attempt = || -> std::io::Result<()> {
            let staging = StagingArea::create(out.path())?;
            std::fs::write(staging.file("partial.pdf"), b"half")?;
            Err(std::io::Error::other("renderer failed"))
        };
        assert!(attempt().is_err());
        assert!(entries(out.path()).is_empty());
    }
}
