//! Output directory for generated certificates.
//!
//! Files are created once by the generator and never modified afterwards, so the
//! modification time doubles as the creation time for listing and cleanup.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use utoipa::ToSchema;

const PDF_EXTENSION: &str = "pdf";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A generated certificate on disk.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CertificateFile {
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CertificateStore {
    root: PathBuf,
}

impl CertificateStore {
    /// Open the store, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `certificate_<id>_<YYYYMMDD_HHMMSS>.pdf`, with the id made safe for a file name.
    pub fn certificate_filename(donation_id: &str, at: NaiveDateTime) -> String {
        format!(
            "certificate_{}_{}.pdf",
            Self::filename_stem(donation_id),
            at.format("%Y%m%d_%H%M%S")
        )
    }

    fn filename_stem(donation_id: &str) -> String {
        let safe_id = sanitize_filename::sanitize(donation_id);
        if safe_id.is_empty() {
            "certificate".to_string()
        } else {
            safe_id
        }
    }

    /// Reserve a file for a new certificate generated now.
    pub fn allocate(&self, donation_id: &str) -> io::Result<(String, PathBuf)> {
        self.allocate_at(donation_id, Local::now().naive_local())
    }

    /// Create an empty file under a name no other certificate holds. When the same
    /// second already has a certificate for this id, a `_2`, `_3`, ... suffix is added.
    pub fn allocate_at(
        &self,
        donation_id: &str,
        at: NaiveDateTime,
    ) -> io::Result<(String, PathBuf)> {
        let first = Self::certificate_filename(donation_id, at);
        let base = first.trim_end_matches(".pdf");

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let filename = if attempt == 1 {
                first.clone()
            } else {
                format!("{}_{}.pdf", base, attempt)
            };
            let path = self.root.join(&filename);

            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok((filename, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free certificate name for {}", base),
        ))
    }

    /// Remove a reserved or partially written certificate after a failed render.
    pub fn discard(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("Discarded {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to discard {}: {}", path.display(), e),
        }
    }

    /// Resolve a plain file name inside the store. Anything that could point elsewhere
    /// (separators, `..`, empty) resolves to nothing.
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\', '\0'])
        {
            return None;
        }

        let path = self.root.join(filename);
        path.is_file().then_some(path)
    }

    fn pdf_entries(&self) -> io::Result<Vec<(PathBuf, fs::Metadata)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION));
            if !is_pdf {
                continue;
            }

            let metadata = entry.metadata()?;
            if metadata.is_file() {
                entries.push((path, metadata));
            }
        }
        Ok(entries)
    }

    /// All certificates, newest first.
    pub fn list(&self) -> io::Result<Vec<CertificateFile>> {
        let mut files: Vec<(SystemTime, CertificateFile)> = Vec::new();

        for (path, metadata) in self.pdf_entries()? {
            let created = metadata.modified()?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            files.push((
                created,
                CertificateFile {
                    filename,
                    size: metadata.len(),
                    created: DateTime::<Utc>::from(created),
                },
            ));
        }

        files.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.filename.cmp(&b.1.filename))
        });
        Ok(files.into_iter().map(|(_, file)| file).collect())
    }

    /// Delete certificates older than `max_age` relative to `now`; returns how many were
    /// removed. Files that fail to delete are logged and not counted.
    pub fn cleanup(&self, max_age: Duration, now: SystemTime) -> io::Result<usize> {
        let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
        let mut deleted = 0;

        for (path, metadata) in self.pdf_entries()? {
            let created = metadata.modified()?;
            if created >= cutoff {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("Deleted expired certificate {}", path.display());
                    deleted += 1;
                }
                Err(e) => {
                    log::warn!("Failed to delete {}: {}", path.display(), e);
                }
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs::File;

    fn write_aged(store: &CertificateStore, name: &str, age: Duration) -> PathBuf {
        let path = store.root().join(name);
        fs::write(&path, b"%PDF-1.4").unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
        path
    }

    #[test]
    fn test_certificate_filename() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        assert_eq!(
            CertificateStore::certificate_filename("D-100", at),
            "certificate_D-100_20240115_090507.pdf"
        );
        let escaped = CertificateStore::certificate_filename("../../etc/passwd", at);
        assert!(escaped.starts_with("certificate_"));
        assert!(!escaped.contains('/'));
    }

    #[test]
    fn test_allocate_never_reuses_a_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path()).unwrap();
        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();

        let (first, first_path) = store.allocate_at("D-1", at).unwrap();
        let (second, _) = store.allocate_at("D-1", at).unwrap();
        // ids that sanitize to the same stem share the namespace
        let (third, _) = store.allocate_at("D/-1", at).unwrap();

        assert_eq!(first, "certificate_D-1_20240115_090507.pdf");
        assert_eq!(second, "certificate_D-1_20240115_090507_2.pdf");
        assert_ne!(third, first);
        assert_ne!(third, second);
        assert!(first_path.is_file());
        assert_eq!(store.list().unwrap().len(), 3);
    }

    #[test]
    fn test_discard_removes_reservation() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path()).unwrap();
        let (_, path) = store.allocate("D-1").unwrap();

        store.discard(&path);
        assert!(!path.exists());
        // already gone is fine
        store.discard(&path);
    }

    #[test]
    fn test_resolve_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path()).unwrap();
        write_aged(&store, "a.pdf", Duration::ZERO);

        assert!(store.resolve("a.pdf").is_some());
        assert!(store.resolve("missing.pdf").is_none());
        assert!(store.resolve("../a.pdf").is_none());
        assert!(store.resolve("..").is_none());
        assert!(store.resolve("").is_none());
    }

    #[test]
    fn test_list_newest_first_and_pdf_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path()).unwrap();
        write_aged(&store, "old.pdf", Duration::from_secs(7200));
        write_aged(&store, "new.pdf", Duration::from_secs(60));
        write_aged(&store, "middle.pdf", Duration::from_secs(3600));
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|f| f.filename).collect();
        assert_eq!(names, vec!["new.pdf", "middle.pdf", "old.pdf"]);
    }

    #[test]
    fn test_cleanup_only_removes_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path()).unwrap();
        write_aged(&store, "expired-1.pdf", Duration::from_secs(48 * 3600));
        write_aged(&store, "expired-2.pdf", Duration::from_secs(25 * 3600));
        let fresh = write_aged(&store, "fresh.pdf", Duration::from_secs(3600));
        let other = dir.path().join("ancient.txt");
        fs::write(&other, "x").unwrap();

        let deleted = store
            .cleanup(Duration::from_secs(24 * 3600), SystemTime::now())
            .unwrap();

        assert_eq!(deleted, 2);
        assert!(fresh.exists());
        assert!(other.exists());
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
