//! Boundary to the file storage holding issue attachments.

use std::{io, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Failure raised by an attachment backend.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("invalid attachment reference `{0}`")]
    InvalidReference(String),
    #[error("attachment storage failed for `{reference}`")]
    Io {
        reference: String,
        #[source]
        source: io::Error,
    },
}

/// File received with an issue, not yet committed to storage.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Stores attachment bytes and hands back opaque references.
pub trait AttachmentStore: Send + Sync {
    /// Commit a file and return the reference recorded on the issue.
    fn put(&self, file: UploadedFile) -> BoxFuture<'static, Result<String, AttachmentError>>;
    fn read(&self, reference: &str) -> BoxFuture<'static, Result<Vec<u8>, AttachmentError>>;
    fn remove(&self, reference: &str) -> BoxFuture<'static, Result<(), AttachmentError>>;
}

/// Attachments kept as files under a local directory.
///
/// References are bare file names of the form `{uuid}-{sanitized original name}`.
#[derive(Clone)]
pub struct LocalAttachmentStore {
    root: Arc<PathBuf>,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, AttachmentError> {
        let valid = !reference.is_empty()
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !reference.starts_with('.');
        if valid {
            Ok(self.root.join(reference))
        } else {
            Err(AttachmentError::InvalidReference(reference.to_string()))
        }
    }
}

/// Keep the name readable while making it safe as a single path component.
fn sanitize_file_name(name: &str) -> String {
    let cleaned = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "attachment".into()
    } else {
        trimmed.chars().take(100).collect()
    }
}

/// Strip the storage prefix from a reference to recover the uploaded file name.
pub fn display_name(reference: &str) -> &str {
    // Uuid::simple renders 32 hex digits followed by our '-' separator.
    reference.get(33..).filter(|rest| !rest.is_empty()).unwrap_or(reference)
}

impl AttachmentStore for LocalAttachmentStore {
    fn put(&self, file: UploadedFile) -> BoxFuture<'static, Result<String, AttachmentError>> {
        let store = self.clone();
        Box::pin(async move {
            let reference = format!(
                "{}-{}",
                Uuid::new_v4().simple(),
                sanitize_file_name(&file.file_name)
            );
            let path = store.resolve(&reference)?;
            let io_error = |source: io::Error| AttachmentError::Io {
                reference: reference.clone(),
                source,
            };
            fs::create_dir_all(store.root.as_ref())
                .await
                .map_err(io_error)?;
            fs::write(&path, &file.bytes).await.map_err(io_error)?;
            Ok(reference)
        })
    }

    fn read(&self, reference: &str) -> BoxFuture<'static, Result<Vec<u8>, AttachmentError>> {
        let store = self.clone();
        let reference = reference.to_string();
        Box::pin(async move {
            let path = store.resolve(&reference)?;
            fs::read(&path)
                .await
                .map_err(|source| AttachmentError::Io { reference, source })
        })
    }

    fn remove(&self, reference: &str) -> BoxFuture<'static, Result<(), AttachmentError>> {
        let store = self.clone();
        let reference = reference.to_string();
        Box::pin(async move {
            let path = store.resolve(&reference)?;
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(AttachmentError::Io { reference, source }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_reduced_to_one_safe_component() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\shots\\bug 1.png"), "bug_1.png");
        assert_eq!(sanitize_file_name("..."), "attachment");
    }

    #[test]
    fn references_cannot_escape_the_root() {
        let store = LocalAttachmentStore::new("/tmp/uploads");
        assert!(store.resolve("../secret").is_err());
        assert!(store.resolve("a/b").is_err());
        assert!(store.resolve("0a1b-report.txt").is_ok());
    }

    #[tokio::test]
    async fn put_read_remove_cycle() {
        let root = std::env::temp_dir().join(format!("testroom-{}", Uuid::new_v4()));
        let store = LocalAttachmentStore::new(&root);

        let reference = store
            .put(UploadedFile {
                file_name: "trace.log".into(),
                bytes: b"stack".to_vec(),
            })
            .await
            .unwrap();
        assert_eq!(display_name(&reference), "trace.log");
        assert_eq!(store.read(&reference).await.unwrap(), b"stack");

        store.remove(&reference).await.unwrap();
        assert!(store.read(&reference).await.is_err());
        // Removing twice is harmless.
        store.remove(&reference).await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }
}
