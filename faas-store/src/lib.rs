//! The storage collaborator (§4.6): a filesystem-backed content store for
//! deployed function artifacts, rooted at a configurable directory.
//!
//! Layout under `<root>`:
//! ```text
//! <root>/<id>/code.<ext>   the stored artifact
//! <root>/<id>/meta.json    the serialized FunctionDescriptor
//! <root>/by-name/<name>    a pointer file containing the latest id for name
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use faas_common::ids::{function_id, unix_millis_now};
use faas_common::model::{FunctionDescriptor, FunctionId, Language};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("function not found: {0}")]
    FunctionNotFound(String),
    #[error("unknown language tag: {0}")]
    UnknownLanguage(String),
    #[error("internal store error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn internal<M: std::fmt::Display>(msg: M) -> Self {
        StoreError::Internal(anyhow::anyhow!(msg.to_string()))
    }
}

#[async_trait]
pub trait FunctionStore: Send + Sync {
    async fn store(
        &self,
        name: &str,
        lang: &str,
        code: &[u8],
    ) -> Result<FunctionDescriptor, StoreError>;

    async fn load_code(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    async fn load_meta(&self, id: &str) -> Result<FunctionDescriptor, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<FunctionId, StoreError>;
}

/// Maps a deploy-time `lang` tag (finer-grained than [`Language`], e.g.
/// "python" vs "js") to the [`Language`] the dispatch core cares about and
/// the file extension the reference store uses for the stored artifact.
fn classify_lang(lang: &str) -> Result<(Language, &'static str), StoreError> {
    match lang {
        "python" | "py" => Ok((Language::ScriptInterpreted, "py")),
        "js" | "javascript" | "node" => Ok((Language::ScriptInterpreted, "js")),
        "sh" | "shell" | "bash" => Ok((Language::ScriptInterpreted, "sh")),
        "native" | "native-sandboxed" => Ok((Language::NativeSandboxed, "bin")),
        "static" | "static-asset" | "asset" => Ok((Language::StaticAsset, "bin")),
        other => Err(StoreError::UnknownLanguage(other.to_string())),
    }
}

pub struct FsFunctionStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsFunctionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsFunctionStore {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn dir_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn by_name_path(&self, name: &str) -> PathBuf {
        self.root.join("by-name").join(name)
    }
}

async fn read_or_not_found(path: &Path, what: &str) -> Result<Vec<u8>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::FunctionNotFound(what.to_string()))
        }
        Err(e) => Err(StoreError::internal(e)),
    }
}

#[async_trait]
impl FunctionStore for FsFunctionStore {
    async fn store(
        &self,
        name: &str,
        lang: &str,
        code: &[u8],
    ) -> Result<FunctionDescriptor, StoreError> {
        let (language, ext) = classify_lang(lang)?;

        let _guard = self.write_lock.lock().await;

        let id = function_id(name, unix_millis_now());
        let dir = self.dir_for(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(StoreError::internal)?;

        let artifact_path = dir.join(format!("code.{ext}"));
        tokio::fs::write(&artifact_path, code)
            .await
            .map_err(StoreError::internal)?;

        let descriptor = FunctionDescriptor {
            id: id.clone(),
            name: name.to_string(),
            language,
            entrypoint: name.to_string(),
            artifact_path: artifact_path.to_string_lossy().into_owned(),
        };

        let meta_bytes = serde_json::to_vec_pretty(&descriptor).map_err(StoreError::internal)?;
        tokio::fs::write(dir.join("meta.json"), meta_bytes)
            .await
            .map_err(StoreError::internal)?;

        let by_name_dir = self.root.join("by-name");
        tokio::fs::create_dir_all(&by_name_dir)
            .await
            .map_err(StoreError::internal)?;
        tokio::fs::write(self.by_name_path(name), id.as_bytes())
            .await
            .map_err(StoreError::internal)?;

        tracing::debug!(id = %descriptor.id, name, "stored function artifact");
        Ok(descriptor)
    }

    async fn load_code(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let descriptor = self.load_meta(id).await?;
        read_or_not_found(Path::new(&descriptor.artifact_path), id).await
    }

    async fn load_meta(&self, id: &str) -> Result<FunctionDescriptor, StoreError> {
        let bytes = read_or_not_found(&self.dir_for(id).join("meta.json"), id).await?;
        serde_json::from_slice(&bytes).map_err(StoreError::internal)
    }

    async fn find_by_name(&self, name: &str) -> Result<FunctionId, StoreError> {
        let bytes = read_or_not_found(&self.by_name_path(name), name).await?;
        String::from_utf8(bytes).map_err(StoreError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_find_by_name_resolves_the_latest_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());

        let first = store.store("hello", "python", b"print(1)").await.unwrap();
        let id = store.find_by_name("hello").await.unwrap();
        assert_eq!(id, first.id);

        let second = store.store("hello", "python", b"print(2)").await.unwrap();
        assert_ne!(first.id, second.id);
        let id = store.find_by_name("hello").await.unwrap();
        assert_eq!(id, second.id);
    }

    #[tokio::test]
    async fn load_code_round_trips_the_stored_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());

        let descriptor = store.store("echo", "sh", b"echo hi").await.unwrap();
        let code = store.load_code(&descriptor.id).await.unwrap();
        assert_eq!(code, b"echo hi");
    }

    #[tokio::test]
    async fn load_meta_reports_the_classified_language() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());

        let descriptor = store.store("native-thing", "native", b"\0elf").await.unwrap();
        let meta = store.load_meta(&descriptor.id).await.unwrap();
        assert_eq!(meta.language, Language::NativeSandboxed);
    }

    #[tokio::test]
    async fn unknown_id_is_function_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());
        let err = store.load_meta("does_not_exist").await.unwrap_err();
        assert!(matches!(err, StoreError::FunctionNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_language_tag_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsFunctionStore::new(dir.path());
        let err = store.store("x", "cobol", b"ignored").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownLanguage(_)));
        assert!(!dir.path().join("by-name").exists());
    }
}
