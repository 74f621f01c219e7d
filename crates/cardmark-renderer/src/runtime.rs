use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// Environment variable naming the diagram runtime script.
pub const RUNTIME_ENV: &str = "CARDMARK_DIAGRAM_RUNTIME";

type Cache = Mutex<HashMap<PathBuf, Option<Arc<str>>>>;

static RUNTIME_CACHE: Lazy<Cache> = Lazy::new(|| Mutex::new(HashMap::new()));

/// A diagram runtime script on disk, read at most once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRuntime {
    path: PathBuf,
}

impl DiagramRuntime {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The runtime named by `CARDMARK_DIAGRAM_RUNTIME`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(RUNTIME_ENV)
            .filter(|value| !value.is_empty())
            .map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Script source, or `None` when the file cannot be read.
    ///
    /// Failures are logged once and remembered, so later notes render their
    /// diagrams as code without touching the disk again.
    pub fn load(&self) -> Option<Arc<str>> {
        if let Some(cached) = RUNTIME_CACHE
            .lock()
            .ok()
            .and_then(|cache| cache.get(&self.path).cloned())
        {
            return cached;
        }

        let loaded: Option<Arc<str>> = match fs::read_to_string(&self.path) {
            Ok(source) => Some(Arc::from(source)),
            Err(err) => {
                log::warn!(
                    "failed to load diagram runtime {}: {}",
                    self.path.display(),
                    err
                );
                None
            }
        };

        if let Ok(mut cache) = RUNTIME_CACHE.lock() {
            cache.insert(self.path.clone(), loaded.clone());
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::DiagramRuntime;
    use std::fs;

    #[test]
    fn loads_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.js");
        fs::write(&path, "var mermaid = {};").unwrap();

        let runtime = DiagramRuntime::new(&path);
        assert_eq!(runtime.load().as_deref(), Some("var mermaid = {};"));

        fs::write(&path, "changed").unwrap();
        assert_eq!(runtime.load().as_deref(), Some("var mermaid = {};"));
    }

    #[test]
    fn missing_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.js");
        let runtime = DiagramRuntime::new(&path);
        assert_eq!(runtime.path(), path.as_path());
        assert_eq!(runtime.load(), None);
        assert_eq!(runtime.load(), None);
    }
}
