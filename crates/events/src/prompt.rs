// In crates/events/src/prompt.rs

use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Prompt modules loaded from disk on first use and shared afterwards.
///
/// Lookups take the shared lock; only the first load of a module takes the
/// exclusive one.
#[derive(Debug)]
pub struct PromptCache {
    dir: PathBuf,
    modules: RwLock<HashMap<String, Arc<str>>>,
}

impl PromptCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            modules: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the module `<dir>/<name>.md`, reading it on first use.
    pub fn get_or_load(&self, name: &str) -> Result<Arc<str>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::InvalidPromptName(name.to_string()));
        }
        let path = self.dir.join(format!("{name}.md"));
        self.get_or_load_with(name, || {
            std::fs::read_to_string(&path).map_err(|source| Error::PromptLoad {
                name: name.to_string(),
                source,
            })
        })
    }

    /// Like [`get_or_load`](Self::get_or_load) with a caller-supplied loader.
    pub fn get_or_load_with(
        &self,
        name: &str,
        load: impl FnOnce() -> Result<String>,
    ) -> Result<Arc<str>> {
        {
            let modules = self.modules.read().unwrap_or_else(|p| p.into_inner());
            if let Some(module) = modules.get(name) {
                return Ok(module.clone());
            }
        }

        let mut modules = self.modules.write().unwrap_or_else(|p| p.into_inner());
        // Another caller may have loaded it while we waited for the write lock.
        if let Some(module) = modules.get(name) {
            return Ok(module.clone());
        }
        let module: Arc<str> = Arc::from(load()?);
        tracing::debug!(name, bytes = module.len(), "Prompt module loaded.");
        modules.insert(name.to_string(), module.clone());
        Ok(module)
    }

    /// Forgets every loaded module so the next lookup rereads from disk.
    pub fn invalidate(&self) {
        self.modules
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
