use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ExecutorError, Result};

/// Maps distinct command text to a materialised script file under
/// `work_directory`, written once and reused thereafter. Access is
/// serialised by a single mutex around the lookup/insert. Cache lifetime
/// is the process lifetime; nothing ever evicts an entry.
pub struct ScriptCache {
    work_directory: PathBuf,
    shell_path: String,
    scripts: Mutex<HashMap<String, PathBuf>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl ScriptCache {
    pub fn new(work_directory: impl Into<PathBuf>, shell_path: impl Into<String>) -> Self {
        Self {
            work_directory: work_directory.into(),
            shell_path: shell_path.into(),
            scripts: Mutex::new(HashMap::new()),
            next_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Returns the cached script path for `command`, writing a new script
    /// file the first time this command text is seen.
    pub fn get_or_create(&self, command: &str) -> Result<PathBuf> {
        let mut scripts = self.scripts.lock().expect("script cache mutex poisoned");
        if let Some(path) = scripts.get(command) {
            return Ok(path.clone());
        }

        let path = self.write_script(command)?;
        scripts.insert(command.to_string(), path.clone());
        Ok(path)
    }

    fn write_script(&self, command: &str) -> Result<PathBuf> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let path = self.work_directory.join(format!("script-{id}"));
        let contents = format!("#!{}\n{}\n", self.shell_path, command);
        std::fs::write(&path, contents).map_err(ExecutorError::ScriptWrite)?;
        set_executable(&path)?;
        Ok(path)
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o700);
    std::fs::set_permissions(path, perms).map_err(ExecutorError::ScriptWrite)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
