//! # Tool Path Resolver
//!
//! Trova gli eseguibili esterni (ImageMagick, notifiche) in due posti:
//! - la directory configurata con `--im-dir` (o la variabile `SUP_TOOLS_DIR`)
//! - il `PATH` di sistema

use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Tool path resolver for a configured tools directory plus the system PATH
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    /// Directory searched before PATH
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver; an empty directory is treated as "not configured"
    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        let tools_dir = tools_dir
            .or_else(|| env::var_os("SUP_TOOLS_DIR").map(PathBuf::from))
            .filter(|dir| !dir.as_os_str().is_empty());
        Self { tools_dir }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        if let Some(ref tools_dir) = self.tools_dir {
            let candidate = tools_dir.join(Self::executable_name(tool_name));
            if candidate.is_file() {
                debug!("Using tool from tools dir: {} -> {:?}", tool_name, candidate);
                return Some(candidate);
            }
            debug!("Tool {} not in {:?}, falling back to PATH", tool_name, tools_dir);
        }

        self.find_in_system_path(tool_name)
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) && !tool_name.ends_with(".exe") {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Find tool in system PATH
    fn find_in_system_path(&self, tool_name: &str) -> Option<PathBuf> {
        let executable = Self::executable_name(tool_name);
        env::split_paths(&env::var_os("PATH")?)
            .map(|dir| dir.join(&executable))
            .find(|path| path.is_file())
    }
}
