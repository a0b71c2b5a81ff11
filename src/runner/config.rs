//! Shell executor configuration

use std::path::PathBuf;

/// Configuration for the shell executor
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Shell used to run step commands with `-c`
    pub shell: String,

    /// Timeout per step in seconds
    pub timeout_secs: u64,

    /// Working directory for every step; the current directory when unset
    pub working_dir: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout_secs: 3600,
            working_dir: None,
        }
    }
}

impl ShellConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}
