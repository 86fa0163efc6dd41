//! codeloop: the control core of an autonomous coding agent.
//!
//! - [`parser`] turns model output into text and tool blocks, and user input
//!   into `@`-mentions
//! - [`inference`] is the provider-neutral model interface with pricing,
//!   provider registry and configuration
//! - [`agent_core`] runs the loop: modes, context budget, approval, tools
//!
//! Hosts supply the capabilities ([`inference::ModelClient`],
//! [`agent_core::ApprovalGate`], [`agent_core::ToolExecutor`],
//! [`agent_core::Storage`], optionally [`agent_core::McpHub`]) and drive an
//! [`agent_core::AgentRunner`].

pub mod agent_core;
pub mod inference;
pub mod parser;

#[cfg(test)]
mod test_support;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;

/// Return the platform-standard data directory for codeloop.
///
/// - macOS: `~/Library/Application Support/codeloop/`
/// - Windows: `{FOLDERID_RoamingAppData}\codeloop\`
/// - Linux: `$XDG_DATA_HOME/codeloop/` (fallback `~/.local/share/codeloop/`)
///
/// Falls back to `~/.codeloop/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("codeloop");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codeloop")
}

/// Install the global `tracing` subscriber, logging to `log_dir/agent.log`.
///
/// Up to three previous logs are kept as `agent.log.1` (newest) through
/// `agent.log.3`. Every line is flushed as it is written, so a crashed task
/// still leaves its full trail. `RUST_LOG` replaces the default
/// `codeloop=info,warn` filter. Returns the path of the live log.
pub fn init_tracing(log_dir: &Path) -> anyhow::Result<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("agent.log");
    shift_log_generations(&log_path, LOG_GENERATIONS);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("codeloop=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(SyncedLogFile::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== codeloop starting ==="
    );
    Ok(log_path)
}

const LOG_GENERATIONS: u32 = 3;

/// Move every kept log one generation back and the live log into slot 1.
/// The oldest generation falls off the end.
fn shift_log_generations(log_path: &Path, generations: u32) {
    if generations == 0 {
        return;
    }
    let _ = std::fs::remove_file(generation_path(log_path, generations));
    for n in (1..generations).rev() {
        let _ = std::fs::rename(generation_path(log_path, n), generation_path(log_path, n + 1));
    }
    let _ = std::fs::rename(log_path, generation_path(log_path, 1));
}

/// `agent.log` → `agent.log.{n}`
fn generation_path(log_path: &Path, n: u32) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Log file handle shared by every subscriber writer. Writes are flushed
/// before they return.
#[derive(Clone)]
struct SyncedLogFile(Arc<Mutex<File>>);

impl SyncedLogFile {
    fn new(file: File) -> Self {
        Self(Arc::new(Mutex::new(file)))
    }

    fn locked(&self) -> io::Result<MutexGuard<'_, File>> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))
    }
}

impl Write for SyncedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.locked()?;
        let written = file.write(buf)?;
        file.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.locked()?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SyncedLogFile {
    type Writer = SyncedLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
