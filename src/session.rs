//! Open, dissect, rescan and close files through the format registry.
//!
//! A [`DissectSession`] owns at most one open file. Opening a new file
//! tears down the previous engine state before the new run starts, so
//! cached stream buffers and object tables never outlive their file.

use crate::config::DissectConfig;
use crate::diag::Diagnostics;
use crate::error::{DissectError, Result};
use crate::formats::{FormatEngine, FormatRegistry};
use crate::io::{ByteSource, MappedSource};
use crate::timeout::{with_timeout, TimeoutConfig};
use crate::tree::DissectionTree;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one engine run.
#[derive(Debug, Clone)]
pub struct Dissection {
    pub tree: DissectionTree,
    pub diagnostics: Diagnostics,
    pub engine: &'static str,
    /// False when the engine stopped at its first validation stage. The
    /// tree still holds whatever was built before that.
    pub complete: bool,
}

impl Dissection {
    pub fn to_json_pretty(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Report<'a> {
            engine: &'a str,
            complete: bool,
            tree: Vec<crate::tree::TreeSnapshot>,
            diagnostics: &'a [crate::diag::Diagnostic],
        }
        let report = Report {
            engine: self.engine,
            complete: self.complete,
            tree: self.tree.snapshot(),
            diagnostics: self.diagnostics.entries(),
        };
        serde_json::to_string_pretty(&report)
            .map_err(|e| DissectError::Config(format!("failed to serialize dissection: {}", e)))
    }
}

/// Run `engine` once over `source`.
fn run_engine(engine: &mut dyn FormatEngine, source: &dyn ByteSource) -> Dissection {
    let mut tree = DissectionTree::new();
    let mut diagnostics = Diagnostics::new();
    let outcome = engine.dissect(source, &mut tree, &mut diagnostics);
    if let Err(e) = &outcome {
        warn!(engine = engine.name(), error = %e, "Dissection stopped early");
    }
    debug!(
        engine = engine.name(),
        nodes = tree.len(),
        diagnostics = diagnostics.len(),
        "Dissection finished"
    );
    Dissection {
        tree,
        diagnostics,
        engine: engine.name(),
        complete: outcome.is_ok(),
    }
}

fn extension_of(path: &Path) -> Result<&str> {
    path.extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            DissectError::UnsupportedFormat(format!("{} has no file extension", path.display()))
        })
}

/// Currently open file.
struct OpenFile {
    path: Option<PathBuf>,
    source: Option<MappedSource>,
    engine: usize,
}

/// Stateful front end over a [`FormatRegistry`].
pub struct DissectSession {
    config: DissectConfig,
    registry: FormatRegistry,
    open: Option<OpenFile>,
    current: Option<Dissection>,
}

impl DissectSession {
    pub fn new(config: DissectConfig) -> Self {
        let registry = FormatRegistry::with_defaults(&config);
        Self::with_registry(config, registry)
    }

    /// Session over a caller-built registry.
    pub fn with_registry(config: DissectConfig, registry: FormatRegistry) -> Self {
        Self {
            config,
            registry,
            open: None,
            current: None,
        }
    }

    pub fn config(&self) -> &DissectConfig {
        &self.config
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Path of the open file, if it came from disk.
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().and_then(|f| f.path.as_deref())
    }

    pub fn current(&self) -> Option<&Dissection> {
        self.current.as_ref()
    }

    fn engine_index(&self, ext: &str) -> Result<usize> {
        self.registry
            .position_for_extension(ext)
            .ok_or_else(|| DissectError::UnsupportedFormat(format!("no engine for .{}", ext)))
    }

    fn engine_mut(&mut self, idx: usize) -> Result<&mut (dyn FormatEngine + 'static)> {
        self.registry
            .engine_at(idx)
            .ok_or_else(|| DissectError::Config(format!("engine slot {} is empty", idx)))
    }

    /// Map `path` and dissect it with the engine its extension selects.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<&Dissection> {
        let path = path.as_ref();
        let idx = self.engine_index(extension_of(path)?)?;
        self.close();

        let source = MappedSource::open(path, self.config.io.clone())
            .map_err(|e| crate::log_error!(DissectError::from(e), "open"))?;
        info!(path = %path.display(), size = source.len(), "Opening file");
        let dissection = run_engine(self.engine_mut(idx)?, &source);
        self.open = Some(OpenFile {
            path: Some(path.to_path_buf()),
            source: Some(source),
            engine: idx,
        });
        Ok(self.current.insert(dissection))
    }

    /// Dissect a caller-owned source. The session keeps no handle on it, so
    /// [`rescan`](Self::rescan) is unavailable afterwards.
    pub fn dissect_source(&mut self, ext: &str, source: &dyn ByteSource) -> Result<&Dissection> {
        let idx = self.engine_index(ext)?;
        self.close();

        let dissection = run_engine(self.engine_mut(idx)?, source);
        self.open = Some(OpenFile {
            path: None,
            source: None,
            engine: idx,
        });
        Ok(self.current.insert(dissection))
    }

    /// Rebuild the tree of the open file from scratch.
    pub fn rescan(&mut self) -> Result<&Dissection> {
        let open = self
            .open
            .as_ref()
            .ok_or_else(|| DissectError::Config("no file is open".into()))?;
        let source = open.source.as_ref().ok_or_else(|| {
            DissectError::Config("the open source is not owned by the session".into())
        })?;
        let engine = self.registry.engine_at(open.engine).ok_or_else(|| {
            DissectError::Config(format!("engine slot {} is empty", open.engine))
        })?;
        engine.close_file();
        let dissection = run_engine(engine, source);
        debug!(path = ?open.path, "Rescanned");
        Ok(self.current.insert(dissection))
    }

    /// Drop the open file together with all engine state built for it.
    pub fn close(&mut self) {
        if let Some(open) = self.open.take() {
            if let Some(engine) = self.registry.engine_at(open.engine) {
                engine.close_file();
            }
            debug!(path = ?open.path, "Closed file");
        }
        self.current = None;
    }
}

impl Drop for DissectSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// One-shot dissection of a file on disk.
pub fn dissect_path<P: AsRef<Path>>(path: P, config: &DissectConfig) -> Result<Dissection> {
    let mut session = DissectSession::new(config.clone());
    session.open(path)?;
    session
        .current
        .take()
        .ok_or_else(|| DissectError::Config("dissection produced no result".into()))
}

/// [`dissect_path`] on a blocking worker, bounded by
/// `config.budget.max_time_seconds` of wall-clock time.
pub async fn dissect_path_with_timeout(
    path: impl Into<PathBuf>,
    config: DissectConfig,
) -> Result<Dissection> {
    let path = path.into();
    let timeout = TimeoutConfig::new(
        config.budget.max_time_seconds,
        format!("dissect {}", path.display()),
    );
    let task = tokio::task::spawn_blocking(move || dissect_path(&path, &config));
    with_timeout(timeout, async move {
        task.await
            .map_err(|e| DissectError::Config(format!("dissection worker failed: {}", e)))?
    })
    .await
}
