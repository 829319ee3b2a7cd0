// SPDX-License-Identifier: MIT OR Apache-2.0
//! Save sinks that receive graph snapshots.
//!
//! The editor hands a sink an owned [`GraphSnapshot`] and only reports
//! the outcome; a failed save never touches the in-memory graph.

use crate::notice::{Notice, NoticeSender};
use crate::snapshot::{GraphSnapshot, SnapshotError};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

/// What a sink did with a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Persisted before returning
    Saved,
    /// Accepted for later; the outcome is reported as a notice
    Queued,
}

/// Destination for graph snapshots
pub trait SaveSink {
    /// Persist (or queue) a snapshot
    fn save(&mut self, snapshot: GraphSnapshot) -> Result<SaveStatus, SaveError>;
}

/// Writes snapshots as pretty JSON
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Sink writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SaveSink for JsonFileSink {
    fn save(&mut self, snapshot: GraphSnapshot) -> Result<SaveStatus, SaveError> {
        std::fs::write(&self.path, snapshot.to_json()?)?;
        tracing::debug!(path = %self.path.display(), "Wrote graph snapshot");
        Ok(SaveStatus::Saved)
    }
}

/// Writes snapshots as pretty RON
#[derive(Debug, Clone)]
pub struct RonFileSink {
    path: PathBuf,
}

impl RonFileSink {
    /// Sink writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SaveSink for RonFileSink {
    fn save(&mut self, snapshot: GraphSnapshot) -> Result<SaveStatus, SaveError> {
        std::fs::write(&self.path, snapshot.to_ron()?)?;
        tracing::debug!(path = %self.path.display(), "Wrote graph snapshot");
        Ok(SaveStatus::Saved)
    }
}

/// Keeps snapshots in memory; can be told to fail
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Snapshots received so far
    pub saved: Vec<GraphSnapshot>,
    /// When set, every save fails with this reason
    pub fail_with: Option<String>,
}

impl SaveSink for MemorySink {
    fn save(&mut self, snapshot: GraphSnapshot) -> Result<SaveStatus, SaveError> {
        if let Some(reason) = &self.fail_with {
            return Err(SaveError::Rejected(reason.clone()));
        }
        self.saved.push(snapshot);
        Ok(SaveStatus::Saved)
    }
}

/// Runs another sink on a worker thread.
///
/// `save` only queues the snapshot; the worker reports each outcome
/// through the notice channel.
pub struct BackgroundSink {
    sender: Option<mpsc::Sender<GraphSnapshot>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl BackgroundSink {
    /// Spawn a worker that feeds `inner`
    pub fn spawn<S>(mut inner: S, notices: NoticeSender) -> Result<Self, SaveError>
    where
        S: SaveSink + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<GraphSnapshot>();
        let worker = thread::Builder::new()
            .name("graph-save".to_string())
            .spawn(move || {
                for snapshot in receiver {
                    let nodes = snapshot.nodes.len();
                    let notice = match inner.save(snapshot) {
                        Ok(_) => Notice::info(format!("Saved workflow ({nodes} nodes)")),
                        Err(e) => Notice::error(format!("Failed to save workflow: {e}")),
                    };
                    notices.notify(notice);
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Stop accepting snapshots and wait for queued ones to finish
    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Save worker panicked");
            }
        }
    }
}

impl SaveSink for BackgroundSink {
    fn save(&mut self, snapshot: GraphSnapshot) -> Result<SaveStatus, SaveError> {
        let sender = self.sender.as_ref().ok_or(SaveError::Disconnected)?;
        sender.send(snapshot).map_err(|_| SaveError::Disconnected)?;
        Ok(SaveStatus::Queued)
    }
}

impl Drop for BackgroundSink {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Save failure
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// File could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] SnapshotError),

    /// Destination refused the snapshot
    #[error("Save rejected: {0}")]
    Rejected(String),

    /// Background worker is gone
    #[error("Save worker is not running")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::graph::GraphStore;
    use crate::node::NodeKind;
    use crate::notice::NoticeLevel;

    fn snapshot() -> GraphSnapshot {
        let mut store = GraphStore::new();
        store.add_node(&NodeKind::Output.default_template(), Point::ZERO);
        store.snapshot()
    }

    #[test]
    fn test_json_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.json");
        JsonFileSink::new(&path).save(snapshot()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(GraphSnapshot::from_json(&text).unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_ron_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.ron");
        RonFileSink::new(&path).save(snapshot()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(GraphSnapshot::from_ron(&text).unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_file_sink_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("workflow.json");
        let err = JsonFileSink::new(path).save(snapshot()).unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }

    #[test]
    fn test_background_sink_reports_outcomes() {
        let (notices, receiver) = NoticeSender::channel();
        let mut sink = BackgroundSink::spawn(MemorySink::default(), notices.clone()).unwrap();
        assert_eq!(sink.save(snapshot()).unwrap(), SaveStatus::Queued);
        sink.shutdown();

        let failing = MemorySink {
            fail_with: Some("offline".into()),
            ..MemorySink::default()
        };
        let mut sink = BackgroundSink::spawn(failing, notices).unwrap();
        sink.save(snapshot()).unwrap();
        drop(sink);

        let levels: Vec<_> = receiver.drain().into_iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Error]);
    }
}
