//! Test and helper mocks for sorter_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use sorter_traits::{BoxError, Catalog, TargetSpec, TargetStatus, Transport};

#[derive(Default)]
struct Wire {
    sent: Vec<String>,
    inbound: VecDeque<String>,
    fail_writes: bool,
}

/// Transport that records every written line and replays queued telemetry.
///
/// Clones share the same wire, so a test can keep a handle after moving one
/// into the gateway.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    wire: Arc<Mutex<Wire>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn wire(&self) -> MutexGuard<'_, Wire> {
        self.wire.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Lines written so far, without terminators.
    pub fn sent(&self) -> Vec<String> {
        self.wire().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.wire().sent.clear();
    }

    /// Queue a telemetry line for the next poll.
    pub fn push_inbound(&self, line: impl Into<String>) {
        self.wire().inbound.push_back(line.into());
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.wire().fail_writes = fail;
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        let mut w = self.wire();
        if w.fail_writes {
            return Err(Box::new(std::io::Error::other("recording transport: write refused")));
        }
        w.sent.push(line.to_string());
        Ok(())
    }

    fn poll_lines(&mut self) -> Result<Vec<String>, BoxError> {
        Ok(self.wire().inbound.drain(..).collect())
    }
}

/// Vector-backed catalog; records every `mark_processed` call.
#[derive(Clone, Default)]
pub struct VecCatalog {
    inner: Arc<Mutex<(Vec<TargetSpec>, Vec<String>)>>,
}

impl VecCatalog {
    pub fn new(targets: Vec<TargetSpec>) -> Self {
        Self {
            inner: Arc::new(Mutex::new((targets, Vec::new()))),
        }
    }

    /// Ids passed to `mark_processed`, in call order.
    pub fn processed(&self) -> Vec<String> {
        self.inner.lock().map(|g| g.1.clone()).unwrap_or_default()
    }
}

impl Catalog for VecCatalog {
    fn fetch_pending(&mut self, _status_filter: &str) -> Result<Vec<TargetSpec>, BoxError> {
        let g = self.inner.lock().map_err(|_| "vec catalog poisoned")?;
        Ok(g.0
            .iter()
            .filter(|t| t.status == TargetStatus::Pending)
            .cloned()
            .collect())
    }

    fn mark_processed(&mut self, common_id: &str) -> Result<(), BoxError> {
        let mut g = self.inner.lock().map_err(|_| "vec catalog poisoned")?;
        let t = g
            .0
            .iter_mut()
            .find(|t| t.common_id == common_id)
            .ok_or_else(|| format!("unknown common id '{common_id}'"))?;
        t.status = TargetStatus::Processed;
        g.1.push(common_id.to_string());
        Ok(())
    }
}
