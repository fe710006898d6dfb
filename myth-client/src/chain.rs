//! `Chain`: a recorder's live-TV stream, modeled as a dynamically-growing,
//! ordered list of file-transfer segments. Mirrors `cmyth_livetv_chain_t`: a
//! background thread owns the chain's dedicated event connection, appends a
//! new [`ChainEntry`] every time `LIVETV_CHAIN_UPDATE` names this chain, and
//! readers cross segment boundaries transparently via [`Chain::request_block`]
//! and [`Chain::seek`].
//!
//! The worker holds only a [`Weak`] handle back to the owning [`Recorder`] —
//! the `Recorder` holds the `Chain` strongly, so a strong back-reference
//! would cycle and the chain would never drop.

use crate::connection::Connection;
use crate::event::{Event, EventConnection, EventKind};
use crate::file_transfer::{FileTransfer, SeekWhence};
use crate::program::ProgramInfo;
use crate::recorder::Recorder;
use myth_proto::error::{Error, Result};
use myth_proto::logging::{debug, warn, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default backpressure wait when a reader hits end-of-chain and wants to
/// block for the next segment rather than fail immediately.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// How often the worker wakes to re-check its cancellation flag between
/// event reads.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Bounds the `request_block` "segment exhausted, try the next one" loop so
/// a chain with no further segment forthcoming does not spin forever.
const MAX_ADVANCE_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChainState {
    Empty,
    Growing,
    Closed,
}

/// One segment of a live recording: the program it corresponds to, its byte
/// offset within the chain, and its (lazily opened) file transfer.
struct ChainEntry {
    program: Arc<ProgramInfo>,
    offset: u64,
    file: Option<Arc<FileTransfer>>,
}

type ChainCallback = dyn Fn(Arc<ProgramInfo>) + Send + Sync;

struct ChainInner {
    segments: Vec<ChainEntry>,
    /// Index of the current segment, or -1 when the chain has none yet.
    current: i64,
    callback: Option<Arc<ChainCallback>>,
    closed: bool,
}

/// A recorder's live-TV chain: a growing list of segments plus the
/// background worker that grows it.
pub struct Chain {
    id: String,
    recorder: Weak<Recorder>,
    rcvbuf: usize,
    inner: Mutex<ChainInner>,
    cv: Condvar,
    cancel: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    log: Logger,
}

impl Chain {
    /// Start the worker thread that tracks `chain_id` for `recorder`. Called
    /// immediately after the backend acknowledges `SPAWN_LIVETV`.
    pub fn spawn(recorder: Arc<Recorder>, chain_id: String, rcvbuf: usize, log: Logger) -> Result<Arc<Chain>> {
        let event = EventConnection::open(recorder.server(), recorder.port(), rcvbuf, log.clone())?;

        let chain = Arc::new(Chain {
            id: chain_id.clone(),
            recorder: Arc::downgrade(&recorder),
            rcvbuf,
            inner: Mutex::new(ChainInner { segments: Vec::new(), current: -1, callback: None, closed: false }),
            cv: Condvar::new(),
            cancel: AtomicBool::new(false),
            worker: Mutex::new(None),
            log,
        });

        let worker_chain = chain.clone();
        let handle = thread::Builder::new()
            .name(format!("mythchain-{}", chain_id))
            .spawn(move || worker_chain.run(event))
            .map_err(Error::from)?;

        *chain.worker.lock().unwrap() = Some(handle);
        Ok(chain)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ChainState {
        let inner = self.inner.lock().unwrap();
        if inner.closed {
            ChainState::Closed
        } else if inner.segments.is_empty() {
            ChainState::Empty
        } else {
            ChainState::Growing
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().segments.len()
    }

    pub fn current_index(&self) -> i64 {
        self.inner.lock().unwrap().current
    }

    pub fn current_program(&self) -> Option<Arc<ProgramInfo>> {
        let inner = self.inner.lock().unwrap();
        if inner.current < 0 {
            return None;
        }
        inner.segments.get(inner.current as usize).map(|entry| entry.program.clone())
    }

    /// Install a callback fired once, outside the chain mutex, when the
    /// chain installs its first segment (the `Empty -> Growing` transition).
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(Arc<ProgramInfo>) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().callback = Some(Arc::new(callback));
    }

    /// Block up to `timeout` for the next `append_segment` to land. Returns
    /// `true` if woken by a append, `false` on timeout.
    pub fn add_wait(&self, timeout: Duration) -> bool {
        let inner = self.inner.lock().unwrap();
        let (_inner, result) = self.cv.wait_timeout(inner, timeout).unwrap();
        !result.timed_out()
    }

    /// Make segment `index` current, opening its file transfer lazily if it
    /// has never been current before. A no-op (still `Ok`) if `index` is
    /// already current.
    pub fn switch_to(&self, index: i64) -> Result<()> {
        let len = self.inner.lock().unwrap().segments.len();
        if index < 0 || index as usize >= len {
            return Err(Error::InvalidArgument(format!("chain index out of range: {}", index)));
        }

        if self.inner.lock().unwrap().current == index {
            return Ok(());
        }

        self.ensure_open(index as usize)?;
        self.inner.lock().unwrap().current = index;
        Ok(())
    }

    pub fn switch(&self, delta: i64) -> Result<()> {
        let current = self.inner.lock().unwrap().current;
        self.switch_to(current + delta)
    }

    /// Jump past any stale segments to the newest one — used right after a
    /// channel change, where earlier segments belong to the old channel.
    pub fn switch_last(&self) -> Result<()> {
        let len = self.inner.lock().unwrap().segments.len();
        if len == 0 {
            return Err(Error::NotFound);
        }
        self.switch_to(len as i64 - 1)
    }

    /// Request a block from the current segment; on exhaustion (`0` bytes
    /// granted), advances to the next segment and retries, bounded so a
    /// chain with no further segment forthcoming does not spin forever.
    pub fn request_block(&self, len: usize) -> Result<i64> {
        for _ in 0..=MAX_ADVANCE_RETRIES {
            let index = self.current_index();
            if index < 0 {
                return Err(Error::NotFound);
            }

            let file = self.ensure_open(index as usize)?;
            let granted = file.request_block(len)?;
            if granted > 0 {
                return Ok(granted);
            }

            match self.switch(1) {
                Ok(()) => continue,
                Err(Error::InvalidArgument(_)) => return Ok(0),
                Err(err) => return Err(err),
            }
        }

        Ok(0)
    }

    /// Read bytes already granted by the last [`Chain::request_block`] call
    /// on whichever segment is current. A file-like read that crosses
    /// segment boundaries transparently, since `request_block` itself is
    /// what advances `current` when a segment is exhausted.
    pub fn get_block(&self, buf: &mut [u8]) -> Result<usize> {
        let index = self.require_current()?;
        let file = self.ensure_open(index as usize)?;
        file.get_block(buf)
    }

    /// Seek to an absolute (or chain-relative) offset, locating the
    /// containing segment by binary search over cumulative offsets and
    /// switching to it before seeking within it, so callers see one
    /// continuous stream rather than having to track segment boundaries
    /// themselves.
    pub fn seek(&self, offset: i64, whence: SeekWhence) -> Result<i64> {
        if offset == 0 && whence == SeekWhence::Cur {
            let file = self.ensure_open(self.require_current()? as usize)?;
            return file.seek(0, SeekWhence::Cur);
        }

        let target = match whence {
            SeekWhence::Set => offset,
            SeekWhence::Cur => {
                let index = self.require_current()?;
                let file = self.ensure_open(index as usize)?;
                let base = self.inner.lock().unwrap().segments[index as usize].offset as i64;
                base + file.position() + offset
            }
            SeekWhence::End => {
                let total: i64 = self.inner.lock().unwrap().segments.iter().map(|e| e.program.length()).sum();
                total + offset
            }
        };

        if target < 0 {
            return Err(Error::InvalidArgument("seek target precedes start of chain".into()));
        }

        let index = self.locate_segment(target)?;
        self.switch_to(index)?;
        let file = self.ensure_open(index as usize)?;
        let base = self.inner.lock().unwrap().segments[index as usize].offset as i64;
        file.seek(target - base, SeekWhence::Set)
    }

    fn require_current(&self) -> Result<i64> {
        let index = self.current_index();
        if index < 0 {
            return Err(Error::NotFound);
        }
        Ok(index)
    }

    /// Binary search over cumulative segment offsets for the segment whose
    /// span contains `target`.
    fn locate_segment(&self, target: i64) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        if inner.segments.is_empty() {
            return Err(Error::NotFound);
        }

        let mut lo: i64 = 0;
        let mut hi: i64 = inner.segments.len() as i64 - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if (inner.segments[mid as usize].offset as i64) <= target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Ok(lo)
    }

    /// Return segment `index`'s file transfer, opening it (a fresh control
    /// connection to the segment's hosting backend, plus a file
    /// announcement) on first use. The network round trip happens without
    /// holding the chain mutex so it cannot block `append_segment`.
    fn ensure_open(&self, index: usize) -> Result<Arc<FileTransfer>> {
        if let Some(file) = self.inner.lock().unwrap().segments.get(index).and_then(|e| e.file.clone()) {
            return Ok(file);
        }

        let program = self
            .inner
            .lock()
            .unwrap()
            .segments
            .get(index)
            .map(|e| e.program.clone())
            .ok_or_else(|| Error::InvalidArgument(format!("chain index out of range: {}", index)))?;

        let control = Arc::new(Connection::connect_ctrl(&program.host, program.port, self.rcvbuf, self.log.clone())?);
        let file = Arc::new(FileTransfer::open(&program, control, self.rcvbuf, self.log.clone())?);

        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.segments.get_mut(index) {
            if entry.file.is_none() {
                entry.file = Some(file.clone());
            }
            return Ok(entry.file.clone().unwrap());
        }
        Ok(file)
    }

    /// `Empty -> Growing` (first segment) or `Growing -> Growing`
    /// (subsequent segments): resolve the recorder's current program and, if
    /// it is a genuinely new segment, append it.
    fn append_segment(&self, event_chain_id: &str) -> Result<()> {
        if event_chain_id != self.id {
            return Ok(());
        }

        let recorder = self.recorder.upgrade().ok_or(Error::Cancelled)?;
        let program = recorder.get_cur_proginfo()?;

        // The server is between segments; nothing to append yet.
        if program.pathname.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(tip) = inner.segments.last() {
            if tip.program.pathname == program.pathname {
                return Ok(());
            }
        }

        let offset = inner.segments.last().map(|e| e.offset + e.program.length() as u64).unwrap_or(0);
        let became_first = inner.segments.is_empty();
        let program = Arc::new(program);

        inner.segments.push(ChainEntry { program: program.clone(), offset, file: None });
        if became_first {
            inner.current = 0;
        }
        let callback = inner.callback.clone();
        drop(inner);

        self.cv.notify_all();
        if became_first {
            if let Some(callback) = callback {
                callback(program);
            }
        }

        Ok(())
    }

    fn handle_event(&self, event: Event) {
        match event.kind {
            EventKind::LiveTvChainUpdate => {
                let chain_id = event.fields.first().cloned().unwrap_or_default();
                if let Err(err) = self.append_segment(&chain_id) {
                    debug!(self.log, "append_segment failed"; "error" => %err);
                }
            }
            EventKind::Close | EventKind::QuitLiveTv => {
                self.cancel.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    /// The chain worker body: cancellation is only observed between
    /// `get_event` calls, so a disabled-cancel window brackets each
    /// state-mutating `append_segment`/`handle_event` call.
    fn run(self: Arc<Self>, event: EventConnection) {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            match event.select(WORKER_POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    warn!(self.log, "chain event select failed"; "error" => %err);
                    break;
                }
            }

            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            match event.get_event() {
                Ok(ev) => self.handle_event(ev),
                Err(Error::Timeout) => continue,
                Err(err) => {
                    warn!(self.log, "chain event channel closed"; "error" => %err);
                    break;
                }
            }
        }

        event.close();
        self.inner.lock().unwrap().closed = true;
    }

    /// Cancel and join the worker thread. Idempotent: called both from
    /// explicit `Recorder::stop_livetv` and from `Drop`.
    pub fn close(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
impl Chain {
    /// A worker-less chain for exercising the pure segment-bookkeeping logic
    /// without a live recorder or event connection.
    fn new_bare(log: Logger) -> Chain {
        Chain {
            id: "test-chain".to_string(),
            recorder: Weak::new(),
            rcvbuf: 4096,
            inner: Mutex::new(ChainInner { segments: Vec::new(), current: -1, callback: None, closed: false }),
            cv: Condvar::new(),
            cancel: AtomicBool::new(false),
            worker: Mutex::new(None),
            log,
        }
    }

    fn push_test_segment(&self, pathname: &str, length: i64) {
        use crate::program::RecStatus;
        use chrono::Utc;

        let mut inner = self.inner.lock().unwrap();
        let offset = inner.segments.last().map(|e| e.offset + e.program.length() as u64).unwrap_or(0);

        let program = Arc::new(ProgramInfo {
            title: "Live".to_string(),
            subtitle: String::new(),
            description: String::new(),
            category: String::new(),
            chan_id: 1,
            chan_str: "1".to_string(),
            chan_sign: String::new(),
            chan_name: String::new(),
            pathname: pathname.to_string(),
            host: "localhost".to_string(),
            port: 6543,
            rec_start: Utc::now(),
            rec_end: Utc::now(),
            original_airdate: Utc::now(),
            length_bytes: length,
            rec_status: RecStatus::Recording,
            card_id: 0,
            flags: 0,
            rec_group: String::new(),
            series_id: String::new(),
            program_id: String::new(),
        });

        inner.segments.push(ChainEntry { program, offset, file: None });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myth_proto::logging::discard;

    #[test]
    fn test_new_chain_is_empty() {
        let chain = Chain::new_bare(discard());
        assert_eq!(chain.state(), ChainState::Empty);
        assert_eq!(chain.current_index(), -1);
    }

    #[test]
    fn test_appended_segment_offsets_are_monotonic() {
        let chain = Chain::new_bare(discard());
        chain.push_test_segment("/a.mpg", 1000);
        chain.push_test_segment("/b.mpg", 2000);
        chain.push_test_segment("/c.mpg", 500);

        let inner = chain.inner.lock().unwrap();
        assert_eq!(inner.segments[0].offset, 0);
        assert_eq!(inner.segments[1].offset, 1000);
        assert_eq!(inner.segments[2].offset, 3000);
    }

    #[test]
    fn test_switch_to_current_is_noop() {
        let chain = Chain::new_bare(discard());
        chain.push_test_segment("/a.mpg", 1000);
        chain.inner.lock().unwrap().current = 0;

        assert!(chain.switch_to(0).is_ok());
        assert_eq!(chain.current_index(), 0);
    }

    #[test]
    fn test_switch_to_out_of_range_errors() {
        let chain = Chain::new_bare(discard());
        chain.push_test_segment("/a.mpg", 1000);

        assert!(matches!(chain.switch_to(5), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_locate_segment_binary_search() {
        let chain = Chain::new_bare(discard());
        chain.push_test_segment("/a.mpg", 100);
        chain.push_test_segment("/b.mpg", 150);
        chain.push_test_segment("/c.mpg", 300);

        assert_eq!(chain.locate_segment(0).unwrap(), 0);
        assert_eq!(chain.locate_segment(99).unwrap(), 0);
        assert_eq!(chain.locate_segment(100).unwrap(), 1);
        assert_eq!(chain.locate_segment(249).unwrap(), 1);
        assert_eq!(chain.locate_segment(250).unwrap(), 2);
        assert_eq!(chain.locate_segment(10_000).unwrap(), 2);
    }

    #[test]
    fn test_add_wait_times_out_with_no_append() {
        let chain = Chain::new_bare(discard());
        assert!(!chain.add_wait(Duration::from_millis(20)));
    }
}
