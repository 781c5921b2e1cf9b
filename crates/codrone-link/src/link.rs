use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use codrone_frame::{FrameError, FrameReader, SyncStats};
use codrone_transport::{LinkStream, TransportError};
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::error::Result;
use crate::manager::LinkManager;

const READER_THREAD_NAME: &str = "codrone-reader";

/// An open connection: a [`LinkManager`] plus the thread feeding it.
///
/// Derefs to the manager, so `link.send(...)` works directly. Dropping the
/// link closes it.
pub struct Link {
    manager: Arc<LinkManager>,
    running: Arc<AtomicBool>,
    stream: LinkStream,
    reader: Option<JoinHandle<SyncStats>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("stream", &self.stream)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Link {
    /// Start the reader thread over `stream` and return the open link.
    ///
    /// The reader polls with `config.read_poll`; any `frame.read_timeout`
    /// is overwritten with it so [`LinkManager::config`] shows what the
    /// stream actually uses.
    pub fn open(stream: LinkStream, mut config: LinkConfig) -> Result<Self> {
        config.frame.read_timeout = Some(config.read_poll);
        let read_half = stream.try_clone()?;
        let write_half = stream.try_clone()?;
        read_half.set_read_timeout(config.frame.read_timeout)?;
        write_half.set_write_timeout(config.frame.write_timeout)?;

        let reader = FrameReader::with_config(read_half, config.frame.clone());
        let max_errors = config.max_consecutive_read_errors;
        let manager = Arc::new(LinkManager::new(write_half, config));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let manager = Arc::clone(&manager);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(READER_THREAD_NAME.to_string())
                .spawn(move || read_loop(reader, &manager, &running, max_errors))
                .map_err(TransportError::Io)?
        };

        info!(transport = stream.transport_name(), "link opened");
        Ok(Self {
            manager,
            running,
            stream,
            reader: Some(handle),
        })
    }

    /// Shared handle to the manager, usable from other threads.
    pub fn manager(&self) -> Arc<LinkManager> {
        Arc::clone(&self.manager)
    }

    /// Whether the reader thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the reader, shut the stream down and cancel every waiter.
    ///
    /// Returns the synchronizer counters from the reader. Calling it again
    /// returns empty counters.
    pub fn close(&mut self) -> SyncStats {
        self.running.store(false, Ordering::Release);
        self.manager.close();
        if let Err(err) = self.stream.shutdown() {
            debug!(error = %err, "stream shutdown failed");
        }

        match self.reader.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!("reader thread panicked");
                SyncStats::default()
            }
            None => SyncStats::default(),
        }
    }
}

impl Deref for Link {
    type Target = LinkManager;

    fn deref(&self) -> &LinkManager {
        &self.manager
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if self.reader.is_some() {
            self.close();
        }
    }
}

fn read_loop(
    mut reader: FrameReader<LinkStream>,
    manager: &LinkManager,
    running: &AtomicBool,
    max_consecutive_errors: u32,
) -> SyncStats {
    let mut consecutive_errors = 0u32;

    while running.load(Ordering::Acquire) {
        match reader.read_frame() {
            Ok(received) => {
                consecutive_errors = 0;
                manager.on_frame_received(received);
            }
            Err(FrameError::Io(err))
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(FrameError::ConnectionClosed) => {
                if running.load(Ordering::Acquire) {
                    info!("peer closed the link");
                }
                break;
            }
            Err(err) => {
                consecutive_errors += 1;
                if consecutive_errors > max_consecutive_errors {
                    error!(error = %err, errors = consecutive_errors, "too many read errors, closing link");
                    break;
                }
                warn!(error = %err, errors = consecutive_errors, "read error");
            }
        }
    }

    running.store(false, Ordering::Release);
    manager.close();

    let stats = reader.stats();
    debug!(
        frames = stats.frames,
        discarded = stats.discarded(),
        skipped_bytes = stats.skipped_bytes,
        "reader stopped"
    );
    stats
}
