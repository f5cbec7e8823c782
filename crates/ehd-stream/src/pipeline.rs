//! Stream pipeline state machine
//!
//! `Unconfigured -> Configured -> Running -> Configured (stopped)`. A
//! pipeline owns at most one execution thread; starting or reconfiguring
//! always stops and joins the previous one first.

use ehd_core::{StreamEndpoint, StreamInformation};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::description::build_description;
use crate::error::StreamError;
use crate::launcher::{GstLaunch, PipelineExit, PipelineLauncher, RunningPipeline};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct PipelineRun {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    finished: Arc<AtomicBool>,
}

pub struct StreamPipeline {
    info: StreamInformation,
    configured: bool,
    description: String,
    launcher: Arc<dyn PipelineLauncher>,
    run: Option<PipelineRun>,
    last_error: Arc<Mutex<Option<String>>>,
    poll_interval: Duration,
}

impl Default for StreamPipeline {
    fn default() -> Self {
        Self::new(Arc::new(GstLaunch::default()))
    }
}

impl std::fmt::Debug for StreamPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("info", &self.info)
            .field("configured", &self.configured)
            .field("running", &self.running())
            .finish()
    }
}

impl StreamPipeline {
    /// Create an unconfigured pipeline
    pub fn new(launcher: Arc<dyn PipelineLauncher>) -> Self {
        Self {
            info: StreamInformation::default(),
            configured: false,
            description: String::new(),
            launcher,
            run: None,
            last_error: Arc::new(Mutex::new(None)),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// How often the execution thread checks for termination
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn info(&self) -> &StreamInformation {
        &self.info
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether an execution thread is alive
    pub fn running(&self) -> bool {
        self.run
            .as_ref()
            .map(|run| !run.finished.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Message of the last launch or runtime failure
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the stream configuration, stopping any current run
    pub fn configure(&mut self, info: StreamInformation) {
        self.stop();
        self.description = build_description(&info);
        self.info = info;
        self.configured = true;
        debug!(pipeline = %self.description, "Stream configured");
    }

    /// Stop any run and forget the configuration
    pub fn unconfigure(&mut self) {
        self.stop();
        if self.configured {
            debug!(device = %self.info.device_path, "Stream unconfigured");
        }
        self.info = StreamInformation::default();
        self.description.clear();
        self.configured = false;
    }

    pub fn start(&mut self) -> Result<(), StreamError> {
        if !self.configured {
            return Err(StreamError::NotConfigured);
        }
        self.stop();

        let (stop_tx, stop_rx) = mpsc::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let worker = RunWorker {
            description: self.description.clone(),
            launcher: self.launcher.clone(),
            last_error: self.last_error.clone(),
            finished: finished.clone(),
            poll_interval: self.poll_interval,
        };

        let handle = std::thread::Builder::new()
            .name(format!("stream:{}", self.info.device_path))
            .spawn(move || worker.run(stop_rx))?;

        info!(device = %self.info.device_path, pipeline = %self.description, "Stream started");
        self.run = Some(PipelineRun {
            stop_tx,
            handle,
            finished,
        });
        Ok(())
    }

    /// Stop the current run and join its thread; no-op when idle
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        // A send error means the thread already exited
        let _ = run.stop_tx.send(());
        if run.handle.join().is_err() {
            error!(device = %self.info.device_path, "Stream thread panicked");
        }
        info!(device = %self.info.device_path, "Stream stopped");
    }

    /// Append an endpoint; takes effect on the next start
    pub fn add_endpoint(&mut self, endpoint: StreamEndpoint) {
        self.info.endpoints.push(endpoint);
        self.description = build_description(&self.info);
    }

    pub fn remove_endpoint(&mut self, index: usize) -> Result<StreamEndpoint, StreamError> {
        let len = self.info.endpoints.len();
        if index >= len {
            return Err(StreamError::EndpointIndexOutOfRange { index, len });
        }
        let endpoint = self.info.endpoints.remove(index);
        self.description = build_description(&self.info);
        Ok(endpoint)
    }
}

impl Drop for StreamPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RunWorker {
    description: String,
    launcher: Arc<dyn PipelineLauncher>,
    last_error: Arc<Mutex<Option<String>>>,
    finished: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl RunWorker {
    fn run(self, stop_rx: mpsc::Receiver<()>) {
        match self.launcher.launch(&self.description) {
            Ok(process) => self.supervise(process, stop_rx),
            Err(e) => {
                let error = StreamError::PipelineLaunchFailure(e.to_string());
                error!(pipeline = %self.description, "{}", error);
                self.record_error(error.to_string());
            }
        }
        self.finished.store(true, Ordering::Release);
    }

    fn supervise(&self, mut process: Box<dyn RunningPipeline>, stop_rx: mpsc::Receiver<()>) {
        loop {
            match stop_rx.recv_timeout(self.poll_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if let Err(e) = process.kill() {
                        warn!(error = %e, "Failed to tear down pipeline");
                    }
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            match process.try_wait() {
                Ok(None) => {}
                Ok(Some(PipelineExit::EndOfStream)) => {
                    info!(pipeline = %self.description, "Stream reached end of stream");
                    return;
                }
                Ok(Some(PipelineExit::LaunchFailed(message))) => {
                    let error = StreamError::PipelineLaunchFailure(message);
                    error!(pipeline = %self.description, "{}", error);
                    self.record_error(error.to_string());
                    return;
                }
                Ok(Some(PipelineExit::Failed(message))) => {
                    let error = StreamError::PipelineRuntimeError(message);
                    error!(pipeline = %self.description, "{}", error);
                    self.record_error(error.to_string());
                    return;
                }
                Err(e) => {
                    let error = StreamError::PipelineRuntimeError(e.to_string());
                    error!(pipeline = %self.description, "{}", error);
                    self.record_error(error.to_string());
                    let _ = process.kill();
                    return;
                }
            }
        }
    }

    fn record_error(&self, message: String) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
    }
}
