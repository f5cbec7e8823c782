//! Pipeline execution backends

use std::io::{self, BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How an execution ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    EndOfStream,
    /// The description was rejected or never reached PLAYING
    LaunchFailed(String),
    /// Failed after reaching PLAYING
    Failed(String),
}

/// A live execution of a pipeline description
pub trait RunningPipeline: Send {
    /// Non-blocking check for termination
    fn try_wait(&mut self) -> io::Result<Option<PipelineExit>>;

    /// Tear down the execution and wait for it to go away
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts executions of pipeline descriptions
pub trait PipelineLauncher: Send + Sync {
    fn launch(&self, description: &str) -> io::Result<Box<dyn RunningPipeline>>;
}

/// Runs descriptions with the `gst-launch-1.0` tool
///
/// The tool runs with `-e` so an interrupt becomes an end of stream.
/// Stopping sends SIGINT and escalates to SIGKILL after `stop_timeout`.
#[derive(Debug, Clone)]
pub struct GstLaunch {
    program: String,
    stop_timeout: Duration,
}

impl GstLaunch {
    pub const DEFAULT_PROGRAM: &'static str = "gst-launch-1.0";
    pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stop_timeout: Self::DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for GstLaunch {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM)
    }
}

impl PipelineLauncher for GstLaunch {
    fn launch(&self, description: &str) -> io::Result<Box<dyn RunningPipeline>> {
        debug!(program = %self.program, pipeline = %description, "Launching pipeline");

        let mut child = Command::new(&self.program)
            .arg("-e")
            .args(description.split_whitespace())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = Arc::new(Mutex::new(LaunchOutput::default()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let output = output.clone();
            readers.push(std::thread::spawn(move || read_output(stdout, output)));
        }
        if let Some(stderr) = child.stderr.take() {
            let output = output.clone();
            readers.push(std::thread::spawn(move || read_output(stderr, output)));
        }

        Ok(Box::new(GstProcess {
            child,
            readers,
            output,
            stop_timeout: self.stop_timeout,
        }))
    }
}

/// What the tool has reported so far
#[derive(Debug, Default)]
struct LaunchOutput {
    playing: bool,
    launch_error: Option<String>,
    last_error: Option<String>,
}

impl LaunchOutput {
    fn record(&mut self, line: &str) {
        if line.contains("erroneous pipeline") {
            error!(message = %line, "gst-launch rejected pipeline");
            self.launch_error = Some(line.to_string());
        } else if line.starts_with("ERROR") {
            error!(message = %line, "gst-launch error");
            self.last_error = Some(line.to_string());
        } else if line.starts_with("Setting pipeline to PLAYING") {
            self.playing = true;
            debug!(message = %line, "gst-launch");
        } else if line.starts_with("WARNING") {
            warn!(message = %line, "gst-launch");
        } else {
            debug!(message = %line, "gst-launch");
        }
    }

    /// Classify a nonzero exit
    fn failure(&mut self, status: std::process::ExitStatus) -> PipelineExit {
        let fallback = || format!("gst-launch exited with {}", status);
        if let Some(message) = self.launch_error.take() {
            return PipelineExit::LaunchFailed(message);
        }
        let message = self.last_error.take().unwrap_or_else(fallback);
        if self.playing {
            PipelineExit::Failed(message)
        } else {
            PipelineExit::LaunchFailed(message)
        }
    }
}

fn read_output(stream: impl io::Read, output: Arc<Mutex<LaunchOutput>>) {
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        output.lock().unwrap_or_else(|e| e.into_inner()).record(line);
    }
}

struct GstProcess {
    child: Child,
    readers: Vec<JoinHandle<()>>,
    output: Arc<Mutex<LaunchOutput>>,
    stop_timeout: Duration,
}

impl GstProcess {
    fn join_readers(&mut self) {
        for handle in self.readers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Ask the tool to finish with an end of stream
    fn interrupt(&self) -> io::Result<()> {
        let pid = libc::pid_t::try_from(self.child.id())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: signalling a child we own and have not yet reaped
        if unsafe { libc::kill(pid, libc::SIGINT) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn wait_until(&mut self, deadline: Instant) -> io::Result<bool> {
        loop {
            if self.child.try_wait()?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl RunningPipeline for GstProcess {
    fn try_wait(&mut self) -> io::Result<Option<PipelineExit>> {
        let Some(status) = self.child.try_wait()? else {
            return Ok(None);
        };
        self.join_readers();

        if status.success() {
            return Ok(Some(PipelineExit::EndOfStream));
        }
        let exit = self
            .output
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failure(status);
        Ok(Some(exit))
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_none() {
            let stopped = match self.interrupt() {
                Ok(()) => self.wait_until(Instant::now() + self.stop_timeout)?,
                Err(e) => {
                    warn!(error = %e, "Failed to interrupt pipeline");
                    false
                }
            };
            if stopped {
                info!("Pipeline finished after interrupt");
            } else {
                // Already exited processes report InvalidInput on kill
                match self.child.kill() {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
                    Err(e) => return Err(e),
                }
            }
        }
        self.child.wait()?;
        self.join_readers();
        Ok(())
    }
}
