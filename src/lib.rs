//! WebRunner: controllable execution of declarative browser test cases.
//!
//! The [`Runner`] facade wires the pieces together for a single-process
//! deployment: one shared control bus, one status bus, one alert bus, a
//! checkpoint store and the run/artifact sinks. Each started run gets its own
//! [`RunController`] driven on a spawned task; callers steer it through the
//! run id alone.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use webrunner::{Runner, TestCase, RunOptions, Step};
//! # async fn example(sessions: Arc<dyn webrunner::SessionFactory>) -> anyhow::Result<()> {
//! let runner = Runner::new(sessions);
//! let case = TestCase::new(
//!     "login flow",
//!     vec![
//!         Step::new("navigate").with_value("/login"),
//!         Step::new("fill").with_selector("#user").with_value("ada"),
//!         Step::new("click").with_selector("button[type=submit]"),
//!     ],
//! );
//! let handle = runner.start(case, RunOptions::new("https://app.example"));
//! runner.pause(handle.run_id()).await?;
//! runner.resume(handle.run_id()).await?;
//! let run = handle.wait().await?;
//! println!("finished: {:?}", run.status);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

pub use webrunner_checkpoint_store::{
    Checkpoint, CheckpointError, CheckpointStore, FsCheckpointStore, MemoryCheckpointStore,
};
pub use webrunner_control_bus::{BusError, ControlBus, InMemoryBus};
pub use webrunner_core_types::{
    AuthCredentials, AuthFailureAlert, CaseId, ControlAction, ControlMessage, Cookie, Run, RunId,
    RunOptions, RunProgress, RunStatus, ScreenshotMode, ScreenshotRef, SessionContext, Step,
    StatusMessage, StepAction, StepResult, TestCase, Viewport,
};
pub use webrunner_run_controller::{
    ArtifactStore, Buses, CapturePolicy, InMemoryArtifactStore, InMemoryRunStore, RunController,
    RunError, RunStore,
};
pub use webrunner_step_interpreter::{
    BrowserSession, SessionError, SessionFactory, StepError, StepInterpreter,
};

const CONTROL_BUS_CAPACITY: usize = 64;
const STATUS_BUS_CAPACITY: usize = 256;
const ALERT_BUS_CAPACITY: usize = 16;

/// Install a global tracing subscriber honoring `RUST_LOG`, defaulting to
/// `info` for this crate's modules.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("webrunner=info,webrunner_run_controller=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Handle to one spawned run.
pub struct RunHandle {
    run_id: RunId,
    handle: JoinHandle<Result<Run, RunError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Await the run's terminal state. Failed runs surface their
    /// [`RunError`]; completed and stopped runs return the final record.
    pub async fn wait(self) -> anyhow::Result<Run> {
        let run = self.handle.await??;
        Ok(run)
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Single-process run orchestrator.
///
/// Shares one set of buses and stores across every run it starts. The
/// session factory is the only mandatory collaborator; stores default to
/// in-memory implementations suitable for embedding and tests.
pub struct Runner {
    sessions: Arc<dyn SessionFactory>,
    checkpoints: Arc<dyn CheckpointStore>,
    runs: Arc<dyn RunStore>,
    artifacts: Arc<dyn ArtifactStore>,
    control: Arc<InMemoryBus<ControlMessage>>,
    status: Arc<InMemoryBus<StatusMessage>>,
    alerts: Arc<InMemoryBus<AuthFailureAlert>>,
}

impl Runner {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            sessions,
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            runs: Arc::new(InMemoryRunStore::new()),
            artifacts: Arc::new(InMemoryArtifactStore::new()),
            control: InMemoryBus::new(CONTROL_BUS_CAPACITY),
            status: InMemoryBus::new(STATUS_BUS_CAPACITY),
            alerts: InMemoryBus::new(ALERT_BUS_CAPACITY),
        }
    }

    /// Swap in a durable checkpoint store so runs survive process restarts.
    pub fn with_checkpoint_store(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn with_run_store(mut self, runs: Arc<dyn RunStore>) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_artifact_store(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Start a fresh run of the test case under a newly minted run id.
    pub fn start(&self, test_case: TestCase, options: RunOptions) -> RunHandle {
        self.spawn(RunId::new(), test_case, options)
    }

    /// Start a run under an existing run id. If the checkpoint store holds a
    /// checkpoint for that id, execution resumes at the first unexecuted
    /// step; otherwise this behaves like [`Runner::start`].
    pub fn start_with_id(&self, run_id: RunId, test_case: TestCase, options: RunOptions) -> RunHandle {
        self.spawn(run_id, test_case, options)
    }

    fn spawn(&self, run_id: RunId, test_case: TestCase, options: RunOptions) -> RunHandle {
        let buses = Buses {
            control: self.control.clone(),
            status: self.status.clone(),
            alerts: self.alerts.clone(),
        };
        let sessions = self.sessions.clone();
        let checkpoints = self.checkpoints.clone();
        let runs = self.runs.clone();
        let artifacts = self.artifacts.clone();
        let spawned_id = run_id.clone();

        let handle = tokio::spawn(async move {
            let controller = RunController::new(
                spawned_id, options, sessions, checkpoints, runs, artifacts, buses,
            )?;
            controller.execute(&test_case).await
        });

        info!(run_id = %run_id, "run started");
        RunHandle { run_id, handle }
    }

    /// Request a pause at the next step boundary.
    pub async fn pause(&self, run_id: &RunId) -> Result<(), BusError> {
        self.send(run_id, ControlAction::Pause).await
    }

    /// Resume a paused run.
    pub async fn resume(&self, run_id: &RunId) -> Result<(), BusError> {
        self.send(run_id, ControlAction::Resume).await
    }

    /// Request a graceful stop; the run finishes its in-flight step first.
    pub async fn stop(&self, run_id: &RunId) -> Result<(), BusError> {
        self.send(run_id, ControlAction::Stop).await
    }

    /// Ask the run to publish its current status immediately.
    pub async fn request_status(&self, run_id: &RunId) -> Result<(), BusError> {
        self.send(run_id, ControlAction::Status).await
    }

    async fn send(&self, run_id: &RunId, action: ControlAction) -> Result<(), BusError> {
        self.control
            .publish(ControlMessage::new(run_id.clone(), action))
            .await
    }

    /// Observe status broadcasts for all runs on this runner.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusMessage> {
        self.status.subscribe()
    }

    /// Observe authentication failure alerts for all runs on this runner.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AuthFailureAlert> {
        self.alerts.subscribe()
    }
}
