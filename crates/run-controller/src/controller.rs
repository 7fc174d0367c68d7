//! The per-run state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use webrunner_checkpoint_store::{Checkpoint, CheckpointStore};
use webrunner_control_bus::{subscribe_run, ControlBus, RunSubscription};
use webrunner_core_types::{
    AuthFailureAlert, ControlAction, ControlMessage, Run, RunId, RunOptions, RunProgress,
    RunStatus, SessionContext, StatusMessage, TestCase,
};
use webrunner_step_interpreter::{BrowserSession, SessionFactory, StepInterpreter};

use crate::capture::CapturePolicy;
use crate::control::ControlState;
use crate::errors::RunError;
use crate::preflight::run_preflight;
use crate::stores::{ArtifactStore, RunStore};

/// Wait slice while paused; bounds how quickly resume/stop are observed.
const PAUSE_WAIT_SLICE: Duration = Duration::from_millis(250);

const DEFAULT_BROWSER_LABEL: &str = "chromium";

/// Bus endpoints shared by every controller instance in a process.
#[derive(Clone)]
pub struct Buses {
    pub control: Arc<dyn ControlBus<ControlMessage>>,
    pub status: Arc<dyn ControlBus<StatusMessage>>,
    pub alerts: Arc<dyn ControlBus<AuthFailureAlert>>,
}

/// Drives one test case to a terminal state while honoring pause/resume/stop
/// requests delivered over the control bus.
///
/// A controller owns exactly one run id. Runs sharing a process are isolated
/// execution units; the only shared infrastructure is the checkpoint store
/// and the buses, both addressed by run id.
pub struct RunController {
    run_id: RunId,
    options: RunOptions,
    interpreter: StepInterpreter,
    capture: CapturePolicy,
    sessions: Arc<dyn SessionFactory>,
    checkpoints: Arc<dyn CheckpointStore>,
    runs: Arc<dyn RunStore>,
    artifacts: Arc<dyn ArtifactStore>,
    buses: Buses,
}

impl RunController {
    pub fn new(
        run_id: RunId,
        options: RunOptions,
        sessions: Arc<dyn SessionFactory>,
        checkpoints: Arc<dyn CheckpointStore>,
        runs: Arc<dyn RunStore>,
        artifacts: Arc<dyn ArtifactStore>,
        buses: Buses,
    ) -> Result<Self, RunError> {
        let interpreter = StepInterpreter::from_options(&options)
            .map_err(|err| RunError::InvalidOptions(err.to_string()))?;
        let capture = CapturePolicy::new(options.screenshot_mode, DEFAULT_BROWSER_LABEL);
        Ok(Self {
            run_id,
            options,
            interpreter,
            capture,
            sessions,
            checkpoints,
            runs,
            artifacts,
            buses,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Execute the test case to a terminal state.
    ///
    /// Completed and stopped runs are returned as `Ok`; failed runs are
    /// recorded into the run store and re-raised as `Err` for the caller to
    /// log. The browser session is released on every exit path.
    pub async fn execute(&self, test_case: &TestCase) -> Result<Run, RunError> {
        let checkpoint = match self.checkpoints.load(&self.run_id).await {
            Ok(found) => found,
            Err(err) => {
                warn!(run_id = %self.run_id, %err, "checkpoint load failed, starting fresh");
                None
            }
        };
        let resuming = checkpoint.is_some();

        let mut run = Run::new(self.run_id.clone(), test_case.id.clone());
        let restore = checkpoint.as_ref().map(|cp| cp.session_context.clone());
        if let Some(cp) = checkpoint {
            info!(
                run_id = %self.run_id,
                resume_at = cp.current_step_index,
                "resuming from checkpoint"
            );
            run.current_step_index = cp.current_step_index;
            run.step_log = cp.step_log;
            run.started_at = Some(cp.started_at);
        } else {
            run.started_at = Some(Utc::now());
        }
        run.status = RunStatus::Running;
        self.persist_run(&run).await;

        let mut control = subscribe_run(self.buses.control.as_ref(), self.run_id.clone());

        let session = match self.sessions.acquire(self.options.viewport).await {
            Ok(session) => session,
            Err(err) => {
                let fatal = RunError::SessionAcquisition(err.to_string());
                run.status = RunStatus::Failed;
                run.error = Some(fatal.to_string());
                run.completed_at = Some(Utc::now());
                self.persist_run(&run).await;
                self.publish_status(&run, test_case).await;
                return Err(fatal);
            }
        };

        let outcome = self
            .drive(test_case, &mut run, session.as_ref(), &mut control, resuming, restore)
            .await;

        // Guaranteed release on success, failure and stop alike.
        if let Err(err) = session.close().await {
            warn!(run_id = %self.run_id, %err, "browser session close failed");
        }
        drop(control);

        run.completed_at = Some(Utc::now());
        self.persist_run(&run).await;
        if let Err(err) = self.checkpoints.discard(&self.run_id).await {
            warn!(run_id = %self.run_id, %err, "checkpoint discard failed");
        }
        self.publish_status(&run, test_case).await;

        match outcome {
            Ok(()) => {
                info!(run_id = %self.run_id, status = ?run.status, "run finished");
                Ok(run)
            }
            Err(err) => {
                warn!(run_id = %self.run_id, %err, "run failed");
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        test_case: &TestCase,
        run: &mut Run,
        session: &dyn BrowserSession,
        control: &mut RunSubscription<ControlMessage>,
        resuming: bool,
        restore: Option<SessionContext>,
    ) -> Result<(), RunError> {
        if let Some(context) = restore {
            self.restore_session(session, context).await;
        }

        if self.options.requires_auth && !resuming {
            if let Err(err) = self.preflight(session).await {
                let alert = AuthFailureAlert::new(self.run_id.clone(), err.to_string());
                if let Err(bus_err) = self.buses.alerts.publish(alert).await {
                    warn!(run_id = %self.run_id, %bus_err, "auth failure alert not delivered");
                }
                run.status = RunStatus::Failed;
                run.error = Some(err.to_string());
                return Err(err);
            }
        }

        let mut state = ControlState::new();
        let total = test_case.steps.len();

        while run.current_step_index < total {
            // Sole cooperative suspension point: pause and stop are only
            // observed here, between steps.
            self.suspension_point(&mut state, control, run, test_case, session)
                .await;
            if state.stop_requested {
                break;
            }

            let index = run.current_step_index;
            let step = &test_case.steps[index];
            let mut result = self.interpreter.execute(session, index, step).await;
            self.capture
                .after_step(session, self.artifacts.as_ref(), &self.run_id, &mut result)
                .await;

            let failed = !result.success;
            let step_error = result.error.clone();
            run.step_log.push(result);
            run.current_step_index = index + 1;

            // Checkpoints mark successfully completed steps only; a failing
            // run terminates and must never be resumable past its failure.
            if !failed {
                self.save_checkpoint(run, session).await;
            }
            self.publish_status(run, test_case).await;

            if failed {
                let message =
                    step_error.unwrap_or_else(|| format!("step {index} failed without detail"));
                run.status = RunStatus::Failed;
                run.error = Some(message.clone());
                return Err(RunError::StepExecution { index, message });
            }
        }

        run.status = if state.stop_requested {
            // A stopped run keeps its partial log and carries no error.
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        };
        Ok(())
    }

    /// Block while paused, handling control traffic; returns once stepping
    /// may proceed or stop was requested.
    async fn suspension_point(
        &self,
        state: &mut ControlState,
        control: &mut RunSubscription<ControlMessage>,
        run: &mut Run,
        test_case: &TestCase,
        session: &dyn BrowserSession,
    ) {
        while let Some(message) = control.try_recv() {
            self.handle_control(state, run, test_case, session, message)
                .await;
        }

        while state.paused && !state.stop_requested {
            match tokio::time::timeout(PAUSE_WAIT_SLICE, control.recv()).await {
                Ok(Some(message)) => {
                    self.handle_control(state, run, test_case, session, message)
                        .await;
                }
                Ok(None) => {
                    // Bus gone: resume rather than strand the session in a
                    // pause nobody can lift.
                    warn!(run_id = %self.run_id, "control channel closed while paused, resuming");
                    state.paused = false;
                    run.status = RunStatus::Running;
                    self.persist_run(run).await;
                }
                Err(_) => {} // slice elapsed, check flags again
            }
        }
    }

    async fn handle_control(
        &self,
        state: &mut ControlState,
        run: &mut Run,
        test_case: &TestCase,
        session: &dyn BrowserSession,
        message: ControlMessage,
    ) {
        debug!(run_id = %self.run_id, action = ?message.action, "control message");
        match message.action {
            ControlAction::Pause => {
                if state.can_step() {
                    info!(run_id = %self.run_id, "pausing run");
                    state.paused = true;
                    run.status = RunStatus::Paused;
                    self.persist_run(run).await;
                    // Pause is a checkpoint boundary: another process may
                    // pick the run up from here.
                    self.save_checkpoint(run, session).await;
                }
            }
            ControlAction::Resume => {
                if state.paused && !state.stop_requested {
                    info!(run_id = %self.run_id, "resuming run");
                    state.paused = false;
                    run.status = RunStatus::Running;
                    self.persist_run(run).await;
                }
            }
            ControlAction::Stop => {
                info!(run_id = %self.run_id, "stop requested");
                state.stop_requested = true;
            }
            ControlAction::Status => {}
        }
        self.publish_status(run, test_case).await;
    }

    async fn preflight(&self, session: &dyn BrowserSession) -> Result<(), RunError> {
        let credentials = self.options.auth_credentials.as_ref().ok_or_else(|| {
            RunError::Authentication("authentication required but no credentials supplied".to_string())
        })?;
        run_preflight(session, self.interpreter.base_url(), credentials).await
    }

    async fn restore_session(&self, session: &dyn BrowserSession, context: SessionContext) {
        if !context.cookies.is_empty() {
            if let Err(err) = session.set_cookies(&context.cookies).await {
                warn!(run_id = %self.run_id, %err, "cookie restore failed");
            }
        }
        if let Some(url) = context.url {
            if let Err(err) = session.goto(&url).await {
                warn!(run_id = %self.run_id, %err, "session url restore failed");
            }
        }
    }

    async fn save_checkpoint(&self, run: &Run, session: &dyn BrowserSession) {
        let context = SessionContext {
            url: session.current_url().await.ok(),
            cookies: session.cookies().await.unwrap_or_default(),
        };
        let checkpoint = Checkpoint::new(
            run.current_step_index,
            run.step_log.clone(),
            context,
            run.started_at.unwrap_or_else(Utc::now),
        );
        if let Err(err) = self.checkpoints.save(&self.run_id, &checkpoint).await {
            warn!(run_id = %self.run_id, %err, "checkpoint save failed, resume may replay steps");
        }
    }

    async fn persist_run(&self, run: &Run) {
        if let Err(err) = self.runs.save(run).await {
            warn!(run_id = %self.run_id, %err, "run store save failed");
        }
    }

    async fn publish_status(&self, run: &Run, test_case: &TestCase) {
        let progress = RunProgress {
            current: run.current_step_index,
            total: test_case.steps.len(),
            current_step_name: test_case
                .steps
                .get(run.current_step_index)
                .map(|step| step.action.clone())
                .unwrap_or_default(),
        };
        let message = StatusMessage::now(self.run_id.clone(), run.status, progress);
        if let Err(err) = self.buses.status.publish(message).await {
            // Observers are optional; a quiet bus is a degraded mode, not a
            // failure of the run.
            debug!(run_id = %self.run_id, %err, "status publish skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{InMemoryArtifactStore, InMemoryRunStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use webrunner_checkpoint_store::MemoryCheckpointStore;
    use webrunner_control_bus::InMemoryBus;
    use webrunner_core_types::{Cookie, ScreenshotMode, Step, StepResult};
    use webrunner_step_interpreter::SessionError;

    /// Scripted browser: a global set of visible selectors, click-driven URL
    /// transitions, per-URL page text, and a call log.
    #[derive(Default)]
    struct TestSession {
        visible: Mutex<HashSet<String>>,
        url: Mutex<String>,
        calls: Mutex<Vec<String>>,
        click_routes: Mutex<HashMap<(String, String), String>>,
        page_texts: Mutex<HashMap<String, String>>,
        cookies: Mutex<Vec<Cookie>>,
        closes: AtomicUsize,
        fail_capture: AtomicBool,
    }

    impl TestSession {
        fn make_visible(&self, selectors: &[&str]) {
            let mut visible = self.visible.lock();
            for selector in selectors {
                visible.insert(selector.to_string());
            }
        }

        fn route_click(&self, from: &str, selector: &str, to: &str) {
            self.click_routes
                .lock()
                .insert((from.to_string(), selector.to_string()), to.to_string());
        }

        fn set_page_text(&self, url: &str, text: &str) {
            self.page_texts
                .lock()
                .insert(url.to_string(), text.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl BrowserSession for TestSession {
        async fn goto(&self, url: &str) -> Result<(), SessionError> {
            *self.url.lock() = url.to_string();
            self.calls.lock().push(format!("goto {url}"));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), SessionError> {
            self.calls.lock().push(format!("click {selector}"));
            let current = self.url.lock().clone();
            if let Some(next) = self
                .click_routes
                .lock()
                .get(&(current, selector.to_string()))
            {
                *self.url.lock() = next.clone();
            }
            Ok(())
        }

        async fn fill(&self, selector: &str, value: &str) -> Result<(), SessionError> {
            self.calls.lock().push(format!("fill {selector}={value}"));
            Ok(())
        }

        async fn select_option(&self, selector: &str, value: &str) -> Result<(), SessionError> {
            self.calls.lock().push(format!("select {selector}={value}"));
            Ok(())
        }

        async fn press_key(&self, key: &str) -> Result<(), SessionError> {
            self.calls.lock().push(format!("press {key}"));
            Ok(())
        }

        async fn is_visible(&self, selector: &str) -> Result<bool, SessionError> {
            Ok(self.visible.lock().contains(selector))
        }

        async fn text_content(&self, _selector: &str) -> Result<String, SessionError> {
            Ok(String::new())
        }

        async fn page_text(&self) -> Result<String, SessionError> {
            let current = self.url.lock().clone();
            Ok(self.page_texts.lock().get(&current).cloned().unwrap_or_default())
        }

        async fn current_url(&self) -> Result<String, SessionError> {
            Ok(self.url.lock().clone())
        }

        async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
            if self.fail_capture.load(Ordering::Relaxed) {
                Err(SessionError::Capture("render target gone".to_string()))
            } else {
                Ok(vec![0u8; 8])
            }
        }

        async fn cookies(&self) -> Result<Vec<Cookie>, SessionError> {
            Ok(self.cookies.lock().clone())
        }

        async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), SessionError> {
            self.calls.lock().push(format!("set_cookies {}", cookies.len()));
            *self.cookies.lock() = cookies.to_vec();
            Ok(())
        }

        async fn close(&self) -> Result<(), SessionError> {
            self.closes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct TestFactory {
        session: Arc<TestSession>,
        fail: bool,
    }

    #[async_trait]
    impl SessionFactory for TestFactory {
        async fn acquire(
            &self,
            _viewport: Option<webrunner_core_types::Viewport>,
        ) -> Result<Arc<dyn BrowserSession>, SessionError> {
            if self.fail {
                Err(SessionError::Acquisition("no browser available".to_string()))
            } else {
                Ok(self.session.clone())
            }
        }
    }

    /// Checkpoint store that keeps every blob ever written, so tests can
    /// assert on the full save history rather than just the latest state.
    #[derive(Default)]
    struct RecordingCheckpointStore {
        inner: MemoryCheckpointStore,
        saved: Mutex<Vec<Checkpoint>>,
    }

    #[async_trait]
    impl CheckpointStore for RecordingCheckpointStore {
        async fn save(
            &self,
            run_id: &RunId,
            checkpoint: &Checkpoint,
        ) -> Result<(), webrunner_checkpoint_store::CheckpointError> {
            self.saved.lock().push(checkpoint.clone());
            self.inner.save(run_id, checkpoint).await
        }

        async fn load(
            &self,
            run_id: &RunId,
        ) -> Result<Option<Checkpoint>, webrunner_checkpoint_store::CheckpointError> {
            self.inner.load(run_id).await
        }

        async fn discard(
            &self,
            run_id: &RunId,
        ) -> Result<(), webrunner_checkpoint_store::CheckpointError> {
            self.inner.discard(run_id).await
        }
    }

    struct Harness {
        session: Arc<TestSession>,
        checkpoints: Arc<MemoryCheckpointStore>,
        runs: Arc<InMemoryRunStore>,
        artifacts: Arc<InMemoryArtifactStore>,
        control: Arc<InMemoryBus<ControlMessage>>,
        status: Arc<InMemoryBus<StatusMessage>>,
        alerts: Arc<InMemoryBus<AuthFailureAlert>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                session: Arc::new(TestSession::default()),
                checkpoints: Arc::new(MemoryCheckpointStore::new()),
                runs: Arc::new(InMemoryRunStore::new()),
                artifacts: Arc::new(InMemoryArtifactStore::new()),
                control: InMemoryBus::new(16),
                status: InMemoryBus::new(64),
                alerts: InMemoryBus::new(16),
            }
        }

        fn controller(&self, run_id: RunId, options: RunOptions) -> RunController {
            self.controller_with_factory(run_id, options, false)
        }

        fn controller_with_factory(
            &self,
            run_id: RunId,
            options: RunOptions,
            fail_acquire: bool,
        ) -> RunController {
            RunController::new(
                run_id,
                options,
                Arc::new(TestFactory {
                    session: self.session.clone(),
                    fail: fail_acquire,
                }),
                self.checkpoints.clone(),
                self.runs.clone(),
                self.artifacts.clone(),
                Buses {
                    control: self.control.clone(),
                    status: self.status.clone(),
                    alerts: self.alerts.clone(),
                },
            )
            .unwrap()
        }
    }

    fn options() -> RunOptions {
        RunOptions::new("https://app.test").with_timeout_ms(500)
    }

    fn case(steps: Vec<Step>) -> TestCase {
        TestCase::new("case", steps)
    }

    #[tokio::test]
    async fn all_steps_succeeding_completes_the_run() {
        let harness = Harness::new();
        harness.session.make_visible(&["#a"]);
        let run_id = RunId::new();
        let controller = harness.controller(run_id.clone(), options());
        let case = case(vec![
            Step::new("navigate").with_value("/"),
            Step::new("click").with_selector("#a"),
            Step::new("wait").with_value("10"),
        ]);

        let run = controller.execute(&case).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.step_log.len(), 3);
        assert_eq!(run.current_step_index, 3);
        assert!(run.error.is_none());
        assert!(run.step_log.iter().all(|result| result.success));
        assert_eq!(harness.runs.get(&run_id).unwrap().status, RunStatus::Completed);
        assert_eq!(harness.session.closes.load(Ordering::Relaxed), 1);
        assert!(harness.checkpoints.is_empty());
    }

    #[tokio::test]
    async fn failing_step_halts_the_run_fail_fast() {
        let harness = Harness::new();
        harness.session.make_visible(&["#a", "#b"]);
        let run_id = RunId::new();
        let controller = harness.controller(run_id.clone(), options());
        let case = case(vec![
            Step::new("navigate").with_value("/form"),
            Step::new("click").with_selector("#a"),
            Step::new("fill").with_selector("#missing").with_value("x"),
            Step::new("click").with_selector("#b"),
        ]);

        let err = controller.execute(&case).await.unwrap_err();
        assert!(matches!(err, RunError::StepExecution { index: 2, .. }));

        let run = harness.runs.get(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.step_log.len(), 3);
        assert!(!run.step_log[2].success);
        assert!(run.error.as_deref().unwrap().contains("#missing"));
        assert!(!harness.session.calls().contains(&"click #b".to_string()));
        assert_eq!(harness.session.closes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn failed_steps_are_never_checkpointed() {
        let harness = Harness::new();
        harness.session.make_visible(&["#a"]);
        let recorder = Arc::new(RecordingCheckpointStore::default());
        let run_id = RunId::new();
        let controller = RunController::new(
            run_id.clone(),
            options(),
            Arc::new(TestFactory {
                session: harness.session.clone(),
                fail: false,
            }),
            recorder.clone(),
            harness.runs.clone(),
            harness.artifacts.clone(),
            Buses {
                control: harness.control.clone(),
                status: harness.status.clone(),
                alerts: harness.alerts.clone(),
            },
        )
        .unwrap();
        let case = case(vec![
            Step::new("click").with_selector("#a"),
            Step::new("click").with_selector("#missing"),
            Step::new("click").with_selector("#a"),
        ]);

        let err = controller.execute(&case).await.unwrap_err();
        assert!(matches!(err, RunError::StepExecution { index: 1, .. }));

        // Only the successful step was checkpointed; the failure left no
        // blob that a restart could resume past.
        let saved = recorder.saved.lock().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].current_step_index, 1);
        assert!(saved[0].step_log.iter().all(|result| result.success));
        assert!(recorder.inner.is_empty());
    }

    #[tokio::test]
    async fn session_acquisition_failure_is_fatal_before_any_step() {
        let harness = Harness::new();
        let run_id = RunId::new();
        let controller = harness.controller_with_factory(run_id.clone(), options(), true);
        let case = case(vec![Step::new("navigate").with_value("/")]);

        let err = controller.execute(&case).await.unwrap_err();
        assert!(matches!(err, RunError::SessionAcquisition(_)));

        let run = harness.runs.get(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.step_log.is_empty());
        assert_eq!(harness.session.closes.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn auth_preflight_failure_publishes_alert_and_fails_run() {
        let harness = Harness::new();
        harness.session.make_visible(&[
            "input[type=email]",
            "input[type=password]",
            "button[type=submit]",
        ]);
        harness
            .session
            .set_page_text("https://app.test/login", "Invalid credentials");

        let mut alerts = harness.alerts.subscribe();
        let run_id = RunId::new();
        let options = options().with_auth(webrunner_core_types::AuthCredentials {
            username: "a@b.com".to_string(),
            password: "nope".to_string(),
            login_url: None,
        });
        let controller = harness.controller(run_id.clone(), options);
        let case = case(vec![Step::new("navigate").with_value("/")]);

        let err = controller.execute(&case).await.unwrap_err();
        assert!(matches!(err, RunError::Authentication(_)));

        let alert = alerts.recv().await.unwrap();
        assert_eq!(alert.kind, "AUTH_FAILURE");
        assert_eq!(alert.run_id, run_id);

        let run = harness.runs.get(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.step_log.is_empty());
        assert_eq!(harness.session.closes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn auth_preflight_success_proceeds_to_steps() {
        let harness = Harness::new();
        harness.session.make_visible(&[
            "input[type=email]",
            "input[type=password]",
            "button[type=submit]",
            "#start",
        ]);
        harness.session.route_click(
            "https://app.test/login",
            "button[type=submit]",
            "https://app.test/home",
        );

        let run_id = RunId::new();
        let options = options().with_auth(webrunner_core_types::AuthCredentials {
            username: "a@b.com".to_string(),
            password: "secret".to_string(),
            login_url: None,
        });
        let controller = harness.controller(run_id.clone(), options);
        let case = case(vec![Step::new("click").with_selector("#start")]);

        let run = controller.execute(&case).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);

        let calls = harness.session.calls();
        assert!(calls.contains(&"fill input[type=email]=a@b.com".to_string()));
        assert!(calls.contains(&"fill input[type=password]=secret".to_string()));
        assert!(calls.contains(&"click #start".to_string()));
    }

    #[tokio::test]
    async fn mandatory_capture_failure_fails_the_step() {
        let harness = Harness::new();
        harness.session.fail_capture.store(true, Ordering::Relaxed);
        let run_id = RunId::new();
        let controller = harness.controller(
            run_id.clone(),
            options().with_screenshot_mode(ScreenshotMode::Always),
        );
        let case = case(vec![Step::new("navigate").with_value("/")]);

        let err = controller.execute(&case).await.unwrap_err();
        assert!(matches!(err, RunError::StepExecution { index: 0, .. }));

        let run = harness.runs.get(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(!run.step_log[0].success);
        assert!(run.step_log[0]
            .error
            .as_deref()
            .unwrap()
            .contains("capture failed"));
    }

    #[tokio::test]
    async fn stop_yields_partial_log_without_error() {
        let harness = Harness::new();
        let run_id = RunId::new();
        let controller = harness.controller(run_id.clone(), options());
        let steps: Vec<Step> = (0..8).map(|_| Step::new("wait").with_value("50")).collect();
        let test_case = case(steps);

        let mut status = harness.status.subscribe();
        let task_case = test_case.clone();
        let handle = tokio::spawn(async move { controller.execute(&task_case).await });

        // First status arrives after step 0; stop at the next suspension point.
        let first = status.recv().await.unwrap();
        assert_eq!(first.status, RunStatus::Running);
        harness
            .control
            .publish(ControlMessage::new(run_id.clone(), ControlAction::Stop))
            .await
            .unwrap();

        let run = handle.await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Stopped);
        assert!(run.error.is_none());
        assert!(!run.step_log.is_empty());
        assert!(run.step_log.len() < 8);
        assert_eq!(run.step_log.len(), run.current_step_index);
        assert!(harness.checkpoints.is_empty());
        assert_eq!(harness.session.closes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn pause_and_resume_continue_without_replaying_steps() {
        let harness = Harness::new();
        let run_id = RunId::new();
        let controller = harness.controller(run_id.clone(), options());
        let steps: Vec<Step> = (0..5).map(|_| Step::new("wait").with_value("150")).collect();
        let test_case = case(steps);

        let mut status = harness.status.subscribe();
        let task_case = test_case.clone();
        let handle = tokio::spawn(async move { controller.execute(&task_case).await });

        let first = status.recv().await.unwrap();
        assert_eq!(first.status, RunStatus::Running);
        harness
            .control
            .publish(ControlMessage::new(run_id.clone(), ControlAction::Pause))
            .await
            .unwrap();

        // Wait for the pause acknowledgement.
        let paused_at = loop {
            let message = status.recv().await.unwrap();
            if message.status == RunStatus::Paused {
                break message.progress.current;
            }
        };

        // While paused nothing advances.
        tokio::time::sleep(Duration::from_millis(400)).await;
        harness
            .control
            .publish(ControlMessage::new(run_id.clone(), ControlAction::Resume))
            .await
            .unwrap();

        let run = handle.await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.step_log.len(), 5);
        // Each step executed exactly once, in order; the pre-pause prefix is
        // untouched by the resume.
        for (i, result) in run.step_log.iter().enumerate() {
            assert_eq!(result.index, i);
        }
        assert!(paused_at <= 5);

        let paused_record = harness.runs.get(&run_id).unwrap();
        assert_eq!(paused_record.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn resumes_from_checkpoint_without_replaying_completed_steps() {
        let harness = Harness::new();
        harness.session.make_visible(&["#a", "#b", "#c", "#d"]);
        let run_id = RunId::new();
        let started_at = Utc::now() - chrono::Duration::minutes(5);

        let prior_log = vec![
            StepResult::success(0, "click", 12),
            StepResult::success(1, "click", 9),
        ];
        let checkpoint = Checkpoint::new(
            2,
            prior_log,
            SessionContext {
                url: Some("https://app.test/resume-here".to_string()),
                cookies: vec![Cookie {
                    name: "sid".to_string(),
                    value: "abc".to_string(),
                    domain: None,
                    path: None,
                }],
            },
            started_at,
        );
        harness.checkpoints.save(&run_id, &checkpoint).await.unwrap();

        let controller = harness.controller(run_id.clone(), options());
        let test_case = case(vec![
            Step::new("click").with_selector("#a"),
            Step::new("click").with_selector("#b"),
            Step::new("click").with_selector("#c"),
            Step::new("click").with_selector("#d"),
        ]);

        let run = controller.execute(&test_case).await.unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.step_log.len(), 4);
        assert_eq!(run.started_at.unwrap(), started_at);

        let calls = harness.session.calls();
        assert!(calls.contains(&"set_cookies 1".to_string()));
        assert!(calls.contains(&"goto https://app.test/resume-here".to_string()));
        assert!(calls.contains(&"click #c".to_string()));
        assert!(calls.contains(&"click #d".to_string()));
        assert!(!calls.contains(&"click #a".to_string()));
        assert!(!calls.contains(&"click #b".to_string()));
        assert!(harness.checkpoints.is_empty());
    }

    #[tokio::test]
    async fn status_query_triggers_extra_publish_without_state_change() {
        let harness = Harness::new();
        let run_id = RunId::new();
        let controller = harness.controller(run_id.clone(), options());
        let test_case = case(vec![
            Step::new("wait").with_value("300"),
            Step::new("wait").with_value("50"),
        ]);

        let mut status = harness.status.subscribe();
        let task_case = test_case.clone();
        let handle = tokio::spawn(async move { controller.execute(&task_case).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        harness
            .control
            .publish(ControlMessage::new(run_id.clone(), ControlAction::Status))
            .await
            .unwrap();

        let run = handle.await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);

        // One publish after step 0 plus one for the query ack.
        let mut after_first_step = 0;
        while let Ok(message) = status.try_recv() {
            if message.progress.current == 1 && message.status == RunStatus::Running {
                after_first_step += 1;
            }
        }
        assert!(after_first_step >= 2);
    }

    #[tokio::test]
    async fn control_messages_for_other_runs_are_ignored() {
        let harness = Harness::new();
        let run_id = RunId::new();
        let controller = harness.controller(run_id.clone(), options());
        let test_case = case(vec![
            Step::new("wait").with_value("100"),
            Step::new("wait").with_value("100"),
        ]);

        let mut status = harness.status.subscribe();
        let task_case = test_case.clone();
        let handle = tokio::spawn(async move { controller.execute(&task_case).await });

        let _ = status.recv().await.unwrap();
        harness
            .control
            .publish(ControlMessage::new(RunId::new(), ControlAction::Stop))
            .await
            .unwrap();

        let run = handle.await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.step_log.len(), 2);
    }
}
