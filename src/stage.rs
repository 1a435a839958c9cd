// ABOUTME: Hierarchical progress reporting for multi-step pipelines.
// ABOUTME: Records a tree of named steps in call order and prints progress lines.

use crate::output::Ui;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// How a recorded step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Finished,
    Skipped(String),
    Failed(String),
}

/// A step recorded by a [`Stage`]. Complex steps carry their sub-steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStep {
    pub name: String,
    pub outcome: StepOutcome,
    pub children: Vec<StageStep>,
}

impl StageStep {
    /// Names of the direct children, in call order.
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A level in the progress tree.
///
/// Cloning a stage yields a handle onto the same level, so a stage can be
/// moved into the futures passed to [`Stage::perform_complex`].
#[derive(Clone)]
pub struct Stage {
    ui: Arc<dyn Ui>,
    steps: Arc<Mutex<Vec<StageStep>>>,
    depth: usize,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("depth", &self.depth)
            .field("steps", &self.steps.lock().len())
            .finish()
    }
}

impl Stage {
    /// Create a root stage printing through `ui`.
    pub fn new(ui: Arc<dyn Ui>) -> Self {
        Self {
            ui,
            steps: Arc::new(Mutex::new(Vec::new())),
            depth: 0,
        }
    }

    pub fn ui(&self) -> &Arc<dyn Ui> {
        &self.ui
    }

    /// Run a single step and record its outcome.
    pub async fn perform<T, E, F, Fut>(&self, name: impl Into<String>, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let name = name.into();
        let started = Instant::now();
        let result = f().await;
        let secs = started.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => {
                self.print(&format!("{name}... Finished ({secs:.1}s)"));
                StepOutcome::Finished
            }
            Err(e) => {
                self.print(&format!("{name}... Failed ({secs:.1}s)"));
                StepOutcome::Failed(e.to_string())
            }
        };
        self.record(StageStep {
            name,
            outcome,
            children: Vec::new(),
        });
        result
    }

    /// Run a step that may decide it had nothing to do.
    ///
    /// `Ok(Some(reason))` records the step as skipped with that reason.
    pub async fn perform_skippable<E, F, Fut>(
        &self,
        name: impl Into<String>,
        f: F,
    ) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: Display,
    {
        let name = name.into();
        let started = Instant::now();
        match f().await {
            Ok(Some(reason)) => {
                self.skip(name, reason);
                Ok(())
            }
            Ok(None) => {
                let secs = started.elapsed().as_secs_f64();
                self.print(&format!("{name}... Finished ({secs:.1}s)"));
                self.record(StageStep {
                    name,
                    outcome: StepOutcome::Finished,
                    children: Vec::new(),
                });
                Ok(())
            }
            Err(e) => {
                let secs = started.elapsed().as_secs_f64();
                self.print(&format!("{name}... Failed ({secs:.1}s)"));
                self.record(StageStep {
                    name,
                    outcome: StepOutcome::Failed(e.to_string()),
                    children: Vec::new(),
                });
                Err(e)
            }
        }
    }

    /// Run a step that reports its own sub-steps through a nested stage.
    pub async fn perform_complex<T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Stage) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let name = name.into();
        let started = Instant::now();
        self.print(&format!("Started {name}"));

        let sub_stage = Stage {
            ui: Arc::clone(&self.ui),
            steps: Arc::new(Mutex::new(Vec::new())),
            depth: self.depth + 1,
        };
        let result = f(sub_stage.clone()).await;
        let secs = started.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => {
                self.print(&format!("Finished {name} ({secs:.1}s)"));
                StepOutcome::Finished
            }
            Err(e) => {
                self.print(&format!("Failed {name} ({secs:.1}s)"));
                StepOutcome::Failed(e.to_string())
            }
        };
        self.record(StageStep {
            name,
            outcome,
            children: sub_stage.steps(),
        });
        result
    }

    /// Record a step that was not run.
    pub fn skip(&self, name: impl Into<String>, reason: impl Into<String>) {
        let name = name.into();
        let reason = reason.into();
        self.print(&format!("{name}... Skipped [{reason}]"));
        self.record(StageStep {
            name,
            outcome: StepOutcome::Skipped(reason),
            children: Vec::new(),
        });
    }

    /// Snapshot of the steps recorded at this level.
    pub fn steps(&self) -> Vec<StageStep> {
        self.steps.lock().clone()
    }

    fn record(&self, step: StageStep) {
        self.steps.lock().push(step);
    }

    fn print(&self, line: &str) {
        let indent = "  ".repeat(self.depth);
        self.ui.print_line(&format!("{indent}{line}"));
    }
}
