//! Step-status derivation for pipeline jobs.
//!
//! The backend only reports one scalar `progress` per job. The dashboard
//! shows a fixed list of named steps per task kind; each step's status is a
//! pure function of `(state, progress)` and a pair of thresholds, so it can
//! never get stuck and never regresses while progress grows.

use serde::Serialize;

use crate::error::CoreError;
use crate::job::{clamp_progress, JobKind, JobState, PROGRESS_MAX};

// ---------------------------------------------------------------------------
// Default plans
// ---------------------------------------------------------------------------

/// `(name, start, complete)` for cleaning jobs.
pub const CLEANING_STEPS: &[(&str, f64, f64)] = &[
    ("Carga de datos", 0.0, 10.0),
    ("Duplicados", 10.0, 25.0),
    ("Valores nulos", 25.0, 50.0),
    ("Normalización", 50.0, 75.0),
    ("Guardado", 75.0, 100.0),
];

/// `(name, start, complete)` for training jobs.
pub const TRAINING_STEPS: &[(&str, f64, f64)] = &[
    ("Preparación", 0.0, 20.0),
    ("Entrenamiento", 20.0, 70.0),
    ("Evaluación", 70.0, 90.0),
    ("Guardado del modelo", 90.0, 100.0),
];

/// Single catch-all step for task kinds without a dedicated plan.
pub const FALLBACK_STEPS: &[(&str, f64, f64)] = &[("Procesamiento", 0.0, 100.0)];

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl StepStatus {
    /// Position on the `pending -> in_progress -> completed` scale.
    /// `Error` sits outside it.
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::InProgress => Some(1),
            Self::Completed => Some(2),
            Self::Error => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// StepThreshold / StepPlan
// ---------------------------------------------------------------------------

/// A named step and the progress values at which it starts and completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepThreshold {
    pub name: String,
    pub start: f64,
    pub complete: f64,
}

impl StepThreshold {
    pub fn new(name: impl Into<String>, start: f64, complete: f64) -> Self {
        Self {
            name: name.into(),
            start,
            complete,
        }
    }

    /// Status of this step for the given job state and progress.
    pub fn status(&self, state: JobState, progress: f64) -> StepStatus {
        match state {
            JobState::Pending => StepStatus::Pending,
            JobState::Failed => StepStatus::Error,
            // Completion resolves every step even when the last progress
            // tick never reached 100.
            JobState::Completed => StepStatus::Completed,
            JobState::Running => {
                let progress = clamp_progress(progress);
                if progress >= self.complete {
                    StepStatus::Completed
                } else if progress >= self.start {
                    StepStatus::InProgress
                } else {
                    StepStatus::Pending
                }
            }
        }
    }
}

/// A step paired with its derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedStep {
    pub name: String,
    pub status: StepStatus,
}

/// Validated, ordered list of steps for one task kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepPlan {
    steps: Vec<StepThreshold>,
}

impl StepPlan {
    /// Build a plan, rejecting thresholds outside `[0, 100]`, steps whose
    /// start is not below their completion, and sequences whose thresholds
    /// are not strictly increasing.
    pub fn new(steps: Vec<StepThreshold>) -> Result<Self, CoreError> {
        validate_steps(&steps)?;
        Ok(Self { steps })
    }

    /// Build a plan from a `(name, start, complete)` table.
    pub fn from_table(table: &[(&str, f64, f64)]) -> Result<Self, CoreError> {
        Self::new(
            table
                .iter()
                .map(|(name, start, complete)| StepThreshold::new(*name, *start, *complete))
                .collect(),
        )
    }

    pub fn steps(&self) -> &[StepThreshold] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Derive every step's status from the job's state and progress.
    pub fn derive(&self, state: JobState, progress: f64) -> Vec<DerivedStep> {
        self.steps
            .iter()
            .map(|step| DerivedStep {
                name: step.name.clone(),
                status: step.status(state, progress),
            })
            .collect()
    }

    /// The baseline shown before any snapshot arrives.
    pub fn all_pending(&self) -> Vec<DerivedStep> {
        self.derive(JobState::Pending, 0.0)
    }
}

fn validate_steps(steps: &[StepThreshold]) -> Result<(), CoreError> {
    if steps.is_empty() {
        return Err(CoreError::Validation(
            "a step plan needs at least one step".to_string(),
        ));
    }

    for step in steps {
        for (label, value) in [("start", step.start), ("complete", step.complete)] {
            if !(0.0..=PROGRESS_MAX).contains(&value) {
                return Err(CoreError::InvariantViolation(format!(
                    "step '{}' {label} threshold must be between 0 and 100, got {value}",
                    step.name
                )));
            }
        }
        if step.start >= step.complete {
            return Err(CoreError::InvariantViolation(format!(
                "step '{}' starts at {} but completes at {}",
                step.name, step.start, step.complete
            )));
        }
    }

    for pair in steps.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start <= prev.start || next.complete <= prev.complete {
            return Err(CoreError::InvariantViolation(format!(
                "thresholds must be strictly increasing: '{}' ({}/{}) follows '{}' ({}/{})",
                next.name, next.start, next.complete, prev.name, prev.start, prev.complete
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// StepCatalog
// ---------------------------------------------------------------------------

/// Step plans per task kind.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCatalog {
    cleaning: StepPlan,
    training: StepPlan,
    fallback: StepPlan,
}

impl StepCatalog {
    pub fn new(cleaning: StepPlan, training: StepPlan, fallback: StepPlan) -> Self {
        Self {
            cleaning,
            training,
            fallback,
        }
    }

    /// The built-in plans ([`CLEANING_STEPS`], [`TRAINING_STEPS`],
    /// [`FALLBACK_STEPS`]).
    pub fn standard() -> Result<Self, CoreError> {
        Ok(Self::new(
            StepPlan::from_table(CLEANING_STEPS)?,
            StepPlan::from_table(TRAINING_STEPS)?,
            StepPlan::from_table(FALLBACK_STEPS)?,
        ))
    }

    /// Replace the plan used for `kind`. `Other` kinds share the fallback.
    pub fn with_plan(mut self, kind: &JobKind, plan: StepPlan) -> Self {
        match kind {
            JobKind::Clean => self.cleaning = plan,
            JobKind::Train => self.training = plan,
            JobKind::Other(_) => self.fallback = plan,
        }
        self
    }

    pub fn plan_for(&self, kind: &JobKind) -> &StepPlan {
        match kind {
            JobKind::Clean => &self.cleaning,
            JobKind::Train => &self.training,
            JobKind::Other(_) => &self.fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
