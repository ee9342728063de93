//! Per-invocation saga context.
//!
//! # Purpose
//! A [`Saga`] records an undo action after every successful step of a
//! multi-step workflow. When a later step fails, the recorded actions run in
//! reverse order (last recorded first) and the original error is returned.
//!
//! # Key invariants
//! - One `Saga` per call; nothing is shared between invocations.
//! - Compensation failures are logged and counted, never surfaced.
//! - Compensations run at most once: the list is drained before running.
//!
//! # Example
//! ```rust,no_run
//! use controlplane::saga::Saga;
//!
//! async fn provision() -> Result<(), String> {
//!     let mut saga = Saga::begin("example");
//!     saga.on_failure("drop first step", || async { Ok(()) });
//!     saga.guard(async { Err::<(), _>("second step failed".to_string()) }).await?;
//!     saga.complete();
//!     Ok(())
//! }
//! ```
use futures::future::BoxFuture;
use std::future::Future;

type CompensationFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct Compensation {
    label: String,
    run: CompensationFn,
}

pub struct Saga {
    name: &'static str,
    steps: Vec<Compensation>,
}

impl Saga {
    pub fn begin(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Record the undo action for a step that just succeeded.
    pub fn on_failure<F, Fut>(&mut self, label: impl Into<String>, compensate: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.steps.push(Compensation {
            label: label.into(),
            run: Box::new(move || Box::pin(compensate())),
        });
    }

    pub fn pending(&self) -> usize {
        self.steps.len()
    }

    /// Await a step; on error, unwind every recorded compensation and return the error.
    pub async fn guard<T, E, Fut>(&mut self, step: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match step.await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.abort(err).await),
        }
    }

    /// Unwind recorded compensations, then hand back `err` untouched.
    pub async fn abort<E>(&mut self, err: E) -> E {
        let steps = std::mem::take(&mut self.steps);
        tracing::warn!(saga = self.name, compensations = steps.len(), "saga step failed; compensating");
        for step in steps.into_iter().rev() {
            if let Err(comp_err) = (step.run)().await {
                metrics::counter!("courier_compensation_failures_total", "saga" => self.name)
                    .increment(1);
                tracing::warn!(
                    saga = self.name,
                    step = %step.label,
                    error = %comp_err,
                    "compensation failed"
                );
            }
        }
        metrics::counter!("courier_saga_total", "saga" => self.name, "outcome" => "compensated")
            .increment(1);
        err
    }

    /// Commit: drop every recorded compensation.
    pub fn complete(mut self) {
        self.steps.clear();
        metrics::counter!("courier_saga_total", "saga" => self.name, "outcome" => "completed")
            .increment(1);
    }
}

impl Drop for Saga {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            tracing::warn!(
                saga = self.name,
                pending = self.steps.len(),
                "saga dropped with unapplied compensations"
            );
        }
    }
}
