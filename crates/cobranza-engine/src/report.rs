//! Outcome records for best-effort steps.
//!
//! Cosmetic steps (date rewriting, width copies, page-setup mirroring) never abort a job.
//! Each one returns a [`StepReport`]; the orchestrator logs the failures and moves on.

use cobranza_host::HostError;

/// One write that did not take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    /// What was being written, e.g. `SUR!C12` or `page:CenterHeader`.
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub step: &'static str,
    pub applied: usize,
    pub failures: Vec<PartialFailure>,
}

impl StepReport {
    pub fn new(step: &'static str) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    pub fn record(&mut self, target: impl FnOnce() -> String, result: Result<(), HostError>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(err) => self.fail(target(), err.to_string()),
        }
    }

    pub fn fail(&mut self, target: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(PartialFailure {
            target: target.into(),
            reason: reason.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another step's counts and failures into this one.
    pub fn merge(&mut self, other: StepReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }

    /// Log skipped writes at `warn`.
    pub fn log(&self) {
        for failure in &self.failures {
            log::warn!("[{}] skipped {}: {}", self.step, failure.target, failure.reason);
        }
        log::debug!("[{}] applied {} writes", self.step, self.applied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_sums_applied_and_keeps_failure_order() {
        let mut total = StepReport::new("copy");
        let mut header = StepReport::new("header");
        header.record(|| "A1".to_string(), Ok(()));
        header.fail("shape #0", "rejected");
        let mut widths = StepReport::new("widths");
        widths.record(|| "Hoja1!col2".to_string(), Err(HostError::Pdf("locked".to_string())));
        widths.record(|| "Hoja1!col3".to_string(), Ok(()));

        total.merge(header);
        total.merge(widths);
        assert_eq!(total.step, "copy");
        assert_eq!(total.applied, 2);
        let targets: Vec<&str> = total.failures.iter().map(|f| f.target.as_str()).collect();
        assert_eq!(targets, vec!["shape #0", "Hoja1!col2"]);
    }
}
