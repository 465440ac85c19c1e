use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// A fund constituent line could not be matched to a known security.
    UnresolvedFundHolding,
    /// A fund's surviving constituent weights were rescaled to sum to 1.
    PartialFundExpansion,
    /// The requested start date predates an inception date in play.
    StartDateAdjusted,
    /// A fund could not be expanded and was kept as a direct holding.
    FundExpansionFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
}

// Request-scoped accumulator of non-fatal conditions. Every subtask of a
// compare shares one bound handle; `unbound()` gives a handle whose pushes
// are silent no-ops, so library code never has to care whether a request
// scope exists. Appends are safe from parallel tasks.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    inner: Option<Arc<Mutex<Vec<Warning>>>>,
}

impl Warnings {
    /// A bound channel for one request.
    pub fn bound() -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// A channel that swallows every push.
    pub fn unbound() -> Self {
        Self { inner: None }
    }

    pub fn push(&self, code: WarningCode, message: impl Into<String>) {
        if let Some(inner) = &self.inner {
            inner.lock().push(Warning {
                code,
                message: message.into(),
            });
        }
    }

    /// Read out everything accumulated so far, in append order.
    pub fn drain(&self) -> Vec<Warning> {
        match &self.inner {
            Some(inner) => std::mem::take(&mut *inner.lock()),
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Warning> {
        match &self.inner {
            Some(inner) => inner.lock().clone(),
            None => Vec::new(),
        }
    }
}
