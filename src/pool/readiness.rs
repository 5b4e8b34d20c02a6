use super::store::{StatusMap, HISTORY_LIMIT};

/// Readiness derived from the rolling status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The two most recent snapshots each had an available endpoint.
    Success,
    /// Every retained snapshot (all three) had none.
    Failed,
    Indeterminate,
}

impl Readiness {
    pub fn as_str(self) -> &'static str {
        match self {
            Readiness::Success => "success",
            Readiness::Failed => "failed",
            Readiness::Indeterminate => "indeterminate",
        }
    }
}

fn has_available(status: &StatusMap) -> bool {
    status.values().any(|s| s.is_available())
}

/// Evaluate a history ordered oldest first.
pub fn evaluate<'a, I>(history: I) -> Readiness
where
    I: IntoIterator<Item = &'a StatusMap>,
    I::IntoIter: ExactSizeIterator,
{
    let history = history.into_iter();
    if history.len() < 2 {
        return Readiness::Indeterminate;
    }

    let mut success_run = 0usize;
    let mut fail_run = 0usize;
    for status in history {
        if has_available(status) {
            success_run += 1;
            fail_run = 0;
        } else {
            fail_run += 1;
            success_run = 0;
        }
    }

    if success_run >= 2 {
        Readiness::Success
    } else if fail_run == HISTORY_LIMIT {
        Readiness::Failed
    } else {
        Readiness::Indeterminate
    }
}
