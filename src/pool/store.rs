use super::resync::ZoneAssignment;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of status snapshots retained for readiness evaluation.
pub const HISTORY_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Available,
    Unavailable,
}

impl EndpointStatus {
    #[inline]
    pub fn is_available(self) -> bool {
        matches!(self, EndpointStatus::Available)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointStatus::Available => "available",
            EndpointStatus::Unavailable => "unavailable",
        }
    }
}

/// Endpoint ("host:port") → last probe result.
pub type StatusMap = HashMap<String, EndpointStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Default,
    SameAz,
    DiffAz,
}

impl Tier {
    /// Selection order, most preferred first.
    pub const PRIORITY: [Tier; 3] = [Tier::SameAz, Tier::DiffAz, Tier::Default];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Default => "default",
            Tier::SameAz => "same_az",
            Tier::DiffAz => "diff_az",
        }
    }
}

/// The three address tiers. Each list is duplicate-free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tiers {
    pub default: Vec<String>,
    pub same_az: Vec<String>,
    pub diff_az: Vec<String>,
}

impl Tiers {
    pub fn get(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Default => &self.default,
            Tier::SameAz => &self.same_az,
            Tier::DiffAz => &self.diff_az,
        }
    }

    /// Deduplicated union of all tiers: Default, then SameAz, then DiffAz.
    pub fn union(&self) -> Vec<String> {
        dedup(
            self.default
                .iter()
                .chain(self.same_az.iter())
                .chain(self.diff_az.iter()),
        )
    }

    fn member_set(&self) -> HashSet<&str> {
        self.default
            .iter()
            .chain(self.same_az.iter())
            .chain(self.diff_az.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Monitor lifecycle: Idle → Running → Stopped. Stopped is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

/// Remove duplicates, keeping the first occurrence of each address.
pub fn dedup<I, S>(input: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for addr in input {
        let addr = addr.as_ref();
        if seen.insert(addr.to_string()) {
            out.push(addr.to_string());
        }
    }
    out
}

pub(crate) struct StoreState {
    pub(crate) tiers: Tiers,
    pub(crate) status: Arc<StatusMap>,
    /// Oldest first, at most `HISTORY_LIMIT` entries.
    pub(crate) history: VecDeque<Arc<StatusMap>>,
    pub(crate) lifecycle: Lifecycle,
}

/// Tiers, current status and rolling status history behind one RW lock.
///
/// Every critical section here is O(tracked endpoints) and never touches the
/// network: probing happens on a snapshot taken by `snapshot_for_probe`.
pub struct AddressStore {
    state: RwLock<StoreState>,
}

impl AddressStore {
    pub fn new<S: AsRef<str>>(default: &[S], diff_az: &[S]) -> Self {
        Self {
            state: RwLock::new(StoreState {
                tiers: Tiers {
                    default: dedup(default),
                    same_az: Vec::new(),
                    diff_az: dedup(diff_az),
                },
                status: Arc::new(StatusMap::new()),
                history: VecDeque::with_capacity(HISTORY_LIMIT + 1),
                lifecycle: Lifecycle::Idle,
            }),
        }
    }

    // Writers assign whole values, so a poisoned lock still holds consistent state.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace Default, clear the zone tiers, status and history in one step.
    pub fn reset_addresses<S: AsRef<str>>(&self, addresses: &[S]) {
        let default = dedup(addresses);
        let mut state = self.write();
        state.tiers = Tiers {
            default,
            same_az: Vec::new(),
            diff_az: Vec::new(),
        };
        state.status = Arc::new(StatusMap::new());
        state.history.clear();
    }

    /// Classify against the current Default tier and install the result, all
    /// under the write lock. Buckets left as `None` keep their members.
    pub(crate) fn apply_zone_assignment<F>(&self, classify: F) -> ZoneAssignment
    where
        F: FnOnce(&[String]) -> ZoneAssignment,
    {
        let mut state = self.write();
        let assignment = classify(state.tiers.default.as_slice());
        if let Some(same_az) = &assignment.same_az {
            state.tiers.same_az = same_az.clone();
        }
        if let Some(diff_az) = &assignment.diff_az {
            state.tiers.diff_az = diff_az.clone();
        }
        assignment
    }

    pub fn snapshot_for_probe(&self) -> Vec<String> {
        self.read().tiers.union()
    }

    /// Install a freshly probed status map and append it to the history.
    ///
    /// Keys no longer present in any tier are dropped. Returns `false` (and
    /// installs nothing) once the store is Stopped.
    pub fn commit_status(&self, mut status: StatusMap) -> bool {
        let mut state = self.write();
        if state.lifecycle == Lifecycle::Stopped {
            return false;
        }

        {
            let members = state.tiers.member_set();
            status.retain(|k, _| members.contains(k.as_str()));
        }

        let status = Arc::new(status);
        state.status = status.clone();
        state.history.push_back(status);
        while state.history.len() > HISTORY_LIMIT {
            state.history.pop_front();
        }
        true
    }

    pub fn tiers(&self) -> Tiers {
        self.read().tiers.clone()
    }

    pub fn status(&self) -> Arc<StatusMap> {
        self.read().status.clone()
    }

    pub fn status_of(&self, endpoint: &str) -> Option<EndpointStatus> {
        self.read().status.get(endpoint).copied()
    }

    pub fn history_len(&self) -> usize {
        self.read().history.len()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.read().lifecycle
    }

    /// Idle → Running. Only one caller ever gets `true`.
    pub(crate) fn try_start(&self) -> bool {
        let mut state = self.write();
        if state.lifecycle != Lifecycle::Idle {
            return false;
        }
        state.lifecycle = Lifecycle::Running;
        true
    }

    /// Any → Stopped. Returns `true` only for the call that performed it.
    pub(crate) fn stop(&self) -> bool {
        let mut state = self.write();
        if state.lifecycle == Lifecycle::Stopped {
            return false;
        }
        state.lifecycle = Lifecycle::Stopped;
        true
    }
}

#[cfg(test)]
pub(crate) fn status_map(entries: &[(&str, EndpointStatus)]) -> StatusMap {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
