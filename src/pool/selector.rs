use super::store::{StatusMap, Tier, Tiers};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

/// Round-robin over whatever candidate list the caller hands in, using a
/// modular counter shared by every call on the same pool.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let idx = (count % candidates.len() as u64) as usize;
        Some(candidates[idx].as_str())
    }
}

/// Members of `tier` currently marked Available.
pub fn available_in<'a>(tiers: &'a Tiers, status: &StatusMap, tier: Tier) -> Vec<&'a String> {
    tiers
        .get(tier)
        .iter()
        .filter(|addr| status.get(addr.as_str()).is_some_and(|s| s.is_available()))
        .collect()
}

/// The first tier (SameAz, DiffAz, Default) with an available member, or the
/// raw Default tier when nothing is available anywhere.
pub fn candidates<'a>(tiers: &'a Tiers, status: &StatusMap) -> Cow<'a, [String]> {
    for tier in Tier::PRIORITY {
        let available = available_in(tiers, status, tier);
        if !available.is_empty() {
            return Cow::Owned(available.into_iter().cloned().collect());
        }
    }
    Cow::Borrowed(&tiers.default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::store::status_map;
    use crate::pool::store::EndpointStatus::{Available, Unavailable};
    use std::collections::HashMap;

    fn tiers(default: &[&str], same_az: &[&str], diff_az: &[&str]) -> Tiers {
        let own = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Tiers {
            default: own(default),
            same_az: own(same_az),
            diff_az: own(diff_az),
        }
    }

    #[test]
    fn test_uniform() {
        let rr = RoundRobin::new();
        let list = vec!["A".to_string(), "B".to_string()];
        let mut counts = HashMap::new();
        for _ in 0..1000 {
            *counts.entry(rr.pick(&list).unwrap()).or_insert(0) += 1;
        }
        assert_eq!(counts["A"], 500);
        assert_eq!(counts["B"], 500);
    }

    #[test]
    fn test_consecutive_picks_differ() {
        let rr = RoundRobin::new();
        let list = vec!["X".to_string(), "Y".to_string()];
        for _ in 0..10 {
            assert_ne!(rr.pick(&list), rr.pick(&list));
        }
    }

    #[test]
    fn test_empty() {
        let rr = RoundRobin::new();
        assert!(rr.pick(&[]).is_none());
    }

    #[test]
    fn test_single() {
        let rr = RoundRobin::new();
        let list = vec!["A".to_string()];
        for _ in 0..100 {
            assert_eq!(rr.pick(&list), Some("A"));
        }
    }

    #[test]
    fn test_tier_priority() {
        let t = tiers(&["c:1"], &["a:1"], &["b:1"]);

        let all = status_map(&[("a:1", Available), ("b:1", Available), ("c:1", Available)]);
        assert_eq!(candidates(&t, &all).as_ref(), ["a:1".to_string()]);

        let no_same = status_map(&[("a:1", Unavailable), ("b:1", Available), ("c:1", Available)]);
        assert_eq!(candidates(&t, &no_same).as_ref(), ["b:1".to_string()]);

        let only_default =
            status_map(&[("a:1", Unavailable), ("b:1", Unavailable), ("c:1", Available)]);
        assert_eq!(candidates(&t, &only_default).as_ref(), ["c:1".to_string()]);
    }

    #[test]
    fn test_filters_unavailable_within_tier() {
        let t = tiers(&["u:1", "a:1", "b:1"], &[], &[]);
        let status = status_map(&[("u:1", Unavailable), ("a:1", Available), ("b:1", Available)]);
        assert_eq!(
            candidates(&t, &status).as_ref(),
            ["a:1".to_string(), "b:1".to_string()]
        );
    }

    #[test]
    fn test_all_unavailable_falls_back_to_default() {
        let t = tiers(&["c:1", "d:1"], &["a:1"], &["b:1"]);
        let status = status_map(&[
            ("a:1", Unavailable),
            ("b:1", Unavailable),
            ("c:1", Unavailable),
            ("d:1", Unavailable),
        ]);
        assert!(matches!(candidates(&t, &status), Cow::Borrowed(_)));
        assert_eq!(candidates(&t, &status).as_ref(), t.default.as_slice());
    }

    #[test]
    fn test_unprobed_addresses_fall_back_to_default() {
        let t = tiers(&["c:1"], &["a:1"], &[]);
        assert_eq!(candidates(&t, &StatusMap::new()).as_ref(), ["c:1".to_string()]);
    }

    #[test]
    fn test_no_default_yields_nothing() {
        let t = tiers(&[], &["a:1"], &[]);
        let status = status_map(&[("a:1", Unavailable)]);
        assert!(candidates(&t, &status).is_empty());
    }
}
