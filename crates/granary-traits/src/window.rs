//! Per-group sliding windows over period-sorted records.
//!
//! Rolling statistics are expressed through [`GroupSeries`] and
//! [`TrailingWindow`] so that "how much history is there" is answered in one
//! place. Windows are period-ranged: a window of length `W` ending at period
//! `t` holds the group's records with `t - W < period <= t`, so missing years
//! shrink the window rather than pulling in older data.

use std::collections::BTreeMap;

use crate::error::{GranaryError, Result};
use crate::records::{FeatureVector, MergedRecord, RiskScore};
use crate::types::{GroupKey, Period, RecordKey};

/// A record addressable by its (region, period, commodity) key.
pub trait Keyed {
    /// The record's normalized key.
    fn key(&self) -> &RecordKey;

    /// Shortcut for `self.key().period`.
    fn period(&self) -> Period {
        self.key().period
    }
}

impl Keyed for MergedRecord {
    fn key(&self) -> &RecordKey {
        &self.key
    }
}

impl Keyed for FeatureVector {
    fn key(&self) -> &RecordKey {
        &self.key
    }
}

impl Keyed for RiskScore {
    fn key(&self) -> &RecordKey {
        &self.key
    }
}

/// The records of one (region, commodity) group, sorted by period ascending.
#[derive(Debug, Clone)]
pub struct GroupSeries<'a, T> {
    key: GroupKey,
    items: Vec<&'a T>,
}

impl<'a, T: Keyed> GroupSeries<'a, T> {
    /// Group key.
    pub const fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Number of periods in the group.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the group has no records.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records in period order.
    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.items.iter().copied()
    }

    /// Record at a position.
    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.items.get(index).copied()
    }

    /// Records strictly before `index`.
    pub fn prior(&self, index: usize) -> &[&'a T] {
        &self.items[..index.min(self.items.len())]
    }

    /// The record of the period immediately before `index` (`period - 1`).
    pub fn previous(&self, index: usize) -> Option<&'a T> {
        let current = self.items.get(index)?;
        let prev = self.items.get(index.checked_sub(1)?)?;
        (prev.period() == current.period() - 1).then_some(*prev)
    }

    /// The record of the period immediately after `index` (`period + 1`).
    pub fn next(&self, index: usize) -> Option<&'a T> {
        let current = self.items.get(index)?;
        let next = self.items.get(index + 1)?;
        (next.period() == current.period() + 1).then_some(*next)
    }

    /// Trailing window of `len` periods ending at (and including) `index`.
    pub fn window(&self, index: usize, len: usize) -> TrailingWindow<'_, 'a, T> {
        let end = (index + 1).min(self.items.len());
        let head = &self.items[..end];
        let start = match head.last() {
            Some(current) => {
                let earliest = current.period() - len as Period;
                head.partition_point(|r| r.period() <= earliest)
            }
            None => 0,
        };
        TrailingWindow {
            items: &head[start..],
            len,
        }
    }

    /// Length of the run of consecutive periods ending at `index` for which
    /// `predicate` holds. 0 when the record at `index` fails it.
    pub fn run_length(&self, index: usize, predicate: impl Fn(&T) -> bool) -> u32 {
        match self.get(index) {
            Some(current) if predicate(current) => {}
            _ => return 0,
        }
        let mut run = 1;
        let mut i = index;
        while let Some(prev) = self.previous(i) {
            if !predicate(prev) {
                break;
            }
            run += 1;
            i -= 1;
        }
        run
    }
}

/// Records of a group falling inside a trailing period range.
#[derive(Debug, Clone, Copy)]
pub struct TrailingWindow<'w, 'a, T> {
    items: &'w [&'a T],
    len: usize,
}

impl<'w, 'a, T: Keyed> TrailingWindow<'w, 'a, T> {
    /// Number of periods present in the window.
    pub const fn available(&self) -> usize {
        self.items.len()
    }

    /// Configured window length.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the window holds no records.
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether at least `min` periods are present.
    pub const fn has_at_least(&self, min: usize) -> bool {
        self.items.len() >= min
    }

    /// Extract one value per record, current period last.
    pub fn values(&self, f: impl Fn(&T) -> f64) -> Vec<f64> {
        self.items.iter().map(|r| f(r)).collect()
    }

    /// Extract values of the records before the current one.
    pub fn prior_values(&self, f: impl Fn(&T) -> f64) -> Vec<f64> {
        match self.items.split_last() {
            Some((_, prior)) => prior.iter().map(|r| f(r)).collect(),
            None => Vec::new(),
        }
    }
}

/// Split records into (region, commodity) groups sorted by period.
///
/// Groups come back in key order so callers iterate deterministically.
///
/// # Errors
///
/// Returns [`GranaryError::DuplicateKey`] if two records share a key.
pub fn group_by_key<'a, T: Keyed>(
    records: &'a [T],
    table: &str,
) -> Result<BTreeMap<GroupKey, GroupSeries<'a, T>>> {
    let mut groups: BTreeMap<GroupKey, Vec<&'a T>> = BTreeMap::new();
    for record in records {
        groups.entry(record.key().group()).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(key, mut items)| {
            items.sort_by_key(|r| r.period());
            if let Some(pair) = items.windows(2).find(|w| w[0].period() == w[1].period()) {
                let dup = pair[1].key();
                return Err(GranaryError::DuplicateKey {
                    table: table.to_string(),
                    region: dup.region.clone(),
                    period: dup.period,
                    commodity: dup.commodity.clone(),
                });
            }
            Ok((key.clone(), GroupSeries { key, items }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(region: &str, period: Period, value: f64) -> MergedRecord {
        MergedRecord::yield_only(RecordKey::new(region, period, "CORN"), value)
    }

    #[test]
    fn test_group_by_key_sorts_periods() {
        let records = vec![
            record("IOWA", 2012, 3.0),
            record("KANSAS", 2010, 9.0),
            record("IOWA", 2010, 1.0),
            record("IOWA", 2011, 2.0),
        ];
        let groups = group_by_key(&records, "merged").unwrap();
        assert_eq!(groups.len(), 2);

        let iowa = groups.values().next().unwrap();
        assert_eq!(iowa.key().region, "IOWA");
        let periods: Vec<_> = iowa.iter().map(|r| r.period()).collect();
        assert_eq!(periods, vec![2010, 2011, 2012]);
    }

    #[test]
    fn test_group_by_key_rejects_duplicates() {
        let records = vec![record("IOWA", 2012, 3.0), record("iowa ", 2012, 4.0)];
        let err = group_by_key(&records, "merged").unwrap_err();
        assert!(matches!(err, GranaryError::DuplicateKey { period: 2012, .. }));
    }

    #[test]
    fn test_window_is_period_ranged() {
        let records = vec![
            record("IOWA", 2008, 1.0),
            record("IOWA", 2010, 2.0),
            record("IOWA", 2011, 3.0),
            record("IOWA", 2012, 4.0),
        ];
        let groups = group_by_key(&records, "merged").unwrap();
        let series = groups.values().next().unwrap();

        let window = series.window(3, 3);
        assert_eq!(window.values(|r| r.yield_value), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.prior_values(|r| r.yield_value), vec![2.0, 3.0]);

        // 2010 window covers 2008..=2010 but 2009 is missing
        let window = series.window(1, 3);
        assert_eq!(window.values(|r| r.yield_value), vec![1.0, 2.0]);

        let first = series.window(0, 3);
        assert_eq!(first.available(), 1);
        assert!(!first.has_at_least(2));
    }

    #[test]
    fn test_previous_and_next_require_adjacent_periods() {
        let records = vec![
            record("IOWA", 2008, 1.0),
            record("IOWA", 2010, 2.0),
            record("IOWA", 2011, 3.0),
        ];
        let groups = group_by_key(&records, "merged").unwrap();
        let series = groups.values().next().unwrap();

        assert!(series.previous(0).is_none());
        assert!(series.previous(1).is_none());
        assert_eq!(series.previous(2).map(|r| r.period()), Some(2010));
        assert!(series.next(0).is_none());
        assert_eq!(series.next(1).map(|r| r.period()), Some(2011));
        assert!(series.next(2).is_none());
    }

    #[test]
    fn test_run_length() {
        let records = vec![
            record("IOWA", 2009, 300.0),
            record("IOWA", 2010, 100.0),
            record("IOWA", 2011, 300.0),
            record("IOWA", 2012, 320.0),
            record("IOWA", 2013, 330.0),
            record("IOWA", 2015, 400.0),
        ];
        let groups = group_by_key(&records, "merged").unwrap();
        let series = groups.values().next().unwrap();
        let high = |r: &MergedRecord| r.yield_value > 250.0;

        assert_eq!(series.run_length(0, high), 1);
        assert_eq!(series.run_length(1, high), 0);
        assert_eq!(series.run_length(4, high), 3);
        // 2014 missing breaks the run
        assert_eq!(series.run_length(5, high), 1);
    }
}
