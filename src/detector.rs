use std::collections::HashMap;

use crate::types::{Listing, Purchase};

/// How current records are matched against previous ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectMode {
    /// Join previous records by name and look each current record up.
    #[default]
    Keyed,
    /// Sort both snapshots by name and compare index by index. Fragile under
    /// membership drift (one added or removed item shifts every later
    /// index); kept for parity with the historical behavior.
    Positional,
}

/// Compute the set of newly purchased items between two snapshots.
///
/// A record counts as a purchase iff it is still flagged as selling and its
/// price differs from the matched previous record. `None` prices compare as
/// a value of their own: `None != Some(_)`, `None == None`.
///
/// Pure: inputs are never mutated, and missing data yields an empty result
/// rather than an error. Result order follows `current` order (the caller
/// hands snapshots pre-sorted by name); each qualifying record appears
/// exactly once.
pub fn detect_purchases(
    previous: &[Listing],
    current: &[Listing],
    mode: DetectMode,
) -> Vec<Purchase> {
    match mode {
        DetectMode::Keyed => detect_keyed(previous, current),
        DetectMode::Positional => detect_positional(previous, current),
    }
}

fn detect_keyed(previous: &[Listing], current: &[Listing]) -> Vec<Purchase> {
    // names are not guaranteed unique; on a duplicate the last record wins
    let by_name: HashMap<&str, &Listing> = previous
        .iter()
        .map(|listing| (listing.name.as_str(), listing))
        .collect();

    current
        .iter()
        .filter(|cur| {
            cur.is_selling
                && by_name
                    .get(cur.name.as_str())
                    .is_some_and(|prev| prev.price != cur.price)
        })
        .map(|cur| Purchase::new(cur.clone()))
        .collect()
}

fn detect_positional(previous: &[Listing], current: &[Listing]) -> Vec<Purchase> {
    let mut prev_sorted: Vec<&Listing> = previous.iter().collect();
    let mut cur_sorted: Vec<&Listing> = current.iter().collect();
    prev_sorted.sort_by(|a, b| a.name.cmp(&b.name));
    cur_sorted.sort_by(|a, b| a.name.cmp(&b.name));

    cur_sorted
        .iter()
        .zip(prev_sorted.iter())
        .filter(|(cur, prev)| cur.is_selling && cur.price != prev.price)
        .map(|(cur, _)| Purchase::new((*cur).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(name: &str, price: Option<u64>, is_selling: bool) -> Listing {
        Listing {
            name: name.to_string(),
            price,
            address: format!("EQ{name}"),
            owner: "EQowner".to_string(),
            is_selling,
        }
    }

    fn names(purchases: &[Purchase]) -> Vec<&str> {
        purchases.iter().map(|p| p.listing.name.as_str()).collect()
    }

    // ── both modes ─────────────────────────────────────────────────

    #[test]
    fn identical_snapshots_yield_nothing() {
        let snapshot = vec![
            listing("A", Some(100), true),
            listing("B", None, false),
            listing("C", Some(50), true),
        ];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            assert!(detect_purchases(&snapshot, &snapshot, mode).is_empty());
        }
    }

    #[test]
    fn price_change_while_selling_is_a_purchase() {
        let previous = vec![listing("A", Some(100), true)];
        let current = vec![listing("A", Some(120), true)];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            let purchases = detect_purchases(&previous, &current, mode);
            assert_eq!(names(&purchases), vec!["A"]);
            assert_eq!(purchases[0].listing.price, Some(120));
        }
    }

    #[test]
    fn delisted_item_is_not_a_purchase() {
        let previous = vec![listing("A", Some(100), true)];
        let current = vec![listing("A", Some(100), false)];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            assert!(detect_purchases(&previous, &current, mode).is_empty());
        }
    }

    #[test]
    fn price_dropped_to_none_while_selling_counts() {
        let previous = vec![listing("A", Some(100), true)];
        let current = vec![listing("A", None, true)];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            assert_eq!(detect_purchases(&previous, &current, mode).len(), 1);
        }
    }

    #[test]
    fn none_to_none_is_equal() {
        let previous = vec![listing("A", None, true)];
        let current = vec![listing("A", None, true)];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            assert!(detect_purchases(&previous, &current, mode).is_empty());
        }
    }

    #[test]
    fn empty_snapshots_yield_nothing() {
        let populated = vec![listing("A", Some(100), true)];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            assert!(detect_purchases(&[], &[], mode).is_empty());
            assert!(detect_purchases(&populated, &[], mode).is_empty());
            assert!(detect_purchases(&[], &populated, mode).is_empty());
        }
    }

    #[test]
    fn result_follows_current_order() {
        let previous = vec![
            listing("A", Some(100), true),
            listing("B", Some(200), true),
            listing("C", Some(300), true),
        ];
        let current = vec![
            listing("A", Some(110), true),
            listing("B", Some(200), true),
            listing("C", Some(330), true),
        ];
        for mode in [DetectMode::Keyed, DetectMode::Positional] {
            let purchases = detect_purchases(&previous, &current, mode);
            assert_eq!(names(&purchases), vec!["A", "C"]);
        }
    }

    // ── keyed join ─────────────────────────────────────────────────

    #[test]
    fn keyed_ignores_names_missing_from_previous() {
        let previous = vec![listing("A", Some(100), true)];
        let current = vec![
            listing("A", Some(100), true),
            listing("B", Some(50), true), // newly listed, no prior state
        ];
        assert!(detect_purchases(&previous, &current, DetectMode::Keyed).is_empty());
    }

    #[test]
    fn keyed_is_stable_under_membership_drift() {
        // B disappeared between polls; positional alignment would compare
        // C against B and report a false positive, the keyed join does not.
        let previous = vec![
            listing("A", Some(100), true),
            listing("B", Some(200), true),
            listing("C", Some(300), true),
        ];
        let current = vec![
            listing("A", Some(100), true),
            listing("C", Some(300), true),
        ];
        assert!(detect_purchases(&previous, &current, DetectMode::Keyed).is_empty());
        assert_eq!(
            detect_purchases(&previous, &current, DetectMode::Positional).len(),
            1
        );
    }

    #[test]
    fn keyed_reports_each_qualifying_record_once() {
        let previous = vec![listing("A", Some(100), true)];
        // duplicate name in current: both records qualify independently
        let current = vec![
            listing("A", Some(120), true),
            listing("A", Some(130), true),
        ];
        let purchases = detect_purchases(&previous, &current, DetectMode::Keyed);
        assert_eq!(purchases.len(), 2);
        assert_eq!(purchases[0].listing.price, Some(120));
        assert_eq!(purchases[1].listing.price, Some(130));
    }

    // ── positional legacy mode ─────────────────────────────────────

    #[test]
    fn positional_sorts_before_comparing() {
        // same population, different order: sorting re-aligns the pairs
        let previous = vec![
            listing("B", Some(200), true),
            listing("A", Some(100), true),
        ];
        let current = vec![
            listing("A", Some(100), true),
            listing("B", Some(250), true),
        ];
        let purchases = detect_purchases(&previous, &current, DetectMode::Positional);
        assert_eq!(names(&purchases), vec!["B"]);
    }

    #[test]
    fn positional_ignores_unmatched_tail() {
        let previous = vec![listing("A", Some(100), true)];
        let current = vec![
            listing("A", Some(100), true),
            listing("B", Some(50), true), // beyond min(len), never compared
        ];
        assert!(detect_purchases(&previous, &current, DetectMode::Positional).is_empty());
    }

    #[test]
    fn detector_does_not_mutate_inputs() {
        let previous = vec![
            listing("B", Some(200), true),
            listing("A", Some(100), true),
        ];
        let current = vec![
            listing("A", Some(110), true),
            listing("B", Some(200), true),
        ];
        let previous_before = previous.clone();
        let current_before = current.clone();
        detect_purchases(&previous, &current, DetectMode::Keyed);
        detect_purchases(&previous, &current, DetectMode::Positional);
        assert_eq!(previous, previous_before);
        assert_eq!(current, current_before);
    }
}
