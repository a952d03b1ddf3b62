//! Field-by-field merge of partial updates into the ordered match collection.

use crate::model::{Match, MatchUpdate};

impl Match {
    /// Overwrites every field present in `update`; absent fields keep their
    /// current value. The caller is responsible for matching ids.
    pub fn apply(&mut self, update: &MatchUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(current_set) = update.current_set {
            self.current_set = current_set;
        }
        if let Some(score_a) = update.score_a {
            self.score_a = score_a;
        }
        if let Some(score_b) = update.score_b {
            self.score_b = score_b;
        }
        if let Some(rotation_a) = update.rotation_a {
            self.rotation_a = Some(rotation_a);
        }
        if let Some(rotation_b) = update.rotation_b {
            self.rotation_b = Some(rotation_b);
        }
    }
}

/// Applies `update` to the match it names, in place. Returns `false` and
/// leaves `matches` untouched when no match has that id.
pub fn merge_in_place(matches: &mut [Match], update: &MatchUpdate) -> bool {
    match matches.iter_mut().find(|m| m.id == update.match_id) {
        Some(target) => {
            target.apply(update);
            true
        }
        None => false,
    }
}

/// Pure form of [`merge_in_place`]: returns the merged collection and whether
/// the update was applied. Positions never change.
pub fn merge(matches: &[Match], update: &MatchUpdate) -> (Vec<Match>, bool) {
    let mut merged = matches.to_vec();
    let applied = merge_in_place(&mut merged, update);
    (merged, applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchStatus;

    fn live(id: &str, score_a: u32, score_b: u32, current_set: u32) -> Match {
        Match {
            status: MatchStatus::Live,
            score_a,
            score_b,
            current_set,
            rotation_a: Some(1),
            rotation_b: Some(4),
            composition_a: vec![1, 2, 3, 4, 5, 6],
            ..Match::new(id, format!("{id}-home"), format!("{id}-away"))
        }
    }

    fn collection() -> Vec<Match> {
        vec![
            live("m1", 10, 8, 2),
            Match::new("m2", "Falcons", "Otters"),
            live("m3", 3, 3, 1),
        ]
    }

    #[test]
    fn partial_update_only_touches_present_fields() {
        let before = collection();
        let (after, applied) = merge(&before, &MatchUpdate::new("m1").with_score_a(11));
        assert!(applied);

        let expected = Match {
            score_a: 11,
            ..before[0].clone()
        };
        assert_eq!(after[0], expected);
        assert_eq!(after[1..], before[1..]);
    }

    #[test]
    fn unknown_match_leaves_collection_unchanged() {
        let before = collection();
        let (after, applied) = merge(&before, &MatchUpdate::new("nope").with_score(1, 1));
        assert!(!applied);
        assert_eq!(after, before);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let update = MatchUpdate::new("m3")
            .with_status(MatchStatus::Completed)
            .with_current_set(3)
            .with_score(25, 21)
            .with_rotation(2, 6);
        let (once, _) = merge(&collection(), &update);
        let (twice, applied) = merge(&once, &update);
        assert!(applied);
        assert_eq!(once, twice);
    }

    #[test]
    fn positions_are_preserved() {
        let before = collection();
        for (index, target) in before.iter().enumerate() {
            let update = MatchUpdate::new(target.id.clone())
                .with_status(MatchStatus::Live)
                .with_score(99, 98);
            let (after, _) = merge(&before, &update);
            let ids: Vec<_> = after.iter().map(|m| m.id.as_str()).collect();
            assert_eq!(ids, ["m1", "m2", "m3"]);
            assert_eq!(after[index].score_a, 99);
        }
    }

    #[test]
    fn empty_update_is_a_successful_noop() {
        let mut matches = collection();
        let before = matches.clone();
        assert!(merge_in_place(&mut matches, &MatchUpdate::new("m2")));
        assert_eq!(matches, before);
    }

    #[test]
    fn rotations_are_set_but_never_cleared() {
        let mut scheduled = Match::new("m9", "A", "B");
        scheduled.apply(&MatchUpdate::new("m9").with_rotation(1, 1));
        assert_eq!(scheduled.rotation_a, Some(1));
        scheduled.apply(&MatchUpdate::new("m9").with_status(MatchStatus::Completed));
        assert_eq!(scheduled.rotation_b, Some(1));
    }
}
