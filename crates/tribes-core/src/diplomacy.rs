use tribes_protocol::{PlayerId, Relation, RelationSnapshot};

/// One player's view of another.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelationState {
    pub relation: Relation,
    pub has_embassy: bool,
    /// Set on `from -> to` when `from` has offered peace to `to`.
    pub peace_offered: bool,
}

/// Ordered-pair relations stored as an `n * n` table. A's view of B is independent of B's
/// view of A; the diagonal is unused.
#[derive(Clone, Debug, PartialEq)]
pub struct DiplomacyState {
    player_count: usize,
    entries: Vec<RelationState>,
}

impl DiplomacyState {
    pub fn new(player_count: usize) -> Self {
        let n = player_count.max(1);
        Self {
            player_count: n,
            entries: vec![RelationState::default(); n * n],
        }
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    fn index(&self, from: PlayerId, to: PlayerId) -> Option<usize> {
        let (a, b) = (from.index(), to.index());
        if a >= self.player_count || b >= self.player_count || a == b {
            return None;
        }
        Some(a * self.player_count + b)
    }

    pub fn get(&self, from: PlayerId, to: PlayerId) -> Option<&RelationState> {
        self.index(from, to).map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, from: PlayerId, to: PlayerId) -> Option<&mut RelationState> {
        self.index(from, to).map(move |i| &mut self.entries[i])
    }

    pub fn relation(&self, from: PlayerId, to: PlayerId) -> Relation {
        self.get(from, to).map(|r| r.relation).unwrap_or_default()
    }

    pub fn set_relation(&mut self, from: PlayerId, to: PlayerId, relation: Relation) -> bool {
        match self.get_mut(from, to) {
            Some(entry) if entry.relation != relation => {
                entry.relation = relation;
                true
            }
            _ => false,
        }
    }

    /// Every ordered pair, row-major.
    pub fn to_snapshots(&self) -> Vec<RelationSnapshot> {
        let n = self.player_count;
        (0..n)
            .flat_map(|a| (0..n).map(move |b| (a, b)))
            .filter(|(a, b)| a != b)
            .map(|(a, b)| {
                let entry = self.entries[a * n + b];
                RelationSnapshot {
                    from: PlayerId(a as u8),
                    to: PlayerId(b as u8),
                    relation: entry.relation,
                    has_embassy: entry.has_embassy,
                    peace_offered: entry.peace_offered,
                }
            })
            .collect()
    }

    /// Rebuilds the table; pairs absent from `snapshots` stay neutral. Out-of-range pairs
    /// are ignored.
    pub fn from_snapshots(player_count: usize, snapshots: &[RelationSnapshot]) -> Self {
        let mut state = Self::new(player_count);
        for snap in snapshots {
            if let Some(entry) = state.get_mut(snap.from, snap.to) {
                *entry = RelationState {
                    relation: snap.relation,
                    has_embassy: snap.has_embassy,
                    peace_offered: snap.peace_offered,
                };
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_independent() {
        let mut d = DiplomacyState::new(3);
        assert!(d.set_relation(PlayerId(0), PlayerId(1), Relation::Hostile));
        assert_eq!(d.relation(PlayerId(0), PlayerId(1)), Relation::Hostile);
        assert_eq!(d.relation(PlayerId(1), PlayerId(0)), Relation::Neutral);
        assert!(!d.set_relation(PlayerId(0), PlayerId(1), Relation::Hostile));
    }

    #[test]
    fn self_relation_is_not_stored() {
        let mut d = DiplomacyState::new(2);
        assert!(d.get(PlayerId(1), PlayerId(1)).is_none());
        assert!(!d.set_relation(PlayerId(1), PlayerId(1), Relation::Allied));
        assert!(d.get(PlayerId(0), PlayerId(2)).is_none());
    }

    #[test]
    fn missing_pairs_backfill_neutral() {
        let snaps = vec![RelationSnapshot {
            from: PlayerId(2),
            to: PlayerId(0),
            relation: Relation::Friendly,
            has_embassy: true,
            peace_offered: false,
        }];
        let d = DiplomacyState::from_snapshots(3, &snaps);
        assert_eq!(d.relation(PlayerId(2), PlayerId(0)), Relation::Friendly);
        assert!(d.get(PlayerId(2), PlayerId(0)).unwrap().has_embassy);
        assert_eq!(d.relation(PlayerId(0), PlayerId(2)), Relation::Neutral);
        assert_eq!(d.to_snapshots().len(), 6);
    }
}
