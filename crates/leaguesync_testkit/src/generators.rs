//! Property-based test generators using proptest.
//!
//! Batches keep ids unique so they model one producer snapshot.

use crate::fixtures::team;
use leaguesync_codec::{Document, Value};
use proptest::prelude::*;

/// Strategy for scalar values that survive canonical encoding.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-zA-Z ]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for flat documents with up to `max_fields` fields.
pub fn document_strategy(max_fields: usize) -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-z][a-zA-Z]{0,9}", scalar_value_strategy(), 0..=max_fields)
}

/// Strategy for a batch of teams with unique ids.
pub fn team_batch_strategy(max_teams: usize) -> impl Strategy<Value = Vec<Document>> {
    prop::collection::btree_map(0i64..1_000, 40i64..100, 1..=max_teams.max(1))
        .prop_map(|teams| teams.into_iter().map(|(id, ovr)| team(id, ovr)).collect())
}

/// Strategy for a team batch plus the index of one team to modify.
pub fn team_batch_with_pick(max_teams: usize) -> impl Strategy<Value = (Vec<Document>, usize)> {
    team_batch_strategy(max_teams).prop_flat_map(|batch| {
        let len = batch.len();
        (Just(batch), 0..len)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn team_ids_are_unique(batch in team_batch_strategy(20)) {
            let ids: BTreeSet<_> = batch.iter().map(|t| t["teamId"].clone().to_key_string()).collect();
            prop_assert_eq!(ids.len(), batch.len());
        }

        #[test]
        fn pick_is_in_range((batch, pick) in team_batch_with_pick(10)) {
            prop_assert!(pick < batch.len());
        }
    }
}
