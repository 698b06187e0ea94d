//! Property tests for the id generator.
//!
//! Random generate/release sequences must preserve the set invariants:
//! an id is "used" exactly when it was generated and not released, the
//! reuse queue and the live set never intersect, and no id ever exceeds
//! the configured limit.

use std::collections::HashSet;

use cairn_world::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum IdOp {
    Generate,
    /// Release the live id at this (wrapped) position.
    Release(usize),
}

fn id_op_strategy() -> impl Strategy<Value = IdOp> {
    prop_oneof![
        2 => Just(IdOp::Generate),
        1 => (0..256usize).prop_map(IdOp::Release),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn id_set_invariants_hold_under_random_ops(
        ops in prop::collection::vec(id_op_strategy(), 1..300),
        limit in 0..64u64,
    ) {
        let mut ids = IdGenerator::new(limit);
        let mut live: Vec<u64> = Vec::new();
        let mut ever_generated: HashSet<u64> = HashSet::new();

        for op in ops {
            match op {
                IdOp::Generate => match ids.generate() {
                    Ok(id) => {
                        prop_assert!(id <= limit, "id {id} exceeds limit {limit}");
                        prop_assert!(!live.contains(&id), "id {id} handed out twice");
                        ever_generated.insert(id);
                        live.push(id);
                    }
                    Err(WorldError::IdSpaceExhausted { .. }) => {
                        // Exhaustion must mean the whole space is live.
                        prop_assert_eq!(live.len() as u64, limit + 1);
                    }
                },
                IdOp::Release(index) => {
                    if !live.is_empty() {
                        let id = live.remove(index % live.len());
                        ids.release(id);
                        prop_assert!(!ids.is_used(id));
                    }
                }
            }

            // used <=> generated and not released
            for &id in &live {
                prop_assert!(ids.is_used(id));
            }
            prop_assert_eq!(ids.live_count(), live.len());

            // recycled + live never exceeds the ids ever minted fresh.
            prop_assert!(
                ids.recycled_count() + ids.live_count() <= ids.high_water_mark() as usize
            );

            // The high-water mark only tracks fresh ids.
            prop_assert!(ids.high_water_mark() as usize <= ever_generated.len().max(1));
        }
    }

    #[test]
    fn released_ids_return_in_fifo_order(
        count in 2..32u64,
    ) {
        let mut ids = IdGenerator::default();
        let minted: Vec<u64> = (0..count).map(|_| ids.generate().unwrap()).collect();

        for &id in &minted {
            ids.release(id);
        }
        for &id in &minted {
            prop_assert_eq!(ids.generate().unwrap(), id);
        }
    }
}
