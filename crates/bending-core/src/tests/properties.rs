//! Property tests over the public engine surface.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use proptest::prelude::*;

use super::helpers::{noop_description, test_user, Noop};
use crate::ability::{AbilityDescription, AbilityKey, AbilityRegistry, Activation};
use crate::config::{BendingConfig, SequenceConfig};
use crate::context::WorldContext;
use crate::sequence::{Sequence, SequenceManager, SequenceRegistry, SequenceStep};
use crate::temporal::TempBlock;
use crate::user::Element;
use crate::world::{BlockPos, BlockState, BlockType, MemoryWorld};

const PALETTE: [BlockType; 5] = [
    BlockType::Stone,
    BlockType::Dirt,
    BlockType::Ice,
    BlockType::Cobblestone,
    BlockType::Sandstone,
];

fn context() -> WorldContext {
    WorldContext::new(Box::new(MemoryWorld::new("world")), &BendingConfig::default())
}

fn column(index: usize) -> BlockPos {
    BlockPos::new(0, 64 + index as i32, 0)
}

/// Drop consecutive repeats so every build pushes a new frame.
fn distinct_runs(indices: Vec<usize>) -> Vec<BlockType> {
    let mut kinds: Vec<BlockType> = indices.into_iter().map(|i| PALETTE[i]).collect();
    kinds.dedup();
    kinds
}

proptest! {
    #[test]
    fn reverts_unwind_the_stack_one_frame_at_a_time(
        indices in proptest::collection::vec(0usize..PALETTE.len(), 1..12),
        ticks in 1u32..500,
    ) {
        let kinds = distinct_runs(indices);
        let pos = column(0);
        let mut world = context();
        for kind in &kinds {
            TempBlock::builder(BlockState::of(*kind)).ticks(ticks).build(&mut world, pos);
        }
        prop_assert_eq!(world.blocks().get(pos).map(TempBlock::depth), Some(kinds.len()));

        for below in (0..kinds.len() - 1).rev() {
            prop_assert!(!world.revert_block(pos));
            prop_assert_eq!(world.host().block_type(pos), kinds[below]);
        }
        prop_assert!(world.revert_block(pos));
        prop_assert_eq!(world.host().block_type(pos), BlockType::Air);
        prop_assert!(!world.blocks().is_temp(pos));

        // Reverting again changes nothing.
        prop_assert!(!world.revert_block(pos));
        prop_assert_eq!(world.host().block_type(pos), BlockType::Air);
    }

    #[test]
    fn one_temporary_block_per_position(
        ops in proptest::collection::vec((0usize..4, 0usize..PALETTE.len(), 1u32..40, 0usize..5), 1..40)
    ) {
        let mut world = context();
        let mut touched = BTreeSet::new();
        for (slot, kind, ticks, advance) in ops {
            let pos = column(slot);
            touched.insert(pos);
            TempBlock::builder(BlockState::of(PALETTE[kind])).ticks(ticks).build(&mut world, pos);
            for _ in 0..advance {
                world.advance();
            }
            prop_assert!(world.blocks().len() <= touched.len());
            for &pos in &touched {
                let temp = world.blocks().is_temp(pos);
                let changed = world.host().block_type(pos) != BlockType::Air;
                prop_assert!(!changed || temp);
            }
        }
        world.revert_all();
        prop_assert!(world.blocks().is_empty());
        for pos in touched {
            prop_assert_eq!(world.host().block_type(pos), BlockType::Air);
        }
    }
}

struct Combos {
    abilities: AbilityRegistry,
    sequences: SequenceRegistry,
    keys: Vec<AbilityKey>,
}

fn combos() -> Combos {
    let mut abilities = AbilityRegistry::new();
    let keys: Vec<AbilityKey> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            abilities
                .register(noop_description(name, Element::WATER))
                .unwrap()
                .key()
                .clone()
        })
        .collect();
    let combo: Arc<AbilityDescription> = abilities
        .register(
            AbilityDescription::builder("torrent", Noop::factory)
                .element(Element::WATER)
                .activation(Activation::Sequence)
                .build()
                .unwrap(),
        )
        .unwrap();
    let steps = [0, 1, 0, 2]
        .iter()
        .map(|&i| SequenceStep::new(keys[i].clone(), Activation::Attack))
        .collect();
    let mut sequences = SequenceRegistry::new();
    sequences
        .register(Sequence::new(combo, steps).unwrap(), &abilities)
        .unwrap();
    Combos {
        abilities,
        sequences,
        keys,
    }
}

proptest! {
    #[test]
    fn combo_fires_exactly_when_the_buffer_ends_with_it(
        inputs in proptest::collection::vec(0usize..3, 1..60),
        capacity in 4usize..8,
    ) {
        let Combos { abilities, sequences, keys } = combos();
        let config = SequenceConfig { capacity, ..SequenceConfig::default() };
        let mut manager = SequenceManager::new(&config);
        let mut user = test_user(1, "world");
        user.add_elements(Element::WATER);

        let pattern = [0usize, 1, 0, 2];
        let mut model: VecDeque<usize> = VecDeque::new();
        for (i, input) in inputs.into_iter().enumerate() {
            let step = SequenceStep::new(keys[input].clone(), Activation::Attack);
            let fired = manager
                .register_step(&user, step, i as u64 * 50, &sequences, &abilities)
                .is_some();

            model.push_back(input);
            while model.len() > capacity {
                model.pop_front();
            }
            let expected = model.len() >= pattern.len()
                && model.iter().skip(model.len() - pattern.len()).eq(pattern.iter());
            if expected {
                model.clear();
            }
            prop_assert_eq!(fired, expected);
            prop_assert_eq!(manager.buffered(user.id()).len(), model.len());
        }
    }
}
