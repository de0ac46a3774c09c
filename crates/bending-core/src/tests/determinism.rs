//! Seeded replay: the same seed and the same inputs give the same world.

use super::helpers::init_tracing;
use crate::ability::common::{predicate, Fracture, FragileStructure};
use crate::collision::CollisionRegistry;
use crate::config::BendingConfig;
use crate::user::BenderRegistry;
use crate::world::{BlockPos, BlockState, BlockType, MemoryWorld, WorldKey};
use crate::world_manager::{WorldInstance, WorldManager};

const TICKS: usize = 300;

fn wall() -> Vec<BlockPos> {
    (65..69)
        .flat_map(|y| (0..5).map(move |x| BlockPos::new(x, y, 0)))
        .collect()
}

fn walled_world(name: &str) -> MemoryWorld {
    let mut host = MemoryWorld::new(name);
    host.fill(
        BlockPos::new(0, 65, 0),
        BlockPos::new(4, 68, 0),
        BlockState::of(BlockType::Stone),
    );
    host
}

fn crumbling_world(name: &str, config: &BendingConfig) -> WorldInstance {
    let mut world = WorldInstance::new(Box::new(walled_world(name)), config);
    let fracture = Fracture::builder()
        .add(wall())
        .fragile(
            FragileStructure::builder(predicate(|state| state.kind == BlockType::MagmaBlock))
                .falling_blocks(true),
        )
        .build(config.tick_millis)
        .unwrap();
    let (abilities, _) = world.split_mut();
    abilities.add_updatable(Box::new(fracture));
    world
}

fn frame(world: &WorldInstance) -> Vec<BlockType> {
    wall()
        .into_iter()
        .map(|pos| world.context().host().block_type(pos))
        .collect()
}

fn run_fracture(seed: u64) -> Vec<Vec<BlockType>> {
    init_tracing();
    let config = BendingConfig {
        seed,
        ..BendingConfig::default()
    };
    let mut world = crumbling_world("overworld", &config);
    let (benders, collisions) = (BenderRegistry::new(), CollisionRegistry::new());
    (0..TICKS)
        .map(|_| {
            world.update(&benders, &collisions);
            frame(&world)
        })
        .collect()
}

#[test]
fn same_seed_replays_identically() {
    assert_eq!(run_fracture(7), run_fracture(7));
}

#[test]
fn fracture_turns_the_wall_to_magma_then_collapses() {
    let history = run_fracture(7);
    let magma = history
        .iter()
        .position(|frame| frame.iter().all(|&t| t == BlockType::MagmaBlock))
        .expect("wall never fully cracked");
    assert!(history[magma..]
        .iter()
        .any(|frame| frame.iter().all(|&t| t == BlockType::Air)));
    // Cracks need several hits before a block gives way.
    assert!(history[0].iter().all(|&t| t == BlockType::Stone));
}

#[test]
fn parallel_world_updates_match_serial_runs() {
    init_tracing();
    let config = BendingConfig {
        seed: 11,
        ..BendingConfig::default()
    };
    let names = ["overworld", "nether", "end"];
    let (benders, collisions) = (BenderRegistry::new(), CollisionRegistry::new());

    let mut manager = WorldManager::new();
    for name in names {
        manager.add(crumbling_world(name, &config)).unwrap();
    }
    let mut serial: Vec<WorldInstance> = names
        .iter()
        .map(|name| crumbling_world(name, &config))
        .collect();

    for _ in 0..TICKS {
        manager.update(&benders, &collisions);
        for world in &mut serial {
            world.update(&benders, &collisions);
        }
        for world in &serial {
            let parallel = manager.get(&WorldKey::new(world.key().as_str())).unwrap();
            assert_eq!(frame(parallel), frame(world));
            assert_eq!(
                parallel.context().entities().len(),
                world.context().entities().len()
            );
        }
    }
}
