use std::collections::HashSet;
use strata_ecs::prelude::*;

#[derive(Component, Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
struct Id(u32);

#[derive(Component, Debug, Clone, Copy, PartialEq)]
struct Enemy;

fn world() -> World {
    let mut world = World::new();
    world.register::<Position>().unwrap();
    world.register::<Velocity>().unwrap();
    world.register::<Id>().unwrap();
    world.register::<Enemy>().unwrap();
    world
}

#[test]
fn position_velocity_walkthrough() {
    let mut world = world();
    let e = world.spawn().with(Position { x: 0.0, y: 0.0 }).build().unwrap();
    let position_only = world.archetype_of(e).unwrap();

    world.add(e, Velocity { x: 1.0, y: 2.0 }).unwrap();
    assert_ne!(world.archetype_of(e), Some(position_only));
    assert_eq!(world.get::<Position>(e).unwrap(), &Position { x: 0.0, y: 0.0 });
    assert_eq!(world.get::<Velocity>(e).unwrap(), &Velocity { x: 1.0, y: 2.0 });

    for (position, velocity) in world.query::<(&mut Position, &Velocity)>() {
        position.x += velocity.x;
        position.y += velocity.y;
    }
    assert_eq!(world.get::<Position>(e).unwrap(), &Position { x: 1.0, y: 2.0 });

    assert!(world.remove::<Velocity>(e).unwrap());
    assert_eq!(world.archetype_of(e), Some(position_only));
    assert!(!world.has::<Velocity>(e));
    assert_eq!(world.get::<Position>(e).unwrap(), &Position { x: 1.0, y: 2.0 });
    assert_eq!(world.archetype_count(), 3);
}

#[test]
fn mass_spawn_and_despawn_keeps_rows_consistent() {
    let mut world = world();
    let entities: Vec<_> = (0..1000)
        .map(|i| {
            world
                .spawn()
                .with(Id(i))
                .with(Position {
                    x: i as f32,
                    y: 0.0,
                })
                .build()
                .unwrap()
        })
        .collect();

    for entity in entities.iter().step_by(5) {
        world.despawn(*entity).unwrap();
    }

    assert_eq!(world.entity_count(), 800);
    assert_eq!(world.query::<(&Id, &Position)>().count(), 800);

    for (i, &entity) in entities.iter().enumerate() {
        if i % 5 == 0 {
            assert!(!world.is_alive(entity));
            continue;
        }
        let location = world.entity_location(entity).unwrap();
        let archetype = &world.archetypes()[location.archetype_id];
        assert_eq!(archetype.entities()[location.row], entity);
        assert_eq!(world.get::<Id>(entity).unwrap(), &Id(i as u32));
        assert_eq!(world.get::<Position>(entity).unwrap().x, i as f32);
    }
}

#[test]
fn query_yields_exactly_matching_entities() {
    let mut world = world();
    let mut expected = HashSet::new();
    for i in 0..30 {
        let entity = match i % 3 {
            0 => world
                .spawn()
                .with(Position { x: 0.0, y: 0.0 })
                .with(Velocity { x: 0.0, y: 0.0 })
                .build(),
            1 => world
                .spawn()
                .with(Velocity { x: 0.0, y: 0.0 })
                .with(Position { x: 0.0, y: 0.0 })
                .with(Enemy)
                .build(),
            _ => world.spawn().with(Position { x: 0.0, y: 0.0 }).build(),
        }
        .unwrap();
        if i % 3 != 2 {
            expected.insert(entity);
        }
    }

    let found: HashSet<_> = world
        .query::<(Entity, &Position, &Velocity)>()
        .into_iter()
        .map(|(entity, _, _)| entity)
        .collect();
    assert_eq!(found, expected);

    let friendly = world
        .query::<(&Position, &Velocity)>()
        .without::<Enemy>()
        .count();
    assert_eq!(friendly, 10);
}

#[test]
fn recycled_index_gets_new_generation() {
    let mut world = world();
    let first = world.spawn().with(Id(1)).build().unwrap();
    world.despawn(first).unwrap();
    let second = world.spawn().with(Id(2)).build().unwrap();

    assert_eq!(first.index(), second.index());
    assert_ne!(first.generation(), second.generation());
    assert!(!world.is_alive(first));
    assert_eq!(
        world.get::<Id>(first),
        Err(EcsError::EntityNotAlive(first))
    );
    assert_eq!(world.get::<Id>(second).unwrap(), &Id(2));
    assert!(!world.is_alive(Entity::NULL));
}

#[test]
fn worlds_are_isolated() {
    let mut a = World::new();
    let mut b = World::new();
    a.register::<Enemy>().unwrap();
    let id_a = a.register::<Position>().unwrap();
    let id_b = b.register::<Position>().unwrap();

    assert_ne!(id_a, id_b);
    assert!(!b.is_registered::<Enemy>());

    a.spawn().with(Position { x: 0.0, y: 0.0 }).build().unwrap();
    assert_eq!(b.query::<&Position>().count(), 0);
}

#[test]
fn register_twice_returns_same_id() {
    let mut world = world();
    let id = world.register::<Position>().unwrap();
    assert_eq!(world.register::<Position>().unwrap(), id);
    assert_eq!(world.component_id::<Position>(), Some(id));
    assert_eq!(world.component_info::<Position>().unwrap().size(), 8);
    assert!(world.component_info::<Enemy>().unwrap().is_tag());
}

#[test]
fn worlds_can_move_between_threads() {
    let mut world = world();
    world.spawn().with(Id(7)).build().unwrap();
    let count = std::thread::spawn(move || world.query::<&Id>().count())
        .join()
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn entities_lists_every_live_entity() {
    let mut world = world();
    let a = world.spawn_empty().unwrap();
    let b = world.spawn().with(Id(1)).build().unwrap();
    let c = world.spawn().with(Enemy).build().unwrap();
    world.despawn(a).unwrap();

    let live: HashSet<_> = world.entities().collect();
    assert_eq!(live, HashSet::from([b, c]));
}
