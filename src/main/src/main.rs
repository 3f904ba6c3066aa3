use log::{info, warn};
use strata_ecs::prelude::*;

#[derive(Component, Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Clone, Copy)]
struct Grounded;

#[derive(Singleton, Default)]
struct Time {
    seconds: f32,
    frames: u32,
}

struct Gravity {
    acceleration: f32,
}

struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn name(&self) -> &str {
        "physics"
    }

    fn install(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        ctx.set_extension(Gravity { acceleration: -9.8 });
        ctx.add_system_to(SystemPhase::FixedUpdate, apply_gravity);
        ctx.add_system(integrate);
        ctx.add_system_to(SystemPhase::LateUpdate, land);
        Ok(())
    }

    fn uninstall(&mut self, _ctx: &mut PluginContext<'_>) {
        info!("physics plugin removed");
    }
}

fn apply_gravity(world: &mut World, delta_time: f32) {
    let Some(acceleration) = world
        .try_get_extension::<Gravity>()
        .map(|gravity| gravity.acceleration)
    else {
        return;
    };
    for velocity in world.query::<&mut Velocity>().without::<Grounded>() {
        velocity.y += acceleration * delta_time;
    }
}

fn integrate(world: &mut World, delta_time: f32) {
    for (position, velocity) in world.query::<(&mut Position, &Velocity)>() {
        position.x += velocity.x * delta_time;
        position.y += velocity.y * delta_time;
    }
}

fn land(world: &mut World, _: f32) {
    let mut commands = CommandBuffer::new();
    for (entity, position) in world
        .query::<(Entity, &mut Position)>()
        .without::<Grounded>()
    {
        if position.y <= 0.0 {
            position.y = 0.0;
            commands.add(entity, Grounded);
        }
    }
    if let Err(error) = commands.apply(world) {
        warn!("landing failed: {error}");
    }
}

fn tick(world: &mut World, delta_time: f32) {
    if let Ok(time) = world.get_singleton_mut::<Time>() {
        time.seconds += delta_time;
        time.frames += 1;
    }
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let mut world = World::new();
    world.register::<Position>()?;
    world.register::<Velocity>()?;
    world.register::<Grounded>()?;
    world.set_singleton(Time::default())?;

    world.on_component_added::<Grounded, _>(|world, entity, _| {
        let name = world.get_name(entity).unwrap_or("<unnamed>");
        info!("{name} ({entity}) landed");
    })?;
    world.on_entity_destroyed(|_, entity| info!("{entity} destroyed"))?;

    world.install_plugin(PhysicsPlugin)?;
    world.add_system_to(SystemPhase::EarlyUpdate, tick)?;

    let ship = world
        .spawn_named("ship")
        .with(Position { x: 0.0, y: 10.0 })
        .with(Velocity { x: 2.0, y: 0.0 })
        .build()?;
    for i in 0..3 {
        let crate_entity = world
            .spawn_named(format!("crate-{i}"))
            .with(Position {
                x: i as f32,
                y: 5.0 + i as f32,
            })
            .with(Velocity { x: 0.0, y: 0.0 })
            .build()?;
        world.set_parent(crate_entity, ship)?;
    }

    let delta_time = 1.0 / 30.0;
    for _ in 0..90 {
        world.fixed_update(delta_time)?;
        world.update(delta_time)?;
    }

    let time = world.get_singleton::<Time>()?;
    info!("simulated {:.2}s over {} frames", time.seconds, time.frames);
    let grounded = world.query::<&Position>().with::<Grounded>().count();
    info!("{grounded} of {} entities grounded", world.entity_count());

    world.despawn_recursive(ship)?;
    world.uninstall_plugin("physics")?;
    world.dispose();
    Ok(())
}
