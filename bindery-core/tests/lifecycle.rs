//! Integration Tests for Entities, Factories and the World
//!
//! These tests build small consumer factories (a spot light, a timed effect
//! block, a path-following agent) the way a game would, and drive them
//! through instantiation, ticking, deletion and layout restore.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bindery_core::prelude::*;
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ----------------------------------------------------------------------------
// Consumer components and factories
// ----------------------------------------------------------------------------

#[derive(Default)]
struct Transform {
    position: Property<[f32; 3]>,
    orientation: Property<f32>,
}

impl Component for Transform {}

#[derive(Default)]
struct SpotLight {
    position: Property<[f32; 3]>,
    color: Property<[f32; 3]>,
    field_of_view: Property<f32>,
}

impl Component for SpotLight {}

struct EditorModel {
    visible: Property<bool>,
}

impl Component for EditorModel {
    fn serialize(&self) -> bool {
        false
    }
}

struct SpotLightFactory;

impl Factory for SpotLightFactory {
    fn type_name(&self) -> &str {
        "SpotLight"
    }

    fn editor_color(&self) -> [f32; 3] {
        [0.0, 0.4, 0.8]
    }

    fn create(&self, ctx: &FactoryContext<'_>) -> Result<Entity> {
        let entity = ctx.new_entity();
        entity.add("Transform", Transform::default())?;
        entity.add(
            "SpotLight",
            SpotLight {
                color: Property::new([1.0, 1.0, 1.0]),
                field_of_view: Property::new(0.8),
                ..SpotLight::default()
            },
        )?;
        Ok(entity)
    }

    fn bind(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>, _creating: bool) -> Result<()> {
        let transform = entity.get::<Transform>("Transform")?;
        let light = entity.get::<SpotLight>("SpotLight")?;
        entity.add_binding(TwoWayBinding::new(&light.position, &transform.position)?);
        Ok(())
    }

    fn attach_editor_components(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>) -> Result<()> {
        let model = entity.add_editor_component(
            "EditorModel",
            EditorModel {
                visible: Property::new(true),
            },
        )?;
        let selected = entity.editor_selected().clone();
        entity.add_binding_to(
            "EditorModel",
            Binding::computed(&model.visible, move || !selected.get(), &[entity.editor_selected()])?,
        )?;
        Ok(())
    }
}

/// A block that fades in over `TotalLifetime` seconds, then deletes itself.
/// It also dies as soon as the map it belongs to goes away.
#[derive(Default)]
struct EffectBlockFactory {
    blends: Arc<Mutex<Vec<f32>>>,
}

impl Factory for EffectBlockFactory {
    fn type_name(&self) -> &str {
        "EffectBlock"
    }

    fn create(&self, ctx: &FactoryContext<'_>) -> Result<Entity> {
        let entity = ctx.new_entity();
        entity.add("Lifetime", Property::new(0.0_f32))?;
        entity.add("TotalLifetime", Property::new(2.0_f32))?;
        entity.add("Blend", Property::new(0.0_f32).read_only())?;
        entity.add("TargetMap", Property::new(Handle::null()))?;
        Ok(entity)
    }

    fn bind(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>, _creating: bool) -> Result<()> {
        let lifetime: Property<f32> = entity.get_property("Lifetime")?;
        let total: Property<f32> = entity.get_property("TotalLifetime")?;
        let blend: Property<f32> = entity.get_property("Blend")?;
        let target: Property<Handle> = entity.get_property("TargetMap")?;

        let (l, t) = (lifetime.clone(), total.clone());
        entity.add_binding(Binding::computed(&blend, move || l.get() / t.get(), &[&lifetime, &total])?);

        let log = self.blends.clone();
        entity.add_updater(move |ctx| {
            lifetime.update(|t| t + ctx.dt)?;
            let blend = blend.get();
            log.lock().push(blend);

            let map = target.get();
            if blend > 1.0 || (!map.is_null() && !map.active(ctx.world)) {
                ctx.entity.delete();
            }
            Ok(())
        });
        Ok(())
    }
}

struct MapFactory;

impl Factory for MapFactory {
    fn type_name(&self) -> &str {
        "Map"
    }

    fn bind(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>, creating: bool) -> Result<()> {
        entity
            .get_or_create::<Property<bool>>("Restored")?
            .set(!creating)
    }
}

/// An agent walking a path; its step counter follows the path length.
struct AgentFactory;

impl Factory for AgentFactory {
    fn type_name(&self) -> &str {
        "Agent"
    }

    fn create(&self, ctx: &FactoryContext<'_>) -> Result<Entity> {
        let entity = ctx.new_entity();
        entity.add("Path", ListProperty::<(i32, i32)>::new())?;
        entity.add("Remaining", Property::new(0_usize))?;
        Ok(entity)
    }

    fn bind(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>, _creating: bool) -> Result<()> {
        let path = entity.get::<ListProperty<(i32, i32)>>("Path")?;
        let remaining: Property<usize> = entity.get_property("Remaining")?;

        let p = (*path).clone();
        entity.add_binding_to(
            "Path",
            Binding::computed(&remaining, move || p.len(), &[&*path])?,
        )?;

        let walk = (*path).clone();
        entity.add_updater_to("Path", move |_| {
            if !walk.is_empty() {
                walk.remove_at(0)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Wires an edge to an outside cell, then fails.
struct FailingFactory {
    grid: Property<i32>,
}

impl Factory for FailingFactory {
    fn type_name(&self) -> &str {
        "Failing"
    }

    fn bind(&self, entity: &Arc<Entity>, _ctx: &FactoryContext<'_>, _creating: bool) -> Result<()> {
        entity.add_binding(NotifyBinding::new(|| Ok(()), &[&self.grid]));
        entity.add_updater(|_| Ok(()));
        Err(BindError::external(io::Error::new(
            io::ErrorKind::NotConnected,
            "grid offline",
        )))
    }
}

fn registry() -> FactoryRegistry {
    let mut registry = FactoryRegistry::new();
    registry
        .register(SpotLightFactory)
        .register(EffectBlockFactory::default())
        .register(MapFactory)
        .register(AgentFactory);
    registry
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

/// Test that moving the transform moves the light and vice versa.
#[test]
fn spot_light_position_is_two_way() {
    init_tracing();
    let world = World::default();
    let light = world.instantiate(&SpotLightFactory, Mode::Runtime).unwrap();

    let transform = light.get::<Transform>("Transform").unwrap();
    let spot = light.get::<SpotLight>("SpotLight").unwrap();

    transform.position.set([1.0, 2.0, 3.0]).unwrap();
    assert_eq!(spot.position.get(), [1.0, 2.0, 3.0]);

    spot.position.set([4.0, 5.0, 6.0]).unwrap();
    assert_eq!(transform.position.get(), [4.0, 5.0, 6.0]);
    assert_eq!(transform.orientation.get(), 0.0);
    assert_eq!(spot.field_of_view.get(), 0.8);

    light.delete();
    transform.position.set([0.0, 0.0, 0.0]).unwrap();
    assert_eq!(spot.position.get(), [4.0, 5.0, 6.0]);
    assert_eq!(spot.color.get(), [1.0, 1.0, 1.0]);
}

/// Test that editor decorations follow selection and are not persisted.
#[test]
fn spot_light_editor_model() {
    init_tracing();
    let world = World::default();
    let light = world.instantiate(&SpotLightFactory, Mode::Editor).unwrap();
    let model = light.get::<EditorModel>("EditorModel").unwrap();

    assert!(model.visible.get());
    light.editor_selected().set(true).unwrap();
    assert!(!model.visible.get());

    assert_eq!(light.serializable_component_names(), vec!["Transform", "SpotLight"]);
    assert_eq!(SpotLightFactory.editor_color(), [0.0, 0.4, 0.8]);

    // Removing the decoration removes the edge it owned.
    light.remove("EditorModel").unwrap();
    light.editor_selected().set(false).unwrap();
    assert!(!model.visible.get());
}

/// Test that an effect block is deleted exactly on the third tick.
#[test]
fn effect_block_expires_on_third_tick() {
    init_tracing();
    let world = World::default();
    let factory = EffectBlockFactory::default();
    let block = world.instantiate(&factory, Mode::Runtime).unwrap();
    let handle = block.handle();

    world.tick(1.0).unwrap();
    world.tick(1.0).unwrap();
    assert!(handle.active(&world));

    let stats = world.tick(1.0).unwrap();
    assert_eq!(*factory.blends.lock(), vec![0.5, 1.0, 1.5]);
    assert!(block.is_deleted());
    assert!(!handle.active(&world));
    assert_eq!(stats.swept, 1);
    assert!(world.is_empty());

    world.tick(1.0).unwrap();
    assert_eq!(factory.blends.lock().len(), 3);
}

/// Test that a block dies once the map it points at is deleted.
#[test]
fn effect_block_follows_its_map() {
    let world = World::default();
    let map = world.instantiate(&MapFactory, Mode::Runtime).unwrap();
    let factory = EffectBlockFactory::default();
    let block = world.instantiate(&factory, Mode::Runtime).unwrap();

    block
        .get_property::<Handle>("TargetMap")
        .unwrap()
        .set(map.handle())
        .unwrap();

    world.tick(0.1).unwrap();
    assert!(block.is_active());

    world.delete(map.id()).unwrap();
    world.tick(0.1).unwrap();
    assert!(block.is_deleted());
}

/// Test that read-only factory fields reject editor writes.
#[test]
fn derived_fields_are_not_editor_settable() {
    let world = World::default();
    let block = world.instantiate(&EffectBlockFactory::default(), Mode::Editor).unwrap();

    let blend: Property<f32> = block.get_property("Blend").unwrap();
    assert!(blend.set_from_editor(0.9).is_err());
    let lifetime: Property<f32> = block.get_property("Lifetime").unwrap();
    lifetime.set_from_editor(1.0).unwrap();
    assert_eq!(blend.get(), 0.5);
}

/// Test that `get_or_create` hands back the same component every time.
#[test]
fn get_or_create_is_idempotent() {
    let world = World::default();
    let entity = world.spawn("Scratch");

    let a = entity.get_or_create::<ListProperty<u8>>("Queue").unwrap();
    a.push(1).unwrap();
    let b = entity.get_or_create::<ListProperty<u8>>("Queue").unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(b.to_vec(), vec![1]);
    assert!(matches!(
        entity.get_or_create::<Property<u8>>("Queue"),
        Err(BindError::TypeMismatch { .. })
    ));
}

/// Test that delete invalidates handles and silences edges and updaters.
#[test]
fn delete_invalidates_everything() {
    let world = World::default();
    let agent = world.instantiate(&AgentFactory, Mode::Runtime).unwrap();
    let path = agent.get::<ListProperty<(i32, i32)>>("Path").unwrap();
    let remaining: Property<usize> = agent.get_property("Remaining").unwrap();
    let handle = agent.handle();

    path.replace_all([(0, 0), (1, 0), (2, 0)]).unwrap();
    assert_eq!(remaining.get(), 3);
    world.tick(1.0).unwrap();
    assert_eq!(remaining.get(), 2);

    agent.delete();
    assert!(handle.target(&world).is_none());
    assert_eq!(agent.edge_count(), 0);
    assert_eq!(agent.updater_count(), 0);

    world.tick(1.0).unwrap();
    path.push((3, 0)).unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(remaining.get(), 2);
}

/// Test that removing a component drops the edges and updaters it owns.
#[test]
fn removing_a_component_tears_down_its_wiring() {
    let world = World::default();
    let agent = world.instantiate(&AgentFactory, Mode::Runtime).unwrap();
    let path = agent.get::<ListProperty<(i32, i32)>>("Path").unwrap();

    assert_eq!(agent.updater_count(), 1);
    agent.remove("Path").unwrap();
    assert_eq!(agent.updater_count(), 0);
    assert_eq!(agent.edge_count(), 0);
    assert_eq!(path.observer_count(), 0);
    assert_eq!(agent.component_names(), vec!["Remaining"]);
}

/// Test that suspended entities stop ticking unless marked `cannot_suspend`.
#[test]
fn cannot_suspend_keeps_ticking() {
    let world = World::default().with_policy(|_: &Entity| true);
    let ticks = Arc::new(AtomicUsize::new(0));

    for pinned in [false, true] {
        let entity = world.spawn("Ticker");
        entity.set_cannot_suspend(pinned);
        let ticks = ticks.clone();
        entity.add_updater(move |_| {
            ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let stats = world.tick(1.0).unwrap();
    assert_eq!(ticks.load(Ordering::SeqCst), 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.skipped, 1);
}

/// Test that a failing factory leaves no entity and no dangling edges.
#[test]
fn failed_factory_leaves_nothing_behind() {
    init_tracing();
    let world = World::default();
    let grid = Property::new(0);
    let factory = FailingFactory { grid: grid.clone() };

    let err = world.instantiate(&factory, Mode::Runtime).unwrap_err();
    assert!(matches!(err, BindError::External(_)));
    assert_eq!(err.to_string(), "grid offline");

    assert!(world.is_empty());
    assert!(world.layout().is_empty());
    assert_eq!(grid.observer_count(), 0);
    assert_eq!(world.tick(1.0).unwrap().updated, 0);
}

/// Test that unknown type names are reported.
#[test]
fn unknown_factory_is_an_error() {
    let world = World::default();
    let err = world
        .instantiate_by_name(&registry(), "Dragon", Mode::Runtime)
        .unwrap_err();
    assert!(matches!(err, BindError::UnknownFactory(name) if name == "Dragon"));
}

/// Test that saved handles resolve again after a layout restore.
#[test]
fn layout_restore_resolves_saved_handles() {
    init_tracing();
    let registry = registry();
    let world = World::default();

    let map = world.instantiate_by_name(&registry, "Map", Mode::Runtime).unwrap();
    let light = world.instantiate_by_name(&registry, "SpotLight", Mode::Runtime).unwrap();
    let doomed = world.instantiate_by_name(&registry, "Agent", Mode::Runtime).unwrap();
    world.delete(doomed.id()).unwrap();
    world.tick(0.5).unwrap();

    let (map_id, light_id) = (map.id(), light.id());
    let saved_handle = rmp_serde::to_vec(&map.handle()).unwrap();
    let bytes = world.save_layout().unwrap();
    drop(world);

    let layout = WorldLayout::from_bytes(&bytes).unwrap();
    assert_eq!(layout.len(), 2);
    let restored = World::restore(Config::default(), &layout, &registry, Mode::Runtime).unwrap();

    assert_eq!(restored.len(), 2);
    assert_eq!(restored.tick_count(), 1);

    let handle: Handle = rmp_serde::from_slice(&saved_handle).unwrap();
    let target = handle.target(&restored).unwrap();
    assert_eq!(target.id(), map_id);
    assert_eq!(target.type_name(), "Map");
    assert!(target.get_property::<bool>("Restored").unwrap().get());

    // Bind ran again, so the rebuilt light is wired.
    let light = restored.entity(light_id).unwrap();
    let transform = light.get::<Transform>("Transform").unwrap();
    transform.position.set([9.0, 9.0, 9.0]).unwrap();
    assert_eq!(light.get::<SpotLight>("SpotLight").unwrap().position.get(), [9.0, 9.0, 9.0]);

    // Fresh entities never collide with restored ids.
    let fresh = restored.spawn("Map");
    assert_ne!(fresh.id(), map_id);
    assert_ne!(fresh.id(), light_id);
    assert!(!doomed.handle().active(&restored));
}

/// Test that a restore can skip entities whose factory fails.
#[test]
fn restore_can_skip_failed_entities() {
    init_tracing();
    let world = World::default();
    let map = world.instantiate(&MapFactory, Mode::Runtime).unwrap();
    let light = world.instantiate(&SpotLightFactory, Mode::Runtime).unwrap();
    let layout = world.layout();

    // Only maps can be rebuilt.
    let mut maps_only = FactoryRegistry::new();
    maps_only.register(MapFactory);

    let err = World::restore(Config::default(), &layout, &maps_only, Mode::Runtime).unwrap_err();
    assert!(matches!(err, BindError::UnknownFactory(name) if name == "SpotLight"));

    let restored = World::restore_with(
        Config::default(),
        &layout,
        &maps_only,
        Mode::Runtime,
        RestorePolicy::Skip,
    )
    .unwrap();
    assert_eq!(restored.world.len(), 1);
    assert!(restored.world.entity(map.id()).is_some());
    assert!(restored.world.entity(light.id()).is_none());

    assert_eq!(restored.skipped.len(), 1);
    let (skipped_id, skipped_err) = &restored.skipped[0];
    assert_eq!(*skipped_id, light.id());
    assert!(matches!(skipped_err, BindError::UnknownFactory(_)));
    assert!(restored.world.layout().entities().all(|(id, _)| id == map.id()));
}

/// Test that the catalog from config is visible to factories.
#[test]
fn factories_read_the_catalog() {
    struct TintedFactory;

    impl Factory for TintedFactory {
        fn type_name(&self) -> &str {
            "Tinted"
        }

        fn bind(&self, entity: &Arc<Entity>, ctx: &FactoryContext<'_>, _creating: bool) -> Result<()> {
            let glow = ctx
                .catalog()
                .by_name("Lava")
                .and_then(|entry| entry.attribute("glow"))
                .and_then(|value| value.as_f64())
                .unwrap_or_default();
            entity.add("Glow", Property::new(glow))?;
            Ok(())
        }
    }

    let config = Config::from_json_str(
        r#"{ "catalog": [ { "id": 3, "name": "Lava", "attributes": { "glow": 0.75 } } ] }"#,
    )
    .unwrap();
    let world = World::new(config);
    let tinted = world.instantiate(&TintedFactory, Mode::Runtime).unwrap();

    assert_eq!(tinted.get_property::<f64>("Glow").unwrap().get(), 0.75);
    assert_eq!(world.catalog().get(3).unwrap().name, "Lava");
}
