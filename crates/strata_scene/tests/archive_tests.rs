//! Scene persistence
//!
//! Saves a populated scene and loads it into a fresh one with the same
//! component registrations, checking hierarchy, transforms and component
//! payloads survive.

use strata_core::{from_json_str, to_json_string, to_json_value, ArchiveReader, ArchiveWriter, FromArchive, NodeId, ToArchive};
use strata_math::{Quat, Vec3};
use strata_scene::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Default, PartialEq)]
struct Health {
    value: f32,
}

impl Component for Health {
    const NAME: &'static str = "health";
}

impl ToArchive for Health {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.as_object();
        writer.object_member("value", &self.value);
    }
}

impl FromArchive for Health {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        reader.read_object_member("value", &mut self.value);
    }
}

struct Selected;

impl Component for Selected {
    const NAME: &'static str = "selected";
}

fn registered_scene() -> Scene {
    let mut scene = Scene::new();
    scene.register_component_type(Box::new(BasicComponentContainer::<Health>::new()));
    scene.register_component_type(Box::new(EmptyComponentContainer::<Selected>::new()));
    scene
}

/// root -> (arm -> hand), plus a detached prop
fn populated_scene() -> (Scene, Vec<NodeId>) {
    let mut scene = registered_scene();
    let ids = scene.create_nodes(4);
    let (root, arm, hand, prop) = (ids[0], ids[1], ids[2], ids[3]);

    let data = scene.data_mut();
    data.set_name(root, "root");
    data.set_name(arm, "arm");
    data.set_name(hand, "hand");
    data.set_name(prop, "prop");
    data.add_child(root, arm);
    data.add_child(arm, hand);
    data.set_local_position(root, Vec3::new(0.0, 1.0, 0.0));
    data.set_local_rotation(arm, Quat::from_rotation_z(strata_math::radians(90.0)));
    data.set_local_position(hand, Vec3::X);
    data.set_local_scale(prop, Vec3::splat(3.0));
    scene.on_end_system_frame();

    let health = scene.get_component_type("health").unwrap();
    scene.create_components(health, &[arm, prop]);
    scene
        .component_container_mut::<BasicComponentContainer<Health>>()
        .unwrap()
        .get_mut(arm)
        .unwrap()
        .value = 75.0;

    let selected = scene.get_component_type("selected").unwrap();
    scene.create_components(selected, &[hand]);

    (scene, ids)
}

#[test]
fn test_round_trip_restores_hierarchy_and_components() {
    init_logging();
    let (scene, ids) = populated_scene();
    let text = to_json_string(&scene).unwrap();

    let mut restored = registered_scene();
    from_json_str(&text, &mut restored).unwrap();

    assert_eq!(restored.data().num_nodes(), 4);
    assert_eq!(restored.data().root_nodes(), scene.data().root_nodes());

    for id in &ids {
        let before = scene.get_node(*id).unwrap();
        let after = restored.get_node(*id).unwrap();
        assert_eq!(after.name(), before.name());
        assert_eq!(after.root(), before.root());
        assert_eq!(after.children(), before.children());
        assert_eq!(after.hierarchy_depth(), before.hierarchy_depth());
        assert_eq!(after.local_position(), before.local_position());
        assert_eq!(after.local_scale(), before.local_scale());
        assert!(after.world_matrix().abs_diff_eq(before.world_matrix(), 1e-5), "{}", before.name());
        assert!(after.mod_state().is_empty());
    }

    let hand = restored.get_node(ids[2]).unwrap();
    let expected = Vec3::new(0.0, 2.0, 0.0);
    assert!((hand.world_matrix().translation() - expected).length() < 1e-5);

    let health = restored.component_container::<BasicComponentContainer<Health>>().unwrap();
    assert_eq!(health.get(ids[1]), Some(&Health { value: 75.0 }));
    assert_eq!(health.get(ids[3]), Some(&Health::default()));
    assert!(health.get(ids[0]).is_none());

    let selected = restored.component_container::<EmptyComponentContainer<Selected>>().unwrap();
    assert_eq!(selected.nodes(), &[ids[2]]);
}

#[test]
fn test_destroyed_nodes_are_not_saved() {
    let (mut scene, ids) = populated_scene();
    scene.destroy_nodes(&[ids[1]]);
    scene.on_end_system_frame();

    let value = to_json_value(&scene);
    let nodes = value["nodes"].as_object().unwrap();
    let mut saved: Vec<&str> = nodes.keys().map(String::as_str).collect();
    saved.sort();
    assert_eq!(saved, vec!["0", "3"]);
    assert_eq!(value["next_node_id"], 4);
    assert!(value["components"]["health"].get("1").is_none());
    assert_eq!(value["components"]["selected"], serde_json::json!([]));
}

#[test]
fn test_load_replaces_existing_nodes_and_reuses_gaps() {
    init_logging();
    let value = serde_json::json!({
        "next_node_id": 6,
        "nodes": {
            "1": { "name": "a", "local_position": { "x": 1.0, "y": 2.0, "z": 3.0 } },
            "4": { "name": "b", "root": 1 }
        },
        "components": {
            "health": { "4": { "value": 5.0 } },
            "unknown": []
        }
    });

    let mut scene = registered_scene();
    scene.create_nodes(10);
    scene.from_archive(&mut strata_core::JsonArchiveReader::new(&value));

    assert_eq!(scene.data().num_nodes(), 2);
    let b = scene.get_node(NodeId::restored(4)).unwrap();
    assert_eq!(b.name(), "b");
    assert_eq!(b.root(), NodeId::restored(1));
    assert_eq!(b.world_matrix().translation(), Vec3::new(1.0, 2.0, 3.0));

    let health = scene.component_container::<BasicComponentContainer<Health>>().unwrap();
    assert_eq!(health.get(NodeId::restored(4)).map(|h| h.value), Some(5.0));

    // Unused slots below the highest loaded index are handed out first
    let fresh = scene.create_nodes(3);
    let mut indices: Vec<u32> = fresh.iter().map(|id| id.index()).collect();
    indices.sort();
    assert_eq!(indices, vec![0, 2, 3]);
}

#[test]
fn test_save_and_load_files() {
    let (scene, ids) = populated_scene();
    let path = std::env::temp_dir().join(format!("strata_scene_archive_{}.json", std::process::id()));
    scene.save_json(&path).unwrap();

    let mut restored = registered_scene();
    restored.load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored.get_node(ids[3]).unwrap().name(), "prop");
    assert!(restored.load_json(std::env::temp_dir().join("strata_scene_missing.json")).is_err());
}
