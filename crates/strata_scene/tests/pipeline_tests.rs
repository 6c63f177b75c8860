//! Update pipeline execution
//!
//! Covers step ordering, pushed jobs, yielding mid-system, tag dispatch to
//! callbacks and the frame clock seen by systems.

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use strata_core::NodeId;
use strata_math::Vec3;
use strata_scene::prelude::*;
use strata_scene::SceneConfig;

type Log = Rc<RefCell<Vec<String>>>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Register a system that records its name and pushes `pushes`
fn recording_system(pipeline: &mut UpdatePipeline, log: &Log, name: &'static str, pushes: &'static [&'static str]) {
    let log = Rc::clone(log);
    pipeline.register_system_fn(name, move |frame, _, _| {
        log.borrow_mut().push(name.to_string());
        for job in pushes {
            frame.push(job);
        }
    });
}

struct Light;

impl Component for Light {
    const NAME: &'static str = "light";
}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Dirty {
    level: u32,
}

#[test]
fn test_pushed_jobs_run_depth_first_in_push_order() {
    init_logging();
    let log: Log = Rc::default();
    let mut pipeline = UpdatePipeline::new();
    recording_system(&mut pipeline, &log, "a", &["x", "y"]);
    recording_system(&mut pipeline, &log, "b", &[]);
    recording_system(&mut pipeline, &log, "x", &["z", "missing"]);
    recording_system(&mut pipeline, &log, "y", &[]);
    recording_system(&mut pipeline, &log, "z", &[]);
    recording_system(&mut pipeline, &log, "last", &[]);
    pipeline.configure_from_json_str(r#"[["a", "b"], "last"]"#).unwrap();

    let mut scene = Scene::new();
    scene.update(&pipeline, 0.016);
    assert_eq!(*log.borrow(), vec!["a", "x", "z", "y", "b", "last"]);

    // Jobs are not remembered across frames
    log.borrow_mut().clear();
    scene.update(&pipeline, 0.016);
    assert_eq!(log.borrow().len(), 6);
}

#[test]
fn test_changes_are_visible_to_the_next_system() {
    let mut pipeline = UpdatePipeline::new();
    let seen = Rc::new(RefCell::new(None));

    pipeline.register_system_fn("mover", |frame, _, _| {
        let roots = frame.data().root_nodes().to_vec();
        for node in roots {
            frame.data_mut().translate(node, Vec3::X);
            // Staged only
            assert_eq!(frame.data().node(node).unwrap().local_position(), Vec3::ZERO);
        }
    });

    let reader = Rc::clone(&seen);
    pipeline.register_system_fn("reader", move |frame, _, _| {
        let node = frame.data().root_nodes()[0];
        *reader.borrow_mut() = Some(frame.data().node(node).unwrap().world_matrix().translation());
    });
    pipeline.configure_from_json_str(r#"[["mover", "reader"]]"#).unwrap();

    let mut scene = Scene::new();
    scene.create_node();
    scene.update(&pipeline, 0.016);
    assert_eq!(*seen.borrow(), Some(Vec3::X));
}

#[test]
fn test_yield_frame_applies_staged_changes() {
    let mut pipeline = UpdatePipeline::new();
    let depth = Rc::new(RefCell::new(None));

    let out = Rc::clone(&depth);
    pipeline.register_system_fn("spawner", move |frame, _, _| {
        let ids = frame.scene_mut().create_nodes(2);
        frame.data_mut().add_child(ids[0], ids[1]);
        frame.data_mut().set_local_position(ids[0], Vec3::Y);
        frame.yield_frame();

        let child = frame.data().node(ids[1]).unwrap();
        *out.borrow_mut() = Some((child.hierarchy_depth(), child.world_matrix().translation()));
    });
    pipeline.configure_from_json_str(r#"["spawner"]"#).unwrap();

    let mut scene = Scene::new();
    let reader = scene.new_node_channel().subscribe();
    scene.update(&pipeline, 0.016);

    assert_eq!(*depth.borrow(), Some((1, Vec3::Y)));
    assert_eq!(scene.data().num_nodes(), 2);
    // Channels only live for one update frame
    assert_eq!(scene.new_node_channel().unconsumed(reader), 0);
}

#[test]
fn test_yield_frame_runs_pushed_jobs() {
    init_logging();
    let log: Log = Rc::default();
    let mut pipeline = UpdatePipeline::new();

    let damage_log = Rc::clone(&log);
    pipeline.register_system_fn("damage", move |frame, _, _| {
        damage_log.borrow_mut().push("damage".to_string());
        frame.scene_mut().create_node();
        frame.push("effects");
    });
    recording_system(&mut pipeline, &log, "effects", &[]);
    recording_system(&mut pipeline, &log, "late", &[]);
    recording_system(&mut pipeline, &log, "next", &[]);

    let collide_log = Rc::clone(&log);
    pipeline.register_system_fn("collide", move |frame, _, _| {
        frame.push("damage");
        frame.yield_frame();
        let nodes = frame.data().num_nodes();
        collide_log.borrow_mut().push(format!("after yield nodes={}", nodes));
        frame.push("late");
    });
    pipeline.configure_from_json_str(r#"[["collide", "next"]]"#).unwrap();

    let mut scene = Scene::new();
    scene.update(&pipeline, 0.016);

    // Jobs drained by the yield are not run a second time
    assert_eq!(
        *log.borrow(),
        vec!["damage", "effects", "after yield nodes=1", "late", "next"]
    );
    assert_eq!(scene.data().num_nodes(), 1);
}

#[test]
fn test_tags_reach_matching_callbacks() {
    init_logging();
    let mut pipeline = UpdatePipeline::new();
    let received: Rc<RefCell<Vec<(Vec<NodeId>, Vec<Dirty>)>>> = Rc::default();
    let unfiltered = Rc::new(RefCell::new(0));

    pipeline.register_system_fn("emitter", |frame, _, _| {
        let roots = frame.data().root_nodes().to_vec();
        for (i, node) in roots.iter().enumerate().rev() {
            frame.emit_tag::<Light, Dirty>(*node, Dirty { level: i as u32 });
        }
        frame.emit_tag::<Light, Dirty>(roots[0], Dirty { level: 10 });
    });

    let out = Rc::clone(&received);
    pipeline.register_system(
        SystemInfo::new("lights", |_, _, _| {}).with_tag_callback::<Dirty, _>(
            Some(TypeId::of::<Light>()),
            move |_, buffer| {
                out.borrow_mut().push((buffer.entities().to_vec(), buffer.tags::<Dirty>()));
            },
        ),
    );

    let count = Rc::clone(&unfiltered);
    pipeline.register_system(
        SystemInfo::new("audit", |_, _, _| {})
            .with_tag_callback::<Dirty, _>(None, move |_, _| *count.borrow_mut() += 1)
            .with_tag_callback::<u32, _>(None, |_, _| panic!("no u32 tags are emitted")),
    );

    // Callbacks fire even though their systems are not in the pipeline
    pipeline.configure_from_json_str(r#"["emitter"]"#).unwrap();

    let mut scene = Scene::new();
    let ids = scene.create_nodes(3);
    scene.update(&pipeline, 0.016);

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    let (entities, tags) = &received[0];
    assert_eq!(entities, &ids);
    let levels: Vec<u32> = tags.iter().map(|t| t.level).collect();
    assert_eq!(levels, vec![0, 10, 1, 2]);
    assert_eq!(*unfiltered.borrow(), 1);
}

#[test]
fn test_tag_passes_are_bounded() {
    init_logging();
    let mut pipeline = UpdatePipeline::new();
    let calls = Rc::new(RefCell::new(0));

    pipeline.register_system_fn("emitter", |frame, _, _| {
        let node = frame.data().root_nodes()[0];
        frame.emit_single_tag::<Light, Dirty>(node, Dirty { level: 0 });
    });

    let count = Rc::clone(&calls);
    pipeline.register_system(SystemInfo::new("echo", |_, _, _| {}).with_tag_callback::<Dirty, _>(
        None,
        move |frame, buffer| {
            *count.borrow_mut() += 1;
            let node = buffer.entities()[0];
            frame.emit_single_tag::<Light, Dirty>(node, Dirty { level: 1 });
        },
    ));
    pipeline.configure_from_json_str(r#"["emitter"]"#).unwrap();

    let config = SceneConfig {
        tag_passes_per_system: 3,
        ..SceneConfig::default()
    };
    let mut scene = Scene::with_config(config);
    scene.create_node();
    scene.update(&pipeline, 0.016);
    assert_eq!(*calls.borrow(), 3);

    // Leftovers are dropped, not carried into the next frame
    *calls.borrow_mut() = 0;
    pipeline.configure_from_json_str("[]").unwrap();
    scene.update(&pipeline, 0.016);
    assert_eq!(*calls.borrow(), 0);
}

#[test]
fn test_callback_pushed_jobs_run_after_the_emitter() {
    let log: Log = Rc::default();
    let mut pipeline = UpdatePipeline::new();
    recording_system(&mut pipeline, &log, "follow_up", &[]);
    recording_system(&mut pipeline, &log, "next", &[]);

    let emitter_log = Rc::clone(&log);
    pipeline.register_system_fn("emitter", move |frame, _, _| {
        emitter_log.borrow_mut().push("emitter".to_string());
        let node = frame.data().root_nodes()[0];
        frame.emit_tag::<Light, Dirty>(node, Dirty { level: 0 });
    });
    pipeline.register_system(
        SystemInfo::new("watcher", |_, _, _| {}).with_tag_callback::<Dirty, _>(None, |frame, _| frame.push("follow_up")),
    );
    pipeline.configure_from_json_str(r#"[["emitter", "next"]]"#).unwrap();

    let mut scene = Scene::new();
    scene.create_node();
    scene.update(&pipeline, 0.016);
    assert_eq!(*log.borrow(), vec!["emitter", "follow_up", "next"]);
}

#[test]
fn test_systems_see_the_frame_clock() {
    let mut pipeline = UpdatePipeline::new();
    let clock: Rc<RefCell<Vec<(u64, f32, f32)>>> = Rc::default();

    let out = Rc::clone(&clock);
    pipeline.register_system(
        SystemInfo::new("clock", move |frame, time, dt| {
            assert_eq!(frame.time_delta(), dt);
            out.borrow_mut().push((frame.frame_id(), time, dt));
        })
        .with_async_token(AsyncToken::new(2)),
    );
    pipeline.configure_from_json_str(r#"["clock"]"#).unwrap();

    let mut scene = Scene::new();
    scene.update(&pipeline, 0.5);
    scene.update(&pipeline, 0.25);

    assert_eq!(*clock.borrow(), vec![(0, 0.0, 0.5), (1, 0.5, 0.25)]);
    assert_eq!(scene.frame_id(), 2);
    assert_eq!(scene.current_time(), 0.75);

    let id = pipeline.find_system("clock").unwrap();
    assert_eq!(pipeline.system(id).unwrap().async_token(), AsyncToken::new(2));
}
