//! Scene - the node hierarchy runtime
//!
//! A [`Scene`] owns its [`SceneData`] plus the frame clock, and drives an
//! [`UpdatePipeline`] once per update frame:
//!
//! ```text
//! update(dt)
//!   for each step
//!     worklist <- step systems
//!     while let Some(system) = worklist.pop()
//!       run system                    -> stages changes, pushes jobs, emits tags
//!       end system frame              -> staged changes applied, events published
//!       dispatch tags to callbacks    -> each callback is its own system frame
//!       pushed jobs go on top of the worklist, in push order
//!   end update frame                  -> destroyed nodes released, channels cleared
//! ```

use std::any::TypeId;
use std::path::Path;

use strata_core::{from_json_str, to_json_string, ArchiveReader, ArchiveWriter, FromArchive, NodeId, Result, ToArchive};
use strata_event::EventChannel;
use strata_structures::SlotMap;

use crate::component::{ComponentContainer, TypedComponentContainer};
use crate::config::SceneConfig;
use crate::node::{copy_page, ModState, Node};
use crate::pipeline::{SystemId, SystemInfo, UpdatePipeline};
use crate::scene_data::SceneData;
use crate::system_frame::SystemFrame;
use crate::tags::EmittedTags;

/// A node hierarchy with component storage and a frame clock
pub struct Scene {
    config: SceneConfig,
    data: SceneData,
    frame_id: u64,
    current_time: f32,
    pub(crate) emitted_tags: EmittedTags,
}

impl Scene {
    /// Create a scene with the default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    pub fn with_config(config: SceneConfig) -> Self {
        Self {
            data: SceneData::new(&config),
            config,
            frame_id: 0,
            current_time: 0.0,
            emitted_tags: EmittedTags::default(),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn data(&self) -> &SceneData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SceneData {
        &mut self.data
    }

    /// Number of completed update frames
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Sum of the time deltas of every completed update frame
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create `count` root nodes. They are announced at the end of the
    /// current system frame.
    pub fn create_nodes(&mut self, count: usize) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.data.nodes.insert(Node::new(NodeId::NULL));
            if let Some(node) = self.data.nodes.get_mut(id) {
                node.id = id;
                node.mod_state = ModState::NEW;
            }

            strata_structures::insert_ord(&mut self.data.root_nodes, id);
            self.data.system_new_nodes.push(id);
            self.data.update_modified_nodes.push(id);
            ids.push(id);
        }
        ids
    }

    /// Create a single root node
    pub fn create_node(&mut self) -> NodeId {
        self.create_nodes(1)[0]
    }

    /// Mark nodes as destroyed. Their subtrees follow at the end of the
    /// current system frame, and the slots are released when the update
    /// frame ends.
    pub fn destroy_nodes(&mut self, ids: &[NodeId]) {
        for &id in ids {
            let Some(node) = self.data.nodes.get_mut(id) else {
                log::warn!("Cannot destroy missing node {}", id);
                continue;
            };
            if node.is_destroyed() {
                continue;
            }

            node.mod_state.insert(ModState::DESTROYED_PENDING);
            self.data.system_destroyed_nodes.push(id);
        }
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.data.nodes.get(id)
    }

    /// Look up several nodes at once. Stale or null ids yield `None`.
    pub fn get_nodes(&self, ids: &[NodeId]) -> Vec<Option<&Node>> {
        ids.iter().map(|id| self.data.nodes.get(*id)).collect()
    }

    pub fn num_root_nodes(&self) -> usize {
        self.data.root_nodes.len()
    }

    /// Copy root node ids starting at `start` into `out`. Returns the number
    /// copied.
    pub fn get_root_nodes(&self, start: usize, out: &mut [NodeId]) -> usize {
        copy_page(&self.data.root_nodes, start, out)
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Take ownership of a component container. Returns `false` if its
    /// component type or name is already registered.
    ///
    /// The container's channels are grown to the configured
    /// `component_channel_capacity`.
    pub fn register_component_type(&mut self, mut container: Box<dyn ComponentContainer>) -> bool {
        let info = container.component_type().clone();
        if !self.data.component_types.register(info.clone()) {
            return false;
        }

        container.reserve_channels(self.config.component_channel_capacity);
        log::debug!("Registered component type '{}'", info.name);
        self.data.components.insert(info.type_id, container);
        true
    }

    /// Find a registered component type by name
    pub fn get_component_type(&self, name: &str) -> Option<TypeId> {
        self.data.component_types.get_by_name(name).map(|info| info.type_id)
    }

    pub fn get_component_container(&self, component_type: TypeId) -> Option<&(dyn ComponentContainer + 'static)> {
        self.data.components.get(&component_type).map(|c| c.as_ref())
    }

    pub fn get_component_container_mut(&mut self, component_type: TypeId) -> Option<&mut (dyn ComponentContainer + 'static)> {
        self.data.components.get_mut(&component_type).map(|c| c.as_mut())
    }

    /// The container registered for `X::Component`, as its concrete type
    pub fn component_container<X: TypedComponentContainer>(&self) -> Option<&X> {
        self.get_component_container(X::component_type_id())?.downcast_ref()
    }

    pub fn component_container_mut<X: TypedComponentContainer>(&mut self) -> Option<&mut X> {
        self.get_component_container_mut(X::component_type_id())?.downcast_mut()
    }

    /// Create instances of a component type on the given nodes. Missing
    /// nodes are skipped.
    pub fn create_components(&mut self, component_type: TypeId, ids: &[NodeId]) {
        let Some(container) = self.data.components.get_mut(&component_type) else {
            log::warn!("Cannot create components of an unregistered type");
            return;
        };

        let nodes: Vec<&Node> = ids.iter().filter_map(|id| self.data.nodes.get(*id)).collect();
        container.create_instances(&nodes);
    }

    pub fn remove_components(&mut self, component_type: TypeId, ids: &[NodeId]) {
        match self.data.components.get_mut(&component_type) {
            Some(container) => container.remove_instances(ids),
            None => log::warn!("Cannot remove components of an unregistered type"),
        }
    }

    /// A named channel of a component container
    pub fn get_event_channel(&mut self, component_type: TypeId, name: &str) -> Option<&mut EventChannel> {
        self.data.components.get_mut(&component_type)?.get_event_channel(name)
    }

    // ========================================================================
    // Scene channels
    // ========================================================================

    /// [`ENewNode`](crate::events::ENewNode) events
    pub fn new_node_channel(&mut self) -> &mut EventChannel {
        &mut self.data.new_node_channel
    }

    /// [`EDestroyedNode`](crate::events::EDestroyedNode) events
    pub fn destroyed_node_channel(&mut self) -> &mut EventChannel {
        &mut self.data.destroyed_node_channel
    }

    /// [`ENodeTransformChanged`](crate::events::ENodeTransformChanged)
    /// events for applied local transforms
    pub fn node_local_transform_changed_channel(&mut self) -> &mut EventChannel {
        &mut self.data.node_local_transform_changed_channel
    }

    /// [`ENodeTransformChanged`](crate::events::ENodeTransformChanged)
    /// events for recomputed world matrices
    pub fn node_world_transform_changed_channel(&mut self) -> &mut EventChannel {
        &mut self.data.node_world_transform_changed_channel
    }

    /// [`ENodeRootChanged`](crate::events::ENodeRootChanged) events
    pub fn node_root_changed_channel(&mut self) -> &mut EventChannel {
        &mut self.data.node_root_changed_channel
    }

    /// [`EDebugDrawLine`](crate::events::EDebugDrawLine) events
    pub fn debug_draw_line_channel(&mut self) -> &mut EventChannel {
        &mut self.data.debug_draw_line_channel
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop every node, staged change, component instance, pending tag and
    /// channel event. Registrations and subscriptions survive.
    pub fn reset_scene(&mut self) {
        self.data.nodes.clear();
        self.data.root_nodes.clear();
        self.data.clear_staging();
        self.data.update_modified_nodes.clear();
        self.data.update_destroyed_nodes.clear();
        for container in self.data.components.values_mut() {
            container.reset();
        }
        self.data.clear_channels();
        self.emitted_tags = EmittedTags::default();
    }

    /// Run one update frame: every pipeline step in order, then the end of
    /// frame bookkeeping. Changes staged outside of any system are applied
    /// before the first step.
    pub fn update(&mut self, pipeline: &UpdatePipeline, time_delta: f32) {
        if self.data.has_staged_changes() {
            self.on_end_system_frame();
        }

        for step in pipeline.get_pipeline() {
            self.execute_job_queue(pipeline, step, time_delta);
        }

        self.on_end_update_frame(time_delta);
    }

    /// Apply every staged change and publish the resulting events.
    ///
    /// Runs after each system invocation. Callers driving the scene without
    /// a pipeline can call it directly.
    pub fn on_end_system_frame(&mut self) {
        self.data.apply_system_frame();
    }

    /// Run `step` in order. Jobs a system pushes run right after it,
    /// depth first.
    pub(crate) fn execute_job_queue(&mut self, pipeline: &UpdatePipeline, step: &[SystemId], time_delta: f32) {
        let mut worklist: Vec<SystemId> = step.iter().rev().copied().collect();

        while let Some(id) = worklist.pop() {
            let Some(system) = pipeline.system(id) else {
                continue;
            };

            let pushed = self.run_system(pipeline, system, time_delta);
            worklist.extend(pushed.into_iter().rev());
        }
    }

    /// Run one system and everything its tags trigger. Returns the jobs
    /// pushed along the way.
    fn run_system(&mut self, pipeline: &UpdatePipeline, system: &SystemInfo, time_delta: f32) -> Vec<SystemId> {
        let current_time = self.current_time;

        let mut frame = SystemFrame::new(self, pipeline, time_delta);
        system.run(&mut frame, current_time, time_delta);
        let mut jobs = frame.into_jobs();
        self.on_end_system_frame();

        self.dispatch_tags(pipeline, time_delta, &mut jobs);
        jobs
    }

    /// Hand emitted tags to matching callbacks until none are left, or the
    /// pass limit is hit
    fn dispatch_tags(&mut self, pipeline: &UpdatePipeline, time_delta: f32, jobs: &mut Vec<SystemId>) {
        let mut passes = 0;

        while !self.emitted_tags.is_empty() {
            let tags = std::mem::take(&mut self.emitted_tags);
            if passes == self.config.tag_passes_per_system {
                log::warn!(
                    "Dropping {} tags still emitted after {} dispatch passes",
                    tags.num_tags(),
                    passes
                );
                break;
            }
            passes += 1;

            for buffer in tags.into_buffers() {
                for (_, system) in pipeline.systems() {
                    for callback in system.tag_callbacks().iter().filter(|cb| cb.matches(&buffer)) {
                        let mut frame = SystemFrame::new(self, pipeline, time_delta);
                        callback.call(&mut frame, &buffer);
                        jobs.extend(frame.into_jobs());
                        self.on_end_system_frame();
                    }
                }
            }
        }
    }

    fn on_end_update_frame(&mut self, time_delta: f32) {
        for container in self.data.components.values_mut() {
            container.on_end_update_frame();
        }

        let destroyed = std::mem::take(&mut self.data.update_destroyed_nodes);
        for &id in &destroyed {
            let Some(root) = self.data.nodes.get(id).map(|n| n.root) else {
                continue;
            };
            self.data.unlink(id, root);
            self.data.nodes.remove(id);
        }

        for id in std::mem::take(&mut self.data.update_modified_nodes) {
            if let Some(node) = self.data.nodes.get_mut(id) {
                node.mod_state.remove(ModState::FRAME_APPLIED);
            }
        }

        self.data.clear_channels();

        log::trace!(
            "Update frame {} done: released {} nodes, {} remain",
            self.frame_id,
            destroyed.len(),
            self.data.nodes.len()
        );
        self.frame_id += 1;
        self.current_time += time_delta;
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the scene as JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = to_json_string(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Replace the scene with one read from a JSON file
    pub fn load_json(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        from_json_str(&text, self)
    }

    /// Rebuild parent and child lists from the `root` each loaded node
    /// carries. Roots that don't resolve turn the node into a root.
    fn link_loaded_nodes(&mut self) {
        let links: Vec<(NodeId, NodeId)> = self.data.nodes.iter().map(|(id, node)| (id, node.root)).collect();

        // Ids come in index order, so plain pushes keep every list ordered
        for (id, root) in links {
            if !root.is_null() && (root == id || !self.data.nodes.contains_key(root)) {
                log::warn!("Node {} has an invalid root {}, loading it as a root node", id, root);
                if let Some(node) = self.data.nodes.get_mut(id) {
                    node.root = NodeId::NULL;
                }
            }

            match self.data.nodes.get_mut(root) {
                Some(parent) if root != id => parent.children.push(id),
                _ => self.data.root_nodes.push(id),
            }
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl ToArchive for Scene {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.as_object();
        writer.object_member("next_node_id", &(self.data.nodes.slot_count() as u64));

        writer.push_object_member("nodes");
        writer.as_object();
        for (id, node) in self.data.nodes.iter() {
            if node.is_destroyed() {
                continue;
            }

            writer.push_object_member(&id.index().to_string());
            writer.object_member("name", &node.name);
            writer.object_member("root", &node.root);
            writer.object_member("local_position", &node.local_position);
            writer.object_member("local_scale", &node.local_scale);
            writer.object_member("local_rotation", &node.local_rotation);
            writer.pop();
        }
        writer.pop();

        writer.push_object_member("components");
        writer.as_object();
        for container in self.data.components.values() {
            writer.push_object_member(&container.component_type().name);
            container.to_archive(writer);
            writer.pop();
        }
        writer.pop();
    }
}

impl FromArchive for Scene {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        self.reset_scene();

        // Archived indices are bounded by next_node_id and the configured cap
        let mut next_node_id = 0u64;
        let limit = if reader.read_object_member("next_node_id", &mut next_node_id) {
            next_node_id.min(self.config.max_node_slots as u64)
        } else {
            self.config.max_node_slots as u64
        };

        let mut loaded = Vec::new();
        if reader.pull_object_member("nodes") {
            reader.enumerate_object_members(&mut |name, member| {
                let Ok(index) = name.parse::<u32>() else {
                    log::warn!("Skipping node with invalid index '{}'", name);
                    return;
                };
                if u64::from(index) >= limit {
                    log::warn!("Skipping node index {} beyond the archive limit {}", index, limit);
                    return;
                }

                let mut node = Node::new(NodeId::restored(index));
                member.read_object_member("name", &mut node.name);
                member.read_object_member("root", &mut node.root);
                member.read_object_member("local_position", &mut node.local_position);
                member.read_object_member("local_scale", &mut node.local_scale);
                member.read_object_member("local_rotation", &mut node.local_rotation);
                loaded.push((index, node));
            });
            reader.pop();
        }

        // Loaded ids carry the first generation, so start from fresh slots
        let (nodes, duplicates) = SlotMap::from_indexed(loaded);
        for (index, _) in duplicates {
            log::warn!("Skipping duplicate node index {}", index);
        }
        self.data.nodes = nodes;

        self.link_loaded_nodes();
        self.data.initialize_hierarchy_depths();
        self.data.update_all_matrices();

        if reader.pull_object_member("components") {
            let data = &mut self.data;
            reader.enumerate_object_members(&mut |name, member| {
                let Some(type_id) = data.component_types.get_by_name(name).map(|info| info.type_id) else {
                    log::warn!("Skipping unknown component type '{}'", name);
                    return;
                };
                if let Some(container) = data.components.get_mut(&type_id) {
                    container.from_archive(member);
                }
            });
            reader.pop();
        }

        log::debug!("Loaded scene with {} nodes", self.data.nodes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_math::Vec3;

    #[test]
    fn test_create_and_destroy_lifecycle() {
        let mut scene = Scene::new();
        let ids = scene.create_nodes(3);
        assert_eq!(scene.num_root_nodes(), 3);
        assert!(scene.get_node(ids[0]).unwrap().mod_state().contains(ModState::NEW));

        scene.on_end_system_frame();
        scene.destroy_nodes(&[ids[1], ids[1]]);
        assert_eq!(scene.data().system_destroyed_nodes.len(), 1);

        scene.on_end_system_frame();
        assert!(scene
            .get_node(ids[1])
            .unwrap()
            .mod_state()
            .contains(ModState::DESTROYED_APPLIED));

        scene.update(&UpdatePipeline::new(), 0.5);
        assert!(scene.get_node(ids[1]).is_none());
        assert_eq!(scene.num_root_nodes(), 2);
        assert!(scene.get_node(ids[0]).unwrap().mod_state().is_empty());
        assert_eq!(scene.frame_id(), 1);
        assert_eq!(scene.current_time(), 0.5);
    }

    #[test]
    fn test_get_root_nodes_pages() {
        let mut scene = Scene::new();
        let ids = scene.create_nodes(5);

        let mut page = [NodeId::NULL; 2];
        assert_eq!(scene.get_root_nodes(0, &mut page), 2);
        assert_eq!(page, [ids[0], ids[1]]);
        assert_eq!(scene.get_root_nodes(4, &mut page), 1);
        assert_eq!(page[0], ids[4]);
        assert_eq!(scene.get_root_nodes(9, &mut page), 0);
    }

    #[test]
    fn test_staged_changes_applied_before_first_step() {
        let mut scene = Scene::new();
        let ids = scene.create_nodes(2);
        scene.data_mut().add_child(ids[0], ids[1]);
        scene.data_mut().set_local_position(ids[0], Vec3::X);

        scene.update(&UpdatePipeline::new(), 0.016);
        let child = scene.get_node(ids[1]).unwrap();
        assert_eq!(child.root(), ids[0]);
        assert_eq!(child.hierarchy_depth(), 1);
        assert_eq!(child.world_matrix().translation(), Vec3::X);
    }

    #[test]
    fn test_reset_scene() {
        let mut scene = Scene::new();
        let ids = scene.create_nodes(2);
        scene.data_mut().set_local_position(ids[0], Vec3::Y);
        scene.reset_scene();

        assert_eq!(scene.data().num_nodes(), 0);
        assert_eq!(scene.num_root_nodes(), 0);
        assert!(!scene.data().has_staged_changes());
        assert!(scene.get_node(ids[0]).is_none());
    }

    #[test]
    fn test_load_detaches_invalid_roots() {
        let value = serde_json::json!({
            "next_node_id": 4,
            "nodes": {
                "0": { "name": "a", "root": 1 },
                "1": { "name": "b", "root": 0 },
                "2": { "name": "c", "root": 7 },
                "3": { "name": "d", "root": 3 }
            }
        });

        let mut scene = Scene::new();
        scene.from_archive(&mut strata_core::JsonArchiveReader::new(&value));

        assert_eq!(scene.data().num_nodes(), 4);
        for index in 0..4 {
            let node = scene.get_node(NodeId::restored(index)).unwrap();
            let depth_ok = node.root().is_null() == (node.hierarchy_depth() == 0);
            assert!(depth_ok, "node {} has root {} at depth {}", index, node.root(), node.hierarchy_depth());
        }

        // The 0 <-> 1 cycle is broken by detaching one of them
        let roots = scene.data().root_nodes();
        assert!(roots.contains(&NodeId::restored(2)));
        assert!(roots.contains(&NodeId::restored(3)));
        assert_eq!(roots.len(), 3);
    }

    #[test]
    fn test_load_skips_out_of_range_indices() {
        let value = serde_json::json!({
            "next_node_id": 4000000001u64,
            "nodes": {
                "1": { "name": "kept" },
                "4000000000": { "name": "huge" }
            }
        });

        let config = SceneConfig {
            max_node_slots: 16,
            ..SceneConfig::default()
        };
        let mut scene = Scene::with_config(config);
        scene.from_archive(&mut strata_core::JsonArchiveReader::new(&value));
        assert_eq!(scene.data().num_nodes(), 1);
        assert_eq!(scene.data().nodes.slot_count(), 2);

        // next_node_id bounds indices too
        let value = serde_json::json!({
            "next_node_id": 2,
            "nodes": { "0": {}, "5": {} }
        });
        scene.from_archive(&mut strata_core::JsonArchiveReader::new(&value));
        assert_eq!(scene.data().num_nodes(), 1);
        assert!(scene.get_node(NodeId::restored(0)).is_some());
        assert!(scene.get_node(NodeId::restored(5)).is_none());
    }
}
