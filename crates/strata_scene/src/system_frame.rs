//! Per-invocation context handed to systems

use bytemuck::Pod;
use strata_core::NodeId;

use crate::pipeline::{SystemId, UpdatePipeline};
use crate::scene::Scene;
use crate::scene_data::SceneData;

/// Context for one system or tag callback invocation.
///
/// Only the scene creates frames. Besides scene access it collects
/// follow-up jobs (see [`push`](Self::push)) and emitted tags, which the
/// scene drains once the invocation returns.
pub struct SystemFrame<'a> {
    scene: &'a mut Scene,
    pipeline: &'a UpdatePipeline,
    time_delta: f32,
    jobs: Vec<SystemId>,
}

impl<'a> SystemFrame<'a> {
    pub(crate) fn new(scene: &'a mut Scene, pipeline: &'a UpdatePipeline, time_delta: f32) -> Self {
        Self {
            scene,
            pipeline,
            time_delta,
            jobs: Vec::new(),
        }
    }

    pub(crate) fn into_jobs(self) -> Vec<SystemId> {
        self.jobs
    }

    pub fn frame_id(&self) -> u64 {
        self.scene.frame_id()
    }

    pub fn current_time(&self) -> f32 {
        self.scene.current_time()
    }

    pub fn time_delta(&self) -> f32 {
        self.time_delta
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        self.scene
    }

    /// Shorthand for `scene().data()`
    pub fn data(&self) -> &SceneData {
        self.scene.data()
    }

    /// Shorthand for `scene_mut().data_mut()`, where node mutators live
    pub fn data_mut(&mut self) -> &mut SceneData {
        self.scene.data_mut()
    }

    pub fn pipeline(&self) -> &UpdatePipeline {
        self.pipeline
    }

    /// Queue the system registered as `name` to run right after the current
    /// system returns or yields, before anything else left in the enclosing
    /// step. Jobs run in the order they were pushed.
    pub fn push(&mut self, name: &str) {
        match self.pipeline.find_system(name) {
            Some(id) => self.jobs.push(id),
            None => log::warn!("Can't find system '{}'", name),
        }
    }

    /// Apply every change staged so far, then run the jobs pushed so far
    /// along with everything they push in turn. The rest of this system sees
    /// a consistent hierarchy and the effects of those jobs.
    pub fn yield_frame(&mut self) {
        self.scene.on_end_system_frame();

        let jobs = std::mem::take(&mut self.jobs);
        self.scene.execute_job_queue(self.pipeline, &jobs, self.time_delta);
    }

    /// Tag `node` with `value` on component type `C`. Repeated tags on the
    /// same node are all kept.
    pub fn emit_tag<C: 'static, T: Pod>(&mut self, node: NodeId, value: T) {
        self.scene.emitted_tags.push::<C, T>(node, value, false);
    }

    /// Tag `node` on component type `C`, keeping only the first tag per node
    pub fn emit_single_tag<C: 'static, T: Pod>(&mut self, node: NodeId, value: T) {
        self.scene.emitted_tags.push::<C, T>(node, value, true);
    }
}
