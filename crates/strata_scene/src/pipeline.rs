//! UpdatePipeline - named systems grouped into ordered steps
//!
//! Systems register once under a unique name. The pipeline layout is then
//! configured from an archive: an array whose elements are either a single
//! system name or an array of names forming one step.
//!
//! ```json
//! [["input", "movement"], "physics", ["render_prep"]]
//! ```
//!
//! Names that don't resolve are logged and skipped.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use strata_core::{ArchiveReader, JsonArchiveReader, Result};
use strata_event::TagBuffer;

use crate::system_frame::SystemFrame;

/// Signature of a system: `(frame, current_time, time_delta)`
pub type SystemFn = dyn Fn(&mut SystemFrame<'_>, f32, f32);

/// Signature of a tag callback
pub type TagCallbackFn = dyn Fn(&mut SystemFrame<'_>, &TagBuffer);

/// Handle to a registered system
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(usize);

impl SystemId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Grouping hint for systems that could run together.
///
/// Recorded on every system but never used for scheduling: execution is
/// strictly sequential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AsyncToken(u32);

impl AsyncToken {
    /// No grouping
    pub const NONE: Self = Self(0);

    pub const fn new(group: u32) -> Self {
        Self(group)
    }

    pub const fn group(self) -> u32 {
        self.0
    }
}

/// Subscription of a system to tags of one type
pub struct TagCallback {
    tag_type: TypeId,
    component_type: Option<TypeId>,
    callback: Box<TagCallbackFn>,
}

impl TagCallback {
    pub fn tag_type(&self) -> TypeId {
        self.tag_type
    }

    /// The component type filter, or `None` to receive tags from every type
    pub fn component_type(&self) -> Option<TypeId> {
        self.component_type
    }

    /// Whether this callback wants `buffer`
    pub fn matches(&self, buffer: &TagBuffer) -> bool {
        self.tag_type == buffer.tag_type()
            && self
                .component_type
                .map_or(true, |component| component == buffer.component_type())
    }

    pub(crate) fn call(&self, frame: &mut SystemFrame<'_>, buffer: &TagBuffer) {
        (self.callback)(frame, buffer);
    }
}

/// A registered system
pub struct SystemInfo {
    name: String,
    system_fn: Box<SystemFn>,
    async_token: AsyncToken,
    tag_callbacks: Vec<TagCallback>,
}

impl SystemInfo {
    /// Create a system with no tag callbacks
    pub fn new<F>(name: impl Into<String>, system_fn: F) -> Self
    where
        F: Fn(&mut SystemFrame<'_>, f32, f32) + 'static,
    {
        Self {
            name: name.into(),
            system_fn: Box::new(system_fn),
            async_token: AsyncToken::NONE,
            tag_callbacks: Vec::new(),
        }
    }

    /// Set the grouping hint
    pub fn with_async_token(mut self, token: AsyncToken) -> Self {
        self.async_token = token;
        self
    }

    /// Subscribe to tags of type `T`, optionally only those emitted on one
    /// component type
    pub fn with_tag_callback<T, F>(mut self, component_type: Option<TypeId>, callback: F) -> Self
    where
        T: 'static,
        F: Fn(&mut SystemFrame<'_>, &TagBuffer) + 'static,
    {
        self.tag_callbacks.push(TagCallback {
            tag_type: TypeId::of::<T>(),
            component_type,
            callback: Box::new(callback),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn async_token(&self) -> AsyncToken {
        self.async_token
    }

    pub fn tag_callbacks(&self) -> &[TagCallback] {
        &self.tag_callbacks
    }

    pub(crate) fn run(&self, frame: &mut SystemFrame<'_>, current_time: f32, time_delta: f32) {
        (self.system_fn)(frame, current_time, time_delta);
    }
}

impl fmt::Debug for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemInfo")
            .field("name", &self.name)
            .field("async_token", &self.async_token)
            .field("tag_callbacks", &self.tag_callbacks.len())
            .finish()
    }
}

/// One pipeline step: systems run in order
pub type PipelineStep = Vec<SystemId>;

/// Registry of systems and the ordered step list run by
/// [`Scene::update`](crate::Scene::update)
#[derive(Default)]
pub struct UpdatePipeline {
    systems: Vec<SystemInfo>,
    by_name: HashMap<String, SystemId>,
    pipeline: Vec<PipelineStep>,
}

impl UpdatePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system. If the name is already taken the first
    /// registration is kept and its id returned.
    pub fn register_system(&mut self, info: SystemInfo) -> SystemId {
        if info.name.is_empty() {
            log::warn!("Empty system names are not allowed");
        }

        if let Some(existing) = self.by_name.get(&info.name) {
            log::warn!("System '{}' is already registered, keeping the first", info.name);
            return *existing;
        }

        let id = SystemId(self.systems.len());
        self.by_name.insert(info.name.clone(), id);
        self.systems.push(info);
        id
    }

    /// Register a plain system function
    pub fn register_system_fn<F>(&mut self, name: impl Into<String>, system_fn: F) -> SystemId
    where
        F: Fn(&mut SystemFrame<'_>, f32, f32) + 'static,
    {
        self.register_system(SystemInfo::new(name, system_fn))
    }

    /// Rebuild the step list from an archive array
    pub fn configure_pipeline(&mut self, reader: &mut dyn ArchiveReader) {
        self.pipeline.clear();

        let mut steps = Vec::new();
        reader.enumerate_array_elements(&mut |_, element| {
            let mut step = PipelineStep::new();
            if element.is_array() {
                element.enumerate_array_elements(&mut |_, name| {
                    step.extend(self.resolve(name));
                });
            } else {
                step.extend(self.resolve(element));
            }

            if !step.is_empty() {
                steps.push(step);
            }
        });

        log::debug!("Configured update pipeline with {} steps", steps.len());
        self.pipeline = steps;
    }

    /// Rebuild the step list from JSON text
    pub fn configure_from_json_str(&mut self, text: &str) -> Result<()> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        self.configure_pipeline(&mut JsonArchiveReader::new(&root));
        Ok(())
    }

    /// The configured steps, in execution order
    pub fn get_pipeline(&self) -> &[PipelineStep] {
        &self.pipeline
    }

    pub fn find_system(&self, name: &str) -> Option<SystemId> {
        self.by_name.get(name).copied()
    }

    pub fn system(&self, id: SystemId) -> Option<&SystemInfo> {
        self.systems.get(id.0)
    }

    /// Every registered system, in registration order
    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &SystemInfo)> {
        self.systems.iter().enumerate().map(|(i, info)| (SystemId(i), info))
    }

    pub fn num_systems(&self) -> usize {
        self.systems.len()
    }

    fn resolve(&self, reader: &mut dyn ArchiveReader) -> Option<SystemId> {
        let name = reader.string().unwrap_or_default();
        if name.is_empty() {
            log::warn!("Empty pipeline system function name");
            return None;
        }

        let found = self.find_system(&name);
        if found.is_none() {
            log::warn!("Invalid pipeline system function name: '{}'", name);
        }
        found
    }
}
