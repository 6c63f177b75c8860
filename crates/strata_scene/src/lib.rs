//! # strata_scene - Node Hierarchy Runtime
//!
//! A frame-driven scene of transform nodes:
//! - Generational node ids, so stale handles are detected rather than reused
//! - Staged mutation: node changes made by a system are applied together at
//!   the end of its system frame, then announced through event channels
//! - Parent-before-child world matrix propagation and cascading destruction
//! - Pluggable component containers managed through a trait-object registry
//! - A named-system update pipeline with pushed jobs and tag callbacks
//! - JSON persistence of nodes and components
//!
//! ## Example
//!
//! ```ignore
//! use strata_scene::prelude::*;
//!
//! let mut scene = Scene::new();
//! let mut pipeline = UpdatePipeline::new();
//!
//! pipeline.register_system_fn("spin", |frame, _time, dt| {
//!     let roots = frame.data().root_nodes().to_vec();
//!     for node in roots {
//!         frame.data_mut().translate(node, Vec3::new(dt, 0.0, 0.0));
//!     }
//! });
//! pipeline.configure_from_json_str(r#"["spin"]"#)?;
//!
//! let [parent, child] = scene.create_nodes(2)[..] else { unreachable!() };
//! scene.data_mut().add_child(parent, child);
//!
//! scene.update(&pipeline, 1.0 / 60.0);
//! ```

pub mod component;
pub mod config;
pub mod containers;
pub mod events;
mod hierarchy;
pub mod node;
pub mod pipeline;
pub mod scene;
pub mod scene_data;
pub mod system_frame;
mod tags;

pub use component::{Component, ComponentContainer, PropertyModData, SharedData, TypedComponentContainer};
pub use config::SceneConfig;
pub use containers::{BasicComponentContainer, EmptyComponentContainer, MapComponentContainer};
pub use events::*;
pub use node::{ModState, Node};
pub use pipeline::{AsyncToken, PipelineStep, SystemId, SystemInfo, TagCallback, UpdatePipeline};
pub use scene::Scene;
pub use scene_data::{RootMod, SceneData, TransformMod};
pub use system_frame::SystemFrame;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::component::{Component, ComponentContainer, SharedData, TypedComponentContainer};
    pub use crate::containers::{BasicComponentContainer, EmptyComponentContainer, MapComponentContainer};
    pub use crate::events::*;
    pub use crate::node::{ModState, Node};
    pub use crate::pipeline::{AsyncToken, SystemInfo, UpdatePipeline};
    pub use crate::scene::Scene;
    pub use crate::scene_data::SceneData;
    pub use crate::system_frame::SystemFrame;

    pub use strata_core::prelude::*;
    pub use strata_event::prelude::*;
    pub use strata_math::{Mat4, Quat, Vec3};
}
