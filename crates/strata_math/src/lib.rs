//! # strata_math - Transform Math
//!
//! The small set of math primitives the node hierarchy needs: vectors,
//! quaternions and column-major 4x4 matrices composed in a fixed
//! translate * rotate * scale order.

pub mod matrix;
pub mod quaternion;
pub mod vector;

pub use matrix::*;
pub use quaternion::*;
pub use vector::*;

use strata_core::{ArchiveReader, ArchiveWriter, FromArchive, ToArchive};

/// Common math constants
pub mod consts {
    pub const PI: f32 = core::f32::consts::PI;
    pub const DEG_TO_RAD: f32 = PI / 180.0;
    pub const EPSILON: f32 = 1e-6;
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees * consts::DEG_TO_RAD
}

// ============================================================================
// Archive support
// ============================================================================

impl ToArchive for Vec3 {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.object_member("x", &self.x);
        writer.object_member("y", &self.y);
        writer.object_member("z", &self.z);
    }
}

impl FromArchive for Vec3 {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        reader.read_object_member("x", &mut self.x);
        reader.read_object_member("y", &mut self.y);
        reader.read_object_member("z", &mut self.z);
    }
}

impl ToArchive for Quat {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.object_member("x", &self.x);
        writer.object_member("y", &self.y);
        writer.object_member("z", &self.z);
        writer.object_member("w", &self.w);
    }
}

impl FromArchive for Quat {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        reader.read_object_member("x", &mut self.x);
        reader.read_object_member("y", &mut self.y);
        reader.read_object_member("z", &mut self.z);
        reader.read_object_member("w", &mut self.w);
    }
}

pub mod prelude {
    pub use crate::matrix::Mat4;
    pub use crate::quaternion::Quat;
    pub use crate::vector::{Vec3, Vec4};
    pub use crate::radians;
}
