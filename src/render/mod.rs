//! View-side helpers: the orbit camera that turns pointer positions into rays
//! and the transform gizmo attached to the selection.

pub mod camera;
pub mod gizmo;

pub use camera::CameraController;
pub use gizmo::TransformGizmo;
