pub mod camera;
pub mod handle;
pub mod lifecycle;
