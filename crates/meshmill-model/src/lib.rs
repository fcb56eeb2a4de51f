//! # meshmill model
//!
//! Machining target geometry: triangle meshes loaded from STL, their
//! bounding boxes, and the rectangular stock block derived from them.

pub mod bounds;
pub mod loader;
pub mod mesh;
pub mod stock;

pub use bounds::BoundingBox;
pub use loader::{load, load_from_reader};
pub use mesh::{Mesh, Triangle3D};
pub use stock::{build_stock, Stock};
