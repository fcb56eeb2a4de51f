//! # Triangle mesh
//!
//! Immutable triangle soup used as the machining target. Meshes come from
//! STL files through [`crate::loader`] or are built in memory.

use crate::bounds::BoundingBox;
use nalgebra::{Point3, Vector3};

/// A 3D triangle made up of three vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle3D {
    pub vertices: [Point3<f64>; 3],
    pub normal: Vector3<f64>,
}

impl Triangle3D {
    pub fn new(v1: Point3<f64>, v2: Point3<f64>, v3: Point3<f64>) -> Self {
        let edge1 = v2 - v1;
        let edge2 = v3 - v1;
        // Slivers get an upward normal rather than NaN
        let normal = edge1
            .cross(&edge2)
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::z);

        Self {
            vertices: [v1, v2, v3],
            normal,
        }
    }

    /// Get bounding box of the triangle
    pub fn bounds(&self) -> BoundingBox {
        let [a, b, c] = &self.vertices;
        BoundingBox::new(
            Point3::new(a.x.min(b.x).min(c.x), a.y.min(b.y).min(c.y), a.z.min(b.z).min(c.z)),
            Point3::new(a.x.max(b.x).max(c.x), a.y.max(b.y).max(c.y), a.z.max(b.z).max(c.z)),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.vertices
            .iter()
            .all(|v| v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
    }
}

/// A 3D mesh model
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    triangles: Vec<Triangle3D>,
}

impl Mesh {
    pub fn from_triangles(triangles: Vec<Triangle3D>) -> Self {
        Self { triangles }
    }

    /// Convert an indexed STL mesh, skipping faces with out-of-range indices
    pub fn from_stl(stl: &stl_io::IndexedMesh) -> Self {
        let point = |idx: usize| {
            let v = stl.vertices[idx];
            Point3::new(v[0] as f64, v[1] as f64, v[2] as f64)
        };

        let triangles = stl
            .faces
            .iter()
            .filter(|face| face.vertices.iter().all(|&i| i < stl.vertices.len()))
            .map(|face| {
                Triangle3D::new(
                    point(face.vertices[0]),
                    point(face.vertices[1]),
                    point(face.vertices[2]),
                )
            })
            .collect();

        Self { triangles }
    }

    /// Closed axis-aligned box, two triangles per face, outward normals
    pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Self {
        let b = BoundingBox::new(min, max);
        let (lo, hi) = (b.min(), b.max());
        let c = |x: bool, y: bool, z: bool| {
            Point3::new(
                if x { hi.x } else { lo.x },
                if y { hi.y } else { lo.y },
                if z { hi.z } else { lo.z },
            )
        };
        // Quads listed counter-clockwise seen from outside
        let quads = [
            [c(false, false, false), c(false, true, false), c(true, true, false), c(true, false, false)],
            [c(false, false, true), c(true, false, true), c(true, true, true), c(false, true, true)],
            [c(false, false, false), c(true, false, false), c(true, false, true), c(false, false, true)],
            [c(false, true, false), c(false, true, true), c(true, true, true), c(true, true, false)],
            [c(false, false, false), c(false, false, true), c(false, true, true), c(false, true, false)],
            [c(true, false, false), c(true, true, false), c(true, true, true), c(true, false, true)],
        ];

        let triangles = quads
            .iter()
            .flat_map(|[a, b, c, d]| {
                [Triangle3D::new(*a, *b, *c), Triangle3D::new(*a, *c, *d)]
            })
            .collect();

        Self { triangles }
    }

    pub fn triangles(&self) -> &[Triangle3D] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Axis-aligned bounds of every vertex, `None` for an empty mesh
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.triangles.iter().flat_map(|t| t.vertices.iter()))
    }
}
