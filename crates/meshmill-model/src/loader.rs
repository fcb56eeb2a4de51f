//! # Geometry loader
//!
//! Reads STL files (ASCII or binary, via `stl_io`) into a [`Mesh`] and
//! validates that the result describes a solid with non-zero volume.

use crate::bounds::BoundingBox;
use crate::mesh::Mesh;
use meshmill_core::GeometryLoadError;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, info};

/// Load an STL file and return the mesh with its bounding box
pub fn load(path: impl AsRef<Path>) -> Result<(Mesh, BoundingBox), GeometryLoadError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    debug!("Importing STL file: {}", name);

    let file = File::open(path).map_err(|e| GeometryLoadError::Unreadable {
        path: name.clone(),
        reason: e.to_string(),
    })?;

    load_from_reader(&mut BufReader::new(file), &name)
}

/// Load STL data from any seekable reader
///
/// `source_name` only labels log lines and errors.
pub fn load_from_reader<R: Read + Seek>(
    reader: &mut R,
    source_name: &str,
) -> Result<(Mesh, BoundingBox), GeometryLoadError> {
    let stl = stl_io::read_stl(reader).map_err(|e| GeometryLoadError::Unreadable {
        path: source_name.to_string(),
        reason: e.to_string(),
    })?;
    debug!("STL contains {} faces", stl.faces.len());

    let mesh = Mesh::from_stl(&stl);
    let bounds = validate(&mesh, source_name)?;

    info!(
        "Loaded {} triangles from {}, bounds ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
        mesh.triangle_count(),
        source_name,
        bounds.min().x,
        bounds.min().y,
        bounds.min().z,
        bounds.max().x,
        bounds.max().y,
        bounds.max().z
    );

    Ok((mesh, bounds))
}

/// Check an in-memory mesh the same way loaded meshes are checked
pub fn validate(mesh: &Mesh, source_name: &str) -> Result<BoundingBox, GeometryLoadError> {
    if mesh.triangles().iter().any(|t| !t.is_finite()) {
        return Err(GeometryLoadError::NonFinite {
            path: source_name.to_string(),
        });
    }

    let bounds = mesh.bounding_box().ok_or_else(|| GeometryLoadError::Empty {
        path: source_name.to_string(),
    })?;

    if bounds.is_degenerate() {
        let e = bounds.extents();
        return Err(GeometryLoadError::Degenerate {
            path: source_name.to_string(),
            dx: e.x,
            dy: e.y,
            dz: e.z,
        });
    }

    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangle3D;
    use nalgebra::Point3;

    #[test]
    fn test_validate_rejects_flat_mesh() {
        let mesh = Mesh::from_triangles(vec![Triangle3D::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )]);
        let err = validate(&mesh, "flat").unwrap_err();
        assert!(matches!(err, GeometryLoadError::Degenerate { dz, .. } if dz == 0.0));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mesh = Mesh::from_triangles(vec![Triangle3D::new(
            Point3::new(f64::NAN, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
        )]);
        assert!(matches!(
            validate(&mesh, "nan"),
            Err(GeometryLoadError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(
            validate(&Mesh::default(), "empty"),
            Err(GeometryLoadError::Empty { .. })
        ));
    }
}
