//! Drop-cutter surface model
//!
//! For a tool centred at (x, y), the drop-cutter height is the lowest tip Z
//! at which the tool touches the mesh without gouging it. Flat end mills
//! test their bottom face, rim against edges and rim against vertices; ball
//! end mills test sphere against face, edge and vertex.

use meshmill_core::{Tool, ToolType};
use meshmill_model::Mesh;

/// Tool tip geometry as seen by the surface model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutterShape {
    Flat,
    Ball,
}

/// Cylindrical cutter with a flat or spherical tip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutter {
    pub radius: f64,
    pub shape: CutterShape,
}

impl Cutter {
    pub fn flat(radius: f64) -> Self {
        Self {
            radius,
            shape: CutterShape::Flat,
        }
    }

    pub fn ball(radius: f64) -> Self {
        Self {
            radius,
            shape: CutterShape::Ball,
        }
    }

    /// Drills are modelled as flat cutters
    pub fn from_tool(tool: &Tool) -> Self {
        match tool.tool_type {
            ToolType::EndMillBall => Self::ball(tool.radius()),
            ToolType::EndMillFlat | ToolType::DrillBit => Self::flat(tool.radius()),
        }
    }

    /// Same shape with the radius grown by `by`
    pub fn inflated(&self, by: f64) -> Self {
        Self {
            radius: self.radius + by,
            shape: self.shape,
        }
    }

    /// Height of the tip surface above the tip at radial distance `d`
    pub fn profile_height(&self, d: f64) -> f64 {
        match self.shape {
            CutterShape::Flat => 0.0,
            CutterShape::Ball => {
                let r2 = self.radius * self.radius;
                self.radius - (r2 - (d * d).min(r2)).sqrt()
            }
        }
    }

    /// Lowest tip Z at (x, y), `None` when no triangle is under the tool
    pub fn drop(&self, accel: &MeshAccel, x: f64, y: f64) -> Option<f64> {
        let z = match self.shape {
            CutterShape::Flat => drop_cutter_flat(accel, self.radius, x, y),
            CutterShape::Ball => drop_cutter_ball(accel, self.radius, x, y) - self.radius,
        };
        z.is_finite().then_some(z)
    }
}

/// A mesh triangle with precomputed plane and 2D bounds
#[derive(Debug, Clone)]
pub struct Triangle {
    pub v: [[f64; 3]; 3],
    pub normal: [f64; 3],
    /// Plane equation: normal · p = d
    pub d: f64,
    /// [min_x, min_y, max_x, max_y]
    pub bbox_2d: [f64; 4],
}

impl Triangle {
    pub fn new(v0: [f64; 3], v1: [f64; 3], v2: [f64; 3]) -> Self {
        let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
        let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        // Facing is irrelevant for contact; keep normals pointing up
        let normal = if len > 1e-12 {
            let s = if n[2] < 0.0 { -1.0 / len } else { 1.0 / len };
            [n[0] * s, n[1] * s, n[2] * s]
        } else {
            [0.0, 0.0, 1.0]
        };
        let d = normal[0] * v0[0] + normal[1] * v0[1] + normal[2] * v0[2];

        Self {
            v: [v0, v1, v2],
            normal,
            d,
            bbox_2d: [
                v0[0].min(v1[0]).min(v2[0]),
                v0[1].min(v1[1]).min(v2[1]),
                v0[0].max(v1[0]).max(v2[0]),
                v0[1].max(v1[1]).max(v2[1]),
            ],
        }
    }

    /// Z on the triangle plane at (x, y); `None` for vertical triangles
    pub fn z_at_xy(&self, x: f64, y: f64) -> Option<f64> {
        if self.normal[2].abs() < 1e-10 {
            return None;
        }
        Some((self.d - self.normal[0] * x - self.normal[1] * y) / self.normal[2])
    }

    /// Point-in-triangle test in the XY projection
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        let [a, b, c] = &self.v;
        let d00 = (b[0] - a[0]) * (b[0] - a[0]) + (b[1] - a[1]) * (b[1] - a[1]);
        let d01 = (b[0] - a[0]) * (c[0] - a[0]) + (b[1] - a[1]) * (c[1] - a[1]);
        let d11 = (c[0] - a[0]) * (c[0] - a[0]) + (c[1] - a[1]) * (c[1] - a[1]);
        let d20 = (x - a[0]) * (b[0] - a[0]) + (y - a[1]) * (b[1] - a[1]);
        let d21 = (x - a[0]) * (c[0] - a[0]) + (y - a[1]) * (c[1] - a[1]);

        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < 1e-12 {
            return false;
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;

        let eps = -1e-9;
        u >= eps && v >= eps && w >= eps
    }

    pub fn edges(&self) -> [[[f64; 3]; 2]; 3] {
        [
            [self.v[0], self.v[1]],
            [self.v[1], self.v[2]],
            [self.v[2], self.v[0]],
        ]
    }
}

/// Uniform 2D grid of triangle bins for radius queries
pub struct MeshAccel {
    triangles: Vec<Triangle>,
    cell_size: f64,
    /// [min_x, min_y, max_x, max_y]
    bounds: [f64; 4],
    grid_nx: usize,
    grid_ny: usize,
    cells: Vec<Vec<usize>>,
}

impl MeshAccel {
    /// Bin every triangle of `mesh`
    pub fn new(mesh: &Mesh) -> Self {
        let triangles: Vec<Triangle> = mesh
            .triangles()
            .iter()
            .map(|t| {
                let p = |i: usize| [t.vertices[i].x, t.vertices[i].y, t.vertices[i].z];
                Triangle::new(p(0), p(1), p(2))
            })
            .collect();

        let mut bounds = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for tri in &triangles {
            bounds[0] = bounds[0].min(tri.bbox_2d[0]);
            bounds[1] = bounds[1].min(tri.bbox_2d[1]);
            bounds[2] = bounds[2].max(tri.bbox_2d[2]);
            bounds[3] = bounds[3].max(tri.bbox_2d[3]);
        }
        if triangles.is_empty() {
            bounds = [0.0, 0.0, 0.0, 0.0];
        }

        let span = (bounds[2] - bounds[0]).max(bounds[3] - bounds[1]);
        let cell_size = (span / 64.0).max(1.0);
        let grid_nx = ((bounds[2] - bounds[0]) / cell_size).floor() as usize + 1;
        let grid_ny = ((bounds[3] - bounds[1]) / cell_size).floor() as usize + 1;

        let mut cells = vec![Vec::new(); grid_nx * grid_ny];
        for (idx, tri) in triangles.iter().enumerate() {
            let x0 = ((tri.bbox_2d[0] - bounds[0]) / cell_size).floor() as usize;
            let y0 = ((tri.bbox_2d[1] - bounds[1]) / cell_size).floor() as usize;
            let x1 = ((tri.bbox_2d[2] - bounds[0]) / cell_size).floor() as usize;
            let y1 = ((tri.bbox_2d[3] - bounds[1]) / cell_size).floor() as usize;
            for iy in y0..=y1.min(grid_ny - 1) {
                for ix in x0..=x1.min(grid_nx - 1) {
                    cells[iy * grid_nx + ix].push(idx);
                }
            }
        }

        Self {
            triangles,
            cell_size,
            bounds,
            grid_nx,
            grid_ny,
            cells,
        }
    }

    /// Indices of triangles whose bins overlap the circle's bounding square
    pub fn query_circle(&self, x: f64, y: f64, radius: f64) -> Vec<usize> {
        let mut result = Vec::new();
        let x0 = ((x - radius - self.bounds[0]) / self.cell_size).floor() as isize;
        let y0 = ((y - radius - self.bounds[1]) / self.cell_size).floor() as isize;
        let x1 = ((x + radius - self.bounds[0]) / self.cell_size).floor() as isize;
        let y1 = ((y + radius - self.bounds[1]) / self.cell_size).floor() as isize;

        for iy in y0.max(0)..=y1.min(self.grid_ny as isize - 1) {
            for ix in x0.max(0)..=x1.min(self.grid_nx as isize - 1) {
                result.extend_from_slice(&self.cells[iy as usize * self.grid_nx + ix as usize]);
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    pub fn triangle(&self, idx: usize) -> &Triangle {
        &self.triangles[idx]
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Drop-cutter tip height for a flat end mill
pub fn drop_cutter_flat(accel: &MeshAccel, radius: f64, x: f64, y: f64) -> f64 {
    let mut max_z = f64::NEG_INFINITY;
    for idx in accel.query_circle(x, y, radius) {
        let tri = accel.triangle(idx);

        // Bottom face over the triangle interior
        if tri.contains_xy(x, y) {
            if let Some(z) = tri.z_at_xy(x, y) {
                max_z = max_z.max(z);
            }
        }

        // Rim against edges; vertices are edge endpoints
        for [v0, v1] in tri.edges() {
            max_z = max_z.max(edge_contact_flat(x, y, radius, v0, v1));
        }

        // Tilted faces touch the rim on the uphill side
        if tri.normal[2] > 1e-10 {
            let h = (tri.normal[0] * tri.normal[0] + tri.normal[1] * tri.normal[1]).sqrt();
            if h > 1e-12 {
                let px = x - radius * tri.normal[0] / h;
                let py = y - radius * tri.normal[1] / h;
                if tri.contains_xy(px, py) {
                    if let Some(z) = tri.z_at_xy(px, py) {
                        max_z = max_z.max(z);
                    }
                }
            }
        }
    }
    max_z
}

/// Highest point of the edge inside the tool disk
fn edge_contact_flat(x: f64, y: f64, radius: f64, v0: [f64; 3], v1: [f64; 3]) -> f64 {
    let dx = v1[0] - v0[0];
    let dy = v1[1] - v0[1];
    let len_sq = dx * dx + dy * dy;

    if len_sq < 1e-18 {
        let dist_sq = (x - v0[0]).powi(2) + (y - v0[1]).powi(2);
        return if dist_sq <= radius * radius {
            v0[2].max(v1[2])
        } else {
            f64::NEG_INFINITY
        };
    }

    // Solve |v0 + t*(v1 - v0) - c|^2 = r^2 for the chord inside the disk
    let fx = v0[0] - x;
    let fy = v0[1] - y;
    let b = fx * dx + fy * dy;
    let c = fx * fx + fy * fy - radius * radius;
    let disc = b * b - len_sq * c;
    if disc < 0.0 {
        return f64::NEG_INFINITY;
    }
    let root = disc.sqrt();
    let t0 = ((-b - root) / len_sq).max(0.0);
    let t1 = ((-b + root) / len_sq).min(1.0);
    if t0 > t1 {
        return f64::NEG_INFINITY;
    }
    let z = |t: f64| v0[2] + t * (v1[2] - v0[2]);
    z(t0).max(z(t1))
}

/// Drop-cutter sphere centre height for a ball end mill
pub fn drop_cutter_ball(accel: &MeshAccel, radius: f64, x: f64, y: f64) -> f64 {
    let mut max_z = f64::NEG_INFINITY;
    for idx in accel.query_circle(x, y, radius) {
        let tri = accel.triangle(idx);

        max_z = max_z.max(face_contact_ball(x, y, radius, tri));
        for [v0, v1] in tri.edges() {
            max_z = max_z.max(edge_contact_ball(x, y, radius, v0, v1));
        }
        for v in &tri.v {
            max_z = max_z.max(vertex_contact_ball(x, y, radius, *v));
        }
    }
    max_z
}

fn face_contact_ball(x: f64, y: f64, radius: f64, tri: &Triangle) -> f64 {
    let nz = tri.normal[2];
    if nz <= 0.01 {
        return f64::NEG_INFINITY;
    }
    // Contact point sits one radius from the centre along the normal
    let cx = x - radius * tri.normal[0];
    let cy = y - radius * tri.normal[1];
    if !tri.contains_xy(cx, cy) {
        return f64::NEG_INFINITY;
    }
    match tri.z_at_xy(x, y) {
        Some(z_plane) => z_plane + radius / nz,
        None => f64::NEG_INFINITY,
    }
}

fn edge_contact_ball(x: f64, y: f64, radius: f64, v0: [f64; 3], v1: [f64; 3]) -> f64 {
    let dx = v1[0] - v0[0];
    let dy = v1[1] - v0[1];
    let dz = v1[2] - v0[2];
    let len_xy_sq = dx * dx + dy * dy;
    if len_xy_sq < 1e-18 {
        return vertex_contact_ball(x, y, radius, if v0[2] > v1[2] { v0 } else { v1 });
    }

    // Nearest XY point on the edge, then refine along the edge's slope
    let t_xy = (((x - v0[0]) * dx + (y - v0[1]) * dy) / len_xy_sq).clamp(0.0, 1.0);
    let mut best = f64::NEG_INFINITY;
    for t in [t_xy, (t_xy + 0.25).min(1.0), (t_xy - 0.25).max(0.0)] {
        let mut t = t;
        // A few Newton-free bisection steps toward the uphill side are enough for best-effort contact
        for _ in 0..8 {
            let here = sphere_on_edge(x, y, radius, v0, v1, t);
            let up = sphere_on_edge(x, y, radius, v0, v1, (t + 0.01).min(1.0));
            let down = sphere_on_edge(x, y, radius, v0, v1, (t - 0.01).max(0.0));
            if up > here && up >= down {
                t = (t + 0.01).min(1.0);
            } else if down > here {
                t = (t - 0.01).max(0.0);
            } else {
                break;
            }
        }
        best = best.max(sphere_on_edge(x, y, radius, v0, v1, t));
    }
    best
}

fn sphere_on_edge(x: f64, y: f64, radius: f64, v0: [f64; 3], v1: [f64; 3], t: f64) -> f64 {
    let p = [
        v0[0] + t * (v1[0] - v0[0]),
        v0[1] + t * (v1[1] - v0[1]),
        v0[2] + t * (v1[2] - v0[2]),
    ];
    vertex_contact_ball(x, y, radius, p)
}

fn vertex_contact_ball(x: f64, y: f64, radius: f64, v: [f64; 3]) -> f64 {
    let dist_sq = (x - v[0]) * (x - v[0]) + (y - v[1]) * (y - v[1]);
    if dist_sq >= radius * radius {
        return f64::NEG_INFINITY;
    }
    v[2] + (radius * radius - dist_sq).sqrt()
}

/// Regular grid of XY samples with one value per sample
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    pub nx: usize,
    pub ny: usize,
    /// [min_x, min_y, max_x, max_y]
    pub bounds: [f64; 4],
    /// Row-major, Y outer
    pub heights: Vec<f64>,
}

impl HeightField {
    /// Grid covering `bounds` with at most `spacing` between samples
    pub fn new(bounds: [f64; 4], spacing: f64, initial: f64) -> Self {
        let count = |span: f64| ((span / spacing).ceil().max(0.0) as usize) + 1;
        let nx = count(bounds[2] - bounds[0]);
        let ny = count(bounds[3] - bounds[1]);
        Self {
            nx,
            ny,
            bounds,
            heights: vec![initial; nx * ny],
        }
    }

    pub fn dx(&self) -> f64 {
        if self.nx <= 1 {
            0.0
        } else {
            (self.bounds[2] - self.bounds[0]) / (self.nx - 1) as f64
        }
    }

    pub fn dy(&self) -> f64 {
        if self.ny <= 1 {
            0.0
        } else {
            (self.bounds[3] - self.bounds[1]) / (self.ny - 1) as f64
        }
    }

    pub fn xy_at(&self, ix: usize, iy: usize) -> (f64, f64) {
        (
            self.bounds[0] + ix as f64 * self.dx(),
            self.bounds[1] + iy as f64 * self.dy(),
        )
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.heights[iy * self.nx + ix]
    }

    pub fn set(&mut self, ix: usize, iy: usize, z: f64) {
        self.heights[iy * self.nx + ix] = z;
    }

    /// Nearest sample index, `None` outside the grid bounds
    pub fn nearest(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let eps = 1e-9;
        if x < self.bounds[0] - eps
            || x > self.bounds[2] + eps
            || y < self.bounds[1] - eps
            || y > self.bounds[3] + eps
        {
            return None;
        }
        let ix = if self.nx <= 1 {
            0
        } else {
            (((x - self.bounds[0]) / self.dx()).round() as usize).min(self.nx - 1)
        };
        let iy = if self.ny <= 1 {
            0
        } else {
            (((y - self.bounds[1]) / self.dy()).round() as usize).min(self.ny - 1)
        };
        Some((ix, iy))
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}
