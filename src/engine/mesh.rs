// Procedural mesh types and triangulation for the arena preview.
//
//   hex_prism() / unit_box() → PolyMesh → triangulate_flat() → RenderMesh → GPU

use glam::Vec3;

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex with position and normal.
///   @location(0) position: vec3<f32>
///   @location(1) normal:   vec3<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

// ============================================================================
// POLY MESH
// ============================================================================

/// Intermediate polygon mesh. Faces are n-gons with CCW winding when viewed
/// from outside (consistent with back-face culling).
/// Only built at startup; heap allocation per face is acceptable.
pub struct PolyMesh {
    pub positions: Vec<Vec3>,
    pub faces:     Vec<Vec<usize>>,
}

impl PolyMesh {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            faces:     Vec::new(),
        }
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, pos: Vec3) -> usize {
        let idx = self.positions.len();
        self.positions.push(pos);
        idx
    }

    /// Add a face by vertex indices (CCW order).
    pub fn add_face(&mut self, indices: Vec<usize>) {
        debug_assert!(indices.len() >= 3, "Face must have at least 3 vertices");
        self.faces.push(indices);
    }
}

// ============================================================================
// RENDER MESH
// ============================================================================

/// GPU-ready triangulated mesh.
/// Upload vertex_bytes() to a VERTEX buffer, index_bytes() to an INDEX buffer.
pub struct RenderMesh {
    pub vertices: Vec<GpuVertex>,
    pub indices:  Vec<u32>,
}

impl RenderMesh {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 { self.indices.len() as u32 }
}

// ============================================================================
// SHAPES
// ============================================================================

/// Flat-top hexagonal prism of unit circumradius and unit height.
/// The origin is the centre of the TOP face so the prism hangs below it,
/// matching how tile colliders are positioned.
pub fn hex_prism() -> PolyMesh {
    let mut mesh = PolyMesh::new();
    let corners: Vec<Vec3> = (0..6)
        .map(|i| {
            let a = std::f32::consts::FRAC_PI_3 * i as f32;
            Vec3::new(a.cos(), 0.0, a.sin())
        })
        .collect();

    let top: Vec<usize> = corners.iter().map(|&c| mesh.add_vertex(c)).collect();
    let bottom: Vec<usize> = corners
        .iter()
        .map(|&c| mesh.add_vertex(c - Vec3::Y))
        .collect();

    // Corners run counter-clockwise seen from -Y, so the top face is
    // reversed to face +Y.
    mesh.add_face(top.iter().rev().copied().collect());
    mesh.add_face(bottom.clone());
    for i in 0..6 {
        let j = (i + 1) % 6;
        mesh.add_face(vec![top[i], top[j], bottom[j], bottom[i]]);
    }
    mesh
}

/// Axis-aligned unit cube centred on the origin (side length 1).
pub fn unit_box() -> PolyMesh {
    let mut mesh = PolyMesh::new();
    let h = 0.5;
    for &(x, y, z) in &[
        (-h, -h,  h), ( h, -h,  h), ( h,  h,  h), (-h,  h,  h),
        (-h, -h, -h), ( h, -h, -h), ( h,  h, -h), (-h,  h, -h),
    ] {
        mesh.add_vertex(Vec3::new(x, y, z));
    }
    for face in [
        [0, 1, 2, 3], // +Z
        [5, 4, 7, 6], // -Z
        [4, 0, 3, 7], // -X
        [1, 5, 6, 2], // +X
        [3, 2, 6, 7], // +Y
        [4, 5, 1, 0], // -Y
    ] {
        mesh.add_face(face.to_vec());
    }
    mesh
}

// ============================================================================
// TRIANGULATION + FLAT NORMALS
// ============================================================================

/// Convert a PolyMesh to a RenderMesh with one normal per face.
///
/// Vertices are duplicated per face so hard edges stay crisp; each face is
/// fan-triangulated from its first vertex.
pub fn triangulate_flat(poly: &PolyMesh) -> RenderMesh {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in &poly.faces {
        let n = face.len();
        let a = poly.positions[face[0]];
        let b = poly.positions[face[1]];
        let c = poly.positions[face[2]];
        let normal = (b - a).cross(c - a).normalize_or_zero().to_array();

        let base = vertices.len() as u32;
        for &vi in face {
            vertices.push(GpuVertex {
                position: poly.positions[vi].to_array(),
                normal,
            });
        }
        for i in 1..(n as u32 - 1) {
            indices.extend_from_slice(&[base, base + i, base + i + 1]);
        }
    }

    RenderMesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prism_faces_point_outward() {
        let mesh = triangulate_flat(&hex_prism());
        // 2 hexagons (4 tris each) + 6 quads (2 tris each)
        assert_eq!(mesh.index_count(), (2 * 4 + 6 * 2) * 3);

        let top = mesh.vertices[0];
        assert!(top.normal[1] > 0.999);
        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            let n = Vec3::from(v.normal);
            let centre = Vec3::new(0.0, -0.5, 0.0);
            assert!((p - centre).dot(n) > 0.0, "inward normal at {p:?}");
        }
    }

    #[test]
    fn box_faces_point_outward() {
        let mesh = triangulate_flat(&unit_box());
        assert_eq!(mesh.vertices.len(), 24);
        for v in &mesh.vertices {
            assert!(Vec3::from(v.position).dot(Vec3::from(v.normal)) > 0.0);
        }
    }
}
