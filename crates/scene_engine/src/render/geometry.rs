//! Procedural shapes
//!
//! Builders return [`PrimitiveData`]; the `*_primitive` helpers go through a
//! [`PrimitiveManager`] with a key derived from the dimensions, so identical
//! shapes share one upload.

use std::sync::Arc;

use crate::foundation::math::Vec3;
use crate::render::primitive::{Primitive, PrimitiveData, PrimitiveManager};
use crate::render::RenderResult;

/// Cache key of a plane
pub fn plane_key(start_x: f32, start_y: f32, end_x: f32, end_y: f32) -> String {
    format!("plane_{start_x}_{start_y}_{end_x}_{end_y}")
}

/// Cache key of a cuboid
pub fn cuboid_key(width: f32, height: f32, depth: f32) -> String {
    format!("box_{width}_{height}_{depth}")
}

/// Axis-aligned rectangle in the XY plane facing −Z
pub fn plane(start_x: f32, start_y: f32, end_x: f32, end_y: f32) -> PrimitiveData {
    let corners = [
        Vec3::new(start_x, start_y, 0.0),
        Vec3::new(end_x, start_y, 0.0),
        Vec3::new(end_x, end_y, 0.0),
        Vec3::new(start_x, end_y, 0.0),
    ];

    let mut data = PrimitiveData::default();
    for corner in corners {
        data.vertices.extend_from_slice(corner.as_slice());
        data.normals.extend_from_slice(&[0.0, 0.0, -1.0]);
    }
    data.tex_coords[0] = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    data.indices = vec![0, 1, 2, 0, 2, 3];
    data
}

/// Box centred on the origin with one quad per face
///
/// Faces do not share vertices so each carries its own normal and UVs.
pub fn cuboid(width: f32, height: f32, depth: f32) -> PrimitiveData {
    let (hw, hh, hd) = (width / 2.0, height / 2.0, depth / 2.0);

    // bottom corners p1..p4, top corners p5..p8
    let p = [
        Vec3::new(-hw, -hh, -hd),
        Vec3::new(hw, -hh, -hd),
        Vec3::new(hw, -hh, hd),
        Vec3::new(-hw, -hh, hd),
        Vec3::new(-hw, hh, -hd),
        Vec3::new(hw, hh, -hd),
        Vec3::new(hw, hh, hd),
        Vec3::new(-hw, hh, hd),
    ];

    // corner indices, normal, uvs and the two triangles of each face
    let faces: [([usize; 4], [f32; 3], [f32; 8], [u32; 6]); 6] = [
        ([0, 1, 2, 3], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0], [0, 1, 3, 2, 3, 1]),
        ([4, 5, 6, 7], [0.0, 1.0, 0.0], [0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0], [0, 3, 1, 2, 1, 3]),
        ([7, 3, 2, 6], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0], [0, 1, 2, 2, 3, 0]),
        ([4, 5, 1, 0], [0.0, 0.0, -1.0], [1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0], [0, 1, 2, 2, 3, 0]),
        ([5, 6, 2, 1], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0], [0, 1, 2, 2, 3, 0]),
        ([7, 4, 0, 3], [-1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0], [0, 1, 2, 2, 3, 0]),
    ];

    let mut data = PrimitiveData::default();
    for (face, (corners, normal, uvs, triangles)) in faces.iter().enumerate() {
        let base = u32::try_from(face * 4).unwrap_or(u32::MAX);
        for corner in corners {
            data.vertices.extend_from_slice(p[*corner].as_slice());
            data.normals.extend_from_slice(normal);
        }
        data.tex_coords[0].extend_from_slice(uvs);
        data.indices.extend(triangles.iter().map(|i| base + i));
    }
    data
}

/// Plane uploaded through the cache
pub fn plane_primitive(
    primitives: &PrimitiveManager,
    start_x: f32,
    start_y: f32,
    end_x: f32,
    end_y: f32,
) -> RenderResult<Arc<Primitive>> {
    let key = plane_key(start_x, start_y, end_x, end_y);
    if let Some(existing) = primitives.find(&key) {
        return Ok(existing);
    }
    primitives.insert(&key, &plane(start_x, start_y, end_x, end_y))
}

/// Cuboid uploaded through the cache
pub fn cuboid_primitive(primitives: &PrimitiveManager, width: f32, height: f32, depth: f32) -> RenderResult<Arc<Primitive>> {
    let key = cuboid_key(width, height, depth);
    if let Some(existing) = primitives.find(&key) {
        return Ok(existing);
    }
    primitives.insert(&key, &cuboid(width, height, depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::GraphicsDevice;
    use crate::render::headless::HeadlessDevice;
    use crate::render::primitive::PrimitiveFactory;

    #[test]
    fn test_plane_layout() {
        let data = plane(-1.0, -1.0, 1.0, 1.0);
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.face_count(), 2);
        assert_eq!(data.validate("plane"), 0);
        assert_eq!(&data.normals[0..3], &[0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_cuboid_layout() {
        let data = cuboid(2.0, 4.0, 6.0);
        assert_eq!(data.vertex_count(), 24);
        assert_eq!(data.indices.len(), 36);
        assert_eq!(data.validate("box"), 0);
        assert!(data.indices.iter().all(|&i| i < 24));

        let max_y = data.vertices.chunks(3).map(|v| v[1]).fold(f32::MIN, f32::max);
        assert_eq!(max_y, 2.0);
    }

    #[test]
    fn test_cuboid_normals_point_outwards() {
        let data = cuboid(1.0, 1.0, 1.0);
        for (position, normal) in data.vertices.chunks(3).zip(data.normals.chunks(3)) {
            let dot: f32 = position.iter().zip(normal).map(|(p, n)| p * n).sum();
            assert!(dot > 0.0);
        }
    }

    #[test]
    fn test_identical_shapes_share_a_primitive() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
        let primitives = PrimitiveManager::new(PrimitiveFactory::new(device));

        let a = cuboid_primitive(&primitives, 1.0, 2.0, 3.0).unwrap();
        let b = cuboid_primitive(&primitives, 1.0, 2.0, 3.0).unwrap();
        let c = cuboid_primitive(&primitives, 1.0, 2.0, 4.0).unwrap();
        plane_primitive(&primitives, 0.0, 0.0, 1.0, 1.0).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(primitives.keys(), vec!["box_1_2_3", "box_1_2_4", "plane_0_0_1_1"]);
    }
}
