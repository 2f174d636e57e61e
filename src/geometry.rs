//! Staging arrays handed from a generator to the GPU.
//!
//! Each stream is a tightly packed `Vec` so a single `bytemuck::cast_slice`
//! yields the bytes for one upload.

use std::mem;

use crate::error::GeneratorError;

pub type Vec3 = [f32; 3];

pub const VERTEX_STRIDE: usize = mem::size_of::<Vec3>();
pub const ATTRIBUTE_STRIDE: usize = mem::size_of::<Vec3>();
pub const DATA_STRIDE: usize = mem::size_of::<f32>();
pub const INDEX_STRIDE: usize = mem::size_of::<u32>();

/// Vertex, attribute, data and index streams of one model.
///
/// `attributes` is only filled by the wave generator (attribute B in GPU mode,
/// RGB in CPU mode) and `data` only by the cloud generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBuffers {
    vertices: Vec<Vec3>,
    attributes: Vec<Vec3>,
    data: Vec<f32>,
    indices: Vec<u32>,
}

impl GeometryBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            attributes: Vec::new(),
            data: Vec::new(),
            indices: Vec::with_capacity(vertices),
        }
    }

    pub fn reset(&mut self) {
        self.vertices.clear();
        self.attributes.clear();
        self.data.clear();
        self.indices.clear();
    }

    pub fn push_vertex(&mut self, v: Vec3) {
        self.vertices.push(v);
    }

    pub fn push_attribute(&mut self, a: Vec3) {
        self.attributes.push(a);
    }

    pub fn push_data(&mut self, f: f32) {
        self.data.push(f);
    }

    pub fn push_index(&mut self, i: u32) {
        self.indices.push(i);
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn attributes(&self) -> &[Vec3] {
        &self.attributes
    }

    /// Vertex and attribute streams, borrowed together for in-place rewrites.
    pub fn streams_mut(&mut self) -> (&mut [Vec3], &mut [Vec3]) {
        (&mut self.vertices, &mut self.attributes)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Replaces the index stream, keeping every other stream untouched.
    pub fn replace_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn attribute_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.attributes)
    }

    pub fn data_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn vertex_size(&self) -> usize {
        self.vertex_count() * VERTEX_STRIDE
    }

    pub fn attribute_size(&self) -> usize {
        self.attribute_count() * ATTRIBUTE_STRIDE
    }

    pub fn data_size(&self) -> usize {
        self.data_count() * DATA_STRIDE
    }

    pub fn index_size(&self) -> usize {
        self.index_count() * INDEX_STRIDE
    }

    /// Checks the cross-stream invariants before the buffers are published.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        let vertex_count = self.vertex_count();

        for (stream, count) in [("data", self.data_count()), ("attributes", self.attribute_count())] {
            if count != 0 && count != vertex_count {
                return Err(GeneratorError::CountMismatch {
                    stream,
                    count,
                    vertex_count,
                });
            }
        }

        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, i)| **i as usize >= vertex_count)
        {
            return Err(GeneratorError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            });
        }

        if let Some(position) = self
            .vertices
            .iter()
            .position(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(GeneratorError::NonFinite { position });
        }

        Ok(())
    }

    /// [`validate`](Self::validate) plus the point-list rule: every vertex is
    /// drawn at most once, so there are never more indices than vertices.
    pub fn validate_points(&self) -> Result<(), GeneratorError> {
        self.validate()?;
        if self.index_count() > self.vertex_count() {
            return Err(GeneratorError::TooManyIndices {
                index_count: self.index_count(),
                vertex_count: self.vertex_count(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_have_no_padding() {
        assert_eq!(VERTEX_STRIDE, 12);
        assert_eq!(ATTRIBUTE_STRIDE, 12);
        assert_eq!(DATA_STRIDE, 4);
        assert_eq!(INDEX_STRIDE, 4);
    }

    #[test]
    fn test_sizes_follow_counts() {
        let mut buffers = GeometryBuffers::new();
        buffers.push_vertex([1.0, 2.0, 3.0]);
        buffers.push_vertex([4.0, 5.0, 6.0]);
        buffers.push_data(0.5);
        buffers.push_data(0.25);
        buffers.push_index(1);

        assert_eq!(buffers.vertex_size(), 24);
        assert_eq!(buffers.vertex_bytes().len(), 24);
        assert_eq!(buffers.data_size(), 8);
        assert_eq!(buffers.index_size(), 4);
        assert_eq!(&buffers.vertex_bytes()[12..16], &4.0f32.to_ne_bytes());

        buffers.reset();
        assert_eq!(buffers.vertex_count(), 0);
        assert_eq!(buffers.data_count(), 0);
        assert_eq!(buffers.index_count(), 0);
    }

    #[test]
    fn test_validate() {
        let mut buffers = GeometryBuffers::new();
        buffers.push_vertex([0.0; 3]);
        buffers.push_vertex([1.0; 3]);
        buffers.push_index(0);
        buffers.push_index(1);
        assert!(buffers.validate().is_ok());

        buffers.replace_indices(vec![2]);
        assert!(matches!(
            buffers.validate(),
            Err(GeneratorError::IndexOutOfRange { index: 2, .. })
        ));

        buffers.replace_indices(vec![0]);
        buffers.push_data(1.0);
        assert!(matches!(
            buffers.validate(),
            Err(GeneratorError::CountMismatch { stream: "data", .. })
        ));

        let mut bad = GeometryBuffers::new();
        bad.push_vertex([f32::NAN, 0.0, 0.0]);
        assert_eq!(bad.validate(), Err(GeneratorError::NonFinite { position: 0 }));
    }

    #[test]
    fn test_line_lists_may_reuse_vertices() {
        let mut buffers = GeometryBuffers::new();
        buffers.push_vertex([0.0; 3]);
        buffers.push_vertex([1.0; 3]);
        for index in [0, 1, 1, 0] {
            buffers.push_index(index);
        }
        assert!(buffers.validate().is_ok());
        assert!(matches!(
            buffers.validate_points(),
            Err(GeneratorError::TooManyIndices {
                index_count: 4,
                vertex_count: 2
            })
        ));
    }
}
