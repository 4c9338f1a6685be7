use super::buffer::VertexBuffer;
use super::handle::Handle;

/// Ordered set of vertex buffers consumed together by one draw.
///
/// Shader locations are assigned in declaration order across all buffers:
/// the first attribute of buffer `n` follows the last attribute of buffer
/// `n - 1`. Owned buffers are released before the array itself.
pub struct VertexArray {
    handle: Handle,
    buffers: Vec<VertexBuffer>,
}

impl Default for VertexArray {
    fn default() -> Self {
        Self {
            handle: Handle::NONE,
            buffers: Vec::new(),
        }
    }
}

impl VertexArray {
    pub fn new() -> Self {
        Self {
            handle: Handle::allocate(),
            buffers: Vec::new(),
        }
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Appends an empty buffer and returns its index.
    pub fn add_vertex_buffer(&mut self, stride: u32, divisor: u32) -> usize {
        self.buffers.push(VertexBuffer::new(stride, divisor));
        self.buffers.len() - 1
    }

    pub fn buffer(&self, index: usize) -> Option<&VertexBuffer> {
        self.buffers.get(index)
    }

    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut VertexBuffer> {
        self.buffers.get_mut(index)
    }

    pub fn buffers(&self) -> &[VertexBuffer] {
        &self.buffers
    }

    /// Number of vertices a non-instanced draw can read.
    pub fn vertex_count(&self) -> u32 {
        self.buffers
            .iter()
            .filter(|b| !b.is_instanced())
            .map(VertexBuffer::count)
            .min()
            .unwrap_or(0)
    }

    /// Number of instances the instanced buffers can feed, 1 without any.
    pub fn instance_count(&self) -> u32 {
        self.buffers
            .iter()
            .filter(|b| b.is_instanced())
            .map(VertexBuffer::count)
            .min()
            .unwrap_or(1)
    }

    /// Validates every buffer layout, naming the first offender.
    pub fn validate(&self) -> Result<(), String> {
        for (i, buffer) in self.buffers.iter().enumerate() {
            if buffer.raw().is_none() {
                return Err(format!("vertex buffer {i} has no data"));
            }
            buffer
                .validate()
                .map_err(|e| format!("vertex buffer {i}: {e}"))?;
        }
        Ok(())
    }

    /// Attribute lists per buffer, with locations running across buffers.
    pub(crate) fn attribute_sets(&self) -> Vec<Vec<wgpu::VertexAttribute>> {
        let mut base = 0;
        self.buffers
            .iter()
            .map(|b| {
                let attrs = b.wgpu_attributes(base);
                base += b.attribs().len() as u32;
                attrs
            })
            .collect()
    }

    /// Buffer layouts borrowing the attribute lists from `attribute_sets`.
    pub(crate) fn layouts<'a>(
        &self,
        sets: &'a [Vec<wgpu::VertexAttribute>],
    ) -> Vec<wgpu::VertexBufferLayout<'a>> {
        self.buffers
            .iter()
            .zip(sets)
            .map(|(b, attrs)| wgpu::VertexBufferLayout {
                array_stride: u64::from(b.stride()),
                step_mode: b.step_mode(),
                attributes: attrs,
            })
            .collect()
    }

    /// Binds every buffer to its slot in `pass`.
    pub(crate) fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        for (slot, buffer) in self.buffers.iter().enumerate() {
            if let Some(raw) = buffer.raw() {
                pass.set_vertex_buffer(slot as u32, raw.slice(..));
            }
        }
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::AttribType;

    #[test]
    fn locations_continue_across_buffers() {
        let mut vao = VertexArray::new();
        let a = vao.add_vertex_buffer(16, 0);
        let b = vao.add_vertex_buffer(8, 1);
        assert_eq!((a, b), (0, 1));

        let first = vao.buffer_mut(a).unwrap();
        first.add_attrib(2, AttribType::Float);
        first.add_attrib(2, AttribType::Float);
        vao.buffer_mut(b).unwrap().add_attrib(2, AttribType::Float);

        let sets = vao.attribute_sets();
        let locations: Vec<Vec<u32>> = sets
            .iter()
            .map(|s| s.iter().map(|a| a.shader_location).collect())
            .collect();
        assert_eq!(locations, vec![vec![0, 1], vec![2]]);

        let layouts = vao.layouts(&sets);
        assert_eq!(layouts[1].step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(layouts[0].array_stride, 16);
    }

    #[test]
    fn missing_buffer_index_is_none() {
        let vao = VertexArray::new();
        assert!(vao.buffer(0).is_none());
    }

    #[test]
    fn counts_without_data() {
        let mut vao = VertexArray::new();
        assert_eq!(vao.vertex_count(), 0);
        assert_eq!(vao.instance_count(), 1);
        vao.add_vertex_buffer(8, 0);
        assert!(vao.validate().is_err());
    }

    #[test]
    fn moved_from_array_is_empty() {
        let mut vao = VertexArray::new();
        vao.add_vertex_buffer(8, 0);
        let moved = std::mem::take(&mut vao);
        assert!(vao.handle().is_none());
        assert!(vao.buffers().is_empty());
        assert_eq!(moved.buffers().len(), 1);
    }
}
