use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use bytemuck::Pod;

use crate::device::GpuContext;
use crate::device::fatal::{terminate, FatalError};

use super::handle::Handle;
use super::reflect::{self, LinkError, LinkedInterface, ResourceKind, ScalarClass, UniformShape};
use super::texture::Texture;
use super::vertex_array::VertexArray;

// ── errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ProgramError {
    Read { path: String, reason: String },
    /// Either log may be empty when only one stage failed.
    Compile { vertex_log: String, fragment_log: String },
    Link(LinkError),
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Read { path, reason } => write!(f, "could not read {path}: {reason}"),
            ProgramError::Compile { vertex_log, fragment_log } => {
                write!(f, "compile failed\nvertex:\n{vertex_log}\nfragment:\n{fragment_log}")
            }
            ProgramError::Link(e) => write!(f, "link failed: {e}"),
        }
    }
}

impl std::error::Error for ProgramError {}

impl From<ProgramError> for FatalError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::Read { path, reason } => FatalError::ShaderRead { path, reason },
            ProgramError::Compile { vertex_log, fragment_log } => {
                FatalError::ShaderCompile { vertex_log, fragment_log }
            }
            ProgramError::Link(e) => FatalError::ProgramLink { log: e.to_string() },
        }
    }
}

// ── uniforms ──────────────────────────────────────────────────────────────

/// Resolved uniform slot; `NONE` when the name did not resolve.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation(pub i32);

impl UniformLocation {
    pub const NONE: UniformLocation = UniformLocation(-1);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 < 0
    }
}

/// Host value that can be written into a uniform of matching shape.
pub trait UniformValue: Pod {
    const SHAPE: UniformShape;
}

macro_rules! uniform_value {
    ($($ty:ty => $shape:expr),* $(,)?) => {
        $(impl UniformValue for $ty { const SHAPE: UniformShape = $shape; })*
    };
}

uniform_value! {
    f32 => UniformShape::Scalar(ScalarClass::Float),
    i32 => UniformShape::Scalar(ScalarClass::Sint),
    u32 => UniformShape::Scalar(ScalarClass::Uint),
    [f32; 2] => UniformShape::Vector(ScalarClass::Float, 2),
    [i32; 2] => UniformShape::Vector(ScalarClass::Sint, 2),
    [u32; 2] => UniformShape::Vector(ScalarClass::Uint, 2),
    [f32; 3] => UniformShape::Vector(ScalarClass::Float, 3),
    [f32; 4] => UniformShape::Vector(ScalarClass::Float, 4),
    [i32; 4] => UniformShape::Vector(ScalarClass::Sint, 4),
    [u32; 4] => UniformShape::Vector(ScalarClass::Uint, 4),
}

enum Slot {
    Member { name: String, block: usize, offset: usize, shape: UniformShape },
    /// Texture resource; `index` selects its entry in the unit table.
    Texture { name: String, index: usize },
}

impl Slot {
    fn name(&self) -> &str {
        match self {
            Slot::Member { name, .. } | Slot::Texture { name, .. } => name,
        }
    }
}

struct UniformBlock {
    binding: u32,
    shadow: RefCell<Vec<u8>>,
    dirty: Cell<bool>,
    buffer: wgpu::Buffer,
}

// ── pipeline state ────────────────────────────────────────────────────────

/// Fixed-function state of one draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct DrawState {
    /// Less-than depth test with depth writes; otherwise always pass, no writes.
    pub depth_test: bool,
    /// Source-over blending on alpha.
    pub alpha_blend: bool,
    pub cull_back_faces: bool,
}

impl DrawState {
    pub const OPAQUE: DrawState = DrawState {
        depth_test: false,
        alpha_blend: false,
        cull_back_faces: false,
    };

    /// Depth-tested, alpha-blended, both faces.
    pub const COMPOSITE: DrawState = DrawState {
        depth_test: true,
        alpha_blend: true,
        cull_back_faces: false,
    };
}

impl Default for DrawState {
    fn default() -> Self {
        DrawState::OPAQUE
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    color: wgpu::TextureFormat,
    depth: Option<wgpu::TextureFormat>,
    state: DrawState,
    buffers: Vec<(u64, wgpu::VertexStepMode, Vec<wgpu::VertexAttribute>)>,
}

// ── program ───────────────────────────────────────────────────────────────

struct RawProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    interface: LinkedInterface,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    slots: Vec<Slot>,
    blocks: Vec<UniformBlock>,
    units: RefCell<Vec<u32>>,
    pipelines: RefCell<HashMap<PipelineKey, wgpu::RenderPipeline>>,
}

/// Linked vertex + fragment stage pair with its uniform storage.
///
/// Uniform writes land in a CPU shadow and are uploaded right before the next
/// draw that uses the program. Pipelines are built per target format and
/// draw state on first use.
pub struct Program {
    handle: Handle,
    raw: Option<RawProgram>,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            handle: Handle::NONE,
            raw: None,
        }
    }
}

impl Program {
    /// Builds a program from two WGSL files, terminating the process on failure.
    pub fn new(ctx: &GpuContext, vertex_path: impl AsRef<Path>, fragment_path: impl AsRef<Path>) -> Self {
        let built = read_source(vertex_path.as_ref())
            .and_then(|vs| Ok((vs, read_source(fragment_path.as_ref())?)))
            .and_then(|(vs, fs)| Self::from_sources(ctx, &vs, &fs));
        match built {
            Ok(program) => program,
            Err(e) => terminate(e.into()),
        }
    }

    /// Compiles and links two WGSL stages.
    ///
    /// Both stages are always compiled so that a failure reports every log.
    pub fn from_sources(ctx: &GpuContext, vertex_src: &str, fragment_src: &str) -> Result<Self, ProgramError> {
        let vs = reflect::compile(vertex_src);
        let fs = reflect::compile(fragment_src);
        let (vs, fs) = match (vs, fs) {
            (Ok(vs), Ok(fs)) => (vs, fs),
            (vs, fs) => {
                return Err(ProgramError::Compile {
                    vertex_log: vs.err().unwrap_or_default(),
                    fragment_log: fs.err().unwrap_or_default(),
                });
            }
        };
        let interface = reflect::link(&vs, &fs).map_err(ProgramError::Link)?;

        let handle = Handle::allocate();
        let raw = RawProgram::new(ctx, handle, vertex_src, fragment_src, interface);
        log::debug!("program {handle} linked ({} uniform slots)", raw.slots.len());

        Ok(Self {
            handle,
            raw: Some(raw),
        })
    }

    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn interface(&self) -> Option<&LinkedInterface> {
        self.raw.as_ref().map(|r| &r.interface)
    }

    /// Resolves a uniform member or texture name.
    ///
    /// Unknown names are logged and yield [`UniformLocation::NONE`].
    pub fn get_uniform(&self, name: &str) -> UniformLocation {
        let found = self
            .raw
            .as_ref()
            .and_then(|r| r.slots.iter().position(|s| s.name() == name));
        match found {
            Some(i) => UniformLocation(i as i32),
            None => {
                log::warn!("could not find uniform {name} on program {}", self.handle);
                UniformLocation::NONE
            }
        }
    }

    /// Writes `value` to the uniform at `location`.
    ///
    /// `NONE` is ignored. Writing an integer to a texture assigns its unit.
    pub fn set_uniform<T: UniformValue>(&self, location: UniformLocation, value: T) {
        if location.is_none() {
            return;
        }
        let Some(raw) = self.raw.as_ref() else { return };
        let Some(slot) = raw.slots.get(location.0 as usize) else {
            log::warn!("uniform location {} out of range on program {}", location.0, self.handle);
            return;
        };

        match slot {
            Slot::Member { name, block, offset, shape } => {
                if *shape != T::SHAPE {
                    log::warn!("uniform {name} is {shape:?}, not {:?}", T::SHAPE);
                    return;
                }
                let bytes = bytemuck::bytes_of(&value);
                let block = &raw.blocks[*block];
                block.shadow.borrow_mut()[*offset..*offset + bytes.len()].copy_from_slice(bytes);
                block.dirty.set(true);
            }
            Slot::Texture { name, index } => {
                let unit = match T::SHAPE {
                    UniformShape::Scalar(ScalarClass::Sint) | UniformShape::Scalar(ScalarClass::Uint) => {
                        let b = bytemuck::bytes_of(&value);
                        i32::from_ne_bytes([b[0], b[1], b[2], b[3]])
                    }
                    other => {
                        log::warn!("texture {name} takes a unit index, not {other:?}");
                        return;
                    }
                };
                if unit < 0 {
                    log::warn!("texture {name}: negative unit {unit}");
                    return;
                }
                raw.units.borrow_mut()[*index] = unit as u32;
            }
        }
    }

    /// Uploads pending uniform writes.
    pub(crate) fn flush_uniforms(&self, ctx: &GpuContext) {
        let Some(raw) = self.raw.as_ref() else { return };
        for block in &raw.blocks {
            if block.dirty.replace(false) {
                ctx.queue().write_buffer(&block.buffer, 0, &block.shadow.borrow());
            }
        }
    }

    /// Checks that `vertices` feeds every stage input with a matching class.
    pub(crate) fn check_vertex_inputs(&self, vertices: &VertexArray) -> Result<(), String> {
        let Some(raw) = self.raw.as_ref() else {
            return Err(format!("program {} has no GPU object", self.handle));
        };
        let supplied: Vec<wgpu::VertexAttribute> =
            vertices.attribute_sets().into_iter().flatten().collect();

        for (location, shape) in &raw.interface.vertex_inputs {
            let Some(attr) = supplied.iter().find(|a| a.shader_location == *location) else {
                return Err(format!("no vertex attribute for input location {location}"));
            };
            let wanted = match shape {
                UniformShape::Scalar(c) | UniformShape::Vector(c, _) => *c,
                _ => continue,
            };
            if reflect::vertex_format_class(attr.format) != wanted {
                return Err(format!(
                    "vertex attribute {:?} cannot feed input location {location}",
                    attr.format
                ));
            }
        }
        Ok(())
    }

    /// Bind group for the current uniforms and the textures on their units.
    pub(crate) fn bind_group(&self, ctx: &GpuContext, textures: &[&Texture]) -> Result<wgpu::BindGroup, String> {
        let Some(raw) = self.raw.as_ref() else {
            return Err(format!("program {} has no GPU object", self.handle));
        };
        let units = raw.units.borrow();

        let mut texture_index = 0;
        let mut entries = Vec::with_capacity(raw.interface.resources.len());
        for res in &raw.interface.resources {
            let resource = match &res.kind {
                ResourceKind::Uniform { .. } => {
                    let Some(block) = raw.blocks.iter().find(|b| b.binding == res.binding) else {
                        return Err(format!("uniform block {} missing", res.name));
                    };
                    block.buffer.as_entire_binding()
                }
                ResourceKind::Texture { depth } => {
                    let unit = units[texture_index] as usize;
                    texture_index += 1;
                    let Some(tex) = textures.get(unit) else {
                        return Err(format!("texture {} reads unit {unit}, none bound", res.name));
                    };
                    if tex.format().is_depth() != *depth {
                        return Err(format!("texture {} cannot sample {:?}", res.name, tex.format()));
                    }
                    let Some(view) = tex.view() else {
                        return Err(format!("texture on unit {unit} has no storage"));
                    };
                    wgpu::BindingResource::TextureView(view)
                }
                ResourceKind::Sampler { .. } => wgpu::BindingResource::Sampler(&raw.sampler),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: res.binding,
                resource,
            });
        }

        Ok(ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mandel program bind group"),
            layout: &raw.bind_group_layout,
            entries: &entries,
        }))
    }

    /// Pipeline for drawing `vertices` into the given attachment formats.
    pub(crate) fn pipeline(
        &self,
        ctx: &GpuContext,
        color: wgpu::TextureFormat,
        depth: Option<wgpu::TextureFormat>,
        state: DrawState,
        vertices: &VertexArray,
    ) -> Option<wgpu::RenderPipeline> {
        let raw = self.raw.as_ref()?;
        let sets = vertices.attribute_sets();
        let layouts = vertices.layouts(&sets);

        let key = PipelineKey {
            color,
            depth,
            state,
            buffers: layouts
                .iter()
                .map(|l| (l.array_stride, l.step_mode, l.attributes.to_vec()))
                .collect(),
        };

        let pipeline = raw
            .pipelines
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| {
                log::debug!("program {}: building pipeline for {color:?}/{depth:?} {state:?}", self.handle);
                raw.build_pipeline(ctx, color, depth, state, &layouts)
            })
            .clone();
        Some(pipeline)
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            for block in &raw.blocks {
                block.buffer.destroy();
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String, ProgramError> {
    std::fs::read_to_string(path).map_err(|e| ProgramError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

impl RawProgram {
    fn new(ctx: &GpuContext, handle: Handle, vertex_src: &str, fragment_src: &str, interface: LinkedInterface) -> Self {
        let device = ctx.device();

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mandel vertex stage"),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mandel fragment stage"),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });

        let mut layout_entries = Vec::new();
        let mut slots = Vec::new();
        let mut blocks = Vec::new();
        let mut texture_count = 0;

        for res in &interface.resources {
            let ty = match &res.kind {
                ResourceKind::Uniform { size, members } => {
                    // Uniform buffers are sized in 16-byte steps.
                    let padded = (u64::from(*size).max(16) + 15) & !15;
                    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some("mandel uniform buffer"),
                        size: padded,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    });
                    let block = blocks.len();
                    for m in members {
                        slots.push(Slot::Member {
                            name: m.name.clone(),
                            block,
                            offset: m.offset as usize,
                            shape: m.shape,
                        });
                    }
                    blocks.push(UniformBlock {
                        binding: res.binding,
                        shadow: RefCell::new(vec![0; padded as usize]),
                        dirty: Cell::new(true),
                        buffer,
                    });
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(u64::from(*size)),
                    }
                }
                ResourceKind::Texture { depth } => {
                    slots.push(Slot::Texture {
                        name: res.name.clone(),
                        index: texture_count,
                    });
                    texture_count += 1;
                    wgpu::BindingType::Texture {
                        sample_type: if *depth {
                            wgpu::TextureSampleType::Depth
                        } else {
                            wgpu::TextureSampleType::Float { filterable: true }
                        },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    }
                }
                ResourceKind::Sampler { comparison } => wgpu::BindingType::Sampler(if *comparison {
                    wgpu::SamplerBindingType::Comparison
                } else {
                    wgpu::SamplerBindingType::Filtering
                }),
            };
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: res.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty,
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mandel program bgl"),
            entries: &layout_entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mandel program pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("mandel program sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        log::trace!("program {handle}: {} bindings", layout_entries.len());

        Self {
            vertex,
            fragment,
            interface,
            bind_group_layout,
            pipeline_layout,
            sampler,
            slots,
            blocks,
            units: RefCell::new(vec![0; texture_count]),
            pipelines: RefCell::new(HashMap::new()),
        }
    }

    fn build_pipeline(
        &self,
        ctx: &GpuContext,
        color: wgpu::TextureFormat,
        depth: Option<wgpu::TextureFormat>,
        state: DrawState,
        buffers: &[wgpu::VertexBufferLayout<'_>],
    ) -> wgpu::RenderPipeline {
        let blend = state.alpha_blend.then(|| {
            let over = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            };
            wgpu::BlendState { color: over, alpha: over }
        });

        let depth_stencil = depth.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: state.depth_test,
            depth_compare: if state.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        ctx.device().create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mandel program pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex,
                entry_point: Some(&self.interface.vertex_entry),
                compilation_options: Default::default(),
                buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment,
                entry_point: Some(&self.interface.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: state.cull_back_faces.then_some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fatal::{child_exit_code, is_fatal_child};
    use crate::device::test_context;

    const VS: &str = r#"
struct Params {
    center: vec2<f32>,
    zoom: f32,
    steps: u32,
};
@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos * params.zoom + params.center, 0.0, 1.0);
}
"#;

    const FS: &str = r#"
@group(0) @binding(0) var<uniform> params: Params;
struct Params {
    center: vec2<f32>,
    zoom: f32,
    steps: u32,
};

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(params.zoom, f32(params.steps), 0.0, 1.0);
}
"#;

    #[test]
    fn compile_failure_reports_both_stages() {
        let Some(ctx) = test_context() else { return };
        let err = Program::from_sources(&ctx, "nope", "also nope").err().unwrap();
        let ProgramError::Compile { vertex_log, fragment_log } = err else {
            panic!("expected a compile error");
        };
        assert!(!vertex_log.is_empty());
        assert!(!fragment_log.is_empty());
    }

    #[test]
    fn link_failure_maps_to_link_exit_code() {
        let Some(ctx) = test_context() else { return };
        let err = Program::from_sources(&ctx, FS, FS).err().unwrap();
        assert!(matches!(err, ProgramError::Link(LinkError::MissingEntryPoint { .. })));
        assert_eq!(FatalError::from(err).exit_code(), 4);
    }

    #[test]
    fn unknown_uniform_resolves_to_none_and_writes_are_ignored() {
        let Some(ctx) = test_context() else { return };
        let program = Program::from_sources(&ctx, VS, FS).unwrap();

        let missing = program.get_uniform("does_not_exist");
        assert_eq!(missing, UniformLocation::NONE);
        program.set_uniform(missing, 1.0f32);

        let zoom = program.get_uniform("zoom");
        let steps = program.get_uniform("steps");
        assert!(!zoom.is_none());
        assert_ne!(zoom, steps);
    }

    #[test]
    fn uniform_writes_land_in_the_shadow_at_member_offsets() {
        let Some(ctx) = test_context() else { return };
        let program = Program::from_sources(&ctx, VS, FS).unwrap();

        program.set_uniform(program.get_uniform("zoom"), 0.5f32);
        program.set_uniform(program.get_uniform("steps"), 1024u32);
        // Shape mismatch is ignored.
        program.set_uniform(program.get_uniform("center"), 3.0f32);

        let raw = program.raw.as_ref().unwrap();
        let shadow = raw.blocks[0].shadow.borrow();
        assert_eq!(&shadow[8..12], &0.5f32.to_ne_bytes());
        assert_eq!(&shadow[12..16], &1024u32.to_ne_bytes());
        assert_eq!(&shadow[0..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn moved_from_program_owns_nothing() {
        let Some(ctx) = test_context() else { return };
        let mut program = Program::from_sources(&ctx, VS, FS).unwrap();
        let handle = program.handle();
        let moved = std::mem::take(&mut program);
        assert_eq!(moved.handle(), handle);
        assert!(program.handle().is_none());
        assert_eq!(program.get_uniform("zoom"), UniformLocation::NONE);
    }

    #[test]
    fn bad_shader_source_exits_with_compile_code() {
        const TEST: &str = "gpu::program::tests::bad_shader_source_exits_with_compile_code";
        let Some(ctx) = test_context() else { return };
        let vs = std::env::temp_dir().join("mandel-bad-compile.vert.wgsl");
        let fs = std::env::temp_dir().join("mandel-bad-compile.frag.wgsl");
        if is_fatal_child(TEST) {
            let _program = Program::new(&ctx, &vs, &fs);
            return;
        }
        drop(ctx);
        std::fs::write(&vs, "@vertex fn vs_main( {").unwrap();
        std::fs::write(&fs, FS).unwrap();
        let code = child_exit_code(TEST);
        let _ = std::fs::remove_file(&vs);
        let _ = std::fs::remove_file(&fs);
        assert_eq!(code, Some(3));
    }

    #[test]
    fn missing_shader_file_exits_with_read_code() {
        const TEST: &str = "gpu::program::tests::missing_shader_file_exits_with_read_code";
        let Some(ctx) = test_context() else { return };
        if is_fatal_child(TEST) {
            let _program = Program::new(&ctx, "/nonexistent/a.wgsl", "/nonexistent/b.wgsl");
            return;
        }
        drop(ctx);
        assert_eq!(child_exit_code(TEST), Some(2));
    }
}
