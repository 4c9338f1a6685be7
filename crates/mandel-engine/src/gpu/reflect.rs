//! WGSL stage compilation and program interface reflection.
//!
//! Stages are parsed and validated with naga so that diagnostics are
//! available as text before anything reaches the device. Linking pairs a
//! vertex stage with a fragment stage and derives the resource table that
//! uniform lookups resolve against.

use std::fmt;

use naga::valid::{Capabilities, ValidationFlags, Validator};

// ── shapes ────────────────────────────────────────────────────────────────

/// Component class of a scalar, vector or vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarClass {
    Float,
    Sint,
    Uint,
    Bool,
}

/// Type of a uniform member or stage input/output as seen by the host.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformShape {
    Scalar(ScalarClass),
    Vector(ScalarClass, u32),
    Matrix { columns: u32, rows: u32 },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub shape: UniformShape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    /// Uniform buffer of `size` bytes.
    Uniform { size: u32, members: Vec<UniformMember> },
    /// Sampled 2D texture.
    Texture { depth: bool },
    Sampler { comparison: bool },
}

/// One `@group(0) @binding(n)` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Reflected interface of a linked vertex/fragment pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Sorted by binding.
    pub resources: Vec<Resource>,
    pub vertex_inputs: Vec<(u32, UniformShape)>,
    pub fragment_outputs: Vec<(u32, UniformShape)>,
}

// ── errors ────────────────────────────────────────────────────────────────

/// Reasons a compiled vertex/fragment pair cannot form a program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LinkError {
    MissingEntryPoint { stage: &'static str },
    UnsupportedGroup { name: String, group: u32 },
    UnsupportedResource { name: String },
    BindingMismatch { binding: u32 },
    UnmatchedVarying { location: u32 },
    VaryingMismatch { location: u32 },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::MissingEntryPoint { stage } => write!(f, "no @{stage} entry point"),
            LinkError::UnsupportedGroup { name, group } => {
                write!(f, "resource `{name}` uses group {group}; only group 0 is supported")
            }
            LinkError::UnsupportedResource { name } => {
                write!(f, "resource `{name}` has an unsupported type")
            }
            LinkError::BindingMismatch { binding } => {
                write!(f, "stages disagree on the resource at binding {binding}")
            }
            LinkError::UnmatchedVarying { location } => {
                write!(f, "fragment input at location {location} is not written by the vertex stage")
            }
            LinkError::VaryingMismatch { location } => {
                write!(f, "vertex output and fragment input at location {location} differ in type")
            }
        }
    }
}

impl std::error::Error for LinkError {}

// ── compile ───────────────────────────────────────────────────────────────

/// Parses and validates one WGSL stage, returning the diagnostic text on failure.
pub fn compile(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;
    Ok(module)
}

// ── link ──────────────────────────────────────────────────────────────────

pub fn link(vertex: &naga::Module, fragment: &naga::Module) -> Result<LinkedInterface, LinkError> {
    let vs = entry_point(vertex, naga::ShaderStage::Vertex)
        .ok_or(LinkError::MissingEntryPoint { stage: "vertex" })?;
    let fs = entry_point(fragment, naga::ShaderStage::Fragment)
        .ok_or(LinkError::MissingEntryPoint { stage: "fragment" })?;

    let vertex_outputs = outputs(vertex, &vs.function);
    for (location, shape) in inputs(fragment, &fs.function) {
        match vertex_outputs.iter().find(|(l, _)| *l == location) {
            None => return Err(LinkError::UnmatchedVarying { location }),
            Some((_, s)) if *s != shape => return Err(LinkError::VaryingMismatch { location }),
            Some(_) => {}
        }
    }

    let mut merged = resources(vertex)?;
    for r in resources(fragment)? {
        match merged.iter().find(|e| e.binding == r.binding) {
            Some(existing) if *existing != r => {
                return Err(LinkError::BindingMismatch { binding: r.binding });
            }
            Some(_) => {}
            None => merged.push(r),
        }
    }
    merged.sort_by_key(|r| r.binding);

    Ok(LinkedInterface {
        vertex_entry: vs.name.clone(),
        fragment_entry: fs.name.clone(),
        resources: merged,
        vertex_inputs: inputs(vertex, &vs.function),
        fragment_outputs: outputs(fragment, &fs.function),
    })
}

fn entry_point(module: &naga::Module, stage: naga::ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|ep| ep.stage == stage)
}

fn resources(module: &naga::Module) -> Result<Vec<Resource>, LinkError> {
    let mut out = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(rb) = var.binding.as_ref() else { continue };
        let name = var.name.clone().unwrap_or_default();
        if rb.group != 0 {
            return Err(LinkError::UnsupportedGroup { name, group: rb.group });
        }

        let inner = &module.types[var.ty].inner;
        let kind = match (var.space, inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, .. }) => {
                ResourceKind::Uniform {
                    size: inner.size(module.to_ctx()),
                    members: members
                        .iter()
                        .map(|m| UniformMember {
                            name: m.name.clone().unwrap_or_default(),
                            offset: m.offset,
                            shape: shape_of(module, m.ty),
                        })
                        .collect(),
                }
            }
            (naga::AddressSpace::Uniform, _) => ResourceKind::Uniform {
                size: inner.size(module.to_ctx()),
                members: vec![UniformMember {
                    name: name.clone(),
                    offset: 0,
                    shape: shape_of(module, var.ty),
                }],
            },
            (
                naga::AddressSpace::Handle,
                naga::TypeInner::Image {
                    dim: naga::ImageDimension::D2,
                    arrayed: false,
                    class,
                },
            ) => match class {
                naga::ImageClass::Sampled { multi: false, .. } => ResourceKind::Texture { depth: false },
                naga::ImageClass::Depth { multi: false } => ResourceKind::Texture { depth: true },
                _ => return Err(LinkError::UnsupportedResource { name }),
            },
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison }) => {
                ResourceKind::Sampler { comparison: *comparison }
            }
            _ => return Err(LinkError::UnsupportedResource { name }),
        };

        out.push(Resource {
            name,
            binding: rb.binding,
            kind,
        });
    }

    Ok(out)
}

fn inputs(module: &naga::Module, function: &naga::Function) -> Vec<(u32, UniformShape)> {
    let mut out = Vec::new();
    for arg in &function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

fn outputs(module: &naga::Module, function: &naga::Function) -> Vec<(u32, UniformShape)> {
    let mut out = Vec::new();
    if let Some(result) = function.result.as_ref() {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<(u32, UniformShape)>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push((*location, shape_of(module, ty))),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_locations(module, m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn shape_of(module: &naga::Module, ty: naga::Handle<naga::Type>) -> UniformShape {
    match &module.types[ty].inner {
        naga::TypeInner::Scalar(s) => match class_of(s.kind) {
            Some(c) => UniformShape::Scalar(c),
            None => UniformShape::Other,
        },
        naga::TypeInner::Vector { size, scalar } => match class_of(scalar.kind) {
            Some(c) => UniformShape::Vector(c, *size as u32),
            None => UniformShape::Other,
        },
        naga::TypeInner::Matrix { columns, rows, .. } => UniformShape::Matrix {
            columns: *columns as u32,
            rows: *rows as u32,
        },
        _ => UniformShape::Other,
    }
}

fn class_of(kind: naga::ScalarKind) -> Option<ScalarClass> {
    match kind {
        naga::ScalarKind::Float => Some(ScalarClass::Float),
        naga::ScalarKind::Sint => Some(ScalarClass::Sint),
        naga::ScalarKind::Uint => Some(ScalarClass::Uint),
        naga::ScalarKind::Bool => Some(ScalarClass::Bool),
        _ => None,
    }
}

/// Component class a vertex format delivers to the shader.
pub(crate) fn vertex_format_class(format: wgpu::VertexFormat) -> ScalarClass {
    use wgpu::VertexFormat as F;
    match format {
        F::Sint8 | F::Sint8x2 | F::Sint8x4 | F::Sint16 | F::Sint16x2 | F::Sint16x4 | F::Sint32
        | F::Sint32x2 | F::Sint32x3 | F::Sint32x4 => ScalarClass::Sint,
        F::Uint8 | F::Uint8x2 | F::Uint8x4 | F::Uint16 | F::Uint16x2 | F::Uint16x4 | F::Uint32
        | F::Uint32x2 | F::Uint32x3 | F::Uint32x4 => ScalarClass::Uint,
        _ => ScalarClass::Float,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct Params {
    offset: vec2<f32>,
    scale: f32,
    steps: u32,
};
@group(0) @binding(0) var<uniform> params: Params;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.pos = vec4<f32>(pos * params.scale + params.offset, 0.0, 1.0);
    out.uv = pos;
    return out;
}
"#;

    const FS: &str = r#"
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var tex_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, tex_sampler, uv);
}
"#;

    #[test]
    fn compile_reports_parse_errors_as_text() {
        let err = compile("fn broken( {").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn link_collects_resources_from_both_stages() {
        let vs = compile(VS).unwrap();
        let fs = compile(FS).unwrap();
        let iface = link(&vs, &fs).unwrap();

        assert_eq!(iface.vertex_entry, "vs_main");
        assert_eq!(iface.fragment_entry, "fs_main");
        assert_eq!(iface.vertex_inputs, vec![(0, UniformShape::Vector(ScalarClass::Float, 2))]);
        assert_eq!(iface.resources.len(), 3);

        let ResourceKind::Uniform { size, members } = &iface.resources[0].kind else {
            panic!("binding 0 should be a uniform block");
        };
        assert_eq!(*size, 16);
        let names: Vec<(&str, u32)> = members.iter().map(|m| (m.name.as_str(), m.offset)).collect();
        assert_eq!(names, vec![("offset", 0), ("scale", 8), ("steps", 12)]);
        assert_eq!(members[2].shape, UniformShape::Scalar(ScalarClass::Uint));

        assert_eq!(iface.resources[1].kind, ResourceKind::Texture { depth: false });
        assert_eq!(iface.resources[2].name, "tex_sampler");
    }

    #[test]
    fn link_merges_a_binding_declared_by_both_stages() {
        let fs = r#"
struct Params {
    offset: vec2<f32>,
    scale: f32,
    steps: u32,
};
@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv * params.scale, f32(params.steps), 1.0);
}
"#;
        let iface = link(&compile(VS).unwrap(), &compile(fs).unwrap()).unwrap();
        assert_eq!(iface.resources.len(), 1);
        assert_eq!(iface.resources[0].name, "params");
        assert_eq!(iface.resources[0].binding, 0);
    }

    #[test]
    fn link_rejects_unmatched_fragment_input() {
        let vs = compile(VS).unwrap();
        let fs = compile(
            "@fragment fn fs_main(@location(3) v: f32) -> @location(0) vec4<f32> { return vec4<f32>(v); }",
        )
        .unwrap();
        assert_eq!(link(&vs, &fs), Err(LinkError::UnmatchedVarying { location: 3 }));
    }

    #[test]
    fn link_rejects_missing_entry_point() {
        let fs = compile(FS).unwrap();
        assert_eq!(
            link(&fs, &fs),
            Err(LinkError::MissingEntryPoint { stage: "vertex" })
        );
    }

    #[test]
    fn link_rejects_conflicting_bindings() {
        let vs = compile(VS).unwrap();
        let fs = compile(
            r#"
@group(0) @binding(0) var tex: texture_2d<f32>;
@fragment fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureLoad(tex, vec2<i32>(uv), 0);
}
"#,
        )
        .unwrap();
        assert_eq!(link(&vs, &fs), Err(LinkError::BindingMismatch { binding: 0 }));
    }

    #[test]
    fn link_rejects_other_groups() {
        let vs = compile(
            r#"
@group(1) @binding(0) var<uniform> zoom: f32;
@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(zoom); }
"#,
        )
        .unwrap();
        let fs = compile("@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }")
            .unwrap();
        assert!(matches!(link(&vs, &fs), Err(LinkError::UnsupportedGroup { group: 1, .. })));
    }

    #[test]
    fn bare_uniform_becomes_single_member_block() {
        let vs = compile(
            r#"
@group(0) @binding(0) var<uniform> zoom: f32;
@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(zoom); }
"#,
        )
        .unwrap();
        let fs = compile("@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }")
            .unwrap();
        let iface = link(&vs, &fs).unwrap();
        let ResourceKind::Uniform { members, .. } = &iface.resources[0].kind else {
            panic!("expected uniform");
        };
        assert_eq!(members[0].name, "zoom");
    }

    #[test]
    fn vertex_format_classes() {
        assert_eq!(vertex_format_class(wgpu::VertexFormat::Sint16x2), ScalarClass::Sint);
        assert_eq!(vertex_format_class(wgpu::VertexFormat::Uint8x4), ScalarClass::Uint);
        assert_eq!(vertex_format_class(wgpu::VertexFormat::Float32x2), ScalarClass::Float);
    }
}
