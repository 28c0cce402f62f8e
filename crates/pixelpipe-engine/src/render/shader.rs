//! Shader compile + link checks.
//!
//! Sources are parsed and validated with naga before wgpu ever sees them, so
//! a broken shader comes back as an [`Error`] instead of tripping the device's
//! uncaptured-error handler.

use std::collections::BTreeMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::{Error, ShaderStage};

/// One stage of a shader program.
#[derive(Debug, Copy, Clone)]
pub(crate) struct StageSource {
    pub stage: ShaderStage,
    pub label: &'static str,
    pub source: &'static str,
    pub entry_point: &'static str,
}

/// A vertex/fragment pair whose interfaces have been checked against each other.
pub(crate) struct ShaderProgram {
    pub vertex: wgpu::ShaderModule,
    pub vertex_entry: &'static str,
    pub fragment: wgpu::ShaderModule,
    pub fragment_entry: &'static str,
}

impl ShaderProgram {
    /// Compiles both stages, links them, then hands the sources to wgpu.
    pub(crate) fn new(
        device: &wgpu::Device,
        vertex: StageSource,
        fragment: StageSource,
    ) -> Result<Self, Error> {
        let vs = compile(vertex)?;
        let fs = compile(fragment)?;
        link(&vs, vertex.entry_point, &fs, fragment.entry_point)?;

        log::debug!("linked shader program ({} + {})", vertex.label, fragment.label);

        Ok(Self {
            vertex: create_module(device, vertex),
            vertex_entry: vertex.entry_point,
            fragment: create_module(device, fragment),
            fragment_entry: fragment.entry_point,
        })
    }
}

fn create_module(device: &wgpu::Device, src: StageSource) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(src.label),
        source: wgpu::ShaderSource::Wgsl(src.source.into()),
    })
}

/// Parses and validates a single stage.
///
/// Diagnostics carry the source excerpt, like a driver's shader info log.
pub(crate) fn compile(src: StageSource) -> Result<naga::Module, Error> {
    let module = naga::front::wgsl::parse_str(src.source).map_err(|e| Error::ShaderCompile {
        stage: src.stage,
        log: e.emit_to_string(src.source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| Error::ShaderCompile {
            stage: src.stage,
            log: e.emit_to_string(src.source),
        })?;

    Ok(module)
}

/// Checks that the vertex stage writes every location the fragment stage reads,
/// with matching types.
pub(crate) fn link(
    vertex: &naga::Module,
    vertex_entry: &str,
    fragment: &naga::Module,
    fragment_entry: &str,
) -> Result<(), Error> {
    let vs = find_entry(vertex, naga::ShaderStage::Vertex, vertex_entry)?;
    let fs = find_entry(fragment, naga::ShaderStage::Fragment, fragment_entry)?;

    let mut outputs = BTreeMap::new();
    if let Some(result) = &vs.function.result {
        collect_locations(vertex, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let mut inputs = BTreeMap::new();
    for arg in &fs.function.arguments {
        collect_locations(fragment, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    for (location, wanted) in &inputs {
        match outputs.get(location) {
            None => {
                return Err(Error::ProgramLink {
                    log: format!(
                        "fragment input at location {location} is not written by `{vertex_entry}`"
                    ),
                });
            }
            Some(written) if written != wanted => {
                return Err(Error::ProgramLink {
                    log: format!(
                        "location {location}: vertex stage writes {written:?}, fragment stage reads {wanted:?}"
                    ),
                });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

fn find_entry<'m>(
    module: &'m naga::Module,
    stage: naga::ShaderStage,
    name: &str,
) -> Result<&'m naga::EntryPoint, Error> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
        .ok_or_else(|| Error::ProgramLink {
            log: format!("no {stage:?} entry point named `{name}`"),
        })
}

/// Flattens user-defined IO (`@location`) of an argument or result, descending
/// into structs. Built-ins are not part of the stage interface.
fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeMap<u32, naga::TypeInner>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location, module.types[ty].inner.clone());
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::renderer::{TRIANGLE_FS, TRIANGLE_VS};

    fn stage(stage: ShaderStage, source: &'static str, entry_point: &'static str) -> StageSource {
        StageSource { stage, label: "test", source, entry_point }
    }

    // ── compile ───────────────────────────────────────────────────────────

    #[test]
    fn builtin_stages_compile() {
        assert!(compile(TRIANGLE_VS).is_ok());
        assert!(compile(TRIANGLE_FS).is_ok());
    }

    #[test]
    fn syntax_error_reports_stage_and_log() {
        let src = stage(ShaderStage::Vertex, "@vertex fn vs_main( -> {", "vs_main");
        match compile(src) {
            Err(Error::ShaderCompile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn type_error_is_a_compile_error() {
        let src = stage(
            ShaderStage::Fragment,
            "@fragment fn fs_main() -> @location(0) vec4<f32> { let x: f32 = vec2<f32>(1.0, 2.0); return vec4<f32>(x); }",
            "fs_main",
        );
        assert!(matches!(
            compile(src),
            Err(Error::ShaderCompile { stage: ShaderStage::Fragment, .. })
        ));
    }

    // ── link ──────────────────────────────────────────────────────────────

    #[test]
    fn builtin_stages_link() {
        let vs = compile(TRIANGLE_VS).unwrap();
        let fs = compile(TRIANGLE_FS).unwrap();
        assert!(link(&vs, "vs_main", &fs, "fs_main").is_ok());
    }

    #[test]
    fn missing_location_fails_link() {
        let vs = compile(TRIANGLE_VS).unwrap();
        let fs = compile(stage(
            ShaderStage::Fragment,
            "@fragment fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> { return vec4<f32>(uv, 0.0, 1.0); }",
            "fs_main",
        ))
        .unwrap();

        match link(&vs, "vs_main", &fs, "fs_main") {
            Err(Error::ProgramLink { log }) => assert!(log.contains("location 3")),
            other => panic!("expected link error, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_type_fails_link() {
        let vs = compile(TRIANGLE_VS).unwrap();
        let fs = compile(stage(
            ShaderStage::Fragment,
            "@fragment fn fs_main(@location(0) c: vec2<f32>) -> @location(0) vec4<f32> { return vec4<f32>(c, 0.0, 1.0); }",
            "fs_main",
        ))
        .unwrap();

        assert!(matches!(
            link(&vs, "vs_main", &fs, "fs_main"),
            Err(Error::ProgramLink { .. })
        ));
    }

    #[test]
    fn missing_entry_point_fails_link() {
        let vs = compile(TRIANGLE_VS).unwrap();
        let fs = compile(TRIANGLE_FS).unwrap();
        assert!(matches!(
            link(&vs, "main", &fs, "fs_main"),
            Err(Error::ProgramLink { .. })
        ));
    }
}
