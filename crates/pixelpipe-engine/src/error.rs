use std::fmt;

/// Shader stage named in compile diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors surfaced by GPU setup, shader preparation and canvas export.
///
/// Setup errors (`ContextUnavailable`, `ShaderCompile`, `ProgramLink`) are
/// terminal for the instance that produced them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No compatible rendering backend could be bound to the surface.
    #[error("rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("an error occurred compiling the {stage} shader:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("unable to link the shader program:\n{log}")]
    ProgramLink { log: String },

    #[error("canvas readback failed: {0}")]
    Readback(String),

    #[error("failed to encode canvas image")]
    Encode(#[from] image::ImageError),
}
