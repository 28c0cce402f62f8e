//! GPU rendering subsystem.
//!
//! The [`Renderer`] mirrors the classic setup sequence: context, shader
//! compile/link, vertex buffer upload, one draw call. It draws into a
//! persistent offscreen canvas; presentation stretches that canvas over the
//! window surface.
//!
//! Convention:
//! - vertex x/y are canvas pixels, origin bottom-left, +Y up
//! - the vertex shader converts to NDC with the resolution uniform

mod canvas;
mod ctx;
mod data_url;
mod present;
mod readback;
mod renderer;
mod shader;

pub use canvas::CanvasSize;
pub use ctx::{RenderCtx, RenderTarget};
pub use data_url::png_data_url;
pub use renderer::{vertex_count, Renderer, RendererConfig, FLOATS_PER_VERTEX};
