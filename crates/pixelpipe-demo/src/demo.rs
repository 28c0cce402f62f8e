use image::RgbaImage;
use pixelpipe_engine::core::{App, AppControl, FrameCtx};
use pixelpipe_engine::input::{Key, MouseButton};
use pixelpipe_engine::render::{CanvasSize, Renderer, RendererConfig};

/// Two triangles drawn at startup, as (x, y, z) triples in canvas pixels.
pub const START_VERTICES: [f32; 18] = [
    50.0, 40.0, 0.0,
    80.0, 300.0, 1.0,
    50.0, 0.0, 0.0,

    50.0, 40.0, 0.0,
    90.0, 30.0, 1.0,
    60.0, 0.0, 1.0,
];

/// Single triangle shown after a click.
pub const CLICK_VERTICES: [f32; 9] = [
    10.0, 40.0, 0.0,
    20.0, 300.0, 1.0,
    10.0, 0.0, 0.0,
];

/// Canvas size the click handler switches to.
pub const CLICK_CANVAS: CanvasSize = CanvasSize::new(320, 240);

/// UI layer: owns the one renderer and drives it from input.
#[derive(Default)]
pub struct Demo {
    renderer: Option<Renderer>,
    /// Reused destination for exports.
    export: RgbaImage,
}

impl Demo {
    fn start(ctx: &FrameCtx<'_, '_>) -> Result<Renderer, pixelpipe_engine::Error> {
        let mut renderer = Renderer::new(
            &ctx.render_ctx(),
            ctx.window.physical_size(),
            RendererConfig::default(),
        )?;
        renderer.set_vertices(&START_VERTICES);
        renderer.draw_scene();
        Ok(renderer)
    }

    fn click(renderer: &mut Renderer) {
        renderer.set_vertices(&CLICK_VERTICES);
        renderer.resize(CLICK_CANVAS);
        renderer.draw_scene();
    }

    fn restart(renderer: &mut Renderer, size: CanvasSize) {
        renderer.set_vertices(&START_VERTICES);
        renderer.resize(size);
        renderer.draw_scene();
    }

    fn export(&mut self) {
        let Some(renderer) = self.renderer.as_ref() else { return };
        match renderer.image_as_data_url(&mut self.export) {
            Ok(url) => {
                let preview: String = url.chars().take(48).collect();
                log::info!(
                    "export {}x{}: {preview}... ({} bytes)",
                    self.export.width(),
                    self.export.height(),
                    url.len()
                );
            }
            Err(e) => log::error!("export failed: {e}"),
        }
    }
}

impl App for Demo {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input_frame.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }

        if self.renderer.is_none() {
            match Self::start(ctx) {
                Ok(r) => self.renderer = Some(r),
                Err(e) => {
                    log::error!("{e}");
                    return AppControl::Exit;
                }
            }
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return AppControl::Continue;
        };

        let mut changed = false;
        if ctx.input_frame.button_pressed(MouseButton::Left) {
            Self::click(renderer);
            changed = true;
        }
        if ctx.input_frame.key_pressed(Key::R) {
            Self::restart(renderer, ctx.window.physical_size());
            changed = true;
        }
        if changed {
            let size = renderer.size();
            ctx.window.set_title(&format!(
                "pixelpipe | {}x{} | {} vertices",
                size.width,
                size.height,
                renderer.vertex_count()
            ));
        }

        if ctx.input_frame.key_pressed(Key::E) {
            self.export();
        }

        let Some(renderer) = self.renderer.as_ref() else {
            return AppControl::Continue;
        };
        ctx.present(|target| renderer.present(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelpipe_engine::render::vertex_count;

    #[test]
    fn start_scene_is_two_triangles() {
        assert_eq!(vertex_count(START_VERTICES.len()), 6);
    }

    #[test]
    fn click_scene_is_one_triangle() {
        assert_eq!(vertex_count(CLICK_VERTICES.len()), 3);
    }

    #[test]
    fn click_canvas_matches_classic_demo() {
        assert_eq!(CLICK_CANVAS, CanvasSize::new(320, 240));
    }
}
