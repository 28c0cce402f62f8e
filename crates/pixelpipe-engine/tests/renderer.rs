//! Renderer behavior on a real (headless) device.
//!
//! Each test skips itself when the machine exposes no GPU adapter.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};

use pixelpipe_engine::Error;
use pixelpipe_engine::render::{CanvasSize, RenderCtx, Renderer, RendererConfig};

const START_VERTICES: [f32; 18] = [
    50.0, 40.0, 0.0,
    80.0, 300.0, 1.0,
    50.0, 0.0, 0.0,

    50.0, 40.0, 0.0,
    90.0, 30.0, 1.0,
    60.0, 0.0, 1.0,
];

fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pixelpipe test device"),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            })
            .await
            .ok()
    })
}

fn renderer(size: CanvasSize) -> Option<Renderer> {
    renderer_with(size, RendererConfig::default())
}

fn renderer_with(size: CanvasSize, config: RendererConfig) -> Option<Renderer> {
    let Some((device, queue)) = gpu() else {
        eprintln!("skipping: no GPU adapter available");
        return None;
    };
    let ctx = RenderCtx::new(&device, &queue, wgpu::TextureFormat::Rgba8Unorm);
    Some(Renderer::new(&ctx, size, config).expect("renderer construction"))
}

/// A triangle covering a canvas of up to 64x64 pixels at constant `z`.
fn covering(z: f32) -> [f32; 9] {
    [0.0, 0.0, z, 128.0, 0.0, z, 0.0, 128.0, z]
}

/// RGBA at column `x`, row `y` (row 0 is the top of the canvas).
fn px(pixels: &[u8], size: CanvasSize, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * size.width + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

fn lit_pixels(pixels: &[u8]) -> usize {
    pixels.chunks_exact(4).filter(|p| p[0] > 0 || p[1] > 0 || p[2] > 0).count()
}

// ── construction ──────────────────────────────────────────────────────────

#[test]
fn empty_canvas_is_rejected() {
    let Some((device, queue)) = gpu() else { return };
    let ctx = RenderCtx::new(&device, &queue, wgpu::TextureFormat::Rgba8Unorm);

    let result = Renderer::new(&ctx, CanvasSize::new(0, 10), RendererConfig::default());
    assert!(matches!(result, Err(Error::ContextUnavailable(_))));
}

#[test]
fn construction_draws_an_empty_black_frame() {
    let size = CanvasSize::new(32, 16);
    let Some(r) = renderer(size) else { return };

    assert_eq!(r.vertex_count(), 0);
    assert_eq!(r.size(), size);

    let pixels = r.read_pixels().unwrap();
    assert_eq!(pixels.len(), 32 * 16 * 4);
    assert!(pixels.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
}

// ── set_vertices ──────────────────────────────────────────────────────────

#[test]
fn count_follows_the_last_upload() {
    let Some(mut r) = renderer(CanvasSize::new(16, 16)) else { return };

    r.set_vertices(&START_VERTICES);
    assert_eq!(r.vertex_count(), 6);

    r.set_vertices(&START_VERTICES[..7]);
    assert_eq!(r.vertex_count(), 2);

    r.set_vertices(&[]);
    assert_eq!(r.vertex_count(), 0);
}

#[test]
fn large_upload_grows_the_buffer() {
    let size = CanvasSize::new(64, 64);
    let Some(mut r) = renderer(size) else { return };

    // 300 copies of a full-canvas triangle.
    let tri = covering(0.5);
    let vertices: Vec<f32> = tri.iter().copied().cycle().take(tri.len() * 100).collect();

    r.set_vertices(&vertices);
    r.draw_scene();

    assert_eq!(r.vertex_count(), 300);
    let pixels = r.read_pixels().unwrap();
    assert_eq!(lit_pixels(&pixels), 64 * 64);
}

// ── draw_scene ────────────────────────────────────────────────────────────

#[test]
fn drawing_twice_is_idempotent() {
    let Some(mut r) = renderer(CanvasSize::new(200, 320)) else { return };

    r.set_vertices(&START_VERTICES);
    r.draw_scene();
    let first = r.read_pixels().unwrap();
    r.draw_scene();
    let second = r.read_pixels().unwrap();

    assert_eq!(first, second);
}

#[test]
fn shade_is_one_minus_z() {
    let size = CanvasSize::new(64, 64);
    let Some(mut r) = renderer(size) else { return };

    r.set_vertices(&covering(0.25));
    r.draw_scene();

    let pixels = r.read_pixels().unwrap();
    for p in pixels.chunks_exact(4) {
        assert!((190..=192).contains(&p[0]), "unexpected shade {p:?}");
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[3], 255);
    }
}

#[test]
fn negative_z_is_drawn() {
    let size = CanvasSize::new(16, 16);
    let Some(mut r) = renderer(size) else { return };

    // Shade 1.5 saturates to white.
    r.set_vertices(&covering(-0.5));
    r.draw_scene();

    let pixels = r.read_pixels().unwrap();
    assert_eq!(px(&pixels, size, 8, 8), [255, 255, 255, 255]);
}

#[test]
fn nearer_triangle_wins_in_either_order() {
    let size = CanvasSize::new(16, 16);
    let Some(mut r) = renderer(size) else { return };

    let near = covering(0.25);
    let far = covering(0.75);

    for list in [[near, far].concat(), [far, near].concat()] {
        r.set_vertices(&list);
        r.draw_scene();
        let p = px(&r.read_pixels().unwrap(), size, 8, 8);
        assert!((190..=192).contains(&p[0]), "far triangle won: {p:?}");
    }
}

#[test]
fn negative_z_sits_in_front_of_positive_z() {
    let size = CanvasSize::new(16, 16);
    let Some(mut r) = renderer(size) else { return };

    r.set_vertices(&[covering(-0.5), covering(0.5)].concat());
    r.draw_scene();

    let pixels = r.read_pixels().unwrap();
    assert_eq!(px(&pixels, size, 8, 8), [255, 255, 255, 255]);
}

#[test]
fn fragments_at_the_cleared_depth_pass() {
    let size = CanvasSize::new(16, 16);
    let config = RendererConfig { clear_color: wgpu::Color::RED, ..RendererConfig::default() };
    let Some(mut r) = renderer_with(size, config) else { return };

    // z = 1 lands exactly on the cleared depth of 1.0 and shades black.
    r.set_vertices(&covering(1.0));
    r.draw_scene();

    let pixels = r.read_pixels().unwrap();
    assert_eq!(px(&pixels, size, 8, 8), [0, 0, 0, 255]);
}

#[test]
fn strict_less_rejects_the_cleared_depth() {
    let size = CanvasSize::new(16, 16);
    let config = RendererConfig {
        clear_color: wgpu::Color::RED,
        depth_compare: wgpu::CompareFunction::Less,
        ..RendererConfig::default()
    };
    let Some(mut r) = renderer_with(size, config) else { return };

    r.set_vertices(&covering(1.0));
    r.draw_scene();

    let pixels = r.read_pixels().unwrap();
    assert_eq!(px(&pixels, size, 8, 8), [255, 0, 0, 255]);
}

#[test]
fn start_scene_is_a_greyscale_gradient() {
    let size = CanvasSize::new(200, 320);
    let Some(mut r) = renderer(size) else { return };

    r.set_vertices(&START_VERTICES);
    r.draw_scene();

    let pixels = r.read_pixels().unwrap();
    assert!(pixels.chunks_exact(4).all(|p| p[0] == p[1] && p[1] == p[2] && p[3] == 255));

    // Near the (50, 40, 0.0) corner the shade is close to white.
    let near_white = px(&pixels, size, 52, size.height - 1 - 35);
    assert!(near_white[0] > 200, "got {near_white:?}");

    let shades: std::collections::BTreeSet<u8> = pixels.chunks_exact(4).map(|p| p[0]).collect();
    assert!(shades.len() > 3, "expected a gradient, got {shades:?}");
}

#[test]
fn resolution_is_reread_on_every_draw() {
    let size = CanvasSize::new(64, 64);
    let Some(mut r) = renderer(size) else { return };

    r.set_vertices(&[40.0, 40.0, 0.0, 60.0, 40.0, 0.0, 40.0, 60.0, 0.0]);
    r.draw_scene();

    // Origin is bottom-left: pixel (45, 45) from the bottom is row 18 from the top.
    let pixels = r.read_pixels().unwrap();
    assert_eq!(px(&pixels, size, 45, size.height - 1 - 45), [255, 255, 255, 255]);
    assert_eq!(px(&pixels, size, 10, 10), [0, 0, 0, 255]);

    // Same vertices on a smaller canvas map outside clip space.
    r.resize(CanvasSize::new(32, 32));
    r.draw_scene();
    let pixels = r.read_pixels().unwrap();
    assert_eq!(pixels.len(), 32 * 32 * 4);
    assert_eq!(lit_pixels(&pixels), 0);
}

#[test]
fn zero_resize_is_ignored() {
    let size = CanvasSize::new(16, 8);
    let Some(mut r) = renderer(size) else { return };

    r.resize(CanvasSize::new(0, 0));
    assert_eq!(r.size(), size);
}

// ── export ────────────────────────────────────────────────────────────────

#[test]
fn data_url_matches_canvas() {
    let size = CanvasSize::new(200, 320);
    let Some(mut r) = renderer(size) else { return };

    r.set_vertices(&START_VERTICES);
    r.draw_scene();

    let mut dst = RgbaImage::new(1, 1);
    let url = r.image_as_data_url(&mut dst).unwrap();

    assert_eq!(dst.dimensions(), (size.width, size.height));
    assert_eq!(dst.as_raw(), &r.read_pixels().unwrap());

    let payload = url.strip_prefix("data:image/png;base64,").expect("png data url");
    assert!(!payload.is_empty());
    let png = STANDARD.decode(payload).unwrap();
    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (size.width, size.height));
}

#[test]
fn export_leaves_rendering_untouched() {
    let Some(mut r) = renderer(CanvasSize::new(200, 320)) else { return };

    r.set_vertices(&START_VERTICES);
    r.draw_scene();
    let before = r.read_pixels().unwrap();

    let mut dst = RgbaImage::default();
    r.image_as_data_url(&mut dst).unwrap();

    assert_eq!(r.vertex_count(), 6);
    assert_eq!(r.read_pixels().unwrap(), before);
}
