use std::sync::mpsc;

use super::canvas::CanvasSize;
use crate::Error;

const BYTES_PER_PIXEL: u32 = 4;

/// Row pitch required by texture-to-buffer copies.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * BYTES_PER_PIXEL).div_ceil(align) * align
}

/// Drops the per-row copy padding, yielding tightly packed RGBA rows.
pub(crate) fn unpad_rows(data: &[u8], size: CanvasSize, padded_bpr: u32) -> Vec<u8> {
    let row = (size.width * BYTES_PER_PIXEL) as usize;
    let mut out = Vec::with_capacity(row * size.height as usize);

    for chunk in data.chunks(padded_bpr as usize).take(size.height as usize) {
        out.extend_from_slice(&chunk[..row]);
    }

    out
}

/// Copies an RGBA8 texture into host memory, blocking until the copy is mapped.
///
/// Rows come back top to bottom.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    size: CanvasSize,
) -> Result<Vec<u8>, Error> {
    let padded_bpr = padded_bytes_per_row(size.width);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("pixelpipe readback buffer"),
        size: padded_bpr as u64 * size.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("pixelpipe readback encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(size.height),
            },
        },
        size.extent(),
    );

    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| Error::Readback(format!("device poll failed: {e}")))?;

    rx.recv()
        .map_err(|_| Error::Readback("map callback was dropped".into()))?
        .map_err(|e| Error::Readback(format!("failed to map readback buffer: {e}")))?;

    let pixels = {
        let mapped = slice.get_mapped_range();
        unpad_rows(&mapped, size, padded_bpr)
    };
    staging.unmap();

    log::debug!("read back {}x{} canvas ({} bytes)", size.width, size.height, pixels.len());

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_pitch_is_aligned() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(320), 1280);
    }

    #[test]
    fn unpad_keeps_only_pixel_bytes() {
        let size = CanvasSize::new(2, 3);
        let padded = padded_bytes_per_row(size.width) as usize;

        let mut data = vec![0xAAu8; padded * 3];
        for row in 0..3 {
            for b in 0..8 {
                data[row * padded + b] = (row * 10 + b) as u8;
            }
        }

        let out = unpad_rows(&data, size, padded as u32);
        assert_eq!(out.len(), 2 * 3 * 4);
        assert_eq!(&out[0..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(&out[16..24], &[20, 21, 22, 23, 24, 25, 26, 27]);
        assert!(!out.contains(&0xAA));
    }

    #[test]
    fn unpad_without_padding_is_identity() {
        let size = CanvasSize::new(64, 2);
        let data: Vec<u8> = (0..(64 * 4 * 2)).map(|i| i as u8).collect();
        assert_eq!(unpad_rows(&data, size, 256), data);
    }
}
