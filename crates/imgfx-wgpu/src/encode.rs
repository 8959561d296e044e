//! Read-back and encoding of the final frame
//!
//! Texture-to-buffer copies must use 256-byte-aligned rows, so the staging
//! buffer is padded and rows are re-tightened on the CPU before encoding.

use std::io::Cursor;

use bytes::Bytes;

use crate::error::EngineError;

/// Rounds a row length up to wgpu's copy alignment.
pub(crate) fn align_bytes_per_row(bytes: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    bytes.div_ceil(align) * align
}

/// Blocks until a `MAP_READ` buffer is mapped.
pub(crate) fn map_buffer(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<(), EngineError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| EngineError::Readback(err.to_string()))?;

    pollster::block_on(receiver.receive())
        .ok_or_else(|| EngineError::Readback("buffer map callback dropped".into()))?
        .map_err(|err| EngineError::Readback(err.to_string()))
}

/// Reads the mapped staging buffer into a tight RGBA byte vector.
pub(crate) fn read_pixels_tight(
    device: &wgpu::Device,
    staging: &wgpu::Buffer,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, EngineError> {
    map_buffer(device, staging)?;

    let tight_bpr = width as usize * 4;
    let padded_bpr = align_bytes_per_row(width * 4) as usize;

    let data = staging.slice(..).get_mapped_range();
    let mut pixels = vec![0u8; tight_bpr * height as usize];
    for row in 0..height as usize {
        let src = row * padded_bpr;
        let dst = row * tight_bpr;
        pixels[dst..dst + tight_bpr].copy_from_slice(&data[src..src + tight_bpr]);
    }
    drop(data);
    staging.unmap();

    Ok(pixels)
}

/// Reads resolved timestamp ticks from a mapped readback buffer.
pub(crate) fn read_timestamps(
    device: &wgpu::Device,
    readback: &wgpu::Buffer,
) -> Result<Vec<u64>, EngineError> {
    map_buffer(device, readback)?;

    let data = readback.slice(..).get_mapped_range();
    let ticks = bytemuck::cast_slice::<u8, u64>(&data).to_vec();
    drop(data);
    readback.unmap();

    Ok(ticks)
}

/// Encodes tight RGBA pixels as PNG.
pub(crate) fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> Result<Bytes, EngineError> {
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| EngineError::Readback("read-back size mismatch".into()))?;

    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|err| EngineError::Readback(err.to_string()))?;

    Ok(Bytes::from(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_align_to_256_bytes() {
        assert_eq!(align_bytes_per_row(400), 512);
        assert_eq!(align_bytes_per_row(1024), 1024);
        assert_eq!(align_bytes_per_row(1), 256);
    }

    #[test]
    fn png_round_trips_pixels() {
        let pixels = vec![
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 255, 255, // blue
            255, 255, 255, 255, // white
        ];
        let encoded = encode_png(pixels.clone(), 2, 2).unwrap();

        let decoded = image::load_from_memory(&encoded).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.into_raw(), pixels);
    }

    #[test]
    fn mismatched_pixel_length_is_an_error() {
        let err = encode_png(vec![0; 7], 2, 2).unwrap_err();
        assert!(matches!(err, EngineError::Readback(_)));
    }
}
