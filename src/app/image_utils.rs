use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use image::{RgbImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use tch::{Device, Tensor};

use crate::app::{config::Normalization, error::DetectError};

const JPEG_QUALITY: u8 = 75;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub fn is_jpeg_filename(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// Decodes the upload, drops alpha/palette and resizes to a `size`×`size` square.
pub fn load_rgb(image_data: &[u8], size: u32) -> Result<RgbImage, DetectError> {
    let img = image::load_from_memory(image_data).map_err(DetectError::Decode)?;
    let rgb_img = img.to_rgb8();

    Ok(image::imageops::resize(
        &rgb_img,
        size,
        size,
        FilterType::CatmullRom,
    ))
}

/// `[1, 3, H, W]` float tensor on `device`.
pub fn to_input_tensor(img: &RgbImage, normalization: Normalization, device: Device) -> Tensor {
    let (width, height) = img.dimensions();
    let mut data = Vec::with_capacity((width * height * 3) as usize);

    // HWC -> CHW
    for channel in 0..3 {
        for y in 0..height {
            for x in 0..width {
                let value = img.get_pixel(x, y)[channel] as f32;
                data.push(normalize(value, channel, normalization));
            }
        }
    }

    Tensor::from_slice(&data)
        .reshape([1, 3, height as i64, width as i64])
        .to_device(device)
}

fn normalize(value: f32, channel: usize, normalization: Normalization) -> f32 {
    match normalization {
        Normalization::Raw => value,
        Normalization::Unit => value / 255.0,
        Normalization::Imagenet => (value / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
    }
}

pub fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>, DetectError> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(img)
        .map_err(DetectError::Encode)?;
    Ok(buffer.into_inner())
}

pub fn encode_jpeg_base64(img: &RgbImage) -> Result<String, DetectError> {
    let jpeg = encode_jpeg(img)?;
    Ok(general_purpose::STANDARD.encode(jpeg))
}
