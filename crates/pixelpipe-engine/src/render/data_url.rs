use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};

use crate::Error;

const PNG_PREFIX: &str = "data:image/png;base64,";

/// Serializes an image as an embeddable `data:image/png;base64,...` string.
pub fn png_data_url(image: &RgbaImage) -> Result<String, Error> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    let mut url = String::with_capacity(PNG_PREFIX.len() + png.len().div_ceil(3) * 4);
    url.push_str(PNG_PREFIX);
    STANDARD.encode_string(&png, &mut url);
    Ok(url)
}
