use std::path::PathBuf;

use image::RgbaImage;

/// Request to stylize one style image against the session's content.
#[derive(Debug)]
pub struct StylizeStyle {
    pub index: usize,
    pub path: PathBuf,
}

/// A stylized variant, sized like the normalized content image.
#[derive(Debug)]
pub struct VariantReady {
    pub index: usize,
    pub image: RgbaImage,
}

/// One style could not be stylized; the batch continues without it.
#[derive(Debug)]
pub struct VariantFailed {
    pub index: usize,
    pub path: PathBuf,
}
