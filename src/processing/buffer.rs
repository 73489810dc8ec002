use image::RgbaImage;

pub const BYTES_PER_PIXEL: usize = 4;

/// Flat interleaved RGBA8 pixel storage with validated dimensions.
///
/// All blend math in this crate runs over these buffers. The length
/// invariant (`data.len() == width * height * 4`) is checked once at
/// construction so the per-pixel loops can use `chunks_exact` without
/// further bounds checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes. Returns `None` when the byte count does not
    /// match the declared dimensions or a dimension is zero.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgba(image: &RgbaImage) -> Option<Self> {
        Self::from_raw(image.width(), image.height(), image.as_raw().clone())
    }

    /// Encodes the buffer back into an owned image handle.
    pub fn into_rgba(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn same_dimensions(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Allocates an output buffer of the same dimensions, zero-filled.
    pub(crate) fn blank_like(&self) -> Vec<u8> {
        vec![0u8; self.data.len()]
    }
}
