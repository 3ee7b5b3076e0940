// Thumbnail encoding
//
// Turns a captured RGBA frame into PNG bytes for the storage collaborator.

use crate::display::FrameBuffer;

/// Errors that can occur while encoding a thumbnail
#[derive(Debug)]
pub enum ThumbnailError {
    /// PNG encoding error
    PngEncoding(png::EncodingError),
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThumbnailError::PngEncoding(e) => write!(f, "PNG encoding error: {}", e),
        }
    }
}

impl std::error::Error for ThumbnailError {}

impl From<png::EncodingError> for ThumbnailError {
    fn from(e: png::EncodingError) -> Self {
        ThumbnailError::PngEncoding(e)
    }
}

/// Encode an RGBA frame as PNG
///
/// # Arguments
///
/// * `frame` - The captured frame
///
/// # Returns
///
/// The PNG file contents
pub fn encode_png(frame: &FrameBuffer) -> Result<Vec<u8>, ThumbnailError> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, frame.width(), frame.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(frame.as_slice())?;
        writer.finish()?;
    }
    Ok(out)
}
