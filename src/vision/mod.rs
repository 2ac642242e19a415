//! Heatmap and tumor ROI extraction
//!
//! Pure and deterministic: the same bytes always give the same heatmap and
//! the same crop. Heavy enough that callers run it on a blocking pool.

pub mod colormap;
pub mod contours;
pub mod morphology;

use crate::error::ScanError;
use crate::scan::types::EncodedImage;
use contours::{find_contours, BoundingBox};
use image::{imageops, GrayImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Regions at or below this area are treated as noise
pub const MIN_ROI_AREA: f64 = 50.0;

/// Shown when no region clears the area floor
pub const NO_TUMOR_MESSAGE: &str = "No tumor detected";

/// Output of one extraction
#[derive(Debug, Clone)]
pub struct RegionExtraction {
    /// Jet-colored rendering of the whole scan (PNG)
    pub heatmap: EncodedImage,

    /// Crop of the original grayscale scan around the hottest region (PNG)
    pub roi: Option<EncodedImage>,

    /// Where the crop was taken, in scan pixel coordinates
    pub roi_bounds: Option<BoundingBox>,
}

impl RegionExtraction {
    pub fn tumor_detected(&self) -> bool {
        self.roi.is_some()
    }

    /// Human-readable summary, "No tumor detected" when there is no ROI
    pub fn summary(&self) -> String {
        match self.roi_bounds {
            Some(b) => format!(
                "Region of interest at ({}, {}), {}x{}",
                b.x, b.y, b.width, b.height
            ),
            None => NO_TUMOR_MESSAGE.to_string(),
        }
    }
}

/// Decode a scan, render its heatmap and crop the largest warm region.
pub fn extract_regions(data: &[u8]) -> Result<RegionExtraction, ScanError> {
    let gray = image::load_from_memory(data)
        .map_err(|e| ScanError::Decode(e.to_string()))?
        .to_luma8();

    let heatmap = colormap::apply_jet(&gray);
    let bounds = locate_roi(&heatmap);

    let roi = match bounds {
        Some(b) => {
            let crop = imageops::crop_imm(&gray, b.x, b.y, b.width, b.height).to_image();
            Some(encode_gray(&crop)?)
        }
        None => None,
    };

    Ok(RegionExtraction {
        heatmap: encode_rgb(&heatmap)?,
        roi,
        roi_bounds: bounds,
    })
}

/// Bounding box of the largest cleaned warm region, if it clears the floor
fn locate_roi(heatmap: &RgbImage) -> Option<BoundingBox> {
    let mask = colormap::warm_mask(heatmap);
    let mask = morphology::close(&mask, morphology::KERNEL_SIZE);
    let mask = morphology::open(&mask, morphology::KERNEL_SIZE);

    // max_by keeps the last of equal areas; reverse so the first traced wins
    find_contours(&mask)
        .into_iter()
        .rev()
        .map(|c| (c.area(), c))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .filter(|(area, _)| *area > MIN_ROI_AREA)
        .map(|(_, c)| c.bounding_box())
}

fn encode_gray(img: &GrayImage) -> Result<EncodedImage, ScanError> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ScanError::Encode(e.to_string()))?;
    Ok(EncodedImage::new(bytes))
}

fn encode_rgb(img: &RgbImage) -> Result<EncodedImage, ScanError> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ScanError::Encode(e.to_string()))?;
    Ok(EncodedImage::new(bytes))
}
