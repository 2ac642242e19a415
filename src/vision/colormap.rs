//! Jet false-color palette and warm-hue masking
//!
//! Hue follows the 8-bit convention used by common CV toolkits: degrees / 2,
//! so the full circle is 0..180 and red sits at both ends.

use image::{GrayImage, Luma, Rgb, RgbImage};
use once_cell::sync::Lazy;

/// Minimum saturation for a pixel to count as warm
pub const MIN_SATURATION: u8 = 100;

/// Minimum value (brightness) for a pixel to count as warm
pub const MIN_VALUE: u8 = 100;

/// Inclusive hue range on the 0..180 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HueBand {
    pub low: u8,
    pub high: u8,
}

impl HueBand {
    const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    fn contains(&self, hue: u8) -> bool {
        hue >= self.low && hue <= self.high
    }
}

pub const ORANGE: HueBand = HueBand::new(10, 25);
pub const RED_LOW: HueBand = HueBand::new(0, 10);
pub const RED_HIGH: HueBand = HueBand::new(170, 180);

/// Hue bands treated as "hot" in the heatmap
pub const WARM_BANDS: [HueBand; 3] = [ORANGE, RED_LOW, RED_HIGH];

/// 8-bit HSV triple (h in 0..=180)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub fn is_warm(&self) -> bool {
        self.s >= MIN_SATURATION
            && self.v >= MIN_VALUE
            && WARM_BANDS.iter().any(|band| band.contains(self.h))
    }
}

static JET_LUT: Lazy<[[u8; 3]; 256]> = Lazy::new(|| {
    let mut lut = [[0u8; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = jet(i as f32 / 255.0);
    }
    lut
});

/// Blue → cyan → green → yellow → red as intensity rises
fn jet(t: f32) -> [u8; 3] {
    let channel = |center: f32| {
        let c = (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Palette color for one gray level
pub fn jet_color(level: u8) -> [u8; 3] {
    JET_LUT[level as usize]
}

/// Map a grayscale image through the jet palette
pub fn apply_jet(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        Rgb(jet_color(gray.get_pixel(x, y).0[0]))
    })
}

/// Convert an RGB pixel to 8-bit HSV
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> Hsv {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        h: (h / 2.0).round() as u8,
        s: s.round() as u8,
        v: max as u8,
    }
}

/// Binary mask (255/0) of pixels whose hue is orange or red
pub fn warm_mask(heatmap: &RgbImage) -> GrayImage {
    GrayImage::from_fn(heatmap.width(), heatmap.height(), |x, y| {
        if rgb_to_hsv(heatmap.get_pixel(x, y).0).is_warm() {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
