//! Binary morphology with a square structuring element
//!
//! Pixels outside the image never contribute, so borders neither grow nor
//! shrink regions on their own.

use image::GrayImage;

/// Side length of the square structuring element
pub const KERNEL_SIZE: u32 = 5;

#[derive(Clone, Copy)]
enum Op {
    Dilate,
    Erode,
}

impl Op {
    fn combine(&self, a: u8, b: u8) -> u8 {
        match self {
            Op::Dilate => a.max(b),
            Op::Erode => a.min(b),
        }
    }
}

/// Max filter over a `size` x `size` window centered on each pixel
pub fn dilate(mask: &GrayImage, size: u32) -> GrayImage {
    square_filter(mask, size, Op::Dilate)
}

/// Min filter over a `size` x `size` window centered on each pixel
pub fn erode(mask: &GrayImage, size: u32) -> GrayImage {
    square_filter(mask, size, Op::Erode)
}

/// Dilate then erode: fills gaps narrower than the kernel
pub fn close(mask: &GrayImage, size: u32) -> GrayImage {
    erode(&dilate(mask, size), size)
}

/// Erode then dilate: removes specks narrower than the kernel
pub fn open(mask: &GrayImage, size: u32) -> GrayImage {
    dilate(&erode(mask, size), size)
}

/// Square windows are separable: one horizontal pass, one vertical pass
fn square_filter(mask: &GrayImage, size: u32, op: Op) -> GrayImage {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 || size <= 1 {
        return mask.clone();
    }

    let before = (size - 1) / 2;
    let after = size - 1 - before;
    let (w, h) = (width as usize, height as usize);
    let src = mask.as_raw();

    let mut horizontal = vec![0u8; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = x.saturating_sub(before as usize);
            let hi = (x + after as usize).min(w - 1);
            horizontal[y * w + x] = row[lo..=hi]
                .iter()
                .copied()
                .reduce(|a, b| op.combine(a, b))
                .unwrap_or(row[x]);
        }
    }

    let mut filtered = GrayImage::new(width, height);
    let out: &mut [u8] = &mut filtered;
    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(before as usize);
            let hi = (y + after as usize).min(h - 1);
            let mut acc = horizontal[lo * w + x];
            for yy in lo + 1..=hi {
                acc = op.combine(acc, horizontal[yy * w + x]);
            }
            out[y * w + x] = acc;
        }
    }

    filtered
}
