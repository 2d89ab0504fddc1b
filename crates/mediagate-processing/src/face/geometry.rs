//! Box arithmetic of the MTCNN cascade.
//!
//! Pure functions over candidate boxes: the scale pyramid, proposal generation
//! from the proposal-net maps, non-maximum suppression, box regression, squaring,
//! clipping and the input tensors fed to each stage.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array3, Array4};

use crate::error::{ProcessingError, ProcessingResult};

/// Receptive field of one proposal-net output cell, in pixels of the scaled image.
pub const CELL_SIZE: f32 = 12.0;
/// Step between adjacent proposal-net output cells.
pub const STRIDE: f32 = 2.0;

const PIXEL_MEAN: f32 = 127.5;
const PIXEL_SCALE: f32 = 0.0078125;

/// A box under consideration, with the regression offsets predicted for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub reg: [f32; 4],
}

impl Candidate {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
            reg: [0.0; 4],
        }
    }
}

/// How overlap is measured during suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Intersection over union, continuous areas.
    Union,
    /// Intersection over the smaller box, inclusive pixel areas.
    Min,
}

/// Scales at which the proposal net sees the image.
///
/// The first scale maps `min_face_size` onto the 12 pixel cell; each next level
/// shrinks by `factor` until the short side drops below one cell.
pub fn scale_pyramid(width: u32, height: u32, min_face_size: u32, factor: f32) -> Vec<f32> {
    let m = CELL_SIZE / min_face_size as f32;
    let mut min_side = width.min(height) as f32 * m;
    let mut scale = m;
    let mut scales = Vec::new();

    while min_side >= CELL_SIZE {
        scales.push(scale);
        scale *= factor;
        min_side *= factor;
    }

    scales
}

/// Image size at one pyramid level, as `(width, height)`.
pub fn scaled_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        (width as f32 * scale + 1.0) as u32,
        (height as f32 * scale + 1.0) as u32,
    )
}

/// Turn proposal-net output maps into candidates in source-image coordinates.
///
/// `face_prob` is the `map_height x map_width` face-probability plane, `reg` the four
/// regression planes laid out one after another.
pub fn generate_proposals(
    face_prob: &[f32],
    reg: &[f32],
    map_width: usize,
    map_height: usize,
    scale: f32,
    threshold: f32,
) -> Vec<Candidate> {
    let plane = map_width * map_height;
    let mut candidates = Vec::new();

    for y in 0..map_height {
        for x in 0..map_width {
            let i = y * map_width + x;
            let score = face_prob[i];
            if score < threshold {
                continue;
            }

            let (bx, by) = (x as f32, y as f32);
            candidates.push(Candidate {
                x1: ((STRIDE * bx + 1.0) / scale).floor(),
                y1: ((STRIDE * by + 1.0) / scale).floor(),
                x2: ((STRIDE * bx + CELL_SIZE) / scale).floor(),
                y2: ((STRIDE * by + CELL_SIZE) / scale).floor(),
                score,
                reg: [
                    reg[i],
                    reg[plane + i],
                    reg[2 * plane + i],
                    reg[3 * plane + i],
                ],
            });
        }
    }

    candidates
}

fn overlap(a: &Candidate, b: &Candidate, mode: Overlap) -> f32 {
    let pad = match mode {
        Overlap::Union => 0.0,
        Overlap::Min => 1.0,
    };

    let area_a = (a.x2 - a.x1 + pad) * (a.y2 - a.y1 + pad);
    let area_b = (b.x2 - b.x1 + pad) * (b.y2 - b.y1 + pad);

    let w = (a.x2.min(b.x2) - a.x1.max(b.x1) + pad).max(0.0);
    let h = (a.y2.min(b.y2) - a.y1.max(b.y1) + pad).max(0.0);
    let inter = w * h;

    let denom = match mode {
        Overlap::Union => area_a + area_b - inter,
        Overlap::Min => area_a.min(area_b),
    };

    if denom <= 0.0 {
        0.0
    } else {
        inter / denom
    }
}

/// Greedy non-maximum suppression.
///
/// Returns the indices of the kept candidates, highest score first. A candidate is
/// dropped when its overlap with an already kept one exceeds `threshold`.
pub fn nms(candidates: &[Candidate], threshold: f32, mode: Overlap) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        let suppressed = keep
            .iter()
            .any(|&k| overlap(&candidates[k], &candidates[i], mode) > threshold);
        if !suppressed {
            keep.push(i);
        }
    }

    keep
}

/// Run [`nms`] and return the kept candidates.
pub fn suppress(candidates: &[Candidate], threshold: f32, mode: Overlap) -> Vec<Candidate> {
    nms(candidates, threshold, mode)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}

/// Apply proposal-stage regression, scaled by the exclusive box size.
pub fn calibrate(c: &Candidate) -> Candidate {
    let w = c.x2 - c.x1;
    let h = c.y2 - c.y1;
    Candidate {
        x1: c.x1 + c.reg[0] * w,
        y1: c.y1 + c.reg[1] * h,
        x2: c.x2 + c.reg[2] * w,
        y2: c.y2 + c.reg[3] * h,
        score: c.score,
        reg: [0.0; 4],
    }
}

/// Apply refine/output-stage regression, scaled by the inclusive box size.
pub fn bbreg(c: &Candidate, reg: [f32; 4]) -> Candidate {
    let w = c.x2 - c.x1 + 1.0;
    let h = c.y2 - c.y1 + 1.0;
    Candidate {
        x1: c.x1 + reg[0] * w,
        y1: c.y1 + reg[1] * h,
        x2: c.x2 + reg[2] * w,
        y2: c.y2 + reg[3] * h,
        score: c.score,
        reg: [0.0; 4],
    }
}

/// Grow a box into a square around its center, keeping the longer side.
pub fn rerec(c: &Candidate) -> Candidate {
    let w = c.x2 - c.x1;
    let h = c.y2 - c.y1;
    let l = w.max(h);
    let x1 = c.x1 + w * 0.5 - l * 0.5;
    let y1 = c.y1 + h * 0.5 - l * 0.5;
    Candidate {
        x1,
        y1,
        x2: x1 + l,
        y2: y1 + l,
        score: c.score,
        reg: c.reg,
    }
}

/// A box truncated to whole pixels and clipped to the image, 1-based on the
/// leading edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: i32,
    pub y: i32,
    pub ex: i32,
    pub ey: i32,
}

impl CropWindow {
    /// Pixel region `(left, top, width, height)` the window covers, if any.
    pub fn region(&self) -> Option<(u32, u32, u32, u32)> {
        let left = self.x - 1;
        let top = self.y - 1;
        if self.ex > left && self.ey > top {
            Some((
                left as u32,
                top as u32,
                (self.ex - left) as u32,
                (self.ey - top) as u32,
            ))
        } else {
            None
        }
    }
}

pub fn pad(c: &Candidate, width: u32, height: u32) -> CropWindow {
    CropWindow {
        x: (c.x1.trunc() as i32).max(1),
        y: (c.y1.trunc() as i32).max(1),
        ex: (c.x2.trunc() as i32).min(width as i32),
        ey: (c.y2.trunc() as i32).min(height as i32),
    }
}

/// Write one image into slot `n` of an NCHW batch, scaled to roughly [-1, 1].
fn write_normalized(batch: &mut Array4<f32>, n: usize, image: &RgbImage) {
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            batch[[n, c, y as usize, x as usize]] = (pixel.0[c] as f32 - PIXEL_MEAN) * PIXEL_SCALE;
        }
    }
}

/// Proposal-net input for one pyramid level: `[1, 3, h, w]`.
pub fn pyramid_input(image: &RgbImage, scale: f32) -> Array4<f32> {
    let (w, h) = scaled_size(image.width(), image.height(), scale);
    let resized = imageops::resize(image, w, h, FilterType::Triangle);
    let mut batch = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    write_normalized(&mut batch, 0, &resized);
    batch
}

/// Crop every candidate out of the image, resize to `size x size` and stack.
///
/// Candidates whose clipped window is empty are dropped; the returned candidates
/// line up with the rows of the batch.
pub fn crop_batch(
    image: &RgbImage,
    candidates: &[Candidate],
    size: u32,
) -> (Array4<f32>, Vec<Candidate>) {
    let (width, height) = image.dimensions();
    let crops: Vec<(RgbImage, Candidate)> = candidates
        .iter()
        .filter_map(|c| {
            let (left, top, w, h) = pad(c, width, height).region()?;
            let crop = imageops::crop_imm(image, left, top, w, h).to_image();
            Some((
                imageops::resize(&crop, size, size, FilterType::Triangle),
                *c,
            ))
        })
        .collect();

    let mut batch = Array4::<f32>::zeros((crops.len(), 3, size as usize, size as usize));
    for (n, (crop, _)) in crops.iter().enumerate() {
        write_normalized(&mut batch, n, crop);
    }

    (batch, crops.into_iter().map(|(_, c)| c).collect())
}

/// Cut a face out of the image as a `[3, image_size, image_size]` tensor.
///
/// `margin` is in pixels of the final crop. With `post_process` the values are
/// standardized as `(x - 127.5) / 128`, otherwise they stay in [0, 255].
pub fn extract_face(
    image: &RgbImage,
    face: (f32, f32, f32, f32),
    image_size: u32,
    margin: u32,
    post_process: bool,
) -> ProcessingResult<Array3<f32>> {
    let (x1, y1, x2, y2) = face;
    let (width, height) = image.dimensions();
    let size = image_size as f32;
    let margin = margin as f32;
    let margin_x = margin * (x2 - x1) / (size - margin);
    let margin_y = margin * (y2 - y1) / (size - margin);

    let left = (x1 - margin_x / 2.0).max(0.0) as u32;
    let top = (y1 - margin_y / 2.0).max(0.0) as u32;
    let right = (x2 + margin_x / 2.0).min(width as f32) as u32;
    let bottom = (y2 + margin_y / 2.0).min(height as f32) as u32;

    if right <= left || bottom <= top {
        return Err(ProcessingError::Inference(format!(
            "Face box ({}, {}, {}, {}) is outside the image",
            x1, y1, x2, y2
        )));
    }

    let crop = imageops::crop_imm(image, left, top, right - left, bottom - top).to_image();
    let resized = imageops::resize(&crop, image_size, image_size, FilterType::Triangle);

    let mut tensor = Array3::<f32>::zeros((3, image_size as usize, image_size as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = pixel.0[c] as f32;
            tensor[[c, y as usize, x as usize]] = if post_process {
                (v - PIXEL_MEAN) / 128.0
            } else {
                v
            };
        }
    }

    Ok(tensor)
}
