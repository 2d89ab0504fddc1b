//! The three-stage MTCNN cascade.
//!
//! The proposal net scans a scale pyramid for face-like 12x12 cells, the refine
//! net re-scores 24x24 crops of the surviving boxes and the output net re-scores
//! 48x48 crops and predicts landmarks. The networks themselves sit behind
//! [`CascadeNets`]; everything between them lives here and in [`super::geometry`].

use image::RgbImage;
use mediagate_core::MtcnnConfig;
use ndarray::{Array3, Array4};

use super::geometry::{self, Candidate, Overlap};
use super::{FaceBox, FaceDetector};
use crate::error::{ProcessingError, ProcessingResult};

const PNET_LEVEL_NMS: f32 = 0.5;
const PNET_NMS: f32 = 0.7;
const RNET_NMS: f32 = 0.7;
const ONET_NMS: f32 = 0.7;
const RNET_INPUT: u32 = 24;
const ONET_INPUT: u32 = 48;

/// Proposal-net output for one pyramid level.
#[derive(Debug, Clone)]
pub struct ProposalMaps {
    pub width: usize,
    pub height: usize,
    /// Face probability per cell, row-major.
    pub face_prob: Vec<f32>,
    /// Four regression planes, one after another.
    pub reg: Vec<f32>,
}

impl ProposalMaps {
    pub fn new(
        width: usize,
        height: usize,
        face_prob: Vec<f32>,
        reg: Vec<f32>,
    ) -> ProcessingResult<Self> {
        let plane = width * height;
        if face_prob.len() != plane || reg.len() != 4 * plane {
            return Err(ProcessingError::Inference(format!(
                "Proposal maps do not match a {}x{} grid ({} probabilities, {} offsets)",
                width,
                height,
                face_prob.len(),
                reg.len()
            )));
        }
        Ok(Self {
            width,
            height,
            face_prob,
            reg,
        })
    }
}

/// Per-crop output of the refine or output net.
#[derive(Debug, Clone, Default)]
pub struct StageScores {
    pub scores: Vec<f32>,
    pub reg: Vec<[f32; 4]>,
    /// Only filled by the output net: five x offsets then five y offsets,
    /// relative to the crop.
    pub landmarks: Vec<[f32; 10]>,
}

impl StageScores {
    fn check(&self, expected: usize, stage: &str) -> ProcessingResult<()> {
        if self.scores.len() != expected || self.reg.len() != expected {
            return Err(ProcessingError::Inference(format!(
                "{} returned {} scores for {} crops",
                stage,
                self.scores.len(),
                expected
            )));
        }
        Ok(())
    }
}

/// The three networks of the cascade.
pub trait CascadeNets: Send + Sync {
    /// `[1, 3, h, w]` pyramid level in, proposal maps out.
    fn proposal(&self, input: &Array4<f32>) -> ProcessingResult<ProposalMaps>;

    /// `[n, 3, 24, 24]` crops in.
    fn refine(&self, input: &Array4<f32>) -> ProcessingResult<StageScores>;

    /// `[n, 3, 48, 48]` crops in, landmarks included.
    fn output(&self, input: &Array4<f32>) -> ProcessingResult<StageScores>;

    fn device(&self) -> &str {
        "cpu"
    }
}

/// MTCNN face detector over a set of networks.
pub struct Mtcnn<N> {
    nets: N,
    config: MtcnnConfig,
}

impl<N: CascadeNets> Mtcnn<N> {
    pub fn new(nets: N, config: MtcnnConfig) -> Self {
        Self { nets, config }
    }

    pub fn config(&self) -> &MtcnnConfig {
        &self.config
    }

    fn propose(&self, image: &RgbImage) -> ProcessingResult<Vec<Candidate>> {
        let (width, height) = image.dimensions();
        let scales =
            geometry::scale_pyramid(width, height, self.config.min_face_size, self.config.factor);

        let mut candidates = Vec::new();
        for scale in scales {
            let input = geometry::pyramid_input(image, scale);
            let maps = self.nets.proposal(&input)?;
            let level = geometry::generate_proposals(
                &maps.face_prob,
                &maps.reg,
                maps.width,
                maps.height,
                scale,
                self.config.thresholds[0],
            );
            candidates.extend(geometry::suppress(&level, PNET_LEVEL_NMS, Overlap::Union));
        }

        Ok(geometry::suppress(&candidates, PNET_NMS, Overlap::Union)
            .iter()
            .map(|c| geometry::rerec(&geometry::calibrate(c)))
            .collect())
    }

    fn refine(&self, image: &RgbImage, boxes: &[Candidate]) -> ProcessingResult<Vec<Candidate>> {
        let (batch, boxes) = geometry::crop_batch(image, boxes, RNET_INPUT);
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let out = self.nets.refine(&batch)?;
        out.check(boxes.len(), "Refine net")?;

        let passed: Vec<Candidate> = boxes
            .iter()
            .zip(out.scores.iter().zip(out.reg.iter()))
            .filter(|(_, (score, _))| **score > self.config.thresholds[1])
            .map(|(c, (score, reg))| Candidate {
                score: *score,
                reg: *reg,
                ..*c
            })
            .collect();

        Ok(geometry::suppress(&passed, RNET_NMS, Overlap::Union)
            .iter()
            .map(|c| geometry::rerec(&geometry::bbreg(c, c.reg)))
            .collect())
    }

    fn finish(&self, image: &RgbImage, boxes: &[Candidate]) -> ProcessingResult<Vec<FaceBox>> {
        let (batch, boxes) = geometry::crop_batch(image, boxes, ONET_INPUT);
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let out = self.nets.output(&batch)?;
        out.check(boxes.len(), "Output net")?;
        if out.landmarks.len() != boxes.len() {
            return Err(ProcessingError::Inference(format!(
                "Output net returned {} landmark sets for {} crops",
                out.landmarks.len(),
                boxes.len()
            )));
        }

        let mut passed = Vec::new();
        let mut points = Vec::new();
        for (i, c) in boxes.iter().enumerate() {
            let score = out.scores[i];
            if score <= self.config.thresholds[2] {
                continue;
            }

            // Landmarks are relative to the box before regression
            let w = c.x2 - c.x1 + 1.0;
            let h = c.y2 - c.y1 + 1.0;
            let lm = out.landmarks[i];
            let mut marks = [(0.0, 0.0); 5];
            for (k, mark) in marks.iter_mut().enumerate() {
                *mark = (w * lm[k] + c.x1 - 1.0, h * lm[k + 5] + c.y1 - 1.0);
            }

            passed.push(geometry::bbreg(&Candidate { score, ..*c }, out.reg[i]));
            points.push(marks);
        }

        let mut faces: Vec<FaceBox> = geometry::nms(&passed, ONET_NMS, Overlap::Min)
            .into_iter()
            .map(|i| {
                let c = passed[i];
                FaceBox {
                    x1: c.x1,
                    y1: c.y1,
                    x2: c.x2,
                    y2: c.y2,
                    score: c.score,
                    landmarks: Some(points[i]),
                }
            })
            .collect();

        faces.sort_by(|a, b| b.area().total_cmp(&a.area()));
        Ok(faces)
    }

    /// Crop the largest face out of the image as a `[3, image_size, image_size]`
    /// tensor using the configured margin and post-processing.
    pub fn extract(&self, image: &RgbImage) -> ProcessingResult<Option<Array3<f32>>> {
        let faces = self.detect(image)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };

        geometry::extract_face(
            image,
            (face.x1, face.y1, face.x2, face.y2),
            self.config.image_size,
            self.config.margin,
            self.config.post_process,
        )
        .map(Some)
    }
}

impl<N: CascadeNets> FaceDetector for Mtcnn<N> {
    fn detect(&self, image: &RgbImage) -> ProcessingResult<Vec<FaceBox>> {
        let proposals = self.propose(image)?;
        tracing::trace!(count = proposals.len(), "Proposal stage done");
        if proposals.is_empty() {
            return Ok(Vec::new());
        }

        let refined = self.refine(image, &proposals)?;
        tracing::trace!(count = refined.len(), "Refine stage done");
        if refined.is_empty() {
            return Ok(Vec::new());
        }

        self.finish(image, &refined)
    }

    fn device(&self) -> &str {
        self.nets.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Networks that give every input the same answer.
    struct ConstantNets {
        proposal: f32,
        refine: f32,
        output: f32,
    }

    impl CascadeNets for ConstantNets {
        fn proposal(&self, input: &Array4<f32>) -> ProcessingResult<ProposalMaps> {
            let shape = input.shape();
            let height = (shape[2] - 12) / 2 + 1;
            let width = (shape[3] - 12) / 2 + 1;
            let plane = width * height;
            ProposalMaps::new(
                width,
                height,
                vec![self.proposal; plane],
                vec![0.0; 4 * plane],
            )
        }

        fn refine(&self, input: &Array4<f32>) -> ProcessingResult<StageScores> {
            let n = input.shape()[0];
            Ok(StageScores {
                scores: vec![self.refine; n],
                reg: vec![[0.0; 4]; n],
                landmarks: Vec::new(),
            })
        }

        fn output(&self, input: &Array4<f32>) -> ProcessingResult<StageScores> {
            let n = input.shape()[0];
            Ok(StageScores {
                scores: vec![self.output; n],
                reg: vec![[0.0; 4]; n],
                landmarks: vec![[0.5; 10]; n],
            })
        }
    }

    fn detector(proposal: f32, refine: f32, output: f32) -> Mtcnn<ConstantNets> {
        Mtcnn::new(
            ConstantNets {
                proposal,
                refine,
                output,
            },
            MtcnnConfig::default(),
        )
    }

    fn gray_image() -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]))
    }

    #[test]
    fn test_all_stages_pass() {
        let faces = detector(0.9, 0.9, 0.9).detect(&gray_image()).unwrap();

        assert!(!faces.is_empty());
        for pair in faces.windows(2) {
            assert!(pair[0].area() >= pair[1].area());
        }
        let face = &faces[0];
        assert!((face.score - 0.9).abs() < 1e-6);
        let (lx, ly) = face.landmarks.unwrap()[0];
        assert!(lx >= face.x1 - 1.0 && ly >= face.y1 - 1.0);
    }

    #[test]
    fn test_proposal_threshold_rejects() {
        let faces = detector(0.5, 0.9, 0.9).detect(&gray_image()).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_refine_threshold_is_exclusive() {
        // 0.7 does not clear a 0.7 threshold
        let faces = detector(0.9, 0.7, 0.9).detect(&gray_image()).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_output_threshold_rejects() {
        let faces = detector(0.9, 0.9, 0.2).detect(&gray_image()).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_image_smaller_than_min_face() {
        let tiny = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let faces = detector(0.9, 0.9, 0.9).detect(&tiny).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_extract_largest_face() {
        let tensor = detector(0.9, 0.9, 0.9)
            .extract(&gray_image())
            .unwrap()
            .unwrap();
        assert_eq!(tensor.shape(), &[3, 160, 160]);

        assert!(detector(0.1, 0.9, 0.9)
            .extract(&gray_image())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_mismatched_stage_output() {
        struct Short;
        impl CascadeNets for Short {
            fn proposal(&self, input: &Array4<f32>) -> ProcessingResult<ProposalMaps> {
                ConstantNets {
                    proposal: 0.9,
                    refine: 0.9,
                    output: 0.9,
                }
                .proposal(input)
            }
            fn refine(&self, _input: &Array4<f32>) -> ProcessingResult<StageScores> {
                Ok(StageScores::default())
            }
            fn output(&self, _input: &Array4<f32>) -> ProcessingResult<StageScores> {
                Ok(StageScores::default())
            }
        }

        let result = Mtcnn::new(Short, MtcnnConfig::default()).detect(&gray_image());
        assert!(matches!(result, Err(ProcessingError::Inference(_))));
    }
}
