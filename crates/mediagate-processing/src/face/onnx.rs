//! ONNX Runtime networks for the MTCNN cascade.
//!
//! The model directory holds `pnet.onnx`, `rnet.onnx` and `onet.onnx`, produced by
//! `scripts/export_mtcnn_onnx.py` from the pretrained MTCNN weights. Inputs are NCHW
//! floats normalized to `(x - 127.5) / 128`. Output order per model:
//!
//! - `pnet.onnx`: `[1, 4, h, w]` box offsets, `[1, 2, h, w]` softmax
//! - `rnet.onnx`: `[n, 4]` box offsets, `[n, 2]` softmax
//! - `onet.onnx`: `[n, 4]` box offsets, `[n, 10]` landmarks, `[n, 2]` softmax
//!
//! The proposal net must accept dynamic height and width.

use std::path::Path;
use std::sync::Mutex;

use mediagate_core::ComputeDevice;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use super::cascade::{CascadeNets, ProposalMaps, StageScores};
use crate::error::{ProcessingError, ProcessingResult};

pub const PNET_FILE: &str = "pnet.onnx";
pub const RNET_FILE: &str = "rnet.onnx";
pub const ONET_FILE: &str = "onet.onnx";

struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// The three cascade networks, each behind its own session lock.
pub struct OnnxNets {
    pnet: Mutex<Session>,
    rnet: Mutex<Session>,
    onet: Mutex<Session>,
    device: &'static str,
}

// SAFETY: ort::Session is Send + Sync internally (uses Arc<SharedSessionInner>),
// and every run goes through the session's Mutex.
unsafe impl Send for OnnxNets {}
unsafe impl Sync for OnnxNets {}

impl OnnxNets {
    /// Load all three networks from `model_dir` onto the requested device.
    ///
    /// `Auto` picks CUDA when this build has it and the provider is usable, the
    /// CPU otherwise. An explicit `Cuda` request fails if CUDA cannot be used.
    pub fn load(model_dir: &Path, device: ComputeDevice) -> ProcessingResult<Self> {
        let use_cuda = resolve_cuda(device)?;
        let label = if use_cuda { "cuda:0" } else { "cpu" };

        tracing::info!(
            model_dir = %model_dir.display(),
            device = label,
            "Loading MTCNN models"
        );

        let nets = Self {
            pnet: Mutex::new(build_session(&model_dir.join(PNET_FILE), use_cuda)?),
            rnet: Mutex::new(build_session(&model_dir.join(RNET_FILE), use_cuda)?),
            onet: Mutex::new(build_session(&model_dir.join(ONET_FILE), use_cuda)?),
            device: label,
        };

        tracing::info!(device = label, "MTCNN models loaded");
        Ok(nets)
    }
}

#[cfg(feature = "cuda")]
fn resolve_cuda(device: ComputeDevice) -> ProcessingResult<bool> {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    let available = CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false);

    match device {
        ComputeDevice::Cpu => Ok(false),
        ComputeDevice::Auto => Ok(available),
        ComputeDevice::Cuda if available => Ok(true),
        ComputeDevice::Cuda => Err(ProcessingError::ModelLoad(
            "CUDA was requested but the CUDA execution provider is not available".to_string(),
        )),
    }
}

#[cfg(not(feature = "cuda"))]
fn resolve_cuda(device: ComputeDevice) -> ProcessingResult<bool> {
    match device {
        ComputeDevice::Cpu | ComputeDevice::Auto => Ok(false),
        ComputeDevice::Cuda => Err(ProcessingError::ModelLoad(
            "CUDA was requested but this build has no CUDA support (enable the `cuda` feature)"
                .to_string(),
        )),
    }
}

fn build_session(path: &Path, use_cuda: bool) -> ProcessingResult<Session> {
    if !path.exists() {
        return Err(ProcessingError::ModelLoad(format!(
            "MTCNN model not found: {}",
            path.display()
        )));
    }

    let builder = Session::builder()
        .map_err(|e| ProcessingError::ModelLoad(format!("ONNX session builder: {}", e)))?
        .with_intra_threads(1)
        .map_err(|e| ProcessingError::ModelLoad(format!("ONNX set threads: {}", e)))?;

    #[cfg(feature = "cuda")]
    let builder = if use_cuda {
        builder
            .with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default().build()
            ])
            .map_err(|e| ProcessingError::ModelLoad(format!("ONNX CUDA provider: {}", e)))?
    } else {
        builder
    };
    #[cfg(not(feature = "cuda"))]
    let _ = use_cuda;

    builder.commit_from_file(path).map_err(|e| {
        ProcessingError::ModelLoad(format!("Failed to load {}: {}", path.display(), e))
    })
}

fn run(session: &Mutex<Session>, input: &Array4<f32>, name: &str) -> ProcessingResult<Vec<Tensor>> {
    let input_ref = TensorRef::from_array_view(input)
        .map_err(|e| ProcessingError::Inference(format!("{} input tensor: {}", name, e)))?;

    let mut session = session.lock().map_err(|e| {
        ProcessingError::Inference(format!("{} session lock poisoned: {}", name, e))
    })?;
    let outputs = session
        .run(ort::inputs![input_ref])
        .map_err(|e| ProcessingError::Inference(format!("{} inference failed: {}", name, e)))?;

    let mut tensors = Vec::with_capacity(outputs.len());
    for i in 0..outputs.len() {
        // ort 2.0 try_extract_tensor returns (&Shape, &[f32]).
        let (shape, data) = outputs[i]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProcessingError::Inference(format!("{} output {}: {}", name, i, e)))?;
        tensors.push(Tensor {
            shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
            data: data.to_vec(),
        });
    }

    Ok(tensors)
}

fn expect_outputs(tensors: &[Tensor], count: usize, name: &str) -> ProcessingResult<()> {
    if tensors.len() < count {
        return Err(ProcessingError::Inference(format!(
            "{} produced {} outputs, expected {}",
            name,
            tensors.len(),
            count
        )));
    }
    Ok(())
}

/// Column 1 of an `[n, 2]` softmax.
fn face_scores(prob: &Tensor, n: usize, name: &str) -> ProcessingResult<Vec<f32>> {
    if prob.data.len() != n * 2 {
        return Err(ProcessingError::Inference(format!(
            "{} probabilities have shape {:?}",
            name, prob.shape
        )));
    }
    Ok(prob.data.chunks_exact(2).map(|p| p[1]).collect())
}

fn rows<const W: usize>(t: &Tensor, n: usize, name: &str) -> ProcessingResult<Vec<[f32; W]>> {
    if t.data.len() != n * W {
        return Err(ProcessingError::Inference(format!(
            "{} output has shape {:?}, expected [{}, {}]",
            name, t.shape, n, W
        )));
    }
    Ok(t.data
        .chunks_exact(W)
        .map(|row| {
            let mut out = [0.0; W];
            out.copy_from_slice(row);
            out
        })
        .collect())
}

impl CascadeNets for OnnxNets {
    fn proposal(&self, input: &Array4<f32>) -> ProcessingResult<ProposalMaps> {
        let mut out = run(&self.pnet, input, "PNet")?;
        expect_outputs(&out, 2, "PNet")?;
        let prob = out.swap_remove(1);
        let reg = out.swap_remove(0);

        if prob.shape.len() != 4 || prob.shape[1] != 2 {
            return Err(ProcessingError::Inference(format!(
                "PNet probabilities have shape {:?}",
                prob.shape
            )));
        }
        let (height, width) = (prob.shape[2], prob.shape[3]);
        let plane = height * width;
        if prob.data.len() != 2 * plane {
            return Err(ProcessingError::Inference(format!(
                "PNet probabilities have shape {:?}, expected a batch of one",
                prob.shape
            )));
        }

        // Channel 1 is the face class
        let face_prob = prob.data[plane..2 * plane].to_vec();
        ProposalMaps::new(width, height, face_prob, reg.data)
    }

    fn refine(&self, input: &Array4<f32>) -> ProcessingResult<StageScores> {
        let n = input.shape()[0];
        let out = run(&self.rnet, input, "RNet")?;
        expect_outputs(&out, 2, "RNet")?;

        Ok(StageScores {
            reg: rows::<4>(&out[0], n, "RNet")?,
            scores: face_scores(&out[1], n, "RNet")?,
            landmarks: Vec::new(),
        })
    }

    fn output(&self, input: &Array4<f32>) -> ProcessingResult<StageScores> {
        let n = input.shape()[0];
        let out = run(&self.onet, input, "ONet")?;
        expect_outputs(&out, 3, "ONet")?;

        Ok(StageScores {
            reg: rows::<4>(&out[0], n, "ONet")?,
            landmarks: rows::<10>(&out[1], n, "ONet")?,
            scores: face_scores(&out[2], n, "ONet")?,
        })
    }

    fn device(&self) -> &str {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_models_fail_to_load() {
        let dir = tempdir().unwrap();
        let result = OnnxNets::load(dir.path(), ComputeDevice::Cpu);
        assert!(
            matches!(result, Err(ProcessingError::ModelLoad(ref m)) if m.contains("pnet.onnx"))
        );
    }

    #[test]
    fn test_rows_and_scores() {
        let prob = Tensor {
            shape: vec![2, 2],
            data: vec![0.9, 0.1, 0.2, 0.8],
        };
        assert_eq!(face_scores(&prob, 2, "test").unwrap(), vec![0.1, 0.8]);

        let reg = Tensor {
            shape: vec![1, 4],
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        assert_eq!(
            rows::<4>(&reg, 1, "test").unwrap(),
            vec![[1.0, 2.0, 3.0, 4.0]]
        );
        assert!(rows::<4>(&reg, 2, "test").is_err());
    }
}
