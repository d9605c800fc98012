use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use siren_domain::{ClassifyError, SirenClass, INPUT_SHAPE};
use tracing::{debug, info};

use crate::tensor::InputTensor;

/// Maps a model input to one of the fixed classes.
///
/// Implementations must not mutate shared state observable by callers, so a
/// single instance can serve every request.
pub trait SoundClassifier: Send + Sync {
    fn classify(&self, input: &InputTensor) -> Result<SirenClass, ClassifyError>;
}

impl<C: SoundClassifier + ?Sized> SoundClassifier for Arc<C> {
    fn classify(&self, input: &InputTensor) -> Result<SirenClass, ClassifyError> {
        (**self).classify(input)
    }
}

/// Classifier backed by an ONNX export executed with ONNX Runtime.
pub struct OnnxClassifier {
    // `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    model_path: PathBuf,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, intra_threads: usize) -> Result<Self> {
        let model_path = path.as_ref().to_path_buf();
        info!(path = ?model_path, intra_threads, "loading classifier model");
        let session = Session::builder()
            .map_err(ort_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_error)?
            .with_intra_threads(intra_threads.max(1))
            .map_err(ort_error)?
            .commit_from_file(&model_path)
            .map_err(ort_error)
            .with_context(|| format!("load ONNX model {:?}", model_path))?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow::anyhow!("model {:?} declares no inputs", model_path))?;
        debug!(input_name = %input_name, outputs = session.outputs.len(), "model ready");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            model_path,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

fn ort_error<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow::anyhow!("onnx runtime: {err}")
}

impl SoundClassifier for OnnxClassifier {
    fn classify(&self, input: &InputTensor) -> Result<SirenClass, ClassifyError> {
        let shape = input.shape();
        if shape != INPUT_SHAPE {
            return Err(ClassifyError::shape(&INPUT_SHAPE, &shape));
        }
        let tensor = Tensor::from_array(input.as_array().clone())
            .map_err(|err| ClassifyError::inference(format!("tensor creation: {err}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifyError::inference("model session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|err| ClassifyError::inference(err.to_string()))?;
        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifyError::inference("model produced no output"))?;
        let (_shape, scores) = value
            .try_extract_tensor::<f32>()
            .map_err(|err| ClassifyError::inference(format!("output extraction: {err}")))?;
        let class = SirenClass::from_scores(scores)?;
        debug!(?scores, %class, "forward pass done");
        Ok(class)
    }
}
