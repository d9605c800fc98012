use std::path::Path;
use std::sync::Arc;

use siren_audio::{AudioClip, AudioDecoder, SpectrogramConfig, SpectrogramExtractor};
use siren_domain::{ClassifyError, SirenClass};
use tracing::{info, instrument};

use crate::model::SoundClassifier;
use crate::tensor::{InputTensor, TensorBuilder};

/// Decode, extract features, build the input tensor and classify.
#[derive(Clone)]
pub struct ClassificationPipeline {
    decoder: AudioDecoder,
    extractor: SpectrogramExtractor,
    tensors: TensorBuilder,
    classifier: Arc<dyn SoundClassifier>,
}

impl ClassificationPipeline {
    pub fn new(classifier: Arc<dyn SoundClassifier>) -> Self {
        Self {
            decoder: AudioDecoder::default(),
            extractor: SpectrogramExtractor::default(),
            tensors: TensorBuilder::default(),
            classifier,
        }
    }

    pub fn with_config(
        config: SpectrogramConfig,
        classifier: Arc<dyn SoundClassifier>,
    ) -> Result<Self, ClassifyError> {
        Ok(Self {
            decoder: AudioDecoder::new(config.sample_rate),
            extractor: SpectrogramExtractor::new(config)?,
            tensors: TensorBuilder::default(),
            classifier,
        })
    }

    #[instrument(skip(self, path), fields(path = ?path.as_ref()))]
    pub fn classify_file<P: AsRef<Path>>(&self, path: P) -> Result<SirenClass, ClassifyError> {
        let clip = self.decoder.open(path)?;
        info!(
            duration_secs = clip.duration_secs(),
            sample_rate = clip.sample_rate,
            "decoded clip"
        );
        self.classify_clip(&clip)
    }

    pub fn classify_clip(&self, clip: &AudioClip) -> Result<SirenClass, ClassifyError> {
        let tensor = self.features(clip)?;
        let class = self.classifier.classify(&tensor)?;
        info!(%class, "clip classified");
        Ok(class)
    }

    /// Model input for `clip` without running the classifier.
    pub fn features(&self, clip: &AudioClip) -> Result<InputTensor, ClassifyError> {
        let spectrogram = self.extractor.extract(clip)?;
        self.tensors.build(&spectrogram)
    }
}
