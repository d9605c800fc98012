pub mod model;
pub mod pipeline;
pub mod tensor;

pub use model::{OnnxClassifier, SoundClassifier};
pub use pipeline::ClassificationPipeline;
pub use tensor::{InputTensor, TensorBuilder};
