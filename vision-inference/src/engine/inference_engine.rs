use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use ndarray::{Array4, ArrayD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// An ONNX Runtime session usable from several threads; runs are serialised.
pub struct OnnxSession {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionProvider {
    CPU,
    CUDA(i32),
    TensorRT(i32),
}

impl FromStr for ExecutionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let (name, device) = match lower.split_once(':') {
            Some((name, id)) => (
                name,
                id.parse::<i32>()
                    .with_context(|| format!("Invalid device id in execution provider {s:?}"))?,
            ),
            None => (lower.as_str(), 0),
        };

        match name {
            "cpu" => Ok(ExecutionProvider::CPU),
            "cuda" => Ok(ExecutionProvider::CUDA(device)),
            "tensorrt" => Ok(ExecutionProvider::TensorRT(device)),
            _ => Err(anyhow!("Unknown execution provider {s:?}")),
        }
    }
}

impl Display for ExecutionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionProvider::CPU => write!(f, "cpu"),
            ExecutionProvider::CUDA(id) => write!(f, "cuda:{id}"),
            ExecutionProvider::TensorRT(id) => write!(f, "tensorrt:{id}"),
        }
    }
}

impl OnnxSession {
    pub fn new(url: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let url = url.as_ref();
        if !url.is_file() {
            bail!("Model file not found: {}", url.display());
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(6)?
            .with_execution_providers([match executor {
                ExecutionProvider::CUDA(id) => {
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(id)
                        .build()
                        .error_on_failure()
                }
                ExecutionProvider::TensorRT(id) => {
                    ort::execution_providers::TensorRTExecutionProvider::default()
                        .with_device_id(id)
                        .build()
                        .error_on_failure()
                }
                ExecutionProvider::CPU => ort::execution_providers::CPUExecutionProvider::default()
                    .build()
                    .error_on_failure(),
            }])?
            .commit_from_file(url)
            .with_context(|| format!("Failed to load model {}", url.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("Model {} declares no inputs", url.display()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| anyhow!("Model {} declares no outputs", url.display()))?;

        info!("Loaded {} on {executor} ({input_name} -> {output_name})", url.display());

        Ok(OnnxSession {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Custom metadata entry stored in the model, e.g. Ultralytics' `names`.
    pub fn metadata_value(&self, key: &str) -> Result<Option<String>> {
        let session = self.session.lock();
        let metadata = session.metadata()?;
        Ok(metadata.custom(key)?)
    }

    /// Run the model on a single input tensor and return its first output.
    pub fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let input = Tensor::from_array(input)?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
        debug!("Finish running model");

        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .into_owned();

        Ok(output)
    }
}
