//! ONNX backend on tract
//!
//! The model is parsed, optimized and turned into a runnable plan once at
//! load. `SimplePlan::run` takes `&self` and builds its own execution state
//! per call, so one plan serves concurrent callers without locking.

use std::collections::HashSet;
use std::path::Path;

use tract_onnx::pb;
use tract_onnx::prelude::*;
use tracing::debug;

use super::{InferenceBackend, ModelOutput};
use crate::error::{EncodeError, EncodeResult, LoadError, LoadResult};
use crate::tokenizer::TokenizedInput;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Which tokenizer output feeds a model input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputRole {
    InputIds,
    AttentionMask,
    TokenTypeIds,
}

impl InputRole {
    fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.contains("input_ids") {
            Some(InputRole::InputIds)
        } else if name.contains("attention_mask") {
            Some(InputRole::AttentionMask)
        } else if name.contains("token_type_ids") {
            Some(InputRole::TokenTypeIds)
        } else {
            None
        }
    }

    fn select<'a>(&self, input: &'a TokenizedInput) -> &'a [i64] {
        match self {
            InputRole::InputIds => &input.input_ids,
            InputRole::AttentionMask => &input.attention_mask,
            InputRole::TokenTypeIds => &input.token_type_ids,
        }
    }
}

/// Transformer encoder exported to ONNX
pub struct OnnxBackend {
    plan: OnnxPlan,
    inputs: Vec<InputRole>,
    dimension: usize,
    vocab_size: Option<usize>,
    pooled_output: bool,
    label: String,
}

impl OnnxBackend {
    /// Load, optimize and prepare an ONNX model
    pub fn load(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LoadError::MissingFile {
                what: "model",
                path: path.to_path_buf(),
            });
        }
        debug!("Loading ONNX model from {:?}", path);

        let onnx = tract_onnx::onnx();
        let vocab_size = {
            let proto = onnx
                .proto_model_for_path(path)
                .map_err(|e| LoadError::Model(format!("{}: {}", path.display(), e)))?;
            embedding_rows(&proto)
        };

        // Parsed from the path so external weight files resolve next to the model
        let model = onnx
            .model_for_path(path)
            .map_err(|e| LoadError::Model(format!("{}: {}", path.display(), e)))?;

        let label = format!(
            "onnx:{}",
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        Self::prepare(model, vocab_size, label)
    }

    /// Prepare a model that is already decoded in memory
    pub fn from_proto(proto: &pb::ModelProto) -> LoadResult<Self> {
        let vocab_size = embedding_rows(proto);
        let model = tract_onnx::onnx()
            .model_for_proto_model(proto)
            .map_err(|e| LoadError::Model(e.to_string()))?;

        let name = proto
            .graph
            .as_ref()
            .map(|graph| graph.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("inline");
        Self::prepare(model, vocab_size, format!("onnx:{}", name))
    }

    fn prepare(model: InferenceModel, vocab_size: Option<usize>, label: String) -> LoadResult<Self> {
        let mut inputs = Vec::new();
        for outlet in model
            .input_outlets()
            .map_err(|e| LoadError::Model(e.to_string()))?
        {
            let name = &model.node(outlet.node).name;
            let role = InputRole::from_name(name).ok_or_else(|| {
                LoadError::UnsupportedModel(format!("unrecognized model input '{}'", name))
            })?;
            inputs.push(role);
        }
        if !inputs.contains(&InputRole::InputIds) {
            return Err(LoadError::UnsupportedModel(
                "model has no input_ids input".to_string(),
            ));
        }

        let optimized = model
            .into_optimized()
            .map_err(|e| LoadError::Model(format!("optimization failed: {}", e)))?;

        let (dimension, pooled_output) = detect_output(&optimized)?;

        let plan = optimized
            .into_runnable()
            .map_err(|e| LoadError::Model(format!("failed to build plan: {}", e)))?;

        debug!(
            "ONNX model ready: inputs={:?} dimension={} vocab_size={:?} pooled_output={}",
            inputs, dimension, vocab_size, pooled_output
        );

        Ok(Self {
            plan,
            inputs,
            dimension,
            vocab_size,
            pooled_output,
            label,
        })
    }
}

/// Rows of the embedding table that `input_ids` indexes into
///
/// Follows `input_ids` through cast and reshape nodes to the first `Gather`
/// using it as indices, then reads the leading dimension of that Gather's
/// data input from an initializer or a `Constant` node.
fn embedding_rows(proto: &pb::ModelProto) -> Option<usize> {
    let graph = proto.graph.as_ref()?;
    let ids = graph
        .input
        .iter()
        .find(|input| InputRole::from_name(&input.name) == Some(InputRole::InputIds))?;

    let mut aliases: HashSet<&str> = HashSet::from([ids.name.as_str()]);
    for node in &graph.node {
        let Some(first) = node.input.first() else {
            continue;
        };
        match node.op_type.as_str() {
            "Gather"
                if node
                    .input
                    .get(1)
                    .is_some_and(|indices| aliases.contains(indices.as_str())) =>
            {
                return table_rows(graph, first);
            }
            "Cast" | "Identity" | "Reshape" | "Squeeze" | "Unsqueeze" | "Flatten"
                if aliases.contains(first.as_str()) =>
            {
                aliases.extend(node.output.iter().map(String::as_str));
            }
            _ => {}
        }
    }
    None
}

fn table_rows(graph: &pb::GraphProto, name: &str) -> Option<usize> {
    let dims = match graph.initializer.iter().find(|tensor| tensor.name == name) {
        Some(tensor) => &tensor.dims,
        None => {
            let constant = graph
                .node
                .iter()
                .find(|node| node.op_type == "Constant" && node.output.iter().any(|o| o == name))?;
            &constant
                .attribute
                .iter()
                .find(|attr| attr.name == "value")?
                .t
                .as_ref()?
                .dims
        }
    };
    dims.first()
        .and_then(|&rows| usize::try_from(rows).ok())
        .filter(|&rows| rows > 0)
}

/// Read the hidden size from the first output's last axis
///
/// Rank 3 is `[batch, seq, hidden]` (token states); rank 2 is `[batch, hidden]`.
fn detect_output(model: &TypedModel) -> LoadResult<(usize, bool)> {
    let fact = model
        .output_fact(0)
        .map_err(|e| LoadError::UnsupportedModel(format!("no output: {}", e)))?;
    let rank = fact.shape.rank();
    let pooled_output = match rank {
        3 => false,
        2 => true,
        _ => {
            return Err(LoadError::UnsupportedModel(format!(
                "output rank {} (expected 2 or 3)",
                rank
            )));
        }
    };

    let dimension = fact
        .shape
        .last()
        .and_then(|dim| dim.as_i64())
        .and_then(|dim| usize::try_from(dim).ok())
        .ok_or_else(|| {
            LoadError::UnsupportedModel("output hidden size is not a fixed number".to_string())
        })?;

    Ok((dimension, pooled_output))
}

impl InferenceBackend for OnnxBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vocab_size(&self) -> Option<usize> {
        self.vocab_size
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn forward(&self, input: &TokenizedInput) -> EncodeResult<ModelOutput> {
        let seq_len = input.len();

        let mut feeds: TVec<TValue> = tvec!();
        for role in &self.inputs {
            let array = tract_ndarray::Array2::from_shape_vec((1, seq_len), role.select(input).to_vec())
                .map_err(|e| EncodeError::Inference(format!("{:?} tensor: {}", role, e)))?;
            feeds.push(Tensor::from(array).into());
        }

        let outputs = self
            .plan
            .run(feeds)
            .map_err(|e| EncodeError::Inference(e.to_string()))?;

        let first = outputs
            .first()
            .ok_or_else(|| EncodeError::Inference("model produced no outputs".to_string()))?;
        let view = first
            .to_array_view::<f32>()
            .map_err(|e| EncodeError::Inference(format!("output is not f32: {}", e)))?;
        let values: Vec<f32> = view.iter().copied().collect();

        if self.pooled_output {
            Ok(ModelOutput::Pooled(values))
        } else {
            let rows = view.shape().get(1).copied().unwrap_or(0);
            Ok(ModelOutput::TokenStates {
                seq_len: rows,
                values,
            })
        }
    }
}
