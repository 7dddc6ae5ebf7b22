//! Cross-encoder relevance scoring
//!
//! A cross-encoder jointly scores a (query, document) pair, which is
//! more precise than comparing independently computed embeddings but too
//! expensive to run over the whole index. The reranking stage treats the
//! scorer as optional; loading failures downgrade to similarity order.

use anyhow::{Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{info, warn};

/// Multilingual model, scores Turkish-English pairs directly
pub const MULTILINGUAL_MODEL_ID: &str = "cross-encoder/mmarco-mMiniLMv2-L12-H384-v1";

/// English-only fallback model
pub const ENGLISH_MODEL_ID: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

const MAX_LENGTH: usize = 512;

/// Relevance model scoring (query, document) pairs, higher is better
pub trait RelevanceScorer: Send + Sync {
    fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>>;
}

/// BERT sequence-classification cross-encoder running on candle
pub struct CrossEncoderScorer {
    model: Arc<BertModel>,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    model_id: String,
}

impl CrossEncoderScorer {
    /// Load the preferred multilingual model, falling back to the
    /// English one. Returns None when neither loads so the pipeline can
    /// run without reranking.
    pub fn load_default() -> Option<Arc<dyn RelevanceScorer>> {
        match Self::new(MULTILINGUAL_MODEL_ID) {
            Ok(scorer) => {
                info!(model = MULTILINGUAL_MODEL_ID, "cross-encoder loaded");
                return Some(Arc::new(scorer));
            }
            Err(e) => {
                warn!(error = %e, "multilingual cross-encoder unavailable");
            }
        }

        match Self::new(ENGLISH_MODEL_ID) {
            Ok(scorer) => {
                info!(model = ENGLISH_MODEL_ID, "cross-encoder loaded");
                Some(Arc::new(scorer))
            }
            Err(e) => {
                warn!(error = %e, "cross-encoder unavailable, reranking disabled");
                None
            }
        }
    }

    /// Load a cross-encoder from HuggingFace Hub (downloads on first use)
    pub fn new(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo.get("config.json")
            .context("Failed to download model config")?;
        let tokenizer_path = repo.get("tokenizer.json")
            .context("Failed to download tokenizer")?;
        let weights_path = repo.get("model.safetensors")
            .context("Failed to download model weights")?;

        let config_contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;
        let config: Config = serde_json::from_str(&config_contents)
            .context("Failed to parse model config")?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };

        // BertForSequenceClassification layout: encoder under "bert",
        // tanh pooler over [CLS], single-logit classifier head
        let model = BertModel::load(vb.pp("bert"), &config)
            .context("Failed to create BERT model")?;
        let pooler = candle_nn::linear(
            config.hidden_size,
            config.hidden_size,
            vb.pp("bert.pooler.dense"),
        )
        .context("Failed to load pooler weights")?;
        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))
            .context("Failed to load classifier head")?;

        Ok(Self {
            model: Arc::new(model),
            pooler,
            classifier,
            tokenizer: Arc::new(tokenizer),
            device,
            model_id: model_id.to_string(),
        })
    }

    /// Model tag this scorer was loaded from
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn score_pair(&self, query: &str, document: &str) -> Result<f32> {
        let encoding = self
            .tokenizer
            .encode((query, document), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let len = encoding.get_ids().len();
        let token_ids =
            Tensor::from_vec(encoding.get_ids().to_vec(), (1, len), &self.device)?;
        let type_ids =
            Tensor::from_vec(encoding.get_type_ids().to_vec(), (1, len), &self.device)?;
        let attention_mask = Tensor::from_vec(
            encoding.get_attention_mask().to_vec(),
            (1, len),
            &self.device,
        )?;

        let hidden = self
            .model
            .forward(&token_ids, &type_ids, Some(&attention_mask))?;

        // [CLS] representation -> tanh pooler -> relevance logit
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;

        let score = logits.flatten_all()?.to_vec1::<f32>()?[0];
        Ok(score)
    }
}

impl RelevanceScorer for CrossEncoderScorer {
    fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        pairs
            .iter()
            .map(|(query, document)| self.score_pair(query, document))
            .collect()
    }
}
