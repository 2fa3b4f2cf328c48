//! Local embedding generation using all-MiniLM-L6-v2 via candle.
//!
//! Produces 384-dimensional normalized embeddings. The model is loaded once per
//! run, either from a local sentence-transformers directory or from the
//! Hugging Face Hub, and shared read-only by every similarity call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, HiddenAct, DTYPE};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::error::{Error, Result};
use crate::ranking::Similarity;
use crate::similarity::cosine_similarity;

pub const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const REVISION: &str = "main";
const EMBEDDING_DIM: usize = 384;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Where the model files come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Directory holding config.json, tokenizer.json and model.safetensors
    Local(PathBuf),
    /// Hugging Face Hub repository (downloads on first use)
    Hub { model_id: String, revision: String },
}

impl ModelSource {
    /// Prefer a complete local directory, fall back to the hub.
    pub fn resolve(local_dir: Option<&Path>, model_id: &str, revision: &str) -> Self {
        match local_dir {
            Some(dir) if has_model_files(dir) => ModelSource::Local(dir.to_path_buf()),
            _ => ModelSource::Hub { model_id: model_id.to_string(), revision: revision.to_string() },
        }
    }

    /// (config, tokenizer, weights) paths
    fn files(&self) -> Result<(PathBuf, PathBuf, PathBuf)> {
        match self {
            ModelSource::Local(dir) => Ok((dir.join(CONFIG_FILE), dir.join(TOKENIZER_FILE), dir.join(WEIGHTS_FILE))),
            ModelSource::Hub { model_id, revision } => {
                let api = Api::new().map_err(|e| Error::Embedding(format!("Failed to create HF API: {}", e)))?;
                let repo = api.repo(Repo::with_revision(model_id.clone(), RepoType::Model, revision.clone()));

                let config_path = repo
                    .get(CONFIG_FILE)
                    .map_err(|e| Error::Embedding(format!("Failed to download config: {}", e)))?;
                let tokenizer_path = repo
                    .get(TOKENIZER_FILE)
                    .map_err(|e| Error::Embedding(format!("Failed to download tokenizer: {}", e)))?;
                let weights_path = repo
                    .get(WEIGHTS_FILE)
                    .map_err(|e| Error::Embedding(format!("Failed to download weights: {}", e)))?;
                Ok((config_path, tokenizer_path, weights_path))
            }
        }
    }
}

fn has_model_files(dir: &Path) -> bool {
    [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE].iter().all(|f| dir.join(f).is_file())
}

/// Local embedding model wrapper
pub struct LocalEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl LocalEmbedder {
    pub fn load(source: &ModelSource) -> Result<Self> {
        // Try CUDA if feature enabled, otherwise CPU only
        #[cfg(feature = "cuda")]
        let device = if candle_core::utils::cuda_is_available() {
            match Device::new_cuda(0) {
                Ok(dev) => {
                    tracing::info!("Using CUDA device (GPU)");
                    dev
                }
                Err(e) => {
                    tracing::warn!("CUDA device creation failed: {}, falling back to CPU", e);
                    Device::Cpu
                }
            }
        } else {
            tracing::info!("CUDA not available, using CPU");
            Device::Cpu
        };

        #[cfg(not(feature = "cuda"))]
        let device = {
            tracing::debug!("Using CPU (cuda feature not enabled)");
            Device::Cpu
        };

        let (config_path, tokenizer_path, weights_path) = source.files()?;

        // Load config
        let config_str = std::fs::read_to_string(&config_path).map_err(|e| Error::io(&config_path, e))?;
        let mut config: Config = serde_json::from_str(&config_str)?;

        // MiniLM uses gelu activation
        config.hidden_act = HiddenAct::Gelu;

        // Load tokenizer
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        // Configure tokenizer for batch processing
        let padding = PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        };
        let truncation = TruncationParams {
            max_length: 512,
            ..Default::default()
        };
        tokenizer.with_padding(Some(padding));
        tokenizer
            .with_truncation(Some(truncation))
            .map_err(|e| Error::Embedding(format!("Failed to set truncation: {}", e)))?;

        // Load model weights
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| Error::Embedding(format!("Failed to load weights: {}", e)))?
        };

        let model = BertModel::load(vb, &config)
            .map_err(|e| Error::Embedding(format!("Failed to build model: {}", e)))?;

        tracing::info!(source = ?source, "Embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Generate embedding for a single text
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Model returned no embedding".to_string()))
    }

    /// Generate embeddings for a batch of texts
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let candle_err = |what: &str, e: candle_core::Error| Error::Embedding(format!("{}: {}", what, e));

        // Tokenize
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::Embedding(format!("Tokenization failed: {}", e)))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        // Build input tensors
        let mut all_ids = Vec::with_capacity(batch_size * seq_len);
        let mut all_mask = Vec::with_capacity(batch_size * seq_len);
        let mut all_type_ids = Vec::with_capacity(batch_size * seq_len);

        for encoding in &encodings {
            all_ids.extend(encoding.get_ids().iter().map(|&x| x as i64));
            all_mask.extend(encoding.get_attention_mask().iter().map(|&x| x as i64));
            all_type_ids.extend(encoding.get_type_ids().iter().map(|&x| x as i64));
        }

        let input_ids = Tensor::from_vec(all_ids, (batch_size, seq_len), &self.device)
            .map_err(|e| candle_err("Failed to create input_ids tensor", e))?;
        let attention_mask = Tensor::from_vec(all_mask, (batch_size, seq_len), &self.device)
            .map_err(|e| candle_err("Failed to create attention_mask tensor", e))?;
        let token_type_ids = Tensor::from_vec(all_type_ids, (batch_size, seq_len), &self.device)
            .map_err(|e| candle_err("Failed to create token_type_ids tensor", e))?;

        // Forward pass
        let hidden_states = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| candle_err("Model forward failed", e))?;

        // Mean pooling with attention mask
        let mask_expanded = attention_mask
            .unsqueeze(2)
            .map_err(|e| candle_err("Unsqueeze failed", e))?
            .to_dtype(DTYPE)
            .map_err(|e| candle_err("Dtype conversion failed", e))?
            .broadcast_as(hidden_states.shape())
            .map_err(|e| candle_err("Broadcast failed", e))?;

        let summed = hidden_states
            .mul(&mask_expanded)
            .map_err(|e| candle_err("Multiply failed", e))?
            .sum(1)
            .map_err(|e| candle_err("Sum failed", e))?;

        let mask_sum = mask_expanded
            .sum(1)
            .map_err(|e| candle_err("Mask sum failed", e))?
            .clamp(1e-9, f64::MAX)
            .map_err(|e| candle_err("Clamp failed", e))?;

        let pooled = summed.div(&mask_sum).map_err(|e| candle_err("Division failed", e))?;

        // L2 normalize
        let norm = pooled
            .sqr()
            .map_err(|e| candle_err("Sqr failed", e))?
            .sum_keepdim(1)
            .map_err(|e| candle_err("Sum keepdim failed", e))?
            .sqrt()
            .map_err(|e| candle_err("Sqrt failed", e))?
            .clamp(1e-12, f64::MAX)
            .map_err(|e| candle_err("Clamp failed", e))?;

        let normalized = pooled
            .broadcast_div(&norm)
            .map_err(|e| candle_err("Normalize failed", e))?;

        let rows: Vec<Vec<f32>> = normalized.to_vec2().map_err(|e| candle_err("To vec failed", e))?;
        debug_assert!(rows.iter().all(|r| r.len() == EMBEDDING_DIM));
        Ok(rows)
    }
}

/// Cosine similarity over MiniLM embeddings, memoizing every embedded text.
///
/// Persona and task are compared against every heading, so their vectors are
/// computed once per run.
pub struct EmbeddingSimilarity {
    embedder: LocalEmbedder,
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingSimilarity {
    pub fn new(embedder: LocalEmbedder) -> Self {
        Self { embedder, cache: Mutex::new(HashMap::new()) }
    }

    pub fn load(source: &ModelSource) -> Result<Self> {
        Ok(Self::new(LocalEmbedder::load(source)?))
    }

    fn embedding(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(text).cloned()) {
            return Ok(hit);
        }
        let embedding = self.embedder.embed(text)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}

impl Similarity for EmbeddingSimilarity {
    fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        let a = self.embedding(a)?;
        let b = self.embedding(b)?;
        Ok(cosine_similarity(&a, &b))
    }
}
