//! CPU sentence encoder for all-MiniLM-L6-v2 (BERT, 6 layers, 384 dims).
//!
//! Weights are read from the sentence-transformers safetensors export; the
//! sentence vector is the mean of the last hidden states, L2-normalised.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Embedding, LayerNorm, Linear, VarBuilder};
use std::path::Path;
use tokenizers::TruncationParams;

use crate::embed::EmbeddingProvider;

const HIDDEN: usize = 384;
const INTERMEDIATE: usize = 1536;
const HEADS: usize = 12;
const LAYERS: usize = 6;
const VOCAB: usize = 30522;
const MAX_POSITIONS: usize = 512;
const TOKEN_TYPES: usize = 2;
const LN_EPS: f64 = 1e-12;

fn split_heads(x: Tensor, seq_len: usize) -> Result<Tensor> {
    Ok(x.reshape((1, seq_len, HEADS, HIDDEN / HEADS))?
        .transpose(1, 2)?
        .contiguous()?)
}

struct EncoderLayer {
    q: Linear,
    k: Linear,
    v: Linear,
    attn_out: Linear,
    attn_norm: LayerNorm,
    ffn_in: Linear,
    ffn_out: Linear,
    ffn_norm: LayerNorm,
}

impl EncoderLayer {
    fn load(vb: VarBuilder) -> Result<Self> {
        let attn = vb.pp("attention");
        let sa = attn.pp("self");
        Ok(Self {
            q: candle_nn::linear(HIDDEN, HIDDEN, sa.pp("query"))?,
            k: candle_nn::linear(HIDDEN, HIDDEN, sa.pp("key"))?,
            v: candle_nn::linear(HIDDEN, HIDDEN, sa.pp("value"))?,
            attn_out: candle_nn::linear(HIDDEN, HIDDEN, attn.pp("output").pp("dense"))?,
            attn_norm: candle_nn::layer_norm(HIDDEN, LN_EPS, attn.pp("output").pp("LayerNorm"))?,
            ffn_in: candle_nn::linear(HIDDEN, INTERMEDIATE, vb.pp("intermediate").pp("dense"))?,
            ffn_out: candle_nn::linear(INTERMEDIATE, HIDDEN, vb.pp("output").pp("dense"))?,
            ffn_norm: candle_nn::layer_norm(HIDDEN, LN_EPS, vb.pp("output").pp("LayerNorm"))?,
        })
    }

    fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let (_, seq_len, _) = hidden.dims3()?;
        let head_dim = HIDDEN / HEADS;

        let q = split_heads(self.q.forward(hidden)?, seq_len)?;
        let k = split_heads(self.k.forward(hidden)?, seq_len)?;
        let v = split_heads(self.v.forward(hidden)?, seq_len)?;

        let scores = q
            .matmul(&k.t()?)?
            .affine(1.0 / (head_dim as f64).sqrt(), 0.0)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((1, seq_len, HIDDEN))?;

        let hidden = self
            .attn_norm
            .forward(&(hidden + self.attn_out.forward(&context)?)?)?;
        let ffn = self
            .ffn_out
            .forward(&self.ffn_in.forward(&hidden)?.gelu_erf()?)?;
        Ok(self.ffn_norm.forward(&(hidden + ffn)?)?)
    }
}

struct MiniLm {
    words: Embedding,
    positions: Embedding,
    token_types: Embedding,
    embed_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    device: Device,
}

impl MiniLm {
    fn load(path: &Path, device: Device) -> Result<Self> {
        // SAFETY: the file is mapped read-only and not modified while loaded.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)? };
        let emb = vb.pp("embeddings");

        let layers = (0..LAYERS)
            .map(|i| EncoderLayer::load(vb.pp("encoder").pp("layer").pp(i.to_string())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            words: candle_nn::embedding(VOCAB, HIDDEN, emb.pp("word_embeddings"))?,
            positions: candle_nn::embedding(MAX_POSITIONS, HIDDEN, emb.pp("position_embeddings"))?,
            token_types: candle_nn::embedding(TOKEN_TYPES, HIDDEN, emb.pp("token_type_embeddings"))?,
            embed_norm: candle_nn::layer_norm(HIDDEN, LN_EPS, emb.pp("LayerNorm"))?,
            layers,
            device,
        })
    }

    fn encode(&self, token_ids: &[u32]) -> Result<Vec<f32>> {
        let seq_len = token_ids.len();
        let ids = Tensor::new(token_ids, &self.device)?;
        let pos: Vec<u32> = (0..seq_len as u32).collect();
        let pos = Tensor::new(pos.as_slice(), &self.device)?;
        let types = Tensor::zeros(seq_len, DType::U32, &self.device)?;

        let embedded = ((self.words.forward(&ids)? + self.positions.forward(&pos)?)?
            + self.token_types.forward(&types)?)?;
        let mut hidden = self.embed_norm.forward(&embedded)?.unsqueeze(0)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }

        let pooled = hidden.mean(1)?.squeeze(0)?;
        let norm: f32 = pooled.sqr()?.sum_all()?.sqrt()?.to_scalar()?;
        let pooled = if norm > 0.0 {
            pooled.affine(1.0 / norm as f64, 0.0)?
        } else {
            pooled
        };
        Ok(pooled.to_vec1::<f32>()?)
    }
}

pub struct MiniLmEmbeddingProvider {
    model: MiniLm,
    tokenizer: tokenizers::Tokenizer,
}

impl MiniLmEmbeddingProvider {
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let model = MiniLm::load(model_path, Device::Cpu)
            .with_context(|| format!("load MiniLM weights from {}", model_path.display()))?;
        let mut tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer {}: {e}", tokenizer_path.display()))?;
        // truncation keeps [CLS] and [SEP] inside the position budget
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_POSITIONS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("configure truncation: {e}"))?;
        Ok(Self { model, tokenizer })
    }

    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }
}

impl EmbeddingProvider for MiniLmEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let ids = self.token_ids(text)?;
        self.model.encode(&ids)
    }

    fn dimension(&self) -> usize {
        HIDDEN
    }
}
