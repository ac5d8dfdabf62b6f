use super::types::*;
use super::vocab;
use crate::{Error, Result};
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::{MAX_SEQ_LEN, ModelWeights};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

const EOS_TOKENS: &[&str] = &[
    "</s>",
    "<|eot_id|>",
    "<|end_of_text|>",
    "<|im_end|>",
    "<|endoftext|>",
    "<eos>",
];
const BOS_TOKENS: &[&str] = &["<s>", "<|begin_of_text|>", "<bos>"];

/// Quantized llama weights plus everything needed to sample from them.
pub(crate) struct LoadedModel {
    weights: ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    pool: ThreadPool,
    eos_token_id: Option<u32>,
    bos_token_id: Option<u32>,
    options: LoadOptions,
}

impl LoadedModel {
    pub(crate) fn load(model_path: &Path, options: &LoadOptions) -> Result<Self> {
        info!("Loading model: {}", model_path.display());
        let options = &LoadOptions {
            n_ctx: supported_context(options.n_ctx),
            ..*options
        };

        let mut file = File::open(model_path).map_err(|e| {
            Error::model_load(format!(
                "failed to open model file {}: {e}",
                model_path.display()
            ))
        })?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(options.n_threads)
            .thread_name(|i| format!("gguf-infer-{i}"))
            .build()
            .map_err(|e| {
                Error::model_load(format!(
                    "failed to start {} worker threads: {e}",
                    options.n_threads
                ))
            })?;
        let device = select_device(options)?;

        let content = gguf_file::Content::read(&mut file).map_err(|e| {
            Error::model_load(format!(
                "failed to read GGUF file {}: {e}",
                model_path.display()
            ))
        })?;

        if let Some(trained) = trained_context_length(&content) {
            if options.n_ctx > trained {
                warn!(
                    n_ctx = options.n_ctx,
                    trained, "Context window exceeds the model's training context"
                );
            }
        }
        let metadata_eos = metadata_u32(&content, "tokenizer.ggml.eos_token_id");
        let metadata_bos = metadata_u32(&content, "tokenizer.ggml.bos_token_id");

        let tokenizer = match find_tokenizer(model_path) {
            Some(tokenizer_path) => {
                debug!("Loading tokenizer from {}", tokenizer_path.display());
                Tokenizer::from_file(&tokenizer_path).map_err(|e| {
                    Error::tokenizer(format!(
                        "failed to load {}: {e}",
                        tokenizer_path.display()
                    ))
                })?
            }
            None => {
                debug!("Building tokenizer from GGUF metadata");
                vocab::from_gguf_metadata(&content.metadata)?
            }
        };

        let weights = pool
            .install(|| ModelWeights::from_gguf(content, &mut file, &device))
            .map_err(|e| {
                Error::model_load(format!(
                    "failed to build model from {}: {e}",
                    model_path.display()
                ))
            })?;

        let eos_token_id =
            metadata_eos.or_else(|| first_known(EOS_TOKENS, |t| tokenizer.token_to_id(t)));
        let bos_token_id =
            metadata_bos.or_else(|| first_known(BOS_TOKENS, |t| tokenizer.token_to_id(t)));
        if eos_token_id.is_none() {
            warn!("No end-of-sequence token found, generation runs to the token limit");
        }

        info!(
            device = ?device,
            n_threads = options.n_threads,
            n_ctx = options.n_ctx,
            n_batch = options.n_batch,
            "Model loaded"
        );

        Ok(Self {
            weights,
            tokenizer,
            device,
            pool,
            eos_token_id,
            bos_token_id,
            options: *options,
        })
    }

    pub(crate) fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| Error::tokenizer(format!("failed to encode prompt: {e}")))?;
        let mut prompt_tokens = encoding.get_ids().to_vec();

        if prompt_tokens.is_empty() {
            match self.bos_token_id {
                Some(bos) => prompt_tokens.push(bos),
                None => {
                    debug!("Empty prompt and no BOS token, nothing to generate");
                    return Ok(Completion::new("", FinishReason::Stop));
                }
            }
        }

        let n_ctx = self.options.n_ctx;
        if prompt_tokens.len() >= n_ctx {
            return Err(Error::generation(format!(
                "Requested tokens ({}) exceed context window of {}",
                prompt_tokens.len(),
                n_ctx
            )));
        }
        let budget = params.max_tokens.min(n_ctx - prompt_tokens.len());

        info!(
            prompt_tokens = prompt_tokens.len(),
            max_tokens = budget,
            temperature = params.temperature,
            top_p = params.top_p,
            "Generating response"
        );

        let Self {
            weights,
            device,
            pool,
            eos_token_id,
            options,
            ..
        } = &mut *self;
        let (generated, finish_reason) = pool.install(|| {
            sample_tokens(
                weights,
                device,
                &prompt_tokens,
                options.n_batch,
                budget,
                *eos_token_id,
                params,
            )
        })?;

        debug!(
            completion_tokens = generated.len(),
            ?finish_reason,
            "Generation finished"
        );

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| Error::tokenizer(format!("failed to decode completion: {e}")))?;

        Ok(Completion::new(text, finish_reason))
    }
}

/// Prefill the prompt, then sample until EOS or the budget runs out.
///
/// At most `n_batch` prompt tokens go through a single forward pass; the
/// rest are fed one at a time on top of the KV cache.
fn sample_tokens(
    weights: &mut ModelWeights,
    device: &Device,
    prompt_tokens: &[u32],
    n_batch: usize,
    budget: usize,
    eos_token_id: Option<u32>,
    params: &GenerationParams,
) -> Result<(Vec<u32>, FinishReason)> {
    let split = prompt_tokens.len().min(n_batch);
    let (head, tail) = prompt_tokens.split_at(split);

    let mut logits = forward(weights, device, head, 0)?;
    for (offset, &token) in tail.iter().enumerate() {
        logits = forward(weights, device, &[token], split + offset)?;
    }

    let mut processor = LogitsProcessor::new(
        sampling_seed(),
        Some(params.temperature),
        Some(params.top_p),
    );
    let mut generated = Vec::with_capacity(budget);
    let mut index_pos = prompt_tokens.len();

    while generated.len() < budget {
        let next = processor.sample(&logits)?;
        if Some(next) == eos_token_id {
            return Ok((generated, FinishReason::Stop));
        }
        generated.push(next);
        if generated.len() == budget {
            break;
        }
        logits = forward(weights, device, &[next], index_pos)?;
        index_pos += 1;
    }

    Ok((generated, FinishReason::Length))
}

fn forward(
    weights: &mut ModelWeights,
    device: &Device,
    tokens: &[u32],
    index_pos: usize,
) -> Result<Tensor> {
    let input = Tensor::new(tokens, device)?.unsqueeze(0)?;
    let logits = weights.forward(&input, index_pos)?;
    Ok(logits.squeeze(0)?)
}

fn select_device(options: &LoadOptions) -> Result<Device> {
    if !options.offloads_gpu() {
        return Ok(Device::Cpu);
    }

    let device = Device::cuda_if_available(0)
        .map_err(|e| Error::model_load(format!("failed to initialize GPU: {e}")))?;
    if device.is_cpu() {
        warn!(
            n_gpu_layers = options.n_gpu_layers,
            "GPU offload requested but no CUDA device is available, running on CPU"
        );
    } else if options.n_gpu_layers > 0 {
        warn!(
            n_gpu_layers = options.n_gpu_layers,
            "Partial offload is not supported, placing every layer on the GPU"
        );
    }

    Ok(device)
}

/// Optional tokenizer override: `<dir>/<model>.tokenizer.json`, then
/// `<dir>/tokenizer.json`. Without one the GGUF vocabulary is used.
fn find_tokenizer(model_path: &Path) -> Option<PathBuf> {
    [
        model_path.with_extension("tokenizer.json"),
        model_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("tokenizer.json"),
    ]
    .into_iter()
    .find(|path| path.is_file())
}

/// candle's quantized llama precomputes rotary tables for `MAX_SEQ_LEN`
/// positions only.
fn supported_context(requested: usize) -> usize {
    if requested > MAX_SEQ_LEN {
        warn!(
            n_ctx = requested,
            max = MAX_SEQ_LEN,
            "Context window exceeds what the backend supports, clamping"
        );
        MAX_SEQ_LEN
    } else {
        requested
    }
}

fn metadata_u32(content: &gguf_file::Content, key: &str) -> Option<u32> {
    content.metadata.get(key).and_then(|v| v.to_u32().ok())
}

fn trained_context_length(content: &gguf_file::Content) -> Option<usize> {
    let arch = content
        .metadata
        .get("general.architecture")
        .and_then(|v| v.to_string().ok())?;
    metadata_u32(content, &format!("{arch}.context_length")).map(|n| n as usize)
}

fn first_known(candidates: &[&str], lookup: impl Fn(&str) -> Option<u32>) -> Option<u32> {
    candidates.iter().find_map(|token| lookup(token))
}

fn sampling_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
