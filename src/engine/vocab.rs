//! Tokenizer rebuilt from the vocabulary embedded in GGUF metadata.
//!
//! Two GGUF tokenizer models are understood: `llama` (SentencePiece with
//! byte fallback, merges derived from the piece scores) and `gpt2`
//! (byte-level BPE with explicit merges).

use crate::{Error, Result};
use candle_core::quantized::gguf_file::Value;
use serde_json::{Map, Value as Json, json};
use std::collections::HashMap;
use std::str::FromStr;
use tokenizers::Tokenizer;

const SPIECE_UNDERLINE: &str = "\u{2581}";

const TOKEN_TYPE_NORMAL: i32 = 1;
const TOKEN_TYPE_CONTROL: i32 = 3;
const TOKEN_TYPE_USER_DEFINED: i32 = 4;

pub(crate) fn from_gguf_metadata(metadata: &HashMap<String, Value>) -> Result<Tokenizer> {
    let model = metadata
        .get("tokenizer.ggml.model")
        .and_then(|v| v.to_string().ok())
        .map(String::as_str)
        .unwrap_or("llama");
    let tokens = elements(metadata, "tokenizer.ggml.tokens", |v| v.to_string().cloned())?
        .ok_or_else(|| Error::tokenizer("GGUF metadata has no tokenizer.ggml.tokens"))?;
    let token_types = elements(metadata, "tokenizer.ggml.token_type", Value::to_i32)?
        .unwrap_or_else(|| vec![TOKEN_TYPE_NORMAL; tokens.len()]);

    let bos_token = token_id(metadata, "tokenizer.ggml.bos_token_id")
        .and_then(|id| tokens.get(id as usize).map(|t| (t.clone(), id)));
    let add_bos = metadata
        .get("tokenizer.ggml.add_bos_token")
        .and_then(|v| v.to_bool().ok())
        .unwrap_or(model == "llama");

    let (bpe, normalizer, pre_tokenizer, decoder) = match model {
        "llama" => {
            let scores = elements(metadata, "tokenizer.ggml.scores", Value::to_f32)?
                .unwrap_or_else(|| vec![0.0; tokens.len()]);
            let unk_token = token_id(metadata, "tokenizer.ggml.unknown_token_id")
                .and_then(|id| tokens.get(id as usize).cloned());
            let merges = sentencepiece_merges(&tokens, &scores, &token_types);
            (
                bpe_model(&tokens, merges, unk_token, true),
                json!({
                    "type": "Sequence",
                    "normalizers": [
                        { "type": "Prepend", "prepend": SPIECE_UNDERLINE },
                        { "type": "Replace", "pattern": { "String": " " }, "content": SPIECE_UNDERLINE }
                    ]
                }),
                Json::Null,
                json!({
                    "type": "Sequence",
                    "decoders": [
                        { "type": "Replace", "pattern": { "String": SPIECE_UNDERLINE }, "content": " " },
                        { "type": "ByteFallback" },
                        { "type": "Fuse" },
                        { "type": "Strip", "content": " ", "start": 1, "stop": 0 }
                    ]
                }),
            )
        }
        "gpt2" => {
            let merges = elements(metadata, "tokenizer.ggml.merges", |v| v.to_string().cloned())?
                .ok_or_else(|| Error::tokenizer("GGUF metadata has no tokenizer.ggml.merges"))?;
            (
                bpe_model(&tokens, merges, None, false),
                Json::Null,
                byte_level(),
                byte_level(),
            )
        }
        other => {
            return Err(Error::tokenizer(format!(
                "unsupported GGUF tokenizer model '{other}'"
            )));
        }
    };

    let post_processor = match bos_token {
        Some((bos, id)) if add_bos => bos_template(&bos, id),
        _ if model == "gpt2" => byte_level(),
        _ => Json::Null,
    };

    let document = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens(&tokens, &token_types),
        "normalizer": normalizer,
        "pre_tokenizer": pre_tokenizer,
        "post_processor": post_processor,
        "decoder": decoder,
        "model": bpe,
    });

    Tokenizer::from_str(&document.to_string()).map_err(|e| {
        Error::tokenizer(format!("failed to build tokenizer from GGUF metadata: {e}"))
    })
}

fn elements<T>(
    metadata: &HashMap<String, Value>,
    key: &str,
    convert: impl Fn(&Value) -> candle_core::Result<T>,
) -> Result<Option<Vec<T>>> {
    let Some(value) = metadata.get(key) else {
        return Ok(None);
    };
    let invalid = |e: candle_core::Error| Error::tokenizer(format!("invalid {key}: {e}"));

    value
        .to_vec()
        .map_err(invalid)?
        .iter()
        .map(|v| convert(v).map_err(invalid))
        .collect::<Result<Vec<T>>>()
        .map(Some)
}

fn token_id(metadata: &HashMap<String, Value>, key: &str) -> Option<u32> {
    metadata.get(key).and_then(|v| v.to_u32().ok())
}

fn bpe_model(
    tokens: &[String],
    merges: Vec<String>,
    unk_token: Option<String>,
    byte_fallback: bool,
) -> Json {
    let vocab: Map<String, Json> = tokens
        .iter()
        .enumerate()
        .map(|(id, token)| (token.clone(), json!(id)))
        .collect();

    json!({
        "type": "BPE",
        "dropout": null,
        "unk_token": unk_token,
        "continuing_subword_prefix": null,
        "end_of_word_suffix": null,
        "fuse_unk": byte_fallback,
        "byte_fallback": byte_fallback,
        "vocab": vocab,
        "merges": merges,
    })
}

/// Every pair of normal pieces whose concatenation is itself a piece,
/// ranked by the score of that concatenation.
fn sentencepiece_merges(tokens: &[String], scores: &[f32], token_types: &[i32]) -> Vec<String> {
    let is_normal = |id: usize| token_types.get(id).is_none_or(|&t| t == TOKEN_TYPE_NORMAL);
    let index: HashMap<&str, usize> = tokens
        .iter()
        .enumerate()
        .filter(|&(id, _)| is_normal(id))
        .map(|(id, token)| (token.as_str(), id))
        .collect();

    let mut merges: Vec<(f32, usize, usize)> = Vec::new();
    for (id, piece) in tokens.iter().enumerate() {
        if !is_normal(id) || piece.contains(' ') {
            continue;
        }
        let score = scores.get(id).copied().unwrap_or_default();
        for (split, _) in piece.char_indices().skip(1) {
            let (left, right) = piece.split_at(split);
            if let (Some(&l), Some(&r)) = (index.get(left), index.get(right)) {
                merges.push((score, l, r));
            }
        }
    }

    merges.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    merges
        .into_iter()
        .map(|(_, l, r)| format!("{} {}", tokens[l], tokens[r]))
        .collect()
}

fn added_tokens(tokens: &[String], token_types: &[i32]) -> Vec<Json> {
    token_types
        .iter()
        .enumerate()
        .filter(|&(_, &t)| t == TOKEN_TYPE_CONTROL || t == TOKEN_TYPE_USER_DEFINED)
        .filter_map(|(id, &t)| {
            tokens.get(id).map(|content| {
                json!({
                    "id": id,
                    "content": content,
                    "single_word": false,
                    "lstrip": false,
                    "rstrip": false,
                    "normalized": false,
                    "special": t == TOKEN_TYPE_CONTROL,
                })
            })
        })
        .collect()
}

fn bos_template(bos: &str, id: u32) -> Json {
    let mut special_tokens = Map::new();
    special_tokens.insert(
        bos.to_string(),
        json!({ "id": bos, "ids": [id], "tokens": [bos] }),
    );

    json!({
        "type": "TemplateProcessing",
        "single": [
            { "SpecialToken": { "id": bos, "type_id": 0 } },
            { "Sequence": { "id": "A", "type_id": 0 } }
        ],
        "pair": [
            { "SpecialToken": { "id": bos, "type_id": 0 } },
            { "Sequence": { "id": "A", "type_id": 0 } },
            { "SpecialToken": { "id": bos, "type_id": 1 } },
            { "Sequence": { "id": "B", "type_id": 1 } }
        ],
        "special_tokens": special_tokens,
    })
}

fn byte_level() -> Json {
    json!({
        "type": "ByteLevel",
        "add_prefix_space": false,
        "trim_offsets": true,
        "use_regex": true,
    })
}
