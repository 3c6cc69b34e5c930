//! Decoders from raw provider payloads to [`Fragment`]s.
//!
//! Each [`WireFormat`] understands one family of response bodies, both the
//! streamed events and the single non-streaming body. Streamed bodies
//! usually arrive as server-sent events; [`SseDecoder`] reassembles `data:`
//! lines that were split across network chunks before decoding.

use serde_json::Value;

use super::Fragment;
use crate::{MuninnError, Result};

/// Payload family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Anthropic Messages API events and bodies.
    Anthropic,
    /// OpenAI-compatible chat completions (also Grok, Ollama, OpenRouter).
    OpenAi,
    /// Google Gemini `generateContent` responses.
    Gemini,
    /// Undelimited text.
    PlainText,
}

impl WireFormat {
    /// Decode one payload (an SSE `data:` value or a whole response body).
    ///
    /// Payloads that carry nothing for the result (pings, role headers,
    /// usage updates) decode to no fragments. Malformed JSON is an error.
    pub fn decode(&self, payload: &str) -> Result<Vec<Fragment>> {
        match self {
            WireFormat::PlainText => Ok(if payload.is_empty() {
                Vec::new()
            } else {
                vec![Fragment::text(payload)]
            }),
            WireFormat::OpenAi if payload.trim() == "[DONE]" => Ok(vec![Fragment::StreamEnd]),
            WireFormat::Anthropic => decode_anthropic(&parse(payload)?),
            WireFormat::OpenAi => Ok(decode_openai(&parse(payload)?)),
            WireFormat::Gemini => Ok(decode_gemini(&parse(payload)?)),
        }
    }

    /// Feed a network chunk of an SSE stream and decode every payload it completes.
    pub fn decode_sse(
        &self,
        decoder: &mut SseDecoder,
        chunk: impl AsRef<[u8]>,
    ) -> Result<Vec<Fragment>> {
        let mut fragments = Vec::new();
        for payload in decoder.feed(chunk) {
            fragments.extend(self.decode(&payload)?);
        }
        Ok(fragments)
    }
}

fn parse(payload: &str) -> Result<Value> {
    serde_json::from_str(payload).map_err(|e| MuninnError::Stream(format!("bad payload: {e}")))
}

fn error_fragment(error: &Value) -> Fragment {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    let kind = error
        .get("type")
        .or_else(|| error.get("status"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Fragment::ErrorEvent { message, kind }
}

fn decode_anthropic(event: &Value) -> Result<Vec<Fragment>> {
    let Some(kind) = event.get("type").and_then(Value::as_str) else {
        return Err(MuninnError::Stream("event without type".into()));
    };

    let fragments = match kind {
        "content_block_start" => {
            let text = event
                .pointer("/content_block/text")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            vec![Fragment::BlockStart { text }]
        }
        "content_block_delta" => event
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .map(|t| vec![Fragment::text(t)])
            .unwrap_or_default(),
        "message_stop" => vec![Fragment::StreamEnd],
        "error" => vec![error_fragment(event.get("error").unwrap_or(event))],
        // non-streaming body
        "message" => {
            let text: String = event
                .get("content")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            Fragment::complete(text)
        }
        // ping, message_start, message_delta, content_block_stop
        _ => Vec::new(),
    };
    Ok(fragments)
}

fn decode_openai(chunk: &Value) -> Vec<Fragment> {
    if let Some(error) = chunk.get("error") {
        return vec![error_fragment(error)];
    }

    let Some(choice) = chunk.pointer("/choices/0") else {
        return Vec::new();
    };
    if let Some(text) = choice.pointer("/message/content").and_then(Value::as_str) {
        return Fragment::complete(text);
    }
    match choice.pointer("/delta/content").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => vec![Fragment::text(text)],
        _ => Vec::new(),
    }
}

fn decode_gemini(response: &Value) -> Vec<Fragment> {
    if let Some(error) = response.get("error") {
        return vec![error_fragment(error)];
    }

    let text: String = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Fragment::TextDelta(text)]
    }
}

/// Incremental server-sent-events line decoder.
///
/// Yields the value of every `data:` line. `event:`, `id:`, `retry:` and
/// comment lines are skipped. Each `data:` line is treated as one payload,
/// which is how the supported providers frame their events.
///
/// Input is buffered as bytes and only complete lines are decoded, so a
/// chunk may end inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the payloads of every line it completes.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<String> {
        self.buffer.extend_from_slice(chunk.as_ref());

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = data_payload(&String::from_utf8_lossy(&line)) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&String::from_utf8_lossy(&line))
    }
}

fn data_payload(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    (!data.is_empty()).then(|| data.to_string())
}
