use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::provider::ProviderChunk;
use crate::stream::{parse_sse_line, SseParsed};

/// Parse Anthropic's native streaming SSE response into `ProviderChunk`s.
pub async fn process_stream(resp: reqwest::Response, tx: mpsc::Sender<ProviderChunk>) {
    use futures_util::StreamExt;

    let mut current_event = String::new();
    let mut current_block_type = String::new();
    let mut line_buf = String::new();

    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(ProviderChunk::Err(e.to_string())).await;
                return;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        // Anthropic's SSE frames can split across HTTP chunk boundaries;
        // buffer and only process complete lines.
        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(parsed) = parse_sse_line(line) {
                match parsed {
                    SseParsed::Event(ev) => current_event = ev,
                    SseParsed::Data(data) => {
                        if let Some(out) = parse_data_block(&current_event, &data, &mut current_block_type)
                        {
                            if tx.send(out).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                    }
                }
            }
        }

        line_buf = remainder;
    }

    let _ = tx.send(ProviderChunk::End).await;
}

fn parse_data_block(
    event_type: &str,
    data: &str,
    current_block_type: &mut String,
) -> Option<ProviderChunk> {
    match event_type {
        "content_block_start" => {
            if let Ok(block_start) = serde_json::from_str::<ContentBlockStart>(data) {
                *current_block_type = block_start.content_block.block_type;
            }
            None
        }
        "content_block_delta" => {
            if let Ok(delta) = serde_json::from_str::<ContentBlockDelta>(data) {
                if delta.delta.delta_type == "text_delta" {
                    if let Some(text) = delta.delta.text {
                        return Some(ProviderChunk::Data(text));
                    }
                }
            }
            None
        }
        "content_block_stop" => {
            current_block_type.clear();
            None
        }
        "error" => {
            warn!(data, "anthropic stream error");
            Some(ProviderChunk::Err(data.to_string()))
        }
        // message_start, message_delta, message_stop carry only usage/stop-reason
        // metadata the orchestrator doesn't need — token accounting is an
        // adapter-local estimate, not a wire-exact count.
        _ => None,
    }
}

#[derive(Deserialize)]
struct ContentBlockStart {
    content_block: ContentBlockMeta,
}

#[derive(Deserialize)]
struct ContentBlockMeta {
    #[serde(rename = "type")]
    block_type: String,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaContent,
}

#[derive(Deserialize)]
struct DeltaContent {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
}
