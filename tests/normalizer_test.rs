//! Replays captured provider streams through the wire decoders and the
//! response normalizer.

use muninn::normalize::wire::{SseDecoder, WireFormat};
use muninn::normalize::{CANCELLED_MARKER, NormalizerState};
use muninn::{Fragment, NormalizedResult, Outcome, ResponseNormalizer};

/// Split `capture` into chunks of `size` bytes and feed them through an
/// SSE decoder, as a network read loop would. Chunks may cut characters.
fn replay(format: WireFormat, capture: &str, size: usize) -> ResponseNormalizer {
    let mut decoder = SseDecoder::new();
    let mut normalizer = ResponseNormalizer::new();

    for chunk in capture.as_bytes().chunks(size) {
        for fragment in format.decode_sse(&mut decoder, chunk).unwrap() {
            normalizer.apply(fragment);
        }
    }
    if let Some(tail) = decoder.finish() {
        for fragment in format.decode(&tail).unwrap() {
            normalizer.apply(fragment);
        }
    }
    normalizer
}

const ANTHROPIC_STREAM: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"role\":\"assistant\",\"content\":[]}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
event: ping\n\
data: {\"type\":\"ping\"}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Bonjour, \"}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"le monde ✓\"}}\n\n\
event: content_block_stop\n\
data: {\"type\":\"content_block_stop\",\"index\":0}\n\n\
event: message_delta\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n\n";

#[test]
fn anthropic_stream_normalizes_regardless_of_chunking() {
    for size in [1, 7, 64, ANTHROPIC_STREAM.len()] {
        let normalizer = replay(WireFormat::Anthropic, ANTHROPIC_STREAM, size);
        assert_eq!(
            normalizer.snapshot(),
            NormalizedResult::completed("Bonjour, le monde ✓"),
            "chunk size {size}"
        );
    }
}

#[test]
fn anthropic_overload_mid_stream_fails() {
    let capture = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n\
data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n";

    let normalizer = replay(WireFormat::Anthropic, capture, 16);
    assert_eq!(normalizer.state(), NormalizerState::Failed);
    let result = normalizer.snapshot();
    assert_eq!(result.text, "Hel");
    assert!(!result.is_complete);
    assert_eq!(
        result.error_message.as_deref(),
        Some("overloaded_error: Overloaded")
    );
}

#[test]
fn openai_stream_normalizes() {
    let capture = "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
data: [DONE]\n\n";

    let outcome = replay(WireFormat::OpenAi, capture, 5).into_outcome();
    assert_eq!(outcome, Outcome::Completed(NormalizedResult::completed("Hello")));
}

#[test]
fn gemini_stream_without_done_completes_on_exhaustion() {
    let capture = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"One \"}],\"role\":\"model\"}}]}\r\n\r\n\
data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"two\"}],\"role\":\"model\"},\"finishReason\":\"STOP\"}]}";

    let normalizer = replay(WireFormat::Gemini, capture, 9);
    assert_eq!(normalizer.state(), NormalizerState::Accumulating);
    assert_eq!(
        normalizer.into_outcome().into_result(),
        NormalizedResult::completed("One two")
    );
}

#[test]
fn non_streaming_bodies_complete_in_one_payload() {
    let claude = WireFormat::Anthropic
        .decode(r#"{"id":"msg","type":"message","role":"assistant","content":[{"type":"text","text":"Hi"}],"stop_reason":"end_turn"}"#)
        .unwrap();
    let grok = WireFormat::OpenAi
        .decode(r#"{"id":"c","choices":[{"index":0,"message":{"role":"assistant","content":"Hi"},"finish_reason":"stop"}]}"#)
        .unwrap();

    for fragments in [claude, grok] {
        let mut normalizer = ResponseNormalizer::new();
        for f in fragments {
            normalizer.apply(f);
        }
        assert_eq!(normalizer.snapshot(), NormalizedResult::completed("Hi"));
    }
}

#[test]
fn cancellation_discards_everything_after() {
    let mut normalizer = ResponseNormalizer::new();
    normalizer.apply(Fragment::text("Hel"));
    normalizer.cancel();

    assert!(!normalizer.apply(Fragment::text("lo")));
    assert!(!normalizer.apply(Fragment::StreamEnd));

    match normalizer.into_outcome() {
        Outcome::Cancelled(result) => {
            assert_eq!(result.text, "Hel");
            assert_eq!(result.error_message.as_deref(), Some(CANCELLED_MARKER));
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
}
