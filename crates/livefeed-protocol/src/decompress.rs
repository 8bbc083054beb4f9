//! Compressed envelope handling for MESSAGE frames.
//!
//! Version 2 and 3 MESSAGE payloads are a compressed envelope which inflates
//! to several sub-frames laid end to end. Each sub-frame repeats the outer
//! header layout; only its length field is trusted, the rest of the header is
//! skipped and the JSON body extracted positionally.

use std::io::{Cursor, Read};

use serde_json::Value;
use tracing::{debug, trace};

use crate::HEADER_LEN;
use crate::error::{ProtocolError, ProtocolResult};

/// Buffer size for the brotli decoder.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Decompresses a raw deflate envelope.
pub fn decompress_deflate(data: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut decoder = flate2::read::DeflateDecoder::new(Cursor::new(data));
    let mut decompressed = Vec::with_capacity(data.len().saturating_mul(3));
    decoder
        .read_to_end(&mut decompressed)
        .map_err(ProtocolError::inflate)?;
    Ok(decompressed)
}

/// Decompresses a brotli envelope.
pub fn decompress_brotli(data: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut decoder = brotli::Decompressor::new(Cursor::new(data), BROTLI_BUFFER_SIZE);
    let mut decompressed = Vec::with_capacity(data.len().saturating_mul(3));
    decoder
        .read_to_end(&mut decompressed)
        .map_err(ProtocolError::brotli)?;
    Ok(decompressed)
}

/// Splits an inflated envelope into its JSON documents.
///
/// Walks the buffer by each sub-frame's declared length. A sub-frame whose
/// body is not valid JSON is skipped without affecting its siblings; a length
/// field that is zero, runs past the buffer, or cannot fit a header ends the
/// walk, keeping everything parsed so far.
pub fn split_sub_frames(buffer: &[u8]) -> Vec<Value> {
    let mut documents = Vec::new();
    let mut offset = 0usize;

    while buffer.len() - offset >= 4 {
        let declared = u32::from_be_bytes([
            buffer[offset],
            buffer[offset + 1],
            buffer[offset + 2],
            buffer[offset + 3],
        ]) as usize;

        if declared < HEADER_LEN || offset + declared > buffer.len() {
            trace!(
                offset,
                declared,
                total = buffer.len(),
                "corrupt sub-frame length, stopping envelope walk"
            );
            break;
        }

        // The gateway writes a full header per unit but its version field is
        // not reliable inside envelopes; skip it and slice the body directly.
        let body = &buffer[offset + HEADER_LEN..offset + declared];
        match serde_json::from_slice::<Value>(body) {
            Ok(document) => documents.push(document),
            Err(error) => {
                debug!(offset, %error, "sub-frame body is not valid JSON, skipping unit");
            }
        }

        offset += declared;
    }

    if offset < buffer.len() {
        trace!(
            trailing = buffer.len() - offset,
            parsed = documents.len(),
            "envelope has trailing bytes"
        );
    }

    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    /// Builds one sub-frame: full 16-byte header plus the JSON body.
    fn sub_frame(body: &str) -> Vec<u8> {
        let total = (HEADER_LEN + body.len()) as u32;
        let mut buffer = Vec::with_capacity(total as usize);
        buffer.extend_from_slice(&total.to_be_bytes());
        buffer.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
        buffer.extend_from_slice(&0u16.to_be_bytes());
        buffer.extend_from_slice(&5u32.to_be_bytes());
        buffer.extend_from_slice(&0u32.to_be_bytes());
        buffer.extend_from_slice(body.as_bytes());
        buffer
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn brotli_compress(data: &[u8]) -> Vec<u8> {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(data).unwrap();
        }
        compressed
    }

    mod codecs {
        use super::*;

        #[test]
        fn deflate_roundtrip() {
            let original = br#"{"cmd":"DANMU_MSG","info":[]}"#;
            let decompressed = decompress_deflate(&deflate(original)).unwrap();
            assert_eq!(decompressed, original);
        }

        #[test]
        fn brotli_roundtrip() {
            let original = br#"{"cmd":"SEND_GIFT","data":{}}"#;
            let decompressed = decompress_brotli(&brotli_compress(original)).unwrap();
            assert_eq!(decompressed, original);
        }

        #[test]
        fn deflate_garbage_is_an_error() {
            let result = decompress_deflate(&[0xff, 0xff, 0xff, 0xff]);
            assert!(matches!(
                result,
                Err(ProtocolError::Decompress { codec: "deflate", .. })
            ));
        }

        #[test]
        fn brotli_garbage_is_an_error() {
            let result = decompress_brotli(&[0xff, 0xff, 0xff, 0xff]);
            assert!(matches!(
                result,
                Err(ProtocolError::Decompress { codec: "brotli", .. })
            ));
        }
    }

    mod splitter {
        use super::*;

        #[test]
        fn splits_concatenated_units() {
            let mut buffer = sub_frame(r#"{"cmd":"DANMU_MSG","info":[1]}"#);
            buffer.extend(sub_frame(r#"{"cmd":"SEND_GIFT","data":{}}"#));
            buffer.extend(sub_frame(r#"{"cmd":"INTERACT_WORD"}"#));

            let documents = split_sub_frames(&buffer);

            assert_eq!(documents.len(), 3);
            assert_eq!(documents[0]["cmd"], "DANMU_MSG");
            assert_eq!(documents[1]["cmd"], "SEND_GIFT");
            assert_eq!(documents[2]["cmd"], "INTERACT_WORD");
        }

        #[test]
        fn empty_buffer_yields_nothing() {
            assert!(split_sub_frames(&[]).is_empty());
        }

        #[test]
        fn zero_length_stops_the_walk() {
            let mut buffer = sub_frame(r#"{"cmd":"DANMU_MSG"}"#);
            buffer.extend_from_slice(&0u32.to_be_bytes());
            buffer.extend(sub_frame(r#"{"cmd":"SEND_GIFT"}"#));

            let documents = split_sub_frames(&buffer);

            // The unit before the corrupt length survives, the rest is lost
            assert_eq!(documents.len(), 1);
            assert_eq!(documents[0]["cmd"], "DANMU_MSG");
        }

        #[test]
        fn overrunning_length_stops_the_walk() {
            let mut buffer = sub_frame(r#"{"cmd":"DANMU_MSG"}"#);
            let mut corrupt = sub_frame(r#"{"cmd":"SEND_GIFT"}"#);
            corrupt[0..4].copy_from_slice(&9999u32.to_be_bytes());
            buffer.extend(corrupt);

            let documents = split_sub_frames(&buffer);

            assert_eq!(documents.len(), 1);
            assert_eq!(documents[0]["cmd"], "DANMU_MSG");
        }

        #[test]
        fn length_smaller_than_header_stops_the_walk() {
            let mut buffer = sub_frame(r#"{"cmd":"DANMU_MSG"}"#);
            let mut corrupt = sub_frame(r#"{"cmd":"SEND_GIFT"}"#);
            corrupt[0..4].copy_from_slice(&8u32.to_be_bytes());
            buffer.extend(corrupt);

            let documents = split_sub_frames(&buffer);

            assert_eq!(documents.len(), 1);
        }

        #[test]
        fn bad_json_unit_is_skipped_siblings_kept() {
            let mut buffer = sub_frame(r#"{"cmd":"DANMU_MSG"}"#);
            buffer.extend(sub_frame(r#"{"cmd": not json at all"#));
            buffer.extend(sub_frame(r#"{"cmd":"SEND_GIFT"}"#));

            let documents = split_sub_frames(&buffer);

            assert_eq!(documents.len(), 2);
            assert_eq!(documents[0]["cmd"], "DANMU_MSG");
            assert_eq!(documents[1]["cmd"], "SEND_GIFT");
        }

        #[test]
        fn trailing_bytes_shorter_than_a_length_are_ignored() {
            let mut buffer = sub_frame(r#"{"cmd":"DANMU_MSG"}"#);
            buffer.extend_from_slice(&[0x00, 0x01]);

            let documents = split_sub_frames(&buffer);

            assert_eq!(documents.len(), 1);
        }

        #[test]
        fn end_to_end_through_deflate() {
            let mut envelope = sub_frame(r#"{"cmd":"DANMU_MSG","info":["x"]}"#);
            envelope.extend(sub_frame(r#"{"cmd":"ONLINE_RANK_COUNT","data":{"count":7}}"#));

            let inflated = decompress_deflate(&deflate(&envelope)).unwrap();
            let documents = split_sub_frames(&inflated);

            assert_eq!(documents.len(), 2);
            assert_eq!(documents[1]["data"]["count"], json!(7));
        }
    }
}
