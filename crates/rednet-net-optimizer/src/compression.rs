//! Compression (spec §4.2). Two schemes, both reversible via the same
//! static dictionary table:
//!
//! - `Fast`: single-pass greedy dictionary substitution.
//! - `Best`: the same dictionary pass, followed by run-length encoding of
//!   the remaining literal bytes.
//!
//! The wrapper produced by [`wrap`] is always safe to round-trip: payloads
//! at or below the threshold are stored uncompressed with `compressed:
//! false`, and [`unwrap`] reverses whichever scheme tag it finds.

use rednet_types::wire::CompressedEnvelope;

/// Escape byte marking a dictionary reference or an RLE run in the encoded
/// stream. Literal occurrences of this byte are doubled.
const ESCAPE: u8 = 0xFF;

/// A small fixed dictionary of byte sequences common in this system's JSON
/// wire payloads. Index position is the substitution code.
const DICTIONARY: &[&[u8]] = &[
    b"\"domain\":\"",
    b"\"ownerId\":",
    b"\"type\":\"DNS_",
    b".comp",
    b".rednet\"",
    b"\"ts\":",
    b"\"senderId\":",
    b"\"target\":",
    b"\"resolvedAt\":",
    b"\"expiresAt\":",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Fast = 0,
    Best = 1,
}

fn dictionary_pass(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    'outer: while i < input.len() {
        if input[i] == ESCAPE {
            out.push(ESCAPE);
            out.push(ESCAPE);
            i += 1;
            continue;
        }
        for (code, entry) in DICTIONARY.iter().enumerate() {
            if input[i..].starts_with(entry) {
                out.push(ESCAPE);
                out.push(code as u8);
                i += entry.len();
                continue 'outer;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

fn dictionary_unpass(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == ESCAPE {
            let code = input[i + 1];
            if code == ESCAPE {
                out.push(ESCAPE);
            } else {
                out.extend_from_slice(DICTIONARY[code as usize]);
            }
            i += 2;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

/// Run-length-encode a byte stream that has already been through the
/// dictionary pass. Uses `ESCAPE, RUN_MARKER(0xFE), byte, count` for runs of
/// 4 or more identical bytes; everything else passes through unchanged
/// (with `ESCAPE` doubled, as in the dictionary pass).
const RUN_MARKER: u8 = 0xFE;
const MIN_RUN: usize = 4;

fn rle_pass(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let byte = input[i];
        if byte == ESCAPE {
            out.push(ESCAPE);
            out.push(ESCAPE);
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < input.len() && input[i + run] == byte && run < 255 {
            run += 1;
        }
        if run >= MIN_RUN {
            out.push(ESCAPE);
            out.push(RUN_MARKER);
            out.push(byte);
            out.push(run as u8);
            i += run;
        } else {
            out.push(byte);
            i += 1;
        }
    }
    out
}

fn rle_unpass(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < input.len() {
        if input[i] == ESCAPE {
            match input[i + 1] {
                ESCAPE => {
                    out.push(ESCAPE);
                    i += 2;
                },
                RUN_MARKER => {
                    let byte = input[i + 2];
                    let count = input[i + 3] as usize;
                    out.extend(std::iter::repeat(byte).take(count));
                    i += 4;
                },
                other => {
                    // Not ours to interpret here; dictionary_unpass already ran.
                    out.push(ESCAPE);
                    out.push(other);
                    i += 2;
                },
            }
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

pub fn compress(input: &[u8], scheme: Scheme) -> Vec<u8> {
    let dict_pass = dictionary_pass(input);
    let body = match scheme {
        Scheme::Fast => dict_pass,
        Scheme::Best => rle_pass(&dict_pass),
    };
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(scheme as u8);
    out.extend(body);
    out
}

pub fn decompress(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let scheme = data[0];
    let body = &data[1..];
    match scheme {
        1 => dictionary_unpass(&rle_unpass(body)),
        _ => dictionary_unpass(body),
    }
}

/// Wrap `payload`, compressing with `scheme` if it exceeds `threshold`.
/// Falls back to a raw (uncompressed) envelope on any failure, per spec
/// §4.2's "compression errors fall back to raw send".
pub fn wrap(payload: &[u8], threshold: usize, scheme: Scheme) -> CompressedEnvelope {
    if payload.len() <= threshold {
        return CompressedEnvelope {
            compressed: false,
            data: payload.to_vec(),
            original: payload.len(),
        };
    }
    let compressed = compress(payload, scheme);
    CompressedEnvelope {
        compressed: true,
        data: compressed,
        original: payload.len(),
    }
}

pub fn unwrap(envelope: &CompressedEnvelope) -> Vec<u8> {
    if envelope.compressed {
        decompress(&envelope.data)
    } else {
        envelope.data.clone()
    }
}
