//! Lossless integer codec
//!
//! Block-based frame-of-reference bit packing for u16 arrays: each 128-value
//! block stores its minimum and the bit width of the largest delta, followed
//! by LSB-first packed deltas. The stream is keyed only by element count;
//! geometry is metadata carried elsewhere.

use crate::CodecError;

const BLOCK: usize = 128;

/// Bytes of packed payload for one block at a given bit width
#[inline]
fn block_payload_len(width: u8) -> usize {
    // 128 values * width bits is always byte-aligned
    16 * width as usize
}

#[inline]
fn bits_needed(value: u16) -> u8 {
    if value == 0 {
        0
    } else {
        (16 - value.leading_zeros()) as u8
    }
}

fn pack_block(deltas: &[u16; BLOCK], width: u8, out: &mut Vec<u8>) {
    if width == 0 {
        return;
    }
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for &delta in deltas {
        acc |= (delta as u32) << bits;
        bits += width as u32;
        while bits >= 8 {
            out.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    debug_assert_eq!(bits, 0);
}

fn unpack_block(payload: &[u8], width: u8, out: &mut [u16; BLOCK]) {
    if width == 0 {
        out.fill(0);
        return;
    }
    let mask: u32 = (1u32 << width) - 1;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut next = 0usize;
    for slot in out.iter_mut() {
        while bits < width as u32 {
            acc |= (payload[next] as u32) << bits;
            next += 1;
            bits += 8;
        }
        *slot = (acc & mask) as u16;
        acc >>= width;
        bits -= width as u32;
    }
}

/// Compress a u16 array. Any length is accepted; partial trailing blocks are
/// padded internally and trimmed on decode.
pub fn encode_u16(values: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + values.len() * 2 / 4);
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());

    let mut block = [0u16; BLOCK];
    for chunk in values.chunks(BLOCK) {
        let min = chunk.iter().copied().min().unwrap_or(0);
        let max_delta = chunk.iter().map(|&v| v - min).max().unwrap_or(0);
        let width = bits_needed(max_delta);

        out.extend_from_slice(&min.to_le_bytes());
        out.push(width);

        for (slot, &v) in block.iter_mut().zip(chunk.iter()) {
            *slot = v - min;
        }
        block[chunk.len()..].fill(0);
        pack_block(&block, width, &mut out);
    }
    out
}

/// Decompress a stream produced by [`encode_u16`], bit-identical
pub fn decode_u16(data: &[u8]) -> Result<Vec<u16>, CodecError> {
    if data.len() < 4 {
        return Err(CodecError::Truncated {
            context: "integer stream header",
        });
    }
    let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let mut values = Vec::with_capacity(count);

    let mut cursor = 4usize;
    let mut block = [0u16; BLOCK];
    while values.len() < count {
        if data.len() < cursor + 3 {
            return Err(CodecError::Truncated {
                context: "integer block header",
            });
        }
        let min = u16::from_le_bytes([data[cursor], data[cursor + 1]]);
        let width = data[cursor + 2];
        cursor += 3;

        if width > 16 {
            return Err(CodecError::Integer {
                message: format!("invalid bit width {width}"),
            });
        }

        let payload_len = block_payload_len(width);
        let payload = data.get(cursor..cursor + payload_len).ok_or({
            CodecError::Truncated {
                context: "integer block payload",
            }
        })?;
        cursor += payload_len;

        unpack_block(payload, width, &mut block);
        let take = (count - values.len()).min(BLOCK);
        values.extend(block[..take].iter().map(|&d| d + min));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_bit_identical() {
        let depth: Vec<u16> = (0..640usize * 576)
            .map(|i| ((i * 37) % 4001) as u16)
            .collect();
        let encoded = encode_u16(&depth);
        let decoded = decode_u16(&encoded).unwrap();
        assert_eq!(decoded, depth);
    }

    #[test]
    fn test_roundtrip_unaligned_length() {
        let values: Vec<u16> = (0..200u16).map(|i| 1000 + i * 3).collect();
        let decoded = decode_u16(&encode_u16(&values)).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_constant_block_costs_header_only() {
        let values = vec![1234u16; BLOCK];
        let encoded = encode_u16(&values);
        // count + one block header, zero payload
        assert_eq!(encoded.len(), 4 + 3);
        assert_eq!(decode_u16(&encoded).unwrap(), values);
    }

    #[test]
    fn test_empty_input() {
        let encoded = encode_u16(&[]);
        assert_eq!(decode_u16(&encoded).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn test_full_range_values() {
        let values = vec![0u16, u16::MAX, 1, u16::MAX - 1, 32768];
        assert_eq!(decode_u16(&encode_u16(&values)).unwrap(), values);
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let encoded = encode_u16(&[500u16; 300]);
        assert!(decode_u16(&encoded[..encoded.len() - 2]).is_err());
        assert!(decode_u16(&encoded[..3]).is_err());
    }

    #[test]
    fn test_compresses_smooth_data() {
        // near-constant depth should shrink well below raw size
        let values: Vec<u16> = (0..4096usize).map(|i| 1500 + (i % 7) as u16).collect();
        let encoded = encode_u16(&values);
        assert!(encoded.len() < values.len());
    }
}
