//! Sample format conversion between PCM bytes and `f32` blocks.

use super::SampleEncoding;

/// Full-scale value of a signed 24-bit sample.
const I24_SCALE: f32 = 8_388_608.0;

/// Converts f32 samples to i16.
///
/// Input should be in the range [-1.0, 1.0]. Values outside this range are clamped.
///
/// Uses × 32767 (not 32768) for symmetric scaling, so -1.0 maps to -32767.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts i16 samples to f32 in the range [-1.0, 1.0].
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

#[inline]
fn i24_to_f32(bytes: [u8; 3]) -> f32 {
    // Place the 24 bits in the top of an i32 and shift back to sign-extend.
    let raw = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
    raw as f32 / I24_SCALE
}

#[inline]
fn f32_to_i24(sample: f32) -> [u8; 3] {
    let raw = (sample * (I24_SCALE - 1.0)).clamp(-I24_SCALE, I24_SCALE - 1.0) as i32;
    let le = raw.to_le_bytes();
    [le[0], le[1], le[2]]
}

/// Decodes interleaved PCM bytes into `out`.
///
/// Decodes `min(bytes.len() / bytes_per_sample, out.len())` samples and
/// returns that count. Trailing bytes that do not form a whole sample are
/// ignored.
pub fn decode_into(bytes: &[u8], encoding: SampleEncoding, out: &mut [f32]) -> usize {
    match encoding {
        SampleEncoding::Pcm16 => {
            let mut n = 0;
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *dst = i16_to_f32(i16::from_le_bytes([src[0], src[1]]));
                n += 1;
            }
            n
        }
        SampleEncoding::Pcm24 => {
            let mut n = 0;
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(3)) {
                *dst = i24_to_f32([src[0], src[1], src[2]]);
                n += 1;
            }
            n
        }
        SampleEncoding::Float32 => {
            let mut n = 0;
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *dst = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
                n += 1;
            }
            n
        }
    }
}

/// Encodes `samples` as interleaved PCM bytes, appending to `out`.
pub fn encode_samples(samples: &[f32], encoding: SampleEncoding, out: &mut Vec<u8>) {
    out.reserve(samples.len() * encoding.bytes_per_sample());
    match encoding {
        SampleEncoding::Pcm16 => {
            for &s in samples {
                out.extend_from_slice(&f32_to_i16(s).to_le_bytes());
            }
        }
        SampleEncoding::Pcm24 => {
            for &s in samples {
                out.extend_from_slice(&f32_to_i24(s));
            }
        }
        SampleEncoding::Float32 => {
            for &s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_full_range() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_i16_to_f32_full_range() {
        let min = i16_to_f32(-32768);
        assert!((min - (-1.0)).abs() < 0.001);
        assert_eq!(i16_to_f32(0), 0.0);
    }

    #[test]
    fn test_decode_float32_is_exact() {
        let samples = [0.25f32, -0.5, 1.0, -1.0];
        let mut bytes = Vec::new();
        encode_samples(&samples, SampleEncoding::Float32, &mut bytes);
        assert_eq!(bytes.len(), 16);

        let mut out = [0.0f32; 4];
        assert_eq!(decode_into(&bytes, SampleEncoding::Float32, &mut out), 4);
        assert_eq!(out, samples);
    }

    #[test]
    fn test_decode_pcm16_little_endian() {
        // 0x4000 = 16384 -> 0.5
        let bytes = [0x00, 0x40, 0x00, 0xC0];
        let mut out = [0.0f32; 2];
        decode_into(&bytes, SampleEncoding::Pcm16, &mut out);
        assert_eq!(out, [0.5, -0.5]);
    }

    #[test]
    fn test_decode_pcm24_sign_extension() {
        // 0xC00000 is -0.5 of full scale in 24-bit
        let bytes = [0x00, 0x00, 0xC0, 0x00, 0x00, 0x40];
        let mut out = [0.0f32; 2];
        decode_into(&bytes, SampleEncoding::Pcm24, &mut out);
        assert_eq!(out, [-0.5, 0.5]);
    }

    #[test]
    fn test_decode_stops_at_shorter_side() {
        let bytes = [0u8; 10];
        let mut out = [1.0f32; 8];
        // 10 bytes hold five 16-bit samples
        assert_eq!(decode_into(&bytes, SampleEncoding::Pcm16, &mut out), 5);
        assert_eq!(out[5], 1.0);

        let mut short = [1.0f32; 2];
        assert_eq!(decode_into(&bytes, SampleEncoding::Pcm16, &mut short), 2);
    }

    #[test]
    fn test_encode_pcm24_length() {
        let mut bytes = Vec::new();
        encode_samples(&[0.1, 0.2, 0.3], SampleEncoding::Pcm24, &mut bytes);
        assert_eq!(bytes.len(), 9);
    }
}
