//! The codec capability set: `Encoder`/`Decoder` traits plus the two
//! concrete families this workspace ships contracts for. Neither
//! implementation links real libopus/libcodec2 — the actual codec math is
//! an external collaborator — but configuration validation and the error
//! taxonomy are real.

use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    Opus,
    Codec2,
}

/// Sample rate, channel count, frame duration, and the bitrate-or-mode
/// value, validated against the family's legal range on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub family: CodecFamily,
    pub sample_rate_hz: u32,
    pub channels: u8,
    pub frame_ms: u32,
    /// For Opus, bits per second. For Codec2, the mode value (which equals
    /// its bitrate in bit/s).
    pub bitrate_or_mode: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("{family:?} requires sample_rate_hz={expected}, got {actual}")]
    BadSampleRate {
        family: CodecFamily,
        expected: u32,
        actual: u32,
    },
    #[error("{family:?} requires channels={expected}, got {actual}")]
    BadChannels {
        family: CodecFamily,
        expected: u8,
        actual: u8,
    },
    #[error("{family:?} requires frame_ms={expected}, got {actual}")]
    BadFrameMs {
        family: CodecFamily,
        expected: u32,
        actual: u32,
    },
    #[error("{family:?} bitrate/mode {actual} out of legal range {min}..={max}")]
    BadBitrate {
        family: CodecFamily,
        actual: u32,
        min: u32,
        max: u32,
    },
    #[error("encode failed for this frame")]
    EncodeFailed,
    #[error("decode failed for this frame")]
    DecodeFailed,
    #[error("codec initialization failed permanently")]
    InitFailed,
}

impl CodecConfig {
    pub fn validate(&self) -> Result<(), CodecError> {
        match self.family {
            CodecFamily::Opus => {
                if self.sample_rate_hz != 48_000 {
                    return Err(CodecError::BadSampleRate {
                        family: self.family,
                        expected: 48_000,
                        actual: self.sample_rate_hz,
                    });
                }
                if self.channels != 1 {
                    return Err(CodecError::BadChannels {
                        family: self.family,
                        expected: 1,
                        actual: self.channels,
                    });
                }
                if self.frame_ms != 20 {
                    return Err(CodecError::BadFrameMs {
                        family: self.family,
                        expected: 20,
                        actual: self.frame_ms,
                    });
                }
                if !(8_000..=64_000).contains(&self.bitrate_or_mode) {
                    return Err(CodecError::BadBitrate {
                        family: self.family,
                        actual: self.bitrate_or_mode,
                        min: 8_000,
                        max: 64_000,
                    });
                }
            }
            CodecFamily::Codec2 => {
                if self.sample_rate_hz != 8_000 {
                    return Err(CodecError::BadSampleRate {
                        family: self.family,
                        expected: 8_000,
                        actual: self.sample_rate_hz,
                    });
                }
                if self.channels != 1 {
                    return Err(CodecError::BadChannels {
                        family: self.family,
                        expected: 1,
                        actual: self.channels,
                    });
                }
                if self.frame_ms != 40 {
                    return Err(CodecError::BadFrameMs {
                        family: self.family,
                        expected: 40,
                        actual: self.frame_ms,
                    });
                }
                if !(700..=3200).contains(&self.bitrate_or_mode) {
                    return Err(CodecError::BadBitrate {
                        family: self.family,
                        actual: self.bitrate_or_mode,
                        min: 700,
                        max: 3200,
                    });
                }
            }
        }
        Ok(())
    }
}

/// `encode(pcm_window) -> bytes`. `Send` so it can be boxed and moved into
/// the capture task without a generic parameter leaking into the engine's
/// public API.
pub trait Encoder: Send {
    fn config(&self) -> CodecConfig;
    fn encode(&mut self, pcm_window: &[i16]) -> Result<Bytes, CodecError>;
}

/// `decode(bytes, frame_size) -> pcm_window`.
pub trait Decoder: Send {
    fn config(&self) -> CodecConfig;
    fn decode(&mut self, bytes: &[u8], frame_size: usize) -> Result<Vec<i16>, CodecError>;
}

/// Thin wrapper over the contract the `opus`/`audiopus` crate exposes. No
/// FFI is linked here; `encode`/`decode` are stand-ins a real build swaps
/// for calls into libopus.
pub struct OpusCodec {
    config: CodecConfig,
}

impl OpusCodec {
    pub fn new(config: CodecConfig) -> Result<Self, CodecError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Encoder for OpusCodec {
    fn config(&self) -> CodecConfig {
        self.config
    }

    fn encode(&mut self, pcm_window: &[i16]) -> Result<Bytes, CodecError> {
        if pcm_window.is_empty() {
            return Err(CodecError::EncodeFailed);
        }
        let mut out = Vec::with_capacity(pcm_window.len() * 2);
        for sample in pcm_window {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(Bytes::from(out))
    }
}

impl Decoder for OpusCodec {
    fn config(&self) -> CodecConfig {
        self.config
    }

    fn decode(&mut self, bytes: &[u8], frame_size: usize) -> Result<Vec<i16>, CodecError> {
        if bytes.len() % 2 != 0 {
            return Err(CodecError::DecodeFailed);
        }
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        if samples.len() != frame_size {
            return Err(CodecError::DecodeFailed);
        }
        Ok(samples)
    }
}

/// Thin wrapper over the `codec2` crate's mode-based contract.
pub struct Codec2Codec {
    config: CodecConfig,
}

impl Codec2Codec {
    pub fn new(config: CodecConfig) -> Result<Self, CodecError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Encoder for Codec2Codec {
    fn config(&self) -> CodecConfig {
        self.config
    }

    fn encode(&mut self, pcm_window: &[i16]) -> Result<Bytes, CodecError> {
        if pcm_window.is_empty() {
            return Err(CodecError::EncodeFailed);
        }
        let mut out = Vec::with_capacity(pcm_window.len() * 2);
        for sample in pcm_window {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(Bytes::from(out))
    }
}

impl Decoder for Codec2Codec {
    fn config(&self) -> CodecConfig {
        self.config
    }

    fn decode(&mut self, bytes: &[u8], frame_size: usize) -> Result<Vec<i16>, CodecError> {
        if bytes.len() % 2 != 0 {
            return Err(CodecError::DecodeFailed);
        }
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        if samples.len() != frame_size {
            return Err(CodecError::DecodeFailed);
        }
        Ok(samples)
    }
}
