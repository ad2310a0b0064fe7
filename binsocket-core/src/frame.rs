//! WebSocket frame parsing and serialization
//!
//! This module provides frame parsing and serialization following the
//! RFC 6455 WebSocket protocol specification, restricted to the opcodes
//! the binary pipeline uses.

use crate::{
    error::{Error, FrameError, Result},
    protocol::{constants::MAX_CONTROL_PAYLOAD, frame::*, Opcode, Role},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Represents a WebSocket frame according to RFC 6455
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Indicates if the payload is masked
    pub masked: bool,
    /// Masking key (if present)
    pub mask: Option<[u8; 4]>,
    /// Payload data, always stored unmasked
    pub payload: Bytes,
}

impl Frame {
    /// Create a new final frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            masked: false,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a continuation frame
    pub fn continuation(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Continuation, payload)
    }

    /// Create a binary frame
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Create one fragment of a binary message.
    ///
    /// The first fragment carries the binary opcode, every later one the
    /// continuation opcode; only the last has FIN set.
    pub fn fragment(payload: impl Into<Bytes>, first: bool, last: bool) -> Self {
        let opcode = if first {
            Opcode::Binary
        } else {
            Opcode::Continuation
        };
        Self::new(opcode, payload).fin(last)
    }

    /// Create a close frame with optional code and reason
    pub fn close(code: Option<u16>, reason: Option<&str>) -> Self {
        let mut payload = BytesMut::new();

        if let Some(code) = code {
            payload.put_u16(code);

            if let Some(reason) = reason {
                payload.put_slice(reason.as_bytes());
            }
        }

        Self::new(Opcode::Close, payload.freeze())
    }

    /// Create a ping frame
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Create a pong frame
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Set the FIN bit
    pub fn fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Enable or disable masking (client frames must be masked)
    pub fn mask(mut self, enabled: bool) -> Self {
        if enabled && !self.masked {
            self.mask = Some(rand::random::<[u8; 4]>());
            self.masked = true;
        } else if !enabled {
            self.mask = None;
            self.masked = false;
        }
        self
    }

    /// Prepare the frame for sending by the given role
    pub fn for_role(self, role: Role) -> Self {
        self.mask(role.masks_outgoing())
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.header_len() + self.payload.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Number of header bytes this frame encodes to
    pub fn header_len(&self) -> usize {
        let len_bytes = match self.payload.len() {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        let mask_bytes = if self.mask.is_some() { MASKING_KEY_LEN } else { 0 };
        2 + len_bytes + mask_bytes
    }

    /// Write the frame to a buffer
    pub fn write_to(&self, buf: &mut BytesMut) {
        let first_byte = ((self.fin as u8) << 7) | self.opcode.value();
        buf.put_u8(first_byte);

        let payload_len = self.payload.len();
        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };

        if payload_len < 126 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(payload_len as u64);
        }

        match self.mask {
            Some(mask) => {
                buf.put_slice(&mask);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], &mask);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Parse a frame from the front of `buf`.
    ///
    /// On success the frame's bytes are consumed. When the buffer holds only
    /// part of a frame, `FrameError::InsufficientData` is returned and `buf`
    /// is left untouched.
    pub fn parse(buf: &mut BytesMut, limits: &FrameLimits) -> Result<Self> {
        if buf.len() < 2 {
            return Err(FrameError::InsufficientData {
                needed: 2,
                have: buf.len(),
            }
            .into());
        }

        let first_byte = buf[0];
        let second_byte = buf[1];

        let fin = (first_byte & FIN_BIT) != 0;
        if first_byte & (RSV1_BIT | RSV2_BIT | RSV3_BIT) != 0 {
            return Err(FrameError::ReservedBitsSet.into());
        }
        let opcode = Opcode::from(first_byte & OPCODE_MASK)
            .ok_or(FrameError::InvalidOpcode(first_byte & OPCODE_MASK))?;

        if opcode.is_control() && !fin {
            return Err(FrameError::FragmentedControlFrame.into());
        }

        let masked = (second_byte & MASK_BIT) != 0;
        if masked != limits.role.expects_masked() {
            let reason = if masked {
                "server frames must not be masked"
            } else {
                "client frames must be masked"
            };
            return Err(FrameError::InvalidMasking(reason.to_string()).into());
        }

        let mut header_len = 2;
        let payload_len = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => {
                header_len += 2;
                ensure_len(buf, header_len)?;
                u16::from_be_bytes([buf[2], buf[3]]) as u64
            }
            PAYLOAD_LEN_64 => {
                header_len += 8;
                ensure_len(buf, header_len)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(FrameError::InvalidLength.into());
                }
                len
            }
            len => len as u64,
        };

        if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD as u64 {
            return Err(FrameError::ControlFrameTooLarge(payload_len as usize).into());
        }
        if payload_len > limits.max_frame_size as u64 {
            return Err(FrameError::TooLarge {
                size: payload_len as usize,
                max: limits.max_frame_size,
            }
            .into());
        }
        let payload_len = payload_len as usize;

        let mask = if masked {
            ensure_len(buf, header_len + MASKING_KEY_LEN)?;
            let mut mask = [0u8; 4];
            mask.copy_from_slice(&buf[header_len..header_len + MASKING_KEY_LEN]);
            header_len += MASKING_KEY_LEN;
            Some(mask)
        } else {
            None
        };

        ensure_len(buf, header_len + payload_len)?;

        buf.advance(header_len);
        let mut payload = buf.split_to(payload_len);
        if let Some(mask) = mask {
            apply_mask(&mut payload, &mask);
        }

        Ok(Frame {
            fin,
            opcode,
            masked,
            mask,
            payload: payload.freeze(),
        })
    }

    /// Get the payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Check if this is a data frame
    pub fn is_data(&self) -> bool {
        self.opcode.is_data()
    }
}

fn ensure_len(buf: &BytesMut, needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(FrameError::InsufficientData {
            needed,
            have: buf.len(),
        }
        .into());
    }
    Ok(())
}

/// XOR `data` in place with the 4-byte masking key
fn apply_mask(data: &mut [u8], mask: &[u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Decoding limits for one endpoint
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    /// Which side is decoding
    pub role: Role,
    /// Largest payload accepted in a single frame
    pub max_frame_size: usize,
}

impl FrameLimits {
    /// Limits for a client reading server frames
    pub fn client(max_frame_size: usize) -> Self {
        Self {
            role: Role::Client,
            max_frame_size,
        }
    }

    /// Limits for a server reading client frames
    pub fn server(max_frame_size: usize) -> Self {
        Self {
            role: Role::Server,
            max_frame_size,
        }
    }
}

/// Frame parser for incremental parsing
#[derive(Debug)]
pub struct FrameParser {
    /// Buffer for partial frame data
    buffer: BytesMut,
    /// Decoding limits
    limits: FrameLimits,
    /// Set once a fatal error has been returned
    failed: bool,
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new(limits: FrameLimits) -> Self {
        Self {
            buffer: BytesMut::new(),
            limits,
            failed: false,
        }
    }

    /// Feed data to the parser and try to extract frames.
    ///
    /// Parsing stops at the first error; the error is the last element and
    /// every later call returns nothing, since the stream can no longer be
    /// resynchronised.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Frame>> {
        if self.failed {
            return Vec::new();
        }
        self.buffer.extend_from_slice(data);
        self.extract_frames()
    }

    fn extract_frames(&mut self) -> Vec<Result<Frame>> {
        let mut frames = Vec::new();

        loop {
            match Frame::parse(&mut self.buffer, &self.limits) {
                Ok(frame) => frames.push(Ok(frame)),
                Err(Error::Frame(FrameError::InsufficientData { .. })) => break,
                Err(e) => {
                    self.failed = true;
                    self.buffer.clear();
                    frames.push(Err(e));
                    break;
                }
            }
        }

        frames
    }

    /// Get the number of bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }
}
