//! Message handling for BinSocket
//!
//! This module turns decoded frames back into complete messages. Binary
//! messages may arrive split across a binary frame and any number of
//! continuation frames; control frames may be interleaved between those
//! fragments and are surfaced immediately.

use crate::error::{CloseCode, Error, MessageError, ProtocolError, Result};
use crate::frame::Frame;
use crate::protocol::{constants::DEFAULT_MAX_MESSAGE_SIZE, utils, Opcode};
use bytes::{Bytes, BytesMut};
use std::fmt;

/// A complete message produced by the [`MessageAssembler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Fully reassembled binary message
    Binary(Bytes),
    /// Ping message
    Ping(Bytes),
    /// Pong message
    Pong(Bytes),
    /// Close message; `None` when the peer sent no status code
    Close(Option<CloseFrame>),
}

impl Message {
    /// Get the message payload as bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Close(Some(frame)) => frame.reason.as_bytes(),
            Message::Close(None) => &[],
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Binary(data) => write!(f, "Binary({} bytes)", data.len()),
            Message::Ping(data) => write!(f, "Ping({} bytes)", data.len()),
            Message::Pong(data) => write!(f, "Pong({} bytes)", data.len()),
            Message::Close(Some(frame)) => write!(f, "Close({})", frame.code),
            Message::Close(None) => write!(f, "Close"),
        }
    }
}

/// Status code and reason carried by a close frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close code
    pub code: CloseCode,
    /// Close reason (may be empty)
    pub reason: String,
}

impl CloseFrame {
    /// Create a close frame description
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Parse a close frame payload.
    ///
    /// An empty payload means "no status"; a single byte, an invalid code
    /// or a non UTF-8 reason is a protocol error.
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(ProtocolError::InvalidClosePayload("truncated close code".to_string()).into()),
            _ => {
                let raw = u16::from_be_bytes([payload[0], payload[1]]);
                if !utils::is_valid_close_code(raw) {
                    return Err(ProtocolError::InvalidCloseCode(raw).into());
                }
                let reason = std::str::from_utf8(&payload[2..]).map_err(|_| {
                    ProtocolError::InvalidClosePayload("reason is not valid UTF-8".to_string())
                })?;
                Ok(Some(Self::new(CloseCode::from(raw), reason)))
            }
        }
    }

    /// Build the wire frame for this close description
    pub fn to_frame(&self) -> Frame {
        let reason = if self.reason.is_empty() {
            None
        } else {
            Some(self.reason.as_str())
        };
        Frame::close(Some(self.code.code()), reason)
    }
}

/// Message assembler for fragmented messages
#[derive(Debug)]
pub struct MessageAssembler {
    /// Buffer for the message being assembled
    buffer: BytesMut,
    /// Whether a fragmented message is open
    assembling: bool,
    /// Largest reassembled message accepted
    max_message_size: usize,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl MessageAssembler {
    /// Create a new message assembler
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            assembling: false,
            max_message_size,
        }
    }

    /// Feed a frame and try to assemble a complete message.
    ///
    /// Frames must be fed in arrival order. Returns `Ok(None)` while a
    /// fragmented message is still incomplete.
    pub fn feed_frame(&mut self, frame: Frame) -> Result<Option<Message>> {
        match frame.opcode {
            Opcode::Ping => Ok(Some(Message::Ping(frame.payload))),
            Opcode::Pong => Ok(Some(Message::Pong(frame.payload))),
            Opcode::Close => Ok(Some(Message::Close(CloseFrame::parse(&frame.payload)?))),
            Opcode::Binary => {
                if self.assembling {
                    return Err(ProtocolError::MessageInProgress.into());
                }
                if frame.fin {
                    self.check_size(frame.payload.len())?;
                    return Ok(Some(Message::Binary(frame.payload)));
                }
                self.check_size(frame.payload.len())?;
                self.assembling = true;
                self.buffer.extend_from_slice(&frame.payload);
                Ok(None)
            }
            Opcode::Continuation => {
                if !self.assembling {
                    return Err(ProtocolError::UnexpectedContinuation.into());
                }
                self.check_size(self.buffer.len() + frame.payload.len())?;
                self.buffer.extend_from_slice(&frame.payload);
                if frame.fin {
                    let message = self.buffer.split().freeze();
                    self.assembling = false;
                    Ok(Some(Message::Binary(message)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn check_size(&mut self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            self.reset();
            return Err(Error::Message(MessageError::TooLarge {
                size,
                max: self.max_message_size,
            }));
        }
        Ok(())
    }

    /// Reset the assembler state
    fn reset(&mut self) {
        self.buffer.clear();
        self.assembling = false;
    }

    /// Check if currently assembling a message
    pub fn is_assembling(&self) -> bool {
        self.assembling
    }

    /// Get the number of bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }
}
