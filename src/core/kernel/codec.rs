use crate::core::errors::ExchangeError;
use bytes::{Buf, BufMut, BytesMut};
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

/// Length of the big-endian size prefix in front of every frame
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Upper bound on a single frame unless configured otherwise
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Length-prefixed protobuf framing.
///
/// Each frame is a 4-byte big-endian length followed by exactly that many
/// bytes of an encoded `M`. Frames above `max_frame_len` are rejected in both
/// directions so a corrupt prefix cannot make the reader buffer unbounded
/// data.
#[derive(Debug)]
pub struct FrameCodec<M> {
    max_frame_len: usize,
    _message: PhantomData<fn() -> M>,
}

impl<M> FrameCodec<M> {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            _message: PhantomData,
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl<M> Default for FrameCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for FrameCodec<M> {
    fn clone(&self) -> Self {
        Self::with_max_frame_len(self.max_frame_len)
    }
}

impl<M: prost::Message + Default> Decoder for FrameCodec<M> {
    type Item = M;
    type Error = ExchangeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<M>, ExchangeError> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let frame_len = u32::from_be_bytes(prefix) as usize;

        if frame_len > self.max_frame_len {
            return Err(ExchangeError::NetworkError(format!(
                "Inbound frame of {} bytes exceeds limit of {}",
                frame_len, self.max_frame_len
            )));
        }

        let total = LENGTH_PREFIX_LEN + frame_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let frame = src.split_to(frame_len);
        Ok(Some(M::decode(frame.freeze())?))
    }
}

impl<M: prost::Message> Encoder<M> for FrameCodec<M> {
    type Error = ExchangeError;

    fn encode(&mut self, item: M, dst: &mut BytesMut) -> Result<(), ExchangeError> {
        let frame_len = item.encoded_len();
        if frame_len > self.max_frame_len {
            return Err(ExchangeError::InvalidParameters(format!(
                "Outbound frame of {} bytes exceeds limit of {}",
                frame_len, self.max_frame_len
            )));
        }

        dst.reserve(LENGTH_PREFIX_LEN + frame_len);
        dst.put_u32(frame_len as u32);
        item.encode(dst)
            .map_err(|e| ExchangeError::Other(format!("Failed to encode frame: {}", e)))
    }
}
