use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

use crate::codec::{DecodedFrame, FrameCodec};
use crate::errors::{Result, StreamError};

pub struct Receiver;

impl Receiver {
    /// Block until one datagram arrives and check it is exactly `expected_len` bytes.
    ///
    /// The buffer is one byte larger than a valid frame so oversized
    /// datagrams are detected instead of silently truncated.
    pub fn receive_frame(socket: &UdpSocket, expected_len: usize) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buffer = vec![0u8; expected_len + 1];
        let (bytes_received, sender_addr) = socket
            .recv_from(&mut buffer)
            .map_err(|e| StreamError::Transport(format!("receive failed: {}", e)))?;

        if bytes_received != expected_len {
            return Err(StreamError::FrameLengthMismatch {
                expected: expected_len,
                received: bytes_received,
            });
        }

        buffer.truncate(bytes_received);
        Ok((buffer, sender_addr))
    }

    /// Like [`Receiver::receive_frame`] but returns `Ok(None)` when the
    /// socket's read timeout elapses.
    pub fn try_receive_frame(
        socket: &UdpSocket,
        expected_len: usize,
    ) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buffer = vec![0u8; expected_len + 1];
        match socket.recv_from(&mut buffer) {
            Ok((bytes_received, sender_addr)) => {
                if bytes_received != expected_len {
                    return Err(StreamError::FrameLengthMismatch {
                        expected: expected_len,
                        received: bytes_received,
                    });
                }
                buffer.truncate(bytes_received);
                Ok(Some((buffer, sender_addr)))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(StreamError::Transport(format!("receive failed: {}", e))),
        }
    }

    pub fn receive_decoded(socket: &UdpSocket, codec: &FrameCodec) -> Result<DecodedFrame> {
        let (frame, _) = Self::receive_frame(socket, codec.frame_len())?;
        codec.decode(&frame)
    }
}

#[derive(Debug, Clone)]
pub struct ReceiveMetrics {
    pub bytes_received: u64,

    pub receive_us: u64,

    pub decode_us: u64,

    pub total_us: u64,
}

pub fn receive_with_metrics(
    socket: &UdpSocket,
    codec: &FrameCodec,
) -> Result<(DecodedFrame, ReceiveMetrics)> {
    let start = Instant::now();

    let receive_start = Instant::now();
    let (frame, _sender_addr) = Receiver::receive_frame(socket, codec.frame_len())?;
    let receive_us = receive_start.elapsed().as_micros() as u64;

    let decode_start = Instant::now();
    let decoded = codec.decode(&frame)?;
    let decode_us = decode_start.elapsed().as_micros() as u64;

    let total_us = start.elapsed().as_micros() as u64;

    let metrics = ReceiveMetrics {
        bytes_received: frame.len() as u64,
        receive_us,
        decode_us,
        total_us,
    };

    Ok((decoded, metrics))
}
