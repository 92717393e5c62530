/// Transmitter module - relay-side UDP transport
///
/// One datagram per cycle, fire-and-forget: no acknowledgment, no retry,
/// no fragmentation. Any local socket error is surfaced to the caller and
/// ends the run.
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

use crate::codec::FrameCodec;
use crate::errors::{Result, StreamError};
use crate::receiver::Receiver;

/// Transmitter - stateless send helpers over a caller-owned socket
pub struct Transmitter;

impl Transmitter {
    /// Send one encoded frame to `destination`.
    ///
    /// # Returns
    /// Number of bytes transmitted
    ///
    /// # Errors
    /// `PayloadTooLarge` if the frame would not fit a single datagram,
    /// `Transport` on any socket failure.
    pub fn send_frame(socket: &UdpSocket, frame: &[u8], destination: SocketAddr) -> Result<usize> {
        if frame.len() > crate::MAX_PAYLOAD_SIZE {
            return Err(StreamError::PayloadTooLarge {
                required: frame.len(),
                available: crate::MAX_PAYLOAD_SIZE,
            });
        }

        let sent = socket
            .send_to(frame, destination)
            .map_err(|e| StreamError::Transport(format!("send to {} failed: {}", destination, e)))?;

        // A short write on UDP means the datagram was cut by the OS
        if sent != frame.len() {
            return Err(StreamError::Transport(format!(
                "partial datagram to {}: {} of {} bytes",
                destination,
                sent,
                frame.len()
            )));
        }
        Ok(sent)
    }
}

/// FrameSink - where the pump hands each encoded frame
///
/// `close` releases every socket the sink owns; sending after close is a
/// transport error.
pub trait FrameSink {
    fn send_frame(&mut self, frame: &[u8]) -> Result<usize>;

    fn close(&mut self);
}

/// UdpTransport - send socket, destination, and optional loop-back receiver
///
/// With loop-back enabled, each send is immediately followed by a blocking
/// receive of exactly one frame on the local bind address, which is decoded
/// to verify the layout end to end.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    destination: SocketAddr,
    loopback: Option<UdpSocket>,
    codec: FrameCodec,
}

impl UdpTransport {
    /// Bind the send socket (and loop-back socket, if requested).
    ///
    /// # Errors
    /// `Transport` if either socket cannot be bound.
    pub fn bind(
        send_bind: SocketAddr,
        destination: SocketAddr,
        loopback_bind: Option<SocketAddr>,
        codec: FrameCodec,
    ) -> Result<Self> {
        // Loop-back socket first so the destination exists before any send
        let loopback = loopback_bind
            .map(|addr| {
                UdpSocket::bind(addr).map_err(|e| {
                    StreamError::Transport(format!("failed to bind loop-back socket {}: {}", addr, e))
                })
            })
            .transpose()?;

        let socket = UdpSocket::bind(send_bind).map_err(|e| {
            StreamError::Transport(format!("failed to bind send socket {}: {}", send_bind, e))
        })?;

        if let Some(rx) = &loopback {
            log::info!(
                "Loop-back simulation on {}",
                rx.local_addr().map_err(|e| StreamError::Transport(e.to_string()))?
            );
        }
        log::info!(
            "UDP transport ready: {} -> {} ({} byte frames)",
            send_bind,
            destination,
            codec.frame_len()
        );

        Ok(Self {
            socket: Some(socket),
            destination,
            loopback,
            codec,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }
}

impl FrameSink for UdpTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<usize> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| StreamError::Transport("send socket is closed".to_string()))?;
        let sent = Transmitter::send_frame(socket, frame, self.destination)?;

        if let Some(rx) = &self.loopback {
            let decoded = Receiver::receive_decoded(rx, &self.codec)?;
            log::debug!("Loop-back received counters {:?}", decoded.counter);
        }
        Ok(sent)
    }

    fn close(&mut self) {
        let had_loopback = self.loopback.take().is_some();
        if self.socket.take().is_some() {
            log::info!(
                "UDP transport closed{}",
                if had_loopback { " (with loop-back socket)" } else { "" }
            );
        }
    }
}

/// Performance metrics for one encode + send
#[derive(Debug, Clone)]
pub struct TransmitMetrics {
    /// Total bytes transmitted
    pub bytes_sent: u64,

    /// Encoding time in microseconds
    pub encode_us: u64,

    /// Network transmission time in microseconds
    pub transmission_us: u64,

    /// Total operation time in microseconds
    pub total_us: u64,
}

/// Encode and transmit with timing
pub fn send_with_metrics(
    socket: &UdpSocket,
    codec: &FrameCodec,
    matrices: &crate::assembler::ChannelMatrices,
    destination: SocketAddr,
) -> Result<TransmitMetrics> {
    let start = Instant::now();

    let encode_start = Instant::now();
    let frame = codec.encode(matrices)?;
    let encode_us = encode_start.elapsed().as_micros() as u64;

    let transmission_start = Instant::now();
    let bytes_sent = Transmitter::send_frame(socket, &frame, destination)? as u64;
    let transmission_us = transmission_start.elapsed().as_micros() as u64;

    let total_us = start.elapsed().as_micros() as u64;

    Ok(TransmitMetrics {
        bytes_sent,
        encode_us,
        transmission_us,
        total_us,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ChannelMatrices;
    use crate::codec::FrameLayout;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let socket = UdpSocket::bind(localhost()).unwrap();
        let dest = socket.local_addr().unwrap();
        let frame = vec![0u8; crate::MAX_PAYLOAD_SIZE + 1];

        let result = Transmitter::send_frame(&socket, &frame, dest);
        assert!(matches!(result, Err(StreamError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_send_after_close_is_transport_error() {
        let codec = FrameCodec::new(FrameLayout::new(5, false, true));
        let rx = UdpSocket::bind(localhost()).unwrap();
        let mut transport =
            UdpTransport::bind(localhost(), rx.local_addr().unwrap(), None, codec).unwrap();

        transport.close();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.send_frame(&[0u8; 200]),
            Err(StreamError::Transport(_))
        ));

        // Closing twice is harmless
        transport.close();
    }

    #[test]
    fn test_send_with_metrics() {
        let codec = FrameCodec::new(FrameLayout::new(5, false, true));
        let rx = UdpSocket::bind(localhost()).unwrap();
        let tx = UdpSocket::bind(localhost()).unwrap();

        let metrics = send_with_metrics(
            &tx,
            &codec,
            &ChannelMatrices::sentinel(5, false),
            rx.local_addr().unwrap(),
        )
        .unwrap();

        assert_eq!(metrics.bytes_sent, 200);
        assert!(metrics.total_us >= metrics.transmission_us);
    }
}
