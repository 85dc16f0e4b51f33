//! Frame exchange over blocking streams

use std::io::{self, Read, Write};

use bytes::Buf;

use super::{TransportConfig, TransportError, TransportResult, DEFAULT_READ_CHUNK_SIZE};
use crate::protocol::{decode_payload, encode, CodecError, Message, HEADER_SIZE};

/// Read until `n` bytes have been accumulated or the peer closes.
///
/// Returns whatever arrived, which is shorter than `n` only if a read
/// returned 0. Interrupted reads are retried; other I/O errors propagate.
pub fn read_exact<R: Read + ?Sized>(reader: &mut R, n: usize) -> io::Result<Vec<u8>> {
    read_exact_chunked(reader, n, DEFAULT_READ_CHUNK_SIZE)
}

/// [`read_exact`] with an explicit upper bound on each read call.
///
/// The buffer grows with the data actually received, so a large `n` from an
/// untrusted header does not allocate up front.
pub fn read_exact_chunked<R: Read + ?Sized>(
    reader: &mut R,
    n: usize,
    chunk_size: usize,
) -> io::Result<Vec<u8>> {
    let chunk_size = chunk_size.max(1);
    let mut buf = Vec::with_capacity(n.min(chunk_size));
    let mut chunk = vec![0u8; n.min(chunk_size)];

    while buf.len() < n {
        let want = (n - buf.len()).min(chunk.len());
        match reader.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(read) => buf.extend_from_slice(&chunk[..read]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(buf)
}

/// Write all of `data`, looping on partial writes
fn write_all_frame<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("stream accepted {} of {} frame bytes", written, data.len()),
                ));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    writer.flush()
}

/// Encode a message and write the whole frame.
///
/// Returns the number of bytes written. Nothing is written if encoding fails.
pub fn send_message<W: Write + ?Sized>(writer: &mut W, message: &Message) -> TransportResult<usize> {
    let frame = encode(message)?;
    write_all_frame(writer, &frame)?;
    tracing::trace!("Sent frame: {} fields, {} bytes", message.len(), frame.len());
    Ok(frame.len())
}

/// Read one frame and decode it
pub fn recv_message<R: Read + ?Sized>(reader: &mut R) -> TransportResult<Message> {
    recv_message_with(reader, &TransportConfig::default()).map(|(message, _)| message)
}

/// Read one frame, rejecting payloads larger than `max_payload_len`
pub fn recv_message_with_limit<R: Read + ?Sized>(
    reader: &mut R,
    max_payload_len: usize,
) -> TransportResult<Message> {
    let config = TransportConfig::default().with_max_payload_len(max_payload_len);
    recv_message_with(reader, &config).map(|(message, _)| message)
}

/// Read one frame under `config`; also returns the frame's size on the wire
pub(crate) fn recv_message_with<R: Read + ?Sized>(
    reader: &mut R,
    config: &TransportConfig,
) -> TransportResult<(Message, usize)> {
    let header = read_exact_chunked(reader, HEADER_SIZE, config.read_chunk_size)?;
    if header.len() < HEADER_SIZE {
        return Err(TransportError::HeaderReadFailed {
            received: header.len(),
        });
    }

    let expected = (&header[..]).get_u32() as usize;
    if expected > config.max_payload_len {
        return Err(CodecError::FrameTooLarge {
            len: expected,
            max: config.max_payload_len,
        }
        .into());
    }

    let payload = read_exact_chunked(reader, expected, config.read_chunk_size)?;
    if payload.len() < expected {
        return Err(TransportError::PayloadReadFailed {
            expected,
            received: payload.len(),
        });
    }

    // The header length is already satisfied, so parse the payload directly.
    let message = decode_payload(&payload)?;
    tracing::trace!("Received frame: {} fields, {} bytes", message.len(), HEADER_SIZE + expected);
    Ok((message, HEADER_SIZE + expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Value;
    use std::io::Cursor;

    /// Hands out at most `chunk` bytes per read, with an interruption between
    /// every successful read.
    struct TrickleReader {
        data: Cursor<Vec<u8>>,
        chunk: usize,
        interrupt_next: bool,
        reads: usize,
    }

    impl TrickleReader {
        fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
            Self {
                data: Cursor::new(data.into()),
                chunk,
                interrupt_next: false,
                reads: 0,
            }
        }
    }

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.interrupt_next = true;
            self.reads += 1;
            let len = buf.len().min(self.chunk);
            self.data.read(&mut buf[..len])
        }
    }

    /// Accepts at most `chunk` bytes per write
    struct TrickleWriter {
        data: Vec<u8>,
        chunk: usize,
        flushed: bool,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let len = buf.len().min(self.chunk);
            self.data.extend_from_slice(&buf[..len]);
            Ok(len)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    struct FailingStream(io::ErrorKind);

    impl Read for FailingStream {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(self.0.into())
        }
    }

    impl Write for FailingStream {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(self.0.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sample_message() -> Message {
        Message::new()
            .with("age", 30i64)
            .with("uid", 1_234_567_890_123_456_789u64)
            .with("price", 9.99f64)
            .with("name", "Alice")
            .with("blob", vec![7u8; 300])
    }

    #[test]
    fn test_read_exact_accumulates_small_chunks() {
        let mut reader = TrickleReader::new(b"hello world".to_vec(), 3);
        let data = read_exact(&mut reader, 8).unwrap();
        assert_eq!(data, b"hello wo");
        assert_eq!(reader.reads, 3);
    }

    #[test]
    fn test_read_exact_returns_short_on_close() {
        let mut reader = Cursor::new(b"abc".to_vec());
        assert_eq!(read_exact(&mut reader, 10).unwrap(), b"abc");
        assert!(read_exact(&mut reader, 10).unwrap().is_empty());
    }

    #[test]
    fn test_read_exact_zero_bytes() {
        let mut reader = FailingStream(io::ErrorKind::Other);
        assert!(read_exact(&mut reader, 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_exact_propagates_errors() {
        let mut reader = FailingStream(io::ErrorKind::ConnectionReset);
        let err = read_exact(&mut reader, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_send_loops_on_partial_writes() {
        let msg = sample_message();
        let mut writer = TrickleWriter {
            data: Vec::new(),
            chunk: 5,
            flushed: false,
        };

        let written = send_message(&mut writer, &msg).unwrap();
        assert_eq!(written, writer.data.len());
        assert!(writer.flushed);
        assert_eq!(&writer.data[..], &encode(&msg).unwrap()[..]);
    }

    #[test]
    fn test_send_write_zero_is_error() {
        let err = send_message(&mut ZeroWriter, &sample_message()).unwrap_err();
        match err {
            TransportError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::WriteZero),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_send_propagates_write_error() {
        let mut stream = FailingStream(io::ErrorKind::BrokenPipe);
        let err = send_message(&mut stream, &sample_message()).unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_recv_from_trickling_stream() {
        let msg = sample_message();
        let frame = encode(&msg).unwrap().to_vec();

        for chunk in [1, 2, 3, 7, 64] {
            let mut reader = TrickleReader::new(frame.clone(), chunk);
            assert_eq!(recv_message(&mut reader).unwrap(), msg);
        }
    }

    #[test]
    fn test_recv_consecutive_frames() {
        let first = Message::new().with("n", 1i64);
        let second = Message::new().with("n", 2i64);
        let mut wire = Vec::new();
        send_message(&mut wire, &first).unwrap();
        send_message(&mut wire, &second).unwrap();

        let mut reader = TrickleReader::new(wire, 3);
        assert_eq!(recv_message(&mut reader).unwrap(), first);
        assert_eq!(recv_message(&mut reader).unwrap(), second);
        assert!(matches!(
            recv_message(&mut reader),
            Err(TransportError::HeaderReadFailed { received: 0 })
        ));
    }

    #[test]
    fn test_recv_header_read_failed() {
        let mut reader = Cursor::new(vec![0u8, 0]);
        match recv_message(&mut reader) {
            Err(TransportError::HeaderReadFailed { received }) => assert_eq!(received, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_recv_payload_read_failed() {
        let frame = encode(&Message::new().with("age", 30i64)).unwrap();
        let mut reader = Cursor::new(frame[..12].to_vec());
        match recv_message(&mut reader) {
            Err(TransportError::PayloadReadFailed { expected, received }) => {
                assert_eq!(expected, 14);
                assert_eq!(received, 8);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_recv_rejects_malformed_payload() {
        let frame = [0u8, 0, 0, 4, 0, 1, b'k', 9];
        let mut reader = Cursor::new(frame.to_vec());
        assert!(matches!(
            recv_message(&mut reader),
            Err(TransportError::Codec(CodecError::UnknownTypeCode { code: 9, .. }))
        ));
    }

    #[test]
    fn test_recv_limit() {
        let frame = encode(&sample_message()).unwrap().to_vec();
        let mut reader = Cursor::new(frame.clone());
        assert!(matches!(
            recv_message_with_limit(&mut reader, 16),
            Err(TransportError::Codec(CodecError::FrameTooLarge { max: 16, .. }))
        ));

        let mut reader = Cursor::new(frame);
        let msg = recv_message_with_limit(&mut reader, 4096).unwrap();
        assert_eq!(msg.get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn test_recv_huge_declared_length_does_not_preallocate() {
        let mut reader = Cursor::new(vec![0xFFu8, 0xFF, 0xFF, 0xFF, 1, 2, 3]);
        match recv_message(&mut reader) {
            Err(TransportError::PayloadReadFailed { expected, received }) => {
                assert_eq!(expected, u32::MAX as usize);
                assert_eq!(received, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
