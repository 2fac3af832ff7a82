//! The non-blocking send path shared by the data and command sockets.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use crate::error::ClientError;

/// Maximum number of would-block retries before a send is abandoned.
pub const MAX_SEND_ATTEMPTS: u32 = 15;

/// Backoff sleep between would-block retries.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(100);

/// Writes all of `data` to `writer`, retrying on transient would-block
/// conditions and giving up after [`MAX_SEND_ATTEMPTS`].
///
/// Returns the number of bytes actually sent. A short return is always
/// preceded by a call to `on_fatal` with the [`ClientError`] describing why;
/// the caller never has to infer failure from a partial byte count alone.
pub fn send_all(
    writer: &mut impl Write,
    mut data: &[u8],
    peer: impl Fn() -> String,
    on_fatal: impl Fn(ClientError),
) -> usize {
    let mut total_sent = 0usize;
    let mut would_block_tries = 0u32;

    while !data.is_empty() {
        match writer.write(data) {
            Ok(sent) => {
                total_sent += sent;
                data = &data[sent..];
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                would_block_tries += 1;
                if would_block_tries > MAX_SEND_ATTEMPTS {
                    on_fatal(ClientError::SendWouldBlockExceeded {
                        attempts: would_block_tries,
                        sent: total_sent,
                        peer: peer(),
                    });
                    return total_sent;
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt = would_block_tries, "send would-block, retrying");
                thread::sleep(WOULD_BLOCK_BACKOFF);
            }
            Err(source) => {
                on_fatal(ClientError::SendIoError {
                    peer: peer(),
                    source,
                });
                return total_sent;
            }
        }
    }

    total_sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A `Write` impl that always reports would-block, for backpressure tests.
    struct AlwaysWouldBlock;

    impl Write for AlwaysWouldBlock {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn exhausting_would_block_retries_reports_bytes_sent_so_far() {
        let fatal_count = Arc::new(AtomicUsize::new(0));
        let fatal_count2 = Arc::clone(&fatal_count);
        let mut writer = AlwaysWouldBlock;

        let sent = send_all(
            &mut writer,
            b"hello",
            || "test-peer".to_string(),
            move |err| {
                assert!(matches!(err, ClientError::SendWouldBlockExceeded { .. }));
                fatal_count2.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(sent, 0);
        assert_eq!(fatal_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn successful_write_needs_no_retries() {
        let buffer = RefCell::new(Vec::new());
        struct VecWriter<'a>(&'a RefCell<Vec<u8>>);
        impl Write for VecWriter<'_> {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = VecWriter(&buffer);
        let sent = send_all(&mut writer, b"hi", || "peer".to_string(), |_| {
            panic!("on_fatal should not be called on a clean write")
        });

        assert_eq!(sent, 2);
        assert_eq!(buffer.borrow().as_slice(), b"hi");
    }
}
