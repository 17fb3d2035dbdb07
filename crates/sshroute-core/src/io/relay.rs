//! Bidirectional relay between a SOCKS client and its routed connection.
//!
//! Both directions are polled from one future, each with its own buffer and
//! state, so a stalled writer on one side never blocks the other side.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

/// Byte counts for a finished relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes copied from the client to the routed connection.
    pub upload: u64,
    /// Bytes copied from the routed connection back to the client.
    pub download: u64,
    /// True when the relay ended because neither side moved data in time.
    pub idle_timeout: bool,
}

enum Step {
    Reading,
    Writing { pos: usize, len: usize },
    Flushing,
    ShuttingDown,
    Done,
}

/// One copy direction: read into `buf`, write it all out, flush, repeat.
struct Direction {
    buf: Vec<u8>,
    step: Step,
    copied: u64,
}

impl Direction {
    fn new(buffer_size: usize) -> Self {
        Self {
            buf: vec![0u8; buffer_size],
            step: Step::Reading,
            copied: 0,
        }
    }

    fn is_done(&self) -> bool {
        matches!(self.step, Step::Done)
    }

    /// Drive this direction as far as it can go.
    ///
    /// Returns `Ready(Ok(true))` when bytes were flushed, `Ready(Ok(false))`
    /// when the direction just finished.
    fn poll_copy<R, W>(
        &mut self,
        cx: &mut Context<'_>,
        reader: &mut R,
        writer: &mut W,
    ) -> Poll<io::Result<bool>>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            match &mut self.step {
                Step::Reading => {
                    let mut read_buf = ReadBuf::new(&mut self.buf);
                    match Pin::new(&mut *reader).poll_read(cx, &mut read_buf) {
                        Poll::Ready(Ok(())) => {
                            let len = read_buf.filled().len();
                            self.step = if len == 0 {
                                Step::ShuttingDown
                            } else {
                                Step::Writing { pos: 0, len }
                            };
                        }
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Step::Writing { pos, len } => {
                    let (start, end) = (*pos, *len);
                    match Pin::new(&mut *writer).poll_write(cx, &self.buf[start..end]) {
                        Poll::Ready(Ok(0)) => {
                            return Poll::Ready(Err(io::Error::from(io::ErrorKind::WriteZero)));
                        }
                        Poll::Ready(Ok(n)) => {
                            self.copied += n as u64;
                            if start + n >= end {
                                self.step = Step::Flushing;
                            } else {
                                self.step = Step::Writing {
                                    pos: start + n,
                                    len: end,
                                };
                            }
                        }
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Step::Flushing => match Pin::new(&mut *writer).poll_flush(cx) {
                    Poll::Ready(Ok(())) => {
                        self.step = Step::Reading;
                        return Poll::Ready(Ok(true));
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                },
                // Half-close: shutdown errors are ignored, the peer may already be gone.
                Step::ShuttingDown => match Pin::new(&mut *writer).poll_shutdown(cx) {
                    Poll::Ready(_) => {
                        self.step = Step::Done;
                        return Poll::Ready(Ok(false));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Step::Done => return Poll::Ready(Ok(false)),
            }
        }
    }
}

/// Relay bytes between `client` and `upstream` until both sides reach EOF,
/// an I/O error occurs, or nothing moves for `idle_timeout`. `None` never
/// times out.
pub async fn relay_bidirectional<A, B>(
    client: A,
    upstream: B,
    idle_timeout: Option<Duration>,
    buffer_size: usize,
) -> io::Result<RelayStats>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let (mut upstream_r, mut upstream_w) = tokio::io::split(upstream);

    let mut up = Direction::new(buffer_size);
    let mut down = Direction::new(buffer_size);

    let idle = tokio::time::sleep(idle_timeout.unwrap_or_default());
    tokio::pin!(idle);

    while !(up.is_done() && down.is_done()) {
        let progress = std::future::poll_fn(|cx| {
            let mut ready = false;
            let mut moved = false;

            if !up.is_done() {
                match up.poll_copy(cx, &mut client_r, &mut upstream_w) {
                    Poll::Ready(Ok(flushed)) => {
                        ready = true;
                        moved |= flushed;
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {}
                }
            }
            if !down.is_done() {
                match down.poll_copy(cx, &mut upstream_r, &mut client_w) {
                    Poll::Ready(Ok(flushed)) => {
                        ready = true;
                        moved |= flushed;
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => {}
                }
            }

            if ready {
                Poll::Ready(Ok(moved))
            } else {
                Poll::Pending
            }
        });

        let timed_out = tokio::select! {
            result = progress => {
                if let (true, Some(timeout)) = (result?, idle_timeout) {
                    idle.as_mut().reset(Instant::now() + timeout);
                }
                false
            }
            _ = &mut idle, if idle_timeout.is_some() => true,
        };
        if timed_out {
            return Ok(RelayStats {
                upload: up.copied,
                download: down.copied,
                idle_timeout: true,
            });
        }
    }

    Ok(RelayStats {
        upload: up.copied,
        download: down.copied,
        idle_timeout: false,
    })
}
