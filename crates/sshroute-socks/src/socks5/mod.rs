//! SOCKS5 wire protocol (RFC 1928), server side.

pub mod handshake;
