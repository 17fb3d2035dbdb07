//! Per-session SOCKS5 CONNECT handling.

use std::io::ErrorKind;
use std::net::SocketAddr;

use sshroute_core::io::relay_bidirectional;
use sshroute_tunnel::RouteError;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{Instrument, debug, info_span};

use crate::ProxyState;
use crate::error::{Socks5Error, SocksError};
use crate::socks5::handshake::{
    self, REPLY_ADDRESS_TYPE_NOT_SUPPORTED, REPLY_COMMAND_NOT_SUPPORTED,
    REPLY_CONNECTION_NOT_ALLOWED, REPLY_CONNECTION_REFUSED, REPLY_GENERAL_FAILURE,
    REPLY_HOST_UNREACHABLE, REPLY_NETWORK_UNREACHABLE, REPLY_SUCCEEDED, REPLY_TTL_EXPIRED,
    Socks5Request, send_reply_unspecified,
};

/// Handle a single SOCKS5 client connection.
pub async fn handle_socks5_conn<S>(mut stream: S, peer: SocketAddr, state: &ProxyState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let span = info_span!("session", peer = %peer);
    async {
        if let Err(e) = handle_socks5_conn_inner(&mut stream, state).await {
            debug!(error = %e, "session ended with error");
        }
    }
    .instrument(span)
    .await
}

async fn handle_socks5_conn_inner<S>(stream: &mut S, state: &ProxyState) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    handshake::negotiate_method(stream).await?;

    let request = match handshake::read_request(stream).await {
        Ok(req) => req,
        Err(Socks5Error::UnsupportedAddressType(atyp)) => {
            let _ = send_reply_unspecified(stream, REPLY_ADDRESS_TYPE_NOT_SUPPORTED).await;
            return Err(Socks5Error::UnsupportedAddressType(atyp).into());
        }
        Err(Socks5Error::InvalidDomain) => {
            let _ = send_reply_unspecified(stream, REPLY_ADDRESS_TYPE_NOT_SUPPORTED).await;
            return Err(Socks5Error::InvalidDomain.into());
        }
        Err(e) => return Err(e.into()),
    };

    match request.command {
        handshake::CMD_CONNECT => handle_connect(stream, &request, state).await,
        cmd => {
            let _ = send_reply_unspecified(stream, REPLY_COMMAND_NOT_SUPPORTED).await;
            Err(Socks5Error::UnsupportedCommand(cmd).into())
        }
    }
}

/// Handle TCP CONNECT command.
async fn handle_connect<S>(
    stream: &mut S,
    request: &Socks5Request,
    state: &ProxyState,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let target = request.target();
    debug!(dest = %target, "CONNECT");

    let routed = match state.router.resolve("tcp", &request.host, &target).await {
        Ok(routed) => routed,
        Err(e) => {
            let _ = send_reply_unspecified(stream, reply_code_for_route_error(&e)).await;
            return Err(e.into());
        }
    };
    debug!(dest = %target, route = %routed.route, "connected");

    send_reply_unspecified(stream, REPLY_SUCCEEDED).await?;

    let stats = relay_bidirectional(
        stream,
        routed.stream,
        state.idle_timeout(),
        state.relay.buffer_size,
    )
    .await?;
    debug!(
        dest = %target,
        upload = stats.upload,
        download = stats.download,
        idle_timeout = stats.idle_timeout,
        "session closed"
    );

    Ok(())
}

fn reply_code_for_route_error(error: &RouteError) -> u8 {
    if let RouteError::UnsupportedNetwork(_) = error {
        return REPLY_COMMAND_NOT_SUPPORTED;
    }
    match error.io_kind() {
        Some(ErrorKind::ConnectionRefused) => REPLY_CONNECTION_REFUSED,
        Some(ErrorKind::NetworkUnreachable) => REPLY_NETWORK_UNREACHABLE,
        Some(ErrorKind::HostUnreachable) => REPLY_HOST_UNREACHABLE,
        Some(ErrorKind::PermissionDenied) => REPLY_CONNECTION_NOT_ALLOWED,
        Some(ErrorKind::TimedOut) => REPLY_TTL_EXPIRED,
        Some(ErrorKind::AddrNotAvailable) => REPLY_HOST_UNREACHABLE,
        // Failed name resolution on a direct dial.
        Some(ErrorKind::NotFound) => REPLY_HOST_UNREACHABLE,
        _ => REPLY_GENERAL_FAILURE,
    }
}
