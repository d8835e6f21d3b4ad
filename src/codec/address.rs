//! IPv6 socket addresses in native layout.

use std::net::{Ipv6Addr, SocketAddrV6};

use crate::error::CollabError;
use crate::native::{AF_INET6, NativeAddress, SOCKADDR_IN6_SIZE, SockAddrIn6};

/// Converts a socket address to its native record. The port is stored in
/// network byte order; flow info and scope id are copied verbatim.
#[must_use]
pub fn encode_address(address: &SocketAddrV6) -> NativeAddress {
    NativeAddress {
        dw_size: SOCKADDR_IN6_SIZE,
        sin6: SockAddrIn6 {
            sin6_family: AF_INET6,
            sin6_port: address.port().to_be(),
            sin6_flowinfo: address.flowinfo(),
            sin6_addr: address.ip().octets(),
            sin6_scope_id: address.scope_id(),
        },
    }
}

/// Rebuilds a socket address from its native record.
///
/// # Errors
///
/// Returns [`CollabError::Validation`] if the record is not tagged as IPv6.
pub fn decode_address(native: &NativeAddress) -> Result<SocketAddrV6, CollabError> {
    let sin6 = &native.sin6;
    if sin6.sin6_family != AF_INET6 {
        return Err(CollabError::validation(format!(
            "address family {} is not IPv6",
            sin6.sin6_family
        )));
    }
    Ok(SocketAddrV6::new(
        Ipv6Addr::from(sin6.sin6_addr),
        u16::from_be(sin6.sin6_port),
        sin6.sin6_flowinfo,
        sin6.sin6_scope_id,
    ))
}
