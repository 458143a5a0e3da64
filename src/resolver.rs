//! Host/port resolution into endpoints.

use std::ffi::{CStr, CString};
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;

use socket2::{Domain, Protocol, Type};

use crate::error::{ProbeError, Result};
use crate::target::Endpoint;

pub trait Resolve {
    /// Resolve `host` and `port` (a number or a service name) into the
    /// endpoints to probe, in resolver order.
    fn resolve(&self, host: &str, port: &str) -> Result<Vec<Endpoint>>;
}

/// Resolves through the system's `getaddrinfo`, IPv4 and IPv6 alike.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

struct AddrInfoList(*mut libc::addrinfo);

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

impl Resolve for SystemResolver {
    fn resolve(&self, host: &str, port: &str) -> Result<Vec<Endpoint>> {
        let fail = |reason: String| ProbeError::Resolve {
            host: host.to_string(),
            port: port.to_string(),
            reason,
        };
        let c_host = CString::new(host).map_err(|_| fail("host contains NUL".into()))?;
        let c_port = CString::new(port).map_err(|_| fail("port contains NUL".into()))?;

        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;

        let mut res: *mut libc::addrinfo = ptr::null_mut();
        let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), c_port.as_ptr(), &hints, &mut res) };
        if rc != 0 {
            let reason = unsafe { CStr::from_ptr(libc::gai_strerror(rc)) }
                .to_string_lossy()
                .into_owned();
            return Err(fail(reason));
        }
        let list = AddrInfoList(res);

        let mut endpoints = Vec::new();
        let mut cur = list.0;
        while !cur.is_null() {
            let ai = unsafe { &*cur };
            if let Some(addr) = unsafe { to_socket_addr(ai.ai_addr, ai.ai_addrlen) } {
                let protocol = (ai.ai_protocol != 0).then(|| Protocol::from(ai.ai_protocol));
                endpoints.push(Endpoint::from_parts(
                    Domain::from(ai.ai_family),
                    Type::from(ai.ai_socktype),
                    protocol,
                    addr,
                ));
            }
            cur = ai.ai_next;
        }
        Ok(endpoints)
    }
}

/// Convert a raw `sockaddr` into a std address. Families other than
/// IPv4/IPv6 yield `None`.
unsafe fn to_socket_addr(sa: *const libc::sockaddr, len: libc::socklen_t) -> Option<SocketAddr> {
    if sa.is_null() {
        return None;
    }
    let len = len as usize;
    match unsafe { (*sa).sa_family } as libc::c_int {
        libc::AF_INET if len >= mem::size_of::<libc::sockaddr_in>() => {
            let sin = unsafe { ptr::read_unaligned(sa as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
        }
        libc::AF_INET6 if len >= mem::size_of::<libc::sockaddr_in6>() => {
            let sin6 = unsafe { ptr::read_unaligned(sa as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}
