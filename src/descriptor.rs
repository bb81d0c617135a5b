//! Descriptor strings naming a resolver endpoint.
//!
//! A descriptor selects a transport scheme and a server to probe. The
//! grammar is `udp://HOST[:PORT]`, `tcp://HOST[:PORT]` or
//! `tls://HOST[:PORT]`; a descriptor without a scheme prefix means plain
//! DNS over UDP. The host can be an IPv4 or IPv6 address or a name that
//! still needs to be resolved through the bootstrap resolver. IPv6
//! addresses with an explicit port need to be enclosed in brackets.

#![warn(clippy::missing_docs_in_private_items)]

use core::fmt;
use std::error;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

//------------ Configuration Constants ---------------------------------------

/// Default port for plain DNS over UDP or TCP.
const DNS_PORT: u16 = 53;

/// Default port for DNS over TLS.
const TLS_PORT: u16 = 853;

//------------ Scheme --------------------------------------------------------

/// The transport protocol a descriptor selects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scheme {
    /// Plain DNS over UDP.
    Udp,

    /// Plain DNS over a TCP connection.
    Tcp,

    /// DNS over TLS.
    Tls,
}

impl Scheme {
    /// Returns the default server port for the scheme.
    fn default_port(self) -> u16 {
        match self {
            Scheme::Udp | Scheme::Tcp => DNS_PORT,
            Scheme::Tls => TLS_PORT,
        }
    }
}

//------------ Host ----------------------------------------------------------

/// The server named by a descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Host {
    /// An IP address that can be connected to directly.
    Addr(IpAddr),

    /// A name that has to be resolved through the bootstrap resolver.
    Name(String),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Addr(addr) => addr.fmt(f),
            Host::Name(name) => name.fmt(f),
        }
    }
}

//------------ Descriptor ----------------------------------------------------

/// A decoded resolver descriptor.
///
/// Descriptors are decoded once when the registry is built. A line that
/// fails to decode aborts the whole run, so a value of this type always
/// names a probeable endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Descriptor {
    /// The transport to use for the probe query.
    scheme: Scheme,

    /// The server to send the probe query to.
    host: Host,

    /// The server port.
    port: u16,
}

impl Descriptor {
    /// Returns the transport scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the host portion.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Returns the server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the socket address for a host that is an IP address.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self.host {
            Host::Addr(addr) => Some(SocketAddr::new(addr, self.port)),
            Host::Name(_) => None,
        }
    }
}

impl FromStr for Descriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = if let Some(rest) = s.strip_prefix("udp://") {
            (Scheme::Udp, rest)
        } else if let Some(rest) = s.strip_prefix("tcp://") {
            (Scheme::Tcp, rest)
        } else if let Some(rest) = s.strip_prefix("tls://") {
            (Scheme::Tls, rest)
        } else if let Some((prefix, _)) = s.split_once("://") {
            return Err(DescriptorError::UnknownScheme(prefix.into()));
        } else {
            (Scheme::Udp, s)
        };
        let (host, port) = split_host_port(rest, scheme.default_port())?;
        Ok(Descriptor { scheme, host, port })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            Scheme::Udp => "udp",
            Scheme::Tcp => "tcp",
            Scheme::Tls => "tls",
        };
        match self.host {
            Host::Addr(IpAddr::V6(addr)) => {
                write!(f, "{}://[{}]:{}", scheme, addr, self.port)
            }
            _ => write!(f, "{}://{}:{}", scheme, self.host, self.port),
        }
    }
}

/// Splits `HOST[:PORT]` into its parts.
fn split_host_port(
    s: &str,
    default_port: u16,
) -> Result<(Host, u16), DescriptorError> {
    if s.is_empty() {
        return Err(DescriptorError::EmptyHost);
    }

    // Bracketed IPv6 literal, optionally followed by a port.
    if let Some(rest) = s.strip_prefix('[') {
        let (literal, tail) = rest
            .split_once(']')
            .ok_or_else(|| DescriptorError::BadIpv6(s.into()))?;
        let addr = Ipv6Addr::from_str(literal)
            .map_err(|_| DescriptorError::BadIpv6(s.into()))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if tail.is_empty() => default_port,
            None => return Err(DescriptorError::BadPort(tail.into())),
        };
        return Ok((Host::Addr(addr.into()), port));
    }

    // An unbracketed IPv6 literal cannot carry a port.
    if let Ok(addr) = Ipv6Addr::from_str(s) {
        return Ok((Host::Addr(addr.into()), default_port));
    }

    let (host, port) = match s.rsplit_once(':') {
        Some((host, port)) => (host, parse_port(port)?),
        None => (s, default_port),
    };
    if host.is_empty() {
        return Err(DescriptorError::EmptyHost);
    }
    match IpAddr::from_str(host) {
        Ok(addr) => Ok((Host::Addr(addr), port)),
        Err(_) => Ok((Host::Name(host.into()), port)),
    }
}

/// Parses an explicit port number.
fn parse_port(s: &str) -> Result<u16, DescriptorError> {
    u16::from_str(s).map_err(|_| DescriptorError::BadPort(s.into()))
}

//------------ DescriptorError -----------------------------------------------

/// A descriptor string could not be decoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DescriptorError {
    /// The scheme prefix is not one of `udp`, `tcp` or `tls`.
    UnknownScheme(String),

    /// The host portion is empty.
    EmptyHost,

    /// The port portion is not a valid port number.
    BadPort(String),

    /// A bracketed host is not a valid IPv6 address.
    BadIpv6(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::UnknownScheme(scheme) => {
                write!(f, "unknown scheme '{}'", scheme)
            }
            DescriptorError::EmptyHost => write!(f, "empty host"),
            DescriptorError::BadPort(port) => {
                write!(f, "invalid port '{}'", port)
            }
            DescriptorError::BadIpv6(host) => {
                write!(f, "invalid IPv6 address '{}'", host)
            }
        }
    }
}

impl error::Error for DescriptorError {}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;
    use std::net::Ipv4Addr;

    /// Shorthand for an IPv4 host.
    fn v4(addr: [u8; 4]) -> Host {
        Host::Addr(IpAddr::V4(Ipv4Addr::from(addr)))
    }

    /// Shorthand for an IPv6 host.
    fn v6(addr: &str) -> Host {
        Host::Addr(IpAddr::V6(Ipv6Addr::from_str(addr).expect("test addr")))
    }

    #[rstest]
    #[case("8.8.8.8", Scheme::Udp, v4([8, 8, 8, 8]), 53)]
    #[case("8.8.8.8:5353", Scheme::Udp, v4([8, 8, 8, 8]), 5353)]
    #[case("udp://9.9.9.9", Scheme::Udp, v4([9, 9, 9, 9]), 53)]
    #[case("tcp://1.1.1.1:5300", Scheme::Tcp, v4([1, 1, 1, 1]), 5300)]
    #[case(
        "tls://dns.google",
        Scheme::Tls,
        Host::Name("dns.google".into()),
        853
    )]
    #[case("tls://1.1.1.1", Scheme::Tls, v4([1, 1, 1, 1]), 853)]
    #[case("2001:db8::1", Scheme::Udp, v6("2001:db8::1"), 53)]
    #[case("[2001:db8::1]:5353", Scheme::Udp, v6("2001:db8::1"), 5353)]
    #[case("tls://[2001:db8::1]", Scheme::Tls, v6("2001:db8::1"), 853)]
    fn parses(
        #[case] input: &str,
        #[case] scheme: Scheme,
        #[case] host: Host,
        #[case] port: u16,
    ) {
        let descriptor: Descriptor = input.parse().expect("should parse");
        assert_eq!(descriptor.scheme(), scheme);
        assert_eq!(*descriptor.host(), host);
        assert_eq!(descriptor.port(), port);
    }

    #[rstest]
    #[case("", DescriptorError::EmptyHost)]
    #[case("udp://", DescriptorError::EmptyHost)]
    #[case(":53", DescriptorError::EmptyHost)]
    #[case(
        "https://dns.google/dns-query",
        DescriptorError::UnknownScheme("https".into())
    )]
    #[case("8.8.8.8:port", DescriptorError::BadPort("port".into()))]
    #[case("8.8.8.8:70000", DescriptorError::BadPort("70000".into()))]
    #[case("[2001:db8::1", DescriptorError::BadIpv6("[2001:db8::1".into()))]
    #[case("[not-v6]:53", DescriptorError::BadIpv6("[not-v6]:53".into()))]
    fn rejects(#[case] input: &str, #[case] expected: DescriptorError) {
        assert_eq!(input.parse::<Descriptor>(), Err(expected));
    }

    #[test]
    fn socket_addr_requires_an_address() {
        let direct: Descriptor = "tcp://127.0.0.1:5300".parse().unwrap();
        assert_eq!(
            direct.socket_addr(),
            Some(SocketAddr::from(([127, 0, 0, 1], 5300)))
        );
        let named: Descriptor = "tls://dns.google".parse().unwrap();
        assert_eq!(named.socket_addr(), None);
    }
}
