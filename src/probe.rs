//! Probing a single resolver endpoint.
//!
//! A probe is one bounded-time query attempt: it asks the endpoint for
//! the address of a fixed name and classifies the outcome. A probe only
//! succeeds if a response arrives within the timeout and carries at
//! least one answer record. Everything else, from connect failures to
//! empty answers, is a failure whose reason is informational only.
//!
//! The real prober sends its queries through the client transports of
//! the [domain] crate: `dgram` for UDP and `stream` over a fresh TCP or
//! TLS connection for the stream schemes. Each attempt owns its
//! transport and drops it on every exit path.

#![warn(clippy::missing_docs_in_private_items)]

use crate::descriptor::{Descriptor, Host, Scheme};
use crate::registry::ResolverEndpoint;
use bytes::Bytes;
use domain::base::{Message, MessageBuilder, Name, Rtype};
use domain::net::client::protocol::UdpConnect;
use domain::net::client::request::{
    RequestMessage, RequestMessageMulti, SendRequest,
};
use domain::net::client::{dgram, stream};
use domain::rdata::A;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use std::{error, fmt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_rustls::rustls;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::CryptoProvider;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    ClientConfig, DigitallySignedStruct, SignatureScheme,
};
use tokio_rustls::TlsConnector;
use tracing::debug;

//------------ Configuration Constants ---------------------------------------

/// The name every probe asks the endpoint to resolve.
const QUERY_NAME: &str = "youtube.com";

/// Maximum duration of a single probe attempt.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// The resolver used to resolve hostname descriptors.
const BOOTSTRAP: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(117, 50, 10, 10)), 53);

//------------ ProbeOutcome --------------------------------------------------

/// The classified result of one probe attempt.
///
/// Exactly one outcome is produced per endpoint and round.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeOutcome {
    /// The endpoint answered within the timeout.
    Success {
        /// Wall-clock duration of the attempt in milliseconds.
        elapsed_ms: u64,
    },

    /// The attempt failed. The endpoint's totals stay untouched.
    Failure(ProbeError),
}

//------------ ProbeError ----------------------------------------------------

/// Why a probe attempt failed.
///
/// Failures never propagate beyond the attempt; the reason only shows
/// up in debug logging.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeError {
    /// No response arrived within the attempt timeout.
    Timeout,

    /// A response arrived but contained no answer records.
    EmptyAnswer,

    /// Resolving a hostname descriptor through the bootstrap failed.
    Bootstrap(String),

    /// Building, sending, or receiving the request failed.
    Request(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout => write!(f, "timed out"),
            ProbeError::EmptyAnswer => write!(f, "no answer"),
            ProbeError::Bootstrap(reason) => {
                write!(f, "bootstrap lookup failed: {}", reason)
            }
            ProbeError::Request(reason) => reason.fmt(f),
        }
    }
}

impl error::Error for ProbeError {}

//------------ Prober --------------------------------------------------------

/// A source of probe attempts.
///
/// The round scheduler only knows this trait. Tests substitute an
/// implementation with scripted outcomes.
pub trait Prober: Send + Sync {
    /// Performs one bounded-time probe of the given endpoint.
    fn probe<'a>(
        &'a self,
        endpoint: &'a ResolverEndpoint,
    ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>>;
}

//------------ NetProber -----------------------------------------------------

/// Probes endpoints with real queries.
pub struct NetProber {
    /// TLS configuration with certificate verification disabled.
    tls_config: Arc<ClientConfig>,

    /// Where hostname descriptors get resolved.
    bootstrap: SocketAddr,
}

impl NetProber {
    /// Creates a prober using the fixed query parameters.
    pub fn new() -> Self {
        NetProber {
            tls_config: Arc::new(insecure_client_config()),
            bootstrap: BOOTSTRAP,
        }
    }

    /// Builds the request message for the fixed test question.
    fn query_message(
        qname: &str,
    ) -> Result<RequestMessage<Vec<u8>>, ProbeError> {
        let qname = Name::<Vec<u8>>::vec_from_str(qname)
            .map_err(|err| ProbeError::Request(err.to_string()))?;
        let mut msg = MessageBuilder::new_vec();
        msg.header_mut().set_rd(true);
        let mut msg = msg.question();
        msg.push((qname, Rtype::A))
            .map_err(|err| ProbeError::Request(err.to_string()))?;
        RequestMessage::new(msg)
            .map_err(|err| ProbeError::Request(err.to_string()))
    }

    /// The datagram transport configuration used for every UDP exchange.
    fn dgram_config() -> dgram::Config {
        let mut config = dgram::Config::new();
        config.set_max_parallel(1);
        config.set_max_retries(1);
        config.set_read_timeout(QUERY_TIMEOUT);
        config
    }

    /// The stream transport configuration used for TCP and TLS exchanges.
    fn stream_config() -> stream::Config {
        let mut config = stream::Config::new();
        config.set_response_timeout(QUERY_TIMEOUT);
        config
    }

    /// Performs the exchange for one attempt, without the time bound.
    async fn exchange(
        &self,
        descriptor: &Descriptor,
    ) -> Result<(), ProbeError> {
        let request = Self::query_message(QUERY_NAME)?;
        let addr = self.server_addr(descriptor).await?;
        let reply = match descriptor.scheme() {
            Scheme::Udp => self.exchange_udp(addr, request).await?,
            Scheme::Tcp => self.exchange_tcp(addr, request).await?,
            Scheme::Tls => {
                self.exchange_tls(descriptor.host(), addr, request).await?
            }
        };
        if reply.header_counts().ancount() == 0 {
            return Err(ProbeError::EmptyAnswer);
        }
        Ok(())
    }

    /// Returns the socket address to probe, resolving hostnames first.
    async fn server_addr(
        &self,
        descriptor: &Descriptor,
    ) -> Result<SocketAddr, ProbeError> {
        let addr = match descriptor.host() {
            Host::Addr(addr) => *addr,
            Host::Name(name) => self.bootstrap_lookup(name).await?,
        };
        Ok(SocketAddr::new(addr, descriptor.port()))
    }

    /// Resolves a hostname descriptor through the bootstrap resolver.
    async fn bootstrap_lookup(
        &self,
        name: &str,
    ) -> Result<IpAddr, ProbeError> {
        let request = Self::query_message(name)
            .map_err(|err| ProbeError::Bootstrap(err.to_string()))?;
        let conn = dgram::Connection::with_config(
            UdpConnect::new(self.bootstrap),
            Self::dgram_config(),
        );
        let mut request = conn.send_request(request);
        let reply = request
            .get_response()
            .await
            .map_err(|err| ProbeError::Bootstrap(err.to_string()))?;
        let answer = reply
            .answer()
            .map_err(|err| ProbeError::Bootstrap(err.to_string()))?;
        match answer.limit_to::<A>().flatten().next() {
            Some(record) => Ok(record.data().addr().into()),
            None => {
                Err(ProbeError::Bootstrap(format!("no address for {}", name)))
            }
        }
    }

    /// Exchanges the request over UDP.
    async fn exchange_udp(
        &self,
        addr: SocketAddr,
        request: RequestMessage<Vec<u8>>,
    ) -> Result<Message<Bytes>, ProbeError> {
        let conn = dgram::Connection::with_config(
            UdpConnect::new(addr),
            Self::dgram_config(),
        );
        let mut request = conn.send_request(request);
        request
            .get_response()
            .await
            .map_err(|err| ProbeError::Request(err.to_string()))
    }

    /// Exchanges the request over a fresh TCP connection.
    async fn exchange_tcp(
        &self,
        addr: SocketAddr,
        request: RequestMessage<Vec<u8>>,
    ) -> Result<Message<Bytes>, ProbeError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| ProbeError::Request(err.to_string()))?;
        Self::exchange_stream(stream, request).await
    }

    /// Exchanges the request over a fresh TLS connection.
    async fn exchange_tls(
        &self,
        host: &Host,
        addr: SocketAddr,
        request: RequestMessage<Vec<u8>>,
    ) -> Result<Message<Bytes>, ProbeError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|err| ProbeError::Request(err.to_string()))?;
        let connector = TlsConnector::from(self.tls_config.clone());
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|err| ProbeError::Request(err.to_string()))?;
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|err| ProbeError::Request(err.to_string()))?;
        Self::exchange_stream(tls, request).await
    }

    /// Runs one request over an established stream connection.
    ///
    /// The transport's driver task terminates once the request and the
    /// connection handle have been dropped.
    async fn exchange_stream(
        stream: impl tokio::io::AsyncRead
            + tokio::io::AsyncWrite
            + fmt::Debug
            + Send
            + Sync
            + Unpin
            + 'static,
        request: RequestMessage<Vec<u8>>,
    ) -> Result<Message<Bytes>, ProbeError> {
        let (conn, transport) = stream::Connection::<
            RequestMessage<Vec<u8>>,
            RequestMessageMulti<Vec<u8>>,
        >::with_config(stream, Self::stream_config());
        tokio::spawn(transport.run());
        let mut request = conn.send_request(request);
        request
            .get_response()
            .await
            .map_err(|err| ProbeError::Request(err.to_string()))
    }
}

impl Default for NetProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for NetProber {
    fn probe<'a>(
        &'a self,
        endpoint: &'a ResolverEndpoint,
    ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();
            let outcome = match timeout(
                QUERY_TIMEOUT,
                self.exchange(endpoint.descriptor()),
            )
            .await
            {
                Ok(Ok(())) => ProbeOutcome::Success {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                },
                Ok(Err(err)) => ProbeOutcome::Failure(err),
                Err(_) => ProbeOutcome::Failure(ProbeError::Timeout),
            };
            if let ProbeOutcome::Failure(ref err) = outcome {
                debug!("probe of {} failed: {}", endpoint.stamp(), err);
            }
            outcome
        })
    }
}

//------------ InsecureVerifier ----------------------------------------------

/// A certificate verifier that accepts any server certificate.
///
/// The probe transport deliberately skips verification, like the tool
/// this one replaces did. Do not reuse this outside of benchmarking.
#[derive(Debug)]
struct InsecureVerifier {
    /// Provides the supported signature schemes.
    provider: CryptoProvider,
}

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Creates the TLS client configuration for probe transports.
fn insecure_client_config() -> ClientConfig {
    let provider = rustls::crypto::ring::default_provider();
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier {
            provider,
        }))
        .with_no_client_auth()
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_message_builds() {
        assert!(NetProber::query_message(QUERY_NAME).is_ok());
        assert!(NetProber::query_message("dns.quad9.net").is_ok());
    }

    #[test]
    fn failure_reasons_render() {
        assert_eq!(ProbeError::Timeout.to_string(), "timed out");
        assert_eq!(ProbeError::EmptyAnswer.to_string(), "no answer");
        assert_eq!(
            ProbeError::Bootstrap("no address for x".into()).to_string(),
            "bootstrap lookup failed: no address for x"
        );
        assert_eq!(
            ProbeError::Request("connection refused".into()).to_string(),
            "connection refused"
        );
    }
}
