//! Plain-or-TLS transport shared by the protocol sessions.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::Endpoint;

/// Async read+write stream marker.
pub trait MailIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> MailIo for T {}

/// One established transport connection, plain TCP or TLS.
///
/// The session owns this value; dropping it closes the socket, which is
/// what makes timeout cancellation tear the connection down.
pub type MailStream = Box<dyn MailIo>;

/// Connect to an endpoint, performing the TLS handshake when configured.
pub async fn connect(endpoint: &Endpoint) -> std::io::Result<MailStream> {
    let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;

    if !endpoint.use_tls {
        debug!(host = %endpoint.host, port = endpoint.port, "plain transport connected");
        return Ok(Box::new(tcp));
    }

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    );
    let server_name = rustls::pki_types::ServerName::try_from(endpoint.host.clone())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let tls = TlsConnector::from(tls_config)
        .connect(server_name, tcp)
        .await?;
    debug!(host = %endpoint.host, port = endpoint.port, "TLS transport connected");
    Ok(Box::new(tls))
}
