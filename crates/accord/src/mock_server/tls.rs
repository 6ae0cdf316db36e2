//! TLS acceptor for https mock servers.

use rustls::pki_types::CertificateDer;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

use super::config::TlsConfig;

/// Create a TLS acceptor from the PEM files named in `config`.
pub fn create_tls_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, anyhow::Error> {
    let cert_path = config.cert_path.as_str();
    let key_path = config.key_path.as_str();

    let cert_file = std::fs::File::open(cert_path)
        .map_err(|e| anyhow::anyhow!("Failed to open certificate file '{cert_path}': {e}"))?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to parse certificate file: {e}"))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in certificate file: {cert_path}");
    }

    let key_file = std::fs::File::open(key_path)
        .map_err(|e| anyhow::anyhow!("Failed to open private key file '{key_path}': {e}"))?;
    let mut key_reader = std::io::BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| anyhow::anyhow!("Failed to parse private key file: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in key file: {key_path}"))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow::anyhow!("Failed to build TLS configuration: {e}"))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_certificate_file() {
        let config = TlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
        };
        let err = create_tls_acceptor(&config).err().unwrap();
        assert!(err.to_string().contains("Failed to open certificate file"));
    }

    #[test]
    fn test_certificate_file_without_certificates() {
        let mut cert = tempfile::NamedTempFile::new().unwrap();
        writeln!(cert, "not a pem file").unwrap();
        let config = TlsConfig {
            cert_path: cert.path().display().to_string(),
            key_path: "/nonexistent/key.pem".into(),
        };
        let err = create_tls_acceptor(&config).err().unwrap();
        assert!(err.to_string().contains("No certificates found"));
    }
}
