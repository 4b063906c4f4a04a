//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {0}")]
    MissingCertificate(String),
    #[error("private key file not found: {0}")]
    MissingKey(String),
    #[error("failed to load certificate/key: {0}")]
    Load(#[from] std::io::Error),
}

/// Load TLS configuration from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    if !cert_path.is_file() {
        return Err(TlsError::MissingCertificate(cert_path.display().to_string()));
    }
    if !key_path.is_file() {
        return Err(TlsError::MissingKey(key_path.display().to_string()));
    }
    Ok(RustlsConfig::from_pem_file(cert_path, key_path).await?)
}
