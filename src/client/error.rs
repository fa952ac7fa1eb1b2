use std::{io, path::PathBuf, time::Duration};

use rumqttc::{ClientError, ConnectReturnCode, ConnectionError};
use rumqttc::tokio_rustls::rustls;
use thiserror::Error;

/// Problems turning credential files into something the TLS stack accepts
#[derive(Debug, Error)]
pub enum CredentialError {
	#[error("Failed to read {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("No certificate found in {}", .0.display())]
	NoCertificate(PathBuf),
	#[error("No private key found in {}", .0.display())]
	NoPrivateKey(PathBuf),
	#[error("TLS configuration rejected: {0}")]
	Tls(#[from] rustls::Error),
	/// Client certificates are only sent over TLS, which needs a CA
	#[error("Client certificate authentication requires a CA certificate")]
	MissingCaCertificate,
}

impl CredentialError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}
}

/// Why a connect attempt did not produce a session
#[derive(Debug, Error)]
pub enum ConnectError {
	#[error(transparent)]
	Credential(#[from] CredentialError),
	#[error("Network error: {0}")]
	Network(#[from] ConnectionError),
	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected { code: ConnectReturnCode },
	#[error("No ConnAck within {0:?}")]
	HandshakeTimeout(Duration),
	/// `close` was called while connecting
	#[error("Connect cancelled")]
	Cancelled,
}

/// Errors returned by publish operations
#[derive(Debug, Error)]
pub enum PublishError {
	#[error("not connected")]
	NotConnected,
	#[error("Client request failed: {0}")]
	Client(#[from] ClientError),
}
