//! Authentication strategies and transport selection
//!
//! A connection authenticates either with username/password or with a
//! client certificate. The transport follows from the credential, the
//! configured CA certificate and whether the settings ask for WebSocket:
//!
//! | credential  | CA file | transport                      |
//! |-------------|---------|--------------------------------|
//! | password    | none    | plain TCP or `ws://`           |
//! | password    | set     | TLS or `wss://`, broker verified |
//! | certificate | none    | rejected                       |
//! | certificate | set     | TLS with client authentication |
//!
//! The hub serves password clients on a WebSocket listener, see
//! [`HubConfig::password_connection_settings`](super::HubConfig::password_connection_settings).

use std::{
	fmt, fs,
	io::BufReader,
	path::{Path, PathBuf},
	sync::Arc,
};

use rumqttc::{TlsConfiguration, Transport};
use rumqttc::tokio_rustls::rustls::{
	ClientConfig, RootCertStore,
	pki_types::{CertificateDer, PrivateKeyDer},
};
use tracing::debug;

use super::config::ConnectionSettings;
use super::error::CredentialError;

/// Loaded, ready-to-use authentication material
#[derive(Clone)]
pub enum Credential {
	Password {
		username: String,
		password: String,
	},
	ClientCertificate {
		/// Identity used as MQTT username and in the client id
		identity: String,
		chain: Vec<CertificateDer<'static>>,
		key: Arc<PrivateKeyDer<'static>>,
	},
}

impl fmt::Debug for Credential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| Credential::Password { username, .. } => f
				.debug_struct("Password")
				.field("username", username)
				.finish_non_exhaustive(),
			| Credential::ClientCertificate {
				identity, chain, ..
			} => f
				.debug_struct("ClientCertificate")
				.field("identity", identity)
				.field("chain_len", &chain.len())
				.finish_non_exhaustive(),
		}
	}
}

impl Credential {
	pub fn password(
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Credential::Password {
			username: username.into(),
			password: password.into(),
		}
	}

	/// Username without password, accepted by brokers allowing anonymous
	/// access
	pub fn anonymous(identity: impl Into<String>) -> Self {
		Self::password(identity, "")
	}

	/// Loads a PEM certificate chain and private key.
	///
	/// When either path is empty there is no key pair to load and the
	/// identity connects anonymously instead.
	pub fn client_certificate(
		identity: impl Into<String>,
		cert_file: &Path,
		key_file: &Path,
	) -> Result<Self, CredentialError> {
		let identity = identity.into();
		if cert_file.as_os_str().is_empty() || key_file.as_os_str().is_empty()
		{
			debug!(identity = %identity, "No client certificate given, connecting anonymously");
			return Ok(Self::anonymous(identity));
		}
		let chain = load_certificates(cert_file)?;
		let key = load_private_key(key_file)?;
		Ok(Credential::ClientCertificate {
			identity,
			chain,
			key: Arc::new(key),
		})
	}

	/// Name the client presents to the broker
	pub fn identity(&self) -> &str {
		match self {
			| Credential::Password { username, .. } => username,
			| Credential::ClientCertificate { identity, .. } => identity,
		}
	}

	/// Username/password pair for the CONNECT packet, if any. Certificate
	/// clients present their identity as username, without a password.
	pub(crate) fn login(&self) -> Option<(&str, &str)> {
		let (username, password) = match self {
			| Credential::Password { username, password } => {
				(username.as_str(), password.as_str())
			}
			| Credential::ClientCertificate { identity, .. } => {
				(identity.as_str(), "")
			}
		};
		(!username.is_empty()).then_some((username, password))
	}

	/// Picks the transport for this credential
	pub(crate) fn transport(
		&self,
		settings: &ConnectionSettings,
	) -> Result<Transport, CredentialError> {
		let roots = settings
			.tls
			.ca_cert_file
			.as_deref()
			.map(load_root_store)
			.transpose()?;

		let config = match (self, roots) {
			| (Credential::Password { .. }, None) if settings.websocket => {
				return Ok(Transport::Ws);
			}
			| (Credential::Password { .. }, None) => return Ok(Transport::Tcp),
			| (Credential::Password { .. }, Some(roots)) => {
				ClientConfig::builder()
					.with_root_certificates(roots)
					.with_no_client_auth()
			}
			| (Credential::ClientCertificate { .. }, None) => {
				return Err(CredentialError::MissingCaCertificate);
			}
			| (Credential::ClientCertificate { chain, key, .. }, Some(roots)) => {
				ClientConfig::builder()
					.with_root_certificates(roots)
					.with_client_auth_cert(chain.clone(), key.clone_key())?
			}
		};
		let tls = TlsConfiguration::Rustls(Arc::new(config));
		Ok(if settings.websocket {
			Transport::wss_with_config(tls)
		} else {
			Transport::tls_with_config(tls)
		})
	}
}

/// Where authentication material comes from.
///
/// Resolved into a [`Credential`] on every start so rotated certificate
/// files are picked up.
#[derive(Clone)]
pub enum AuthMethod {
	Password {
		username: String,
		password: String,
	},
	ClientCertificate {
		identity: String,
		cert_file: PathBuf,
		key_file: PathBuf,
	},
}

impl fmt::Debug for AuthMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			| AuthMethod::Password { username, .. } => f
				.debug_struct("Password")
				.field("username", username)
				.finish_non_exhaustive(),
			| AuthMethod::ClientCertificate {
				identity,
				cert_file,
				key_file,
			} => f
				.debug_struct("ClientCertificate")
				.field("identity", identity)
				.field("cert_file", cert_file)
				.field("key_file", key_file)
				.finish(),
		}
	}
}

impl AuthMethod {
	pub fn identity(&self) -> &str {
		match self {
			| AuthMethod::Password { username, .. } => username,
			| AuthMethod::ClientCertificate { identity, .. } => identity,
		}
	}

	pub fn resolve(&self) -> Result<Credential, CredentialError> {
		match self {
			| AuthMethod::Password { username, password } => {
				Ok(Credential::password(username, password))
			}
			| AuthMethod::ClientCertificate {
				identity,
				cert_file,
				key_file,
			} => Credential::client_certificate(identity, cert_file, key_file),
		}
	}
}

fn open(path: &Path) -> Result<BufReader<fs::File>, CredentialError> {
	fs::File::open(path)
		.map(BufReader::new)
		.map_err(|err| CredentialError::io(path, err))
}

fn load_certificates(
	path: &Path,
) -> Result<Vec<CertificateDer<'static>>, CredentialError> {
	let mut reader = open(path)?;
	let certs = rustls_pemfile::certs(&mut reader)
		.collect::<Result<Vec<_>, _>>()
		.map_err(|err| CredentialError::io(path, err))?;
	if certs.is_empty() {
		return Err(CredentialError::NoCertificate(path.to_path_buf()));
	}
	Ok(certs)
}

fn load_private_key(
	path: &Path,
) -> Result<PrivateKeyDer<'static>, CredentialError> {
	let mut reader = open(path)?;
	rustls_pemfile::private_key(&mut reader)
		.map_err(|err| CredentialError::io(path, err))?
		.ok_or_else(|| CredentialError::NoPrivateKey(path.to_path_buf()))
}

fn load_root_store(path: &Path) -> Result<RootCertStore, CredentialError> {
	let mut roots = RootCertStore::empty();
	for cert in load_certificates(path)? {
		roots.add(cert)?;
	}
	Ok(roots)
}
