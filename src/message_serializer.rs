use std::fmt::{Debug, Display};

use serde::{Serialize, de::DeserializeOwned};

/// Converts typed hub documents to and from wire payloads
pub trait MessageSerializer<T>: Default + Clone + Send + Sync + 'static {
	type SerializeError: Debug + Display + Send + Sync + 'static;
	type DeserializeError: Debug + Display + Send + Sync + 'static;

	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError>;
	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError>;
}

/// UTF-8 JSON, the payload format every hub participant speaks
#[derive(Clone, Copy, Default, Debug)]
pub struct JsonSerializer;

impl JsonSerializer {
	pub fn new() -> Self {
		Self
	}
}

impl<T> MessageSerializer<T> for JsonSerializer
where T: Serialize + DeserializeOwned + 'static
{
	type SerializeError = serde_json::Error;
	type DeserializeError = serde_json::Error;

	fn serialize(&self, data: &T) -> Result<Vec<u8>, Self::SerializeError> {
		serde_json::to_vec(data)
	}

	fn deserialize(&self, bytes: &[u8]) -> Result<T, Self::DeserializeError> {
		serde_json::from_slice(bytes)
	}
}
