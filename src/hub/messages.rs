//! Typed documents exchanged with the hub.
//!
//! Each message kind has its own type so a handler can never confuse a
//! property update with an event. On the wire they stay plain JSON objects.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::topic::MessageKind;

/// Arbitrary JSON object
pub type JsonObject = serde_json::Map<String, Value>;

/// A document with a fixed message kind
pub trait HubPayload:
	Serialize + DeserializeOwned + Send + Sync + 'static
{
	const KIND: MessageKind;
}

macro_rules! json_document {
	($(#[$meta:meta])* $name:ident => $kind:expr) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub JsonObject);

		impl $name {
			pub fn new() -> Self {
				Self::default()
			}

			/// Builder style insert
			pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
				self.0.insert(key.into(), value.into());
				self
			}

			pub fn into_inner(self) -> JsonObject {
				self.0
			}
		}

		impl Deref for $name {
			type Target = JsonObject;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}

		impl DerefMut for $name {
			fn deref_mut(&mut self) -> &mut Self::Target {
				&mut self.0
			}
		}

		impl From<JsonObject> for $name {
			fn from(object: JsonObject) -> Self {
				Self(object)
			}
		}

		impl HubPayload for $name {
			const KIND: MessageKind = $kind;
		}
	};
}

json_document!(
	/// Thing Description (TD) document
	ThingDescription => MessageKind::Description
);
json_document!(
	/// Property name to value map
	PropertyValues => MessageKind::Values
);
json_document!(
	/// Event name to event value map
	ThingEvent => MessageKind::Event
);
json_document!(
	/// Requested configuration changes
	ConfigRequest => MessageKind::Config
);

impl ThingDescription {
	pub fn id(&self) -> Option<&str> {
		self.0.get("id").and_then(Value::as_str)
	}

	pub fn title(&self) -> Option<&str> {
		self.0.get("title").and_then(Value::as_str)
	}
}

/// A single requested action and its input parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionRequest {
	pub name: String,
	pub input: JsonObject,
}

impl ActionRequest {
	pub fn new(name: impl Into<String>, input: JsonObject) -> Self {
		Self {
			name: name.into(),
			input,
		}
	}
}

/// Action message: `{"<actionName>": {...input}}`, possibly with several
/// actions in one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionRequests(pub BTreeMap<String, JsonObject>);

impl ActionRequests {
	pub fn single(request: ActionRequest) -> Self {
		Self(BTreeMap::from([(request.name, request.input)]))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// One request per action in the document, ordered by name
	pub fn requests(self) -> impl Iterator<Item = ActionRequest> {
		self.0
			.into_iter()
			.map(|(name, input)| ActionRequest { name, input })
	}
}

impl HubPayload for ActionRequests {
	const KIND: MessageKind = MessageKind::Action;
}

/// Any hub document, tagged by its message kind
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
	Description(ThingDescription),
	Values(PropertyValues),
	Event(ThingEvent),
	Action(ActionRequests),
	Config(ConfigRequest),
}

impl HubMessage {
	pub fn kind(&self) -> MessageKind {
		match self {
			| HubMessage::Description(_) => MessageKind::Description,
			| HubMessage::Values(_) => MessageKind::Values,
			| HubMessage::Event(_) => MessageKind::Event,
			| HubMessage::Action(_) => MessageKind::Action,
			| HubMessage::Config(_) => MessageKind::Config,
		}
	}

	/// Parses a raw payload received on a topic of `kind`
	pub fn decode(
		kind: MessageKind,
		payload: &[u8],
	) -> Result<Self, serde_json::Error> {
		Ok(match kind {
			| MessageKind::Description => {
				HubMessage::Description(serde_json::from_slice(payload)?)
			}
			| MessageKind::Values => {
				HubMessage::Values(serde_json::from_slice(payload)?)
			}
			| MessageKind::Event => {
				HubMessage::Event(serde_json::from_slice(payload)?)
			}
			| MessageKind::Action => {
				HubMessage::Action(serde_json::from_slice(payload)?)
			}
			| MessageKind::Config => {
				HubMessage::Config(serde_json::from_slice(payload)?)
			}
		})
	}

	pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
		match self {
			| HubMessage::Description(td) => serde_json::to_vec(td),
			| HubMessage::Values(values) => serde_json::to_vec(values),
			| HubMessage::Event(event) => serde_json::to_vec(event),
			| HubMessage::Action(actions) => serde_json::to_vec(actions),
			| HubMessage::Config(config) => serde_json::to_vec(config),
		}
	}
}
