use std::collections::HashMap;

use domain::{DeliveryEvent, OrderCompletedEvent};
use serde::de::DeserializeOwned;

use crate::{OutboxError, OutboxMessage, Result};

type DecodeFn = fn(serde_json::Value) -> serde_json::Result<DeliveryEvent>;

fn decode_as<E>(payload: serde_json::Value) -> serde_json::Result<DeliveryEvent>
where
    E: DeserializeOwned + Into<DeliveryEvent>,
{
    serde_json::from_value::<E>(payload).map(Into::into)
}

/// Maps stored type tags to payload decoders.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl EventRegistry {
    /// Creates a registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `E` under `tag`, replacing any previous decoder.
    pub fn register<E>(&mut self, tag: &'static str) -> &mut Self
    where
        E: DeserializeOwned + Into<DeliveryEvent>,
    {
        self.decoders.insert(tag, decode_as::<E>);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Rebuilds the domain event stored in `message`.
    pub fn decode(&self, message: &OutboxMessage) -> Result<DeliveryEvent> {
        let decode = self
            .decoders
            .get(message.name.as_str())
            .ok_or_else(|| OutboxError::UnknownEventType(message.name.clone()))?;

        Ok(decode(message.payload.clone())?)
    }
}

impl Default for EventRegistry {
    /// A registry that knows every delivery event.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register::<OrderCompletedEvent>(OrderCompletedEvent::EVENT_TYPE);
        registry
    }
}
