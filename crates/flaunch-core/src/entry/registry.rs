//! Self-describing serialization of entries.
//!
//! Entries cross process boundaries as an [`Envelope`]: the variant key, the
//! variant payload, the launch options and the build version of the sender.
//! Only variants registered on an [`EntryRegistry`] can be encoded or decoded,
//! and both sides of a transport must share the same build version.

use super::{Entry, EntryOptions};
use crate::version;
use crate::{LaunchError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use tracing::debug;

/// An entry type that can be registered for transport.
pub trait EntryVariant: Entry + Serialize + DeserializeOwned + Sized {
    /// Key written in the envelope. Defaults to the qualified type name.
    fn variant_key() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Wire format of a serialized entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub variant_key: String,
    pub data: Value,
    #[serde(default)]
    pub options: Option<EntryOptions>,
    pub build_version: String,
}

type EncodeFn = fn(&dyn Any) -> Result<Value>;
type DecodeFn = fn(Value) -> Result<Box<dyn Entry>>;

#[derive(Clone, Copy)]
struct VariantCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

fn encode_variant<T: EntryVariant>(entry: &dyn Any) -> Result<Value> {
    let entry = entry
        .downcast_ref::<T>()
        .ok_or_else(|| LaunchError::NotRegistered {
            key: T::variant_key().to_string(),
        })?;
    Ok(serde_json::to_value(entry)?)
}

fn decode_variant<T: EntryVariant>(payload: Value) -> Result<Box<dyn Entry>> {
    let entry: T = serde_json::from_value(payload).map_err(|e| LaunchError::PayloadDecode {
        key: T::variant_key().to_string(),
        message: e.to_string(),
    })?;
    Ok(Box::new(entry))
}

/// Registry of the entry variants that can be sent to a remote.
///
/// Populate it once at startup, then share it (usually behind an `Arc`) with
/// the frontend and the remote server.
pub struct EntryRegistry {
    by_key: HashMap<&'static str, VariantCodec>,
    by_type: HashMap<TypeId, (&'static str, VariantCodec)>,
    build_version: String,
}

impl Default for EntryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.by_key.keys().collect();
        keys.sort();
        f.debug_struct("EntryRegistry")
            .field("variants", &keys)
            .field("build_version", &self.build_version)
            .finish()
    }
}

impl EntryRegistry {
    /// Empty registry stamped with the running build version.
    pub fn new() -> Self {
        Self::with_build_version(version::build_version())
    }

    /// Empty registry stamped with an explicit build version.
    pub fn with_build_version(build_version: impl Into<String>) -> Self {
        Self {
            by_key: HashMap::new(),
            by_type: HashMap::new(),
            build_version: build_version.into(),
        }
    }

    /// Registry with every entry variant shipped by the launcher.
    pub fn with_builtin_variants() -> Result<Self> {
        let mut registry = Self::new();
        registry.register_builtin_variants()?;
        Ok(registry)
    }

    /// Register the launcher's own entry variants.
    pub fn register_builtin_variants(&mut self) -> Result<()> {
        self.register::<super::PathEntry>()?;
        self.register::<super::CommandEntry>()?;
        self.register::<super::ShortcutEntry>()?;
        self.register::<super::DesktopFile>()?;
        Ok(())
    }

    pub fn build_version(&self) -> &str {
        &self.build_version
    }

    /// Register a variant so it can be encoded and decoded.
    pub fn register<T: EntryVariant>(&mut self) -> Result<()> {
        let key = T::variant_key();
        if self.by_key.contains_key(key) || self.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(LaunchError::AlreadyRegistered {
                key: key.to_string(),
            });
        }

        let codec = VariantCodec {
            encode: encode_variant::<T>,
            decode: decode_variant::<T>,
        };
        self.by_key.insert(key, codec);
        self.by_type.insert(TypeId::of::<T>(), (key, codec));
        debug!("Registered entry variant {}", key);
        Ok(())
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Serialize an entry and its options into an envelope.
    pub fn encode(&self, entry: &dyn Entry, options: &EntryOptions) -> Result<Vec<u8>> {
        let any = entry.as_any();
        let (key, codec) = self
            .by_type
            .get(&any.type_id())
            .copied()
            .ok_or_else(|| LaunchError::NotRegistered {
                key: format!("{:?}", entry),
            })?;

        let envelope = Envelope {
            variant_key: key.to_string(),
            data: (codec.encode)(any)?,
            options: Some(options.clone()),
            build_version: self.build_version.clone(),
        };

        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Decode an envelope produced by [`EntryRegistry::encode`].
    ///
    /// The build version is checked before the variant key and the payload,
    /// so a sender from another build is always reported as such.
    pub fn decode(&self, bytes: &[u8]) -> Result<(Box<dyn Entry>, EntryOptions)> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|e| LaunchError::MalformedEnvelope {
                message: e.to_string(),
            })?;

        if envelope.build_version != self.build_version {
            return Err(LaunchError::VersionMismatch {
                expected: self.build_version.clone(),
                found: envelope.build_version,
            });
        }

        let codec = self
            .by_key
            .get(envelope.variant_key.as_str())
            .ok_or_else(|| LaunchError::NotRegistered {
                key: envelope.variant_key.clone(),
            })?;

        let entry = (codec.decode)(envelope.data)?;
        Ok((entry, envelope.options.unwrap_or_default()))
    }
}
