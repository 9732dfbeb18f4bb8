//! Command envelopes shared by the `protocol` command and the RPC socket.
//!
//! A message has the form `spicetify:<correlationId>:<action>?<query>` where
//! the query carries `id` (a store identifier), any number of `artifacts`,
//! and an optional `checksum`. The reply is `spicetify:<correlationId>:1` on
//! success and `:0` on failure; correlation id `0` asks for no reply at all
//! while still running the action.

use std::str::FromStr;

use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::artifact::ArtifactReference;
use crate::error::{ErrorKind, VaultError};
use crate::identifier::StoreIdentifier;
use crate::manager::ModuleManager;

const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

/// URI scheme of protocol messages.
pub const SCHEME: &str = "spicetify";

/// Correlation id for fire-and-forget messages.
const SILENT_CORRELATION_ID: &str = "0";

/// Actions understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    /// Record a store.
    Add,
    /// Materialise a recorded store.
    Install,
    /// Switch the enabled version.
    Enable,
    /// Disable if enabled, uninstall, and delete the store tree.
    Delete,
    /// Drop the version entry.
    Remove,
    /// `add` then `install`.
    FastInstall,
    /// `add`, `install`, then `enable`.
    FastEnable,
    /// Disable, then `delete`.
    FastDelete,
    /// `fast-delete` then `remove`.
    FastRemove,
}

/// Errors raised while handling a message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message is not a `scheme:correlationId:action` envelope.
    #[error("malformed message: {message}")]
    Malformed {
        /// What was wrong.
        message: String,
    },

    /// Message uses a scheme other than [`SCHEME`].
    #[error("unsupported scheme '{scheme}'")]
    UnsupportedScheme {
        /// Scheme as received.
        scheme: String,
    },

    /// The action failed.
    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl ProtocolError {
    /// Returns the failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } => ErrorKind::Decode,
            Self::UnsupportedScheme { .. } => ErrorKind::UnsupportedOperation,
            Self::Vault(error) => error.kind(),
        }
    }
}

/// Parsed envelope with the raw action text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Echoed in the reply.
    pub correlation_id: String,
    /// Action text, not yet validated.
    pub action: String,
    /// Store identifier from `id`.
    pub id: Option<StoreIdentifier>,
    /// Every `artifacts` value in order.
    pub artifacts: Vec<ArtifactReference>,
    /// `checksum` value, empty when absent.
    pub checksum: String,
}

impl Envelope {
    /// Parses a message.
    pub fn parse(message: &str) -> Result<Self, ProtocolError> {
        let url = Url::parse(message.trim()).map_err(|error| ProtocolError::Malformed {
            message: error.to_string(),
        })?;
        if url.scheme() != SCHEME {
            return Err(ProtocolError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }
        let (correlation_id, action) =
            url.path()
                .split_once(':')
                .ok_or_else(|| ProtocolError::Malformed {
                    message: format!("expected <correlationId>:<action>, got '{}'", url.path()),
                })?;

        let mut envelope = Self {
            correlation_id: correlation_id.to_owned(),
            action: action.to_owned(),
            id: None,
            artifacts: Vec::new(),
            checksum: String::new(),
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "id" => envelope.id = Some(StoreIdentifier::parse(&value)),
                "artifacts" => envelope.artifacts.push(ArtifactReference::new(value)),
                "checksum" => envelope.checksum = value.into_owned(),
                other => debug!(target: PROTOCOL_TARGET, key = other, "ignoring query parameter"),
            }
        }
        Ok(envelope)
    }

    /// Reply text for an outcome; empty for the silent correlation id.
    #[must_use]
    pub fn reply(&self, success: bool) -> String {
        if self.correlation_id == SILENT_CORRELATION_ID {
            return String::new();
        }
        format!(
            "{SCHEME}:{}:{}",
            self.correlation_id,
            if success { "1" } else { "0" }
        )
    }
}

/// Operations a dispatcher can drive.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleOperations {
    /// See [`ModuleManager::add`].
    fn add(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError>;
    /// See [`ModuleManager::install`].
    fn install(&self, id: &StoreIdentifier) -> Result<(), VaultError>;
    /// See [`ModuleManager::enable`].
    fn enable(&self, id: &StoreIdentifier) -> Result<(), VaultError>;
    /// See [`ModuleManager::delete`].
    fn delete(&self, id: &StoreIdentifier) -> Result<(), VaultError>;
    /// See [`ModuleManager::remove`].
    fn remove(&self, id: &StoreIdentifier) -> Result<(), VaultError>;
    /// See [`ModuleManager::fast_install`].
    fn fast_install(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError>;
    /// See [`ModuleManager::fast_enable`].
    fn fast_enable(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError>;
    /// See [`ModuleManager::fast_delete`].
    fn fast_delete(&self, id: &StoreIdentifier) -> Result<(), VaultError>;
    /// See [`ModuleManager::fast_remove`].
    fn fast_remove(&self, id: &StoreIdentifier) -> Result<(), VaultError>;
}

impl ModuleOperations for ModuleManager {
    fn add(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError> {
        Self::add(self, id, artifacts, checksum)
    }

    fn install(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        Self::install(self, id)
    }

    fn enable(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        Self::enable(self, id)
    }

    fn delete(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        Self::delete(self, id)
    }

    fn remove(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        Self::remove(self, id)
    }

    fn fast_install(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError> {
        Self::fast_install(self, id, artifacts, checksum)
    }

    fn fast_enable(
        &self,
        id: &StoreIdentifier,
        artifacts: &[ArtifactReference],
        checksum: &str,
    ) -> Result<(), VaultError> {
        Self::fast_enable(self, id, artifacts, checksum)
    }

    fn fast_delete(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        Self::fast_delete(self, id)
    }

    fn fast_remove(&self, id: &StoreIdentifier) -> Result<(), VaultError> {
        Self::fast_remove(self, id)
    }
}

/// Routes envelopes to [`ModuleOperations`].
#[derive(Debug, Clone)]
pub struct Dispatcher<M> {
    operations: M,
}

impl<M: ModuleOperations> Dispatcher<M> {
    /// Wraps an operations backend.
    pub fn new(operations: M) -> Self {
        Self { operations }
    }

    /// Handles one message, returning the reply text and the outcome.
    ///
    /// Messages that are not envelopes of this protocol get an empty reply.
    pub fn handle(&self, message: &str) -> (String, Result<(), ProtocolError>) {
        let envelope = match Envelope::parse(message) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(target: PROTOCOL_TARGET, %error, "rejected message");
                return (String::new(), Err(error));
            }
        };
        let result = self.dispatch(&envelope);
        match &result {
            Ok(()) => debug!(
                target: PROTOCOL_TARGET,
                correlation_id = %envelope.correlation_id,
                action = %envelope.action,
                "action succeeded"
            ),
            Err(error) => warn!(
                target: PROTOCOL_TARGET,
                correlation_id = %envelope.correlation_id,
                action = %envelope.action,
                kind = %error.kind(),
                %error,
                "action failed"
            ),
        }
        (envelope.reply(result.is_ok()), result)
    }

    fn dispatch(&self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let action = Action::from_str(&envelope.action).map_err(|_| {
            VaultError::UnsupportedOperation {
                action: envelope.action.clone(),
            }
        })?;
        let id = envelope
            .id
            .as_ref()
            .ok_or_else(|| VaultError::precondition("missing 'id' argument"))?;
        let artifacts = envelope.artifacts.as_slice();
        let checksum = envelope.checksum.as_str();
        let ops = &self.operations;

        match action {
            Action::Add => ops.add(id, artifacts, checksum),
            Action::Install => ops.install(id),
            Action::Enable => ops.enable(id),
            Action::Delete => ops.delete(id),
            Action::Remove => ops.remove(id),
            Action::FastInstall => ops.fast_install(id, artifacts, checksum),
            Action::FastEnable => ops.fast_enable(id, artifacts, checksum),
            Action::FastDelete => ops.fast_delete(id),
            Action::FastRemove => ops.fast_remove(id),
        }
        .map_err(ProtocolError::from)
    }
}
