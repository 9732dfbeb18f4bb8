//! Versioned module vault for spicetify.
//!
//! Modules are recorded in a JSON vault, materialised per version under
//! `store/<module>/<version>` from remote `.zip` archives or local folders,
//! and activated by linking `modules/<module>` at the enabled version. The
//! [`ModuleManager`] drives those transitions and the protocol
//! [`Dispatcher`] exposes them to the CLI and the daemon's RPC socket.
//! The [`hooks`] and [`host`] modules cover the remaining host chores: hook
//! scripts fetched from their release archive, the executable's update
//! endpoint, and the launch arguments.

pub mod artifact;
mod error;
pub mod hooks;
mod identifier;
pub mod host;
pub mod inject;
pub mod link;
mod manager;
mod metadata;
pub mod protocol;
mod store;

pub use artifact::{Artifact, ArtifactReference, resolve};
pub use error::{ErrorKind, VaultError};
pub use identifier::{ModuleIdentifier, StoreIdentifier, Version};
pub use manager::ModuleManager;
pub use metadata::Metadata;
pub use protocol::{Action, Dispatcher, Envelope, ModuleOperations, ProtocolError};
pub use store::{Module, Store, Vault, VaultStore};
