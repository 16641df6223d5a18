//! # slotpack - Versioned Compressed Save Containers
//!
//! A small container format for compressed save data, plus the plumbing to
//! expose it to a host scripting layer: a class registry for reconstructing
//! saved objects by name, pluggable compression and slot storage, and an
//! upgrade path for files written before the format carried a version header.
//!
//! ## Wire format
//! A versioned file starts with the `SAVC` tag, followed by the format
//! version, the writer's package and engine versions, the class name, and a
//! length-prefixed compressed payload. Files without the tag are parsed on
//! the legacy path: class name at offset 0, remainder of the buffer as the
//! payload.
//!
//! ## Example
//! ```no_run
//! use slotpack::{
//!     ClassRegistry, EngineVersion, FileSlotStorage, Lz4Compressor, SaveSystem, VersionInfo,
//! };
//!
//! let registry = ClassRegistry::new(); // register::<MySave>() etc.
//! let versions = VersionInfo { package_version: 522, engine: EngineVersion::new(4, 8, 0) };
//! let mut system = SaveSystem::new(registry, Box::new(Lz4Compressor), versions);
//! system.set_storage(Box::new(FileSlotStorage::new("saves")));
//!
//! let loaded = system.load_compressed("slot0", 0);
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod migrate;
pub mod registry;
pub mod storage;
pub mod system;

pub use codec::{Compressor, Lz4Compressor};
pub use envelope::{decode, encode, EngineVersion, Envelope, VersionInfo, FILE_TYPE_TAG, FORMAT_VERSION};
pub use error::SaveError;
pub use migrate::{needs_upgrade, upgrade_legacy};
pub use registry::{decode_state, encode_state, ClassRegistry, SaveObject, VersionContext};
pub use storage::{FileSlotStorage, SlotStorage};
pub use system::SaveSystem;
