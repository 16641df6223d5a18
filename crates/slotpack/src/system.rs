use super::codec::Compressor;
use super::envelope::{self, Envelope, VersionInfo};
use super::error::SaveError;
use super::registry::{ClassRegistry, SaveObject, VersionContext};
use super::storage::SlotStorage;

/// Save/load entry points exposed to the host scripting layer.
///
/// Failures never cross this boundary as errors: `save_compressed` collapses
/// to `false` and `load_compressed` to `None`, with the cause logged. Callers
/// that need the underlying error can use the `try_` variants.
pub struct SaveSystem {
    registry: ClassRegistry,
    compressor: Box<dyn Compressor>,
    storage: Option<Box<dyn SlotStorage>>,
    versions: VersionInfo,
    legacy_versions: Option<VersionInfo>,
}

impl SaveSystem {
    pub fn new(
        registry: ClassRegistry,
        compressor: Box<dyn Compressor>,
        versions: VersionInfo,
    ) -> Self {
        Self { registry, compressor, storage: None, versions, legacy_versions: None }
    }

    pub fn set_storage(&mut self, storage: Box<dyn SlotStorage>) {
        self.storage = Some(storage);
    }

    /// Writer versions to assume for legacy files, which never stored any.
    /// Without this, legacy loads hand `None` versions to `restore_state`.
    pub fn set_legacy_versions(&mut self, versions: VersionInfo) {
        self.legacy_versions = Some(versions);
    }

    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    /// Compress the object's state and store it under the given slot.
    ///
    /// Returns `false` on any failure, including an empty slot name or a
    /// missing object, without touching storage in either guard case.
    pub fn save_compressed(
        &self,
        object: Option<&dyn SaveObject>,
        slot_name: &str,
        user_index: i32,
    ) -> bool {
        match self.try_save(object, slot_name, user_index) {
            Ok(()) => {
                log::info!("saved compressed slot '{}' (user {})", slot_name, user_index);
                true
            }
            Err(err) => {
                log::warn!("save to slot '{}' failed: {}", slot_name, err);
                false
            }
        }
    }

    /// Load, decompress, and reconstruct the object stored under a slot.
    ///
    /// Returns `None` on any failure; a decompression failure aborts the load
    /// so no partially-restored object escapes.
    pub fn load_compressed(&self, slot_name: &str, user_index: i32) -> Option<Box<dyn SaveObject>> {
        match self.try_load(slot_name, user_index) {
            Ok(object) => {
                log::info!("loaded compressed slot '{}' (user {})", slot_name, user_index);
                Some(object)
            }
            Err(err) => {
                log::warn!("load from slot '{}' failed: {}", slot_name, err);
                None
            }
        }
    }

    pub fn try_save(
        &self,
        object: Option<&dyn SaveObject>,
        slot_name: &str,
        user_index: i32,
    ) -> Result<(), SaveError> {
        if slot_name.is_empty() {
            return Err(SaveError::InvalidInput { reason: "empty slot name" });
        }
        let object = object.ok_or(SaveError::InvalidInput { reason: "no object to save" })?;
        let storage = self.storage()?;

        let raw = object.capture_state()?;
        let compressed = self.compressor.compress(&raw);
        let bytes = envelope::encode(object.class_name(), &self.versions, &compressed)?;

        storage.store(slot_name, user_index, &bytes)
    }

    pub fn try_load(&self, slot_name: &str, user_index: i32) -> Result<Box<dyn SaveObject>, SaveError> {
        if slot_name.is_empty() {
            return Err(SaveError::InvalidInput { reason: "empty slot name" });
        }
        let storage = self.storage()?;

        let bytes = storage
            .retrieve(slot_name, user_index)?
            .ok_or_else(|| SaveError::SlotNotFound { slot: slot_name.to_string() })?;

        let parsed = envelope::decode(&bytes)?;
        let ctx = self.version_context(&parsed);

        let class_name = parsed.class_name();
        let mut object = self
            .registry
            .instantiate(class_name)
            .ok_or_else(|| SaveError::ClassNotFound { name: class_name.to_string() })?;

        let raw = self.compressor.decompress(parsed.payload())?;
        object.restore_state(&raw, &ctx)?;

        Ok(object)
    }

    fn storage(&self) -> Result<&dyn SlotStorage, SaveError> {
        self.storage.as_deref().ok_or(SaveError::StorageUnavailable)
    }

    fn version_context(&self, parsed: &Envelope) -> VersionContext {
        VersionContext {
            format_version: parsed.format_version(),
            versions: parsed.versions().cloned().or_else(|| {
                if parsed.is_legacy() {
                    self.legacy_versions.clone()
                } else {
                    None
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Lz4Compressor;
    use crate::envelope::EngineVersion;
    use crate::registry::{decode_state, encode_state};

    use serde::{Deserialize, Serialize};
    use std::any::Any;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory storage that counts calls, for guard tests.
    #[derive(Default)]
    struct MemoryStorage {
        slots: Mutex<HashMap<(String, i32), Vec<u8>>>,
        store_calls: Arc<AtomicUsize>,
    }

    impl SlotStorage for MemoryStorage {
        fn store(&self, slot_name: &str, user_index: i32, bytes: &[u8]) -> Result<(), SaveError> {
            self.store_calls.fetch_add(1, Ordering::SeqCst);
            self.slots
                .lock()
                .unwrap()
                .insert((slot_name.to_string(), user_index), bytes.to_vec());
            Ok(())
        }

        fn retrieve(&self, slot_name: &str, user_index: i32) -> Result<Option<Vec<u8>>, SaveError> {
            Ok(self.slots.lock().unwrap().get(&(slot_name.to_string(), user_index)).cloned())
        }

        fn exists(&self, slot_name: &str, user_index: i32) -> bool {
            self.slots.lock().unwrap().contains_key(&(slot_name.to_string(), user_index))
        }

        fn delete(&self, slot_name: &str, user_index: i32) -> Result<(), SaveError> {
            self.slots.lock().unwrap().remove(&(slot_name.to_string(), user_index));
            Ok(())
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq, Clone)]
    struct PlayerSave {
        level: u32,
        name: String,
        inventory: Vec<String>,
    }

    impl SaveObject for PlayerSave {
        fn class_name(&self) -> &str {
            "PlayerSave"
        }

        fn capture_state(&self) -> Result<Vec<u8>, SaveError> {
            encode_state(self)
        }

        fn restore_state(&mut self, bytes: &[u8], _ctx: &VersionContext) -> Result<(), SaveError> {
            *self = decode_state(bytes)?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    /// Object that records the version context it was restored with.
    #[derive(Debug, Default)]
    struct VersionProbe {
        seen: Option<VersionContext>,
    }

    impl SaveObject for VersionProbe {
        fn class_name(&self) -> &str {
            "VersionProbe"
        }

        fn capture_state(&self) -> Result<Vec<u8>, SaveError> {
            Ok(Vec::new())
        }

        fn restore_state(&mut self, _bytes: &[u8], ctx: &VersionContext) -> Result<(), SaveError> {
            self.seen = Some(ctx.clone());
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn test_versions() -> VersionInfo {
        VersionInfo { package_version: 522, engine: EngineVersion::new(4, 8, 0) }
    }

    fn new_system() -> (SaveSystem, Arc<AtomicUsize>) {
        let mut registry = ClassRegistry::new();
        registry.register::<PlayerSave>();
        registry.register::<VersionProbe>();

        let storage = MemoryStorage::default();
        let store_calls = storage.store_calls.clone();

        let mut system = SaveSystem::new(registry, Box::new(Lz4Compressor), test_versions());
        system.set_storage(Box::new(storage));
        (system, store_calls)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (system, _) = new_system();

        let save = PlayerSave {
            level: 12,
            name: "Ada".to_string(),
            inventory: vec!["boots".to_string(), "lamp".to_string()],
        };

        assert!(system.save_compressed(Some(&save), "slot0", 0));

        let loaded = system.load_compressed("slot0", 0).unwrap();
        let restored = loaded.as_any().downcast_ref::<PlayerSave>().unwrap();
        assert_eq!(restored, &save);
    }

    #[test]
    fn test_empty_slot_name_skips_storage() {
        let (system, store_calls) = new_system();

        let save = PlayerSave::default();
        assert!(!system.save_compressed(Some(&save), "", 0));
        assert_eq!(store_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_object_skips_storage() {
        let (system, store_calls) = new_system();

        assert!(!system.save_compressed(None, "slot0", 0));
        assert_eq!(store_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_storage_backend() {
        let mut registry = ClassRegistry::new();
        registry.register::<PlayerSave>();
        let system = SaveSystem::new(registry, Box::new(Lz4Compressor), test_versions());

        let save = PlayerSave::default();
        assert!(!system.save_compressed(Some(&save), "slot0", 0));
        assert!(system.load_compressed("slot0", 0).is_none());

        let err = system.try_save(Some(&save), "slot0", 0).unwrap_err();
        assert!(matches!(err, SaveError::StorageUnavailable));
    }

    #[test]
    fn test_unknown_class_fails_load() {
        let (mut system, _) = new_system();

        let save = PlayerSave::default();
        assert!(system.save_compressed(Some(&save), "slot0", 0));

        // Fresh registry without the class
        system.registry = ClassRegistry::new();

        assert!(system.load_compressed("slot0", 0).is_none());
        let err = system.try_load("slot0", 0).unwrap_err();
        assert!(matches!(err, SaveError::ClassNotFound { .. }));
    }

    #[test]
    fn test_uncompressed_payload_aborts_load() {
        let (system, _) = new_system();

        // Well-formed envelope whose payload never went through the compressor
        let bytes = envelope::encode("PlayerSave", &test_versions(), &[0xFF; 32]).unwrap();
        system.storage().unwrap().store("bad", 0, &bytes).unwrap();

        assert!(system.load_compressed("bad", 0).is_none());
        let err = system.try_load("bad", 0).unwrap_err();
        assert!(matches!(err, SaveError::DecompressionFailed));
    }

    #[test]
    fn test_missing_slot_loads_nothing() {
        let (system, _) = new_system();
        assert!(system.load_compressed("never-written", 0).is_none());
    }

    #[test]
    fn test_versioned_load_passes_writer_versions() {
        let (system, _) = new_system();

        assert!(system.save_compressed(Some(&VersionProbe::default()), "probe", 0));

        let loaded = system.load_compressed("probe", 0).unwrap();
        let probe = loaded.as_any().downcast_ref::<VersionProbe>().unwrap();
        let ctx = probe.seen.as_ref().unwrap();

        assert_eq!(ctx.format_version, envelope::FORMAT_VERSION);
        assert_eq!(ctx.versions.as_ref(), Some(&test_versions()));
    }

    #[test]
    fn test_legacy_load_uses_fallback_versions() {
        let (mut system, _) = new_system();

        // Handcrafted legacy buffer: class name at offset 0, compressed tail
        let compressed = Lz4Compressor.compress(&[]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(12u32).to_le_bytes());
        bytes.extend_from_slice(b"VersionProbe");
        bytes.extend_from_slice(&compressed);
        system.storage().unwrap().store("legacy", 0, &bytes).unwrap();

        // Without a fallback the context carries no versions
        let loaded = system.load_compressed("legacy", 0).unwrap();
        let probe = loaded.as_any().downcast_ref::<VersionProbe>().unwrap();
        let ctx = probe.seen.as_ref().unwrap();
        assert_eq!(ctx.format_version, 1);
        assert!(ctx.versions.is_none());

        // With one, legacy loads see the configured versions
        let fallback =
            VersionInfo { package_version: 403, engine: EngineVersion::new(4, 7, 6) };
        system.set_legacy_versions(fallback.clone());

        let loaded = system.load_compressed("legacy", 0).unwrap();
        let probe = loaded.as_any().downcast_ref::<VersionProbe>().unwrap();
        let ctx = probe.seen.as_ref().unwrap();
        assert_eq!(ctx.versions.as_ref(), Some(&fallback));
    }
}
