// SPDX-License-Identifier: GPL-3.0-only

//! LUKS container state machine: Closed ⇄ Open(inner mounted|unmounted).
//!
//! The inner filesystem object only exists while the container is open; the
//! container owns it and drops it on close. Opening and closing also flip
//! the matching PV entry's is_luks flag, since a PV inside an open container
//! becomes directly visible.

use serde::{Deserialize, Serialize};

use super::PlainFileSystem;
use crate::lvm::LvmContext;
use partflow_types::FileSystemType;

/// LUKS on-disk format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuksVersion {
    Luks1,
    Luks2,
}

impl LuksVersion {
    pub fn fs_type(&self) -> FileSystemType {
        match self {
            Self::Luks1 => FileSystemType::Luks,
            Self::Luks2 => FileSystemType::Luks2,
        }
    }
}

/// Supplies a passphrase on demand; returning None means the prompt was
/// cancelled.
pub trait PassphraseProvider {
    fn passphrase(&self, device_node: &str) -> Option<String>;
}

/// What the scanner found on a freshly opened mapper device.
#[derive(Debug, Clone)]
pub struct InnerProbe {
    pub fs_type: FileSystemType,
    pub label: Option<String>,
    pub uuid: Option<String>,
    pub mounted: bool,
    pub mount_point: Option<String>,
}

/// Collaborator wrapping the crypt tooling (cryptsetup). External; the
/// engine only consumes this interface.
pub trait CryptCollaborator {
    /// Open the container; returns the mapper device node on success.
    fn open(&mut self, device_node: &str, passphrase: &str) -> Option<String>;

    /// Close an open container by mapper node.
    fn close(&mut self, mapper_node: &str) -> bool;

    /// Probe the plaintext payload behind an open mapper node.
    fn probe_inner(&self, mapper_node: &str) -> InnerProbe;

    /// Re-read label and uuid of the encrypted container itself.
    fn read_outer(&self, device_node: &str) -> (Option<String>, Option<String>);
}

/// A LUKS container and, while open, its plaintext payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuksContainer {
    version: LuksVersion,
    outer_label: Option<String>,
    outer_uuid: Option<String>,
    mapper_node: Option<String>,
    inner: Option<Box<PlainFileSystem>>,
    inner_mounted: bool,
    inner_mount_point: Option<String>,
}

impl LuksContainer {
    pub fn new(version: LuksVersion) -> Self {
        Self {
            version,
            outer_label: None,
            outer_uuid: None,
            mapper_node: None,
            inner: None,
            inner_mounted: false,
            inner_mount_point: None,
        }
    }

    pub fn with_outer(version: LuksVersion, label: Option<String>, uuid: Option<String>) -> Self {
        Self {
            outer_label: label,
            outer_uuid: uuid,
            ..Self::new(version)
        }
    }

    pub fn version(&self) -> LuksVersion {
        self.version
    }

    pub fn is_crypt_open(&self) -> bool {
        self.mapper_node.is_some() && self.inner.is_some()
    }

    pub fn mapper_node(&self) -> Option<&str> {
        self.mapper_node.as_deref()
    }

    pub fn inner(&self) -> Option<&PlainFileSystem> {
        self.inner.as_deref()
    }

    pub fn inner_mounted(&self) -> bool {
        self.inner_mounted
    }

    /// Effective type: the payload's type while open, the container's own
    /// Luks/Luks2 type while closed. Computed per call, never stored.
    pub fn effective_type(&self) -> FileSystemType {
        match self.inner() {
            Some(inner) => inner.fs_type,
            None => self.version.fs_type(),
        }
    }

    pub fn effective_label(&self) -> Option<&str> {
        match self.inner() {
            Some(inner) => inner.label.as_deref(),
            None => self.outer_label.as_deref(),
        }
    }

    pub fn effective_uuid(&self) -> Option<&str> {
        match self.inner() {
            Some(inner) => inner.uuid.as_deref(),
            None => self.outer_uuid.as_deref(),
        }
    }

    /// Closing requires an open container with an unmounted payload; the
    /// mount must be undone first, it is never auto-handled.
    pub fn can_crypt_close(&self) -> bool {
        self.is_crypt_open() && !self.inner_mounted
    }

    /// Open the container. Fails fast, with no state change, if it is
    /// already open or the passphrase prompt is cancelled.
    pub fn crypt_open(
        &mut self,
        device_node: &str,
        passphrases: &dyn PassphraseProvider,
        crypt: &mut dyn CryptCollaborator,
        lvm: &mut LvmContext,
    ) -> bool {
        if self.is_crypt_open() {
            tracing::warn!(device_node, "container is already open");
            return false;
        }

        let passphrase = match passphrases.passphrase(device_node) {
            Some(passphrase) => passphrase,
            None => {
                tracing::debug!(device_node, "passphrase prompt cancelled");
                return false;
            }
        };

        let mapper_node = match crypt.open(device_node, &passphrase) {
            Some(node) => node,
            None => return false,
        };

        let probe = crypt.probe_inner(&mapper_node);
        self.inner = Some(Box::new(PlainFileSystem {
            fs_type: probe.fs_type,
            label: probe.label,
            uuid: probe.uuid,
        }));
        self.inner_mounted = probe.mounted;
        self.inner_mount_point = probe.mount_point;
        self.mapper_node = Some(mapper_node);

        // The PV is now directly visible rather than wrapped.
        lvm.set_luks_flag(device_node, false);
        true
    }

    /// Close the container, dropping the inner filesystem and re-reading the
    /// outer label/uuid from the encrypted container.
    pub fn crypt_close(
        &mut self,
        device_node: &str,
        crypt: &mut dyn CryptCollaborator,
        lvm: &mut LvmContext,
    ) -> bool {
        if !self.is_crypt_open() {
            tracing::warn!(device_node, "container is not open");
            return false;
        }
        if self.inner_mounted {
            tracing::warn!(device_node, "payload file system is still mounted");
            return false;
        }

        let Some(mapper_node) = self.mapper_node.clone() else {
            return false;
        };
        if !crypt.close(&mapper_node) {
            return false;
        }

        self.inner = None;
        self.mapper_node = None;
        self.inner_mount_point = None;
        let (label, uuid) = crypt.read_outer(device_node);
        self.outer_label = label;
        self.outer_uuid = uuid;

        lvm.set_luks_flag(device_node, true);
        true
    }

    /// Record a mount/unmount of the payload done elsewhere.
    pub fn set_inner_mounted(&mut self, mounted: bool, mount_point: Option<String>) {
        self.inner_mounted = mounted;
        self.inner_mount_point = mount_point;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lvm::PvEntry;

    struct FixedPassphrase(Option<&'static str>);

    impl PassphraseProvider for FixedPassphrase {
        fn passphrase(&self, _device_node: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct FakeCrypt {
        opens: u32,
        closes: u32,
    }

    impl FakeCrypt {
        fn new() -> Self {
            Self { opens: 0, closes: 0 }
        }
    }

    impl CryptCollaborator for FakeCrypt {
        fn open(&mut self, device_node: &str, _passphrase: &str) -> Option<String> {
            self.opens += 1;
            let name = device_node.trim_start_matches("/dev/").replace('/', "-");
            Some(format!("/dev/mapper/luks-{name}"))
        }

        fn close(&mut self, _mapper_node: &str) -> bool {
            self.closes += 1;
            true
        }

        fn probe_inner(&self, _mapper_node: &str) -> InnerProbe {
            InnerProbe {
                fs_type: FileSystemType::Ext4,
                label: Some("payload".to_string()),
                uuid: Some("abcd-1234".to_string()),
                mounted: false,
                mount_point: None,
            }
        }

        fn read_outer(&self, _device_node: &str) -> (Option<String>, Option<String>) {
            (None, Some("outer-uuid".to_string()))
        }
    }

    fn luks_pv_context() -> LvmContext {
        LvmContext::new(vec![PvEntry {
            device_node: "/dev/sda3".to_string(),
            vg_name: Some("vg0".to_string()),
            size: 1000,
            free: 500,
            is_luks: true,
        }])
    }

    #[test]
    fn open_then_reopen_fails_without_side_effects() {
        let mut container = LuksContainer::new(LuksVersion::Luks2);
        let mut crypt = FakeCrypt::new();
        let mut lvm = luks_pv_context();

        assert!(container.crypt_open(
            "/dev/sda3",
            &FixedPassphrase(Some("secret")),
            &mut crypt,
            &mut lvm
        ));
        assert_eq!(container.effective_type(), FileSystemType::Ext4);
        assert!(!lvm.entry("/dev/sda3").unwrap().is_luks);

        let snapshot = container.clone();
        assert!(!container.crypt_open(
            "/dev/sda3",
            &FixedPassphrase(Some("secret")),
            &mut crypt,
            &mut lvm
        ));
        assert_eq!(container, snapshot);
        assert_eq!(crypt.opens, 1);
    }

    #[test]
    fn cancelled_passphrase_aborts_open() {
        let mut container = LuksContainer::new(LuksVersion::Luks1);
        let mut crypt = FakeCrypt::new();
        let mut lvm = LvmContext::default();

        assert!(!container.crypt_open(
            "/dev/sda3",
            &FixedPassphrase(None),
            &mut crypt,
            &mut lvm
        ));
        assert!(!container.is_crypt_open());
        assert_eq!(crypt.opens, 0);
    }

    #[test]
    fn close_restores_outer_identity_and_pv_flag() {
        let mut container = LuksContainer::new(LuksVersion::Luks2);
        let mut crypt = FakeCrypt::new();
        let mut lvm = luks_pv_context();

        assert!(container.crypt_open(
            "/dev/sda3",
            &FixedPassphrase(Some("secret")),
            &mut crypt,
            &mut lvm
        ));
        assert!(container.crypt_close("/dev/sda3", &mut crypt, &mut lvm));

        assert_eq!(container.effective_type(), FileSystemType::Luks2);
        assert_eq!(container.effective_uuid(), Some("outer-uuid"));
        assert!(lvm.entry("/dev/sda3").unwrap().is_luks);
    }

    #[test]
    fn close_refuses_while_payload_is_mounted() {
        let mut container = LuksContainer::new(LuksVersion::Luks2);
        let mut crypt = FakeCrypt::new();
        let mut lvm = LvmContext::default();

        assert!(container.crypt_open(
            "/dev/sda3",
            &FixedPassphrase(Some("secret")),
            &mut crypt,
            &mut lvm
        ));
        container.set_inner_mounted(true, Some("/mnt/secret".to_string()));

        assert!(!container.can_crypt_close());
        assert!(!container.crypt_close("/dev/sda3", &mut crypt, &mut lvm));
        assert!(container.is_crypt_open());
        assert_eq!(crypt.closes, 0);
    }

    #[test]
    fn reopen_after_close_reproduces_mapper_and_inner_type() {
        let mut container = LuksContainer::new(LuksVersion::Luks2);
        let mut crypt = FakeCrypt::new();
        let mut lvm = LvmContext::default();
        let passphrase = FixedPassphrase(Some("secret"));

        assert!(container.crypt_open("/dev/sda3", &passphrase, &mut crypt, &mut lvm));
        let first_mapper = container.mapper_node().unwrap().to_string();
        let first_type = container.effective_type();

        assert!(container.crypt_close("/dev/sda3", &mut crypt, &mut lvm));
        assert!(container.crypt_open("/dev/sda3", &passphrase, &mut crypt, &mut lvm));

        assert_eq!(container.mapper_node(), Some(first_mapper.as_str()));
        assert_eq!(container.effective_type(), first_type);
    }
}
