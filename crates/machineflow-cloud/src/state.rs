//! Machine state
//!
//! [`MachineRecord`] is the durable state of one managed VM. It is persisted by
//! [`MachineStore`] under `<root>/machines/<name>/machine.json`.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const RECORD_VERSION: u32 = 1;
const MACHINES_DIR: &str = "machines";
const RECORD_FILE: &str = "machine.json";
const RECORD_BACKUP: &str = "machine.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Credentials used to reach the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Kind of a provider-side resource owned by a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Keypair,
    SecurityGroup,
    PublicIp,
    Vm,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Keypair => write!(f, "keypair"),
            ResourceKind::SecurityGroup => write!(f, "security group"),
            ResourceKind::PublicIp => write!(f, "public IP"),
            ResourceKind::Vm => write!(f, "VM"),
        }
    }
}

/// Durable state of one managed machine
///
/// An identifier that is `None` (or empty) means the resource was never
/// created and is skipped on teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineRecord {
    /// Record format version
    #[serde(default = "record_version")]
    pub version: u32,

    pub machine_name: String,

    pub credentials: Credentials,

    /// Set once the VM has been observed running
    #[serde(default)]
    pub vm_id: Option<String>,

    #[serde(default)]
    pub keypair_name: Option<String>,

    #[serde(default)]
    pub security_group_id: Option<String>,

    #[serde(default)]
    pub public_ip_id: Option<String>,

    #[serde(default)]
    pub ip_address: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

fn record_version() -> u32 {
    RECORD_VERSION
}

impl MachineRecord {
    pub fn new(machine_name: impl Into<String>, credentials: Credentials) -> Self {
        let now = Utc::now();
        Self {
            version: RECORD_VERSION,
            machine_name: machine_name.into(),
            credentials,
            vm_id: None,
            keypair_name: None,
            security_group_id: None,
            public_ip_id: None,
            ip_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the identifier of a freshly created resource
    pub fn remember(&mut self, kind: ResourceKind, id: impl Into<String>) {
        let id = Some(id.into());
        match kind {
            ResourceKind::Keypair => self.keypair_name = id,
            ResourceKind::SecurityGroup => self.security_group_id = id,
            ResourceKind::PublicIp => self.public_ip_id = id,
            ResourceKind::Vm => self.vm_id = id,
        }
        self.updated_at = Utc::now();
    }

    /// Clear the identifier of a deleted resource
    pub fn forget(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::Keypair => self.keypair_name = None,
            ResourceKind::SecurityGroup => self.security_group_id = None,
            ResourceKind::PublicIp => {
                self.public_ip_id = None;
                self.ip_address = None;
            }
            ResourceKind::Vm => self.vm_id = None,
        }
        self.updated_at = Utc::now();
    }

    /// Identifier currently stored for `kind`, ignoring empty strings
    pub fn resource_id(&self, kind: ResourceKind) -> Option<&str> {
        let id = match kind {
            ResourceKind::Keypair => &self.keypair_name,
            ResourceKind::SecurityGroup => &self.security_group_id,
            ResourceKind::PublicIp => &self.public_ip_id,
            ResourceKind::Vm => &self.vm_id,
        };
        id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether any remote resource is still recorded
    pub fn has_resources(&self) -> bool {
        [
            ResourceKind::Keypair,
            ResourceKind::SecurityGroup,
            ResourceKind::PublicIp,
            ResourceKind::Vm,
        ]
        .into_iter()
        .any(|kind| self.resource_id(kind).is_some())
    }
}

/// Provider-side VM state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VmState {
    Pending,
    Running,
    Stopping,
    ShuttingDown,
    Stopped,
    Terminated,
    Quarantine,
    Unknown,
}

/// Provider vocabulary, one entry per known state
const VM_STATE_TABLE: [(&str, VmState); 7] = [
    ("pending", VmState::Pending),
    ("running", VmState::Running),
    ("stopping", VmState::Stopping),
    ("shutting-down", VmState::ShuttingDown),
    ("stopped", VmState::Stopped),
    ("terminated", VmState::Terminated),
    ("quarantine", VmState::Quarantine),
];

impl VmState {
    /// Map a provider state string; unmapped values become [`VmState::Unknown`]
    pub fn from_provider(raw: &str) -> Self {
        VM_STATE_TABLE
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, state)| *state)
            .unwrap_or_else(|| {
                tracing::debug!("Unmapped VM state '{}'", raw);
                VmState::Unknown
            })
    }

    pub fn as_provider_str(&self) -> &'static str {
        VM_STATE_TABLE
            .iter()
            .find(|(_, state)| state == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Coarse lifecycle state exposed to callers
    pub fn machine_state(&self) -> MachineState {
        match self {
            VmState::Pending => MachineState::Starting,
            VmState::Running => MachineState::Running,
            VmState::Stopping | VmState::ShuttingDown => MachineState::Stopping,
            VmState::Stopped | VmState::Terminated | VmState::Quarantine => MachineState::Stopped,
            VmState::Unknown => MachineState::Unknown,
        }
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_provider_str())
    }
}

/// Coarse lifecycle state of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    /// No VM exists
    None,
    Starting,
    Running,
    Stopping,
    Stopped,
    Unknown,
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::None => write!(f, ""),
            MachineState::Starting => write!(f, "Starting"),
            MachineState::Running => write!(f, "Running"),
            MachineState::Stopping => write!(f, "Stopping"),
            MachineState::Stopped => write!(f, "Stopped"),
            MachineState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Store for machine records
pub struct MachineStore {
    root: PathBuf,
}

impl MachineStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding everything that belongs to `name`
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.root.join(MACHINES_DIR).join(name)
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(RECORD_FILE)
    }

    fn backup_path(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(RECORD_BACKUP)
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(LOCK_FILE)
    }

    async fn ensure_machine_dir(&self, name: &str) -> Result<()> {
        let dir = self.machine_dir(name);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created machine directory: {}", dir.display());
        }
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.record_path(name).exists()
    }

    /// Load the record of `name`
    pub async fn load(&self, name: &str) -> Result<MachineRecord> {
        let path = self.record_path(name);
        if !path.exists() {
            return Err(CloudError::StateError(format!(
                "Machine '{}' does not exist",
                name
            )));
        }

        let content = fs::read_to_string(&path).await?;
        let record: MachineRecord = serde_json::from_str(&content)?;

        if record.version > RECORD_VERSION {
            return Err(CloudError::StateError(format!(
                "Machine record version {} is newer than supported version {}",
                record.version, RECORD_VERSION
            )));
        }

        tracing::debug!("Loaded machine record for {}", name);
        Ok(record)
    }

    /// Save a record, keeping the previous version as a backup
    pub async fn save(&self, record: &MachineRecord) -> Result<()> {
        let name = &record.machine_name;
        self.ensure_machine_dir(name).await?;

        let path = self.record_path(name);
        let backup = self.backup_path(name);

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(record)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved machine record for {}", name);
        Ok(())
    }

    /// Delete everything stored for `name`
    pub async fn remove(&self, name: &str) -> Result<()> {
        let dir = self.machine_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
            tracing::debug!("Removed machine directory: {}", dir.display());
        }
        Ok(())
    }

    /// List the names of all stored machines
    pub async fn list(&self) -> Result<Vec<String>> {
        let dir = self.root.join(MACHINES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.path().join(RECORD_FILE).exists() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Acquire the per-machine lock serializing lifecycle calls
    pub async fn acquire_lock(&self, name: &str) -> Result<MachineLock> {
        self.ensure_machine_dir(name).await?;

        let lock_path = self.lock_path(name);

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than one hour are considered abandoned
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "Machine '{}' is locked by {} (pid {}) since {}",
                    name, lock_info.holder, lock_info.pid, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired lock for {}", name);
        Ok(MachineLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for a machine lock
pub struct MachineLock {
    lock_path: PathBuf,
    released: bool,
}

impl MachineLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released machine lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for MachineLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
