use anyhow::Context;
use machineflow_cloud::{CancellationToken, CloudApi, Credentials, MachineStore};
use machineflow_driver::{Driver, SshKeygen};
use machineflow_outscale::OutscaleClient;
use std::path::PathBuf;
use std::sync::Arc;

const SSH_KEY_FILE: &str = "id_rsa";

pub fn storage_root(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => dirs::data_dir()
            .map(|dir| dir.join("machineflow"))
            .context("Cannot determine a storage directory, use --storage-path"),
    }
}

pub fn client(credentials: &Credentials) -> anyhow::Result<Arc<dyn CloudApi>> {
    Ok(Arc::new(OutscaleClient::new(credentials)?))
}

pub fn ssh_key(store: &MachineStore, name: &str) -> SshKeygen {
    SshKeygen::new(store.machine_dir(name).join(SSH_KEY_FILE))
}

/// Fails for invalid names and machines without a record
pub fn ensure_exists(store: &MachineStore, name: &str) -> anyhow::Result<()> {
    validate_name(name)?;
    if !store.exists(name) {
        anyhow::bail!("Machine '{}' does not exist", name);
    }
    Ok(())
}

/// Driver for a stored machine
pub async fn open(
    store: &MachineStore,
    name: &str,
    cancel: CancellationToken,
) -> anyhow::Result<Driver> {
    ensure_exists(store, name)?;
    let record = store.load(name).await?;
    let api = client(&record.credentials)?;
    Ok(Driver::new(api, record).with_cancellation(cancel))
}

pub fn validate_name(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if !valid {
        anyhow::bail!(
            "Invalid machine name '{}': use letters, digits, '-', '_' or '.'",
            name
        );
    }
    Ok(())
}
