use crate::machine;
use colored::Colorize;
use machineflow_cloud::{CancellationToken, MachineState, MachineStore};

pub async fn handle_status(
    store: &MachineStore,
    name: String,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let driver = machine::open(store, &name, cancel).await?;
    let state = driver.get_state().await?;

    let label = state.to_string();
    let label = match state {
        MachineState::Running => label.green(),
        MachineState::Starting | MachineState::Stopping => label.yellow(),
        MachineState::Stopped => label.dimmed(),
        MachineState::None | MachineState::Unknown => label.red(),
    };
    println!("{}", label);
    Ok(())
}

pub async fn handle_ip(store: &MachineStore, name: String) -> anyhow::Result<()> {
    let driver = machine::open(store, &name, CancellationToken::new()).await?;
    println!("{}", driver.ip()?);
    Ok(())
}

pub async fn handle_url(store: &MachineStore, name: String) -> anyhow::Result<()> {
    let driver = machine::open(store, &name, CancellationToken::new()).await?;
    println!("{}", driver.url()?);
    Ok(())
}

/// The stored record, with the secret key masked
pub async fn handle_inspect(store: &MachineStore, name: String) -> anyhow::Result<()> {
    machine::ensure_exists(store, &name)?;
    let mut record = store.load(&name).await?;
    if !record.credentials.secret_key.is_empty() {
        record.credentials.secret_key = "********".to_string();
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
