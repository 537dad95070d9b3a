use crate::machine;
use colored::Colorize;
use machineflow_cloud::{CancellationToken, MachineStore};

pub async fn handle(
    store: &MachineStore,
    name: String,
    force: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    machine::ensure_exists(store, &name)?;
    let lock = store.acquire_lock(&name).await?;
    let mut driver = machine::open(store, &name, cancel).await?;

    println!("{}", format!("Removing machine '{}'...", name).yellow());

    let result = driver.remove().await;
    match result {
        Ok(()) => {
            lock.release().await?;
            store.remove(&name).await?;

            println!();
            println!("{}", format!("✓ Removed '{}'", name).green().bold());
            Ok(())
        }
        Err(err) if force => {
            lock.release().await?;
            store.remove(&name).await?;

            println!("{}", err.to_string().red());
            println!(
                "{}",
                format!("ℹ Forgot '{}' anyway (--force)", name).dimmed()
            );
            Ok(())
        }
        Err(err) => {
            // Deleted resources are dropped from the record, the rest stay for a retry
            store.save(driver.record()).await?;
            lock.release().await?;
            Err(err.into())
        }
    }
}
