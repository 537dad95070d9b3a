use colored::Colorize;
use machineflow_cloud::MachineStore;

pub async fn handle(store: &MachineStore) -> anyhow::Result<()> {
    let names = store.list().await?;
    if names.is_empty() {
        println!("{}", "ℹ No machines".dimmed());
        return Ok(());
    }

    println!(
        "{:<24} {:<16} {:<14} {}",
        "NAME".bold(),
        "IP".bold(),
        "REGION".bold(),
        "VM".bold()
    );
    for name in names {
        let record = match store.load(&name).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", name, e);
                continue;
            }
        };
        println!(
            "{:<24} {:<16} {:<14} {}",
            name.cyan(),
            record.ip_address.as_deref().unwrap_or("-"),
            record.credentials.region,
            record.vm_id.as_deref().unwrap_or("-").dimmed()
        );
    }
    Ok(())
}
