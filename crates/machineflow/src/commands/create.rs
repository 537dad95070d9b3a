use crate::machine;
use colored::Colorize;
use machineflow_cloud::{CancellationToken, MachineRecord, MachineStore};
use machineflow_driver::{Driver, DriverConfig, DriverOptions};

pub async fn handle(
    store: &MachineStore,
    name: String,
    options: DriverOptions,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    machine::validate_name(&name)?;
    if store.exists(&name) {
        anyhow::bail!("Machine '{}' already exists", name);
    }

    let config = DriverConfig::from_options(&options)?;

    println!("{}", format!("Creating machine '{}'...", name).yellow());
    println!("Region: {}", config.credentials.region.cyan());
    println!("Image: {}", config.source_image.cyan());
    println!("Type: {}", config.instance_type.cyan());

    let lock = store.acquire_lock(&name).await?;
    let record = MachineRecord::new(&name, config.credentials.clone());
    let api = machine::client(&config.credentials)?;
    let mut driver = Driver::new(api, record).with_cancellation(cancel);
    let keys = machine::ssh_key(store, &name);

    // Supplied security groups are checked inside `create`
    let result = match driver.check_account().await {
        Ok(()) => driver.create(&config, &keys).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            store.save(driver.record()).await?;
            lock.release().await?;

            println!();
            println!(
                "{}",
                format!("✓ Machine '{}' is running", name).green().bold()
            );
            println!("  IP:  {}", driver.ip()?.cyan());
            println!("  URL: {}", driver.url()?.cyan());
            println!(
                "  SSH: {}@{} -i {}",
                driver.ssh_username(),
                driver.ssh_hostname()?,
                keys.private_key_path().display()
            );
            Ok(())
        }
        Err(err) => {
            if driver.record().has_resources() {
                // Keep what rollback could not delete so `rm` can retry it
                store.save(driver.record()).await?;
                lock.release().await?;
                println!(
                    "{}",
                    format!(
                        "Some resources of '{}' are left, run 'machineflow rm {}' to retry",
                        name, name
                    )
                    .yellow()
                );
            } else {
                lock.release().await?;
                store.remove(&name).await?;
            }
            Err(err.into())
        }
    }
}
