use crate::machine;
use colored::Colorize;
use machineflow_cloud::{CancellationToken, MachineStore};

#[derive(Debug, Clone, Copy)]
pub enum Action {
    Start,
    Stop,
    Kill,
    Restart,
}

impl Action {
    fn progress(&self) -> &'static str {
        match self {
            Action::Start => "Starting",
            Action::Stop => "Stopping",
            Action::Kill => "Killing",
            Action::Restart => "Restarting",
        }
    }

    fn done(&self) -> &'static str {
        match self {
            Action::Start => "started",
            Action::Stop => "stopped",
            Action::Kill => "killed",
            Action::Restart => "restarted",
        }
    }
}

pub async fn handle(
    store: &MachineStore,
    name: String,
    action: Action,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    machine::ensure_exists(store, &name)?;
    let lock = store.acquire_lock(&name).await?;
    let driver = machine::open(store, &name, cancel).await?;

    println!(
        "{}",
        format!("{} machine '{}'...", action.progress(), name).yellow()
    );

    let result = match action {
        Action::Start => driver.start().await,
        Action::Stop => driver.stop().await,
        Action::Kill => driver.force_stop().await,
        Action::Restart => driver.restart().await,
    };
    lock.release().await?;
    result?;

    println!();
    println!(
        "{}",
        format!("✓ Machine '{}' {}", name, action.done())
            .green()
            .bold()
    );
    Ok(())
}
