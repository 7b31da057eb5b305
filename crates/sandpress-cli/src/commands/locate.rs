//! `sandpress locate`

use super::{CliResult, TargetArgs};

pub fn execute(args: TargetArgs) -> CliResult {
    let target = args.resolve()?;

    match &target.project_root {
        Some(root) => println!("project root:  {}", root.display()),
        None => println!("project root:  (none)"),
    }
    println!("mode:          {}", target.config.mode);
    println!("database:      {}", target.store.live_path().display());
    println!("snapshot:      {}", target.store.snapshot_path().display());
    Ok(())
}
