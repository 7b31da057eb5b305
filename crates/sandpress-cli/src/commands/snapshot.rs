//! `sandpress snapshot capture|restore|cleanup|status`

use super::{CliResult, TargetArgs};
use clap::{Args, Subcommand};
use sandpress_core::{ControlChannel, NullCache};
use sandpress_store::SqliteChannel;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Copy the live database to the snapshot file
    Capture(TargetArgs),
    /// Copy the snapshot back over the live database
    Restore(TargetArgs),
    /// Delete the snapshot file
    Cleanup(TargetArgs),
    /// Show whether a snapshot exists and whether the live file matches it
    Status(TargetArgs),
}

pub fn execute(args: SnapshotArgs) -> CliResult {
    match args.command {
        SnapshotCommand::Capture(target) => execute_capture(target),
        SnapshotCommand::Restore(target) => execute_restore(target),
        SnapshotCommand::Cleanup(target) => execute_cleanup(target),
        SnapshotCommand::Status(target) => execute_status(target),
    }
}

fn execute_capture(args: TargetArgs) -> CliResult {
    let mut store = args.resolve()?.store;
    store.capture()?;

    println!("captured {}", store.snapshot_path().display());
    if let Some(digest) = store.digest() {
        println!("sha256 {}", digest);
    }
    Ok(())
}

fn execute_restore(args: TargetArgs) -> CliResult {
    let mut store = args.resolve()?.store;
    if !store.resume()? {
        return Err(format!(
            "no snapshot at {}; run `sandpress snapshot capture` first",
            store.snapshot_path().display()
        )
        .into());
    }

    // Restore reopens the channel, which checks the restored file opens.
    let mut channel = SqliteChannel::detached(store.live_path());
    store.restore(&mut channel, &mut NullCache)?;
    channel.close()?;

    println!("restored {}", store.live_path().display());
    Ok(())
}

fn execute_cleanup(args: TargetArgs) -> CliResult {
    let mut store = args.resolve()?.store;
    store.cleanup()?;

    println!("removed {}", store.snapshot_path().display());
    Ok(())
}

fn execute_status(args: TargetArgs) -> CliResult {
    let mut store = args.resolve()?.store;

    println!("database: {}", store.live_path().display());
    if !store.resume()? {
        println!("snapshot: none");
        return Ok(());
    }
    println!("snapshot: {}", store.snapshot_path().display());
    if let Some(at) = store.captured_at() {
        println!("captured: {}", at.to_rfc3339());
    }
    if let Some(digest) = store.digest() {
        println!("sha256:   {}", digest);
    }
    let state = if store.live_matches_snapshot()? {
        "clean"
    } else {
        "modified"
    };
    println!("live:     {}", state);
    Ok(())
}
