//! Basic mirror example demonstrating the engine and the controller

use std::error::Error;
use std::time::Duration;
use mirror_sync::{mirror_once, ControllerOptions, SyncController};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Basic Mirror Example");
    println!("====================");

    let temp_dir = tempfile::TempDir::new()?;
    let source_dir = temp_dir.path().join("preset");
    let dest_dir = temp_dir.path().join("storage").join("steam").join("user").join("config");

    tokio::fs::create_dir_all(source_dir.join("Main")).await?;
    tokio::fs::write(source_dir.join("Main").join("profile.sav"), b"preset profile").await?;
    tokio::fs::write(source_dir.join("campaign.sav"), b"preset campaign").await?;

    tokio::fs::create_dir_all(&dest_dir).await?;
    tokio::fs::write(dest_dir.join("campaign.sav"), b"live campaign").await?;
    tokio::fs::write(dest_dir.join("autosave.sav"), b"live autosave").await?;

    println!("Source directory: {}", source_dir.display());
    println!("Destination directory: {}", dest_dir.display());
    println!();

    // Example 1: one reconcile
    println!("Example 1: Single Reconcile");
    println!("---------------------------");

    let outcome = mirror_once(&source_dir, &dest_dir).await?;
    println!("Outcome: {:?}", outcome);
    let outcome = mirror_once(&source_dir, &dest_dir).await?;
    println!("Second run: {:?}", outcome);
    println!();

    assert!(dest_dir.join("Main").join("profile.sav").exists());
    assert!(!dest_dir.join("autosave.sav").exists());

    // Example 2: background loop through the controller
    println!("Example 2: Controller");
    println!("---------------------");

    let mut controller = SyncController::new(ControllerOptions {
        interval: Duration::from_millis(200),
        ..ControllerOptions::default()
    });

    let source = source_dir.to_string_lossy();
    let destination = dest_dir.to_string_lossy();
    if let Err(e) = controller.request_start(&source, &destination, false) {
        println!("Start refused: {}", e);
        if !e.needs_confirmation() {
            return Ok(());
        }
        controller.request_start(&source, &destination, true)?;
    }

    // A new file in the destination is removed on the next tick
    tokio::fs::write(dest_dir.join("stray.sav"), b"stray").await?;
    tokio::time::sleep(Duration::from_millis(600)).await;
    controller.request_stop().await;

    for event in controller.drain_events() {
        println!("{}", event);
    }
    assert!(!dest_dir.join("stray.sav").exists());

    println!();
    println!("All examples completed successfully!");

    Ok(())
}
