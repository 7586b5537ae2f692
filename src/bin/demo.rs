//! Offstage demo
//!
//! Builds a small presentation chain, closes modules from different depths,
//! and prints the stage topology after each close as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use offstage::backend::StageBackend;
use offstage::memory::MemoryBackend;
use offstage::module::ModuleInput;
use offstage::navigator::Navigator;

/// Demo module that logs its skip notifications.
struct LoggingModule {
    name: &'static str,
}

impl ModuleInput for LoggingModule {
    fn did_skip_on_dismiss(&self) {
        info!("Module '{}' was skipped on dismiss", self.name);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    offstage::init();

    let backend = MemoryBackend::new().with_transition_delay(Duration::from_millis(150));
    let navigator = Navigator::new(backend.clone());
    let root = backend.root();

    // a settings flow: three modal steps, the middle one opting out of
    // surviving its child's close
    let menu = backend.add_screen();
    let wizard = backend.add_screen();
    let summary = backend.add_screen();
    backend.present(root, menu, false).finished().await?;
    backend.present(menu, wizard, false).finished().await?;
    backend.present(wizard, summary, false).finished().await?;
    backend.set_skip_on_dismiss(wizard, true)?;
    backend.set_module_input(summary, Arc::new(LoggingModule { name: "summary" }))?;

    info!("Stage before any close:");
    println!("{}", render(&backend)?);

    // closing the summary collapses the wizard with it
    navigator.close_module(summary, true).await?;
    info!("Stage after closing the summary:");
    println!("{}", render(&backend)?);

    // a navigation stack: closing the top entry pops it off
    let browser = backend.add_screen();
    let list = backend.add_screen();
    let detail = backend.add_screen();
    backend.push(browser, list)?;
    backend.push(browser, detail)?;
    backend.present(menu, browser, true).finished().await?;

    navigator.close_module(detail, true).await?;
    info!("Browser stack after the pop: {:?}", backend.stack_of(browser));
    println!("{}", render(&backend)?);

    // an embedded panel at the stack bottom: closing it passes through the
    // entry and takes the whole container down
    let filters = backend.add_screen();
    backend.attach_child(list, filters)?;
    backend.set_module_input(filters, Arc::new(LoggingModule { name: "filters" }))?;

    navigator.close_module(filters, false).await?;
    info!("Stage after closing the embedded panel:");
    println!("{}", render(&backend)?);

    Ok(())
}

fn render(backend: &MemoryBackend) -> Result<String> {
    serde_json::to_string_pretty(&backend.snapshot()).context("Failed to render stage snapshot")
}
