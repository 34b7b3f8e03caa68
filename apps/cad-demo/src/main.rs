use anyhow::Context;
use scene_shell::{sample, RenderCallbacks, Shell, ShellConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| sample::MODEL_PATH.to_string());
    let config = ShellConfig::from_env().context("reading shell configuration")?;

    println!("=== Scene CAD Example ===");
    println!("Rendering `{path}`; every emitted tree is printed as JSON.");
    println!();

    let shell = Shell::with_config(sample::registry(), config);
    let callbacks = RenderCallbacks::new().on_json_update(|json| {
        println!("{json}");
        Ok(())
    });
    let mut scene = shell
        .start_renderer(&path, callbacks)
        .with_context(|| format!("starting renderer for `{path}`"))?;

    let report = scene.run_until_idle()?;
    if !report.settled {
        log::warn!("stopped after {} cycle(s) with work still pending", report.cycles);
    }
    log::info!(
        "{} flush(es) over {} cycle(s)",
        report.flushes,
        report.cycles
    );
    scene.stop();
    Ok(())
}
