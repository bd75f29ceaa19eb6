use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use kiln_probe::{config, InstanceofProbe};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let [config_path] = args.as_slice() else {
        bail!("usage: kiln_probe <config.json>");
    };

    let spec = config::load(config_path)
        .with_context(|| format!("invalid probe config {}", config_path.display()))?;

    let probe = InstanceofProbe::new(&spec.probe, spec.config)
        .with_project(spec.project)
        .with_components(spec.components);
    probe.execute()?;

    Ok(())
}
