//! Batch screenshot exporter.
//!
//! Builds a kernel from one or more WGSL sources, applies option overrides,
//! renders a (possibly tiled, possibly animated) screenshot and writes it as
//! PNG.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};

use clam_engine::device::{check_kernel, ContextInit, Gpu};
use clam_engine::kernel::{extract_options, CompiledKernel, KernelError, OptionSnapshot};
use clam_engine::logging::{init_logging, LoggingConfig};
use clam_engine::params::{KeyframeParameters, NamedParameters, ParameterSource};
use clam_engine::session::{CaptureActivity, CaptureConfig, RenderSession};
use clam_engine::status::{LogStatus, StatusSink};

#[derive(Parser)]
#[command(author, version, about = "Render a clam kernel to a PNG screenshot")]
struct Cli {
    /// Kernel source files, concatenated in order
    #[arg(required_unless_present = "list_adapters", value_hint = ValueHint::FilePath)]
    kernels: Vec<PathBuf>,

    /// Screenshot height in pixels; width follows the 16:9 aspect ratio
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Split the image into TILES x TILES launches
    #[arg(long, default_value_t = 1)]
    tiles: u32,

    /// Frames accumulated when rendering keyframes
    #[arg(long, default_value_t = 150)]
    frames: u32,

    #[arg(long, short, default_value = "screenshot.png", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Option snapshot (JSON object) to restore before building
    #[arg(long, value_hint = ValueHint::FilePath)]
    options: Option<PathBuf>,

    /// Write the final option values to this file
    #[arg(long, value_hint = ValueHint::FilePath)]
    save_options: Option<PathBuf>,

    /// Override a kernel option
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_option)]
    set: Vec<(String, String)>,

    /// Scene parameter bound after width and height, in order given
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, f32)>,

    /// Keyframe file (JSON array of {name: value} objects); replaces --param
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "params")]
    keyframes: Option<PathBuf>,

    /// Print the kernel's options and exit
    #[arg(long)]
    list_options: bool,

    /// Validate the kernel (with --set overrides) without a GPU and exit
    #[arg(long)]
    check: bool,

    /// Use a software adapter
    #[arg(long)]
    fallback_adapter: bool,

    /// Adapter index from --list-adapters (overrides CLAM_DEVICE)
    #[arg(long)]
    device: Option<usize>,

    /// Print the available adapters and exit
    #[arg(long)]
    list_adapters: bool,

    /// Log filter in env_logger syntax (overrides RUST_LOG)
    #[arg(long)]
    log: Option<String>,
}

fn parse_option(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{arg}`"))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_param(arg: &str) -> Result<(String, f32), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{arg}`"))?;
    let value = value
        .parse()
        .map_err(|e| format!("`{value}` is not a number: {e}"))?;
    Ok((name.to_string(), value))
}

/// Validates `sources` with `overrides` applied, without a device.
/// Returns the preprocessor warnings.
fn check_sources(sources: &[String], overrides: &[(String, String)]) -> Result<String> {
    let mut options = extract_options(sources);
    for (key, value) in overrides {
        options.set(key, value)?;
    }
    if let Some(bad) = options.invalid_define() {
        return Err(KernelError::InvalidOptionSyntax {
            key: bad.key.clone(),
            value: bad.value.clone(),
        }
        .into());
    }
    check_kernel(sources, &options.define_flags())
        .map_err(|build_log| anyhow::anyhow!("kernel check failed:\n{build_log}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..Default::default()
    });

    let mut init = ContextInit::from_env();
    init.force_fallback_adapter |= cli.fallback_adapter;
    if cli.device.is_some() {
        init.adapter_index = cli.device;
    }

    if cli.list_adapters {
        for (index, info) in Gpu::adapters_blocking(init.backends).iter().enumerate() {
            println!("[{index}] {} ({:?}, {:?})", info.name, info.device_type, info.backend);
        }
        return Ok(());
    }

    let sources = cli
        .kernels
        .iter()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    if cli.check {
        let warnings = check_sources(&sources, &cli.set)?;
        if !warnings.is_empty() {
            log::warn!("{warnings}");
        }
        println!("kernel ok");
        return Ok(());
    }

    let gpu = Gpu::new_blocking(init)?;

    let status: Arc<dyn StatusSink> = Arc::new(LogStatus);
    let kernel = CompiledKernel::create(Arc::new(gpu), sources, status)
        .context("kernel failed to build")?;

    if cli.list_options {
        for option in kernel.options() {
            let default = if option.default.is_empty() { "-" } else { option.default.as_str() };
            println!("{:<24} {:<16} (default {default})", option.key, option.value);
        }
        return Ok(());
    }

    let mut changed = false;
    if let Some(path) = &cli.options {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let snapshot = OptionSnapshot::from_json(&text)
            .with_context(|| format!("invalid option snapshot {}", path.display()))?;
        let report = kernel.restore(&snapshot);
        if report.had_warnings() {
            log::warn!(
                "{} of {} option(s) in {} do not belong to this kernel",
                report.unknown.len(),
                snapshot.len(),
                path.display()
            );
        }
        changed |= report.applied > 0;
    }
    for (key, value) in &cli.set {
        kernel.set_option(key, value)?;
        changed = true;
    }
    if changed {
        kernel.rebuild().context("kernel failed to rebuild with the requested options")?;
    }

    if let Some(path) = &cli.save_options {
        fs::write(path, kernel.serialize().to_json_pretty()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let parameters = match &cli.keyframes {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ParameterSource::animated(
                KeyframeParameters::from_json(&text, cli.frames)
                    .with_context(|| format!("invalid keyframes {}", path.display()))?,
            )
        }
        None => {
            let mut named = NamedParameters::new();
            for (name, value) in &cli.params {
                named.set(name, *value);
            }
            ParameterSource::fixed(named)
        }
    };

    let config = CaptureConfig {
        frame_count: cli.frames,
        ..Default::default()
    };
    let activity = Arc::new(CaptureActivity::new());
    let mut session = RenderSession::with_config(kernel, parameters, activity, config);
    let shot = session.capture(cli.height, cli.tiles)?;

    let image = image::RgbImage::from_raw(shot.width, shot.height, shot.to_rgb8())
        .context("screenshot buffer does not match its dimensions")?;
    image
        .save(&cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    log::info!(
        "wrote {}x{} screenshot to {} (rendered on {})",
        shot.width,
        shot.height,
        cli.output.display(),
        session.kernel().backend().adapter_info().name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(parse_option("ITERS=128"), Ok(("ITERS".into(), "128".into())));
        assert_eq!(parse_option("EMPTY="), Ok(("EMPTY".into(), String::new())));
        assert!(parse_option("ITERS").is_err());
        assert_eq!(parse_param("zoom=2.5"), Ok(("zoom".into(), 2.5)));
        assert!(parse_param("zoom=wide").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    const DEMO: &str = include_str!("../kernels/mandelbrot.wgsl");

    #[test]
    fn check_rejects_whitespace_in_override() {
        let sources = vec![DEMO.to_string()];
        let overrides = vec![("ITERS".to_string(), "1 2".to_string())];
        let err = check_sources(&sources, &overrides).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KernelError>(),
            Some(KernelError::InvalidOptionSyntax { key, value })
                if key == "ITERS" && value == "1 2"
        ));
    }

    #[test]
    fn check_accepts_demo_kernel() {
        let sources = vec![DEMO.to_string()];
        let overrides = vec![("ITERS".to_string(), "64u".to_string())];
        assert_eq!(check_sources(&sources, &overrides).unwrap(), "");
        assert!(check_sources(&sources, &[("NOPE".to_string(), "1".to_string())]).is_err());
    }

    #[test]
    fn list_adapters_needs_no_kernel() {
        let cli = Cli::try_parse_from(["clam-studio", "--list-adapters"]).unwrap();
        assert!(cli.list_adapters && cli.kernels.is_empty());
        assert!(Cli::try_parse_from(["clam-studio"]).is_err());

        let cli = Cli::try_parse_from(["clam-studio", "--device", "1", "k.wgsl"]).unwrap();
        assert_eq!(cli.device, Some(1));
    }

    #[test]
    fn keyframes_conflict_with_params() {
        let parsed = Cli::try_parse_from([
            "clam-studio",
            "--param",
            "zoom=1",
            "--keyframes",
            "k.json",
            "kernel.wgsl",
        ]);
        assert!(parsed.is_err());
    }
}
