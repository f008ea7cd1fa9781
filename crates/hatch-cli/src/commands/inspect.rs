//! `hatch inspect`: show an image's layers.

use anyhow::Context;
use clap::Args;
use hatch_common::config::RuntimeConfig;
use hatch_common::types::ImageName;
use hatch_image::registry::{RegistryClient, RegistrySession};

use crate::output::format_bytes;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image to inspect, e.g. `alpine` or `ubuntu:22.04`.
    pub image: ImageName,
}

/// Executes the `inspect` command.
///
/// # Errors
///
/// Returns an error if the token or manifest cannot be fetched.
#[allow(clippy::print_stdout)]
pub fn execute(args: &InspectArgs, config: &RuntimeConfig) -> anyhow::Result<()> {
    let client = RegistryClient::new(&config.registry)?;
    let session = RegistrySession::open(&client, &args.image)
        .with_context(|| format!("failed to authenticate for {}", args.image))?;
    let manifest = session
        .manifest()
        .with_context(|| format!("failed to fetch manifest for {}", args.image))?;

    println!(
        "{}:{}",
        args.image.repository(),
        args.image.reference(&config.registry.reference)
    );
    println!("DIGEST\tMEDIA TYPE\tSIZE");
    for layer in &manifest.layers {
        println!(
            "{}\t{}\t{}",
            layer.digest,
            layer.media_type,
            format_bytes(layer.size)
        );
    }
    println!(
        "{} layers, {} total",
        manifest.layers.len(),
        format_bytes(manifest.total_layer_size())
    );
    Ok(())
}
