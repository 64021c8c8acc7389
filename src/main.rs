use clap::{Parser, Subcommand};
use eyeball_client::config::{self, CONFIG_FILE_NAME, ClientConfig};
use eyeball_client::ingest::ImageIngestionStore;
use eyeball_client::output;
use eyeball_client::params::ParameterStore;
use eyeball_client::pipeline::SubmissionPipeline;
use eyeball_client::transport::HttpTransport;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eyeball")]
#[command(about = "Submit images to a simulated-vision filter service")]
#[command(long_about = "\
Submit images to a simulated-vision filter service

Parameters describe the simulated eye: fovea position and radius, cone and
rod cell densities, peripheral blur (kernel and sigma), grayscale and retinal
warp. Every parameter is sent with every submission.

Examples:

  eyeball submit photo.jpg
  eyeball submit shots/ --set fovea_radius=40 --set kernel=\"(7, 7)\"
  eyeball params --set resolution=128 --set fovea_x=500

Out-of-range numbers are clamped, never rejected. Fovea coordinates and
radius are capped at the resolution in effect when they are set.

Logging goes to stderr and follows RUST_LOG (default: eyeball=info,eyeball_client=info).

Run 'eyeball gen-config' to generate a documented eyeball.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./eyeball.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Processing endpoint URL, overriding the config file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Parameter overrides shared by commands that build a parameter set.
#[derive(clap::Args, Clone, Default)]
struct ParamArgs {
    /// Set a parameter, e.g. --set fovea_x=120 (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    assignments: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Submit images (files or folders) and save the processed results
    Submit {
        /// Image files or folders of images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory processed images are written to
        #[arg(long, default_value = "processed")]
        output: PathBuf,

        #[command(flatten)]
        params: ParamArgs,
    },
    /// Print the parameters that would be sent
    Params(ParamArgs),
    /// Print a stock eyeball.toml with all options documented
    GenConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eyeball=info,eyeball_client=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_client_config(cli: &Cli) -> Result<ClientConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(Path::new("."))?,
    };
    if let Some(url) = &cli.endpoint {
        config.endpoint.url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

fn build_parameters(
    config: &ClientConfig,
    args: &ParamArgs,
) -> Result<ParameterStore, eyeball_client::params::ParamError> {
    let mut store = config.parameters.to_store();
    for assignment in &args.assignments {
        store.apply_assignment(assignment)?;
    }
    Ok(store)
}

fn ingest_inputs(
    store: &mut ImageIngestionStore,
    inputs: &[PathBuf],
) -> Result<(), eyeball_client::ingest::IngestError> {
    for input in inputs {
        if input.is_dir() {
            let added = store.add_from_folder(input)?;
            info!("Added {} images from {}", added.len(), input.display());
        } else {
            store.add_single(input)?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match &cli.command {
        Command::Submit {
            inputs,
            output: out_dir,
            params,
        } => {
            let config = load_client_config(&cli)?;
            let parameters = build_parameters(&config, params)?;
            let mut images = ImageIngestionStore::with_capacity_limit(config.ingest.max_images);
            ingest_inputs(&mut images, inputs)?;
            output::print_image_set("Sources", images.images());

            let transport = HttpTransport::new(&config.endpoint.url, config.endpoint.timeout())?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_submission_event(&event);
                }
            });
            let pipeline =
                SubmissionPipeline::new(transport, config.endpoint.timeout()).with_events(tx);

            let result = pipeline.submit(&parameters, &images).await;
            let processed = pipeline.processed();
            // Closes the event channel so the printer can finish.
            drop(pipeline);
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            result?;

            output::print_image_set("Processed", &processed);
            let saved = output::save_image_set(&processed, &parameters.snapshot(), out_dir)?;
            println!("==> Saved {} files to {}", saved.len(), out_dir.display());
        }
        Command::Params(params) => {
            let config = load_client_config(&cli)?;
            let parameters = build_parameters(&config, params)?;
            output::print_parameters(&parameters.snapshot());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            info!("Save this as {} to use it", CONFIG_FILE_NAME);
        }
    }

    Ok(())
}
