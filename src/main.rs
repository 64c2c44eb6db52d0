//! textbake's main application entry point.
//! Parses arguments, loads the recipe configuration and hands over to the runner.

use textbake::{
    cli::{get_args, Args},
    config::load_config,
    error::{default_error_handler, Error, Result},
    logger::init_logger,
    processor::absolutize,
    runner::run_processor,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Loads the configuration and runs the requested recipes and presets.
///
/// # Errors
/// * `Error::InputPathError` if the input path does not exist
/// * Configuration loading errors
fn run(args: Args) -> Result<()> {
    let input_path = absolutize(&args.input);
    if !input_path.exists() {
        return Err(Error::InputPathError { path: input_path });
    }
    let config = load_config(absolutize(&args.config))?;
    log::debug!("Loaded configuration '{}' version {}", config.name, config.version);

    let completed = run_processor(&input_path, &config, &args.recipes, &args.presets);
    log::info!("Completed {} recipe run(s).", completed.len());
    Ok(())
}
