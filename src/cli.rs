//! Command-line interface implementation for textbake.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

/// Command-line arguments structure for textbake.
#[derive(Parser, Debug)]
#[command(author, version, about = "textbake: render text files through configurable recipes", long_about = None)]
#[command(group(
    ArgGroup::new("selection")
        .required(true)
        .multiple(true)
        .args(["recipes", "presets"])
))]
pub struct Args {
    /// Path to the recipe configuration file (YAML or JSON)
    #[arg(short, long, value_name = "CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Input file, or directory whose files are matched by each recipe's pattern
    #[arg(short, long, value_name = "INPUT")]
    pub input: PathBuf,

    /// Recipe ids to run
    #[arg(short, long, value_name = "RECIPE", num_args = 1..)]
    pub recipes: Vec<String>,

    /// Preset ids or names to run; their recipes run before explicit ones
    #[arg(short, long, value_name = "PRESET", num_args = 1..)]
    pub presets: Vec<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 and the help text if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                eprintln!("{}", e.render());
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
