use crate::backends::BackendKind;
use crate::commands;
use crate::config::Config;
use crate::log_debug;
use crate::ui;
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand, crate_version};
use std::path::PathBuf;
use std::str::FromStr;

const LOG_FILE: &str = "appforge-debug.log";

/// CLI structure defining the available commands and global arguments
#[derive(Parser)]
#[command(
    author,
    version = crate_version!(),
    about = "Appforge: describe an app, get working code, see it published",
    long_about = "Appforge turns a natural-language app description into a verified React app and publishes it to a GitHub repository.",
    disable_version_flag = true,
    styles = get_styles(),
)]
pub struct Cli {
    /// Subcommands available for the CLI
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log debug messages to a file
    #[arg(
        short = 'l',
        long = "log",
        global = true,
        help = "Log debug messages to a file"
    )]
    pub log: bool,

    /// Specify a custom log file path
    #[arg(
        long = "log-file",
        global = true,
        help = "Specify a custom log file path"
    )]
    pub log_file: Option<String>,

    /// Suppress non-essential output (spinners, status lines, etc.)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress non-essential output"
    )]
    pub quiet: bool,

    /// Display the version
    #[arg(
        short = 'v',
        long = "version",
        global = true,
        help = "Display the version"
    )]
    pub version: bool,
}

/// Enumeration of available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate app source from a description
    #[command(
        about = "Generate app source from a description",
        long_about = "Generate a single-file React app from a natural-language description, repair it, and print or save the result."
    )]
    Generate {
        /// What the app should do
        prompt: String,

        /// Backend to try first
        #[arg(short, long, help = "Backend to try first", value_parser = backend_parser)]
        backend: Option<String>,

        /// Write the generated source to a file instead of stdout
        #[arg(short, long, help = "Write the generated source to a file")]
        output: Option<PathBuf>,

        /// Extra context to fold into the prompt (e.g. clarification answers)
        #[arg(long, help = "Extra context to fold into the prompt")]
        enrich: Option<String>,
    },

    /// Ask clarifying questions about an app idea
    #[command(
        about = "Ask clarifying questions about an app idea",
        long_about = "Produce a short list of clarifying questions with suggested answers. Always succeeds; falls back to a default list when no backend cooperates."
    )]
    Clarify {
        /// The app idea to refine
        prompt: String,
    },

    /// Generate an app and publish it to GitHub
    #[command(
        about = "Generate an app and publish it to GitHub",
        long_about = "Run the full pipeline: generate, repair, then publish the result to a GitHub repository as one commit. Reuses the repository when it already exists."
    )]
    Publish {
        /// What the app should do (omit when using --file)
        prompt: Option<String>,

        /// Publish an existing source file instead of generating
        #[arg(long, help = "Publish an existing source file instead of generating")]
        file: Option<PathBuf>,

        /// Repository name to publish into
        #[arg(short, long, help = "Repository name to publish into")]
        name: String,

        /// Commit message for the publish commit
        #[arg(short, long, help = "Commit message for the publish commit")]
        message: Option<String>,

        /// Backend to try first
        #[arg(short, long, help = "Backend to try first", value_parser = backend_parser)]
        backend: Option<String>,

        /// Create the repository as private
        #[arg(long, help = "Create the repository as private")]
        private: bool,
    },

    /// Display or update configuration
    #[command(about = "Display or update configuration")]
    Config {
        /// Backend the key/models flags apply to
        #[arg(long, help = "Backend the key/models flags apply to", value_parser = backend_parser)]
        backend: Option<String>,

        /// Set the API key for the selected backend
        #[arg(long, help = "Set the API key for the selected backend")]
        api_key: Option<String>,

        /// Set the model fallback list for the selected backend
        #[arg(
            long,
            help = "Set the model fallback list (comma-separated)",
            value_delimiter = ','
        )]
        models: Option<Vec<String>>,

        /// Set the default backend
        #[arg(long, help = "Set the default backend", value_parser = backend_parser)]
        default_backend: Option<String>,

        /// Set the GitHub token used for publishing
        #[arg(long, help = "Set the GitHub token used for publishing")]
        github_token: Option<String>,

        /// Set the branch publishes commit to
        #[arg(long, help = "Set the branch publishes commit to")]
        branch: Option<String>,
    },

    /// List configured backends and their model fallback lists
    #[command(about = "List configured backends and their model fallback lists")]
    ListBackends,
}

/// Validate that a backend argument names a supported backend
fn backend_parser(s: &str) -> Result<String, String> {
    BackendKind::from_str(s)
        .map(|kind| kind.name().to_string())
        .map_err(|_| {
            format!(
                "unknown backend '{s}'. Supported: {}",
                BackendKind::ALL
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
}

/// Define custom styles for Clap
fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Magenta.on_default().bold())
        .usage(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Yellow.on_default())
}

/// Parse the command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Entry point for handling CLI commands
pub async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    if cli.version {
        ui::print_version(crate_version!());
        return Ok(());
    }

    if cli.log {
        crate::logger::enable_logging();
        let log_file = cli.log_file.as_deref().unwrap_or(LOG_FILE);
        crate::logger::set_log_file(log_file)?;
    } else {
        crate::logger::disable_logging();
    }

    if cli.quiet {
        ui::set_quiet_mode(true);
    }

    if let Some(command) = cli.command {
        handle_command(command).await
    } else {
        // No subcommand: print help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        Ok(())
    }
}

/// Handle the command passed to the CLI
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = Config::load()?;

    match command {
        Commands::Generate {
            prompt,
            backend,
            output,
            enrich,
        } => {
            log_debug!("Handling 'generate' command");
            commands::handle_generate(&config, &prompt, backend.as_deref(), output, enrich).await
        }
        Commands::Clarify { prompt } => {
            log_debug!("Handling 'clarify' command");
            commands::handle_clarify(&config, &prompt).await
        }
        Commands::Publish {
            prompt,
            file,
            name,
            message,
            backend,
            private,
        } => {
            log_debug!("Handling 'publish' command");
            commands::handle_publish(
                &config,
                prompt.as_deref(),
                file,
                &name,
                message.as_deref(),
                backend.as_deref(),
                private,
            )
            .await
        }
        Commands::Config {
            backend,
            api_key,
            models,
            default_backend,
            github_token,
            branch,
        } => {
            log_debug!("Handling 'config' command");
            commands::handle_config(
                config,
                backend.as_deref(),
                api_key,
                models,
                default_backend.as_deref(),
                github_token,
                branch,
            )
        }
        Commands::ListBackends => {
            log_debug!("Handling 'list-backends' command");
            commands::handle_list_backends(&config);
            Ok(())
        }
    }
}
