//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, VisualizeOptions};
use crate::logging;
use crate::visualizer::VisualizationMode;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// A terminal audio visualizer drawing a scrolling spectral mesh or waveform
#[derive(Parser)]
#[command(name = "spectromesh")]
#[command(version)]
#[command(about = "A terminal audio visualizer drawing a scrolling spectral mesh or waveform")]
#[command(long_about = "A terminal audio visualizer drawing a scrolling spectral mesh or waveform.\n\nDEFAULT COMMAND:\n    If no command is specified, 'visualize' is used by default.\n\nKEYS:\n    space   pause/resume the audio source\n    s       start/stop the visualization\n    m       next mode\n    1-5     grid, line, circle, triangle, waveform\n    q/Esc   quit\n\nEXAMPLES:\n    # Visualize the default input device\n    $ spectromesh\n\n    # Play a WAV file and watch its spectrum on a circle\n    $ spectromesh visualize --file song.wav --mode circle\n\n    # Toggle the visualization from another process\n    $ pkill -USR1 spectromesh")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/spectromesh/spectromesh.toml\n    Logs:               ~/.local/state/spectromesh/spectromesh.log.*"
)]
struct Cli {
    #[command(flatten)]
    visualize: VisualizeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct VisualizeArgs {
    /// Play a WAV file instead of capturing live input
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Visualization mode: grid, line, circle, triangle or waveform
    #[arg(short, long, value_name = "MODE")]
    mode: Option<VisualizationMode>,

    /// Input device (name, index or "default"), overriding the config file
    #[arg(short, long, value_name = "DEVICE")]
    device: Option<String>,

    /// Loop file playback
    #[arg(short = 'l', long = "loop")]
    looping: bool,
}

impl From<VisualizeArgs> for VisualizeOptions {
    fn from(args: VisualizeArgs) -> Self {
        Self {
            file: args.file,
            mode: args.mode,
            device: args.device,
            looping: args.looping,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Visualize live input or a WAV file (default)
    ///
    /// Space pauses the source, 's' starts/stops the visualization,
    /// 'm' cycles modes and Escape/q quits.
    #[command(visible_alias = "v")]
    Visualize(VisualizeArgs),

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in spectromesh.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   spectromesh completions bash > spectromesh.bash
    ///   spectromesh completions zsh > _spectromesh
    ///   spectromesh completions fish > spectromesh.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "spectromesh", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None => commands::handle_visualize(cli.visualize.into()).await?,
        Some(Commands::Visualize(args)) => commands::handle_visualize(args.into()).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::visualizations::MeshTopology;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_accepts_visualize_flags() {
        let cli = Cli::try_parse_from(["spectromesh", "--mode", "circle", "--loop", "-f", "a.wav"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(
            cli.visualize.mode,
            Some(VisualizationMode::Spectral(MeshTopology::Circle))
        );
        assert!(cli.visualize.looping);
        assert_eq!(cli.visualize.file, Some(PathBuf::from("a.wav")));
    }

    #[test]
    fn test_visualize_subcommand() {
        let cli = Cli::try_parse_from(["spectromesh", "visualize", "-d", "2", "-m", "waveform"])
            .unwrap();
        match cli.command {
            Some(Commands::Visualize(args)) => {
                assert_eq!(args.device.as_deref(), Some("2"));
                assert_eq!(args.mode, Some(VisualizationMode::Waveform));
            }
            _ => panic!("expected visualize"),
        }
    }

    #[test]
    fn test_unknown_mode_is_a_usage_error() {
        assert!(Cli::try_parse_from(["spectromesh", "--mode", "square"]).is_err());
    }
}
