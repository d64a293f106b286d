//! webconf CLI - Main Entry Point
//!
//! Command-line front end for the appliance configuration console:
//! env-vars, wifi, hostname, flags, UI notifications and the media
//! libraries.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use webconf_cli::commands::{
    captures, config, env, flags, host, midi, presets, snapshots, soundfonts, ui, wifi, Context,
};
use webconf_cli::output::{print_error, OutputFormat};

/// webconf - zynthian appliance configuration console
#[derive(Parser)]
#[command(name = "webconf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// webconf configuration file
    #[arg(long, env = "WEBCONF_CONFIG", default_value_os_t = webconf_common::default_config_path(), global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and patch the env-vars store
    #[command(subcommand)]
    Env(env::EnvCommands),

    /// Manage wifi networks
    #[command(subcommand)]
    Wifi(wifi::WifiCommands),

    /// Show or change the hostname
    #[command(subcommand)]
    Hostname(host::HostnameCommands),

    /// Validate password changes
    #[command(subcommand)]
    Password(host::PasswordCommands),

    /// Reboot and system-update flags
    #[command(subcommand)]
    Flags(flags::FlagsCommands),

    /// Notify the UI process
    #[command(subcommand)]
    Ui(ui::UiCommands),

    /// Manage MIDI profile scripts
    #[command(subcommand)]
    Midi(midi::MidiCommands),

    /// Manage snapshots
    #[command(subcommand)]
    Snapshots(snapshots::SnapshotsCommands),

    /// Manage soundfonts
    #[command(subcommand)]
    Soundfonts(soundfonts::SoundfontsCommands),

    /// Browse audio and MIDI captures
    #[command(subcommand)]
    Captures(captures::CapturesCommands),

    /// Manage synth presets
    #[command(subcommand)]
    Presets(presets::PresetsCommands),

    /// Show or create the webconf configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::new(cli.config, cli.format)?;

    match cli.command {
        Commands::Env(cmd) => env::execute(cmd, &ctx).await,
        Commands::Wifi(cmd) => wifi::execute(cmd, &ctx).await,
        Commands::Hostname(cmd) => host::execute_hostname(cmd, &ctx).await,
        Commands::Password(cmd) => host::execute_password(cmd, &ctx).await,
        Commands::Flags(cmd) => flags::execute(cmd, &ctx).await,
        Commands::Ui(cmd) => ui::execute(cmd, &ctx).await,
        Commands::Midi(cmd) => midi::execute(cmd, &ctx).await,
        Commands::Snapshots(cmd) => snapshots::execute(cmd, &ctx).await,
        Commands::Soundfonts(cmd) => soundfonts::execute(cmd, &ctx).await,
        Commands::Captures(cmd) => captures::execute(cmd, &ctx).await,
        Commands::Presets(cmd) => presets::execute(cmd, &ctx).await,
        Commands::Config(cmd) => config::execute(cmd, &ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_subcommand() {
        let cli = Cli::try_parse_from([
            "webconf",
            "--format",
            "json",
            "--config",
            "/tmp/w.toml",
            "snapshots",
            "save",
            "000/001-A.zss",
            "--prog-num",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("/tmp/w.toml"));
        assert!(matches!(cli.command, Commands::Snapshots(snapshots::SnapshotsCommands::Save { .. })));
    }
}
