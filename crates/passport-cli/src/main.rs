use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "passport", version, about = "Passport token CLI")]
struct Cli {
    /// Optional configuration file (passport.yaml) used when no key is given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign, verify and inspect tokens
    Token {
        #[command(subcommand)]
        cmd: TokenCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Sign a token for a user.
    Sign {
        /// Private key PEM file (or inline PEM)
        #[arg(long, env = "PASSPORT_PRIVATE_KEY")]
        key: Option<String>,

        /// User id to put in the subject claim
        #[arg(long = "user-id")]
        user_id: u64,

        /// Time to live, e.g. "15m", "24h", "7d". Defaults to the configured ttl.
        /// Negative values sign an already-expired token.
        #[arg(long, allow_hyphen_values = true)]
        ttl: Option<String>,

        /// Write the token to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Verify a token and print its claims.
    Verify {
        /// Public key PEM file (or inline PEM)
        #[arg(long, env = "PASSPORT_PUBLIC_KEY")]
        key: Option<String>,

        /// Token string or path to a file containing it
        token: String,
    },

    /// Decode a token without verifying its signature.
    Inspect {
        /// Token string or path to a file containing it
        token: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Token { cmd } => match cmd {
            TokenCommand::Sign {
                key,
                user_id,
                ttl,
                output,
            } => commands::token::sign(key, cli.config, user_id, ttl, output)?,
            TokenCommand::Verify { key, token } => {
                commands::token::verify(key, cli.config, token)?
            }
            TokenCommand::Inspect { token } => commands::token::inspect(token)?,
        },
    }

    Ok(())
}
