mod cli;
mod commands;
mod config;
mod input;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;
use commands::edit::PatchOptions;
use commands::session::Session;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "pakpatch=info,pakpatch_cli=info",
        1 => "pakpatch=debug,pakpatch_cli=debug",
        _ => "pakpatch=trace,pakpatch_cli=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Configure {
            timeout,
            default_archive,
            index,
            show,
        } => {
            commands::configure::handle(commands::configure::ConfigureArgs {
                root: cli.root,
                archiver: cli.archiver,
                timeout,
                default_archive,
                index,
                show,
            })?;
        }

        Commands::Archives => {
            let session = Session::load(cli.root, cli.archiver)?;
            commands::archives::handle(&session)?;
        }

        Commands::Edit {
            archive,
            index,
            pairs,
            repack,
            sequential,
        } => {
            let session = Session::load(cli.root, cli.archiver)?;
            commands::edit::handle(
                &session,
                index.as_deref(),
                PatchOptions {
                    archive: archive.as_deref(),
                    target: None,
                    pairs: pairs.as_deref(),
                    repack,
                    sequential,
                },
            )?;
        }

        Commands::Hex {
            archive,
            target,
            pairs,
            repack,
            sequential,
        } => {
            let session = Session::load(cli.root, cli.archiver)?;
            commands::edit::hex(
                &session,
                PatchOptions {
                    archive: archive.as_deref(),
                    target: target.as_deref(),
                    pairs: pairs.as_deref(),
                    repack,
                    sequential,
                },
            )?;
        }

        Commands::Remote { command } => {
            let session = Session::load(cli.root, cli.archiver)?;
            match command {
                RemoteCommand::List { table, search } => {
                    commands::remote::list(&session, table, search.as_deref())?;
                }

                RemoteCommand::Apply {
                    archive,
                    target,
                    pairs,
                    repack,
                } => {
                    commands::remote::apply(&session, archive.as_deref(), &target, &pairs, repack)?;
                }
            }
        }

        Commands::Repack { archive } => {
            let session = Session::load(cli.root, cli.archiver)?;
            commands::repack::handle(&session, archive.as_deref())?;
        }
    }

    Ok(())
}
