use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use resdec_arsc::DecodeOptions;

use crate::commands::decode::command_decode;
use crate::commands::publicize::command_publicize;
use crate::commands::show::command_show;

mod commands;

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Args)]
struct SessionArgs {
    /// Accept malformed chunks instead of failing
    #[arg(long)]
    keep_broken: bool,

    /// Keep every package in the main set (no selection)
    #[arg(long)]
    analysis_mode: bool,

    /// Permit non-standard (shared library) package ids
    #[arg(long)]
    shared_library: bool,

    /// Input uses sparse type encoding
    #[arg(long)]
    sparse_resources: bool,

    /// Replace duplicate resources instead of failing
    #[arg(long)]
    overwrite: bool,
}

impl SessionArgs {
    fn options(&self) -> DecodeOptions {
        DecodeOptions {
            keep_broken: self.keep_broken,
            analysis_mode: self.analysis_mode,
            shared_library: self.shared_library,
            sparse_resources: self.sparse_resources,
            overwrite: self.overwrite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decompile a resources.arsc into values XML documents
    Decode {
        #[arg(required = true)]
        path: PathBuf,

        /// Output directory for the res/ tree
        #[arg(short, long, default_value = "out")]
        output: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Flip the public flag on every resource spec
    Publicize {
        #[arg(required = true)]
        path: PathBuf,

        /// Write the patched table here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Print a package/type summary of a resources.arsc
    Show {
        #[arg(required = true)]
        path: PathBuf,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        session: SessionArgs,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.commands {
        Some(Commands::Decode {
            path,
            output,
            session,
        }) => command_decode(path, output, session.options()),
        Some(Commands::Publicize {
            path,
            output,
            session,
        }) => command_publicize(path, output.as_deref(), session.options()),
        Some(Commands::Show { path, json, session }) => {
            command_show(path, *json, session.options())
        }
        None => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
