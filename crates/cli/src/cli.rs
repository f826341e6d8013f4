use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "branch")]
#[command(about = "Branch session engine - open deep links locally and inspect the resulting session")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Engine config file (camelCase JSON)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Open a URL through the session engine and print the legacy params
	Open {
		url: String,

		/// Platform hook that delivers the URL
		#[arg(long, value_enum, default_value = "launch")]
		via: OpenVia,

		/// Go through the legacy entry point (requires useModernSessionManager)
		#[arg(long)]
		legacy: bool,

		/// Enable network logging and print the recorded entries
		#[arg(long)]
		show_network: bool,
	},

	/// Open a registered link directly on the simulator
	Simulate { url: String },

	/// List links registered with the simulator
	Links,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OpenVia {
	/// Cold launch with the URL
	Launch,
	/// Universal link continuation
	Activity,
	/// Push notification payload
	Push,
}
