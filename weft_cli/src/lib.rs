use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Weave documentation out of the comments of your source files.",
	long_about = "weft reads documentation written in source comments, collects the regions \
	              marked with `@start(name)` … `@(name)` into named blocks and composes them, \
	              following `@include(name)` references, into one document.\n\nQuick start:\n  \
	              weft weave src/main.rs      Print the composed document\n  weft check \
	              src/*.rs          Validate blocks and includes\n  weft blocks src/*.rs         \
	              List every block\n  weft languages              Show known comment syntaxes"
)]
pub struct WeftCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to a `weft.toml` file. Defaults to the first of `weft.toml`,
	/// `.weft.toml` and `.config/weft.toml` in the current directory.
	#[arg(long, short, global = true)]
	pub config: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

/// Options shared by every command that reads source files.
#[derive(Debug, Clone, clap::Args)]
pub struct SourceArgs {
	/// Source files forming one pass. Blocks defined in any of them can be
	/// included from all the others.
	#[arg(required = true)]
	pub files: Vec<PathBuf>,

	/// Comment syntax to use for every file instead of detecting it from the
	/// file name.
	#[arg(long, short)]
	pub language: Option<String>,

	/// Activate `@if(token)` regions. Can be repeated.
	#[arg(long = "token", short)]
	pub tokens: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Compose a block, with every include expanded, and print it.
	///
	/// Without `--block` the top-level documentation of the first file is
	/// composed. Code regions are rendered as fenced code blocks in markdown
	/// output.
	Weave {
		#[command(flatten)]
		sources: SourceArgs,

		/// Name of the block to compose.
		#[arg(long, short)]
		block: Option<String>,

		/// Output format for the composed document.
		#[arg(long, value_enum, default_value_t = WeaveFormat::Markdown)]
		format: WeaveFormat,

		/// Write the document to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Prefix prepended to every non-blank line.
		#[arg(long, default_value = "")]
		indent: String,
	},
	/// Check that every include resolves and that no include cycle exists.
	///
	/// Exits with a non-zero status code when problems are found. Blocks that
	/// are never included are reported as warnings.
	Check {
		#[command(flatten)]
		sources: SourceArgs,

		/// Output format for check results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the blocks defined in the given files.
	Blocks {
		#[command(flatten)]
		sources: SourceArgs,

		/// Output format for the block list.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the languages weft knows and the file patterns they match.
	Languages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeaveFormat {
	/// Documentation as is, code in fenced blocks tagged with the language.
	Markdown,
	/// Every line as is.
	Plain,
	/// The composed lines as a JSON array of `{ text, mode }` records.
	Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
