use std::fmt::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use weft_cli::Commands;
use weft_cli::OutputFormat;
use weft_cli::SourceArgs;
use weft_cli::WeaveFormat;
use weft_cli::WeftCli;
use weft_core::Block;
use weft_core::CheckReport;
use weft_core::LanguageRegistry;
use weft_core::LexOptions;
use weft_core::LineRecord;
use weft_core::Mode;
use weft_core::OutputLine;
use weft_core::Pass;
use weft_core::WeftConfig;
use weft_core::display_name;
use weft_core::normalize_line_endings;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = WeftCli::parse();

	// Respect NO_COLOR, --no-color and terminals without color support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Weave {
			sources,
			block,
			format,
			output,
			indent,
		}) => {
			run_weave(
				&args,
				sources,
				block.as_deref(),
				*format,
				output.as_deref(),
				indent,
			)
		}
		Some(Commands::Check { sources, format }) => run_check(&args, sources, *format),
		Some(Commands::Blocks { sources, format }) => run_blocks(&args, sources, *format),
		Some(Commands::Languages) => run_languages(&args),
		None => {
			eprintln!("No subcommand specified. Run `weft --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<weft_core::WeftError>() {
			Ok(weft_err) => {
				let report: miette::Report = (*weft_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.init();
}

fn load_config(args: &WeftCli) -> Result<WeftConfig, Box<dyn std::error::Error>> {
	if let Some(path) = &args.config {
		return Ok(WeftConfig::from_path(path)?);
	}

	let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	Ok(WeftConfig::load(&root)?.unwrap_or_default())
}

/// A pass over every source file, and the language of each file.
struct Loaded {
	pass: Pass,
	languages: Vec<String>,
}

fn load_sources(args: &WeftCli, sources: &SourceArgs) -> Result<Loaded, Box<dyn std::error::Error>> {
	let config = load_config(args)?;
	let registry = config.registry()?;
	let options = config
		.lex_options()
		.with_tokens(sources.tokens.iter().cloned());

	let mut pass = Pass::new();
	let mut languages = Vec::with_capacity(sources.files.len());

	for path in &sources.files {
		let language = registry.select(sources.language.as_deref(), path)?;
		let content = std::fs::read_to_string(path).map_err(|e| {
			format!("failed to read {}: {e}", path.display())
		})?;
		debug!(file = %path.display(), language = %language.name, "reading source");

		add_file(&mut pass, path, &content, &language.syntax, &options)?;
		languages.push(language.name.clone());
	}

	Ok(Loaded { pass, languages })
}

fn add_file(
	pass: &mut Pass,
	path: &Path,
	content: &str,
	syntax: &weft_core::CommentSyntax,
	options: &LexOptions,
) -> Result<(), Box<dyn std::error::Error>> {
	let content = normalize_line_endings(content);
	pass.add_source(path.display().to_string(), &content, syntax, options)?;
	Ok(())
}

fn run_weave(
	args: &WeftCli,
	sources: &SourceArgs,
	block: Option<&str>,
	format: WeaveFormat,
	output: Option<&Path>,
	indent: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	let Loaded { pass, languages } = load_sources(args, sources)?;
	let name = block.unwrap_or_default();
	let lines = pass.resolve_with_baseline(name, indent)?;

	let language = pass
		.block(name)
		.and_then(|block| {
			pass.files()
				.iter()
				.position(|file| *file == block.origin.file)
		})
		.and_then(|index| languages.get(index))
		.map_or("", String::as_str);

	let rendered = match format {
		WeaveFormat::Markdown => render_markdown(&lines, language),
		WeaveFormat::Plain => render_plain(&lines),
		WeaveFormat::Json => format!("{}\n", serde_json::to_string_pretty(&lines)?),
	};

	match output {
		Some(path) => {
			std::fs::write(path, rendered)?;
			println!(
				"{} wrote {} line(s) to {}",
				colored!("✓", green),
				lines.len(),
				path.display()
			);
		}
		None => print!("{rendered}"),
	}

	Ok(())
}

fn render_plain(lines: &[OutputLine]) -> String {
	lines.iter().fold(String::new(), |mut out, line| {
		let _ = writeln!(out, "{}", line.text);
		out
	})
}

/// Documentation lines as they are, each run of code lines in a fenced code
/// block. Blank lines at the edges of a run stay outside the fence.
fn render_markdown(lines: &[OutputLine], language: &str) -> String {
	let mut out = String::new();
	let mut index = 0;

	while index < lines.len() {
		if lines[index].mode == Mode::Documentation {
			let _ = writeln!(out, "{}", lines[index].text);
			index += 1;
			continue;
		}

		let end = lines[index..]
			.iter()
			.position(|line| line.mode != Mode::Code)
			.map_or(lines.len(), |offset| index + offset);
		let run = &lines[index..end];
		let first = run.iter().position(|line| !line.text.is_empty());
		let last = run.iter().rposition(|line| !line.text.is_empty());

		if let (Some(first), Some(last)) = (first, last) {
			out.push_str(&"\n".repeat(first));
			let _ = writeln!(out, "```{language}");
			for line in &run[first..=last] {
				let _ = writeln!(out, "{}", line.text);
			}
			let _ = writeln!(out, "```");
			out.push_str(&"\n".repeat(run.len() - 1 - last));
		} else {
			out.push_str(&"\n".repeat(run.len()));
		}

		index = end;
	}

	out
}

fn run_check(
	args: &WeftCli,
	sources: &SourceArgs,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let Loaded { pass, .. } = load_sources(args, sources)?;
	let report = pass.check();

	match format {
		OutputFormat::Json => {
			let errors: Vec<serde_json::Value> = report
				.errors
				.iter()
				.map(|error| {
					let code = miette::Diagnostic::code(error).map(|code| code.to_string());
					serde_json::json!({
						"code": code,
						"message": error.to_string(),
						"file": error.location().map(|location| location.file.clone()),
						"line": error.location().map(|location| location.line),
					})
				})
				.collect();
			let output = serde_json::json!({
				"ok": report.is_ok(),
				"errors": errors,
				"unincluded": report.unincluded,
			});
			println!("{output}");
		}
		OutputFormat::Text => print_check_report(&report, pass.blocks().count()),
	}

	if !report.is_ok() {
		process::exit(1);
	}

	Ok(())
}

fn print_check_report(report: &CheckReport, block_count: usize) {
	for block in &report.unincluded {
		eprintln!(
			"{} block `{}` defined at {} is never included",
			colored!("warning:", yellow),
			block.name,
			block.origin
		);
	}

	if report.is_ok() {
		println!(
			"{} {block_count} block(s) checked, every include resolves.",
			colored!("Check passed:", green)
		);
		return;
	}

	for error in &report.errors {
		eprintln!("{} {error}", colored!("error:", red));
		if let Some(help) = miette::Diagnostic::help(error) {
			eprintln!("  {} {help}", colored!("help:", bold));
		}
	}

	eprintln!(
		"\n{} {} problem(s) found.",
		colored!("Check failed:", red),
		report.errors.len()
	);
}

#[derive(serde::Serialize)]
struct BlockSummary<'a> {
	name: &'a str,
	kind: weft_core::BlockKind,
	file: &'a str,
	line: usize,
	lines: usize,
	includes: Vec<&'a str>,
}

impl<'a> BlockSummary<'a> {
	fn new(block: &'a Block) -> Self {
		Self {
			name: &block.name,
			kind: block.kind,
			file: &block.origin.file,
			line: block.origin.line,
			lines: block
				.lines
				.iter()
				.filter(|record| !matches!(record, LineRecord::Include { .. }))
				.count(),
			includes: block.includes().map(|include| include.name).collect(),
		}
	}
}

fn run_blocks(
	args: &WeftCli,
	sources: &SourceArgs,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let Loaded { pass, .. } = load_sources(args, sources)?;
	let summaries: Vec<_> = pass
		.roots()
		.chain(pass.blocks())
		.map(BlockSummary::new)
		.collect();

	match format {
		OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
		OutputFormat::Text => {
			for summary in &summaries {
				let mut line = format!(
					"{:<24} {}:{}  {} line(s)",
					colored!(display_name(summary.name), bold),
					summary.file,
					summary.line,
					summary.lines
				);
				if !summary.includes.is_empty() {
					let _ = write!(line, "  includes: {}", summary.includes.join(", "));
				}
				println!("{line}");
			}
		}
	}

	Ok(())
}

fn run_languages(args: &WeftCli) -> Result<(), Box<dyn std::error::Error>> {
	let config = load_config(args)?;
	let registry: LanguageRegistry = config.registry()?;

	for language in registry.languages() {
		println!(
			"{:<12} {}",
			colored!(language.name, bold),
			language.patterns.join(" ")
		);
	}

	Ok(())
}
