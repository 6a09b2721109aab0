use std::fmt::Display;

use derive_more::Deref;
use derive_more::DerefMut;
use miette::Diagnostic;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// A 1-indexed line inside a named source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
	/// The label of the file as it was handed to the pass.
	pub file: String,
	/// 1-indexed line number.
	pub line: usize,
}

impl Location {
	pub fn new(file: impl Into<String>, line: usize) -> Self {
		Self {
			file: file.into(),
			line,
		}
	}
}

impl Display for Location {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.file, self.line)
	}
}

/// The chain of block names leading to a failure, outermost first.
///
/// The anonymous block is displayed as `<anonymous>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut, Serialize, Deserialize)]
pub struct BlockPath(
	#[deref]
	#[deref_mut]
	Vec<String>,
);

impl BlockPath {
	pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self(names.into_iter().map(Into::into).collect())
	}

	pub fn into_inner(self) -> Vec<String> {
		self.0
	}
}

impl Display for BlockPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.0.is_empty() {
			return write!(f, "<none>");
		}

		for (index, name) in self.0.iter().enumerate() {
			if index > 0 {
				write!(f, " → ")?;
			}
			write!(f, "{}", display_name(name))?;
		}

		Ok(())
	}
}

#[allow(clippy::ref_option)]
fn from_file(file: &Option<String>) -> String {
	file.as_ref()
		.map(|file| format!(" from `{file}`"))
		.unwrap_or_default()
}

/// Render a block name for humans, naming the anonymous block explicitly.
pub fn display_name(name: &str) -> &str {
	if name.is_empty() { "<anonymous>" } else { name }
}

/// The specific way a file violates the block structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StructuralIssue {
	#[error("`code` marker inside a region that is already code")]
	NestedCode,
	#[error("`edoc` marker without a preceding `code` marker")]
	EdocWithoutCode,
	#[error("block `{}` ends inside a code region", display_name(.0))]
	UnterminatedCode(String),
	#[error("block `{}` is opened while it is already open", display_name(.0))]
	AlreadyOpen(String),
	#[error("`start()` may only re-open the anonymous block at the top level")]
	MisplacedAnonymousStart,
	#[error("end marker `({found})` does not match the innermost open block `{}`", display_name(.expected))]
	MismatchedEnd { expected: String, found: String },
	#[error("end marker `({0})` closes no open block")]
	UnmatchedEnd(String),
	#[error("block `{}` is never closed", display_name(.0))]
	UnterminatedBlock(String),
	#[error(
		"line is indented {found} column(s) but block `{}` requires at least {required}",
		display_name(.block)
	)]
	InsufficientIndent {
		block: String,
		required: usize,
		found: usize,
	},
	#[error("`include()` needs a block name")]
	EmptyInclude,
	#[error("`fi({0})` has no matching `if({0})`")]
	UnmatchedFi(String),
	#[error("`if({0})` is never closed by `fi({0})`")]
	UnterminatedIf(String),
	#[error("`define()` needs a macro name")]
	EmptyDefine,
	#[error("macro `{0}` is never closed by `enifed({0})`")]
	UnterminatedDefine(String),
	#[error("`enifed({0})` has no matching `define({0})`")]
	EnifedWithoutDefine(String),
	#[error("`{0}` marker inside a macro body")]
	MarkerInsideDefine(String),
}

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum WeftError {
	#[error(transparent)]
	#[diagnostic(code(weft::io_error))]
	Io(#[from] std::io::Error),

	#[error("{location}: {issue}")]
	#[diagnostic(
		code(weft::structural),
		help("open blocks at this point: {path}")
	)]
	Structural {
		issue: StructuralIssue,
		location: Location,
		path: BlockPath,
	},

	#[error("duplicate block `{}`: defined at {first} and {second}", display_name(.name))]
	#[diagnostic(
		code(weft::duplicate_block),
		help("block names must be unique across every file of one pass")
	)]
	DuplicateBlock {
		name: String,
		first: Location,
		second: Location,
	},

	#[error(
		"{location}: block `{}` includes `{name}`{} which is not defined in this pass",
		display_name(.including),
		from_file(.file)
	)]
	#[diagnostic(
		code(weft::unresolved_include),
		help("define the block with `start({name})` in one of the files of the pass (include path: {path})")
	)]
	UnresolvedInclude {
		name: String,
		/// The file named by a two-argument `include(name, file)`.
		file: Option<String>,
		including: String,
		location: Location,
		path: BlockPath,
	},

	#[error("{location}: cyclic include {cycle}")]
	#[diagnostic(
		code(weft::cyclic_include),
		help("a block may not include itself, directly or through other blocks")
	)]
	CyclicInclude { cycle: BlockPath, location: Location },

	#[error("no block named `{}` in this pass", display_name(.0))]
	#[diagnostic(code(weft::unknown_block))]
	UnknownBlock(String),

	#[error("duplicate macro `{name}`: defined at {first} and {second}")]
	#[diagnostic(
		code(weft::duplicate_macro),
		help("macro names must be unique across every file of one pass")
	)]
	DuplicateMacro {
		name: String,
		first: Location,
		second: Location,
	},

	#[error("{location}: no macro named `{name}`")]
	#[diagnostic(
		code(weft::unknown_macro),
		help("define it with `define({name})` … `enifed({name})` or `define({name}, value)`")
	)]
	UnknownMacro { name: String, location: Location },

	#[error("no comment syntax is known for `{0}`")]
	#[diagnostic(
		code(weft::unknown_language),
		help("pass `--language` or add a `[languages.<name>]` table to weft.toml")
	)]
	UnknownLanguage(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(weft::config_parse),
		help("check that weft.toml is valid TOML with an optional [languages] table")
	)]
	ConfigParse(String),

	#[error("invalid file pattern `{pattern}`: {reason}")]
	#[diagnostic(code(weft::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },
}

impl WeftError {
	pub(crate) fn structural(issue: StructuralIssue, location: Location, path: BlockPath) -> Self {
		Self::Structural {
			issue,
			location,
			path,
		}
	}

	/// The source location the error points at, when it has one.
	pub fn location(&self) -> Option<&Location> {
		match self {
			Self::Structural { location, .. }
			| Self::UnresolvedInclude { location, .. }
			| Self::CyclicInclude { location, .. }
			| Self::UnknownMacro { location, .. } => Some(location),
			Self::DuplicateBlock { second, .. } | Self::DuplicateMacro { second, .. } => Some(second),
			_ => None,
		}
	}
}

pub type WeftResult<T> = Result<T, WeftError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
