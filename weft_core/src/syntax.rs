//! Comment-syntax adapters.
//!
//! The engine never knows which host language it is reading. Everything it
//! needs about comments comes through [`CommentAdapter`], which is usually a
//! [`CommentSyntax`] value taken from [`builtin_languages`] or from a
//! `[languages]` table in `weft.toml`.

use serde::Deserialize;
use serde::Serialize;

use crate::directive::Directive;
use crate::directive::find_directive;

/// The marker sigil used when a language does not configure one.
pub const DEFAULT_SIGIL: char = '@';

/// An open/close pair for block comments, e.g. `/*` and `*/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDelimiter {
	pub open: String,
	pub close: String,
}

impl BlockDelimiter {
	pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
		Self {
			open: open.into(),
			close: close.into(),
		}
	}
}

/// What the lexer needs to know about a host language's comments.
///
/// Only the two delimiter accessors are required. The remaining methods have default
/// implementations built on them, so an adapter for an unusual language can
/// override just the part that differs.
pub trait CommentAdapter {
	/// Prefixes that start a comment running to the end of the line.
	fn line_prefixes(&self) -> &[String];

	/// Delimiter pairs for comments that may span several lines.
	fn block_delimiters(&self) -> &[BlockDelimiter];

	/// The character that introduces a directive marker.
	fn sigil(&self) -> char {
		DEFAULT_SIGIL
	}

	/// Languages without any comment syntax (markdown, reStructuredText,
	/// plain text) treat every line as documentation.
	fn is_plain_text(&self) -> bool {
		self.line_prefixes().is_empty() && self.block_delimiters().is_empty()
	}

	/// Remove the longest matching line-comment prefix from `trimmed`, which
	/// must already have its leading whitespace removed.
	fn strip_line_comment<'t>(&self, trimmed: &'t str) -> Option<&'t str> {
		self.line_prefixes()
			.iter()
			.filter(|prefix| !prefix.is_empty() && trimmed.starts_with(prefix.as_str()))
			.max_by_key(|prefix| prefix.len())
			.map(|prefix| &trimmed[prefix.len()..])
	}

	/// Find the block delimiter that opens at the very start of `trimmed`.
	/// Longer openers win so that `/**` is preferred over `/*`.
	fn block_opening(&self, trimmed: &str) -> Option<usize> {
		self.block_delimiters()
			.iter()
			.enumerate()
			.filter(|(_, delimiter)| {
				!delimiter.open.is_empty() && trimmed.starts_with(delimiter.open.as_str())
			})
			.max_by_key(|(_, delimiter)| delimiter.open.len())
			.map(|(index, _)| index)
	}

	/// Look for a directive marker inside the text of a comment.
	fn find_directive(&self, text: &str) -> Option<Directive> {
		find_directive(text, self.sigil())
	}
}

fn default_sigil() -> char {
	DEFAULT_SIGIL
}

/// Comment syntax of one host language as plain data.
///
/// ```toml
/// [languages.lua]
/// patterns = ["*.lua"]
/// line = ["--"]
/// block = [{ open = "--[[", close = "]]" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSyntax {
	/// Line comment prefixes, e.g. `["///", "//"]`.
	#[serde(default)]
	pub line: Vec<String>,
	/// Block comment delimiter pairs.
	#[serde(default)]
	pub block: Vec<BlockDelimiter>,
	#[serde(default = "default_sigil")]
	pub sigil: char,
}

impl Default for CommentSyntax {
	fn default() -> Self {
		Self::plain()
	}
}

impl CommentSyntax {
	pub fn new(
		line: impl IntoIterator<Item = impl Into<String>>,
		block: impl IntoIterator<Item = BlockDelimiter>,
	) -> Self {
		Self {
			line: line.into_iter().map(Into::into).collect(),
			block: block.into_iter().collect(),
			sigil: DEFAULT_SIGIL,
		}
	}

	/// A syntax without comments; every line is documentation.
	pub fn plain() -> Self {
		Self::new(Vec::<String>::new(), Vec::new())
	}

	/// `//` and `/* */`, shared by the C family.
	pub fn c_like() -> Self {
		Self::new(["//"], [BlockDelimiter::new("/*", "*/")])
	}

	pub fn rust() -> Self {
		Self::new(["///", "//!", "//"], [BlockDelimiter::new("/*", "*/")])
	}

	pub fn python() -> Self {
		Self::new(
			["#"],
			[
				BlockDelimiter::new("\"\"\"", "\"\"\""),
				BlockDelimiter::new("'''", "'''"),
			],
		)
	}

	pub fn hash() -> Self {
		Self::new(["#"], Vec::new())
	}

	pub fn xml() -> Self {
		Self::new(Vec::<String>::new(), [BlockDelimiter::new("<!--", "-->")])
	}

	pub fn lisp() -> Self {
		Self::new([";;", ";"], Vec::new())
	}

	pub fn double_dash() -> Self {
		Self::new(["--"], Vec::new())
	}

	#[must_use]
	pub fn with_sigil(mut self, sigil: char) -> Self {
		self.sigil = sigil;
		self
	}
}

impl CommentAdapter for CommentSyntax {
	fn line_prefixes(&self) -> &[String] {
		&self.line
	}

	fn block_delimiters(&self) -> &[BlockDelimiter] {
		&self.block
	}

	fn sigil(&self) -> char {
		self.sigil
	}
}

/// A named comment syntax plus the file patterns it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
	pub name: String,
	pub patterns: Vec<String>,
	pub syntax: CommentSyntax,
}

impl Language {
	pub fn new(
		name: impl Into<String>,
		patterns: impl IntoIterator<Item = impl Into<String>>,
		syntax: CommentSyntax,
	) -> Self {
		Self {
			name: name.into(),
			patterns: patterns.into_iter().map(Into::into).collect(),
			syntax,
		}
	}
}

/// The languages weft knows without any configuration.
pub fn builtin_languages() -> Vec<Language> {
	vec![
		Language::new("c", ["*.c", "*.h"], CommentSyntax::c_like()),
		Language::new(
			"cpp",
			["*.cpp", "*.cc", "*.cxx", "*.hpp", "*.hh", "*.hxx"],
			CommentSyntax::c_like(),
		),
		Language::new("csharp", ["*.cs"], CommentSyntax::new(["///", "//"], [
			BlockDelimiter::new("/*", "*/"),
		])),
		Language::new("java", ["*.java"], CommentSyntax::c_like()),
		Language::new(
			"javascript",
			["*.js", "*.mjs", "*.cjs", "*.jsx"],
			CommentSyntax::c_like(),
		),
		Language::new(
			"typescript",
			["*.ts", "*.mts", "*.cts", "*.tsx"],
			CommentSyntax::c_like(),
		),
		Language::new("go", ["*.go"], CommentSyntax::c_like()),
		Language::new("rust", ["*.rs"], CommentSyntax::rust()),
		Language::new("python", ["*.py", "*.pyw"], CommentSyntax::python()),
		Language::new("shell", ["*.sh", "*.bash", "*.zsh"], CommentSyntax::hash()),
		Language::new("toml", ["*.toml"], CommentSyntax::hash()),
		Language::new("yaml", ["*.yaml", "*.yml"], CommentSyntax::hash()),
		Language::new("ruby", ["*.rb"], CommentSyntax::hash()),
		Language::new("xml", ["*.xml", "*.xsd", "*.xsl"], CommentSyntax::xml()),
		Language::new("html", ["*.html", "*.htm"], CommentSyntax::xml()),
		Language::new("clojure", ["*.clj", "*.cljs", "*.cljc"], CommentSyntax::lisp()),
		Language::new("lisp", ["*.lisp", "*.el", "*.scm"], CommentSyntax::lisp()),
		Language::new("sql", ["*.sql"], CommentSyntax::double_dash()),
		Language::new("lua", ["*.lua"], CommentSyntax::double_dash()),
		Language::new("haskell", ["*.hs"], CommentSyntax::new(["--"], [
			BlockDelimiter::new("{-", "-}"),
		])),
		Language::new("rst", ["*.rst"], CommentSyntax::plain()),
		Language::new("markdown", ["*.md", "*.markdown"], CommentSyntax::plain()),
		Language::new("text", ["*.txt"], CommentSyntax::plain()),
	]
}
