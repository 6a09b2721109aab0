use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::iter::Enumerate;
use std::str::Lines;

use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::BlockPath;
use crate::CommentAdapter;
use crate::Directive;
use crate::Location;
use crate::StructuralIssue;
use crate::WeftError;
use crate::WeftResult;

/// Default number of columns a tab in leading whitespace expands to.
pub const DEFAULT_TAB_WIDTH: usize = 8;

/// Whether a line is rendered as prose or as verbatim code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	#[default]
	Documentation,
	Code,
}

impl std::fmt::Display for Mode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Documentation => write!(f, "documentation"),
			Self::Code => write!(f, "code"),
		}
	}
}

/// Knobs that change how raw lines are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexOptions {
	/// Columns per tab when normalizing leading whitespace.
	pub tab_width: usize,
	/// Tokens that make `if(token)` regions visible.
	pub tokens: BTreeSet<String>,
}

impl Default for LexOptions {
	fn default() -> Self {
		Self {
			tab_width: DEFAULT_TAB_WIDTH,
			tokens: BTreeSet::new(),
		}
	}
}

impl LexOptions {
	#[must_use]
	pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.tokens.extend(tokens.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn with_tab_width(mut self, tab_width: usize) -> Self {
		self.tab_width = tab_width;
		self
	}
}

/// One classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	/// 1-indexed source line.
	pub line: usize,
	pub kind: TokenKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
	/// A line carrying a directive. `indent` is the column the comment text
	/// starts at. End markers always carry the name of the block they close.
	Marker { directive: Directive, indent: usize },
	/// A content line. Leading whitespace is normalized to spaces and comment
	/// delimiters are already removed from documentation lines.
	Content { text: String, mode: Mode },
	/// An empty line, or a comment line without text.
	Blank { mode: Mode },
	/// Host source outside any code region, a lone comment delimiter, a line
	/// outside every block, or a line inside a hidden `if` region.
	Ignored,
}

/// What the lexer decided about one line.
enum Classified {
	Emit(TokenKind),
	/// A lone opening delimiter in code mode. It is code unless the comment it
	/// opens starts with `edoc`, which only the next line reveals.
	Hold(TokenKind),
}

/// How a line looks once comment syntax is taken into account.
enum Shape {
	Blank,
	Comment { indent: usize, text: String },
	Delimiter,
	Source,
}

struct Frame {
	name: String,
	mode: Mode,
	/// Opened with `cstart`, so it may close while in code mode.
	code_block: bool,
	shift: isize,
}

impl Frame {
	fn new(name: String, mode: Mode, code_block: bool) -> Self {
		Self {
			name,
			mode,
			code_block,
			shift: 0,
		}
	}
}

/// Lazily classifies the lines of one file.
///
/// The lexer tracks block comments across lines, the stack of open blocks
/// with their modes, and conditional regions. It yields one token per input
/// line, in line order, and stops after the first error.
///
/// Lone comment delimiters that only wrap a `code` or `edoc` marker are not
/// treated as code.
pub struct Lexer<'a, A: CommentAdapter + ?Sized> {
	file: &'a str,
	adapter: &'a A,
	options: &'a LexOptions,
	lines: Enumerate<Lines<'a>>,
	last_line: usize,
	open_comment: Option<usize>,
	frames: Vec<Frame>,
	conditions: Vec<String>,
	hidden: Option<String>,
	/// `code` was found inside a block comment that is still open.
	swallow_close: bool,
	held: Option<Token>,
	queue: VecDeque<WeftResult<Token>>,
	done: bool,
}

impl<'a, A: CommentAdapter + ?Sized> Lexer<'a, A> {
	pub fn new(file: &'a str, text: &'a str, adapter: &'a A, options: &'a LexOptions) -> Self {
		Self {
			file,
			adapter,
			options,
			lines: text.lines().enumerate(),
			last_line: 0,
			open_comment: None,
			frames: vec![Frame::new(String::new(), Mode::Documentation, false)],
			conditions: Vec::new(),
			hidden: None,
			swallow_close: false,
			held: None,
			queue: VecDeque::new(),
			done: false,
		}
	}

	fn error(&self, issue: StructuralIssue, line: usize) -> WeftError {
		WeftError::structural(
			issue,
			Location::new(self.file, line),
			BlockPath::new(self.frames.iter().map(|frame| frame.name.clone())),
		)
	}

	fn classify(&mut self, raw: &str, line: usize) -> WeftResult<Classified> {
		let normalized = normalize_indent(raw, self.options.tab_width);
		let was_open = self.open_comment.is_some();
		let shape = self.shape(&normalized);
		let closed_here = was_open && self.open_comment.is_none();
		let opened_here = !was_open && self.open_comment.is_some();
		let swallow = closed_here && std::mem::take(&mut self.swallow_close);

		if let Some(token) = &self.hidden {
			if let Shape::Comment { text, .. } = &shape {
				if self.adapter.find_directive(text) == Some(Directive::Fi(token.clone())) {
					trace!(file = self.file, line, token = %token, "hidden region ends");
					self.hidden = None;
				}
			}
			return Ok(Classified::Emit(TokenKind::Ignored));
		}

		if let Shape::Comment { indent, text } = &shape {
			if let Some(directive) = self.adapter.find_directive(text) {
				let indent = self.shifted(*indent);
				return self.apply(directive, indent, line).map(Classified::Emit);
			}
		}

		let Some(frame) = self.frames.last() else {
			return Ok(Classified::Emit(TokenKind::Ignored));
		};

		if frame.mode == Mode::Code && matches!(shape, Shape::Delimiter) {
			if swallow {
				return Ok(Classified::Emit(TokenKind::Ignored));
			}
			if opened_here {
				return Ok(Classified::Hold(TokenKind::Content {
					text: self.code_line(&normalized),
					mode: Mode::Code,
				}));
			}
		}

		let kind = match (frame.mode, shape) {
			(mode, Shape::Blank) => TokenKind::Blank { mode },
			(Mode::Documentation, Shape::Comment { indent, text }) => {
				TokenKind::Content {
					text: format!("{}{text}", " ".repeat(self.shifted(indent))),
					mode: Mode::Documentation,
				}
			}
			(Mode::Documentation, Shape::Delimiter | Shape::Source) => TokenKind::Ignored,
			(Mode::Code, _) => {
				TokenKind::Content {
					text: self.code_line(&normalized),
					mode: Mode::Code,
				}
			}
		};

		Ok(Classified::Emit(kind))
	}

	/// A verbatim line with the active `indent` shift applied.
	fn code_line(&self, normalized: &str) -> String {
		let body = normalized.trim_start_matches(' ');
		let indent = normalized.len() - body.len();
		format!("{}{body}", " ".repeat(self.shifted(indent)))
	}

	fn apply(&mut self, directive: Directive, indent: usize, line: usize) -> WeftResult<TokenKind> {
		trace!(file = self.file, line, %directive, "marker");

		let directive = match directive {
			Directive::If(token) => {
				if self.options.tokens.contains(&token) {
					self.conditions.push(token.clone());
				} else {
					self.hidden = Some(token.clone());
				}
				return Ok(TokenKind::Marker {
					directive: Directive::If(token),
					indent,
				});
			}
			Directive::Fi(token) => {
				if self.conditions.last() != Some(&token) {
					return Err(self.error(StructuralIssue::UnmatchedFi(token), line));
				}
				self.conditions.pop();
				return Ok(TokenKind::Marker {
					directive: Directive::Fi(token),
					indent,
				});
			}
			Directive::Start(name) => {
				self.open(&name, Mode::Documentation, false, line)?;
				return Ok(TokenKind::Marker {
					directive: Directive::Start(name),
					indent,
				});
			}
			Directive::CodeStart(name) => {
				self.open(&name, Mode::Code, true, line)?;
				return Ok(TokenKind::Marker {
					directive: Directive::CodeStart(name),
					indent,
				});
			}
			other => other,
		};

		let directive = match directive {
			Directive::End(name) => Directive::End(Some(self.close(name, line)?)),
			Directive::Code => {
				self.set_mode(Mode::Code, line)?;
				self.swallow_close = self.open_comment.is_some();
				Directive::Code
			}
			Directive::Edoc => {
				self.set_mode(Mode::Documentation, line)?;
				Directive::Edoc
			}
			Directive::Include { name, .. } if name.is_empty() => {
				return Err(self.error(StructuralIssue::EmptyInclude, line));
			}
			Directive::Define { name, .. } if name.is_empty() => {
				return Err(self.error(StructuralIssue::EmptyDefine, line));
			}
			Directive::Indent(amount) => {
				if let Some(frame) = self.frames.last_mut() {
					frame.shift += amount;
				}
				Directive::Indent(amount)
			}
			other => other,
		};

		Ok(TokenKind::Marker { directive, indent })
	}

	fn open(&mut self, name: &str, mode: Mode, code_block: bool, line: usize) -> WeftResult<()> {
		if name.is_empty() {
			return match self.frames.as_slice() {
				[] => {
					self.frames.push(Frame::new(String::new(), mode, code_block));
					Ok(())
				}
				[anonymous] if anonymous.name.is_empty() && !code_block => Ok(()),
				_ => Err(self.error(StructuralIssue::MisplacedAnonymousStart, line)),
			};
		}

		if self.frames.iter().any(|frame| frame.name == name) {
			return Err(self.error(StructuralIssue::AlreadyOpen(name.to_string()), line));
		}

		self.frames.push(Frame::new(name.to_string(), mode, code_block));
		Ok(())
	}

	fn close(&mut self, name: Option<String>, line: usize) -> WeftResult<String> {
		let Some(frame) = self.frames.last() else {
			return Err(self.error(
				StructuralIssue::UnmatchedEnd(name.unwrap_or_default()),
				line,
			));
		};

		if let Some(name) = name {
			if name != frame.name {
				return Err(self.error(
					StructuralIssue::MismatchedEnd {
						expected: frame.name.clone(),
						found: name,
					},
					line,
				));
			}
		}

		if frame.mode == Mode::Code && !frame.code_block {
			return Err(self.error(StructuralIssue::UnterminatedCode(frame.name.clone()), line));
		}

		let name = frame.name.clone();
		self.frames.pop();
		Ok(name)
	}

	fn set_mode(&mut self, mode: Mode, line: usize) -> WeftResult<()> {
		let current = self.frames.last().map(|frame| frame.mode);
		match (current, mode) {
			(Some(Mode::Code), Mode::Code) => Err(self.error(StructuralIssue::NestedCode, line)),
			(Some(Mode::Documentation), Mode::Documentation) => {
				Err(self.error(StructuralIssue::EdocWithoutCode, line))
			}
			_ => {
				if let Some(frame) = self.frames.last_mut() {
					frame.mode = mode;
				}
				Ok(())
			}
		}
	}

	/// Validate the state at the end of input.
	fn finish(&self) -> WeftResult<()> {
		let line = self.last_line.max(1);

		if let Some(token) = self.hidden.as_ref().or(self.conditions.last()) {
			return Err(self.error(StructuralIssue::UnterminatedIf(token.clone()), line));
		}

		if let Some(frame) = self.frames.iter().rev().find(|frame| !frame.name.is_empty()) {
			return Err(self.error(StructuralIssue::UnterminatedBlock(frame.name.clone()), line));
		}

		if let Some(anonymous) = self.frames.first() {
			if anonymous.mode == Mode::Code && !anonymous.code_block {
				return Err(self.error(StructuralIssue::UnterminatedCode(String::new()), line));
			}
		}

		Ok(())
	}

	fn shifted(&self, indent: usize) -> usize {
		let shift: isize = self.frames.iter().map(|frame| frame.shift).sum();
		(indent as isize + shift).max(0) as usize
	}

	fn shape(&mut self, normalized: &str) -> Shape {
		let adapter = self.adapter;
		let trimmed = normalized.trim_start_matches(' ');
		let indent = normalized.len() - trimmed.len();

		if let Some(index) = self.open_comment {
			let close = adapter.block_delimiters()[index].close.as_str();
			return match trimmed.find(close) {
				Some(end) => {
					self.open_comment = None;
					self.track_openings(&trimmed[end + close.len()..]);
					comment_text(indent, &trimmed[..end])
				}
				None if trimmed.trim().is_empty() => Shape::Blank,
				None => {
					Shape::Comment {
						indent,
						text: trimmed.trim_end().to_string(),
					}
				}
			};
		}

		if trimmed.trim().is_empty() {
			return Shape::Blank;
		}

		if adapter.is_plain_text() {
			return Shape::Comment {
				indent,
				text: trimmed.trim_end().to_string(),
			};
		}

		if let Some(rest) = adapter.strip_line_comment(trimmed) {
			let rest = rest.strip_prefix(' ').unwrap_or(rest);
			let body = rest.trim_start();
			if body.trim_end().is_empty() {
				return Shape::Blank;
			}
			return Shape::Comment {
				indent: indent + (rest.len() - body.len()),
				text: body.trim_end().to_string(),
			};
		}

		if let Some(index) = adapter.block_opening(trimmed) {
			let delimiter = &adapter.block_delimiters()[index];
			let after = &trimmed[delimiter.open.len()..];
			return match after.find(delimiter.close.as_str()) {
				Some(end) => {
					let rest = &after[end + delimiter.close.len()..];
					let shape = comment_text(indent, &after[..end]);
					self.track_openings(rest);
					shape
				}
				None => {
					self.open_comment = Some(index);
					comment_text(indent, after)
				}
			};
		}

		self.track_openings(trimmed);
		Shape::Source
	}

	/// Notice block comments that open after source text and stay open past
	/// the end of the line. Delimiters inside quoted strings do not count.
	fn track_openings(&mut self, text: &str) {
		let adapter = self.adapter;
		let mut index = 0;

		while let Some(ch) = text[index..].chars().next() {
			let rest = &text[index..];

			if let Some(open) = adapter.block_opening(rest) {
				let delimiter = &adapter.block_delimiters()[open];
				let after = &rest[delimiter.open.len()..];
				match after.find(delimiter.close.as_str()) {
					Some(end) => {
						index += delimiter.open.len() + end + delimiter.close.len();
						continue;
					}
					None => {
						self.open_comment = Some(open);
						return;
					}
				}
			}

			if adapter.strip_line_comment(rest).is_some() {
				return;
			}

			index += quoted_len(rest).unwrap_or(ch.len_utf8());
		}
	}
}

/// Length of the quoted string at the start of `text`, closing quote
/// included. An unmatched quote is not a string.
fn quoted_len(text: &str) -> Option<usize> {
	let quote = text.chars().next().filter(|ch| matches!(ch, '"' | '\''))?;
	let mut escaped = false;

	for (offset, ch) in text.char_indices().skip(1) {
		match ch {
			_ if escaped => escaped = false,
			'\\' => escaped = true,
			_ if ch == quote => return Some(offset + ch.len_utf8()),
			_ => {}
		}
	}

	None
}

impl<A: CommentAdapter + ?Sized> Lexer<'_, A> {
	/// Read one more line and queue the tokens it settles.
	fn advance(&mut self) {
		let Some((index, raw)) = self.lines.next() else {
			self.done = true;
			self.queue.extend(self.held.take().map(Ok));
			if let Err(error) = self.finish() {
				self.queue.push_back(Err(error));
			}
			return;
		};

		let line = index + 1;
		self.last_line = line;

		match self.classify(raw, line) {
			Ok(Classified::Hold(kind)) => {
				self.queue.extend(self.held.take().map(Ok));
				self.held = Some(Token { line, kind });
			}
			Ok(Classified::Emit(kind)) => {
				if let Some(mut held) = self.held.take() {
					if matches!(kind, TokenKind::Marker {
						directive: Directive::Edoc,
						..
					}) {
						held.kind = TokenKind::Ignored;
					}
					self.queue.push_back(Ok(held));
				}
				self.queue.push_back(Ok(Token { line, kind }));
			}
			Err(error) => {
				self.done = true;
				self.queue.extend(self.held.take().map(Ok));
				self.queue.push_back(Err(error));
			}
		}
	}
}

impl<A: CommentAdapter + ?Sized> Iterator for Lexer<'_, A> {
	type Item = WeftResult<Token>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(item) = self.queue.pop_front() {
				return Some(item);
			}
			if self.done {
				return None;
			}
			self.advance();
		}
	}
}

/// Tokenize `text` with the given adapter.
pub fn tokenize<'a, A: CommentAdapter + ?Sized>(
	file: &'a str,
	text: &'a str,
	adapter: &'a A,
	options: &'a LexOptions,
) -> Lexer<'a, A> {
	Lexer::new(file, text, adapter, options)
}

/// Text between comment delimiters on a single line. Whitespace right after
/// the opening delimiter is not counted as indentation.
fn comment_text(indent: usize, inner: &str) -> Shape {
	let text = inner.trim();
	if text.is_empty() {
		Shape::Delimiter
	} else {
		Shape::Comment {
			indent,
			text: text.to_string(),
		}
	}
}

/// Replace leading whitespace with spaces, expanding tabs to the next tab
/// stop.
pub fn normalize_indent(raw: &str, tab_width: usize) -> String {
	let body = raw.trim_start();
	let mut column = 0;

	for ch in raw[..raw.len() - body.len()].chars() {
		if ch == '\t' && tab_width > 0 {
			column += tab_width - column % tab_width;
		} else {
			column += 1;
		}
	}

	format!("{}{body}", " ".repeat(column))
}

/// Normalize CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}
