use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::BlockPath;
use crate::CommentAdapter;
use crate::DEFAULT_SIGIL;
use crate::Directive;
use crate::LexOptions;
use crate::Lexer;
use crate::Location;
use crate::Mode;
use crate::StructuralIssue;
use crate::Token;
use crate::TokenKind;
use crate::WeftError;
use crate::WeftResult;

/// Identifies one file that was added to a [`Pass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(usize);

impl FileId {
	/// Position of the file in the order it was added.
	pub fn index(self) -> usize {
		self.0
	}
}

/// How a block was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
	/// The implicit block holding a file's top-level documentation.
	Anonymous,
	/// `start(name)`.
	Start,
	/// `cstart(name)`.
	CodeStart,
}

/// One recorded line of a block, stored relative to the block's baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineRecord {
	Documentation {
		text: String,
		line: usize,
	},
	Code {
		text: String,
		line: usize,
	},
	/// A reference to another block. `indent` is the whitespace between the
	/// baseline and the marker, prepended to every line of the included block.
	Include {
		name: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		file: Option<String>,
		indent: String,
		line: usize,
	},
}

impl LineRecord {
	/// The 1-indexed source line this record came from.
	pub fn line(&self) -> usize {
		match self {
			Self::Documentation { line, .. } | Self::Code { line, .. } | Self::Include { line, .. } => {
				*line
			}
		}
	}

	fn content(mode: Mode, text: String, line: usize) -> Self {
		match mode {
			Mode::Documentation => Self::Documentation { text, line },
			Mode::Code => Self::Code { text, line },
		}
	}
}

/// An `include` reference as found in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeRef<'a> {
	pub name: &'a str,
	/// Restricts the lookup to the blocks of one file.
	pub file: Option<&'a str>,
	pub line: usize,
}

fn default_sigil() -> char {
	DEFAULT_SIGIL
}

/// A named, ordered sequence of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
	/// The block name; empty for a file's anonymous block.
	pub name: String,
	pub kind: BlockKind,
	/// Lines relative to the indentation of the block's first content line.
	pub lines: Vec<LineRecord>,
	/// Leading whitespace of the line that opened the block.
	pub indent_prefix: String,
	/// Where the block was opened.
	pub origin: Location,
	/// Marker sigil of the file the block comes from.
	#[serde(default = "default_sigil")]
	pub sigil: char,
}

impl Block {
	pub fn is_anonymous(&self) -> bool {
		self.kind == BlockKind::Anonymous
	}

	/// Every include of the block, in line order.
	pub fn includes(&self) -> impl Iterator<Item = IncludeRef<'_>> {
		self.lines.iter().filter_map(|record| {
			match record {
				LineRecord::Include {
					name, file, line, ..
				} => {
					Some(IncludeRef {
						name,
						file: file.as_deref(),
						line: *line,
					})
				}
				_ => None,
			}
		})
	}
}

/// What a macro expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MacroBody {
	/// `define(name, value)`: replaces the reference inside its line.
	Inline(String),
	/// `define(name)` … `enifed(name)`: replaces the whole referencing line.
	Lines(Vec<LineRecord>),
}

/// A macro defined with `define`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
	pub name: String,
	pub body: MacroBody,
	pub origin: Location,
}

/// All blocks collected from the files of one run.
///
/// Named blocks and macros share one namespace each across every file of the
/// pass. Each file also owns an anonymous block with its top-level
/// documentation; the name `""` refers to the anonymous block of the first
/// file.
#[derive(Debug, Clone, Default)]
pub struct Pass {
	files: Vec<String>,
	roots: Vec<Block>,
	blocks: BTreeMap<String, Block>,
	macros: BTreeMap<String, Macro>,
}

impl Pass {
	pub fn new() -> Self {
		Self::default()
	}

	/// Lex `text` with `adapter` and add its blocks to the pass.
	///
	/// A failing file leaves the pass as it was before the call.
	pub fn add_source<A: CommentAdapter + ?Sized>(
		&mut self,
		file: impl Into<String>,
		text: &str,
		adapter: &A,
		options: &LexOptions,
	) -> WeftResult<FileId> {
		let file = file.into();
		let tokens = Lexer::new(&file, text, adapter, options);
		self.add_tokens_with_sigil(file.as_str(), adapter.sigil(), tokens)
	}

	/// Add the blocks described by an already classified token stream.
	pub fn add_tokens(
		&mut self,
		file: impl Into<String>,
		tokens: impl IntoIterator<Item = WeftResult<Token>>,
	) -> WeftResult<FileId> {
		self.add_tokens_with_sigil(file, DEFAULT_SIGIL, tokens)
	}

	/// Like [`Pass::add_tokens`] for a file whose markers use `sigil`.
	pub fn add_tokens_with_sigil(
		&mut self,
		file: impl Into<String>,
		sigil: char,
		tokens: impl IntoIterator<Item = WeftResult<Token>>,
	) -> WeftResult<FileId> {
		let file = file.into();
		let mut builder = GraphBuilder::new(&file, sigil);

		for token in tokens {
			builder.push(token?)?;
		}

		let Built {
			root,
			blocks,
			macros,
		} = builder.finish()?;

		for block in &blocks {
			if let Some(existing) = self.blocks.get(&block.name) {
				return Err(WeftError::DuplicateBlock {
					name: block.name.clone(),
					first: existing.origin.clone(),
					second: block.origin.clone(),
				});
			}
		}

		for definition in &macros {
			if let Some(existing) = self.macros.get(&definition.name) {
				return Err(WeftError::DuplicateMacro {
					name: definition.name.clone(),
					first: existing.origin.clone(),
					second: definition.origin.clone(),
				});
			}
		}

		debug!(
			file = %file,
			blocks = blocks.len(),
			macros = macros.len(),
			"added file to pass"
		);

		let id = FileId(self.files.len());
		self.files.push(file);
		self.roots.push(root);
		self.blocks
			.extend(blocks.into_iter().map(|block| (block.name.clone(), block)));
		self.macros.extend(
			macros
				.into_iter()
				.map(|definition| (definition.name.clone(), definition)),
		);

		Ok(id)
	}

	/// Labels of the files in the order they were added.
	pub fn files(&self) -> &[String] {
		&self.files
	}

	pub fn file_ids(&self) -> impl Iterator<Item = FileId> {
		(0..self.files.len()).map(FileId)
	}

	pub fn file_name(&self, id: FileId) -> Option<&str> {
		self.files.get(id.0).map(String::as_str)
	}

	/// The first file whose label is `file` or ends with the path `file`.
	pub fn find_file(&self, file: &str) -> Option<FileId> {
		self.files
			.iter()
			.position(|label| label == file || Path::new(label).ends_with(file))
			.map(FileId)
	}

	/// The anonymous block of one file.
	pub fn root(&self, id: FileId) -> Option<&Block> {
		self.roots.get(id.0)
	}

	pub fn roots(&self) -> impl Iterator<Item = &Block> {
		self.roots.iter()
	}

	/// Look up a block by name. `""` is the first file's anonymous block.
	pub fn block(&self, name: &str) -> Option<&Block> {
		if name.is_empty() {
			self.roots.first()
		} else {
			self.blocks.get(name)
		}
	}

	/// A named block; never the anonymous one.
	pub fn named(&self, name: &str) -> Option<&Block> {
		self.blocks.get(name)
	}

	/// The block an include refers to. With a file argument the block must
	/// be defined in that file.
	pub fn include_target(&self, include: &IncludeRef<'_>) -> Option<&Block> {
		let block = self.named(include.name)?;

		match include.file {
			None => Some(block),
			Some(file) => {
				let label = self.file_name(self.find_file(file)?)?;
				(block.origin.file == label).then_some(block)
			}
		}
	}

	/// Named blocks sorted by name.
	pub fn blocks(&self) -> impl Iterator<Item = &Block> {
		self.blocks.values()
	}

	/// Macros sorted by name.
	pub fn macros(&self) -> impl Iterator<Item = &Macro> {
		self.macros.values()
	}

	pub fn macro_named(&self, name: &str) -> Option<&Macro> {
		self.macros.get(name)
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}
}

struct OpenBlock {
	name: String,
	kind: BlockKind,
	/// Column of the opening marker.
	prefix: usize,
	/// Set by the first content or include line.
	baseline: Option<usize>,
	lines: Vec<LineRecord>,
	origin: Location,
}

impl OpenBlock {
	fn new(name: String, kind: BlockKind, prefix: usize, origin: Location) -> Self {
		Self {
			name,
			kind,
			prefix,
			baseline: None,
			lines: Vec::new(),
			origin,
		}
	}

	fn into_block(self, sigil: char) -> Block {
		Block {
			name: self.name,
			kind: self.kind,
			lines: self.lines,
			indent_prefix: " ".repeat(self.prefix),
			origin: self.origin,
			sigil,
		}
	}
}

/// Everything one file contributes to a pass.
struct Built {
	root: Block,
	blocks: Vec<Block>,
	macros: Vec<Macro>,
}

/// Builds the blocks of a single file from its tokens.
///
/// Lines are recorded in every open named block, each relative to that
/// block's own baseline. The anonymous block only receives lines while no
/// named block is open; named blocks at the top level are definitions and
/// reach the output only through `include`. Lines between `define(name)` and
/// `enifed(name)` go to the macro instead of any block.
struct GraphBuilder<'f> {
	file: &'f str,
	sigil: char,
	root: OpenBlock,
	root_open: bool,
	stack: Vec<OpenBlock>,
	finished: Vec<Block>,
	definition: Option<OpenBlock>,
	macros: Vec<Macro>,
}

impl<'f> GraphBuilder<'f> {
	fn new(file: &'f str, sigil: char) -> Self {
		let mut root = OpenBlock::new(String::new(), BlockKind::Anonymous, 0, Location::new(file, 1));
		root.baseline = Some(0);

		Self {
			file,
			sigil,
			root,
			root_open: true,
			stack: Vec::new(),
			finished: Vec::new(),
			definition: None,
			macros: Vec::new(),
		}
	}

	fn error(&self, issue: StructuralIssue, line: usize) -> WeftError {
		let root = self.root_open.then(String::new);
		let path = root
			.into_iter()
			.chain(self.stack.iter().map(|open| open.name.clone()));
		WeftError::structural(issue, Location::new(self.file, line), BlockPath::new(path))
	}

	fn push(&mut self, token: Token) -> WeftResult<()> {
		let Token { line, kind } = token;

		match kind {
			TokenKind::Marker { directive, indent } => self.marker(directive, indent, line),
			TokenKind::Content { text, mode } => {
				let indent = leading_spaces(&text);
				self.record(indent, line, |baseline| {
					LineRecord::content(mode, text[baseline..].to_string(), line)
				})
			}
			TokenKind::Blank { mode } => {
				for open in self.targets() {
					open.lines.push(LineRecord::content(mode, String::new(), line));
				}
				Ok(())
			}
			TokenKind::Ignored => Ok(()),
		}
	}

	fn marker(&mut self, directive: Directive, indent: usize, line: usize) -> WeftResult<()> {
		if self.definition.is_some() {
			return self.macro_marker(directive, line);
		}

		match directive {
			Directive::Start(name) | Directive::CodeStart(name) if name.is_empty() => {
				self.root_open = true;
			}
			Directive::Start(name) => self.open(name, BlockKind::Start, indent, line),
			Directive::CodeStart(name) => self.open(name, BlockKind::CodeStart, indent, line),
			Directive::End(name) => self.close(name, line)?,
			Directive::Include { name, file } => {
				if name.is_empty() {
					return Err(self.error(StructuralIssue::EmptyInclude, line));
				}
				self.record(indent, line, |baseline| {
					LineRecord::Include {
						name: name.clone(),
						file: file.clone(),
						indent: " ".repeat(indent - baseline),
						line,
					}
				})?;
			}
			Directive::Define {
				name,
				value: Some(value),
			} => {
				self.define(Macro {
					name,
					body: MacroBody::Inline(value),
					origin: Location::new(self.file, line),
				})?;
			}
			Directive::Define { name, value: None } => {
				self.definition = Some(OpenBlock::new(
					name,
					BlockKind::Start,
					indent,
					Location::new(self.file, line),
				));
			}
			Directive::Enifed(name) => {
				return Err(self.error(StructuralIssue::EnifedWithoutDefine(name), line));
			}
			_ => {}
		}

		Ok(())
	}

	/// Markers met while a macro body is open.
	fn macro_marker(&mut self, directive: Directive, line: usize) -> WeftResult<()> {
		match directive {
			Directive::Enifed(name) => {
				let Some(open) = self.definition.take_if(|open| open.name == name) else {
					return Err(self.error(StructuralIssue::EnifedWithoutDefine(name), line));
				};
				self.define(Macro {
					name: open.name,
					body: MacroBody::Lines(open.lines),
					origin: open.origin,
				})
			}
			Directive::Start(_)
			| Directive::CodeStart(_)
			| Directive::End(_)
			| Directive::Include { .. }
			| Directive::Define { .. } => {
				Err(self.error(
					StructuralIssue::MarkerInsideDefine(directive.to_string()),
					line,
				))
			}
			_ => Ok(()),
		}
	}

	fn define(&mut self, definition: Macro) -> WeftResult<()> {
		if let Some(first) = self
			.macros
			.iter()
			.find(|existing| existing.name == definition.name)
		{
			return Err(WeftError::DuplicateMacro {
				name: definition.name,
				first: first.origin.clone(),
				second: definition.origin,
			});
		}

		self.macros.push(definition);
		Ok(())
	}

	fn open(&mut self, name: String, kind: BlockKind, prefix: usize, line: usize) {
		self.stack
			.push(OpenBlock::new(name, kind, prefix, Location::new(self.file, line)));
	}

	fn close(&mut self, name: Option<String>, line: usize) -> WeftResult<()> {
		let Some(open) = self.stack.last() else {
			if self.root_open && name.as_deref().is_none_or(str::is_empty) {
				self.root_open = false;
				return Ok(());
			}

			return Err(self.error(
				StructuralIssue::UnmatchedEnd(name.unwrap_or_default()),
				line,
			));
		};

		if let Some(name) = name {
			if name != open.name {
				return Err(self.error(
					StructuralIssue::MismatchedEnd {
						expected: open.name.clone(),
						found: name,
					},
					line,
				));
			}
		}

		let Some(open) = self.stack.pop() else {
			return Ok(());
		};

		if let Some(first) = self
			.finished
			.iter()
			.find(|block| block.name == open.name)
		{
			return Err(WeftError::DuplicateBlock {
				name: open.name.clone(),
				first: first.origin.clone(),
				second: open.origin,
			});
		}

		self.finished.push(open.into_block(self.sigil));
		Ok(())
	}

	/// The blocks, or the open macro body, that receive the next line.
	fn targets(&mut self) -> impl Iterator<Item = &mut OpenBlock> {
		let defining = self.definition.is_some();
		let root_receives = !defining && self.stack.is_empty() && self.root_open;
		let stack = if defining {
			&mut self.stack[..0]
		} else {
			&mut self.stack[..]
		};
		let root = root_receives.then_some(&mut self.root);

		self.definition
			.as_mut()
			.into_iter()
			.chain(stack.iter_mut())
			.chain(root)
	}

	/// Record a line indented `indent` columns in every target block. `make`
	/// receives the baseline of the block being written to. The first line of
	/// a block fixes its baseline.
	fn record(
		&mut self,
		indent: usize,
		line: usize,
		make: impl Fn(usize) -> LineRecord,
	) -> WeftResult<()> {
		let shallow = self.targets().find_map(|open| {
			let required = *open.baseline.get_or_insert(indent);
			(indent < required).then(|| {
				StructuralIssue::InsufficientIndent {
					block: open.name.clone(),
					required,
					found: indent,
				}
			})
		});

		if let Some(issue) = shallow {
			return Err(self.error(issue, line));
		}

		for open in self.targets() {
			let baseline = open.baseline.unwrap_or(indent);
			open.lines.push(make(baseline));
		}

		Ok(())
	}

	fn finish(self) -> WeftResult<Built> {
		if let Some(open) = &self.definition {
			return Err(self.error(
				StructuralIssue::UnterminatedDefine(open.name.clone()),
				open.origin.line,
			));
		}

		if let Some(open) = self.stack.last() {
			let line = open.lines.last().map_or(open.origin.line, LineRecord::line);
			return Err(self.error(StructuralIssue::UnterminatedBlock(open.name.clone()), line));
		}

		Ok(Built {
			root: self.root.into_block(self.sigil),
			blocks: self.finished,
			macros: self.macros,
		})
	}
}

fn leading_spaces(text: &str) -> usize {
	text.len() - text.trim_start_matches(' ').len()
}
