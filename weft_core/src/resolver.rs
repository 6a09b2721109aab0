use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::Block;
use crate::BlockPath;
use crate::IncludeRef;
use crate::LineRecord;
use crate::Location;
use crate::MacroBody;
use crate::Mode;
use crate::Pass;
use crate::WeftError;
use crate::WeftResult;
use crate::find_substitutions;

/// One line of composed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
	pub text: String,
	pub mode: Mode,
}

impl OutputLine {
	pub fn new(text: impl Into<String>, mode: Mode) -> Self {
		Self {
			text: text.into(),
			mode,
		}
	}
}

impl Pass {
	/// Compose the block `name` with every include expanded.
	///
	/// `""` composes the first file's anonymous block. The result depends only
	/// on the pass and the arguments.
	pub fn resolve(&self, name: &str) -> WeftResult<Vec<OutputLine>> {
		self.resolve_with_baseline(name, "")
	}

	/// Like [`Pass::resolve`], with `baseline` prepended to every non-blank
	/// line.
	pub fn resolve_with_baseline(&self, name: &str, baseline: &str) -> WeftResult<Vec<OutputLine>> {
		let block = self
			.block(name)
			.ok_or_else(|| WeftError::UnknownBlock(name.to_string()))?;
		self.compose(block, baseline)
	}

	/// Compose a block at the indentation it was written at.
	pub fn resolve_in_place(&self, name: &str) -> WeftResult<Vec<OutputLine>> {
		let block = self
			.block(name)
			.ok_or_else(|| WeftError::UnknownBlock(name.to_string()))?;
		self.compose(block, &block.indent_prefix)
	}

	/// Compose any block of the pass, such as the anonymous block of a file
	/// other than the first.
	pub fn compose(&self, block: &Block, baseline: &str) -> WeftResult<Vec<OutputLine>> {
		let mut composer = Composer {
			pass: self,
			stack: Vec::new(),
			output: Vec::new(),
		};
		composer.expand(block, baseline)?;
		debug!(block = %block.name, lines = composer.output.len(), "composed block");

		Ok(composer.output)
	}
}

struct Composer<'p> {
	pass: &'p Pass,
	/// Blocks currently being expanded, outermost first.
	stack: Vec<&'p str>,
	output: Vec<OutputLine>,
}

impl<'p> Composer<'p> {
	fn expand(&mut self, block: &'p Block, prefix: &str) -> WeftResult<()> {
		self.stack.push(&block.name);

		for record in &block.lines {
			match record {
				LineRecord::Documentation { text, line } => {
					self.content(block, prefix, text, Mode::Documentation, *line)?;
				}
				LineRecord::Code { text, line } => {
					self.content(block, prefix, text, Mode::Code, *line)?;
				}
				LineRecord::Include {
					name,
					file,
					indent,
					line,
				} => {
					let location = Location::new(&block.origin.file, *line);

					if let Some(start) = self.stack.iter().position(|active| *active == name.as_str()) {
						let mut cycle = BlockPath::new(self.stack[start..].iter().copied());
						cycle.push(name.clone());
						return Err(WeftError::CyclicInclude { cycle, location });
					}

					let include = IncludeRef {
						name,
						file: file.as_deref(),
						line: *line,
					};
					let Some(target) = self.pass.include_target(&include) else {
						return Err(WeftError::UnresolvedInclude {
							name: name.clone(),
							file: file.clone(),
							including: block.name.clone(),
							location,
							path: BlockPath::new(self.stack.iter().copied()),
						});
					};

					self.expand(target, &format!("{prefix}{indent}"))?;
				}
			}
		}

		self.stack.pop();
		Ok(())
	}

	/// Emit a content line with its `subst` references replaced. A reference
	/// to a multi-line macro replaces the whole line with the macro body.
	fn content(
		&mut self,
		block: &Block,
		prefix: &str,
		text: &str,
		mode: Mode,
		line: usize,
	) -> WeftResult<()> {
		let pass = self.pass;
		let substitutions = find_substitutions(text, block.sigil);
		if substitutions.is_empty() {
			self.emit(prefix, text, mode);
			return Ok(());
		}

		let mut expanded = String::with_capacity(text.len());
		let mut copied = 0;

		for substitution in &substitutions {
			let value = if let Some(value) = builtin(&substitution.name, &block.origin.file, line) {
				value
			} else {
				let Some(definition) = pass.macro_named(&substitution.name) else {
					return Err(WeftError::UnknownMacro {
						name: substitution.name.clone(),
						location: Location::new(&block.origin.file, line),
					});
				};

				match &definition.body {
					MacroBody::Inline(value) => value.clone(),
					MacroBody::Lines(lines) => {
						let indent = &text[..text.len() - text.trim_start_matches(' ').len()];
						let prefix = format!("{prefix}{indent}");
						for record in lines {
							match record {
								LineRecord::Documentation { text, .. } => {
									self.emit(&prefix, text, Mode::Documentation);
								}
								LineRecord::Code { text, .. } => self.emit(&prefix, text, Mode::Code),
								LineRecord::Include { .. } => {}
							}
						}
						return Ok(());
					}
				}
			};

			expanded.push_str(&text[copied..substitution.span.start]);
			expanded.push_str(&value);
			copied = substitution.span.end;
		}

		expanded.push_str(&text[copied..]);
		self.emit(prefix, &expanded, mode);
		Ok(())
	}

	fn emit(&mut self, prefix: &str, text: &str, mode: Mode) {
		let text = if text.is_empty() {
			String::new()
		} else {
			format!("{prefix}{text}")
		};
		self.output.push(OutputLine { text, mode });
	}
}

/// Value of a built-in macro: `__file__` is the base name of `file`,
/// `__line__` the line number, optionally shifted as in `__line__ + 2`.
pub(crate) fn builtin(name: &str, file: &str, line: usize) -> Option<String> {
	if name == "__file__" {
		let base = Path::new(file)
			.file_name()
			.and_then(|base| base.to_str())
			.unwrap_or(file);
		return Some(base.to_string());
	}

	let offset: String = name
		.strip_prefix("__line__")?
		.chars()
		.filter(|ch| !ch.is_whitespace())
		.collect();
	if offset.is_empty() {
		return Some(line.to_string());
	}

	let offset: isize = offset.parse().ok()?;
	Some(line.saturating_add_signed(offset).to_string())
}
