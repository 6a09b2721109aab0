use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::Block;
use crate::BlockPath;
use crate::LineRecord;
use crate::Location;
use crate::Pass;
use crate::WeftError;
use crate::find_substitutions;
use crate::resolver::builtin;

/// Result of checking every include of a pass.
#[derive(Debug, Default)]
pub struct CheckReport {
	/// Unresolved includes, include cycles and unknown macros, collected
	/// instead of stopping at the first one.
	pub errors: Vec<WeftError>,
	/// Named blocks that no include refers to.
	pub unincluded: Vec<UnincludedBlock>,
}

impl CheckReport {
	/// Returns true if every include resolves and no cycle exists.
	pub fn is_ok(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn has_warnings(&self) -> bool {
		!self.unincluded.is_empty()
	}
}

/// A named block that is defined but never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnincludedBlock {
	pub name: String,
	pub origin: Location,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
	Active,
	Done,
}

impl Pass {
	/// Validate the include graph without composing anything.
	pub fn check(&self) -> CheckReport {
		let mut errors = Vec::new();
		let mut referenced = BTreeSet::new();

		for block in self.roots().chain(self.blocks()) {
			for include in block.includes() {
				referenced.insert(include.name);

				if self.include_target(&include).is_none() {
					errors.push(WeftError::UnresolvedInclude {
						name: include.name.to_string(),
						file: include.file.map(str::to_string),
						including: block.name.clone(),
						location: Location::new(&block.origin.file, include.line),
						path: BlockPath::new([block.name.clone()]),
					});
				}
			}

			self.check_substitutions(block, &mut errors);
		}

		let mut visits = BTreeMap::new();
		let mut stack = Vec::new();
		for block in self.blocks() {
			if !visits.contains_key(block.name.as_str()) {
				self.find_cycles(block, &mut visits, &mut stack, &mut errors);
			}
		}

		let unincluded: Vec<_> = self
			.blocks()
			.filter(|block| !referenced.contains(block.name.as_str()))
			.map(|block| {
				UnincludedBlock {
					name: block.name.clone(),
					origin: block.origin.clone(),
				}
			})
			.collect();

		for block in &unincluded {
			warn!(block = %block.name, origin = %block.origin, "block is never included");
		}

		CheckReport { errors, unincluded }
	}

	fn find_cycles<'p>(
		&'p self,
		block: &'p Block,
		visits: &mut BTreeMap<&'p str, Visit>,
		stack: &mut Vec<&'p str>,
		errors: &mut Vec<WeftError>,
	) {
		visits.insert(&block.name, Visit::Active);
		stack.push(&block.name);

		for include in block.includes() {
			let target = include.name;
			match visits.get(target) {
				Some(Visit::Active) => {
					let start = stack
						.iter()
						.position(|name| *name == target)
						.unwrap_or_default();
					let mut cycle = BlockPath::new(stack[start..].iter().copied());
					cycle.push(target.to_string());
					errors.push(WeftError::CyclicInclude {
						cycle,
						location: Location::new(&block.origin.file, include.line),
					});
				}
				Some(Visit::Done) => {}
				None => {
					if let Some(next) = self.named(target) {
						self.find_cycles(next, visits, stack, errors);
					}
				}
			}
		}

		stack.pop();
		visits.insert(&block.name, Visit::Done);
	}

	fn check_substitutions(&self, block: &Block, errors: &mut Vec<WeftError>) {
		for record in &block.lines {
			let (LineRecord::Documentation { text, line } | LineRecord::Code { text, line }) = record else {
				continue;
			};

			for substitution in find_substitutions(text, block.sigil) {
				if builtin(&substitution.name, &block.origin.file, *line).is_none()
					&& self.macro_named(&substitution.name).is_none()
				{
					errors.push(WeftError::UnknownMacro {
						name: substitution.name,
						location: Location::new(&block.origin.file, *line),
					});
				}
			}
		}
	}
}
