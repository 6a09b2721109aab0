use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn weft_cmd(dir: &Path) -> Command {
	let mut cmd = Command::new(get_cargo_bin("weft"));
	cmd.env("NO_COLOR", "1").env_remove("RUST_LOG").current_dir(dir);
	cmd
}

/// A C file whose anonymous block includes one named block.
pub const ADD_C: &str = "// Adding numbers
//
//   @include(add)
// @()

// @start(add)
// Add two integers.
// @code
int add(int a, int b) {
    return a + b;
}
// @edoc
// @(add)
";
