mod common;

use predicates::prelude::PredicateBooleanExt;
use serde_json::Value;
use similar_asserts::assert_eq;
use weft_core::AnyEmptyResult;

#[test]
fn weave_renders_markdown_with_fenced_code() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("add.c"), common::ADD_C)?;

	let output = common::weft_cmd(tmp.path())
		.args(["weave", "add.c"])
		.assert()
		.success()
		.get_output()
		.stdout
		.clone();

	assert_eq!(
		String::from_utf8(output)?,
		"Adding numbers\n\n  Add two integers.\n```c\n  int add(int a, int b) {\n      return a + \
		 b;\n  }\n```\n"
	);

	Ok(())
}

#[test]
fn weave_plain_prints_lines_as_they_are() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("add.c"), common::ADD_C)?;

	common::weft_cmd(tmp.path())
		.args(["weave", "add.c", "--format", "plain", "--block", "add", "--indent", "> "])
		.assert()
		.success()
		.stdout(
			"> Add two integers.\n> int add(int a, int b) {\n>     return a + b;\n> }\n",
		);

	Ok(())
}

#[test]
fn weave_json_reports_modes() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("add.c"), common::ADD_C)?;

	let output = common::weft_cmd(tmp.path())
		.args(["weave", "add.c", "--format", "json"])
		.assert()
		.success()
		.get_output()
		.stdout
		.clone();

	let lines: Value = serde_json::from_slice(&output)?;
	let modes: Vec<&str> = lines
		.as_array()
		.map(|lines| lines.iter().filter_map(|line| line["mode"].as_str()).collect())
		.unwrap_or_default();
	assert_eq!(modes, vec![
		"documentation",
		"documentation",
		"documentation",
		"code",
		"code",
		"code"
	]);

	Ok(())
}

#[test]
fn weave_resolves_includes_across_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("readme.md"), "# Tools\n\n@include(tool)\n")?;
	std::fs::write(
		tmp.path().join("tool.py"),
		"# @start(tool)\n# Runs the tool.\n# @(tool)\nprint('tool')\n",
	)?;

	common::weft_cmd(tmp.path())
		.args(["weave", "readme.md", "tool.py", "--format", "plain"])
		.assert()
		.success()
		.stdout("# Tools\n\nRuns the tool.\n");

	Ok(())
}

#[test]
fn weave_expands_macros_and_file_scoped_includes() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("readme.md"),
		"# Tools\n\nVersion @subst(version)\n\n@include(tool, tool.py)\n",
	)?;
	std::fs::write(
		tmp.path().join("tool.py"),
		"# @define(version, 0.3)\n# @start(tool)\n# Runs @subst(__file__).\n# @(tool)\n",
	)?;

	common::weft_cmd(tmp.path())
		.args(["weave", "readme.md", "tool.py", "--format", "plain"])
		.assert()
		.success()
		.stdout("# Tools\n\nVersion 0.3\n\nRuns tool.py.\n");

	common::weft_cmd(tmp.path())
		.args(["weave", "readme.md", "tool.py", "--format", "plain", "--block", "tool"])
		.assert()
		.success()
		.stdout("Runs tool.py.\n");

	Ok(())
}

#[test]
fn weave_writes_to_output_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("notes.txt"), "first\nsecond\n")?;

	common::weft_cmd(tmp.path())
		.args(["weave", "notes.txt", "--format", "plain", "--output", "out.txt"])
		.assert()
		.success()
		.stdout(predicates::str::contains("wrote 2 line(s)"));

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("out.txt"))?,
		"first\nsecond\n"
	);

	Ok(())
}

#[test]
fn weave_tokens_enable_conditional_regions() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("notes.txt"),
		"public\n@if(internal)\nsecret\n@fi(internal)\n",
	)?;

	common::weft_cmd(tmp.path())
		.args(["weave", "notes.txt", "--format", "plain"])
		.assert()
		.success()
		.stdout("public\n");

	common::weft_cmd(tmp.path())
		.args(["weave", "notes.txt", "--format", "plain", "--token", "internal"])
		.assert()
		.success()
		.stdout("public\nsecret\n");

	Ok(())
}

#[test]
fn weave_fails_on_cyclic_includes() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("loop.c"),
		"// @include(a)\n// @()\n// @start(a)\n// @include(b)\n// @(a)\n// @start(b)\n// \
		 @include(a)\n// @(b)\n",
	)?;

	common::weft_cmd(tmp.path())
		.args(["weave", "loop.c"])
		.assert()
		.code(2)
		.stderr(predicates::str::contains("cyclic include a → b → a"));

	Ok(())
}

#[test]
fn weave_reports_structural_errors_with_location() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("bad.c"), "// @start(a)\n// @code\nint x;\n// @(a)\n")?;

	common::weft_cmd(tmp.path())
		.args(["weave", "bad.c"])
		.assert()
		.code(2)
		.stderr(
			predicates::str::contains("bad.c:4")
				.and(predicates::str::contains("ends inside a code region")),
		);

	Ok(())
}

#[test]
fn weave_rejects_unknown_languages() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("image.png"), "not text")?;

	common::weft_cmd(tmp.path())
		.args(["weave", "image.png"])
		.assert()
		.code(2)
		.stderr(predicates::str::contains("no comment syntax is known"));

	common::weft_cmd(tmp.path())
		.args(["weave", "image.png", "--language", "text", "--format", "plain"])
		.assert()
		.success()
		.stdout("not text\n");

	Ok(())
}

#[test]
fn weave_uses_languages_from_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("weft.toml"),
		"[languages.ini]\npatterns = [\"*.ini\"]\nline = [\";\"]\n",
	)?;
	std::fs::write(tmp.path().join("app.ini"), "; Settings\nkey = value\n")?;

	common::weft_cmd(tmp.path())
		.args(["weave", "app.ini", "--format", "plain"])
		.assert()
		.success()
		.stdout("Settings\n");

	Ok(())
}

#[test]
fn weave_reports_invalid_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("custom.toml"), "tab_width = \"wide\"\n")?;
	std::fs::write(tmp.path().join("notes.txt"), "text\n")?;

	common::weft_cmd(tmp.path())
		.args(["--config", "custom.toml", "weave", "notes.txt"])
		.assert()
		.code(2)
		.stderr(predicates::str::contains("failed to parse config file"));

	Ok(())
}
