mod common;

use serde_json::Value;
use similar_asserts::assert_eq;
use weft_core::AnyEmptyResult;

#[test]
fn blocks_lists_every_block() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("add.c"), common::ADD_C)?;

	common::weft_cmd(tmp.path())
		.args(["blocks", "add.c"])
		.assert()
		.success()
		.stdout(predicates::str::contains("<anonymous>"))
		.stdout(predicates::str::contains("add.c:1  2 line(s)  includes: add"))
		.stdout(predicates::str::contains("add.c:6  4 line(s)"));

	Ok(())
}

#[test]
fn blocks_json_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("add.c"), common::ADD_C)?;

	let output = common::weft_cmd(tmp.path())
		.args(["blocks", "add.c", "--format", "json"])
		.assert()
		.success()
		.get_output()
		.stdout
		.clone();

	let blocks: Value = serde_json::from_slice(&output)?;
	assert_eq!(blocks[0]["name"], "");
	assert_eq!(blocks[0]["kind"], "anonymous");
	assert_eq!(blocks[0]["includes"], serde_json::json!(["add"]));
	assert_eq!(blocks[1]["name"], "add");
	assert_eq!(blocks[1]["kind"], "start");
	assert_eq!(blocks[1]["line"], 6);
	assert_eq!(blocks[1]["lines"], 4);

	Ok(())
}
