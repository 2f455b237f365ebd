use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Appends `line` and a trailing newline to `filename`, creating the file
/// when needed.
pub(crate) fn append_line<P: AsRef<Path>>(filename: P, line: &str) -> io::Result<()> {
	let mut file = OpenOptions::new().create(true).append(true).open(filename)?;
	writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn append_then_read_back() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.txt");

		append_line(&path, "first").unwrap();
		append_line(&path, "second line").unwrap();

		assert_eq!(read_file(&path).unwrap(), vec!["first", "second line"]);
	}

	#[test]
	fn missing_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		assert!(read_file(dir.path().join("absent.txt")).is_err());
	}
}
