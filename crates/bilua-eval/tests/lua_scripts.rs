//! File-driven tests: every `tests/scripts/*.lua` program is parsed and
//! evaluated; a `*.out` companion (when present) must match stdout, and
//! `-- EXPECT SOURCE_CHANGE <row>:<col> <replacement>` comments must each
//! match a `Single` leaf of the produced source change. Row and column are
//! 1-based.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::rc::Rc;

use glob::glob;
use regex::Regex;

use bilua_eval::Interpreter;

#[derive(Clone, Default)]
struct Sink(Rc<RefCell<Vec<u8>>>);

impl Sink {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct ExpectedChange {
    row: u32,
    column: u32,
    replacement: String,
}

#[test]
fn lua_script_files() {
    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/scripts/*.lua");
    let expect_re = Regex::new(r"-- EXPECT SOURCE_CHANGE (\d+):(\d+) (.*)").unwrap();

    let mut discovered = 0;
    for entry in glob(pattern).expect("valid glob pattern") {
        let path = entry.expect("readable dir entry");
        let program = fs::read_to_string(&path).expect("readable script");
        discovered += 1;

        let expected_changes: Vec<ExpectedChange> = expect_re
            .captures_iter(&program)
            .map(|caps| ExpectedChange {
                row: caps[1].parse().unwrap(),
                column: caps[2].parse().unwrap(),
                replacement: caps[3].trim_end().to_string(),
            })
            .collect();
        let expected_out = fs::read_to_string(path.with_extension("out")).ok();

        let mut interpreter = Interpreter::new();
        let sink = Sink::default();
        interpreter
            .environment_mut()
            .set_stdout(Box::new(sink.clone()));

        let parse = interpreter.parse(program.clone());
        assert!(
            parse.is_ok(),
            "{}: parse errors: {:?}",
            path.display(),
            parse.errors
        );
        let result = interpreter
            .evaluate()
            .unwrap_or_else(|e| panic!("{}: evaluation failed: {e}", path.display()));

        match &result.source_change {
            None => assert!(
                expected_changes.is_empty(),
                "{}: expected source changes, got none",
                path.display()
            ),
            Some(change) => {
                assert!(
                    !expected_changes.is_empty(),
                    "{}: unexpected source change: {change}",
                    path.display()
                );
                let singles = change.collect_singles();
                for expected in &expected_changes {
                    let found = singles.iter().any(|single| {
                        single.range.start.line + 1 == expected.row
                            && single.range.start.column + 1 == expected.column
                            && single.replacement == expected.replacement
                    });
                    assert!(
                        found,
                        "{}: no single change matching {}:{} {:?} in {change}",
                        path.display(),
                        expected.row,
                        expected.column,
                        expected.replacement,
                    );
                }
            }
        }

        if let Some(expected_out) = expected_out {
            assert_eq!(
                sink.contents(),
                expected_out,
                "{}: stdout mismatch",
                path.display()
            );
        }
    }

    assert!(discovered >= 4, "expected script files to be discovered");
}
