//! Operator pair input from a file or stdin

use anyhow::{Context, Result};
use pakpatch::{parse_pair_lines, PairInput};
use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::Path;

/// Read `left,right` pairs from `file`, or from stdin when `None`
///
/// Stdin is read line by line until `q` or end of input.
pub fn read_pairs(file: Option<&Path>) -> Result<PairInput> {
    match file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open pairs file {}", path.display()))?;
            read_pairs_from(BufReader::new(file))
                .with_context(|| format!("Failed to read pairs from {}", path.display()))
        }
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                eprintln!("Enter pairs as `left,right`, one per line. Type q to finish.");
            }
            read_pairs_from(stdin.lock()).context("Failed to read pairs from stdin")
        }
    }
}

pub fn read_pairs_from<R: BufRead>(reader: R) -> io::Result<PairInput> {
    let mut error = None;
    let lines = reader.lines().map_while(|line| match line {
        Ok(line) => Some(line),
        Err(e) => {
            error = Some(e);
            None
        }
    });

    let input = parse_pair_lines(lines);

    match error {
        Some(e) => Err(e),
        None => Ok(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pakpatch::IdentifierPair;

    #[test]
    fn test_read_until_sentinel() {
        let input = read_pairs_from("DEADBEEF,CAADBEEF\n\nAA,BB\nq\nCC,DD\n".as_bytes()).unwrap();
        assert!(input.terminated);
        assert_eq!(
            input.pairs,
            vec![
                IdentifierPair::new("DEADBEEF", "CAADBEEF"),
                IdentifierPair::new("AA", "BB"),
            ]
        );
    }

    #[test]
    fn test_read_without_sentinel() {
        let input = read_pairs_from("AA,BB\nnot a pair\n".as_bytes()).unwrap();
        assert!(!input.terminated);
        assert_eq!(input.pairs.len(), 1);
        assert_eq!(input.skipped.len(), 1);
        assert_eq!(input.skipped[0].position, 2);
    }

    #[test]
    fn test_read_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("pairs.txt");
        std::fs::write(&path, "Red Suit,Blue Suit\nQ\n").unwrap();

        let input = read_pairs(Some(&path)).unwrap();
        assert!(input.terminated);
        assert_eq!(input.pairs, vec![IdentifierPair::new("Red Suit", "Blue Suit")]);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(read_pairs(Some(&temp_dir.path().join("missing.txt"))).is_err());
    }
}
