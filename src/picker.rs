// src/picker.rs

//! Choosing the workbook to hand to the roster tool.
//!
//! Every selector answers the same question: which file, or `None` if the
//! user backed out. A cancelled selection is never an error.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::util::has_allowed_extension;

pub trait InputSelector: Send {
    fn select_input_file(&mut self) -> Result<Option<PathBuf>>;
}

/// A path already chosen on the command line.
#[derive(Debug, Clone)]
pub struct Preselected(pub Option<PathBuf>);

impl InputSelector for Preselected {
    fn select_input_file(&mut self) -> Result<Option<PathBuf>> {
        Ok(self.0.clone())
    }
}

/// Numbered list of matching files under a directory, answered on a reader.
pub struct TerminalPicker<R, W> {
    root: PathBuf,
    extensions: Vec<String>,
    input: R,
    output: W,
}

impl TerminalPicker<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Picker reading from stdin; the menu goes to stderr.
    pub fn stdio(root: PathBuf, extensions: Vec<String>) -> Self {
        Self::new(
            root,
            extensions,
            std::io::BufReader::new(std::io::stdin()),
            std::io::stderr(),
        )
    }
}

impl<R, W> TerminalPicker<R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(root: PathBuf, extensions: Vec<String>, input: R, output: W) -> Self {
        Self {
            root,
            extensions,
            input,
            output,
        }
    }

    fn prompt(&mut self, candidates: &[PathBuf]) -> Result<Option<PathBuf>> {
        writeln!(self.output, "Select a workbook ({}):", self.extensions.join(", "))?;
        for (i, path) in candidates.iter().enumerate() {
            let shown = path.strip_prefix(&self.root).unwrap_or(path);
            writeln!(self.output, "  {:>2}) {}", i + 1, shown.display())?;
        }

        loop {
            write!(self.output, "Number (empty or q to cancel): ")?;
            self.output.flush()?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .context("Failed to read selection")?;
            let answer = line.trim();

            if read == 0 || answer.is_empty() || answer.eq_ignore_ascii_case("q") {
                return Ok(None);
            }

            match answer.parse::<usize>() {
                Ok(n) if (1..=candidates.len()).contains(&n) => {
                    return Ok(Some(candidates[n - 1].clone()));
                }
                _ => writeln!(self.output, "No entry {:?}", answer)?,
            }
        }
    }
}

impl<R, W> InputSelector for TerminalPicker<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn select_input_file(&mut self) -> Result<Option<PathBuf>> {
        let candidates = find_candidates(&self.root, &self.extensions)?;

        if candidates.is_empty() {
            writeln!(
                self.output,
                "No matching files under {}",
                self.root.display()
            )?;
            return Ok(None);
        }

        self.prompt(&candidates)
    }
}

/// Files under `root` whose extension is allowed, sorted by path.
///
/// Office lock files (`~$roster.xlsx`) are skipped.
pub fn find_candidates(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to scan {:?}", root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with("~$") {
            continue;
        }
        if has_allowed_extension(entry.path(), extensions) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

/// Takes the path from the system clipboard; empty text means cancel.
#[cfg(feature = "clipboard")]
#[derive(Debug, Default)]
pub struct ClipboardSelector;

#[cfg(feature = "clipboard")]
impl InputSelector for ClipboardSelector {
    fn select_input_file(&mut self) -> Result<Option<PathBuf>> {
        let mut clipboard = arboard::Clipboard::new().context("Clipboard is unavailable")?;
        let text = clipboard
            .get_text()
            .context("Clipboard does not contain text")?;
        Ok(path_from_clipboard_text(&text))
    }
}

/// Trim whitespace and one pair of surrounding quotes, as pasted paths often carry them.
pub fn path_from_clipboard_text(text: &str) -> Option<PathBuf> {
    let trimmed = text.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() {
        None
    } else {
        Some(PathBuf::from(unquoted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_extensions;
    use std::io::Cursor;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("2024")).unwrap();
        for name in ["b.xlsx", "a.XLSM", "notes.txt", "~$b.xlsx", "2024/c.xls"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    fn picker(root: &Path, answers: &str) -> TerminalPicker<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPicker::new(
            root.to_path_buf(),
            default_extensions(),
            Cursor::new(answers.as_bytes().to_vec()),
            Vec::new(),
        )
    }

    #[test]
    fn candidates_match_filter_and_are_sorted() {
        let dir = workspace();
        let found = find_candidates(dir.path(), &default_extensions()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("2024/c.xls"),
                PathBuf::from("a.XLSM"),
                PathBuf::from("b.xlsx"),
            ]
        );
    }

    #[test]
    fn number_selects_file() {
        let dir = workspace();
        let chosen = picker(dir.path(), "3\n").select_input_file().unwrap();
        assert_eq!(chosen, Some(dir.path().join("b.xlsx")));
    }

    #[test]
    fn invalid_answer_reprompts() {
        let dir = workspace();
        let mut p = picker(dir.path(), "9\nx\n1\n");
        let chosen = p.select_input_file().unwrap();

        assert_eq!(chosen, Some(dir.path().join("2024/c.xls")));
        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("No entry \"9\""));
        assert!(shown.contains("No entry \"x\""));
    }

    #[test]
    fn empty_line_q_and_eof_cancel() {
        let dir = workspace();
        for answers in ["\n", "q\n", ""] {
            assert_eq!(picker(dir.path(), answers).select_input_file().unwrap(), None);
        }
    }

    #[test]
    fn no_candidates_cancels() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(picker(dir.path(), "1\n").select_input_file().unwrap(), None);
    }

    #[test]
    fn clipboard_text_is_cleaned() {
        assert_eq!(
            path_from_clipboard_text("  \"C:\\rosters\\june.xlsx\"\n"),
            Some(PathBuf::from("C:\\rosters\\june.xlsx"))
        );
        assert_eq!(
            path_from_clipboard_text("'/tmp/june.xlsx'"),
            Some(PathBuf::from("/tmp/june.xlsx"))
        );
        assert_eq!(path_from_clipboard_text(" \n "), None);
        assert_eq!(path_from_clipboard_text("\"\""), None);
    }

    #[test]
    fn preselected_returns_its_path() {
        let mut s = Preselected(Some(PathBuf::from("roster.xlsx")));
        assert_eq!(s.select_input_file().unwrap(), Some(PathBuf::from("roster.xlsx")));
        assert_eq!(Preselected(None).select_input_file().unwrap(), None);
    }
}
