//
// changes.rs
//
// Whole-line change descriptors: splicing them into content and describing
// them as incremental LSP content changes
//

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent, TextEdit};

use crate::utf16::utf16_column_to_byte_offset;

/// Replace lines `[start_line, end_line)` (1-based) with `lines`.
///
/// Offsets are interpreted against the content as it stands after every
/// earlier descriptor in the same list has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    #[serde(rename = "lnum")]
    pub start_line: u32,
    #[serde(rename = "end")]
    pub end_line: u32,
    #[serde(default)]
    pub lines: Vec<String>,
}

impl ChangeDescriptor {
    pub fn new(start_line: u32, end_line: u32, lines: Vec<String>) -> Self {
        Self {
            start_line,
            end_line,
            lines,
        }
    }

    /// The incremental change event for this descriptor.
    ///
    /// Columns are always 0: changes cover whole lines.
    pub fn to_content_change(&self) -> TextDocumentContentChangeEvent {
        let text = if self.lines.is_empty() {
            String::new()
        } else {
            let mut text = self.lines.join("\n");
            text.push('\n');
            text
        };
        TextDocumentContentChangeEvent {
            range: Some(Range::new(
                Position::new(self.start_line.saturating_sub(1), 0),
                Position::new(self.end_line.saturating_sub(1), 0),
            )),
            range_length: None,
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    #[error("change {index} replaces lines [{start_line}, {end_line}) of a {line_count}-line buffer")]
    OutOfRange {
        index: usize,
        start_line: u32,
        end_line: u32,
        line_count: usize,
    },
    #[error("edit position {line}:{character} is outside the buffer")]
    EditOutOfRange { line: u32, character: u32 },
}

/// Content reconstructed from a descriptor list, with its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub content: String,
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

/// Split content into lines, dropping the single trailing terminator.
pub(crate) fn split_lines(content: &str) -> Vec<String> {
    content
        .strip_suffix('\n')
        .unwrap_or(content)
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Join lines and restore the trailing terminator.
pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut content = lines.join("\n");
    content.push('\n');
    content
}

fn splice(lines: &mut Vec<String>, index: usize, change: &ChangeDescriptor) -> Result<(), ChangeError> {
    let start = change.start_line as usize;
    let end = change.end_line as usize;
    if start == 0 || end < start || end > lines.len() + 1 {
        return Err(ChangeError::OutOfRange {
            index,
            start_line: change.start_line,
            end_line: change.end_line,
            line_count: lines.len(),
        });
    }
    lines.splice(start - 1..end - 1, change.lines.iter().cloned());
    Ok(())
}

/// Apply `changes` in order to `prior` content.
///
/// Every descriptor is validated against the sequence it applies to; an
/// invalid one fails the whole translation and nothing is returned.
pub fn translate(prior: &str, changes: &[ChangeDescriptor]) -> Result<Translation, ChangeError> {
    let mut lines = split_lines(prior);
    let mut content_changes = Vec::with_capacity(changes.len());
    for (index, change) in changes.iter().enumerate() {
        splice(&mut lines, index, change)?;
        content_changes.push(change.to_content_change());
    }
    Ok(Translation {
        content: join_lines(&lines),
        content_changes,
    })
}

/// Convert LSP text edits into whole-line descriptors.
///
/// Edit positions all refer to `content` as given and must not overlap. The
/// edits are applied bottom-up, so each descriptor's line numbers stay valid
/// for the sequence left by the ones before it. Edits that change nothing
/// produce no descriptor.
pub fn text_edits_to_descriptors(
    content: &str,
    edits: &[TextEdit],
) -> Result<Vec<ChangeDescriptor>, ChangeError> {
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    // Stable sort keeps insertions at the same position in their given order
    // once reversed below.
    ordered.sort_by_key(|edit| (edit.range.start.line, edit.range.start.character));

    let mut lines = split_lines(content);
    let mut descriptors = Vec::with_capacity(ordered.len());
    for edit in ordered.into_iter().rev() {
        let Some(descriptor) = edit_to_descriptor(&lines, edit)? else {
            continue;
        };
        splice(&mut lines, descriptors.len(), &descriptor)?;
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

fn edit_to_descriptor(
    lines: &[String],
    edit: &TextEdit,
) -> Result<Option<ChangeDescriptor>, ChangeError> {
    let start = edit.range.start;
    let end = edit.range.end;
    let out_of_range = |pos: Position| ChangeError::EditOutOfRange {
        line: pos.line,
        character: pos.character,
    };

    let (sl, el) = (start.line as usize, end.line as usize);
    // One past the last line is addressable only at column 0 (end of buffer)
    if sl > lines.len() || (sl == lines.len() && start.character != 0) {
        return Err(out_of_range(start));
    }
    if el > lines.len() || (el == lines.len() && end.character != 0) {
        return Err(out_of_range(end));
    }
    if (el, end.character) < (sl, start.character) {
        return Err(out_of_range(end));
    }
    if start == end && edit.new_text.is_empty() {
        return Ok(None);
    }

    let start_line = lines.get(sl).map(String::as_str).unwrap_or("");
    let prefix = &start_line[..utf16_column_to_byte_offset(start_line, start.character)];
    let mut replaced = format!("{prefix}{}", edit.new_text);

    // An edit ending at column 0 whose replacement ends on a line boundary
    // leaves the end line untouched.
    let ends_on_boundary = end.character == 0
        && (el > sl || el == lines.len() || start.character == 0)
        && (replaced.is_empty() || replaced.ends_with('\n'));

    let end_excl = if ends_on_boundary {
        replaced.pop();
        el
    } else if el < lines.len() {
        let end_line = &lines[el];
        replaced.push_str(&end_line[utf16_column_to_byte_offset(end_line, end.character)..]);
        el + 1
    } else {
        // Text appended after the final line without a terminator becomes a
        // line of its own.
        el
    };

    // Whole lines removed with nothing in their place
    let new_lines = if ends_on_boundary && replaced.is_empty() && edit.new_text.is_empty() {
        Vec::new()
    } else {
        replaced.split('\n').map(str::to_string).collect()
    };

    Ok(Some(ChangeDescriptor::new(
        sl as u32 + 1,
        end_excl as u32 + 1,
        new_lines,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn edit(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextEdit {
        TextEdit::new(
            Range::new(Position::new(sl, sc), Position::new(el, ec)),
            text.to_string(),
        )
    }

    fn apply_edits(content: &str, edits: &[TextEdit]) -> String {
        let descriptors = text_edits_to_descriptors(content, edits).unwrap();
        translate(content, &descriptors).unwrap().content
    }

    #[test]
    fn test_replace_first_line_scenario() {
        let change = ChangeDescriptor::new(1, 2, lines(&["package main", "", "func main() {}"]));
        let result = translate("package main\n", &[change]).unwrap();

        assert_eq!(result.content, "package main\n\nfunc main() {}\n");
        assert_eq!(result.content_changes.len(), 1);
        let event = &result.content_changes[0];
        assert_eq!(
            event.range,
            Some(Range::new(Position::new(0, 0), Position::new(1, 0)))
        );
        assert_eq!(event.text, "package main\n\nfunc main() {}\n");
    }

    #[test]
    fn test_deletion_has_empty_text() {
        let change = ChangeDescriptor::new(2, 3, Vec::new());
        let result = translate("a\nb\nc\n", &[change]).unwrap();

        assert_eq!(result.content, "a\nc\n");
        assert_eq!(result.content_changes[0].text, "");
        assert_eq!(
            result.content_changes[0].range,
            Some(Range::new(Position::new(1, 0), Position::new(2, 0)))
        );
    }

    #[test]
    fn test_later_changes_see_earlier_splices() {
        let changes = vec![
            ChangeDescriptor::new(1, 1, lines(&["// header"])),
            // Line 2 is the original line 1 now
            ChangeDescriptor::new(2, 3, lines(&["package other"])),
        ];
        let result = translate("package main\nvar x = 1\n", &changes).unwrap();
        assert_eq!(result.content, "// header\npackage other\nvar x = 1\n");
    }

    #[test]
    fn test_append_after_last_line() {
        let change = ChangeDescriptor::new(2, 2, lines(&["func f() {}"]));
        let result = translate("package main\n", &[change]).unwrap();
        assert_eq!(result.content, "package main\nfunc f() {}\n");
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = translate("a\n", &[ChangeDescriptor::new(1, 4, Vec::new())]).unwrap_err();
        assert!(matches!(err, ChangeError::OutOfRange { line_count: 1, .. }));
        assert!(translate("a\n", &[ChangeDescriptor::new(0, 1, Vec::new())]).is_err());
        assert!(translate("a\n", &[ChangeDescriptor::new(2, 1, Vec::new())]).is_err());
    }

    #[test]
    fn test_empty_list_returns_prior_content() {
        let result = translate("a\nb\n", &[]).unwrap();
        assert_eq!(result.content, "a\nb\n");
        assert!(result.content_changes.is_empty());
    }

    #[test]
    fn test_text_edit_within_line() {
        let content = "package main\n\nfunc foo() {}\n";
        assert_eq!(
            apply_edits(content, &[edit(2, 5, 2, 8, "bar")]),
            "package main\n\nfunc bar() {}\n"
        );
    }

    #[test]
    fn test_text_edits_on_same_line_use_original_positions() {
        let content = "x := foo(foo)\n";
        let edits = [edit(0, 5, 0, 8, "bar"), edit(0, 9, 0, 12, "bar")];
        assert_eq!(apply_edits(content, &edits), "x := bar(bar)\n");
    }

    #[test]
    fn test_text_edit_deletes_whole_lines() {
        let content = "a\nb\nc\n";
        let descriptors = text_edits_to_descriptors(content, &[edit(1, 0, 2, 0, "")]).unwrap();
        assert_eq!(descriptors, vec![ChangeDescriptor::new(2, 3, Vec::new())]);
        assert_eq!(translate(content, &descriptors).unwrap().content, "a\nc\n");
    }

    #[test]
    fn test_text_edit_inserts_lines_at_column_zero() {
        let content = "package main\nfunc f() {}\n";
        let descriptors =
            text_edits_to_descriptors(content, &[edit(1, 0, 1, 0, "import \"fmt\"\n\n")]).unwrap();
        assert_eq!(
            descriptors,
            vec![ChangeDescriptor::new(2, 2, lines(&["import \"fmt\"", ""]))]
        );
        assert_eq!(
            translate(content, &descriptors).unwrap().content,
            "package main\nimport \"fmt\"\n\nfunc f() {}\n"
        );
    }

    #[test]
    fn test_text_edit_joins_lines() {
        let content = "a\nb\n";
        assert_eq!(apply_edits(content, &[edit(0, 1, 1, 0, " ")]), "a b\n");
    }

    #[test]
    fn test_text_edit_at_end_of_buffer() {
        let content = "package main\n";
        assert_eq!(
            apply_edits(content, &[edit(1, 0, 1, 0, "func f() {}\n")]),
            "package main\nfunc f() {}\n"
        );
        assert_eq!(
            apply_edits(content, &[edit(1, 0, 1, 0, "var x int")]),
            "package main\nvar x int\n"
        );
    }

    #[test]
    fn test_text_edit_delete_to_end_of_buffer() {
        let content = "a\nb\nc\n";
        assert_eq!(apply_edits(content, &[edit(1, 0, 3, 0, "")]), "a\n");
    }

    #[test]
    fn test_text_edit_clears_line_content() {
        let content = "hello\nworld\n";
        assert_eq!(apply_edits(content, &[edit(0, 0, 0, 5, "")]), "\nworld\n");
    }

    #[test]
    fn test_text_edit_out_of_range() {
        let err = text_edits_to_descriptors("a\n", &[edit(3, 0, 3, 0, "x")]).unwrap_err();
        assert_eq!(err, ChangeError::EditOutOfRange { line: 3, character: 0 });
        assert!(text_edits_to_descriptors("a\n", &[edit(0, 0, 1, 2, "x")]).is_err());
    }

    #[test]
    fn test_no_op_edit_is_skipped() {
        assert!(text_edits_to_descriptors("a\n", &[edit(0, 1, 0, 1, "")])
            .unwrap()
            .is_empty());
    }
}
