//
// utf16.rs
//
// LSP positions count columns in UTF-16 code units; buffers are UTF-8.
//

/// Convert a UTF-16 column offset (from LSP Position.character) to a byte
/// offset within the given line. Columns past the end clamp to the line length.
pub fn utf16_column_to_byte_offset(line: &str, utf16_col: u32) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_col as usize {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}
