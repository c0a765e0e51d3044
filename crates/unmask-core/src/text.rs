//! Text position utilities for byte offset and line:column conversions.
//!
//! Lines and columns are 1-indexed (editor convention); byte offsets are
//! 0-indexed. Columns count bytes, which matches the byte-offset spans the
//! rewrite engine works in.

// ============================================================================
// Conversions
// ============================================================================

/// Convert a byte offset to 1-indexed line and column.
///
/// If `offset` exceeds content length, returns the position at end of content.
pub fn byte_offset_to_position(content: &[u8], offset: usize) -> (u32, u32) {
    let offset = offset.min(content.len());
    let mut line = 1u32;
    let mut col = 1u32;

    for &byte in content.iter().take(offset) {
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Convert 1-indexed line and column to a byte offset.
///
/// Positions beyond the content clamp to the content length; a column past
/// the end of its line clamps to the line end.
pub fn position_to_byte_offset(content: &[u8], line: u32, col: u32) -> usize {
    let line = line.max(1);
    let col = col.max(1);

    let mut current_line = 1u32;

    for (i, &byte) in content.iter().enumerate() {
        if current_line == line {
            let offset_in_line = (col as usize).saturating_sub(1);
            let line_end = content[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|p| i + p)
                .unwrap_or(content.len());
            let max_offset = line_end - i;
            return i + offset_in_line.min(max_offset);
        }
        if byte == b'\n' {
            current_line += 1;
        }
    }

    content.len()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_to_position_first_line() {
        let content = b"class a {\n    int b;\n}\n";
        assert_eq!(byte_offset_to_position(content, 0), (1, 1));
        assert_eq!(byte_offset_to_position(content, 6), (1, 7));
    }

    #[test]
    fn offset_to_position_later_line() {
        let content = b"class a {\n    int b;\n}\n";
        // "int" starts at byte 14 (line 2, col 5)
        assert_eq!(byte_offset_to_position(content, 14), (2, 5));
    }

    #[test]
    fn offset_past_end_clamps() {
        let content = b"ab";
        assert_eq!(byte_offset_to_position(content, 100), (1, 3));
    }

    #[test]
    fn position_to_offset_round_trip() {
        let content = b"class a {\n    int b;\n}\n";
        let offset = position_to_byte_offset(content, 2, 5);
        assert_eq!(offset, 14);
        assert_eq!(byte_offset_to_position(content, offset), (2, 5));
    }

    #[test]
    fn position_past_line_end_clamps_to_line_end() {
        let content = b"ab\ncd\n";
        assert_eq!(position_to_byte_offset(content, 1, 99), 2);
    }

    #[test]
    fn zero_line_and_col_treated_as_one() {
        let content = b"xy";
        assert_eq!(position_to_byte_offset(content, 0, 0), 0);
    }
}
