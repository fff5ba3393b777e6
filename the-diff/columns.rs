//! Column conversions.
//!
//! The host addresses columns in chars while the external engine expects
//! UTF-8 byte offsets. Columns past the end of the line clamp to its length.

pub fn char_to_byte_col(line: &str, col: usize) -> usize {
  line.chars().take(col).map(char::len_utf8).sum()
}

/// Byte offsets that fall inside a multi-byte char round down to the start
/// of that char.
pub fn byte_to_char_col(line: &str, byte: usize) -> usize {
  line
    .char_indices()
    .take_while(|(idx, ch)| idx + ch.len_utf8() <= byte)
    .count()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ascii_columns_are_equal() {
    assert_eq!(char_to_byte_col("hello", 3), 3);
    assert_eq!(byte_to_char_col("hello", 3), 3);
  }

  #[test]
  fn multibyte_columns() {
    let line = "héllo";
    assert_eq!(char_to_byte_col(line, 2), 3);
    assert_eq!(byte_to_char_col(line, 3), 2);
    // inside 'é'
    assert_eq!(byte_to_char_col(line, 2), 1);
  }

  #[test]
  fn astral_chars_are_one_column_four_bytes() {
    let line = "a\u{1f600}b";
    assert_eq!(char_to_byte_col(line, 2), 5);
    assert_eq!(byte_to_char_col(line, 5), 2);
  }

  #[test]
  fn columns_clamp_to_line() {
    assert_eq!(char_to_byte_col("ab", 9), 2);
    assert_eq!(byte_to_char_col("ab", 9), 2);
  }
}
