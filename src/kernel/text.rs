//! Rope position helpers shared by the editor adapter and completion context.

use ropey::{Rope, RopeSlice};

use crate::kernel::services::ports::Position;

/// Chars on a line, excluding its `\n` / `\r\n` terminator.
pub fn line_len_chars(line: RopeSlice<'_>) -> usize {
    let mut len = 0usize;
    let mut it = line.chars().peekable();
    while let Some(ch) = it.next() {
        if ch == '\n' {
            break;
        }
        if ch == '\r' && matches!(it.peek(), Some('\n')) {
            break;
        }
        len += 1;
    }
    len
}

/// Clamps `position` into the rope: past-the-end lines land on the last line,
/// past-the-end columns on the line's end.
pub fn clamp_position(rope: &Rope, position: Position) -> Position {
    let last_line = rope.len_lines().saturating_sub(1);
    let line = (position.line as usize).min(last_line);
    let column = (position.column as usize).min(line_len_chars(rope.line(line)));
    Position::new(line as u32, column as u32)
}

pub fn position_to_char(rope: &Rope, position: Position) -> usize {
    let clamped = clamp_position(rope, position);
    rope.line_to_char(clamped.line as usize) + clamped.column as usize
}

pub fn char_to_position(rope: &Rope, char_idx: usize) -> Position {
    let char_idx = char_idx.min(rope.len_chars());
    let line = rope.char_to_line(char_idx);
    let column = char_idx - rope.line_to_char(line);
    Position::new(line as u32, column as u32)
}
