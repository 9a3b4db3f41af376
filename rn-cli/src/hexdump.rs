//! Canonical hex+ASCII dump, addressed from the first byte read

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Render `data` as lines of `address  hex bytes  |ascii|`
pub fn hexdump(start: u16, data: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let address = usize::from(start) + line * BYTES_PER_LINE;
        let _ = write!(out, "{address:08x} ");

        for i in 0..BYTES_PER_LINE {
            if i == BYTES_PER_LINE / 2 {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => {
                    let _ = write!(out, " {byte:02x}");
                }
                None => out.push_str("   "),
            }
        }

        out.push_str("  |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}
