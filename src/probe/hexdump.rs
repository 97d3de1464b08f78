use std::fmt::Write;

const BYTES_PER_ROW: usize = 16;

/// Render `data` as offset / hex / ASCII rows for error diagnostics
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(BYTES_PER_ROW).enumerate() {
        let _ = write!(out, "{:08x}  ", row * BYTES_PER_ROW);
        for i in 0..BYTES_PER_ROW {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}
