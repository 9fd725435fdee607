/// Longest line kept before the accumulator gives up and resynchronises.
pub const MAX_LINE_LEN: usize = 512;

/// Accumulates raw bytes and splits them into `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    acc: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.acc.extend_from_slice(bytes);
    }

    /// Pop the next complete line, if any. A trailing `\r` is dropped and
    /// invalid UTF-8 is replaced, never rejected here.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = self.acc.iter().position(|&b| b == b'\n') else {
                if self.acc.len() > MAX_LINE_LEN {
                    // No terminator in sight; drop the garbage and skip to the next '\n'
                    self.acc.clear();
                    self.discarding = true;
                }
                return None;
            };
            let line = self.acc.drain(..=pos).collect::<Vec<u8>>();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            return Some(String::from_utf8_lossy(&line[..end]).into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_crlf_across_reads() {
        let mut buf = LineBuffer::new();
        buf.extend(b"c090s002g00");
        assert_eq!(buf.next_line(), None);
        buf.extend(b"7t074\r\nsecond\r");
        assert_eq!(buf.next_line().as_deref(), Some("c090s002g007t074"));
        assert_eq!(buf.next_line(), None);
        buf.extend(b"\n\r\n");
        assert_eq!(buf.next_line().as_deref(), Some("second"));
        assert_eq!(buf.next_line().as_deref(), Some(""));
        assert_eq!(buf.next_line(), None);
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut buf = LineBuffer::new();
        buf.extend(&[b'x'; MAX_LINE_LEN + 1]);
        assert_eq!(buf.next_line(), None);
        buf.extend(b"tail of garbage\r\nok\r\n");
        assert_eq!(buf.next_line().as_deref(), Some("ok"));
    }
}
