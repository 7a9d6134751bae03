use futures::{AsyncBufRead, AsyncBufReadExt};

use crate::error::StreamError;

/// Default upper bound for a single line (1 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into newline-delimited lines with a length bound
pub struct LineDecoder<R> {
    reader: R,

    /// Bytes of the line being assembled
    pending: Vec<u8>,

    max_line_bytes: usize,

    /// EOF was reached and the final line handed out
    finished: bool,
}

impl<R> LineDecoder<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            max_line_bytes,
            finished: false,
        }
    }

    /// Read the next line, without its `\n` or `\r\n` terminator.
    ///
    /// Returns `Ok(None)` at end of stream. A final line without terminator is
    /// still returned. Partial input is kept across calls, so dropping the
    /// returned future between reads loses nothing.
    pub async fn next_line(&mut self) -> Result<Option<String>, StreamError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let available = self.reader.fill_buf().await?;

            if available.is_empty() {
                self.finished = true;
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let take = newline.unwrap_or(available.len());

            // A trailing `\r` is part of the terminator, not the line
            let ends_with_cr = match take {
                0 => self.pending.last() == Some(&b'\r'),
                n => available[n - 1] == b'\r',
            };
            let line_len = self.pending.len() + take - usize::from(ends_with_cr);

            if line_len > self.max_line_bytes {
                self.pending.clear();
                self.finished = true;
                return Err(StreamError::LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            self.pending.extend_from_slice(&available[..take]);

            match newline {
                Some(pos) => {
                    self.reader.consume_unpin(pos + 1);
                    return Ok(Some(self.take_line()));
                }
                None => self.reader.consume_unpin(take),
            }
        }
    }

    fn take_line(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}
