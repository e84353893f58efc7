use crate::errors::DomainError;

/// Upper bound on a single token or string value.
const MAX_ITEM_LEN: usize = 8192;

/// Byte cursor over the raw config text with line tracking for error
/// positions.
pub(super) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    line: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, line: 1 }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if self.buf.get(self.pos) == Some(&b'\n') {
            self.line += 1;
        }
        self.pos += 1;
    }

    pub fn error(&self, msg: impl Into<String>) -> DomainError {
        DomainError::at_line(self.line, msg)
    }

    pub fn eof_error(&self) -> DomainError {
        DomainError::at_line(self.line, "unexpected end of file")
    }

    /// Skip spaces, tabs and line endings.
    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    /// Skip whitespace but treat end of input as a hard error (used inside a
    /// section, where something must still follow).
    pub fn skip_ws_expect(&mut self) -> Result<(), DomainError> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.eof_error());
        }
        Ok(())
    }

    /// Consume one expected byte.
    pub fn expect(&mut self, byte: u8) -> Result<(), DomainError> {
        match self.peek() {
            Some(c) if c == byte => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!(
                "invalid character '{}', expected '{}'",
                c as char, byte as char
            ))),
            None => Err(self.eof_error()),
        }
    }

    fn push_item(&self, out: &mut Vec<u8>, byte: u8, what: &str) -> Result<(), DomainError> {
        if out.len() >= MAX_ITEM_LEN {
            return Err(self.error(format!("unreasonably long {what}")));
        }
        out.push(byte);
        Ok(())
    }

    /// Read a `[A-Za-z][A-Za-z0-9_]*` token.
    pub fn read_token(&mut self, what: &str) -> Result<String, DomainError> {
        let mut out = Vec::new();
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {}
            Some(c) => {
                return Err(self.error(format!(
                    "invalid {what}, unexpected character '{}'",
                    c as char
                )))
            }
            None => return Err(self.eof_error()),
        }
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == b'_') {
                break;
            }
            self.push_item(&mut out, c, what)?;
            self.bump();
        }
        // Tokens are plain ASCII; the conversion cannot fail.
        Ok(String::from_utf8(out).unwrap_or_default())
    }

    /// Read a `;`-terminated string value, quoted or bare.
    pub fn read_string(&mut self, what: &str) -> Result<String, DomainError> {
        let out = if self.peek() == Some(b'"') {
            self.read_quoted(what)?
        } else {
            self.read_bare(what)?
        };
        String::from_utf8(out).map_err(|_| self.error(format!("{what} is not valid UTF-8")))
    }

    /// One or more adjacent `"..."` segments, concatenated, then `;`.
    /// `\x` escapes any single character; a raw newline is forbidden.
    fn read_quoted(&mut self, what: &str) -> Result<Vec<u8>, DomainError> {
        let mut out = Vec::new();
        while self.peek() == Some(b'"') {
            self.bump();
            loop {
                let c = self.peek().ok_or_else(|| self.eof_error())?;
                match c {
                    b'\n' => return Err(self.error(format!("{what} must not contain EOL"))),
                    b'\\' => {
                        self.bump();
                        let escaped = self.peek().ok_or_else(|| self.eof_error())?;
                        if escaped == b'\n' {
                            return Err(self.error(format!("{what} must not contain EOL")));
                        }
                        self.push_item(&mut out, escaped, what)?;
                        self.bump();
                    }
                    b'"' => {
                        self.bump();
                        break;
                    }
                    _ => {
                        self.push_item(&mut out, c, what)?;
                        self.bump();
                    }
                }
            }
            self.skip_ws();
            if self.at_end() {
                return Err(self.eof_error());
            }
        }
        if self.peek() != Some(b';') {
            return Err(self.error(format!("{what} must end with a ';'")));
        }
        self.bump();
        Ok(out)
    }

    /// Printable characters up to `;`. `\` before a line ending swallows the
    /// following whitespace run (line continuation); any other `\x` is kept
    /// as `\x`.
    fn read_bare(&mut self, what: &str) -> Result<Vec<u8>, DomainError> {
        let mut out = Vec::new();
        let mut escaped = false;
        loop {
            let c = self.peek().ok_or_else(|| self.eof_error())?;
            if escaped {
                escaped = false;
                if c == b'\r' || c == b'\n' {
                    self.skip_ws();
                    continue;
                }
                self.push_item(&mut out, b'\\', what)?;
            }
            match c {
                b';' => {
                    self.bump();
                    break;
                }
                b'\\' => {
                    escaped = true;
                    self.bump();
                }
                b'\r' | b'\n' => {
                    return Err(self.error(format!("{what} must not contain EOL")))
                }
                b' ' | b'\t' => {
                    self.push_item(&mut out, c, what)?;
                    self.bump();
                }
                c if c.is_ascii_graphic() => {
                    self.push_item(&mut out, c, what)?;
                    self.bump();
                }
                c => {
                    return Err(self.error(format!(
                        "invalid character 0x{c:02x} in {what}"
                    )))
                }
            }
        }
        Ok(out)
    }
}
