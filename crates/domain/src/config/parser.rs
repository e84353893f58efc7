use super::lexer::Cursor;
use crate::errors::DomainError;

/// One `name = value;` entry, with the line it started on for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParam {
    pub name: String,
    pub value: String,
    pub line: u32,
}

/// One `name { ... }` filter block.
#[derive(Debug, Clone)]
pub struct RawFilterSection {
    pub name: String,
    pub entries: Vec<RawParam>,
    pub line: u32,
}

/// The parsed section tree, before any registry validation.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub globals: Vec<RawParam>,
    pub filters: Vec<RawFilterSection>,
}

impl RawConfig {
    /// Last-one-wins lookup of a global parameter.
    pub fn global(&self, name: &str) -> Option<&str> {
        self.globals
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// Parse a whole config file.
pub fn parse(input: &[u8]) -> Result<RawConfig, DomainError> {
    let mut cur = Cursor::new(input);
    let mut config = RawConfig::default();

    loop {
        cur.skip_ws();
        if cur.at_end() {
            break;
        }

        let line = cur.line();
        let name = cur.read_token("section name")?;
        cur.skip_ws_expect()?;

        match cur.peek() {
            Some(b'=') => {
                cur.expect(b'=')?;
                cur.skip_ws_expect()?;
                let value = cur.read_string("parameter value")?;
                config.globals.push(RawParam { name, value, line });
            }
            Some(b'{') => {
                cur.expect(b'{')?;
                let entries = parse_filter_body(&mut cur)?;
                config.filters.push(RawFilterSection { name, entries, line });
            }
            Some(c) => {
                return Err(cur.error(format!(
                    "invalid character '{}', expected '=' or '{{'",
                    c as char
                )))
            }
            None => return Err(cur.eof_error()),
        }
    }

    Ok(config)
}

/// `(token WS string ';' WS)*` up to the closing `}`.
fn parse_filter_body(cur: &mut Cursor<'_>) -> Result<Vec<RawParam>, DomainError> {
    let mut entries = Vec::new();
    loop {
        cur.skip_ws_expect()?;
        if cur.peek() == Some(b'}') {
            cur.expect(b'}')?;
            return Ok(entries);
        }
        let line = cur.line();
        let name = cur.read_token("filter parameter name")?;
        cur.skip_ws_expect()?;
        let value = match cur.peek() {
            // `name = value;` and `name value;` are both accepted inside a
            // filter block.
            Some(b'=') => {
                cur.expect(b'=')?;
                cur.skip_ws_expect()?;
                cur.read_string("filter parameter value")?
            }
            _ => cur.read_string("filter parameter value")?,
        };
        entries.push(RawParam { name, value, line });
    }
}
