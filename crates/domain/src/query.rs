//! The policy request: the attribute map an MTA sends for one delivery
//! attempt, plus `${key}` template expansion for reply strings.

use crate::errors::DomainError;
use compact_str::CompactString;
use rustc_hash::FxHashMap;

/// One MTA policy request.
///
/// Attributes arrive as `key=value` lines terminated by a blank line; unknown
/// keys are kept verbatim so filters can match on anything the MTA sends.
#[derive(Debug, Clone, Default)]
pub struct PolicyQuery {
    attrs: FxHashMap<CompactString, String>,
}

impl PolicyQuery {
    /// Parse the MTA policy request format. Lines after the first blank line
    /// are ignored. A line without `=` makes the whole request unusable.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let mut attrs = FxHashMap::default();
        for line in input.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                DomainError::ParseQuery(format!("missing '=' in line {line:?}"))
            })?;
            attrs.insert(CompactString::new(key), value.to_string());
        }
        if attrs.is_empty() {
            return Err(DomainError::ParseQuery("empty request".into()));
        }
        Ok(Self { attrs })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn client_address(&self) -> &str {
        self.get_or_empty("client_address")
    }

    pub fn client_name(&self) -> &str {
        self.get_or_empty("client_name")
    }

    pub fn sender(&self) -> &str {
        self.get_or_empty("sender")
    }

    pub fn recipient(&self) -> &str {
        self.get_or_empty("recipient")
    }

    pub fn protocol_state(&self) -> &str {
        self.get_or_empty("protocol_state")
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Expand a reply template: `${key}` becomes the attribute value (empty
    /// when absent), `$$` a literal `$`. Any other `$` is left alone.
    pub fn format(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            if let Some(t) = tail.strip_prefix('$') {
                out.push('$');
                rest = t;
            } else if let Some(t) = tail.strip_prefix('{') {
                match t.find('}') {
                    Some(end) => {
                        if let Some(value) = self.get(&t[..end]) {
                            out.push_str(value);
                        }
                        rest = &t[end + 1..];
                    }
                    None => {
                        // Unterminated reference: keep the text as-is.
                        out.push('$');
                        rest = tail;
                    }
                }
            } else {
                out.push('$');
                rest = tail;
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes_until_blank_line() {
        let q = PolicyQuery::parse(
            "request=smtpd_access_policy\nclient_address=192.0.2.7\nsender=a@b\n\nignored=yes\n",
        )
        .unwrap();
        assert_eq!(q.client_address(), "192.0.2.7");
        assert_eq!(q.sender(), "a@b");
        assert_eq!(q.get("ignored"), None);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn missing_separator_is_fatal() {
        assert!(PolicyQuery::parse("client_address\n\n").is_err());
        assert!(PolicyQuery::parse("\n").is_err());
    }
}
