use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

const DEFAULT_INITIALISMS: &[&str] = &[
    "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID", "IP",
    "JSON", "LHS", "QPS", "RAM", "RHS", "RPC", "SLA", "SMTP", "SQL", "SSH", "TCP", "TLS", "TTL",
    "UDP", "UI", "UID", "URI", "URL", "UTF8", "UUID", "VM", "XML", "XMPP", "XSRF", "XSS",
];

/// Naming convention table used to build exported identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Naming {
    /// Words rendered fully upper-case (`Id` becomes `ID`).
    pub initialisms: BTreeSet<String>,
    /// Exact overrides applied to a finished exported name.
    pub renames: BTreeMap<String, String>,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            initialisms: DEFAULT_INITIALISMS
                .iter()
                .map(|word| word.to_string())
                .collect(),
            renames: BTreeMap::new(),
        }
    }
}

impl Naming {
    /// Convert an arbitrary identifier into an exported PascalCase name.
    ///
    /// Returns `None` when the input has no alphanumeric content.
    pub fn exported(&self, raw: &str) -> Option<String> {
        let words = split_words(raw);
        if words.is_empty() {
            return None;
        }

        let mut name = String::new();
        for word in words {
            let upper = word.to_ascii_uppercase();
            if self.initialisms.contains(&upper) {
                name.push_str(&upper);
                continue;
            }
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(&chars.as_str().to_lowercase());
            }
        }

        if name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert(0, 'X');
        }

        Some(self.renames.get(&name).cloned().unwrap_or(name))
    }

    /// Convert a document stem or path segment into a module name.
    pub fn module(&self, raw: &str) -> Option<String> {
        let words = split_words(raw);
        if words.is_empty() {
            return None;
        }
        let mut module = words
            .iter()
            .map(|word| word.to_lowercase())
            .collect::<Vec<_>>()
            .join("");
        if module.starts_with(|c: char| c.is_ascii_digit()) {
            module.insert(0, 'm');
        }
        Some(module)
    }
}

/// Split an identifier on separators and case boundaries.
///
/// `HTTPServer_url-v2` splits into `HTTP`, `Server`, `url`, `v2`.
pub fn split_words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in raw.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (idx, ch) in chars.iter().enumerate() {
            let prev = idx.checked_sub(1).map(|prev| chars[prev]);
            let next = chars.get(idx + 1);
            let boundary = match prev {
                Some(prev) if ch.is_uppercase() => {
                    prev.is_lowercase()
                        || prev.is_ascii_digit()
                        || (prev.is_uppercase() && next.is_some_and(|next| next.is_lowercase()))
                }
                _ => false,
            };
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(*ch);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}
