//! Distinguished name helpers
//!
//! Just enough of RFC 4514 to pull names out of DNs and compare them:
//! backslash escapes (`\,` and hex pairs such as `\2C`) are honoured when
//! splitting and unescaping.

/// Split on `sep` wherever it is not escaped with a backslash
fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == sep {
            parts.push(&input[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn is_attribute_type(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Split a DN into its RDN components, trimmed
pub fn split_rdns(dn: &str) -> Vec<&str> {
    split_unescaped(dn, ',').into_iter().map(str::trim).collect()
}

/// Whether `identifier` looks like a DN (`cn=admins,...`) rather than a plain name
pub fn is_distinguished_name(identifier: &str) -> bool {
    let first = match split_rdns(identifier).into_iter().next() {
        Some(rdn) => rdn,
        None => return false,
    };

    match first.split_once('=') {
        Some((attr, value)) => is_attribute_type(attr.trim()) && !value.trim().is_empty(),
        None => false,
    }
}

/// Resolve backslash escapes in an attribute value
pub fn unescape_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok());
            match hex {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(bytes[i + 1]);
                    i += 2;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Value of the first attribute of the first RDN
///
/// `CN=Smith\, John,OU=People,DC=example` yields `Smith, John`.
pub fn first_rdn_value(dn: &str) -> Option<String> {
    let rdn = split_rdns(dn).into_iter().next()?;
    let ava = split_unescaped(rdn, '+').into_iter().next()?;
    let (attr, value) = ava.split_once('=')?;
    if !is_attribute_type(attr.trim()) {
        return None;
    }
    Some(unescape_value(value.trim()))
}

/// Escape the characters that would read as structure in a normalised DN
fn escape_separators(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | ',' | '+') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Canonical form for comparing DNs: lowercased, no padding around separators
///
/// Escaped separators inside values stay escaped, so `cn=a\,ou=x` is one RDN.
pub fn normalize_dn(dn: &str) -> String {
    split_rdns(dn)
        .into_iter()
        .map(|rdn| {
            split_unescaped(rdn, '+')
                .into_iter()
                .map(|ava| match ava.split_once('=') {
                    Some((attr, value)) => format!(
                        "{}={}",
                        attr.trim().to_lowercase(),
                        escape_separators(&unescape_value(value.trim()).to_lowercase())
                    ),
                    None => ava.trim().to_lowercase(),
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Plain name behind an identifier: the first RDN value of a DN, else the identifier
pub fn display_name(identifier: &str) -> String {
    if is_distinguished_name(identifier) {
        if let Some(value) = first_rdn_value(identifier) {
            return value;
        }
    }
    identifier.to_string()
}

/// Directory equality for two group or user identifiers
///
/// Two DNs compare as whole normalised DNs. Otherwise the plain names are
/// compared case-insensitively, so `CN=Admins,OU=Groups` equals `admins`.
pub fn identifiers_equal(a: &str, b: &str) -> bool {
    if is_distinguished_name(a) && is_distinguished_name(b) {
        return normalize_dn(a) == normalize_dn(b);
    }
    display_name(a).to_lowercase() == display_name(b).to_lowercase()
}
