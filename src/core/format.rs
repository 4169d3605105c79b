// Display-hint rendering for octet strings and integers (textual conventions).
use crate::core::value::hex_string;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct OctetSpec {
    repeat: bool,
    len: usize,
    kind: char,
    sep: Option<char>,
    term: Option<char>,
}

fn parse_octet_hint(hint: &str) -> Option<Vec<OctetSpec>> {
    let chars: Vec<char> = hint.chars().collect();
    let mut specs = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let repeat = chars[i] == '*';
        if repeat {
            i += 1;
        }
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if start == i {
            return None;
        }
        let len: usize = chars[start..i].iter().collect::<String>().parse().ok()?;
        if len == 0 {
            return None;
        }
        let kind = *chars.get(i)?;
        if !matches!(kind, 'a' | 't' | 'x' | 'd' | 'o') {
            return None;
        }
        i += 1;
        let sep = take_punct(&chars, &mut i);
        let term = if repeat { take_punct(&chars, &mut i) } else { None };
        specs.push(OctetSpec {
            repeat,
            len,
            kind,
            sep,
            term,
        });
    }
    if specs.is_empty() { None } else { Some(specs) }
}

fn take_punct(chars: &[char], i: &mut usize) -> Option<char> {
    let c = *chars.get(*i)?;
    if c.is_ascii_digit() || c == '*' {
        return None;
    }
    *i += 1;
    Some(c)
}

fn render_chunk(out: &mut String, kind: char, chunk: &[u8]) {
    match kind {
        'a' | 't' => out.push_str(&String::from_utf8_lossy(chunk)),
        'x' => out.push_str(&hex_string(chunk, "")),
        _ => {
            let number = chunk
                .iter()
                .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte));
            if kind == 'o' {
                out.push_str(&format!("{number:o}"));
            } else {
                out.push_str(&number.to_string());
            }
        }
    }
}

/// Renders `bytes` with an octet-string display hint such as `255a`, `1x:` or `1d.`.
/// Returns `None` when the hint does not parse.
pub fn render_octets(hint: &str, bytes: &[u8]) -> Option<String> {
    let specs = parse_octet_hint(hint)?;
    let last = specs.len() - 1;
    let mut out = String::new();
    let mut pos = 0;
    let mut spec_index = 0;
    while pos < bytes.len() {
        let spec = specs[spec_index.min(last)];
        let repeat = if spec.repeat {
            let count = usize::from(bytes[pos]);
            pos += 1;
            count
        } else {
            1
        };
        for round in 0..repeat {
            if pos >= bytes.len() {
                break;
            }
            let take = spec.len.min(bytes.len() - pos);
            render_chunk(&mut out, spec.kind, &bytes[pos..pos + take]);
            pos += take;
            let last_round = round + 1 == repeat;
            if pos < bytes.len()
                && let Some(sep) = spec.sep
                && !(last_round && spec.term.is_some())
            {
                out.push(sep);
            }
        }
        if pos < bytes.len()
            && let Some(term) = spec.term
        {
            out.push(term);
        }
        spec_index += 1;
    }
    Some(out)
}

/// Widest `d-N` accepted: the digit count of the largest integer magnitude.
const MAX_DECIMAL_PLACES: usize = 39;

/// Renders an integer with `d`, `d-N`, `x`, `o` or `b` hints.
pub fn render_integer(hint: &str, value: i128) -> Option<String> {
    let mut chars = hint.chars();
    let kind = chars.next()?;
    let rest: String = chars.collect();
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    match kind {
        'd' if rest.is_empty() => Some(value.to_string()),
        'd' => {
            let places: usize = rest.strip_prefix('-')?.parse().ok()?;
            if places == 0 {
                return Some(value.to_string());
            }
            if places > MAX_DECIMAL_PLACES {
                return None;
            }
            let digits = format!("{magnitude:0width$}", width = places + 1);
            let (whole, frac) = digits.split_at(digits.len() - places);
            Some(format!("{sign}{whole}.{frac}"))
        }
        'x' if rest.is_empty() => Some(format!("{sign}{magnitude:x}")),
        'o' if rest.is_empty() => Some(format!("{sign}{magnitude:o}")),
        'b' if rest.is_empty() => Some(format!("{sign}{magnitude:b}")),
        _ => None,
    }
}
