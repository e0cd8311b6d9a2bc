//! SMS message segmentation (GSM 03.38 sizing).
//!
//! A message whose characters all fit the GSM-7 default alphabet occupies
//! 160 septets as a single message, or 153 per segment once the concatenation
//! header is needed; characters from the extension table cost two septets.
//! Anything outside GSM-7 forces UCS-2 encoding for the whole message:
//! 70 UTF-16 code units single, 67 per segment.

const GSM_SINGLE: usize = 160;
const GSM_MULTI: usize = 153;
const UCS2_SINGLE: usize = 70;
const UCS2_MULTI: usize = 67;

/// Septet cost of a char in the GSM-7 default alphabet, or `None` if the
/// char is not representable and the message must be sent as UCS-2.
fn gsm_septets(c: char) -> Option<usize> {
    match c {
        '0'..='9' | 'A'..='Z' | 'a'..='z' => Some(1),
        '@' | '£' | '$' | '¥' | 'è' | 'é' | 'ù' | 'ì' | 'ò' | 'Ç' | '\n' | 'Ø' | 'ø' | '\r'
        | 'Å' | 'å' | 'Δ' | '_' | 'Φ' | 'Γ' | 'Λ' | 'Ω' | 'Π' | 'Ψ' | 'Σ' | 'Θ' | 'Ξ' | 'Æ'
        | 'æ' | 'ß' | 'É' | ' ' | '!' | '"' | '#' | '¤' | '%' | '&' | '\'' | '(' | ')' | '*'
        | '+' | ',' | '-' | '.' | '/' | ':' | ';' | '<' | '=' | '>' | '?' | '¡' | 'Ä' | 'Ö'
        | 'Ñ' | 'Ü' | '§' | '¿' | 'ä' | 'ö' | 'ñ' | 'ü' | 'à' => Some(1),
        // Extension table: escape + char on the wire.
        '^' | '{' | '}' | '\\' | '[' | ']' | '~' | '|' | '€' => Some(2),
        _ => None,
    }
}

/// Split a message into provider-sized segments.
///
/// An empty message yields a single empty segment so the caller still sends
/// exactly one part.
pub fn split_message(message: &str) -> Vec<String> {
    if message.is_empty() {
        return vec![String::new()];
    }
    if message.chars().all(|c| gsm_septets(c).is_some()) {
        split_by_cost(message, GSM_SINGLE, GSM_MULTI, |c| {
            gsm_septets(c).unwrap_or(1)
        })
    } else {
        split_by_cost(message, UCS2_SINGLE, UCS2_MULTI, |c| c.len_utf16())
    }
}

/// Greedy packing by per-char cost. A char whose cost does not fit the
/// remaining budget starts the next segment, so extension pairs and
/// surrogate pairs are never split across a boundary.
fn split_by_cost(
    message: &str,
    single_limit: usize,
    multi_limit: usize,
    cost: impl Fn(char) -> usize,
) -> Vec<String> {
    let total: usize = message.chars().map(&cost).sum();
    if total <= single_limit {
        return vec![message.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut used = 0usize;
    for c in message.chars() {
        let c_cost = cost(c);
        if used + c_cost > multi_limit && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += c_cost;
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
