/// One `phone,message` record extracted from a fetched file.
///
/// Only the first comma splits, so the message may itself contain commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchLine {
    pub phone: String,
    pub message: String,
}

/// Parse a single line. Returns `None` for lines with no comma or with an
/// empty phone or message after trimming.
pub fn parse_line(line: &str) -> Option<DispatchLine> {
    let (phone, message) = line.split_once(',')?;
    let phone = phone.trim();
    let message = message.trim();
    if phone.is_empty() || message.is_empty() {
        return None;
    }
    Some(DispatchLine {
        phone: phone.to_string(),
        message: message.to_string(),
    })
}

/// Parse a decoded file body: newline-separated records, blank lines and
/// invalid records silently skipped.
pub fn parse_body(body: &str) -> Vec<DispatchLine> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect()
}
