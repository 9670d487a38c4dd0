/// Format a count with dot-separated thousands
///
/// # Examples
/// `1234567` -> `"1.234.567"`, `42` -> `"42"`
pub fn format_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }

    out
}
