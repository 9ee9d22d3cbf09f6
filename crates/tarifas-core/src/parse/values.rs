//! Pure text → value parsers for the published tariff table.
//!
//! All parsers are total: text that cannot be interpreted yields `None`.

const KM_UNIT_TOKENS: [&str; 4] = ["kilómetros", "kilometros", "kms", "km"];

/// First run of ASCII digits, e.g. `"3 EJES"` → `3`.
pub fn parse_axles(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Route length rounded to whole kilometers.
pub fn parse_length_km(text: &str) -> Option<i64> {
    let mut s = text.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    for token in KM_UNIT_TOKENS {
        s = s.replace(token, "");
    }
    let s: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let s = collapse_dots(&s);
    let v = parse_finite(&s)?;
    Some(v.round() as i64)
}

/// Currency amount, e.g. `"$1,340.00"` → `1340.0`, `"228,50"` → `228.5`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let mut s: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();

    let commas = s.matches(',').count();
    let dots = s.matches('.').count();
    if commas > 0 && dots > 0 {
        s = s.replace(',', "");
    } else if commas == 1 && dots == 0 {
        s = s.replace(',', ".");
    }

    parse_finite(&collapse_dots(&s))
}

/// Keeps only the last dot as decimal point; earlier dots are thousands separators.
fn collapse_dots(s: &str) -> String {
    match s.rfind('.') {
        Some(last) if s[..last].contains('.') => {
            let int_part: String = s[..last].chars().filter(|c| *c != '.').collect();
            format!("{}{}", int_part, &s[last..])
        }
        _ => s.to_string(),
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
