//! Brazilian real amounts as typed by operators: `.` groups thousands and
//! `,` separates cents.

/// Normalizes a partially typed amount into `1.234,56` form.
///
/// Only digits and commas are kept. The first comma starts the fraction and
/// later commas are dropped. The fraction keeps at most two digits and a
/// trailing comma survives, so the output can be fed back while typing.
pub fn format_currency_br(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();

    let mut parts = cleaned.split(',');
    let integer = parts.next().unwrap_or_default();
    let fraction: Option<String> = if cleaned.contains(',') {
        Some(parts.collect::<String>().chars().take(2).collect())
    } else {
        None
    };

    let mut integer = integer.trim_start_matches('0');
    if integer.is_empty() && cleaned.starts_with('0') {
        integer = "0";
    }

    let integer = match (integer.is_empty(), &fraction) {
        (true, None) => return String::new(),
        (true, Some(_)) => "0",
        (false, _) => integer,
    };

    let grouped = group_thousands(integer);
    match fraction {
        Some(fraction) => format!("{},{}", grouped, fraction),
        None => grouped,
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push('.');
        }
        result.push(c);
    }
    result
}

/// Reads an amount in `1.234,56` form. Never fails: text without a leading
/// number yields `0.0`.
pub fn parse_currency_br(text: &str) -> f64 {
    let numeric = text.replace('.', "").replacen(',', ".", 1);
    leading_number(&numeric)
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Longest prefix of `text` (after leading whitespace) that reads as a
/// decimal number, e.g. `12.5abc` gives `12.5`.
fn leading_number(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut at: usize| {
        while at < bytes.len() && bytes[at].is_ascii_digit() {
            at += 1;
        }
        at
    };

    let mut end = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if has_digits || frac_end > end + 1 {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}
