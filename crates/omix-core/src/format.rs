//! Display formatting for result rows.

use crate::models::ResultRow;

/// Shown instead of tiny p-values when high precision is off.
pub const P_VALUE_FLOOR_LABEL: &str = "p < .001";

const P_VALUE_FLOOR: f64 = 0.001;

/// Enough fraction digits to print any finite `f64` exactly.
const EXACT_DIGITS: usize = 1100;

/// Exponential notation with `digits` fraction digits and an explicitly
/// signed exponent (`5.000e-4`, `1.234e+2`).
///
/// Exact ties round away from zero, as JavaScript's `toExponential` does.
pub fn to_exponential(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    let exact = format!("{:.*e}", digits + EXACT_DIGITS, magnitude);
    let (mantissa, exp) = split_exponent(&exact);
    let significant: Vec<u8> = mantissa.bytes().filter(|b| *b != b'.').collect();
    let (kept, rest) = significant.split_at(digits + 1);

    let (kept, exp) = if is_tie(rest) {
        let mut kept = kept.to_vec();
        if round_up(&mut kept) {
            // 9.99..5 carried into a new leading digit.
            kept.insert(0, b'1');
            kept.pop();
            (kept, exp + 1)
        } else {
            (kept, exp)
        }
    } else {
        let rounded = format!("{:.*e}", digits, magnitude);
        let (mantissa, exp) = split_exponent(&rounded);
        (mantissa.bytes().filter(|b| *b != b'.').collect(), exp)
    };

    let mut out = String::from(sign);
    out.push(char::from(kept[0]));
    if digits > 0 {
        out.push('.');
        out.extend(kept[1..].iter().map(|b| char::from(*b)));
    }
    let exp_sign = if exp < 0 { '-' } else { '+' };
    out.push_str(&format!("e{exp_sign}{}", exp.unsigned_abs()));
    out
}

/// Fixed notation with `digits` fraction digits; exact ties round away from
/// zero, as JavaScript's `toFixed` does.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return to_exponential(value, 0);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    let exact = format!("{:.*}", digits + EXACT_DIGITS, magnitude);
    let point = exact.find('.').unwrap_or(exact.len());
    let cut = point + 1 + digits;
    if !is_tie(exact[cut..].as_bytes()) {
        return format!("{sign}{:.*}", digits, magnitude);
    }

    let mut kept: Vec<u8> = exact[..cut].bytes().filter(|b| *b != b'.').collect();
    if round_up(&mut kept) {
        kept.insert(0, b'1');
    }
    let int_len = kept.len() - digits;
    let mut out = String::from(sign);
    out.extend(kept[..int_len].iter().map(|b| char::from(*b)));
    if digits > 0 {
        out.push('.');
        out.extend(kept[int_len..].iter().map(|b| char::from(*b)));
    }
    out
}

fn split_exponent(formatted: &str) -> (&str, i32) {
    match formatted.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (formatted, 0),
    }
}

/// `true` when the dropped digits are exactly one half: a 5 then only zeros.
fn is_tie(rest: &[u8]) -> bool {
    matches!(rest.split_first(), Some((b'5', tail)) if tail.iter().all(|b| *b == b'0'))
}

/// Adds one unit in the last place. Returns `true` when every digit was a 9,
/// leaving all zeros and a carry out.
fn round_up(digits: &mut [u8]) -> bool {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return false;
        }
    }
    true
}

/// Renders a p-value for the results table.
///
/// Missing, zero and NaN values all render as `"0.0"`.
pub fn format_p_value(value: Option<f64>, high_precision: bool) -> String {
    match value {
        Some(v) if v != 0.0 && !v.is_nan() => {
            if !high_precision && v < P_VALUE_FLOOR {
                P_VALUE_FLOOR_LABEL.to_string()
            } else {
                to_exponential(v, 3)
            }
        }
        _ => "0.0".to_string(),
    }
}

pub fn format_correlation(value: f64) -> String {
    to_fixed(value, 4)
}

/// A result row with every numeric cell already rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    pub gene: String,
    pub gem: String,
    pub correlation: String,
    pub p_value: String,
    pub adjusted_p_value: String,
    pub gene_description: String,
}

impl RenderedRow {
    pub fn new(row: &ResultRow, high_precision: bool) -> Self {
        Self {
            gene: row.gene.clone(),
            gem: row.gem.clone(),
            correlation: format_correlation(row.correlation),
            p_value: format_p_value(row.p_value, high_precision),
            adjusted_p_value: format_p_value(row.adjusted_p_value, high_precision),
            gene_description: row
                .gene_extra
                .as_ref()
                .and_then(|g| g.description.clone())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}
