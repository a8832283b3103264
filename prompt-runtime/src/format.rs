//! Format-spec mini-language applied to placeholder values.
//!
//! Specs follow the `[[fill]align][sign][z][#][0][width][grouping][.precision][type]`
//! grammar used by keyword string formatting, so a template extracted from an
//! interpolated literal renders exactly like the literal did.

use crate::value::TemplateValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Sign {
    #[default]
    Negative,
    Always,
    Space,
}

/// Parsed format spec of one placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Sign,
    coerce_zero: bool,
    alternate: bool,
    zero_pad: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

const TYPE_CODES: &str = "bcdeEfFgGnosxX%";

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

fn parse_number(chars: &[char], start: usize) -> Result<(Option<usize>, usize), String> {
    let end = chars[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(chars.len(), |offset| start + offset);
    if end == start {
        return Ok((None, start));
    }
    let digits: String = chars[start..end].iter().collect();
    digits
        .parse()
        .map(|n| (Some(n), end))
        .map_err(|_| "too many decimal digits in format string".to_owned())
}

impl FormatSpec {
    /// Parses the text after the `:` of a placeholder.
    pub(crate) fn parse(spec: &str) -> Result<Self, String> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = Self::default();
        let mut i = 0;

        if let Some(align) = chars.get(1).copied().and_then(align_of) {
            out.fill = Some(chars[0]);
            out.align = Some(align);
            i = 2;
        } else if let Some(align) = chars.first().copied().and_then(align_of) {
            out.align = Some(align);
            i = 1;
        }

        let sign = match chars.get(i) {
            Some('+') => Some(Sign::Always),
            Some('-') => Some(Sign::Negative),
            Some(' ') => Some(Sign::Space),
            _ => None,
        };
        if let Some(sign) = sign {
            out.sign = sign;
            i += 1;
        }
        if chars.get(i) == Some(&'z') {
            out.coerce_zero = true;
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            out.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero_pad = true;
            i += 1;
        }

        let (width, next) = parse_number(&chars, i)?;
        out.width = width.unwrap_or(0);
        i = next;

        if let Some(&sep @ (',' | '_')) = chars.get(i) {
            out.grouping = Some(sep);
            i += 1;
        }

        if chars.get(i) == Some(&'.') {
            let (precision, next) = parse_number(&chars, i + 1)?;
            out.precision = Some(precision.ok_or("format specifier missing precision")?);
            i = next;
        }

        match &chars[i..] {
            [] => {}
            [kind] if TYPE_CODES.contains(*kind) => out.kind = Some(*kind),
            _ => return Err(format!("invalid format specifier '{spec}'")),
        }

        Ok(out)
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn fill(&self) -> char {
        self.fill.unwrap_or(if self.zero_pad { '0' } else { ' ' })
    }

    fn align_or(&self, default: Align) -> Align {
        self.align
            .unwrap_or(if self.zero_pad { Align::AfterSign } else { default })
    }

    /// Width left for grouped digits when zero padding goes between them,
    /// given `reserved` characters of sign, prefix and fraction.
    fn zero_filled_digits(&self, reserved: usize) -> Option<usize> {
        (self.fill() == '0' && self.align_or(Align::Right) == Align::AfterSign)
            .then(|| self.width.saturating_sub(reserved))
    }
}

/// Renders `value` according to `spec`.
pub(crate) fn format_value(value: &TemplateValue, spec: &FormatSpec) -> Result<String, String> {
    match value {
        TemplateValue::Str(text) => format_str(text, spec),
        TemplateValue::None if spec.is_empty() => Ok("None".to_owned()),
        TemplateValue::None => Err("unsupported format string passed to None".to_owned()),
        TemplateValue::Bool(flag) if spec.is_empty() => {
            Ok(if *flag { "True" } else { "False" }.to_owned())
        }
        TemplateValue::Bool(flag) => format_int(i64::from(*flag), spec),
        TemplateValue::Int(number) => format_int(*number, spec),
        TemplateValue::Float(number) => format_float(*number, spec),
    }
}

fn format_str(text: &str, spec: &FormatSpec) -> Result<String, String> {
    if let Some(kind) = spec.kind.filter(|kind| *kind != 's') {
        return Err(format!("unknown format code '{kind}' for a string value"));
    }
    if spec.sign != Sign::Negative {
        return Err("sign not allowed in string format specifier".to_owned());
    }
    if spec.alternate {
        return Err("alternate form (#) not allowed in string format specifier".to_owned());
    }
    if spec.grouping.is_some() {
        return Err("cannot specify a grouping separator with a string value".to_owned());
    }
    if spec.align == Some(Align::AfterSign) {
        return Err("'=' alignment not allowed in string format specifier".to_owned());
    }

    let body: String = match spec.precision {
        Some(limit) => text.chars().take(limit).collect(),
        None => text.to_owned(),
    };
    Ok(pad("", &body, spec.width, spec.fill(), spec.align.unwrap_or(Align::Left)))
}

#[allow(clippy::cast_precision_loss)]
fn format_int(number: i64, spec: &FormatSpec) -> Result<String, String> {
    if matches!(spec.kind, Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%')) {
        return format_float(number as f64, spec);
    }
    if spec.precision.is_some() {
        return Err("precision not allowed in integer format specifier".to_owned());
    }

    let magnitude = number.unsigned_abs();
    let (prefix, digits, group_size) = match spec.kind {
        None | Some('d' | 'n') => ("", magnitude.to_string(), 3),
        Some('b') => ("0b", format!("{magnitude:b}"), 4),
        Some('o') => ("0o", format!("{magnitude:o}"), 4),
        Some('x') => ("0x", format!("{magnitude:x}"), 4),
        Some('X') => ("0X", format!("{magnitude:X}"), 4),
        Some('c') => {
            if spec.sign != Sign::Negative || spec.alternate {
                return Err("sign or alternate form not allowed with integer format specifier 'c'".to_owned());
            }
            let ch = u32::try_from(number)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("%c arg not in range: {number}"))?;
            return Ok(pad("", &ch.to_string(), spec.width, spec.fill(), spec.align.unwrap_or(Align::Right)));
        }
        Some(kind) => return Err(format!("unknown format code '{kind}' for an integer value")),
    };

    let digits = match spec.grouping {
        Some(',') if group_size != 3 => {
            return Err("cannot specify ',' with a non-decimal integer type".to_owned());
        }
        Some(separator) => {
            let shown = if spec.alternate { prefix.len() } else { 0 };
            let reserved = sign_of(number < 0, spec).len() + shown;
            let min_len = spec.zero_filled_digits(reserved).unwrap_or(0);
            group(&digits, separator, group_size, min_len)
        }
        None => digits,
    };
    let prefix = if spec.alternate { prefix } else { "" };
    Ok(finish_number(number < 0, prefix, &digits, spec))
}

fn format_float(number: f64, spec: &FormatSpec) -> Result<String, String> {
    if let Some(kind) = spec.kind.filter(|kind| !matches!(kind, 'e' | 'E' | 'f' | 'F' | 'g' | 'G' | 'n' | '%')) {
        return Err(format!("unknown format code '{kind}' for a float value"));
    }

    let mut negative = number.is_sign_negative() && !number.is_nan();
    let magnitude = number.abs();
    let upper = matches!(spec.kind, Some('E' | 'F' | 'G'));

    let mut body = if magnitude.is_finite() {
        match (spec.kind, spec.precision) {
            (Some('f' | 'F'), precision) => fixed(magnitude, precision.unwrap_or(6), spec.alternate),
            (Some('e' | 'E'), precision) => scientific(magnitude, precision.unwrap_or(6), spec.alternate, upper),
            (Some('g' | 'G' | 'n'), precision) => {
                general(magnitude, precision.unwrap_or(6), spec.alternate, upper, false)
            }
            (Some('%'), precision) => {
                fixed(magnitude * 100.0, precision.unwrap_or(6), spec.alternate) + "%"
            }
            (_, Some(precision)) => general(magnitude, precision, spec.alternate, false, true),
            (_, None) => shortest(magnitude),
        }
    } else {
        let word = if magnitude.is_nan() { "nan" } else { "inf" };
        let word = if upper { word.to_uppercase() } else { word.to_owned() };
        if spec.kind == Some('%') { word + "%" } else { word }
    };

    if spec.coerce_zero && body.chars().all(|c| !c.is_ascii_digit() || c == '0') {
        negative = false;
    }

    if let Some(separator) = spec.grouping {
        let int_len = body.bytes().take_while(u8::is_ascii_digit).count();
        if int_len > 0 {
            let reserved = sign_of(negative, spec).len() + body.len() - int_len;
            let min_len = spec.zero_filled_digits(reserved).unwrap_or(0);
            body = group(&body[..int_len], separator, 3, min_len) + &body[int_len..];
        }
    }

    Ok(finish_number(negative, "", &body, spec))
}

fn fixed(magnitude: f64, precision: usize, alternate: bool) -> String {
    let mut out = format!("{magnitude:.precision$}");
    if precision == 0 && alternate {
        out.push('.');
    }
    out
}

fn split_exponent(rendered: &str) -> (&str, i32) {
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse().unwrap_or(0)),
        None => (rendered, 0),
    }
}

fn exponent_suffix(exponent: i32, upper: bool) -> String {
    let sign = if exponent < 0 { '-' } else { '+' };
    let marker = if upper { 'E' } else { 'e' };
    format!("{marker}{sign}{:02}", exponent.unsigned_abs())
}

fn scientific(magnitude: f64, precision: usize, alternate: bool, upper: bool) -> String {
    let rendered = format!("{magnitude:.precision$e}");
    let (mantissa, exponent) = split_exponent(&rendered);
    let mut out = mantissa.to_owned();
    if precision == 0 && alternate {
        out.push('.');
    }
    out + &exponent_suffix(exponent, upper)
}

/// General format (`g`), or the untyped form with a precision when
/// `untyped` is set: the latter switches to scientific notation one digit
/// earlier and always keeps a digit after the decimal point.
fn general(magnitude: f64, precision: usize, alternate: bool, upper: bool, untyped: bool) -> String {
    let precision = precision.max(1);
    let exponent = if magnitude == 0.0 {
        0
    } else {
        let probe = format!("{magnitude:.prec$e}", prec = precision - 1);
        split_exponent(&probe).1
    };

    let limit = i64::try_from(precision).unwrap_or(i64::MAX) - i64::from(untyped);
    let use_fixed = exponent >= -4 && i64::from(exponent) < limit;
    let mut out = if use_fixed {
        let decimals = usize::try_from(i64::try_from(precision).unwrap_or(i64::MAX) - 1 - i64::from(exponent))
            .unwrap_or(0);
        fixed(magnitude, decimals, alternate)
    } else {
        scientific(magnitude, precision - 1, alternate, upper)
    };

    if !alternate {
        out = strip_trailing_zeros(&out);
    }
    if untyped && use_fixed && !out.contains('.') {
        out.push_str(".0");
    }
    out
}

fn strip_trailing_zeros(rendered: &str) -> String {
    let (number, suffix) = match rendered.find(['e', 'E']) {
        Some(index) => rendered.split_at(index),
        None => (rendered, ""),
    };
    let number = if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    };
    format!("{number}{suffix}")
}

/// Shortest round-tripping representation, switching to scientific notation
/// outside `1e-4 <= x < 1e16`.
fn shortest(magnitude: f64) -> String {
    let rendered = format!("{magnitude:e}");
    let (mantissa, exponent) = split_exponent(&rendered);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();

    if (-4..16).contains(&exponent) {
        if exponent < 0 {
            let zeros = "0".repeat(usize::try_from(-exponent - 1).unwrap_or(0));
            return format!("0.{zeros}{digits}");
        }
        let int_len = usize::try_from(exponent).unwrap_or(0) + 1;
        if digits.len() <= int_len {
            return format!("{digits}{}.0", "0".repeat(int_len - digits.len()));
        }
        return format!("{}.{}", &digits[..int_len], &digits[int_len..]);
    }

    let mantissa = if digits.len() > 1 {
        format!("{}.{}", &digits[..1], &digits[1..])
    } else {
        digits
    };
    mantissa + &exponent_suffix(exponent, false)
}

/// Inserts `separator` every `size` digits, first prepending zeros until the
/// grouped text is at least `min_len` characters long.
fn group(digits: &str, separator: char, size: usize, min_len: usize) -> String {
    let mut len = digits.chars().count();
    let mut zeros = 0;
    while len + zeros + (len + zeros - 1) / size < min_len {
        zeros += 1;
    }
    len += zeros;

    let mut out = String::with_capacity(len + len / size);
    let padded = std::iter::repeat_n('0', zeros).chain(digits.chars());
    for (index, ch) in padded.enumerate() {
        if index > 0 && (len - index) % size == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

fn sign_of(negative: bool, spec: &FormatSpec) -> &'static str {
    match (negative, spec.sign) {
        (true, _) => "-",
        (false, Sign::Always) => "+",
        (false, Sign::Space) => " ",
        (false, Sign::Negative) => "",
    }
}

fn finish_number(negative: bool, prefix: &str, body: &str, spec: &FormatSpec) -> String {
    let head = format!("{}{prefix}", sign_of(negative, spec));
    pad(&head, body, spec.width, spec.fill(), spec.align_or(Align::Right))
}

fn pad(head: &str, body: &str, width: usize, fill: char, align: Align) -> String {
    let len = head.chars().count() + body.chars().count();
    let padding = width.saturating_sub(len);
    let fill_with = |count: usize| fill.to_string().repeat(count);

    match align {
        Align::Left => format!("{head}{body}{}", fill_with(padding)),
        Align::Right => format!("{}{head}{body}", fill_with(padding)),
        Align::Center => {
            let left = padding / 2;
            format!("{}{head}{body}{}", fill_with(left), fill_with(padding - left))
        }
        Align::AfterSign => format!("{head}{}{body}", fill_with(padding)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(value: impl Into<TemplateValue>, spec: &str) -> String {
        format_value(&value.into(), &FormatSpec::parse(spec).unwrap()).unwrap()
    }

    #[test]
    fn fixed_point_precision() {
        assert_eq!(render(3.14159, ".2f"), "3.14");
        assert_eq!(render(2.7, ".0f"), "3");
        assert_eq!(render(7, ".1f"), "7.0");
        assert_eq!(render(-0.5, "+.3f"), "-0.500");
        assert_eq!(render(0.256, ".1%"), "25.6%");
    }

    #[test]
    fn width_fill_and_alignment() {
        assert_eq!(render("ab", "5"), "ab   ");
        assert_eq!(render("ab", ">5"), "   ab");
        assert_eq!(render("ab", "*^6"), "**ab**");
        assert_eq!(render(42, "5"), "   42");
        assert_eq!(render(-42, "06"), "-00042");
        assert_eq!(render(-42, "=+6"), "-   42");
        assert_eq!(render("abcdef", ".3"), "abc");
    }

    #[test]
    fn integer_bases_and_grouping() {
        assert_eq!(render(255, "x"), "ff");
        assert_eq!(render(255, "#X"), "0XFF");
        assert_eq!(render(5, "#010b"), "0b00000101");
        assert_eq!(render(1_234_567, ","), "1,234,567");
        assert_eq!(render(65_535, "_x"), "ffff");
        assert_eq!(render(1_234_567.891, ",.2f"), "1,234,567.89");
        assert_eq!(render(65, "c"), "A");
        assert_eq!(render(1234, "08,"), "0,001,234");
        assert_eq!(render(1234, "09,"), "0,001,234");
        assert_eq!(render(-1234, "09,"), "-0,001,234");
        assert_eq!(render(1234, "0=7,"), "001,234");
        assert_eq!(render(1234, "*>8,"), "***1,234");
        assert_eq!(render(1234.5, "011,.2f"), "0,001,234.50");
    }

    #[test]
    fn scientific_and_general() {
        assert_eq!(render(12345.678, ".2e"), "1.23e+04");
        assert_eq!(render(0.000_123, "E"), "1.230000E-04");
        assert_eq!(render(123_456_789.0, "g"), "1.23457e+08");
        assert_eq!(render(0.5, "g"), "0.5");
        assert_eq!(render(100.0, "g"), "100");
        assert_eq!(render(123.0, ".3"), "1.23e+02");
        assert_eq!(render(12.0, ".3"), "12.0");
    }

    #[test]
    fn untyped_values_match_their_plain_form() {
        assert_eq!(render(1.0, ""), "1.0");
        assert_eq!(render(0.1, ""), "0.1");
        assert_eq!(render(1e16, ""), "1e+16");
        assert_eq!(render(1.5e-5, ""), "1.5e-05");
        assert_eq!(render(-0.0, ""), "-0.0");
        assert_eq!(render(true, ""), "True");
        assert_eq!(render(true, "d"), "1");
        assert_eq!(render(Option::<i64>::None, ""), "None");
        assert_eq!(render(f64::INFINITY, ""), "inf");
    }

    #[test]
    fn rejects_mismatched_specs() {
        for (value, spec) in [
            (TemplateValue::from("text"), ".2f"),
            (TemplateValue::from("text"), "+"),
            (TemplateValue::from(3), ".2"),
            (TemplateValue::from(3.5), "x"),
            (TemplateValue::from(3), ",x"),
        ] {
            let spec = FormatSpec::parse(spec).unwrap();
            assert!(format_value(&value, &spec).is_err(), "{value:?} {spec:?}");
        }
        assert!(FormatSpec::parse(".f").is_err());
        assert!(FormatSpec::parse("abc").is_err());
    }
}
