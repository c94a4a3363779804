//! Decimal number <-> text conversion.
//!
//! These routines are the numeric backbone of the evaluator, the document
//! store, and the template tags, and their digit-level behavior is part of
//! the crate contract:
//!
//! - formatting scales the fractional part by `1e15`, truncates to an
//!   integer, strips trailing zeros, and applies half-up rounding at the
//!   requested fraction width, carrying into the integer part when the
//!   fraction collapses to one;
//! - parsing walks the window right to left, folding digits by positional
//!   weight and handling `.`, `e`/`E`, and signs as segment resets.
//!
//! Both directions avoid any locale machinery: the separator is always `.`
//! and digits are ASCII.

use super::buffer::Buffer;

const FORMAT_WIDTH: usize = 40;

/// Format an unsigned integer in decimal, left-padded with zeros to at least
/// `min_digits` digits.
pub fn format_u64(value: u64, min_digits: u16) -> Buffer {
    let mut digits = ['0'; FORMAT_WIDTH];
    let mut len = FORMAT_WIDTH;
    let mut number = value;

    while number != 0 {
        len -= 1;
        digits[len] = char::from(b'0' + (number % 10) as u8);
        number /= 10;
    }

    let min = FORMAT_WIDTH.saturating_sub(min_digits as usize);
    while len > min {
        len -= 1;
        digits[len] = '0';
    }

    let mut out = Buffer::with_capacity(FORMAT_WIDTH - len);
    out.push_slice(&digits[len..]);
    out
}

/// Format a finite float in decimal.
///
/// The integer part is left-padded with zeros to `min_integer` digits. The
/// fractional part is emitted only when non-zero or when `min_fraction`
/// forces trailing zeros; `max_fraction`, when non-zero, rounds half-up at
/// that width (a carry may propagate into the integer part, so
/// `0.999999` at width 5 formats as `1`). `max_fraction == 0` emits no
/// fractional part at all.
pub fn format_f64(value: f64, min_integer: u16, min_fraction: u16, max_fraction: u16) -> Buffer {
    let mut digits = ['0'; FORMAT_WIDTH];
    let mut len = FORMAT_WIDTH;
    let mut integer_digits: u16 = 0;
    let mut r_min = min_fraction;
    let mut r_max = max_fraction;

    let negative = value < 0.0;
    let mut number = if negative { -value } else { value };

    if number != 0.0 {
        let mut left = number as u64;
        number -= left as f64;

        if number != 0.0 && r_max != 0 {
            number *= 1e15;
            let mut right = number as u64;

            if right != 0 {
                let mut precision: u16 = 15;
                while right % 10 == 0 && precision != 0 {
                    precision -= 1;
                    right /= 10;
                }

                if r_max != 0 && r_max < precision {
                    r_max += 1;

                    while r_max < precision {
                        precision -= 1;
                        right /= 10;
                    }

                    if right % 10 >= 5 {
                        right = right / 10 + 1;
                    } else {
                        right /= 10;
                    }

                    precision -= 1;

                    while right % 10 == 0 && precision != 0 {
                        precision -= 1;
                        right /= 10;
                    }

                    if right == 1 && precision == 0 {
                        // The fraction rounded all the way up.
                        left += 1;
                    }
                }

                while r_min > precision {
                    len -= 1;
                    digits[len] = '0';
                    r_min -= 1;
                }
                r_min = 0;

                while precision != 0 {
                    len -= 1;
                    digits[len] = char::from(b'0' + (right % 10) as u8);
                    right /= 10;
                    precision -= 1;
                }

                if len != FORMAT_WIDTH {
                    len -= 1;
                    digits[len] = '.';
                }
            }
        }

        while left != 0 {
            len -= 1;
            digits[len] = char::from(b'0' + (left % 10) as u8);
            left /= 10;
            integer_digits += 1;
        }
    }

    if r_min != 0 {
        while r_min != 0 {
            len -= 1;
            digits[len] = '0';
            r_min -= 1;
        }

        len -= 1;
        digits[len] = '.';
    }

    while integer_digits < min_integer {
        len -= 1;
        digits[len] = '0';
        integer_digits += 1;
    }

    if negative {
        len -= 1;
        digits[len] = '-';
    }

    let mut out = Buffer::with_capacity(FORMAT_WIDTH - len);
    out.push_slice(&digits[len..]);
    out
}

/// Parse `text[offset .. offset + limit]` as a float.
///
/// Accepts a leading `+`/`-` on the mantissa, one `.`, and an `e`/`E`
/// exponent with an optional sign. Returns `Some` only when the mantissa's
/// integer segment consumed at least one digit and the whole window was
/// used; the empty window fails.
pub fn parse_f64(text: &[char], offset: usize, limit: usize) -> Option<f64> {
    let mut number = 0.0f64;
    let mut at = offset + limit;
    let mut negative_exp = false;
    let mut exp: u64 = 0;
    let mut position = 1.0f64;

    while at != offset {
        at -= 1;
        let c = text[at];

        if c.is_ascii_digit() {
            number += (c as u32 - '0' as u32) as f64 * position;
            position *= 10.0;
        } else {
            match c {
                '.' => {
                    number /= position;
                    position = 1.0;
                }
                'e' | 'E' => {
                    exp = number as u64;
                    number = 0.0;
                    position = 1.0;
                }
                '+' => {}
                '-' => {
                    if at != offset {
                        negative_exp = true;
                    } else {
                        number = -number;
                    }
                }
                _ => return None,
            }
        }
    }

    if negative_exp {
        while exp != 0 {
            number /= 10.0;
            exp -= 1;
        }
    } else {
        while exp != 0 {
            number *= 10.0;
            exp -= 1;
        }
    }

    if position > 1.0 { Some(number) } else { None }
}

/// Parse `text[offset .. offset + limit]` as an unsigned integer, with the
/// same window rules as [`parse_f64`]. A `-`, a `.`, or any other stray
/// character fails.
pub fn parse_u64(text: &[char], offset: usize, limit: usize) -> Option<u64> {
    let mut number: u64 = 0;
    let mut at = offset + limit;
    let mut exp: u64 = 0;
    let mut position: u64 = 1;

    while at != offset {
        at -= 1;
        let c = text[at];

        if c.is_ascii_digit() {
            number = number.wrapping_add((c as u64 - '0' as u64).wrapping_mul(position));
            position = position.wrapping_mul(10);
        } else {
            match c {
                'e' | 'E' => {
                    exp = number;
                    number = 0;
                    position = 1;
                }
                '+' => {}
                _ => return None,
            }
        }
    }

    while exp != 0 {
        number = number.wrapping_mul(10);
        exp -= 1;
    }

    if position > 1 { Some(number) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn parse(s: &str) -> Option<f64> {
        let text = chars(s);
        parse_f64(&text, 0, text.len())
    }

    #[test]
    fn formats_floats() {
        let cases: Vec<(&str, f64, u16, u16, u16)> = vec![
            ("0", 0.0, 1, 0, 0),
            ("00", 0.0, 2, 0, 0),
            ("0.00", 0.0, 1, 2, 2),
            ("1", 1.0, 1, 0, 3),
            ("-1", -1.0, 1, 0, 3),
            ("14", 14.0, 1, 0, 3),
            ("1.5", 1.5, 1, 0, 3),
            ("0.5", 0.5, 1, 0, 3),
            ("1.50", 1.5, 1, 2, 3),
            ("3.142", 3.1415926, 1, 0, 3),
            // Rounding at the requested width, with carry.
            ("1", 0.999999, 1, 0, 5),
            ("0.999999", 0.999999, 1, 0, 6),
            ("2", 1.96, 1, 0, 1),
            ("0.3", 0.25, 1, 0, 1),
            // Fifteen digits survive untouched.
            ("-0.788065000000079", -0.788065000000079, 1, 0, 15),
            // A zero width suppresses the fraction entirely.
            ("1", 1.25, 1, 0, 0),
        ];

        for (expected, value, min_integer, min_fraction, max_fraction) in cases {
            let got = format_f64(value, min_integer, min_fraction, max_fraction);
            assert_eq!(got, expected, "format_f64({value}, {min_integer}, {min_fraction}, {max_fraction})");
        }
    }

    #[test]
    fn formats_unsigned() {
        assert_eq!(format_u64(0, 1), "0");
        assert_eq!(format_u64(7, 1), "7");
        assert_eq!(format_u64(7, 3), "007");
        assert_eq!(format_u64(1234, 2), "1234");
    }

    #[test]
    fn parses_floats() {
        let cases: Vec<(f64, &str)> = vec![
            (0.0, "0"),
            (1.0, "1"),
            (-1.0, "-1"),
            (1.0, "+1"),
            (14.0, "14"),
            (1.5, "1.5"),
            (-1.5, "-1.5"),
            (1500.0, "15e2"),
            (1500.0, "15E2"),
            (0.015, "1.5e-2"),
            (150.0, "1.5e+2"),
            (123.456, "123.456"),
        ];

        for (expected, input) in cases {
            assert_eq!(parse(input), Some(expected), "parse_f64({input:?})");
        }
    }

    #[test]
    fn rejects_bad_windows() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("abc"), None);
        assert_eq!(parse("12x"), None);
        assert_eq!(parse(" 1"), None);
        // No digit in the mantissa's integer segment.
        assert_eq!(parse(".5"), None);
        assert_eq!(parse("e5"), None);
    }

    #[test]
    fn parses_unsigned() {
        let text = chars("x42y");
        assert_eq!(parse_u64(&text, 1, 2), Some(42));
        assert_eq!(parse_u64(&text, 0, 3), None);
        assert_eq!(parse_u64(&text, 1, 0), None);

        let exp = chars("2e3");
        assert_eq!(parse_u64(&exp, 0, 3), Some(2000));

        let neg = chars("-2");
        assert_eq!(parse_u64(&neg, 0, 2), None);
    }

    #[test]
    fn round_trips_through_text() {
        let values = [0.0, 1.0, -1.0, 14.0, 0.5, -2.25, 1234.0, 0.788065000000079];

        for value in values {
            let formatted = format_f64(value, 1, 0, 15);
            let parsed = parse_f64(formatted.as_slice(), 0, formatted.len());
            assert_eq!(parsed, Some(value), "round trip of {value}");
        }
    }
}
