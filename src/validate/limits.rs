//! Structural length bounds inferred from validation regex patterns.
//!
//! Best-effort approximation over a restricted subset: literals, escaped
//! characters, bracket classes, groups, and the quantifier forms `?`, `+`,
//! `*`, `{n}`, `{n,}`, `{n,m}`. Adjacent units concatenate (lengths add);
//! group lengths multiply by their repetition counts. Alternation,
//! backreferences and lookarounds are out of scope: such patterns yield no
//! bounds rather than wrong ones. This is not a general regex-length
//! solver.

/// Approximate length range of strings accepted by a pattern. `min` is
/// `None` when nothing could be inferred; `max` is `None` when the pattern
/// has no upper bound (or nothing could be inferred).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LengthBounds {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

/// Infer length bounds for `pattern`. Unsupported syntax yields
/// `LengthBounds::default()` (no bounds), never an error.
pub fn infer(pattern: &str) -> LengthBounds {
    let mut chars = pattern.chars().peekable();
    match sequence(&mut chars, false) {
        Some((min, max)) => LengthBounds {
            min: Some(min),
            max,
        },
        None => LengthBounds::default(),
    }
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// (min, max) length of a unit sequence; `max` of `None` means unbounded.
fn sequence(chars: &mut Chars<'_>, nested: bool) -> Option<(u64, Option<u64>)> {
    let mut min: u64 = 0;
    let mut max: Option<u64> = Some(0);
    loop {
        let unit = match chars.peek() {
            None => {
                if nested {
                    // unbalanced group
                    return None;
                }
                break;
            }
            Some(')') if nested => break,
            Some('|') => return None,
            Some('^') | Some('$') => {
                chars.next();
                continue;
            }
            Some('(') => {
                chars.next();
                if chars.peek() == Some(&'?') {
                    chars.next();
                    // only non-capturing groups among the (?...) forms
                    if chars.next() != Some(':') {
                        return None;
                    }
                }
                let inner = sequence(chars, true)?;
                if chars.next() != Some(')') {
                    return None;
                }
                inner
            }
            Some('[') => {
                chars.next();
                skip_class(chars)?;
                (1, Some(1))
            }
            Some('\\') => {
                chars.next();
                chars.next()?;
                (1, Some(1))
            }
            Some(_) => {
                chars.next();
                (1, Some(1))
            }
        };

        let (times_min, times_max) = quantifier(chars)?;
        min = min.saturating_add(unit.0.saturating_mul(times_min));
        max = add_bound(max, mul_bound(unit.1, times_max));
    }
    Some((min, max))
}

/// Repetition range of the quantifier at the cursor, `(1, 1)` when absent.
fn quantifier(chars: &mut Chars<'_>) -> Option<(u64, Option<u64>)> {
    match chars.peek() {
        Some('?') => {
            chars.next();
            Some((0, Some(1)))
        }
        Some('+') => {
            chars.next();
            Some((1, None))
        }
        Some('*') => {
            chars.next();
            Some((0, None))
        }
        Some('{') => {
            chars.next();
            repetition(chars)
        }
        _ => Some((1, Some(1))),
    }
}

/// Body of an explicit `{n}`, `{n,}` or `{n,m}` repetition (brace already
/// consumed).
fn repetition(chars: &mut Chars<'_>) -> Option<(u64, Option<u64>)> {
    let first = digits(chars);
    match chars.next()? {
        '}' => {
            let n: u64 = first.parse().ok()?;
            Some((n, Some(n)))
        }
        ',' => {
            let second = digits(chars);
            if chars.next()? != '}' {
                return None;
            }
            let lo = if first.is_empty() {
                0
            } else {
                first.parse().ok()?
            };
            let hi = if second.is_empty() {
                None
            } else {
                Some(second.parse().ok()?)
            };
            Some((lo, hi))
        }
        _ => None,
    }
}

fn digits(chars: &mut Chars<'_>) -> String {
    let mut out = String::new();
    while let Some(c) = chars.peek() {
        if c.is_ascii_digit() {
            out.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    out
}

/// Consume a bracket class (opening bracket already consumed); it counts as
/// a single unit.
fn skip_class(chars: &mut Chars<'_>) -> Option<()> {
    if chars.peek() == Some(&'^') {
        chars.next();
    }
    if chars.peek() == Some(&']') {
        // literal ] as first member
        chars.next();
    }
    loop {
        match chars.next()? {
            ']' => return Some(()),
            '\\' => {
                chars.next()?;
            }
            _ => {}
        }
    }
}

fn mul_bound(unit: Option<u64>, times: Option<u64>) -> Option<u64> {
    match (unit, times) {
        (_, Some(0)) | (Some(0), _) => Some(0),
        (Some(u), Some(t)) => Some(u.saturating_mul(t)),
        _ => None,
    }
}

fn add_bound(acc: Option<u64>, unit: Option<u64>) -> Option<u64> {
    match (acc, unit) {
        (Some(a), Some(u)) => Some(a.saturating_add(u)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min: u64, max: Option<u64>) -> LengthBounds {
        LengthBounds {
            min: Some(min),
            max,
        }
    }

    #[test]
    fn bounded_class_repetition() {
        assert_eq!(infer("[a-z]{2,4}"), bounds(2, Some(4)));
        assert_eq!(infer("[0-9]{3}"), bounds(3, Some(3)));
    }

    #[test]
    fn open_ended_quantifiers_drop_the_maximum() {
        assert_eq!(infer("[a-z]+"), bounds(1, None));
        assert_eq!(infer("[a-z]*"), bounds(0, None));
        assert_eq!(infer("\\d{2,}"), bounds(2, None));
    }

    #[test]
    fn optional_unit() {
        assert_eq!(infer("[a-z]?"), bounds(0, Some(1)));
    }

    #[test]
    fn literals_concatenate() {
        assert_eq!(infer("abc"), bounds(3, Some(3)));
        assert_eq!(infer("ab[0-9]{2}"), bounds(4, Some(4)));
    }

    #[test]
    fn groups_multiply_by_repetition() {
        assert_eq!(infer("([a-z]{2}[0-9]){2}"), bounds(6, Some(6)));
        assert_eq!(infer("(?:ab)+"), bounds(2, None));
        assert_eq!(infer("([a-z]{3})?"), bounds(0, Some(3)));
    }

    #[test]
    fn anchors_are_zero_width() {
        assert_eq!(infer("^[a-z]{2}$"), bounds(2, Some(2)));
    }

    #[test]
    fn classes_collapse_to_one_unit() {
        assert_eq!(infer("[a-z0-9_.-]{3,20}"), bounds(3, Some(20)));
        assert_eq!(infer("[\\]a-z]{2}"), bounds(2, Some(2)));
    }

    #[test]
    fn unsupported_syntax_yields_no_bounds() {
        assert_eq!(infer("a|b"), LengthBounds::default());
        assert_eq!(infer("(?=x)[a-z]+"), LengthBounds::default());
        assert_eq!(infer("([a-z]"), LengthBounds::default());
    }
}
