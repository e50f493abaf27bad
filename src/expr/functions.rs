//! Built-in functions.

use std::collections::HashMap;

use regex::Regex;

use super::EvalError;
use super::interpreter::no_overload;
use super::quantity::Quantity;
use super::value::Value;

/// Apply `f` to the compiled `pattern`, preferring the precompiled copy.
fn with_regex<T>(
    pattern: &str,
    regexes: &HashMap<String, Regex>,
    f: impl FnOnce(&Regex) -> T,
) -> Result<T, EvalError> {
    if let Some(regex) = regexes.get(pattern) {
        return Ok(f(regex));
    }
    Regex::new(pattern)
        .map(|regex| f(&regex))
        .map_err(|e| EvalError::runtime(format!("invalid regular expression {:?}: {}", pattern, e)))
}

fn regex_match(text: &str, pattern: &str, regexes: &HashMap<String, Regex>) -> Result<bool, EvalError> {
    with_regex(pattern, regexes, |regex| regex.is_match(text))
}

fn find_all(
    text: &str,
    pattern: &str,
    limit: i64,
    regexes: &HashMap<String, Regex>,
) -> Result<Value, EvalError> {
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    with_regex(pattern, regexes, |regex| {
        Value::list(
            regex
                .find_iter(text)
                .take(limit)
                .map(|found| Value::string(found.as_str()))
                .collect(),
        )
    })
}

fn parse_quantity(text: &str) -> Result<Value, EvalError> {
    Quantity::parse(text)
        .map(Value::Quantity)
        .map_err(|e| EvalError::runtime(e.to_string()))
}

fn quantity_operand(value: &Value) -> Option<Quantity> {
    match value {
        Value::Quantity(q) => Some(*q),
        Value::Int(i) => Some(Quantity::from_int(*i)),
        _ => None,
    }
}

/// Character offset `index` within `s` as a byte offset. `index` may equal
/// the character count.
fn char_offset(s: &str, index: i64) -> Result<usize, EvalError> {
    let out_of_range = || EvalError::runtime(format!("index out of range: {}", index));
    let index = usize::try_from(index).map_err(|_| out_of_range())?;
    s.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(s.len()))
        .nth(index)
        .ok_or_else(out_of_range)
}

fn char_index(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn index_of(s: &str, needle: &str, offset: i64) -> Result<Value, EvalError> {
    let start = char_offset(s, offset)?;
    let index = s[start..]
        .find(needle)
        .map_or(-1, |byte| char_index(s, start + byte));
    Ok(Value::Int(index))
}

fn last_index_of(s: &str, needle: &str, offset: Option<i64>) -> Result<Value, EvalError> {
    // A match may start at `offset` and run past it.
    let last_start = match offset {
        Some(offset) => char_offset(s, offset)?,
        None => s.len(),
    };
    let index = s
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(s.len()))
        .filter(|byte| *byte <= last_start)
        .rev()
        .find(|byte| s[*byte..].starts_with(needle))
        .map_or(-1, |byte| char_index(s, byte));
    Ok(Value::Int(index))
}

fn substring(s: &str, start: i64, end: Option<i64>) -> Result<Value, EvalError> {
    let from = char_offset(s, start)?;
    let to = match end {
        Some(end) => char_offset(s, end)?,
        None => s.len(),
    };
    if from > to {
        return Err(EvalError::runtime(format!(
            "invalid substring range. start: {}, end: {}",
            start,
            end.unwrap_or_default()
        )));
    }
    Ok(Value::string(&s[from..to]))
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{07}' => quoted.push_str("\\a"),
            '\u{08}' => quoted.push_str("\\b"),
            '\u{0C}' => quoted.push_str("\\f"),
            '\u{0B}' => quoted.push_str("\\v"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn split(s: &str, separator: &str, limit: i64) -> Value {
    if limit == 0 {
        return Value::list(Vec::new());
    }
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let parts: Vec<Value> = if separator.is_empty() {
        let chars: Vec<char> = s.chars().collect();
        let head = chars.len().min(limit.saturating_sub(1));
        let mut parts: Vec<Value> = chars[..head]
            .iter()
            .map(|c| Value::string(&c.to_string()))
            .collect();
        if head < chars.len() {
            parts.push(Value::string(&chars[head..].iter().collect::<String>()));
        }
        parts
    } else {
        s.splitn(limit, separator).map(Value::string).collect()
    };
    Value::list(parts)
}

fn list_position(items: &[Value], needle: &Value, last: bool) -> Value {
    let found = if last {
        items.iter().rposition(|item| item.equals(needle))
    } else {
        items.iter().position(|item| item.equals(needle))
    };
    Value::Int(found.map_or(-1, |index| index as i64))
}

fn size(value: &Value) -> Option<Value> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        _ => return None,
    };
    Some(Value::Int(len as i64))
}

fn conversion_error(target: &str, value: &Value) -> EvalError {
    EvalError::runtime(format!("cannot convert {} to {}", value.type_name(), target))
}

fn to_int(value: &Value) -> Result<Value, EvalError> {
    let fail = || conversion_error("int", value);
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Uint(u) => i64::try_from(*u).map(Value::Int).map_err(|_| fail()),
        Value::Double(d) if d.is_finite() && *d >= i64::MIN as f64 && *d < i64::MAX as f64 => {
            Ok(Value::Int(d.trunc() as i64))
        }
        Value::String(s) => s.parse::<i64>().map(Value::Int).map_err(|_| fail()),
        _ => Err(fail()),
    }
}

fn to_uint(value: &Value) -> Result<Value, EvalError> {
    let fail = || conversion_error("uint", value);
    match value {
        Value::Uint(u) => Ok(Value::Uint(*u)),
        Value::Int(i) => u64::try_from(*i).map(Value::Uint).map_err(|_| fail()),
        Value::Double(d) if d.is_finite() && *d >= 0.0 && *d < u64::MAX as f64 => {
            Ok(Value::Uint(d.trunc() as u64))
        }
        Value::String(s) => s.parse::<u64>().map(Value::Uint).map_err(|_| fail()),
        _ => Err(fail()),
    }
}

fn to_double(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Double(d) => Ok(Value::Double(*d)),
        Value::Int(i) => Ok(Value::Double(*i as f64)),
        Value::Uint(u) => Ok(Value::Double(*u as f64)),
        Value::String(s) => s
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| conversion_error("double", value)),
        _ => Err(conversion_error("double", value)),
    }
}

fn to_string(value: &Value) -> Result<Value, EvalError> {
    let text = match value {
        Value::String(_) => return Ok(value.clone()),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Err(conversion_error("string", value)),
    };
    Ok(Value::string(&text))
}

fn to_bool(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match s.as_ref() {
            "true" | "TRUE" | "True" | "t" | "1" => Ok(Value::Bool(true)),
            "false" | "FALSE" | "False" | "f" | "0" => Ok(Value::Bool(false)),
            _ => Err(conversion_error("bool", value)),
        },
        _ => Err(conversion_error("bool", value)),
    }
}

pub(crate) fn call_global(
    function: &str,
    args: &[Value],
    regexes: &HashMap<String, Regex>,
) -> Result<Value, EvalError> {
    match (function, args) {
        ("size", [arg]) => size(arg).ok_or_else(|| no_overload("size", &[arg])),
        ("int", [arg]) => to_int(arg),
        ("uint", [arg]) => to_uint(arg),
        ("double", [arg]) => to_double(arg),
        ("string", [arg]) => to_string(arg),
        ("bool", [arg]) => to_bool(arg),
        ("dyn", [arg]) => Ok(arg.clone()),
        ("matches", [Value::String(text), Value::String(pattern)]) => {
            regex_match(text, pattern, regexes).map(Value::Bool)
        }
        ("quantity", [Value::String(text)]) => parse_quantity(text),
        ("isQuantity", [Value::String(text)]) => Ok(Value::Bool(Quantity::parse(text).is_ok())),
        _ => Err(no_overload(function, &args.iter().collect::<Vec<_>>())),
    }
}

fn numeric_fold(items: &[Value], function: &str) -> Result<Value, EvalError> {
    let mut iter = items.iter();
    let Some(first) = iter.next() else {
        return match function {
            "sum" => Ok(Value::Int(0)),
            _ => Err(EvalError::runtime(format!("{}() called on an empty list", function))),
        };
    };

    let mut acc = first.clone();
    for item in iter {
        acc = match function {
            "min" | "max" => {
                let ordering = item
                    .compare(&acc)
                    .ok_or_else(|| no_overload(function, &[&acc, item]))?;
                let replace = if function == "min" {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                };
                if replace { item.clone() } else { acc }
            }
            _ => match (&acc, item) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(*b)
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::runtime("int overflow"))?,
                (Value::Uint(a), Value::Uint(b)) => a
                    .checked_add(*b)
                    .map(Value::Uint)
                    .ok_or_else(|| EvalError::runtime("uint overflow"))?,
                (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
                (a, b) => return Err(no_overload(function, &[a, b])),
            },
        };
    }
    Ok(acc)
}

pub(crate) fn call_member(
    function: &str,
    receiver: &Value,
    args: &[Value],
    regexes: &HashMap<String, Regex>,
) -> Result<Value, EvalError> {
    match (function, receiver, args) {
        ("size", value, []) => size(value).ok_or_else(|| no_overload("size", &[value])),
        ("contains", Value::String(s), [Value::String(needle)]) => {
            Ok(Value::Bool(s.contains(needle.as_ref())))
        }
        ("startsWith", Value::String(s), [Value::String(prefix)]) => {
            Ok(Value::Bool(s.starts_with(prefix.as_ref())))
        }
        ("endsWith", Value::String(s), [Value::String(suffix)]) => {
            Ok(Value::Bool(s.ends_with(suffix.as_ref())))
        }
        ("matches", Value::String(s), [Value::String(pattern)]) => {
            regex_match(s, pattern, regexes).map(Value::Bool)
        }
        ("lowerAscii", Value::String(s), []) => Ok(Value::string(&s.to_ascii_lowercase())),
        ("upperAscii", Value::String(s), []) => Ok(Value::string(&s.to_ascii_uppercase())),
        ("trim", Value::String(s), []) => Ok(Value::string(s.trim())),
        ("split", Value::String(s), [Value::String(separator)]) => Ok(split(s, separator, -1)),
        ("split", Value::String(s), [Value::String(separator), Value::Int(limit)]) => {
            Ok(split(s, separator, *limit))
        }
        ("replace", Value::String(s), [Value::String(from), Value::String(to)]) => {
            Ok(Value::string(&s.replace(from.as_ref(), to)))
        }
        ("replace", Value::String(s), [Value::String(from), Value::String(to), Value::Int(n)]) => {
            Ok(Value::string(&match usize::try_from(*n) {
                Ok(n) => s.replacen(from.as_ref(), to, n),
                Err(_) => s.replace(from.as_ref(), to),
            }))
        }
        ("indexOf", Value::String(s), [Value::String(needle)]) => index_of(s, needle, 0),
        ("indexOf", Value::String(s), [Value::String(needle), Value::Int(offset)]) => {
            index_of(s, needle, *offset)
        }
        ("lastIndexOf", Value::String(s), [Value::String(needle)]) => {
            last_index_of(s, needle, None)
        }
        ("lastIndexOf", Value::String(s), [Value::String(needle), Value::Int(offset)]) => {
            last_index_of(s, needle, Some(*offset))
        }
        ("indexOf", Value::List(items), [needle]) => Ok(list_position(items, needle, false)),
        ("lastIndexOf", Value::List(items), [needle]) => Ok(list_position(items, needle, true)),
        ("charAt", Value::String(s), [Value::Int(index)]) => {
            let from = char_offset(s, *index)?;
            Ok(Value::string(&s[from..].chars().take(1).collect::<String>()))
        }
        ("substring", Value::String(s), [Value::Int(start)]) => substring(s, *start, None),
        ("substring", Value::String(s), [Value::Int(start), Value::Int(end)]) => {
            substring(s, *start, Some(*end))
        }
        ("reverse", Value::String(s), []) => Ok(Value::string(&s.chars().rev().collect::<String>())),
        ("find", Value::String(s), [Value::String(pattern)]) => with_regex(pattern, regexes, |regex| {
            Value::string(regex.find(s).map_or("", |found| found.as_str()))
        }),
        ("findAll", Value::String(s), [Value::String(pattern)]) => {
            find_all(s, pattern, -1, regexes)
        }
        ("findAll", Value::String(s), [Value::String(pattern), Value::Int(limit)]) => {
            find_all(s, pattern, *limit, regexes)
        }
        ("sign", Value::Quantity(q), []) => Ok(Value::Int(q.sign())),
        ("isInteger", Value::Quantity(q), []) => Ok(Value::Bool(q.as_integer().is_some())),
        ("asInteger", Value::Quantity(q), []) => q
            .as_integer()
            .map(Value::Int)
            .ok_or_else(|| EvalError::runtime("cannot convert value to integer")),
        ("asApproximateFloat", Value::Quantity(q), []) => {
            Ok(Value::Double(q.as_approximate_float()))
        }
        ("add" | "sub", Value::Quantity(q), [other]) => {
            let other =
                quantity_operand(other).ok_or_else(|| no_overload(function, &[receiver, other]))?;
            let result = if function == "add" {
                q.checked_add(&other)
            } else {
                q.checked_sub(&other)
            };
            result
                .map(Value::Quantity)
                .ok_or_else(|| EvalError::runtime("quantity overflow"))
        }
        ("compareTo", Value::Quantity(a), [Value::Quantity(b)]) => {
            Ok(Value::Int(a.cmp(b) as i64))
        }
        ("isLessThan", Value::Quantity(a), [Value::Quantity(b)]) => Ok(Value::Bool(a < b)),
        ("isGreaterThan", Value::Quantity(a), [Value::Quantity(b)]) => Ok(Value::Bool(a > b)),
        ("join", Value::List(items), []) | ("join", Value::List(items), [_]) => {
            let separator = match args.first() {
                Some(Value::String(separator)) => separator.as_ref(),
                Some(other) => return Err(no_overload("join", &[receiver, other])),
                None => "",
            };
            let parts = items
                .iter()
                .map(|item| item.as_str().ok_or_else(|| no_overload("join", &[receiver])))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::string(&parts.join(separator)))
        }
        ("hasValue", Value::Optional(inner), []) => Ok(Value::Bool(inner.is_some())),
        ("value", Value::Optional(Some(inner)), []) => Ok(inner.as_ref().clone()),
        ("value", Value::Optional(None), []) => {
            Err(EvalError::runtime("optional.none() dereference"))
        }
        ("min" | "max" | "sum", Value::List(items), []) => numeric_fold(items, function),
        ("isSorted", Value::List(items), []) => {
            for pair in items.windows(2) {
                let ordering = pair[0]
                    .compare(&pair[1])
                    .ok_or_else(|| no_overload("isSorted", &[&pair[0], &pair[1]]))?;
                if ordering.is_gt() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        _ => {
            let mut all: Vec<&Value> = vec![receiver];
            all.extend(args.iter());
            Err(no_overload(function, &all))
        }
    }
}

fn is_subset(superset: &[Value], subset: &[Value]) -> bool {
    subset
        .iter()
        .all(|item| superset.iter().any(|candidate| candidate.equals(item)))
}

pub(crate) fn call_namespaced(
    namespace: &str,
    function: &str,
    args: &[Value],
) -> Result<Value, EvalError> {
    let qualified = format!("{}.{}", namespace, function);
    match (qualified.as_str(), args) {
        ("sets.contains", [Value::List(a), Value::List(b)]) => Ok(Value::Bool(is_subset(a, b))),
        ("sets.equivalent", [Value::List(a), Value::List(b)]) => {
            Ok(Value::Bool(is_subset(a, b) && is_subset(b, a)))
        }
        ("sets.intersects", [Value::List(a), Value::List(b)]) => Ok(Value::Bool(
            a.iter().any(|item| b.iter().any(|other| other.equals(item))),
        )),
        ("optional.of", [value]) => Ok(Value::some(value.clone())),
        ("optional.ofNonZeroValue", [value]) => Ok(if value.is_zero() {
            Value::none()
        } else {
            Value::some(value.clone())
        }),
        ("optional.none", []) => Ok(Value::none()),
        ("strings.quote", [Value::String(s)]) => Ok(Value::string(&quote(s))),
        _ => Err(no_overload(&qualified, &args.iter().collect::<Vec<_>>())),
    }
}
