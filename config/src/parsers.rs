// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Parsers for the textual value forms stored in the shared-state backend.
//!
//! Values round-trip through the backend as the canonical text of the tuple
//! (`"(a, b)"`), list (`"[a, b, …]"`) and slice (`"[a, b]"` with a `None`
//! literal for open bounds) forms. These parsers cover exactly those shapes;
//! arbitrary input is rejected, not guessed at.

use crate::{ConfigError, ConfigResult};
use sources::PulseSlicer;
use std::str::FromStr;

fn strip<'a>(text: &'a str, open: char, close: char, key: &str) -> ConfigResult<&'a str> {
    text.strip_prefix(open)
        .and_then(|t| t.strip_suffix(close))
        .ok_or_else(|| ConfigError::Malformed {
            key: key.to_string(),
            text: text.to_string(),
        })
}

/// Parse `"(a, b)"` into a pair.
pub fn str2tuple<T: FromStr>(text: &str) -> ConfigResult<(T, T)> {
    let inner = strip(text.trim(), '(', ')', "tuple")?;
    let mut parts = inner.splitn(2, ',');
    let mut next = || {
        parts
            .next()
            .map(str::trim)
            .and_then(|p| p.parse::<T>().ok())
            .ok_or_else(|| ConfigError::Malformed {
                key: "tuple".to_string(),
                text: text.to_string(),
            })
    };
    Ok((next()?, next()?))
}

/// Parse `"[a, b, …]"` into a vector. `"[]"` is an empty vector.
pub fn str2list<T: FromStr>(text: &str) -> ConfigResult<Vec<T>> {
    let inner = strip(text.trim(), '[', ']', "list")?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|p| {
            p.trim().parse::<T>().map_err(|_| ConfigError::Malformed {
                key: "list".to_string(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// Parse `"[start, stop]"` or `"[start, stop, step]"` into a pulse slicer,
/// with the literal `None` for open bounds.
pub fn str2slice(text: &str) -> ConfigResult<PulseSlicer> {
    let inner = strip(text.trim(), '[', ']', "slice")?;
    let bounds: Vec<Option<i64>> = inner
        .split(',')
        .map(|p| {
            let p = p.trim();
            if p == "None" {
                Ok(None)
            } else {
                p.parse::<i64>().map(Some).map_err(|_| ConfigError::Malformed {
                    key: "slice".to_string(),
                    text: text.to_string(),
                })
            }
        })
        .collect::<ConfigResult<_>>()?;

    let (start, stop, step) = match bounds.as_slice() {
        [start, stop] => (*start, *stop, None),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(ConfigError::Malformed {
                key: "slice".to_string(),
                text: text.to_string(),
            });
        }
    };
    PulseSlicer::new(start, stop, step).map_err(|_| ConfigError::Malformed {
        key: "slice".to_string(),
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_form() {
        assert_eq!(str2tuple::<f64>("(1, 2)").unwrap(), (1.0, 2.0));
        assert_eq!(
            str2tuple::<f64>("(-inf, inf)").unwrap(),
            (f64::NEG_INFINITY, f64::INFINITY)
        );
        assert!(str2tuple::<f64>("1, 2").is_err());
    }

    #[test]
    fn list_form() {
        assert_eq!(str2list::<f64>("[1, 2, 3]").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(str2list::<usize>("[]").unwrap(), Vec::<usize>::new());
        assert!(str2list::<f64>("[1; 2]").is_err());
    }

    #[test]
    fn slice_form() {
        let s = str2slice("[None, 2]").unwrap();
        assert_eq!(s, PulseSlicer::new(None, Some(2), None).unwrap());
        let s = str2slice("[0, None, 2]").unwrap();
        assert_eq!(s, PulseSlicer::new(Some(0), None, Some(2)).unwrap());
        assert!(str2slice("[1]").is_err());
        assert!(str2slice("[0, None, 0]").is_err());
    }
}
