use crate::core::{ApnRecord, DbError, MvnoType, Result};
use crate::lookup::SimIdentity;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const IMSI_CACHE_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();

lazy_static::lazy_static! {
    static ref IMSI_PATTERN_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(IMSI_CACHE_SIZE)));
}

/// Turn an IMSI pattern into an anchored prefix regex; `x`/`X` match one digit.
fn imsi_pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 1);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            'x' | 'X' => regex.push_str("[0-9]"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex
}

fn compiled_imsi_pattern(pattern: &str) -> Result<Arc<Regex>> {
    let mut cache = IMSI_PATTERN_CACHE.lock()?;
    if let Some(re) = cache.get(pattern) {
        return Ok(Arc::clone(re));
    }

    let re = Regex::new(&imsi_pattern_to_regex(pattern))
        .map_err(|e| DbError::InvalidInput(format!("imsi pattern '{}': {}", pattern, e)))?;
    let re = Arc::new(re);
    cache.put(pattern.to_string(), Arc::clone(&re));
    Ok(re)
}

fn imsi_matches(pattern: &str, imsi: &str) -> Result<bool> {
    if pattern.is_empty() || pattern.len() > imsi.len() {
        return Ok(false);
    }
    Ok(compiled_imsi_pattern(pattern)?.is_match(imsi))
}

fn gid_matches(prefix: &str, gid1: &str) -> bool {
    !prefix.is_empty()
        && gid1.len() >= prefix.len()
        && gid1.is_char_boundary(prefix.len())
        && gid1[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Whether the row's MVNO constraint is satisfied by `sim`.
///
/// Rows without an MVNO constraint never match here; they form the generic
/// tier of the candidate list.
pub fn matches(rec: &ApnRecord, sim: &SimIdentity) -> Result<bool> {
    let data = rec.mvno_match_data.as_str();
    let matched = match rec.mvno_type {
        MvnoType::None => false,
        MvnoType::Spn => sim.spn.as_deref().is_some_and(|spn| !data.is_empty() && spn == data),
        MvnoType::Imsi => match sim.imsi.as_deref() {
            Some(imsi) => imsi_matches(data, imsi)?,
            None => false,
        },
        MvnoType::Gid => sim.gid1.as_deref().is_some_and(|gid| gid_matches(data, gid)),
        MvnoType::Iccid => sim
            .iccid
            .as_deref()
            .is_some_and(|iccid| !data.is_empty() && iccid.starts_with(data)),
    };
    Ok(matched)
}

/// Row has no MVNO constraint, or its constraint matches `sim`.
pub fn admits(rec: &ApnRecord, sim: &SimIdentity) -> Result<bool> {
    if !rec.has_mvno() {
        return Ok(true);
    }
    matches(rec, sim)
}
