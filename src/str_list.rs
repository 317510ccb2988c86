//! StrList: a [`Vector`] of owned strings with text conversions.
//!
//! Besides the vector operations (reachable through `Deref`), a list
//! converts to and from double-null buffers, separator-split text and
//! lines, and can be used as a `KEY=value` environment block.

use crate::error::AllocError;
use crate::vector::Vector;
use core::ops::{Deref, DerefMut};

/// How environment keys are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnvKeyMatch {
    /// `foo` finds `FOO=...`. Only ASCII letters are folded.
    #[default]
    AsciiCaseInsensitive,
    Exact,
}

impl EnvKeyMatch {
    fn keys_match(self, a: &[u8], b: &[u8]) -> bool {
        match self {
            EnvKeyMatch::AsciiCaseInsensitive => a.eq_ignore_ascii_case(b),
            EnvKeyMatch::Exact => a == b,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrList {
    items: Vector<String>,
    env_match: EnvKeyMatch,
}

fn owned(s: &str) -> Result<String, AllocError> {
    let mut out = String::new();
    out.try_reserve_exact(s.len())
        .map_err(|e| AllocError::exhausted(s.len(), e))?;
    out.push_str(s);
    Ok(out)
}

impl StrList {
    pub const fn new() -> Self {
        Self {
            items: Vector::new(),
            env_match: EnvKeyMatch::AsciiCaseInsensitive,
        }
    }

    pub fn with_env_key_match(mut self, env_match: EnvKeyMatch) -> Self {
        self.env_match = env_match;
        self
    }

    pub fn env_key_match(&self) -> EnvKeyMatch {
        self.env_match
    }

    /// List holding copies of `strs`.
    pub fn from_strs<'a, I>(strs: I) -> Result<Self, AllocError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut list = Self::new();
        list.assign_strs(strs)?;
        Ok(list)
    }

    /// Append a copy of `s`.
    pub fn add(&mut self, s: &str) -> Result<(), AllocError> {
        let s = owned(s)?;
        self.items.emplace_back(s).map(|_| ())
    }

    /// Overwrite entry `i` with `s`, reusing its buffer, or append when
    /// `i >= len()`.
    pub fn set(&mut self, i: usize, s: &str) -> Result<(), AllocError> {
        let Some(slot) = self.items.get_mut(i) else {
            return self.add(s);
        };
        if s.len() > slot.capacity() {
            slot.try_reserve_exact(s.len() - slot.len())
                .map_err(|e| AllocError::exhausted(s.len(), e))?;
        }
        slot.clear();
        slot.push_str(s);
        Ok(())
    }

    /// Replace the contents with copies of `strs`. On failure the list is
    /// left as it was.
    pub fn assign_strs<'a, I>(&mut self, strs: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fresh = Vector::new();
        for s in strs {
            fresh.emplace_back(owned(s)?)?;
        }
        self.items.swap(&mut fresh);
        Ok(())
    }

    /// Parse a double-null buffer: strings separated by `\0`, ending at the
    /// first empty string or the end of input.
    pub fn from_double_null(buf: &str) -> Result<Self, AllocError> {
        Self::from_strs(buf.split('\0').take_while(|s| !s.is_empty()))
    }

    /// Every string followed by `\0`, plus one final `\0`.
    pub fn to_double_null(&self) -> Result<String, AllocError> {
        let size = self.items.iter().map(|s| s.len() + 1).sum::<usize>() + 1;
        let mut out = String::new();
        out.try_reserve_exact(size)
            .map_err(|e| AllocError::exhausted(size, e))?;
        for s in self.items.iter() {
            out.push_str(s);
            out.push('\0');
        }
        out.push('\0');
        Ok(out)
    }

    /// Split `input` at each occurrence of `sep`.
    ///
    /// An empty input gives an empty list and an empty separator gives one
    /// entry per character. A trailing separator does not open another
    /// entry, but empty entries between separators are kept.
    pub fn split(input: &str, sep: &str) -> Result<Self, AllocError> {
        if input.is_empty() {
            return Ok(Self::new());
        }
        if sep.is_empty() {
            let mut buf = [0u8; 4];
            let mut list = Self::new();
            for c in input.chars() {
                list.add(c.encode_utf8(&mut buf))?;
            }
            return Ok(list);
        }
        let body = input.strip_suffix(sep).unwrap_or(input);
        if body.is_empty() {
            // input was a lone separator
            return Self::from_strs([""]);
        }
        Self::from_strs(body.split(sep))
    }

    /// Concatenate the entries with `sep` between them.
    pub fn join(&self, sep: Option<&str>) -> Result<String, AllocError> {
        let sep = sep.unwrap_or("");
        let n = self.items.len();
        let size = self.items.iter().map(String::len).sum::<usize>()
            + n.saturating_sub(1) * sep.len();
        let mut out = String::new();
        out.try_reserve_exact(size)
            .map_err(|e| AllocError::exhausted(size, e))?;
        for (i, s) in self.items.iter().enumerate() {
            if i != 0 {
                out.push_str(sep);
            }
            out.push_str(s);
        }
        Ok(out)
    }

    /// Split `text` into lines at `\n`, dropping one `\r` before each `\n`.
    /// The last line is always present, even when empty.
    pub fn lines(text: &str) -> Result<Self, AllocError> {
        let mut list = Self::new();
        let mut rest = text;
        loop {
            match rest.find('\n') {
                Some(end) => {
                    let line = &rest[..end];
                    list.add(line.strip_suffix('\r').unwrap_or(line))?;
                    rest = &rest[end + 1..];
                }
                None => {
                    list.add(rest)?;
                    return Ok(list);
                }
            }
        }
    }

    /// Index of the first `KEY=...` entry whose key matches `key`.
    /// Entries without `=` never match.
    pub fn env_index(&self, key: &str) -> Option<usize> {
        let k = key.as_bytes();
        self.items.iter().position(|entry| {
            let e = entry.as_bytes();
            e.len() > k.len() && e[k.len()] == b'=' && self.env_match.keys_match(&e[..k.len()], k)
        })
    }

    /// Value of the first entry matching `key`.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        let i = self.env_index(key)?;
        Some(&self.items[i][key.len() + 1..])
    }

    /// Set the value of `key`. An existing entry keeps its key spelling;
    /// otherwise `key=value` is appended.
    pub fn set_env_value(&mut self, key: &str, value: &str) -> Result<(), AllocError> {
        match self.env_index(key) {
            Some(i) => {
                let entry = &mut self.items[i];
                let keep = key.len() + 1;
                let size = keep + value.len();
                if size > entry.capacity() {
                    entry
                        .try_reserve_exact(size - entry.len())
                        .map_err(|e| AllocError::exhausted(size, e))?;
                }
                entry.truncate(keep);
                entry.push_str(value);
                Ok(())
            }
            None => {
                let size = key.len() + 1 + value.len();
                let mut entry = String::new();
                entry
                    .try_reserve_exact(size)
                    .map_err(|e| AllocError::exhausted(size, e))?;
                entry.push_str(key);
                entry.push('=');
                entry.push_str(value);
                self.items.emplace_back(entry).map(|_| ())
            }
        }
    }

    /// Remove the first entry matching `key`. Returns whether one was found.
    pub fn unset_env_value(&mut self, key: &str) -> bool {
        match self.env_index(key) {
            Some(i) => {
                self.items.remove(i, 1);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator + '_ {
        self.items.iter().map(String::as_str)
    }
}

impl Deref for StrList {
    type Target = Vector<String>;

    fn deref(&self) -> &Vector<String> {
        &self.items
    }
}

impl DerefMut for StrList {
    fn deref_mut(&mut self) -> &mut Vector<String> {
        &mut self.items
    }
}

impl From<Vector<String>> for StrList {
    fn from(items: Vector<String>) -> Self {
        Self {
            items,
            env_match: EnvKeyMatch::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(l: &StrList) -> Vec<&str> {
        l.iter().collect()
    }

    #[test]
    fn double_null_round_trip() {
        let l = StrList::from_strs(["a", "b", "c"]).unwrap();
        assert_eq!(l.to_double_null().unwrap(), "a\0b\0c\0\0");

        let l = StrList::from_double_null("a1\0b1\0c1\0d2\0").unwrap();
        assert_eq!(strs(&l), ["a1", "b1", "c1", "d2"]);
    }

    #[test]
    fn double_null_stops_at_empty_entry() {
        let l = StrList::from_double_null("x\0\0y\0").unwrap();
        assert_eq!(strs(&l), ["x"]);
        assert!(StrList::from_double_null("").unwrap().is_empty());
        assert_eq!(StrList::new().to_double_null().unwrap(), "\0");
    }

    #[test]
    fn lines_handle_crlf() {
        let l = StrList::lines("a\r\nb\rc\r\r\nd\n\n\r\nf").unwrap();
        assert_eq!(strs(&l), ["a", "b\rc\r", "d", "", "", "f"]);
        assert_eq!(strs(&StrList::lines("").unwrap()), [""]);
        assert_eq!(strs(&StrList::lines("x\n").unwrap()), ["x", ""]);
    }

    #[test]
    fn split_policies() {
        assert_eq!(strs(&StrList::split("a,b,c", ",").unwrap()), ["a", "b", "c"]);
        assert!(StrList::split("", ",").unwrap().is_empty());
        assert_eq!(strs(&StrList::split("abc", "_").unwrap()), ["abc"]);
        assert_eq!(strs(&StrList::split("abc", "").unwrap()), ["a", "b", "c"]);
        assert_eq!(strs(&StrList::split("a,", ",").unwrap()), ["a"]);
        assert_eq!(strs(&StrList::split("a,,b", ",").unwrap()), ["a", "", "b"]);
        assert_eq!(strs(&StrList::split(",a", ",").unwrap()), ["", "a"]);
        assert_eq!(strs(&StrList::split(",", ",").unwrap()), [""]);
        assert_eq!(strs(&StrList::split("a::b", "::").unwrap()), ["a", "b"]);
    }

    #[test]
    fn join_policies() {
        let mut l = StrList::new();
        assert_eq!(l.join(Some("hello")).unwrap(), "");
        l.add("Hello, World!").unwrap();
        assert_eq!(l.join(Some("hello")).unwrap(), "Hello, World!");

        let l = StrList::split("ab,bc,cd", ",").unwrap();
        assert_eq!(l.join(None).unwrap(), "abbccd");
        assert_eq!(l.join(Some(",;,")).unwrap(), "ab,;,bc,;,cd");
    }

    #[test]
    fn set_overwrites_or_appends() {
        let mut l = StrList::from_strs(["one", "two"]).unwrap();
        l.set(0, "uno").unwrap();
        l.set(7, "tres").unwrap();
        assert_eq!(strs(&l), ["uno", "two", "tres"]);
    }

    #[test]
    fn assign_strs_replaces_everything() {
        let mut l = StrList::from_strs(["a", "b", "c"]).unwrap();
        l.assign_strs(["z"]).unwrap();
        assert_eq!(strs(&l), ["z"]);
    }

    fn env() -> StrList {
        StrList::from_strs(["FOO=bar", "fo=", "fi", "fi=baz"]).unwrap()
    }

    #[test]
    fn env_lookup_ignores_ascii_case() {
        let l = env();
        assert_eq!(l.env_value("FOO"), Some("bar"));
        assert_eq!(l.env_value("foo"), Some("bar"));
        assert_eq!(l.env_value("fo"), Some(""));
        assert_eq!(l.env_value("fi"), Some("baz"));
        assert_eq!(l.env_index("fi"), Some(3));
        assert_eq!(l.env_value("baz"), None);
    }

    #[test]
    fn env_lookup_exact() {
        let l = env().with_env_key_match(EnvKeyMatch::Exact);
        assert_eq!(l.env_value("foo"), None);
        assert_eq!(l.env_value("FOO"), Some("bar"));
    }

    #[test]
    fn env_update_and_unset() {
        let mut l = env();
        l.set_env_value("fo", "bo").unwrap();
        assert_eq!(l.to_double_null().unwrap(), "FOO=bar\0fo=bo\0fi\0fi=baz\0\0");
        assert_eq!(l.env_value("fo"), Some("bo"));

        l.set_env_value("xx", "yy").unwrap();
        assert_eq!(strs(&l), ["FOO=bar", "fo=bo", "fi", "fi=baz", "xx=yy"]);

        // The stored key spelling survives an update through another case.
        l.set_env_value("foo", "qux").unwrap();
        assert_eq!(l[0], "FOO=qux");

        assert!(l.unset_env_value("fi"));
        assert_eq!(strs(&l), ["FOO=qux", "fo=bo", "fi", "xx=yy"]);
        assert!(!l.unset_env_value("fi"));
        assert_eq!(l.len(), 4);
    }
}
