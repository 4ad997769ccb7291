use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// An interned string. Every `StringRef` handed out by a `StringPool` for the
/// same (folded) content shares one allocation, so equality and hashing only
/// look at the pointer. Comparing refs from two different pools, or a ref
/// from the case-sensitive table with one from the case-insensitive table,
/// compares identities rather than text.
#[derive(Clone)]
pub struct StringRef {
    data: Arc<str>,
}

impl StringRef {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.data
    }

    #[inline]
    pub fn ptr_eq(&self, other: &StringRef) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Text comparison ignoring ASCII case, for refs whose identity is not
    /// enough (e.g. they come from different tables).
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.data.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for StringRef {
    fn eq(&self, other: &StringRef) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for StringRef {}

impl Hash for StringRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.data.as_ptr() as usize).hash(state);
    }
}

impl Deref for StringRef {
    type Target = str;
    fn deref(&self) -> &str {
        &self.data
    }
}

impl fmt::Debug for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.data)
    }
}

impl fmt::Display for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

/// StringPool is an ever-growing table of strings. Strings are never removed
/// until the pool itself is dropped, so a `StringRef` stays valid (and keeps
/// its identity) for as long as it is held.
///
/// There are two tables. Names (identifiers, fields, namespaces) are interned
/// case-insensitively: the first spelling that was seen is the one that is
/// kept. String constants from source text are interned case-sensitively.
pub struct StringPool {
    folded: HashMap<Box<str>, StringRef>,
    exact: HashMap<Box<str>, StringRef>,
}

impl StringPool {
    pub fn new() -> Self {
        StringPool {
            folded: HashMap::with_capacity(256),
            exact: HashMap::new(),
        }
    }

    /// Interns a name. `intern("Foo") == intern("foo")`.
    pub fn intern(&mut self, text: &str) -> StringRef {
        if let Some(existing) = self.folded.get(fold(text).as_str()) {
            return existing.clone();
        }

        let interned = StringRef { data: Arc::from(text) };
        self.folded.insert(fold(text).into_boxed_str(), interned.clone());
        interned
    }

    /// Interns a string constant, preserving case for identity.
    pub fn intern_case_sensitive(&mut self, text: &str) -> StringRef {
        if let Some(existing) = self.exact.get(text) {
            return existing.clone();
        }

        let interned = StringRef { data: Arc::from(text) };
        self.exact.insert(Box::from(text), interned.clone());
        interned
    }

    /// Looks up a name without inserting it.
    pub fn lookup(&self, text: &str) -> Option<StringRef> {
        self.folded.get(fold(text).as_str()).cloned()
    }

    pub fn len(&self) -> usize {
        self.folded.len() + self.exact.len()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

fn fold(text: &str) -> String {
    text.to_ascii_lowercase()
}
