use std::collections::HashMap;

pub type TagId = u32;

/// First byte of the wire form of a tag. Text starting with it is a tag
/// reference, not a literal.
pub const TAG_PREFIX: char = '\x01';

#[derive(Debug)]
struct TagEntry {
    text: String,
    refcount: u32,
}

/// Reference-counted table of tagged strings. Text is deduplicated ignoring
/// case, the spelling that was tagged first is kept. Ids start at 1 and are
/// not handed out again after their entry is released.
#[derive(Debug)]
pub struct TagTable {
    entries: HashMap<TagId, TagEntry>,
    by_text: HashMap<String, TagId>,
    next_id: TagId,
}

impl TagTable {
    pub fn new() -> Self {
        TagTable {
            entries: HashMap::new(),
            by_text: HashMap::new(),
            next_id: 1,
        }
    }

    /// Tags the text, adding a reference to an existing tag when the text
    /// was tagged before.
    pub fn tag(&mut self, text: &str) -> TagId {
        let folded = text.to_ascii_lowercase();
        if let Some(id) = self.by_text.get(&folded) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.refcount += 1;
                return *id;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, TagEntry { text: text.to_string(), refcount: 1 });
        self.by_text.insert(folded, id);
        id
    }

    /// Existing tag for the text, without adding a reference.
    pub fn lookup(&self, text: &str) -> Option<TagId> {
        self.by_text.get(&text.to_ascii_lowercase()).copied()
    }

    pub fn detag(&self, id: TagId) -> Option<&str> {
        self.entries.get(&id).map(|entry| entry.text.as_str())
    }

    /// Drops one reference. The text is freed once nothing references it.
    /// Returns false for an unknown tag.
    pub fn release(&mut self, id: TagId) -> bool {
        let remove = match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.refcount -= 1;
                entry.refcount == 0
            },
            None => return false,
        };

        if remove {
            if let Some(entry) = self.entries.remove(&id) {
                self.by_text.remove(&entry.text.to_ascii_lowercase());
            }
        }
        true
    }

    pub fn refcount(&self, id: TagId) -> u32 {
        self.entries.get(&id).map(|entry| entry.refcount).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TagTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form of a tag: the prefix byte followed by the decimal id.
pub fn encode(id: TagId) -> String {
    format!("{}{}", TAG_PREFIX, id)
}

/// Reverses `encode`. Only text carrying the tag prefix is a tag.
pub fn decode(text: &str) -> Option<TagId> {
    parse_digits(text.strip_prefix(TAG_PREFIX)?)
}

/// Like `decode`, but also accepts the bare decimal id. Functions taking a
/// tag as argument are called with both forms.
pub fn parse_tag(text: &str) -> Option<TagId> {
    parse_digits(text.strip_prefix(TAG_PREFIX).unwrap_or(text))
}

fn parse_digits(digits: &str) -> Option<TagId> {
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok()
}
