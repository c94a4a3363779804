//! JSON-capable hierarchical document store.
//!
//! A `Document` is either *ordered* (an array: entries addressed by index)
//! or *unordered* (an object: entries addressed by key through a hash
//! index). Values are numbers, strings, booleans, null, or nested
//! documents.
//!
//! The JSON text side goes through the engine both ways: parsing scans the
//! input with a balanced `{}` / `[]` / `"` rule table (escape rules nested
//! inside strings as plain replacements), and serialization re-escapes
//! strings with a two-rule pass. The structural walk over the match tree is
//! in `build_object`/`build_array`.
//!
//! Key lookup uses a stable additive hash and an open-addressed table:
//! slot `(hash + level) % hash_base`, collisions recursing into a per-slot
//! sub-table with the level advanced by `slot + 2`. The hash must stay
//! identical across runs and platforms; templates and callers may persist
//! nothing, but rule tables and tests rely on deterministic lookups.

use once_cell::sync::Lazy;

use crate::engine::{self, Node, Rule, RuleSet};
use crate::text::{Buffer, Stream, number, soft_trim};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Undefined,
    Number,
    String,
    Document,
    False,
    True,
    Null,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub kind: ValueKind,
    pub key_id: usize,
    pub array_id: usize,
}

/// One slot of the open-addressed key index.
#[derive(Debug, Clone, Default)]
struct IndexCell {
    hash: u64,
    entry_id: usize,
    table: Vec<IndexCell>,
}

enum Value {
    Number(f64),
    String(Buffer),
    Document(Document),
    False,
    True,
    Null,
}

impl Value {
    fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Document(_) => ValueKind::Document,
            Value::False => ValueKind::False,
            Value::True => ValueKind::True,
            Value::Null => ValueKind::Null,
        }
    }
}

/// Ordered or unordered collection of typed values with JSON input/output.
#[derive(Debug, Clone)]
pub struct Document {
    ordered: bool,
    hash_base: u64,
    keys: Vec<Buffer>,
    table: Vec<IndexCell>,
    entries: Vec<Entry>,
    numbers: Vec<f64>,
    strings: Vec<Buffer>,
    documents: Vec<Document>,
}

impl Default for Document {
    fn default() -> Self {
        Document {
            ordered: false,
            hash_base: 17,
            keys: Vec::new(),
            table: Vec::new(),
            entries: Vec::new(),
            numbers: Vec::new(),
            strings: Vec::new(),
            documents: Vec::new(),
        }
    }
}

/// Stable key hash: positional weights advance by 256 per character.
pub(crate) fn key_hash(text: &[char], offset: usize, limit: usize) -> u64 {
    let mut hash: u64 = 0;
    let mut base: u64 = 1;

    for i in 0..limit {
        hash = hash.wrapping_add(text[offset + i] as u64).wrapping_add(base);
        base += 256;
    }

    hash
}

fn insert_index(table: &mut Vec<IndexCell>, hash_base: u64, level: u64, hash: u64, entry_id: usize) {
    let slot = ((hash.wrapping_add(level)) % hash_base) as usize;

    if table.len() <= slot {
        table.resize(slot + 1, IndexCell::default());
    }

    if table[slot].hash == 0 {
        table[slot].hash = hash;
        table[slot].entry_id = entry_id;
        return;
    }

    let next_level = level + slot as u64 + 2;
    insert_index(&mut table[slot].table, hash_base, next_level, hash, entry_id);
}

const JSON_OBJECT_OPEN: &[char] = &['{'];
const JSON_OBJECT_CLOSE: &[char] = &['}'];
const JSON_ARRAY_OPEN: &[char] = &['['];
const JSON_ARRAY_CLOSE: &[char] = &[']'];
const JSON_COMMA: &[char] = &[','];
const JSON_COLON: &[char] = &[':'];
const JSON_QUOTE: &[char] = &['"'];
const JSON_TRUE: &[char] = &['t', 'r', 'u', 'e'];
const JSON_FALSE: &[char] = &['f', 'a', 'l', 's', 'e'];
const JSON_NULL: &[char] = &['n', 'u', 'l', 'l'];

static JSON_RULES: Lazy<RuleSet<()>> = Lazy::new(json_rules);
static ESCAPE_RULES: Lazy<RuleSet<()>> = Lazy::new(escape_rules);
static COMMENT_RULES: Lazy<RuleSet<()>> = Lazy::new(comment_rules);

fn json_rules() -> RuleSet<()> {
    let mut set = RuleSet::new();

    let esc_esc = set.push(Rule::new("\\\\").replace("\\"));
    let esc_quote = set.push(Rule::new("\\\"").replace("\""));

    let quote_end = set.push(Rule::new("\""));
    let quote = set.push(Rule::new("\""));
    set.connect(quote, quote_end);
    set.nest(quote_end, &[esc_esc, esc_quote]);

    let curly_end = set.push(Rule::new("}"));
    let curly = set.push(Rule::new("{"));
    set.connect(curly, curly_end);

    let square_end = set.push(Rule::new("]"));
    let square = set.push(Rule::new("["));
    set.connect(square, square_end);

    set.nest(curly_end, &[curly, quote, square]);
    set.nest(square_end, &[square, quote, curly]);

    set.set_roots(&[curly, square]);
    set
}

/// `\` is escaped only when standing before another `\`, a space, or the
/// end of the text; anything else already reads as an escape sequence.
fn backslash_probe(text: &[char], at: usize, end: usize) -> Option<usize> {
    if text[at] != '\\' {
        return None;
    }

    let next = at + 1;
    if next == end || text[next] == '\\' || text[next] == ' ' { Some(1) } else { None }
}

fn escape_rules() -> RuleSet<()> {
    let mut set = RuleSet::new();
    let esc = set.push(Rule::probe(backslash_probe).replace("\\\\"));
    let quote = set.push(Rule::new("\"").replace("\\\""));
    set.set_roots(&[esc, quote]);
    set
}

fn comment_rules() -> RuleSet<()> {
    let mut set = RuleSet::new();

    let block_end = set.push(Rule::new("*/").replace("\n"));
    let block = set.push(Rule::new("/*"));
    set.connect(block, block_end);

    let line_end = set.push(Rule::new("\n").replace("\n"));
    let line = set.push(Rule::new("//"));
    set.connect(line, line_end);

    set.set_roots(&[block, line]);
    set
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// An empty ordered document (an array).
    pub fn new_ordered() -> Self {
        Document { ordered: true, ..Document::default() }
    }

    pub fn from_numbers(values: &[f64]) -> Self {
        let mut doc = Document::new_ordered();
        for &value in values {
            doc.push_f64(value);
        }
        doc
    }

    pub fn from_strings(values: &[&str]) -> Self {
        let mut doc = Document::new_ordered();
        for value in values {
            doc.push_string(value);
        }
        doc
    }

    /// Parse JSON text. Anything that does not open with a balanced object
    /// or array yields an empty document.
    pub fn from_json(content: &str) -> Self {
        let text: Vec<char> = content.chars().collect();
        Self::from_json_span(&text, 0, text.len())
    }

    /// Parse JSON text after stripping `/* ... */` and `// ...` comments.
    pub fn from_json_with_comments(content: &str) -> Self {
        let text: Vec<char> = content.chars().collect();
        let items = engine::scan(&COMMENT_RULES, &text, 0, text.len());
        let clean = engine::render(&COMMENT_RULES, &items, &text, 0, text.len(), &());
        Self::from_json_span(clean.as_slice(), 0, clean.len())
    }

    pub(crate) fn from_json_span(text: &[char], offset: usize, limit: usize) -> Self {
        let items = engine::scan(&JSON_RULES, text, offset, limit);

        match items.first() {
            Some(root) => build_list(&root.children, text, root.offset, root.length),
            None => Document::default(),
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Number of entries (including tombstoned ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // --- Hash index ---------------------------------------------------------

    fn find_entry_id(&self, hash: u64) -> Option<usize> {
        let mut table = &self.table;
        let mut level: u64 = 0;

        loop {
            let slot = ((hash.wrapping_add(level)) % self.hash_base) as usize;
            let cell = table.get(slot)?;

            if cell.hash == 0 {
                return None;
            }
            if cell.hash == hash {
                return Some(cell.entry_id);
            }

            level = level + slot as u64 + 2;
            table = &cell.table;
        }
    }

    /// Rebuild the key index with a new bucket base (a prime), optionally
    /// recursing into nested documents.
    pub fn rehash(&mut self, new_base: u64, children: bool) {
        self.table.clear();
        self.hash_base = new_base.max(1);

        for id in 0..self.entries.len() {
            let entry = self.entries[id];

            if !self.ordered {
                if let Some(key) = self.keys.get(entry.key_id) {
                    let hash = key_hash(key.as_slice(), 0, key.len());
                    insert_index(&mut self.table, self.hash_base, 0, hash, id);
                }
            }

            if children && entry.kind == ValueKind::Document {
                self.documents[entry.array_id].rehash(new_base, true);
            }
        }
    }

    // --- Mutation -----------------------------------------------------------

    fn store(&mut self, value: Value) -> usize {
        match value {
            Value::Number(n) => {
                self.numbers.push(n);
                self.numbers.len() - 1
            }
            Value::String(s) => {
                self.strings.push(s);
                self.strings.len() - 1
            }
            Value::Document(d) => {
                self.documents.push(d);
                self.documents.len() - 1
            }
            Value::False | Value::True | Value::Null => 0,
        }
    }

    fn clear_slot(&mut self, entry: Entry) {
        match entry.kind {
            ValueKind::String => self.strings[entry.array_id] = Buffer::new(),
            ValueKind::Document => self.documents[entry.array_id] = Document::default(),
            _ => {}
        }
    }

    fn insert(&mut self, key: &[char], offset: usize, limit: usize, value: Value) {
        let hash = key_hash(key, offset, limit);
        let kind = value.kind();

        match self.find_entry_id(hash) {
            Some(id) => {
                let entry = self.entries[id];
                if entry.kind == kind {
                    match value {
                        Value::Number(n) => self.numbers[entry.array_id] = n,
                        Value::String(s) => self.strings[entry.array_id] = s,
                        Value::Document(d) => self.documents[entry.array_id] = d,
                        _ => {}
                    }
                } else {
                    let array_id = self.store(value);
                    self.clear_slot(entry);
                    self.entries[id].kind = kind;
                    self.entries[id].array_id = array_id;
                }
            }
            None => {
                let array_id = self.store(value);
                insert_index(&mut self.table, self.hash_base, 0, hash, self.entries.len());
                self.entries.push(Entry { kind, key_id: self.keys.len(), array_id });
                self.keys.push(Buffer::part(key, offset, limit));
            }
        }
    }

    /// Register a key for an already-stored value (JSON building).
    fn insert_hash(&mut self, array_id: usize, key: &[char], offset: usize, limit: usize, kind: ValueKind) {
        let hash = key_hash(key, offset, limit);
        insert_index(&mut self.table, self.hash_base, 0, hash, self.entries.len());
        self.entries.push(Entry { kind, key_id: self.keys.len(), array_id });
        self.keys.push(Buffer::part(key, offset, limit));
    }

    fn insert_keyed(&mut self, key: &str, value: Value) {
        let key: Vec<char> = key.chars().collect();
        self.insert(&key, 0, key.len(), value);
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.insert_keyed(key, Value::String(Buffer::from(value)));
    }

    pub fn set_f64(&mut self, key: &str, value: f64) {
        self.insert_keyed(key, Value::Number(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.insert_keyed(key, if value { Value::True } else { Value::False });
    }

    pub fn set_null(&mut self, key: &str) {
        self.insert_keyed(key, Value::Null);
    }

    pub fn set_document(&mut self, key: &str, value: Document) {
        self.insert_keyed(key, Value::Document(value));
    }

    fn push_entry(&mut self, value: Value) {
        self.ordered = true;
        let kind = value.kind();
        let array_id = self.store(value);
        self.entries.push(Entry { kind, key_id: 0, array_id });
    }

    pub fn push_f64(&mut self, value: f64) {
        self.push_entry(Value::Number(value));
    }

    pub fn push_string(&mut self, value: &str) {
        self.push_entry(Value::String(Buffer::from(value)));
    }

    pub fn push_bool(&mut self, value: bool) {
        self.push_entry(if value { Value::True } else { Value::False });
    }

    pub fn push_null(&mut self) {
        self.push_entry(Value::Null);
    }

    pub fn push_document(&mut self, value: Document) {
        self.push_entry(Value::Document(value));
    }

    /// Override an entry of an ordered document by index.
    pub fn set_index_f64(&mut self, index: usize, value: f64) {
        self.set_entry_value(index, Value::Number(value));
    }

    /// Override an entry of an ordered document by index.
    pub fn set_index_string(&mut self, index: usize, value: &str) {
        self.set_entry_value(index, Value::String(Buffer::from(value)));
    }

    fn set_entry_value(&mut self, index: usize, value: Value) {
        while self.entries.len() <= index {
            self.push_null();
        }

        let entry = self.entries[index];
        let kind = value.kind();

        if entry.kind == kind {
            match value {
                Value::Number(n) => self.numbers[entry.array_id] = n,
                Value::String(s) => self.strings[entry.array_id] = s,
                Value::Document(d) => self.documents[entry.array_id] = d,
                _ => {}
            }
        } else {
            let array_id = self.store(value);
            self.clear_slot(entry);
            self.entries[index].kind = kind;
            self.entries[index].array_id = array_id;
        }
    }

    /// Merge another document into this one. Ordered merges append;
    /// unordered merges upsert by key. Mixing the two on a non-empty
    /// target is a no-op.
    pub fn merge(&mut self, doc: &Document) {
        if self.ordered != doc.ordered {
            if !self.entries.is_empty() {
                return;
            }
            self.ordered = doc.ordered;
        }

        for entry in &doc.entries {
            let value = match entry.kind {
                ValueKind::Number => Value::Number(doc.numbers[entry.array_id]),
                ValueKind::String => Value::String(doc.strings[entry.array_id].clone()),
                ValueKind::Document => Value::Document(doc.documents[entry.array_id].clone()),
                ValueKind::True => Value::True,
                ValueKind::False => Value::False,
                ValueKind::Null => Value::Null,
                ValueKind::Undefined => continue,
            };

            if self.ordered {
                self.push_entry(value);
            } else {
                let key = doc.keys[entry.key_id].clone();
                self.insert(key.as_slice(), 0, key.len(), value);
            }
        }
    }

    /// Tombstone the entry at `key`, releasing its storage.
    pub fn drop_key(&mut self, key: &str) {
        let path: Vec<char> = key.chars().collect();
        let segments = path_segments(&path, 0, path.len());
        let Some((&last, init)) = segments.split_last() else {
            return;
        };

        let mut doc = self;
        for &(start, end) in init {
            let Some(entry) = doc.lookup_segment(&path, start, end) else {
                return;
            };
            if entry.kind != ValueKind::Document {
                return;
            }
            doc = &mut doc.documents[entry.array_id];
        }

        let Some(id) = doc.lookup_segment_id(&path, last.0, last.1) else {
            return;
        };
        let entry = doc.entries[id];
        doc.clear_slot(entry);
        doc.entries[id].kind = ValueKind::Undefined;
        if !doc.ordered {
            if let Some(slot) = doc.keys.get_mut(entry.key_id) {
                *slot = Buffer::new();
            }
        }
    }

    // --- Lookup -------------------------------------------------------------

    fn lookup_segment_id(&self, key: &[char], start: usize, end: usize) -> Option<usize> {
        if self.ordered {
            let id = number::parse_u64(key, start, end - start)? as usize;
            if id < self.entries.len() { Some(id) } else { None }
        } else {
            self.find_entry_id(key_hash(key, start, end - start))
        }
    }

    fn lookup_segment(&self, key: &[char], start: usize, end: usize) -> Option<Entry> {
        self.lookup_segment_id(key, start, end).map(|id| self.entries[id])
    }

    /// Resolve a `name[sub][2]` path to the holding document and entry. For
    /// a document-typed entry the returned reference is the nested document
    /// itself.
    fn get_source(&self, key: &[char], offset: usize, limit: usize) -> Option<(&Document, Entry)> {
        let segments = path_segments(key, offset, limit);
        let mut doc = self;
        let mut found: Option<Entry> = None;

        for (start, end) in segments {
            if let Some(entry) = found {
                if entry.kind != ValueKind::Document {
                    return None;
                }
                doc = &doc.documents[entry.array_id];
            }
            found = Some(doc.lookup_segment(key, start, end)?);
        }

        let entry = found?;
        if entry.kind == ValueKind::Document {
            Some((&doc.documents[entry.array_id], entry))
        } else {
            Some((doc, entry))
        }
    }

    pub(crate) fn entry_at(&self, index: usize) -> Option<Entry> {
        self.entries.get(index).copied()
    }

    pub(crate) fn key_text(&self, entry: Entry) -> Option<&Buffer> {
        self.keys.get(entry.key_id)
    }

    /// Entry value rendered as text; numbers use three fraction digits.
    pub(crate) fn entry_text(&self, entry: Entry) -> Option<Buffer> {
        match entry.kind {
            ValueKind::Number => Some(number::format_f64(self.numbers[entry.array_id], 1, 0, 3)),
            ValueKind::String => Some(self.strings[entry.array_id].clone()),
            ValueKind::False => Some(Buffer::from("false")),
            ValueKind::True => Some(Buffer::from("true")),
            ValueKind::Null => Some(Buffer::from("null")),
            ValueKind::Document | ValueKind::Undefined => None,
        }
    }

    pub(crate) fn get_string_span(&self, key: &[char], offset: usize, limit: usize) -> Option<Buffer> {
        let (storage, entry) = self.get_source(key, offset, limit)?;
        storage.entry_text(entry)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        let path: Vec<char> = key.chars().collect();
        self.get_string_span(&path, 0, path.len()).map(|buffer| buffer.to_string())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        let path: Vec<char> = key.chars().collect();
        let (storage, entry) = self.get_source(&path, 0, path.len())?;

        match entry.kind {
            ValueKind::Number => Some(storage.numbers[entry.array_id]),
            ValueKind::String => {
                let s = &storage.strings[entry.array_id];
                number::parse_f64(s.as_slice(), 0, s.len())
            }
            ValueKind::False | ValueKind::Null => Some(0.0),
            ValueKind::True => Some(1.0),
            ValueKind::Document | ValueKind::Undefined => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let path: Vec<char> = key.chars().collect();
        let (storage, entry) = self.get_source(&path, 0, path.len())?;

        match entry.kind {
            ValueKind::Number => Some(storage.numbers[entry.array_id] as u64),
            ValueKind::String => {
                let s = &storage.strings[entry.array_id];
                number::parse_u64(s.as_slice(), 0, s.len())
            }
            ValueKind::False | ValueKind::Null => Some(0),
            ValueKind::True => Some(1),
            ValueKind::Document | ValueKind::Undefined => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let path: Vec<char> = key.chars().collect();
        let (storage, entry) = self.get_source(&path, 0, path.len())?;

        match entry.kind {
            ValueKind::Number => Some(storage.numbers[entry.array_id] > 0.0),
            ValueKind::String => Some(storage.strings[entry.array_id] == "true"),
            ValueKind::False | ValueKind::Null => Some(false),
            ValueKind::True => Some(true),
            ValueKind::Document | ValueKind::Undefined => None,
        }
    }

    pub(crate) fn get_document_span(&self, key: &[char], offset: usize, limit: usize) -> Option<&Document> {
        let (storage, entry) = self.get_source(key, offset, limit)?;
        if entry.kind == ValueKind::Document { Some(storage) } else { None }
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        let path: Vec<char> = key.chars().collect();
        self.get_document_span(&path, 0, path.len())
    }

    /// Mutable access to a nested document along a path.
    pub fn get_document_mut(&mut self, key: &str) -> Option<&mut Document> {
        let path: Vec<char> = key.chars().collect();
        let segments = path_segments(&path, 0, path.len());
        if segments.is_empty() {
            return None;
        }

        let mut doc = self;
        for (start, end) in segments {
            let entry = doc.lookup_segment(&path, start, end)?;
            if entry.kind != ValueKind::Document {
                return None;
            }
            doc = &mut doc.documents[entry.array_id];
        }

        Some(doc)
    }

    // --- JSON output --------------------------------------------------------

    pub fn to_json(&self) -> String {
        self.to_json_buffer().to_string()
    }

    fn to_json_buffer(&self) -> Buffer {
        let mut out = Stream::new();

        if self.ordered {
            out.push_borrowed(JSON_ARRAY_OPEN);

            for entry in &self.entries {
                if out.len() != 1 {
                    out.push_borrowed(JSON_COMMA);
                }
                self.push_entry_json(&mut out, entry);
            }

            out.push_borrowed(JSON_ARRAY_CLOSE);
        } else {
            out.push_borrowed(JSON_OBJECT_OPEN);

            for entry in &self.entries {
                if entry.kind == ValueKind::Undefined {
                    continue;
                }
                if out.len() != 1 {
                    out.push_borrowed(JSON_COMMA);
                }
                out.push_borrowed(JSON_QUOTE);
                out.push_borrowed(self.keys[entry.key_id].as_slice());
                out.push_borrowed(JSON_QUOTE);
                out.push_borrowed(JSON_COLON);
                self.push_entry_json(&mut out, entry);
            }

            out.push_borrowed(JSON_OBJECT_CLOSE);
        }

        out.eject()
    }

    fn push_entry_json<'a>(&'a self, out: &mut Stream<'a>, entry: &Entry) {
        match entry.kind {
            ValueKind::Number => out.push_owned(number::format_f64(self.numbers[entry.array_id], 1, 0, 15)),
            ValueKind::String => {
                out.push_borrowed(JSON_QUOTE);
                let value = &self.strings[entry.array_id];
                if value.as_slice().iter().any(|&c| c == '\\' || c == '"') {
                    let items = engine::scan(&ESCAPE_RULES, value.as_slice(), 0, value.len());
                    out.push_owned(engine::render(&ESCAPE_RULES, &items, value.as_slice(), 0, value.len(), &()));
                } else {
                    out.push_borrowed(value.as_slice());
                }
                out.push_borrowed(JSON_QUOTE);
            }
            ValueKind::Document => out.push_owned(self.documents[entry.array_id].to_json_buffer()),
            ValueKind::False => out.push_borrowed(JSON_FALSE),
            ValueKind::True => out.push_borrowed(JSON_TRUE),
            ValueKind::Null | ValueKind::Undefined => out.push_borrowed(JSON_NULL),
        }
    }
}

/// Break `name[sub][2]` into `(start, end)` half-open segments.
fn path_segments(key: &[char], offset: usize, limit: usize) -> Vec<(usize, usize)> {
    if limit == 0 {
        return Vec::new();
    }

    let outer_end = offset + limit;
    let mut segments = Vec::new();

    if key[outer_end - 1] != ']' {
        segments.push((offset, outer_end));
        return segments;
    }

    let end = outer_end - 1;
    let mut i = offset;
    while i < outer_end && key[i] != '[' {
        i += 1;
    }
    segments.push((offset, i));

    let mut j = i;
    while j < end {
        let start = j + 1;
        let mut k = start;
        while k < end && key[k] != ']' {
            k += 1;
        }
        segments.push((start, k));

        j = k;
        while j < end && key[j] != '[' {
            j += 1;
        }
    }

    segments
}

/// Turn a balanced-delimiter match tree into a document. Dispatch on the
/// opening character: `{` builds keyed entries, anything else an ordered
/// list.
fn build_list(children: &[Node], text: &[char], offset: usize, length: usize) -> Document {
    if text.get(offset) == Some(&'{') {
        build_object(children, text, offset, length)
    } else {
        build_array(children, text, offset, length)
    }
}

fn string_value(item: &Node, text: &[char]) -> Buffer {
    if item.children.is_empty() {
        Buffer::part(text, item.offset + 1, item.length - 2)
    } else {
        engine::render(&JSON_RULES, &item.children, text, item.offset + 1, item.length - 2, &())
    }
}

/// Classify a bare JSON value by its first character, the way the matcher
/// left it: `t`/`f`/`n` win regardless of the rest, anything else must
/// parse as a number or the value is skipped.
fn primitive_value(text: &[char], offset: usize, limit: usize) -> Option<Value> {
    let mut offset = offset;
    let mut limit = limit;
    soft_trim(text, &mut offset, &mut limit);

    match text.get(offset).copied() {
        Some('f') => Some(Value::False),
        Some('t') => Some(Value::True),
        Some('n') => Some(Value::Null),
        _ => number::parse_f64(text, offset, limit).map(Value::Number),
    }
}

fn build_object(children: &[Node], text: &[char], offset: usize, length: usize) -> Document {
    let mut document = Document::default();
    let end = offset + length;
    let mut item_id = 0;
    let mut value_start = offset + 1;

    while item_id < children.len() {
        let key = &children[item_id];
        item_id += 1;

        let key_offset = key.offset + 1;
        let key_limit = key.length.saturating_sub(2);
        let mut x = key.end();

        while x < end {
            while x < end && text[x] == ' ' {
                x += 1;
            }
            if x >= end {
                break;
            }

            match text[x] {
                ',' | '}' => {
                    match primitive_value(text, value_start, x - value_start) {
                        Some(Value::Number(n)) => {
                            document.insert_hash(document.numbers.len(), text, key_offset, key_limit, ValueKind::Number);
                            document.numbers.push(n);
                        }
                        Some(value) => {
                            let kind = value.kind();
                            document.insert_hash(0, text, key_offset, key_limit, kind);
                        }
                        None => {}
                    }
                    break;
                }
                '"' => {
                    let Some(item) = children.get(item_id) else {
                        break;
                    };
                    item_id += 1;
                    document.insert_hash(document.strings.len(), text, key_offset, key_limit, ValueKind::String);
                    let value = string_value(item, text);
                    document.strings.push(value);
                    break;
                }
                ':' => {
                    value_start = x + 1;
                    x += 1;
                }
                '{' | '[' => {
                    let Some(item) = children.get(item_id) else {
                        break;
                    };
                    item_id += 1;
                    document.insert_hash(document.documents.len(), text, key_offset, key_limit, ValueKind::Document);
                    let nested = build_list(&item.children, text, item.offset, item.length);
                    document.documents.push(nested);
                    break;
                }
                _ => {
                    x += 1;
                }
            }
        }
    }

    document
}

fn build_array(children: &[Node], text: &[char], offset: usize, length: usize) -> Document {
    let mut document = Document::new_ordered();
    let end = offset + length;
    let mut item_id = 0;
    let mut value_start = offset + 1;
    let mut consumed = false;
    let mut x = value_start;

    while x < end {
        while x < end && text[x] == ' ' {
            x += 1;
        }
        if x >= end {
            break;
        }

        match text[x] {
            ',' | ']' => {
                if !consumed {
                    match primitive_value(text, value_start, x - value_start) {
                        Some(Value::Number(n)) => {
                            document.entries.push(Entry {
                                kind: ValueKind::Number,
                                key_id: 0,
                                array_id: document.numbers.len(),
                            });
                            document.numbers.push(n);
                        }
                        Some(value) => {
                            let kind = value.kind();
                            document.entries.push(Entry { kind, key_id: 0, array_id: 0 });
                        }
                        None => {}
                    }
                }
                value_start = x + 1;
                consumed = false;
            }
            '"' => {
                let Some(item) = children.get(item_id) else {
                    break;
                };
                item_id += 1;
                document.entries.push(Entry { kind: ValueKind::String, key_id: 0, array_id: document.strings.len() });
                let value = string_value(item, text);
                document.strings.push(value);
                x = item.end() - 1;
                consumed = true;
            }
            '{' | '[' => {
                let Some(item) = children.get(item_id) else {
                    break;
                };
                item_id += 1;
                document.entries.push(Entry {
                    kind: ValueKind::Document,
                    key_id: 0,
                    array_id: document.documents.len(),
                });
                let nested = build_list(&item.children, text, item.offset, item.length);
                document.documents.push(nested);
                x = item.end() - 1;
                consumed = true;
            }
            _ => {}
        }

        x += 1;
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        let key: Vec<char> = "numbers".chars().collect();
        let first = key_hash(&key, 0, key.len());
        let second = key_hash(&key, 0, key.len());
        assert_eq!(first, second);
        assert_ne!(first, 0);

        // Position matters.
        let ab: Vec<char> = "ab".chars().collect();
        let ba: Vec<char> = "ba".chars().collect();
        assert_ne!(key_hash(&ab, 0, 2), key_hash(&ba, 0, 2));
    }

    #[test]
    fn parses_an_object() {
        let doc = Document::from_json(r#"{"name": "qt", "count": 3, "on": true, "off": false, "gap": null}"#);

        assert!(!doc.is_ordered());
        assert_eq!(doc.get_string("name").as_deref(), Some("qt"));
        assert_eq!(doc.get_f64("count"), Some(3.0));
        assert_eq!(doc.get_bool("on"), Some(true));
        assert_eq!(doc.get_bool("off"), Some(false));
        assert_eq!(doc.get_string("gap").as_deref(), Some("null"));
        assert_eq!(doc.get_string("missing"), None);
    }

    #[test]
    fn parses_arrays_and_nesting() {
        let doc = Document::from_json(r#"{"numbers": [1, 2.5, -3], "names": ["a", "b"], "inner": {"k": "v"}}"#);

        assert_eq!(doc.get_f64("numbers[0]"), Some(1.0));
        assert_eq!(doc.get_f64("numbers[1]"), Some(2.5));
        assert_eq!(doc.get_f64("numbers[2]"), Some(-3.0));
        assert_eq!(doc.get_string("names[1]").as_deref(), Some("b"));
        assert_eq!(doc.get_string("inner[k]").as_deref(), Some("v"));
        assert_eq!(doc.get_f64("numbers[9]"), None);

        let numbers = doc.get_document("numbers").unwrap();
        assert!(numbers.is_ordered());
        assert_eq!(numbers.len(), 3);
    }

    #[test]
    fn string_escapes_round_trip() {
        let doc = Document::from_json(r#"{"path": "a\\b", "say": "\"hi\""}"#);

        assert_eq!(doc.get_string("path").as_deref(), Some("a\\b"));
        assert_eq!(doc.get_string("say").as_deref(), Some("\"hi\""));

        let json = doc.to_json();
        let again = Document::from_json(&json);
        assert_eq!(again.get_string("path"), doc.get_string("path"));
        assert_eq!(again.get_string("say"), doc.get_string("say"));
    }

    #[test]
    fn serializes_back_to_json() {
        let mut doc = Document::new();
        doc.set_string("name", "qt");
        doc.set_f64("count", 3.0);
        doc.set_bool("on", true);
        doc.set_null("gap");
        doc.set_document("list", Document::from_numbers(&[1.0, 2.0]));

        assert_eq!(doc.to_json(), r#"{"name":"qt","count":3,"on":true,"gap":null,"list":[1,2]}"#);
    }

    #[test]
    fn comments_are_stripped_on_request() {
        let doc = Document::from_json_with_comments(
            "{\"a\": 1, // trailing\n\"b\": 2 /* \"c\": 3 */}",
        );

        assert_eq!(doc.get_f64("a"), Some(1.0));
        assert_eq!(doc.get_f64("b"), Some(2.0));
        assert_eq!(doc.get_f64("c"), None);
    }

    #[test]
    fn keyed_updates_replace_in_place() {
        let mut doc = Document::new();
        doc.set_f64("k", 1.0);
        doc.set_f64("k", 2.0);
        assert_eq!(doc.get_f64("k"), Some(2.0));

        // A type change re-slots the value.
        doc.set_string("k", "now a string");
        assert_eq!(doc.get_string("k").as_deref(), Some("now a string"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn ordered_overrides_by_index() {
        let mut doc = Document::from_numbers(&[1.0, 2.0, 3.0]);
        doc.set_index_f64(0, 0.0);
        doc.push_f64(9.0);

        assert_eq!(doc.get_f64("0"), Some(0.0));
        assert_eq!(doc.get_f64("3"), Some(9.0));
        assert_eq!(doc.to_json(), "[0,2,3,9]");
    }

    #[test]
    fn merge_appends_or_upserts() {
        let mut numbers = Document::from_numbers(&[1.0]);
        numbers.merge(&Document::from_numbers(&[2.0, 3.0]));
        assert_eq!(numbers.to_json(), "[1,2,3]");

        let mut doc = Document::from_json(r#"{"a": "A", "b": "old"}"#);
        doc.merge(&Document::from_json(r#"{"b": "B", "c": "C"}"#));
        assert_eq!(doc.get_string("a").as_deref(), Some("A"));
        assert_eq!(doc.get_string("b").as_deref(), Some("B"));
        assert_eq!(doc.get_string("c").as_deref(), Some("C"));

        // Mixing ordered and unordered on a non-empty target is refused.
        let mut doc = Document::from_json(r#"{"a": 1}"#);
        doc.merge(&Document::from_numbers(&[1.0]));
        assert!(!doc.is_ordered());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn drop_tombstones_the_entry() {
        let mut doc = Document::from_json(r#"{"a": 1, "b": "keep"}"#);
        doc.drop_key("a");

        assert_eq!(doc.get_string("b").as_deref(), Some("keep"));
        assert_eq!(doc.to_json(), r#"{"b":"keep"}"#);
    }

    #[test]
    fn lookups_survive_a_rehash() {
        let mut doc = Document::from_json(r#"{"a": 1, "bb": 2, "ccc": {"inner": 3}}"#);
        doc.rehash(97, true);

        assert_eq!(doc.get_f64("a"), Some(1.0));
        assert_eq!(doc.get_f64("bb"), Some(2.0));
        assert_eq!(doc.get_f64("ccc[inner]"), Some(3.0));
    }

    #[test]
    fn deep_paths_and_mutable_access() {
        let mut doc = Document::from_json(r#"{"outer": {"list": [10, 20]}}"#);

        assert_eq!(doc.get_f64("outer[list][1]"), Some(20.0));

        let list = doc.get_document_mut("outer[list]").unwrap();
        list.set_index_f64(1, 25.0);
        assert_eq!(doc.get_f64("outer[list][1]"), Some(25.0));
    }

    #[test]
    fn malformed_json_yields_an_empty_document() {
        assert!(Document::from_json("").is_empty());
        assert!(Document::from_json("just text").is_empty());
        assert!(Document::from_json("{\"open\": ").is_empty());
    }
}
