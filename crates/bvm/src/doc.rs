//! The manager persona's document: a flat field namespace the manager's
//! `DocGroup`/`DocArray`/`DocAddText`/... host calls populate, plus the
//! inbound request fields `DocGetText`/... reads back out.
//!
//! The host ABI carries no "close group" call — opening a group or array just
//! switches which named collection subsequent `DocAdd*` calls target, the
//! same way a cursor addresses one collection at a time rather than nesting
//! an explicit stack. A manager module that never calls `DocGroup`/`DocArray`
//! writes its fields straight onto the document root.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DocScalar {
    Text(Vec<u8>),
    Blob(Vec<u8>),
    Num32(i32),
    Num64(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocField {
    Scalar(DocScalar),
    Group(BTreeMap<Vec<u8>, DocField>),
    Array(Vec<DocScalar>),
}

/// The request document a manager invocation reads its arguments from.
/// Built by the caller before the invocation starts; never mutated by it.
#[derive(Debug, Clone, Default)]
pub struct RequestDocument {
    fields: BTreeMap<Vec<u8>, DocScalar>,
}

impl RequestDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: &[u8], text: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(name.to_vec(), DocScalar::Text(text.into()));
        self
    }

    pub fn with_num32(mut self, name: &[u8], value: i32) -> Self {
        self.fields.insert(name.to_vec(), DocScalar::Num32(value));
        self
    }

    pub fn with_num64(mut self, name: &[u8], value: i64) -> Self {
        self.fields.insert(name.to_vec(), DocScalar::Num64(value));
        self
    }

    pub fn with_blob(mut self, name: &[u8], blob: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(name.to_vec(), DocScalar::Blob(blob.into()));
        self
    }

    fn get(&self, name: &[u8]) -> Option<&DocScalar> {
        self.fields.get(name)
    }
}

/// The document a manager invocation builds as its sole observable output.
#[derive(Debug, Clone, Default)]
pub struct Document {
    root: BTreeMap<Vec<u8>, DocField>,
}

#[derive(Debug, Clone)]
enum Target {
    Root,
    Group(Vec<u8>),
    Array(Vec<u8>),
}

/// Drives writes into a [`Document`]; tracks which named collection is
/// currently active so `doc_add_*` calls land in the right place.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    doc: Document,
    target: Option<Target>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn open_group(&mut self, name: &[u8]) {
        self.doc
            .root
            .entry(name.to_vec())
            .or_insert_with(|| DocField::Group(BTreeMap::new()));
        self.target = Some(Target::Group(name.to_vec()));
    }

    pub fn open_array(&mut self, name: &[u8]) {
        self.doc.root.entry(name.to_vec()).or_insert_with(|| DocField::Array(Vec::new()));
        self.target = Some(Target::Array(name.to_vec()));
    }

    fn push_scalar(&mut self, name: &[u8], value: DocScalar) {
        match self.target.clone() {
            None | Some(Target::Root) => {
                self.doc.root.insert(name.to_vec(), DocField::Scalar(value));
            }
            Some(Target::Group(group_name)) => {
                if let Some(DocField::Group(map)) = self.doc.root.get_mut(&group_name) {
                    map.insert(name.to_vec(), DocField::Scalar(value));
                }
            }
            Some(Target::Array(array_name)) => {
                if let Some(DocField::Array(values)) = self.doc.root.get_mut(&array_name) {
                    values.push(value);
                }
            }
        }
    }

    pub fn add_text(&mut self, name: &[u8], text: &[u8]) {
        self.push_scalar(name, DocScalar::Text(text.to_vec()));
    }

    pub fn add_blob(&mut self, name: &[u8], blob: &[u8]) {
        self.push_scalar(name, DocScalar::Blob(blob.to_vec()));
    }

    pub fn add_num32(&mut self, name: &[u8], value: i32) {
        self.push_scalar(name, DocScalar::Num32(value));
    }

    pub fn add_num64(&mut self, name: &[u8], value: i64) {
        self.push_scalar(name, DocScalar::Num64(value));
    }
}

impl RequestDocument {
    pub fn get_text(&self, name: &[u8]) -> Option<Vec<u8>> {
        match self.get(name) {
            Some(DocScalar::Text(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn get_blob(&self, name: &[u8]) -> Option<Vec<u8>> {
        match self.get(name) {
            Some(DocScalar::Blob(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn get_num32(&self, name: &[u8]) -> Option<i32> {
        match self.get(name) {
            Some(DocScalar::Num32(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_num64(&self, name: &[u8]) -> Option<i64> {
        match self.get(name) {
            Some(DocScalar::Num64(v)) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_added_before_any_group_land_on_the_root() {
        let mut b = DocumentBuilder::new();
        b.add_num32(b"height", 7);
        let doc = b.into_document();
        assert_eq!(doc.root.get(b"height".as_slice()), Some(&DocField::Scalar(DocScalar::Num32(7))));
    }

    #[test]
    fn group_fields_nest_under_their_group_name() {
        let mut b = DocumentBuilder::new();
        b.open_group(b"account");
        b.add_text(b"owner", b"alice");
        let doc = b.into_document();
        match doc.root.get(b"account".as_slice()) {
            Some(DocField::Group(map)) => {
                assert_eq!(map.get(b"owner".as_slice()), Some(&DocField::Scalar(DocScalar::Text(b"alice".to_vec()))));
            }
            other => panic!("expected a group, got {:?}", other),
        }
    }

    #[test]
    fn array_entries_append_in_call_order() {
        let mut b = DocumentBuilder::new();
        b.open_array(b"bids");
        b.add_num64(b"ignored-in-array-mode", 1);
        b.add_num64(b"ignored-in-array-mode", 2);
        let doc = b.into_document();
        match doc.root.get(b"bids".as_slice()) {
            Some(DocField::Array(values)) => {
                assert_eq!(values, &vec![DocScalar::Num64(1), DocScalar::Num64(2)]);
            }
            other => panic!("expected an array, got {:?}", other),
        }
    }

    #[test]
    fn request_document_round_trips_typed_fields() {
        let req = RequestDocument::new().with_num64(b"amount", 45).with_text(b"account", b"P");
        assert_eq!(req.get_num64(b"amount"), Some(45));
        assert_eq!(req.get_text(b"account"), Some(b"P".to_vec()));
        assert_eq!(req.get_num32(b"amount"), None);
    }
}
