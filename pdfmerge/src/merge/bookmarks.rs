//! Outline (bookmark) entries for merged documents.
//!
//! Each source document contributes one top-level outline entry, titled
//! with its file name and pointing at the first page appended from it.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

use crate::error::Result;

/// One top-level outline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// Entry title shown by viewers.
    pub title: String,
    /// Page the entry jumps to.
    pub page: ObjectId,
}

impl OutlineEntry {
    /// Create an outline entry.
    pub fn new(title: impl Into<String>, page: ObjectId) -> Self {
        Self {
            title: title.into(),
            page,
        }
    }
}

/// Manager for PDF outlines.
#[derive(Debug, Default)]
pub struct BookmarkManager;

impl BookmarkManager {
    /// Create a new bookmark manager.
    pub fn new() -> Self {
        Self
    }

    /// Replace the document outline with `entries`.
    ///
    /// Returns the number of entries written. An empty list leaves the
    /// document untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no catalog.
    pub fn add_outline(&self, doc: &mut Document, entries: &[OutlineEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let outline_id = doc.new_object_id();
        let item_ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

        for (i, (entry, item_id)) in entries.iter().zip(&item_ids).enumerate() {
            // [page /XYZ null null null] keeps the viewer's zoom
            let dest = vec![
                Object::Reference(entry.page),
                Object::Name(b"XYZ".to_vec()),
                Object::Null,
                Object::Null,
                Object::Null,
            ];

            let mut item = Dictionary::new();
            item.set(
                "Title",
                Object::String(entry.title.as_bytes().to_vec(), StringFormat::Literal),
            );
            item.set("Parent", Object::Reference(outline_id));
            item.set("Dest", Object::Array(dest));
            if i > 0 {
                item.set("Prev", Object::Reference(item_ids[i - 1]));
            }
            if let Some(next) = item_ids.get(i + 1) {
                item.set("Next", Object::Reference(*next));
            }

            doc.objects.insert(*item_id, Object::Dictionary(item));
        }

        let mut outline = Dictionary::new();
        outline.set("Type", Object::Name(b"Outlines".to_vec()));
        outline.set("Count", Object::Integer(item_ids.len() as i64));
        if let (Some(first), Some(last)) = (item_ids.first(), item_ids.last()) {
            outline.set("First", Object::Reference(*first));
            outline.set("Last", Object::Reference(*last));
        }
        doc.objects.insert(outline_id, Object::Dictionary(outline));

        doc.catalog_mut()?
            .set("Outlines", Object::Reference(outline_id));

        Ok(item_ids.len())
    }

    /// Check if a document has an outline.
    pub fn has_bookmarks(&self, doc: &Document) -> bool {
        doc.catalog().is_ok_and(|catalog| catalog.has(b"Outlines"))
    }

    /// Titles of the top-level outline entries, in order.
    pub fn titles(&self, doc: &Document) -> Vec<String> {
        let mut titles = Vec::new();

        let Some(mut next) = doc
            .catalog()
            .and_then(|c| c.get(b"Outlines"))
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .and_then(|outline| outline.get(b"First"))
            .and_then(Object::as_reference)
            .ok()
        else {
            return titles;
        };

        // Bounded by the object count so a malformed cycle cannot spin forever
        for _ in 0..doc.objects.len() {
            let Ok(item) = doc.get_dictionary(next) else {
                break;
            };
            if let Ok(Object::String(bytes, _)) = item.get(b"Title") {
                titles.push(String::from_utf8_lossy(bytes).into_owned());
            }
            match item.get(b"Next").and_then(Object::as_reference) {
                Ok(id) => next = id,
                Err(_) => break,
            }
        }

        titles
    }
}
