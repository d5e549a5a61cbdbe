//! Page assembly for the merged document.
//!
//! [`MergedDocument`] starts from an empty page tree and appends selected
//! pages from each source in the order they are given. Selections may
//! repeat or reorder pages; every listed index becomes one output page.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::Metadata;
use crate::error::{PdfMergeError, Result};
use crate::merge::bookmarks::{BookmarkManager, OutlineEntry};
use crate::merge::metadata::MetadataManager;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Options applied when the merged document is finished.
#[derive(Debug, Clone, Default)]
pub struct FinishOptions {
    /// Add one outline entry per appended document.
    pub bookmarks: bool,
    /// Info dictionary contents.
    pub metadata: Metadata,
}

/// Output document under construction.
#[derive(Debug)]
pub struct MergedDocument {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    outline: Vec<OutlineEntry>,
}

impl MergedDocument {
    /// Create an empty output document.
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        document.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }
            .into(),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Self {
            document,
            pages_id,
            kids: Vec::new(),
            outline: Vec::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `selected` pages (zero-based) from `source`, in order.
    ///
    /// `source` is consumed: its objects move into the output and it is
    /// left empty. `title` names the outline entry for this source.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is out of range or the source page
    /// tree is malformed. Nothing is appended in that case.
    pub fn append(&mut self, source: &mut Document, selected: &[usize], title: &str) -> Result<usize> {
        if selected.is_empty() {
            return Ok(0);
        }

        source.renumber_objects_with(self.document.max_id + 1);
        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();

        let mut pages = Vec::with_capacity(selected.len());
        for &index in selected {
            let Some(&page_id) = source_pages.get(index) else {
                return Err(PdfMergeError::invalid_selection(
                    format!("{}", index + 1),
                    format!("{title} has only {} pages", source_pages.len()),
                ));
            };
            let mut page = source.get_dictionary(page_id)?.clone();
            inherit_attributes(source, &mut page);
            page.set("Parent", Object::Reference(self.pages_id));
            pages.push((page_id, page));
        }

        self.document.objects.append(&mut source.objects);
        self.document.max_id = self.document.max_id.max(source.max_id);

        let mut placed = BTreeSet::new();
        let mut first_page = None;
        for (page_id, page) in pages {
            let id = if placed.insert(page_id) {
                self.document.objects.insert(page_id, Object::Dictionary(page));
                page_id
            } else {
                // A repeated page needs its own page object
                self.document.add_object(page)
            };
            first_page.get_or_insert(id);
            self.kids.push(id);
        }

        if let Some(page) = first_page {
            self.outline.push(OutlineEntry::new(title, page));
        }

        debug!(title, pages = selected.len(), total = self.kids.len(), "Appended pages");
        Ok(selected.len())
    }

    /// Write the page tree, outline and metadata, and drop unreachable objects.
    pub fn finish(mut self, options: &FinishOptions) -> Result<Document> {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = self.document.get_object_mut(self.pages_id)?.as_dict_mut()?;
        pages.set("Kids", kids);
        pages.set("Count", self.kids.len() as i64);

        if options.bookmarks {
            BookmarkManager::new().add_outline(&mut self.document, &self.outline)?;
        }
        MetadataManager::new().set_metadata(&mut self.document, &options.metadata)?;

        // Source catalogs, page trees and unselected pages are unreachable now
        let pruned = self.document.prune_objects();
        debug!(pruned = pruned.len(), "Pruned unreachable objects");
        self.document.renumber_objects();

        Ok(self.document)
    }
}

impl Default for MergedDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy inheritable attributes from the page's ancestors onto the page.
fn inherit_attributes(source: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    // Bounded so a cyclic Parent chain cannot spin forever
    for _ in 0..source.objects.len() {
        let Some(node) = parent.and_then(|id| source.get_dictionary(id).ok()) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key.to_vec(), value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}
