//! Page concatenation of exported PDFs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cobranza_host::atomic_write;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::{Error, Result};

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Dropped while merging: the merged document gets a fresh page tree.
const TREE_TYPES: [&[u8]; 6] = [b"Catalog", b"Pages", b"Page", b"Outlines", b"Outline", b"XRef"];

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    match dict.get(b"Type") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

/// Nearest value of `key` on `page` or its ancestors.
fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut node = page;
    // Bounded walk in case of a cyclic Parent chain.
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_object(parent).and_then(Object::as_dict).ok()?;
    }
    None
}

/// Concatenate the pages of `inputs`, in order, into `output`.
///
/// Returns `None` without touching `output` when the inputs hold no pages at all.
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> Result<Option<PathBuf>> {
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for input in inputs {
        let mut doc = Document::load(input).map_err(|err| Error::Merge(format!("{}: {err}", input.display())))?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let mut page = doc.get_object(page_id)?.as_dict()?.clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = inherited(&doc, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            pages.push((page_id, page));
        }

        objects.extend(doc.objects.into_iter().filter(|(_, object)| {
            !type_name(object).is_some_and(|name| TREE_TYPES.contains(&name))
        }));
    }

    if pages.is_empty() {
        log::debug!("[merge] no pages in {} inputs; skipping {}", inputs.len(), output.display());
        return Ok(None);
    }

    let mut merged = Document::with_version("1.5");
    merged.objects = objects;
    merged.max_id = next_id;
    let pages_id = merged.new_object_id();

    let count = pages.len();
    let mut kids = Vec::with_capacity(count);
    for (page_id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count as i64),
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.compress();

    write_document(&mut merged, output)?;
    log::info!("[merge] wrote {} pages from {} files to {}", count, inputs.len(), output.display());
    Ok(Some(output.to_path_buf()))
}

fn write_document(doc: &mut Document, dest: &Path) -> Result<()> {
    atomic_write(dest, |w| doc.save_to(w).map_err(Error::from))
}
