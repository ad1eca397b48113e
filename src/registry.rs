/*!
The extractor registry.

Built-in extractors are registered explicitly at startup; a name table
plus two reverse indexes (by extension, by MIME type) replace any kind of
runtime discovery. Duplicate claims resolve first-registered-wins and are
logged, so a stray handler cannot silently shadow an earlier one.
*/

use std::collections::BTreeMap;

use log::warn;
use once_cell::sync::Lazy;

use crate::extract::FileHandler;
use crate::extract::docx::DocxHandler;
use crate::extract::pdf::PdfHandler;
use crate::extract::plaintext::PlaintextHandler;
use crate::extract::xls::XlsHandler;
use crate::extract::xlsx::XlsxHandler;

static BUILTIN: &[&dyn FileHandler] = &[
    &PlaintextHandler,
    &DocxHandler,
    &XlsxHandler,
    &XlsHandler,
    &PdfHandler,
];

pub struct HandlerRegistry {
    by_name: BTreeMap<&'static str, &'static dyn FileHandler>,
    by_ext: BTreeMap<String, &'static str>,
    by_mime: BTreeMap<String, &'static str>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    fn build(handlers: &[&'static dyn FileHandler]) -> Self {
        let mut by_name = BTreeMap::new();
        let mut by_ext = BTreeMap::new();
        let mut by_mime = BTreeMap::new();

        for handler in handlers {
            let name = handler.name();
            if by_name.insert(name, *handler).is_some() {
                warn!(target: "registry", "duplicate file handler name {name}; keeping the first");
                continue;
            }
            let handles = handler.handles();
            for ext in handles.exts {
                let key = ext.to_ascii_lowercase();
                if let Some(existing) = by_ext.get(&key) {
                    warn!(
                        target: "registry",
                        "extension {ext} claimed by both {existing} and {name}; keeping {existing}",
                    );
                } else {
                    by_ext.insert(key, name);
                }
            }
            for mime in handles.mimes {
                if let Some(existing) = by_mime.get(*mime) {
                    warn!(
                        target: "registry",
                        "MIME type {mime} claimed by both {existing} and {name}; keeping {existing}",
                    );
                } else {
                    by_mime.insert((*mime).to_owned(), name);
                }
            }
        }

        Self {
            by_name,
            by_ext,
            by_mime,
        }
    }

    /// Resolve an admitted file to its handler name: extension first, MIME
    /// second.
    #[must_use]
    pub fn handler_for(&self, ext: &str, mime: Option<&str>) -> Option<&'static str> {
        if let Some(name) = self.by_ext.get(&ext.to_ascii_lowercase()) {
            return Some(name);
        }
        mime.and_then(|m| self.by_mime.get(m).copied())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static dyn FileHandler> {
        self.by_name.get(name).copied()
    }

    /// Every claimed extension, sorted.
    #[must_use]
    pub fn supported_exts(&self) -> Vec<String> {
        self.by_ext.keys().cloned().collect()
    }

    /// Every claimed MIME type, sorted.
    #[must_use]
    pub fn supported_mimes(&self) -> Vec<String> {
        self.by_mime.keys().cloned().collect()
    }
}

static REGISTRY: Lazy<HandlerRegistry> = Lazy::new(|| HandlerRegistry::build(BUILTIN));

#[must_use]
pub fn registry() -> &'static HandlerRegistry {
    &REGISTRY
}
