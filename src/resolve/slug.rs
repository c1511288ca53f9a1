use crate::parser::title::slugify;
use std::collections::HashSet;

/// Hands out unique slugs within one namespace. A taken slug gets `-2`, `-3`
/// and so on appended.
#[derive(Debug, Clone, Default)]
pub struct SlugAllocator {
    used: HashSet<String>,
}

impl SlugAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, name: &str) -> String {
        let base = slugify(name);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Marks a slug as taken without allocating it.
    pub fn reserve(&mut self, slug: &str) {
        self.used.insert(slug.to_string());
    }
}
