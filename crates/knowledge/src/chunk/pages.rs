//! Mapping from text offsets back to source pages.

/// Start offsets of each page within a concatenated document.
///
/// Offsets are in characters. A chunk is attributed to the page containing
/// its first character, so chunks spanning a page break report the earlier page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBoundaries {
    starts: Vec<(usize, u32)>,
}

impl PageBoundaries {
    /// Build from `(char_offset, page_number)` pairs in ascending offset order.
    pub fn new(mut starts: Vec<(usize, u32)>) -> Self {
        starts.sort_by_key(|(offset, _)| *offset);
        Self { starts }
    }

    /// A single page covering the whole text.
    pub fn single_page() -> Self {
        Self::new(vec![(0, 1)])
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Number of pages that contributed text.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Page number containing the character at `offset`.
    pub fn page_at(&self, offset: usize) -> u32 {
        let idx = self.starts.partition_point(|(start, _)| *start <= offset);
        match idx.checked_sub(1) {
            Some(i) => self.starts[i].1,
            None => self.starts.first().map(|(_, page)| *page).unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_at_boundaries() {
        let pages = PageBoundaries::new(vec![(0, 1), (100, 2), (250, 4)]);
        assert_eq!(pages.page_at(0), 1);
        assert_eq!(pages.page_at(99), 1);
        assert_eq!(pages.page_at(100), 2);
        assert_eq!(pages.page_at(249), 2);
        assert_eq!(pages.page_at(10_000), 4);
    }

    #[test]
    fn test_page_at_without_pages_defaults_to_first() {
        assert_eq!(PageBoundaries::default().page_at(42), 1);
        assert_eq!(PageBoundaries::new(vec![(5, 3)]).page_at(0), 3);
    }
}
