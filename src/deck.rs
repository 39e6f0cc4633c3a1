//! Markdown to slide-deck segmentation.
//!
//! A document is cut into horizontal groups on the primary separator, and
//! each group is cut into vertical sub-slides on the secondary separator:
//!
//! ```text
//! # Intro            <- group 1
//! ---
//! ## Part A          <- group 2, slide 1
//! --
//! ## Part A detail   <- group 2, slide 2
//! ```

/// Separator between horizontal slides: a line holding only `---`.
pub const HORIZONTAL_SEPARATOR: &str = "\n---\n";

/// Separator between vertical sub-slides: a line holding only `--`.
pub const VERTICAL_SEPARATOR: &str = "\n--\n";

/// One horizontal position in the deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideGroup {
    slides: Vec<String>,
}

impl SlideGroup {
    pub fn slides(&self) -> &[String] {
        &self.slides
    }

    /// True when the group holds nested sub-slides.
    pub fn is_vertical(&self) -> bool {
        self.slides.len() > 1
    }
}

/// The ordered slide groups of one document. Never contains an empty group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    groups: Vec<SlideGroup>,
}

impl Deck {
    /// Segment `text` with the default separators.
    pub fn parse(text: &str) -> Self {
        Segmenter::default().segment(text)
    }

    pub fn groups(&self) -> &[SlideGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of sub-slides across all groups.
    pub fn slide_count(&self) -> usize {
        self.groups.iter().map(|g| g.slides.len()).sum()
    }
}

/// Splits documents using a pair of separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmenter {
    horizontal: String,
    vertical: String,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            horizontal: HORIZONTAL_SEPARATOR.to_string(),
            vertical: VERTICAL_SEPARATOR.to_string(),
        }
    }
}

impl Segmenter {
    /// Build a segmenter from separator lines, e.g. `"==="` and `"..."`.
    ///
    /// The separators are matched as whole lines, so they are wrapped in
    /// newlines here.
    pub fn new(horizontal: &str, vertical: &str) -> Self {
        Self {
            horizontal: format!("\n{}\n", horizontal.trim()),
            vertical: format!("\n{}\n", vertical.trim()),
        }
    }

    pub fn segment(&self, text: &str) -> Deck {
        let groups = text
            .split(self.horizontal.as_str())
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(|fragment| SlideGroup {
                slides: fragment
                    .split(self.vertical.as_str())
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        Deck { groups }
    }
}
