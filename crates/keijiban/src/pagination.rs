//! Maps a document's blocks onto fixed-height pages.

use crate::measure::{Block, ContentMeasurer};
use crate::model::Document;

/// Content height one A4 page holds once header and footer are reserved.
pub const DEFAULT_PAGE_BUDGET_PX: f32 = 850.0;

/// What a page holds, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// Index into `Document::sections`.
    Section(usize),
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based.
    pub number: usize,
    pub total: usize,
    pub header_visible: bool,
    pub items: Vec<PageItem>,
    /// The page was sealed by a manual page break.
    pub ends_with_manual_break: bool,
    pub content_height: f32,
}

impl Page {
    fn open(number: usize, header_visible: bool) -> Self {
        Self {
            number,
            total: 0,
            header_visible,
            items: Vec::new(),
            ends_with_manual_break: false,
            content_height: 0.0,
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().filter_map(|item| match item {
            PageItem::Section(index) => Some(*index),
            PageItem::Image => None,
        })
    }

    pub fn has_image(&self) -> bool {
        self.items.contains(&PageItem::Image)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pagination {
    pub pages: Vec<Page>,
}

impl Pagination {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn first(&self) -> Option<&Page> {
        self.pages.first()
    }

    /// Number of the page holding section `index`.
    pub fn page_of_section(&self, index: usize) -> Option<usize> {
        self.pages
            .iter()
            .find(|page| page.items.contains(&PageItem::Section(index)))
            .map(|page| page.number)
    }
}

enum Step<'a> {
    Break,
    Place {
        item: PageItem,
        block: Block<'a>,
        /// Stays on the current page even when it overflows.
        pinned: bool,
    },
}

/// Single forward placement pass followed by a backward patch of the
/// page total. Runs from scratch on every call.
pub struct Paginator<'m> {
    measurer: &'m dyn ContentMeasurer,
    budget_px: f32,
}

impl<'m> Paginator<'m> {
    pub fn new(measurer: &'m dyn ContentMeasurer, budget_px: f32) -> Self {
        Self {
            measurer,
            budget_px,
        }
    }

    pub fn paginate(&self, document: &Document) -> Pagination {
        let style = document.style_context();

        let mut pages = Vec::new();
        let mut manual_break_seen = false;
        let mut current = Page::open(1, true);

        for step in steps(document) {
            match step {
                Step::Break => {
                    manual_break_seen = true;
                    current.ends_with_manual_break = true;
                    let number = current.number + 1;
                    pages.push(std::mem::replace(&mut current, Page::open(number, false)));
                }
                Step::Place {
                    item,
                    block,
                    pinned,
                } => {
                    let height = self.measurer.measure(&block, &style);
                    let overflows = current.content_height + height > self.budget_px;

                    if overflows && !pinned {
                        let number = current.number + 1;
                        let header_visible = number == 1 && !manual_break_seen;
                        log::debug!(
                            "{:?} overflows page {} ({:.1} + {:.1} > {:.1}), moving to page {}",
                            item,
                            current.number,
                            current.content_height,
                            height,
                            self.budget_px,
                            number
                        );
                        pages.push(std::mem::replace(
                            &mut current,
                            Page::open(number, header_visible),
                        ));
                    }

                    current.items.push(item);
                    current.content_height += height;
                }
            }
        }
        pages.push(current);

        let total = pages.len();
        for page in &mut pages {
            page.total = total;
        }
        log::debug!("Paginated {} sections into {} pages", document.sections.len(), total);

        Pagination { pages }
    }
}

/// Sections in order, then the image. Only the last entry of the section
/// list is pinned; a trailing page break pins nothing and the image is
/// never pinned.
fn steps(document: &Document) -> Vec<Step<'_>> {
    let last_section = document.sections.len().saturating_sub(1);
    let mut steps: Vec<Step<'_>> = document
        .sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            if section.is_page_break() {
                Step::Break
            } else {
                Step::Place {
                    item: PageItem::Section(index),
                    block: Block::Text {
                        index,
                        heading: &section.heading,
                        body: &section.body,
                    },
                    pinned: index == last_section,
                }
            }
        })
        .collect();

    if let Some(data) = &document.image {
        steps.push(Step::Place {
            item: PageItem::Image,
            block: Block::Image { data },
            pinned: false,
        });
    }
    steps
}
