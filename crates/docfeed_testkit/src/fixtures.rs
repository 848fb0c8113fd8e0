//! Test fixtures for feed items and pages.

use docfeed_protocol::{ChangesPage, ChangesResultItem, Seq};
use std::ops::Range;

/// Sequence token used by fixtures for position `n`.
pub fn seq(n: u64) -> Seq {
    Seq::new(format!("{n}-g1AAAA{n:04x}"))
}

/// A change item for document `doc-{n}` at position `n`.
pub fn item(n: u64) -> ChangesResultItem {
    ChangesResultItem::new(format!("doc-{n}"), seq(n), format!("1-{n:08x}"))
}

/// A page holding items for every position in `range`.
///
/// `last_seq` is the token of the last item, or of `range.start - 1` for an
/// empty range.
pub fn page(range: Range<u64>, pending: u64) -> ChangesPage {
    let last = if range.is_empty() {
        range.start.saturating_sub(1)
    } else {
        range.end - 1
    };
    ChangesPage::new(range.map(item).collect(), seq(last), pending)
}

/// Splits positions `1..=total` into consecutive pages of `page_size`,
/// with `pending` counting down to 0 on the last page.
pub fn pages(total: u64, page_size: u64) -> Vec<ChangesPage> {
    let page_size = page_size.max(1);
    let mut pages = Vec::new();
    let mut start = 1;
    while start <= total {
        let end = (start + page_size).min(total + 1);
        pages.push(page(start..end, total + 1 - end));
        start = end;
    }
    pages
}
