//! User-configured record rewriting and filtering.
//!
//! A transform takes a record and either produces a (possibly rewritten)
//! record or declines, and a [`TransformChain`] folds an ordered list of them
//! over each extracted record.
//!
//! # Chain semantics
//!
//! For each record, transforms run in order. If one declines (returns
//! `None`), the record is dropped immediately and no further transforms run.
//! If all transforms produce, the LAST produced record is emitted.
//!
//! Deliberate compatibility choice: every transform is applied to the
//! ORIGINAL input record, not to the previous transform's output, so a later
//! transform never observes an earlier rewrite. Threading outputs through
//! the chain would be the more intuitive semantics, but it would silently
//! change the meaning of existing transform lists; see DESIGN.md.

use crate::item::FeedItem;

/// One transform: produce a record (possibly rewritten) or decline to drop it.
pub type Transform = Box<dyn Fn(&FeedItem) -> Option<FeedItem> + Send + Sync>;

/// An ordered list of transforms applied to every extracted record.
#[derive(Default)]
pub struct TransformChain {
    transforms: Vec<Transform>,
}

impl TransformChain {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Fold the chain over one record.
    ///
    /// Returns the record to emit, or `None` if any transform dropped it.
    pub fn apply(&self, item: &FeedItem) -> Option<FeedItem> {
        let mut current = None;
        for transform in &self.transforms {
            match transform(item) {
                Some(produced) => current = Some(produced),
                None => return None,
            }
        }
        // An empty chain emits the record unchanged.
        Some(current.unwrap_or_else(|| item.clone()))
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field("len", &self.transforms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn item() -> FeedItem {
        let when = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .unwrap();
        FeedItem::new("mpv_1", "Track", "listen", when)
    }

    fn keep() -> Transform {
        Box::new(|item| Some(item.clone()))
    }

    fn drop_all() -> Transform {
        Box::new(|_| None)
    }

    fn retitle(title: &'static str) -> Transform {
        Box::new(move |item| {
            let mut out = item.clone();
            out.title = title.to_string();
            Some(out)
        })
    }

    #[test]
    fn test_empty_chain_emits_unchanged() {
        let chain = TransformChain::default();
        assert_eq!(chain.apply(&item()), Some(item()));
    }

    #[test]
    fn test_decline_drops_and_short_circuits() {
        let chain = TransformChain::new(vec![keep(), drop_all()]);
        assert_eq!(chain.apply(&item()), None);
        // Drop wins even when a later transform would produce.
        let chain = TransformChain::new(vec![drop_all(), retitle("never")]);
        assert_eq!(chain.apply(&item()), None);
    }

    #[test]
    fn test_last_producer_wins() {
        let chain = TransformChain::new(vec![retitle("first"), retitle("second")]);
        let out = chain.apply(&item()).unwrap();
        assert_eq!(out.title, "second");
    }

    #[test]
    fn test_transforms_see_the_original_record() {
        // The second transform observes the original title, not the rewrite.
        let saw_original: Transform = Box::new(|input: &FeedItem| {
            assert_eq!(input.title, "Track");
            Some(input.clone())
        });
        let chain = TransformChain::new(vec![retitle("rewritten"), saw_original]);
        // And because the last producer wins, the rewrite is lost.
        let out = chain.apply(&item()).unwrap();
        assert_eq!(out.title, "Track");
    }
}
