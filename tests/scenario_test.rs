use std::sync::Arc;

use batchview::{
    Batch, BatchIter, CloneOptions, IterOptions, IterValidity, MemStore, Slice, format_position,
    format_validity,
};

fn new_batch() -> (Arc<MemStore>, Batch) {
    let store = Arc::new(MemStore::new());
    let batch = Batch::new(store.clone());
    (store, batch)
}

/// Render `first` followed by `next` until exhaustion.
fn scan(iter: &mut BatchIter) -> Vec<String> {
    let mut out = Vec::new();
    let mut valid = iter.first();
    out.push(format_position(iter));
    while valid {
        valid = iter.next();
        out.push(format_position(iter));
    }
    out
}

/// Render `last` followed by `prev` until exhaustion.
fn scan_backward(iter: &mut BatchIter) -> Vec<String> {
    let mut out = Vec::new();
    let mut valid = iter.last();
    out.push(format_position(iter));
    while valid {
        valid = iter.prev();
        out.push(format_position(iter));
    }
    out
}

fn keys(iter: &mut BatchIter) -> Vec<String> {
    let mut out = Vec::new();
    let mut valid = iter.first();
    while valid {
        out.push(iter.key().to_string());
        valid = iter.next();
    }
    out
}

#[test]
fn test_refresh_scenario() {
    let (_, mut batch) = new_batch();
    batch.set("foo", "foo").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert_eq!(scan(&mut iter), vec!["foo: (foo, .)", "."]);

    batch.set("bar", "bar").unwrap();
    assert_eq!(scan(&mut iter), vec!["foo: (foo, .)", "."]);

    iter.refresh_view().unwrap();
    assert_eq!(
        scan(&mut iter),
        vec!["bar: (bar, .)", "foo: (foo, .)", "."]
    );

    batch.range_key_set("a", "c", "@1", "boop").unwrap();
    assert_eq!(
        scan(&mut iter),
        vec!["bar: (bar, .)", "foo: (foo, .)", "."]
    );

    iter.refresh_view().unwrap();
    assert_eq!(
        scan(&mut iter),
        vec![
            "a: (., [a-c) @1=boop UPDATED)",
            "bar: (bar, [a-c) @1=boop)",
            "foo: (foo, . UPDATED)",
            "."
        ]
    );
    assert_eq!(
        scan_backward(&mut iter),
        vec![
            "foo: (foo, .)",
            "bar: (bar, [a-c) @1=boop UPDATED)",
            "a: (., [a-c) @1=boop)",
            "."
        ]
    );
    iter.close().unwrap();
}

#[test]
fn test_clone_before_range_ops() {
    let (_, mut batch) = new_batch();
    batch.set("a", "a").unwrap();
    batch.set("b", "b").unwrap();
    batch.set("c", "c").unwrap();

    let early = batch.new_iter(IterOptions::default()).unwrap();

    batch.delete_range("a", "c").unwrap();
    batch.range_key_set("a", "d", "@5", "x").unwrap();

    // Warms the fragment cache past the early iterator's watermark.
    let mut late = batch.new_iter(IterOptions::default()).unwrap();
    let expected_late = vec![
        "a: (., [a-d) @5=x UPDATED)",
        "c: (c, [a-d) @5=x)",
        ".",
    ];
    assert_eq!(scan(&mut late), expected_late);

    let mut frozen = early.clone_with(CloneOptions::default()).unwrap();
    assert_eq!(frozen.visible_len(), 3);
    assert_eq!(
        scan(&mut frozen),
        vec!["a: (a, .)", "b: (b, .)", "c: (c, .)", "."]
    );

    let mut refreshed = early
        .clone_with(CloneOptions {
            refresh_batch_view: true,
            iter_options: None,
        })
        .unwrap();
    assert_eq!(refreshed.visible_len(), 5);
    assert_eq!(scan(&mut refreshed), expected_late);
}

#[test]
fn test_snapshot_stability() {
    let (_, mut batch) = new_batch();
    batch.set("b", "1").unwrap();
    batch.set("d", "1").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();

    batch.set("a", "2").unwrap();
    batch.set("b", "2").unwrap();
    batch.delete("d").unwrap();
    batch.delete_range("a", "z").unwrap();
    batch.range_key_set("a", "z", "@1", "x").unwrap();

    assert_eq!(scan(&mut iter), vec!["b: (1, .)", "d: (1, .)", "."]);
    assert!(iter.seek_ge(&Slice::from("a")));
    assert_eq!(iter.key(), Slice::from("b"));
    assert!(iter.seek_lt(&Slice::from("z")));
    assert_eq!(iter.key(), Slice::from("d"));
    assert_eq!(iter.visible_len(), 2);
}

#[test]
fn test_idempotent_refresh() {
    let (_, mut batch) = new_batch();
    batch.set("a", "1").unwrap();
    batch.range_key_set("b", "d", "@2", "v").unwrap();
    batch.set("c", "3").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    batch.delete("a").unwrap();

    iter.refresh_view().unwrap();
    let first = scan(&mut iter);
    let len = iter.visible_len();

    iter.refresh_view().unwrap();
    assert_eq!(scan(&mut iter), first);
    assert_eq!(iter.visible_len(), len);
    assert_eq!(
        first,
        vec!["b: (., [b-d) @2=v UPDATED)", "c: (3, [b-d) @2=v)", "."]
    );
}

#[test]
fn test_refresh_drops_stale_span() {
    let (_, mut batch) = new_batch();
    batch.range_key_set("a", "e", "@1", "x").unwrap();
    batch.set("c", "c").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert!(iter.seek_ge(&Slice::from("c")));
    assert_eq!(iter.range_bounds(), Some((Slice::from("a"), Slice::from("e"))));

    batch.range_key_delete("b", "d").unwrap();
    iter.refresh_view().unwrap();
    assert!(iter.seek_ge(&Slice::from("c")));
    assert_eq!(format_position(&iter), "c: (c, .)");
    assert!(iter.next());
    assert_eq!(format_position(&iter), "d: (., [d-e) @1=x UPDATED)");
}

#[test]
fn test_base_store_visibility() {
    let (store, mut batch) = new_batch();
    store.put("a", "base");
    store.put("b", "base");
    batch.set("b", "batch").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    store.put("c", "late");
    store.delete("a");

    assert_eq!(scan(&mut iter), vec!["a: (base, .)", "b: (batch, .)", "."]);

    // Neither a refresh nor a refreshing clone re-reads the base store.
    iter.refresh_view().unwrap();
    assert_eq!(keys(&mut iter), vec!["a", "b"]);
    let mut clone = iter
        .clone_with(CloneOptions {
            refresh_batch_view: true,
            iter_options: None,
        })
        .unwrap();
    assert_eq!(keys(&mut clone), vec!["a", "b"]);

    let mut fresh = batch.new_iter(IterOptions::default()).unwrap();
    assert_eq!(keys(&mut fresh), vec!["b", "c"]);
}

#[test]
fn test_range_delete_masks_base_and_older_batch_keys() {
    let (store, mut batch) = new_batch();
    store.put("a", "base");
    store.put("c", "base");
    store.put("e", "base");
    batch.set("b", "old").unwrap();
    batch.delete_range("a", "d").unwrap();
    batch.set("c", "new").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert_eq!(
        scan(&mut iter),
        vec!["c: (new, .)", "e: (base, .)", "."]
    );
    assert_eq!(
        scan_backward(&mut iter),
        vec!["e: (base, .)", "c: (new, .)", "."]
    );
    assert_eq!(batch.get(&Slice::from("a")).unwrap(), None);
    assert_eq!(batch.get(&Slice::from("c")).unwrap(), Some(Slice::from("new")));
}

#[test]
fn test_range_key_value_order() {
    let (_, mut batch) = new_batch();
    batch.range_key_set("a", "c", "@1", "x").unwrap();
    batch.range_key_set("b", "d", "@3", "y").unwrap();
    batch.range_key_set("a", "d", "", "z").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert_eq!(
        scan(&mut iter),
        vec![
            "a: (., [a-b) =z, @1=x UPDATED)",
            "b: (., [b-c) =z, @3=y, @1=x UPDATED)",
            "c: (., [c-d) =z, @3=y UPDATED)",
            "."
        ]
    );

    // Unsetting @3 over [b, c) makes it identical to [a, b).
    batch.range_key_unset("b", "c", "@3").unwrap();
    iter.refresh_view().unwrap();
    assert_eq!(
        scan(&mut iter),
        vec![
            "a: (., [a-c) =z, @1=x UPDATED)",
            "c: (., [c-d) =z, @3=y UPDATED)",
            "."
        ]
    );
}

#[test]
fn test_equal_versions_most_recent_first() {
    let (_, mut batch) = new_batch();
    batch.range_key_set("a", "b", "@01", "older").unwrap();
    batch.range_key_set("a", "b", "@1", "newer").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert!(iter.first());
    assert_eq!(
        format_position(&iter),
        "a: (., [a-b) @1=newer, @01=older UPDATED)"
    );
}

#[test]
fn test_bounds_clip_range_keys() {
    let (_, mut batch) = new_batch();
    batch.range_key_set("a", "z", "@1", "x").unwrap();
    batch.set("m", "m").unwrap();

    let mut iter = batch
        .new_iter(IterOptions::with_bounds(
            Some(Slice::from("k")),
            Some(Slice::from("p")),
        ))
        .unwrap();
    assert_eq!(
        scan(&mut iter),
        vec![
            "k: (., [k-p) @1=x UPDATED)",
            "m: (m, [k-p) @1=x)",
            "."
        ]
    );

    let err = batch
        .new_iter(IterOptions::with_bounds(
            Some(Slice::from("p")),
            Some(Slice::from("k")),
        ))
        .err()
        .unwrap();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_seek_prefix_ge() {
    let (store, mut batch) = new_batch();
    store.put("apple@2", "base");
    batch.set("apple@5", "batch").unwrap();
    batch.set("apples@1", "other").unwrap();
    batch.set("banana@1", "other").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert!(iter.seek_prefix_ge(&Slice::from("apple@0")));
    assert_eq!(iter.key(), Slice::from("apple@2"));
    assert!(iter.next());
    assert_eq!(iter.key(), Slice::from("apple@5"));
    assert!(!iter.next());
}

#[test]
fn test_seek_prefix_ge_clips_range_keys() {
    let (store, mut batch) = new_batch();
    store.put("b@2", "base");
    batch.range_key_set("a", "d", "@1", "x").unwrap();
    batch.set("b@5", "batch").unwrap();
    batch.set("c@1", "other").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    let mut out = Vec::new();
    let mut valid = iter.seek_prefix_ge(&Slice::from("b"));
    out.push(format_position(&iter));
    while valid {
        valid = iter.next();
        out.push(format_position(&iter));
    }
    // The span is cut at the prefix successor and c@1 is never reached.
    assert_eq!(
        out,
        vec![
            "b: (., [a-c) @1=x UPDATED)",
            "b@2: (base, [a-c) @1=x)",
            "b@5: (batch, [a-c) @1=x)",
            "."
        ]
    );

    // A plain seek sees the whole span again.
    assert!(iter.seek_ge(&Slice::from("b")));
    assert_eq!(format_position(&iter), "b: (., [a-d) @1=x UPDATED)");
}

#[test]
fn test_limits_render() {
    let (_, mut batch) = new_batch();
    batch.set("a", "a").unwrap();
    batch.set("c", "c").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    let limit = Slice::from("b");
    let v = iter.seek_ge_with_limit(&Slice::from("a"), &limit);
    assert_eq!(format_validity(v, &iter), "a: (a, .)");
    let v = iter.next_with_limit(&limit);
    assert_eq!(v, IterValidity::AtLimit);
    assert_eq!(format_validity(v, &iter), ". at-limit");
    let v = iter.next_with_limit(&Slice::from("d"));
    assert_eq!(format_validity(v, &iter), "c: (c, .)");
    let v = iter.next_with_limit(&Slice::from("d"));
    assert_eq!(format_validity(v, &iter), ".");
}

#[test]
fn test_injected_error_and_recovery() {
    let (store, mut batch) = new_batch();
    store.put("a", "base");
    store.put("b", "base");
    batch.set("c", "batch").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    store.faults().arm(1);
    assert!(!iter.first());
    let err = iter.error().unwrap();
    assert!(err.is_io_error() && err.is_injected());
    assert!(format_position(&iter).starts_with("err=IOError"));
    assert!(!iter.next());

    // An absolute seek clears the error.
    assert!(iter.first());
    assert!(iter.error().is_none());
    assert_eq!(iter.key(), Slice::from("a"));

    store.faults().arm(1);
    assert!(!iter.next());
    assert!(iter.error().unwrap().is_injected());
    assert!(iter.seek_ge(&Slice::from("b")));
    assert_eq!(keys(&mut iter), vec!["a", "b", "c"]);

    store.faults().arm(1);
    assert!(!iter.last());
    assert!(iter.close().unwrap_err().is_injected());
    assert_eq!(batch.stats().errors(), 3);
}

#[test]
fn test_use_after_close() {
    let (_, mut batch) = new_batch();
    batch.set("a", "a").unwrap();

    let mut iter = batch.new_iter(IterOptions::default()).unwrap();
    assert!(iter.first());
    iter.close().unwrap();

    assert!(iter.is_closed());
    assert!(!iter.valid());
    assert!(!iter.next());
    assert!(iter.error().unwrap().is_closed());
    assert!(iter.close().unwrap_err().is_closed());
    assert!(
        iter.set_bounds(None, Some(Slice::from("b")))
            .unwrap_err()
            .is_closed()
    );
}
