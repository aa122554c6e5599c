#![no_main]

use std::sync::Arc;

use batchview::{Batch, CloneOptions, IterOptions, MemStore, Slice};
use libfuzzer_sys::fuzz_target;

// Interleaves batch mutations with iterator movement, refreshes and clones.
// Keys come from a small alphabet so spans overlap often.
fuzz_target!(|data: &[u8]| {
    let mut batch = Batch::new(Arc::new(MemStore::new()));
    let mut iter = match batch.new_iter(IterOptions::default()) {
        Ok(iter) => iter,
        Err(_) => return,
    };

    let key = |b: u8| Slice::from(vec![b'a' + b % 8]);

    for chunk in data.chunks(3) {
        if chunk.len() < 3 {
            break;
        }
        let (a, b) = (key(chunk[1]), key(chunk[2]));
        let (start, end) = if a < b { (a.clone(), b) } else { (b, a.clone()) };
        let suffix = if chunk[2] % 3 == 0 { "" } else { "@1" };

        match chunk[0] % 14 {
            0 => {
                let _ = batch.set(a, vec![chunk[2]]);
            },
            1 => {
                let _ = batch.delete(a);
            },
            2 => {
                let _ = batch.delete_range(start, end);
            },
            3 => {
                let _ = batch.range_key_set(start, end, suffix, vec![chunk[1]]);
            },
            4 => {
                let _ = batch.range_key_unset(start, end, suffix);
            },
            5 => {
                let _ = batch.range_key_delete(start, end);
            },
            6 => {
                iter.first();
            },
            7 => {
                iter.last();
            },
            8 => {
                iter.next();
            },
            9 => {
                iter.prev();
            },
            10 => {
                iter.seek_ge(&a);
            },
            11 => {
                iter.seek_lt(&a);
            },
            12 => {
                let _ = iter.refresh_view();
            },
            _ => {
                let refresh_batch_view = chunk[1] % 2 == 0;
                if let Ok(clone) = iter.clone_with(CloneOptions { refresh_batch_view, iter_options: None }) {
                    iter = clone;
                }
            },
        }

        if iter.valid() {
            let _ = iter.key();
            let _ = iter.range_key_values();
        }
    }
});
