use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nitf_tre::error::{ErrorCategory, Result};
use nitf_tre::{FieldType, Record, SchemaEntry, SchemaSet};

/// Tracks the largest single allocation made by this test binary
struct LargestAllocation;

static LARGEST: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for LargestAllocation {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        LARGEST.fetch_max(layout.size(), Ordering::Relaxed);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        LARGEST.fetch_max(new_size, Ordering::Relaxed);
        System.realloc(ptr, layout, new_size)
    }
}

#[global_allocator]
static ALLOC: LargestAllocation = LargestAllocation;

const LIMIT: usize = 1 << 20;

// a single test so nothing else in this binary allocates concurrently
#[test]
fn claimed_lengths_do_not_drive_allocation() -> Result<()> {
    let set = Arc::new(SchemaSet::single(
        "CLAIMA",
        vec![
            SchemaEntry::field("N", FieldType::NumericText, 10),
            SchemaEntry::conditional("DATA", FieldType::Binary),
        ],
    ));

    let mut record = Record::new(set.clone(), None)?;
    let err = record.decode_slice(b"4000000000").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::LengthMismatch);
    assert!(LARGEST.load(Ordering::Relaxed) < LIMIT);

    let mut record = Record::new(set.clone(), None)?;
    let err = record.decode(&b"4000000000abcdef"[..]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
    assert!(LARGEST.load(Ordering::Relaxed) < LIMIT);

    let mut record = Record::new(set, Some(16))?;
    let err = record.decode(&b"4000000000abcdef"[..]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::LengthMismatch);
    assert!(LARGEST.load(Ordering::Relaxed) < LIMIT);
    Ok(())
}
