use std::sync::atomic::{AtomicUsize, Ordering};

use bsonbuf::document::Value;
use bsonbuf::owned::{DeleterId, RawValue, RAW_ALIGNED, RAW_HEAP};
use bsonbuf::{Bson, BsonRef, Core, ElementType, ObjectId, Regex};

fn built() -> Value {
    let mut core = Core::new(false);
    core.key_view("k").unwrap().append("v").unwrap();
    core.extract_document().unwrap()
}

#[test]
fn test_builder_value_round_trips_through_raw() {
    let doc = built();
    assert_eq!(doc.deleter_id(), DeleterId::Aligned);
    let ptr = doc.data().as_ptr();
    let bytes = doc.data().to_vec();

    let raw = doc.into_raw();
    assert_eq!(raw.tag, RAW_ALIGNED);
    assert_eq!(raw.data as *const u8, ptr);

    let back = unsafe { Value::from_raw(raw) };
    assert_eq!(back.deleter_id(), DeleterId::Aligned);
    assert_eq!(back.data().as_ptr(), ptr);
    assert_eq!(back.data(), &bytes[..]);
}

#[test]
fn test_heap_value_moves_everywhere() {
    let bytes = built().into_vec();
    let doc = Value::from_vec(bytes);
    let ptr = doc.data().as_ptr();

    let raw = doc.into_raw();
    assert_eq!(raw.tag, RAW_HEAP);
    let doc = unsafe { Value::from_raw(raw) };
    assert_eq!(doc.deleter_id(), DeleterId::Heap);

    let v = doc.into_vec();
    assert_eq!(v.as_ptr(), ptr);
    assert_eq!(bsonbuf::document::View::new(&v).get("k").unwrap().get_utf8().unwrap(), "v");
}

static RELEASED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn release_boxed(ptr: *mut u8, len: usize) {
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)));
    RELEASED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_foreign_deleter_runs_once() {
    let boxed = built().into_vec().into_boxed_slice();
    let length = boxed.len();
    let raw = RawValue {
        data: Box::into_raw(boxed) as *mut u8,
        length,
        tag: 42,
        deleter: Some(release_boxed),
    };

    let doc = unsafe { Value::from_raw(raw) };
    assert_eq!(doc.deleter_id(), DeleterId::Foreign);
    assert_eq!(doc.view().get("k").unwrap().get_utf8().unwrap(), "v");
    assert_eq!(RELEASED.load(Ordering::SeqCst), 0);

    // Foreign memory cannot become a `Vec`, so it is copied and released
    let v = doc.into_vec();
    assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
    assert_eq!(v.len(), length);
}

#[test]
fn test_copy_is_independent() {
    let original = built();
    let copy = Value::from(original.view());
    assert_eq!(copy, original);
    assert_ne!(copy.data().as_ptr(), original.data().as_ptr());
    assert_eq!(copy.deleter_id(), DeleterId::Heap);
}

#[test]
fn test_object_id_ordering() {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&1_600_000_000u32.to_be_bytes());
    bytes[4..9].copy_from_slice(&[1, 2, 3, 4, 5]);
    bytes[11] = 1;
    let first = ObjectId::from_bytes(bytes);
    bytes[11] = 2;
    let second = ObjectId::from_bytes(bytes);
    assert!(first < second);
    assert_eq!(first.timestamp(), second.timestamp());
    assert_eq!(first.timestamp(), 1_600_000_000);

    let low: ObjectId = "000000000000000000000001".parse().unwrap();
    let high: ObjectId = "000000000000000000000100".parse().unwrap();
    assert!(low < high);
    assert_eq!(high.to_string(), "000000000000000000000100");
}

fn decoded() -> Vec<Bson> {
    let mut core = Core::new(false);
    core.key_view("s").unwrap().append("text").unwrap();
    core.key_view("d").unwrap().open_document().unwrap();
    core.key_view("n").unwrap().append(1).unwrap();
    core.close_document().unwrap();
    core.key_view("r").unwrap();
    core.append(Regex {
        pattern: "^a",
        options: "i",
    })
    .unwrap();
    let doc = core.extract_document().unwrap();

    let values = doc.view().iter().map(|e| e.unwrap().to_bson().unwrap()).collect();
    values
}

#[test]
fn test_owned_values_outlive_their_document() {
    let values = decoded();
    assert_eq!(values[0], Bson::from("text"));
    assert_eq!(values[1].element_type(), ElementType::Document);
    match &values[1] {
        Bson::Document(d) => assert_eq!(d.view().get("n").unwrap().get_int32().unwrap(), 1),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        values[2],
        BsonRef::Regex(Regex {
            pattern: "^a",
            options: "i",
        })
    );

    let mut core = Core::new(true);
    for value in &values {
        core.append(value).unwrap();
    }
    core.append(&Bson::Int64(9)).unwrap();
    let arr = core.extract_array().unwrap();
    let back: Vec<Bson> = arr.view().iter().map(|e| e.unwrap().to_bson().unwrap()).collect();
    assert_eq!(back[..3], values[..]);
    assert_eq!(back[3], BsonRef::Int64(9));
}
