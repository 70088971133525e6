use tracing::trace;
use xlkit_common::{AnyValue, Array, XlOper, XlString, XlType, reclaim};

/// Release a record previously handed to the host with the DLL-free bit.
///
/// Records without the bit are left alone. Otherwise the bit is cleared
/// and the record is dropped through the view matching its tag: multi
/// records as arrays (every element released), strings as strings, and
/// anything else as a plain boxed record.
///
/// # Safety
/// `px` must be null or point to a record produced by
/// [`into_host`](xlkit_common::into_host) that has not been freed yet.
pub unsafe fn free_record(px: *mut XlOper) {
    if px.is_null() {
        return;
    }
    // SAFETY: non-null and, per the contract, a live boxed record.
    let oper = unsafe { &mut *px };
    if !oper.has_dll_free() {
        trace!(xltype = oper.raw_type(), "record not owned by the add-in");
        return;
    }
    oper.clear_dll_free();

    // SAFETY: the record came from `into_host`; every view is layout
    // identical to `XlOper`, and the tag selects the owner of the payload.
    unsafe {
        match oper.tag() {
            Some(XlType::Multi) => drop(reclaim::<Array<AnyValue>>(px)),
            Some(XlType::Str) => drop(reclaim::<XlString>(px)),
            _ => drop(reclaim::<XlOper>(px)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlkit_common::{ExpString, Number, into_host};

    #[test]
    fn null_is_ignored() {
        unsafe { free_record(std::ptr::null_mut()) };
    }

    #[test]
    fn records_without_the_bit_are_untouched() {
        let mut oper = XlOper::number(2.0);
        unsafe { free_record(&mut oper) };
        assert_eq!(oper.num(), Some(2.0));
    }

    #[test]
    fn owned_records_are_released() {
        let scalar = into_host(Number::new(1.0));
        let text = into_host(XlString::new("bye").unwrap());
        let expected = into_host(ExpString::new(XlString::new("wrapped").unwrap()));
        let array = into_host(
            Array::from_values(vec![
                AnyValue::new(XlString::new("a").unwrap()),
                AnyValue::new(Number::new(2.0)),
            ])
            .unwrap(),
        );
        for px in [scalar, text, expected, array] {
            unsafe {
                assert!((*px).has_dll_free());
                free_record(px);
            }
        }
    }
}
