//! Drives the exported entry points through a fake host callback.

use std::ffi::c_int;

use parking_lot::Mutex;
use xlkit_cffi::{
    Function, Registry, XL_GET_NAME, XLC_ALERT, XLF_REGISTER, XLL_FAILURE, XLL_SUCCESS,
    XLRET_SUCCESS, declare_addin,
};
use xlkit_common::codec::decode_lossy;
use xlkit_common::{XlOper, XlString, XlType, surrender};

#[derive(Debug, Clone, PartialEq)]
struct Call {
    xlfn: c_int,
    args: Vec<String>,
}

static CALLS: Mutex<Vec<Call>> = Mutex::new(Vec::new());

fn render(oper: &XlOper) -> String {
    match oper.tag() {
        Some(XlType::Str) => decode_lossy(oper.str_units().unwrap_or_default()),
        Some(XlType::Int) => oper.w().map(|w| w.to_string()).unwrap_or_default(),
        Some(XlType::Nil) => "<nil>".to_owned(),
        other => format!("{other:?}"),
    }
}

unsafe extern "system" fn fake_excel(
    xlfn: c_int,
    count: c_int,
    opers: *mut *mut XlOper,
    result: *mut XlOper,
) -> c_int {
    let args = (0..count as usize)
        .map(|i| unsafe { render(&**opers.add(i)) })
        .collect();
    CALLS.lock().push(Call { xlfn, args });
    let answer = match xlfn {
        XL_GET_NAME => surrender(XlString::new("C:\\addins\\ping.xll").unwrap()),
        XLF_REGISTER => XlOper::number(101.0),
        _ => XlOper::nil(),
    };
    unsafe { *result = answer };
    XLRET_SUCCESS
}

fn setup(registry: &mut Registry) {
    registry.name("Ping").register(
        Function::new("CB.PING")
            .result::<bool>()
            .parameter::<f64>("delay", "seconds to wait")
            .category("Diagnostics"),
    );
}

declare_addin!(setup);

#[test]
fn entry_points_talk_to_the_host_callback() {
    // Without an entry point neither registration nor the alert reach a host.
    assert_eq!(xlAutoOpen(), XLL_FAILURE);
    assert!(CALLS.lock().is_empty());

    SetExcel12EntryPt(fake_excel);
    assert_eq!(xlAutoOpen(), XLL_SUCCESS);
    {
        let calls = CALLS.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].xlfn, XL_GET_NAME);
        assert!(calls[0].args.is_empty());
        assert_eq!(calls[1].xlfn, XLF_REGISTER);
        assert_eq!(
            calls[1].args,
            [
                "C:\\addins\\ping.xll",
                "CB.PING",
                "AB",
                "CB.PING",
                "delay",
                "1",
                "Diagnostics",
                "<nil>",
                "",
                "",
                "seconds to wait  ",
            ]
        );
    }

    assert_eq!(xlAutoClose(), XLL_SUCCESS);
    assert_eq!(xlAutoAdd(), XLL_SUCCESS);
    assert_eq!(xlAutoRemove(), XLL_SUCCESS);

    let action = XlOper::int(1);
    unsafe {
        let info = xlAddInManagerInfo12(&action);
        assert!((*info).has_dll_free());
        assert_eq!(render(&*info), "Ping");
        xlAutoFree12(info);

        // An unreadable action is alerted through the host.
        let info = xlAddInManagerInfo12(&XlOper::nil());
        assert_eq!((*info).tag(), Some(XlType::Err));
        xlAutoFree12(info);
    }
    let calls = CALLS.lock();
    let alert = calls.last().map(|c| c.xlfn);
    assert_eq!(alert, Some(XLC_ALERT));
    assert_eq!(calls.last().map(|c| c.args[1].as_str()), Some("3"));
}
