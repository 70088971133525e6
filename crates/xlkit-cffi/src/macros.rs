/// Export the host entry points for an add-in built by `$setup`.
///
/// `$setup` is a `fn(&mut Registry)` that declares the add-in's functions
/// and hooks. It runs once, on the first lifecycle event. The macro emits
/// `xlAutoOpen`, `xlAutoClose`, `xlAutoAdd`, `xlAutoRemove`,
/// `xlAutoFree12`, `xlAddInManagerInfo12` and `SetExcel12EntryPt`.
///
/// ```ignore
/// use xlkit_cffi::{Function, Registry, declare_addin};
///
/// fn setup(registry: &mut Registry) {
///     registry
///         .name("Geometry")
///         .register(Function::new("HYPOT").result::<f64>().parameter::<f64>("x", "").parameter::<f64>("y", ""));
/// }
///
/// declare_addin!(setup);
/// ```
#[macro_export]
macro_rules! declare_addin {
    ($setup:expr) => {
        static __XLKIT_ADDIN: $crate::__private::Lazy<$crate::AddIn<$crate::CallbackHost>> =
            $crate::__private::Lazy::new(|| $crate::AddIn::new($crate::CallbackHost::new(), $setup));

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "system" fn xlAutoOpen() -> ::std::ffi::c_int {
            __XLKIT_ADDIN.open()
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "system" fn xlAutoClose() -> ::std::ffi::c_int {
            __XLKIT_ADDIN.close()
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "system" fn xlAutoAdd() -> ::std::ffi::c_int {
            __XLKIT_ADDIN.add()
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "system" fn xlAutoRemove() -> ::std::ffi::c_int {
            __XLKIT_ADDIN.remove()
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub unsafe extern "system" fn xlAutoFree12(px: *mut $crate::__private::XlOper) {
            unsafe { __XLKIT_ADDIN.free(px) }
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub unsafe extern "system" fn xlAddInManagerInfo12(
            action: *const $crate::__private::XlOper,
        ) -> *mut $crate::__private::XlOper {
            unsafe { __XLKIT_ADDIN.manager_info_raw(action) }
        }

        #[allow(non_snake_case)]
        #[unsafe(no_mangle)]
        pub extern "system" fn SetExcel12EntryPt(entry: $crate::Excel12Proc) {
            __XLKIT_ADDIN.host().set_entry_point(entry)
        }
    };
}
