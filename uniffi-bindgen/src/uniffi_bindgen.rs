//! Generates foreign-language bindings for `nnas-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
