//! Generates Swift and Kotlin bindings from the compiled `passkeeper` library.

fn main() {
    uniffi::uniffi_bindgen_main();
}
