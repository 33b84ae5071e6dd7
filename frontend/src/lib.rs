use sauron::prelude::*;

pub mod api;
pub mod app;
pub mod error;
pub mod state;

#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    Program::mount_to_body(app::Model::default());
}
