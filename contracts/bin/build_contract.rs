#![doc = "Binary for building wasm files from the leafsii contracts."]
#![cfg_attr(target_arch = "wasm32", no_std)]
#![cfg_attr(target_arch = "wasm32", no_main)]
#![allow(unused_imports, clippy::single_component_path_imports)]

use leafsii_contracts;

#[cfg(not(target_arch = "wasm32"))]
fn main() {}
