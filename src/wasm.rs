use wasm_bindgen::prelude::*;

/// Subset `font` per a JSON request. Returns the subset font bytes.
#[wasm_bindgen]
pub fn subset_font(request_json: &str, font: &[u8]) -> Result<Vec<u8>, JsValue> {
    crate::subset_json(request_json, font)
        .map(|result| result.font_data)
        .map_err(|e| JsValue::from_str(&format!("Subset error: {}", e)))
}
